//! Tree utilities (§2 overview table: "deep clone, shallow structural
//! matchers, expression/statement builders, a type-string mini-parser for
//! composing new type syntax"). Every rewrite pass starts from a clone of
//! the base function's body (§3 "Lifecycle": "the cloned body is owned
//! solely by the produced function") — nothing here mutates its input.

use anyhow::{Result, bail};

use crate::expr::{BinaryOp, Expr};
use crate::stmt::{Block, Stmt, StmtNode};

/// Default bound from §5 "Resource bounds": "the clone depth is guarded
/// against pathological inputs by a configured maximum recursion depth
/// (around 1000)".
pub const DEFAULT_MAX_CLONE_DEPTH: u32 = 1000;

/// Clones `block`, aborting with an error once nesting exceeds `max_depth`
/// (§5: "exceeding it aborts the current specialization with a
/// diagnostic"). The caller (the top-level `transform` in `simd-transform`)
/// is responsible for turning this `anyhow::Error` into a
/// `simd_diag::Diagnostic::OverDeepClone`.
pub fn clone_block_with_depth_guard(block: &Block, max_depth: u32) -> Result<Block> {
    clone_block(block, 0, max_depth)
}

fn clone_block(block: &Block, depth: u32, max_depth: u32) -> Result<Block> {
    if depth > max_depth {
        bail!("clone recursion exceeded depth {max_depth}");
    }
    block
        .iter()
        .map(|node| clone_stmt_node(node, depth, max_depth))
        .collect()
}

fn clone_stmt_node(node: &StmtNode, depth: u32, max_depth: u32) -> Result<StmtNode> {
    Ok(StmtNode {
        line: node.line,
        node: clone_stmt(&node.node, depth, max_depth)?,
    })
}

fn clone_stmt(stmt: &Stmt, depth: u32, max_depth: u32) -> Result<Stmt> {
    let next = depth + 1;
    Ok(match stmt {
        Stmt::Expr(e) => Stmt::Expr(clone_expr(e, next, max_depth)?),
        Stmt::Assign { lhs, op, rhs } => Stmt::Assign {
            lhs: lhs
                .iter()
                .map(|e| clone_expr(e, next, max_depth))
                .collect::<Result<_>>()?,
            op: *op,
            rhs: rhs
                .iter()
                .map(|e| clone_expr(e, next, max_depth))
                .collect::<Result<_>>()?,
        },
        Stmt::VarDecl { name, ty, value } => Stmt::VarDecl {
            name: name.clone(),
            ty: ty.clone(),
            value: value
                .as_ref()
                .map(|e| clone_expr(e, next, max_depth))
                .transpose()?,
        },
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => Stmt::If {
            cond: clone_expr(cond, next, max_depth)?,
            then_block: clone_block(then_block, next, max_depth)?,
            else_block: else_block
                .as_ref()
                .map(|b| clone_block(b, next, max_depth))
                .transpose()?,
        },
        Stmt::For {
            init,
            cond,
            post,
            body,
        } => Stmt::For {
            init: init
                .as_ref()
                .map(|s| clone_stmt(s, next, max_depth).map(Box::new))
                .transpose()?,
            cond: cond.as_ref().map(|e| clone_expr(e, next, max_depth)).transpose()?,
            post: post
                .as_ref()
                .map(|s| clone_stmt(s, next, max_depth).map(Box::new))
                .transpose()?,
            body: clone_block(body, next, max_depth)?,
        },
        Stmt::Range {
            key,
            value,
            expr,
            body,
        } => Stmt::Range {
            key: key.clone(),
            value: value.clone(),
            expr: clone_expr(expr, next, max_depth)?,
            body: clone_block(body, next, max_depth)?,
        },
        Stmt::Switch { tag, cases } => Stmt::Switch {
            tag: tag.as_ref().map(|e| clone_expr(e, next, max_depth)).transpose()?,
            cases: cases
                .iter()
                .map(|c| {
                    Ok(crate::stmt::SwitchCase {
                        values: c
                            .values
                            .iter()
                            .map(|e| clone_expr(e, next, max_depth))
                            .collect::<Result<_>>()?,
                        body: clone_block(&c.body, next, max_depth)?,
                    })
                })
                .collect::<Result<_>>()?,
        },
        Stmt::Return(vals) => Stmt::Return(
            vals.iter()
                .map(|e| clone_expr(e, next, max_depth))
                .collect::<Result<_>>()?,
        ),
        Stmt::Block(b) => Stmt::Block(clone_block(b, next, max_depth)?),
    })
}

fn clone_expr(expr: &Expr, depth: u32, max_depth: u32) -> Result<Expr> {
    if depth > max_depth {
        bail!("clone recursion exceeded depth {max_depth}");
    }
    let next = depth + 1;
    Ok(match expr {
        Expr::Ident(_) | Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::Str(_) => {
            expr.clone()
        }
        Expr::Selector { base, field } => Expr::Selector {
            base: Box::new(clone_expr(base, next, max_depth)?),
            field: field.clone(),
        },
        Expr::Index { base, index } => Expr::Index {
            base: Box::new(clone_expr(base, next, max_depth)?),
            index: Box::new(clone_expr(index, next, max_depth)?),
        },
        Expr::Slice { base, low, high } => Expr::Slice {
            base: Box::new(clone_expr(base, next, max_depth)?),
            low: low
                .as_ref()
                .map(|e| clone_expr(e, next, max_depth).map(Box::new))
                .transpose()?,
            high: high
                .as_ref()
                .map(|e| clone_expr(e, next, max_depth).map(Box::new))
                .transpose()?,
        },
        Expr::Call {
            callee,
            type_args,
            args,
        } => Expr::Call {
            callee: Box::new(clone_expr(callee, next, max_depth)?),
            type_args: type_args.clone(),
            args: args
                .iter()
                .map(|e| clone_expr(e, next, max_depth))
                .collect::<Result<_>>()?,
        },
        Expr::Unary { op, expr } => Expr::Unary {
            op: *op,
            expr: Box::new(clone_expr(expr, next, max_depth)?),
        },
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op: *op,
            lhs: Box::new(clone_expr(lhs, next, max_depth)?),
            rhs: Box::new(clone_expr(rhs, next, max_depth)?),
        },
        Expr::Paren(e) => Expr::Paren(Box::new(clone_expr(e, next, max_depth)?)),
        Expr::Conversion { ty, expr } => Expr::Conversion {
            ty: ty.clone(),
            expr: Box::new(clone_expr(expr, next, max_depth)?),
        },
        Expr::StarCast { ty, expr } => Expr::StarCast {
            ty: ty.clone(),
            expr: Box::new(clone_expr(expr, next, max_depth)?),
        },
        Expr::CompositeLit { ty, elems } => Expr::CompositeLit {
            ty: ty.clone(),
            elems: elems
                .iter()
                .map(|e| clone_expr(e, next, max_depth))
                .collect::<Result<_>>()?,
        },
        Expr::KeyValue { key, value } => Expr::KeyValue {
            key: Box::new(clone_expr(key, next, max_depth)?),
            value: Box::new(clone_expr(value, next, max_depth)?),
        },
        Expr::AddrOf(e) => Expr::AddrOf(Box::new(clone_expr(e, next, max_depth)?)),
        Expr::Deref(e) => Expr::Deref(Box::new(clone_expr(e, next, max_depth)?)),
        Expr::FuncLit {
            params,
            results,
            body,
        } => Expr::FuncLit {
            params: params.clone(),
            results: results.clone(),
            body: clone_block(body, next, max_depth)?,
        },
    })
}

/// True if `expr` is `<base>.<field>(args...)` where `base` is the bare
/// identifier `prefix` — the shape every vocabulary call and every
/// `Base*`/helper call shares. Returns the field name and arguments on match.
pub fn as_selector_call<'a>(expr: &'a Expr, prefix: &str) -> Option<(&'a str, &'a [Expr])> {
    match expr {
        Expr::Call { callee, args, .. } => match callee.as_ref() {
            Expr::Selector { base, field } if base.as_ident() == Some(prefix) => {
                Some((field.as_str(), args.as_slice()))
            }
            _ => None,
        },
        _ => None,
    }
}

/// True if `expr` is a method call `<recv>.<name>(args...)` on an arbitrary
/// receiver expression (not necessarily a bare identifier).
pub fn as_method_call<'a>(expr: &'a Expr) -> Option<(&'a Expr, &'a str, &'a [Expr])> {
    match expr {
        Expr::Call { callee, args, .. } => match callee.as_ref() {
            Expr::Selector { base, field } => Some((base.as_ref(), field.as_str(), args.as_slice())),
            _ => None,
        },
        _ => None,
    }
}

/// True if `expr` is a bare call `<name>(args...)` (no selector) — the shape
/// of same-file helper calls and `Base*` callee references.
pub fn as_plain_call<'a>(expr: &'a Expr) -> Option<(&'a str, &'a [Expr])> {
    match expr {
        Expr::Call { callee, args, .. } => match callee.as_ref() {
            Expr::Ident(name) => Some((name.as_str(), args.as_slice())),
            _ => None,
        },
        _ => None,
    }
}

/// Recursively replaces every occurrence of identifier `from` with `to`
/// inside `expr`, leaving everything else structurally identical. Used by
/// the identifier resolver and by helper-inlining's parameter substitution.
pub fn substitute_ident(expr: &Expr, from: &str, to: &Expr) -> Expr {
    match expr {
        Expr::Ident(n) if n == from => to.clone(),
        Expr::Ident(_) | Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::Str(_) => {
            expr.clone()
        }
        Expr::Selector { base, field } => Expr::Selector {
            base: Box::new(substitute_ident(base, from, to)),
            field: field.clone(),
        },
        Expr::Index { base, index } => Expr::Index {
            base: Box::new(substitute_ident(base, from, to)),
            index: Box::new(substitute_ident(index, from, to)),
        },
        Expr::Slice { base, low, high } => Expr::Slice {
            base: Box::new(substitute_ident(base, from, to)),
            low: low.as_ref().map(|e| Box::new(substitute_ident(e, from, to))),
            high: high.as_ref().map(|e| Box::new(substitute_ident(e, from, to))),
        },
        Expr::Call {
            callee,
            type_args,
            args,
        } => Expr::Call {
            callee: Box::new(substitute_ident(callee, from, to)),
            type_args: type_args.clone(),
            args: args.iter().map(|a| substitute_ident(a, from, to)).collect(),
        },
        Expr::Unary { op, expr } => Expr::Unary {
            op: *op,
            expr: Box::new(substitute_ident(expr, from, to)),
        },
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op: *op,
            lhs: Box::new(substitute_ident(lhs, from, to)),
            rhs: Box::new(substitute_ident(rhs, from, to)),
        },
        Expr::Paren(e) => Expr::Paren(Box::new(substitute_ident(e, from, to))),
        Expr::Conversion { ty, expr } => Expr::Conversion {
            ty: ty.clone(),
            expr: Box::new(substitute_ident(expr, from, to)),
        },
        Expr::StarCast { ty, expr } => Expr::StarCast {
            ty: ty.clone(),
            expr: Box::new(substitute_ident(expr, from, to)),
        },
        Expr::CompositeLit { ty, elems } => Expr::CompositeLit {
            ty: ty.clone(),
            elems: elems.iter().map(|e| substitute_ident(e, from, to)).collect(),
        },
        Expr::KeyValue { key, value } => Expr::KeyValue {
            key: Box::new(substitute_ident(key, from, to)),
            value: Box::new(substitute_ident(value, from, to)),
        },
        Expr::AddrOf(e) => Expr::AddrOf(Box::new(substitute_ident(e, from, to))),
        Expr::Deref(e) => Expr::Deref(Box::new(substitute_ident(e, from, to))),
        Expr::FuncLit { params, results, body } => Expr::FuncLit {
            params: params.clone(),
            results: results.clone(),
            body: body.clone(),
        },
    }
}

/// Rewrites every `Expr` node in `block` bottom-up with `f`: children are
/// mapped first, then `f` is applied to the resulting node. Shared by every
/// pass that only needs to retarget expressions (identifier resolution,
/// blank-assignment folding, numeric-constant rewrite) without otherwise
/// restructuring statements — the passes that splice or replicate
/// statements (helper inlining, loop unrolling) still walk by hand.
pub fn map_block_exprs<F: FnMut(Expr) -> Expr>(block: Block, f: &mut F) -> Block {
    block
        .into_iter()
        .map(|node| StmtNode {
            line: node.line,
            node: map_stmt_exprs(node.node, f),
        })
        .collect()
}

fn map_stmt_exprs<F: FnMut(Expr) -> Expr>(stmt: Stmt, f: &mut F) -> Stmt {
    match stmt {
        Stmt::Expr(e) => Stmt::Expr(map_expr(e, f)),
        Stmt::Assign { lhs, op, rhs } => Stmt::Assign {
            lhs: lhs.into_iter().map(|e| map_expr(e, f)).collect(),
            op,
            rhs: rhs.into_iter().map(|e| map_expr(e, f)).collect(),
        },
        Stmt::VarDecl { name, ty, value } => Stmt::VarDecl {
            name,
            ty,
            value: value.map(|e| map_expr(e, f)),
        },
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => Stmt::If {
            cond: map_expr(cond, f),
            then_block: map_block_exprs(then_block, f),
            else_block: else_block.map(|b| map_block_exprs(b, f)),
        },
        Stmt::For {
            init,
            cond,
            post,
            body,
        } => Stmt::For {
            init: init.map(|s| Box::new(map_stmt_exprs(*s, f))),
            cond: cond.map(|e| map_expr(e, f)),
            post: post.map(|s| Box::new(map_stmt_exprs(*s, f))),
            body: map_block_exprs(body, f),
        },
        Stmt::Range {
            key,
            value,
            expr,
            body,
        } => Stmt::Range {
            key,
            value,
            expr: map_expr(expr, f),
            body: map_block_exprs(body, f),
        },
        Stmt::Switch { tag, cases } => Stmt::Switch {
            tag: tag.map(|e| map_expr(e, f)),
            cases: cases
                .into_iter()
                .map(|c| crate::stmt::SwitchCase {
                    values: c.values.into_iter().map(|e| map_expr(e, f)).collect(),
                    body: map_block_exprs(c.body, f),
                })
                .collect(),
        },
        Stmt::Return(vals) => Stmt::Return(vals.into_iter().map(|e| map_expr(e, f)).collect()),
        Stmt::Block(b) => Stmt::Block(map_block_exprs(b, f)),
    }
}

fn map_expr<F: FnMut(Expr) -> Expr>(expr: Expr, f: &mut F) -> Expr {
    let mapped = match expr {
        Expr::Ident(_) | Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::Str(_) => expr,
        Expr::Selector { base, field } => Expr::Selector {
            base: Box::new(map_expr(*base, f)),
            field,
        },
        Expr::Index { base, index } => Expr::Index {
            base: Box::new(map_expr(*base, f)),
            index: Box::new(map_expr(*index, f)),
        },
        Expr::Slice { base, low, high } => Expr::Slice {
            base: Box::new(map_expr(*base, f)),
            low: low.map(|e| Box::new(map_expr(*e, f))),
            high: high.map(|e| Box::new(map_expr(*e, f))),
        },
        Expr::Call {
            callee,
            type_args,
            args,
        } => Expr::Call {
            callee: Box::new(map_expr(*callee, f)),
            type_args,
            args: args.into_iter().map(|a| map_expr(a, f)).collect(),
        },
        Expr::Unary { op, expr } => Expr::Unary {
            op,
            expr: Box::new(map_expr(*expr, f)),
        },
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op,
            lhs: Box::new(map_expr(*lhs, f)),
            rhs: Box::new(map_expr(*rhs, f)),
        },
        Expr::Paren(e) => Expr::Paren(Box::new(map_expr(*e, f))),
        Expr::Conversion { ty, expr } => Expr::Conversion {
            ty,
            expr: Box::new(map_expr(*expr, f)),
        },
        Expr::StarCast { ty, expr } => Expr::StarCast {
            ty,
            expr: Box::new(map_expr(*expr, f)),
        },
        Expr::CompositeLit { ty, elems } => Expr::CompositeLit {
            ty,
            elems: elems.into_iter().map(|e| map_expr(e, f)).collect(),
        },
        Expr::KeyValue { key, value } => Expr::KeyValue {
            key: Box::new(map_expr(*key, f)),
            value: Box::new(map_expr(*value, f)),
        },
        Expr::AddrOf(e) => Expr::AddrOf(Box::new(map_expr(*e, f))),
        Expr::Deref(e) => Expr::Deref(Box::new(map_expr(*e, f))),
        Expr::FuncLit { params, results, body } => Expr::FuncLit {
            params,
            results,
            body: map_block_exprs(body, f),
        },
    };
    f(mapped)
}

/// Builds the left-associated sum `a[0] + a[1] + ... + a[n-1]` used by
/// reduction inlining's IIFE idiom (§4.6).
pub fn left_associated_sum(terms: Vec<Expr>) -> Expr {
    let mut iter = terms.into_iter();
    let first = iter.next().unwrap_or(Expr::Int(0));
    iter.fold(first, |acc, term| Expr::binary(BinaryOp::Add, acc, term))
}
