//! The post-processors (§4.9): six small, independently testable rewrites
//! that run after loop transformation, in the fixed order the spec lists
//! them. Each operates on an already-lowered, already-unrolled body, so
//! none of them needs to consult the operation dispatch table again —
//! they pattern-match on the *shapes* earlier passes produce.

use ahash::AHashSet;

use simd_context::TransformContext;
use simd_diag::Diagnostics;
use simd_ir::tree::map_block_exprs;
use simd_ir::{AssignOp, BinaryOp, Block, Expr, ParsedFunc, Stmt, StmtNode, SwitchCase};
use simd_target::{ElementType, Target, TargetDescriptor};

use crate::lowerer;

/// Runs all six post-processors in the order §4.9 lists them. Reduction
/// inlining (step 4) is a second, idempotent pass over the same pass that
/// already ran once during operation lowering (§4.6) — by the time it gets
/// here there is ordinarily nothing left to inline, but a helper inlined
/// late (by the loop transformer's unrolling, which can duplicate a
/// reduction call across unrolled copies) can still carry one.
pub fn run_post_processors(
    body: Block,
    _parsed: &ParsedFunc,
    ctx: &mut TransformContext,
    td: &TargetDescriptor,
    hwy_call_names: &AHashSet<String>,
    _diagnostics: &mut Diagnostics,
) -> Block {
    let body = scalarize_trivial_fallback(body, ctx, td, hwy_call_names);
    let body = fold_blank_assignments(body);
    let body = rewrite_numeric_constants(body, ctx, td);
    let body = lowerer::inline_reductions(body, ctx, td);
    let body = fixup_stack_array_slices(body, ctx);
    lower_half_precision_scalar_tail(body, ctx)
}

// ---------------------------------------------------------------------
// 1. Scalarize trivial fallback (§4.9 item 1)
// ---------------------------------------------------------------------

/// Vocabulary names the fallback target is allowed to scalarize away
/// entirely. A function using anything outside this set (a compare, a
/// select, a transcendental) keeps its backend calls on `Fallback` too —
/// scalarization only fires for "pure arithmetic" bodies (§4.9 item 1).
const PURE_ARITHMETIC_OPS: &[&str] = &[
    "Load", "Store", "Broadcast", "Set", "Zero", "Add", "Sub", "Mul", "Div", "MulAdd", "Neg", "Abs", "Min", "Max",
];

fn is_scalarization_eligible(target: Target, element_type: ElementType, hwy_call_names: &AHashSet<String>) -> bool {
    target == Target::Fallback
        && !element_type.is_half_precision()
        && hwy_call_names.iter().all(|name| PURE_ARITHMETIC_OPS.contains(&name.as_str()))
}

/// Only on the fallback target, and only for the "pure arithmetic" subset
/// above: broadcasts become plain values, vector method calls become
/// scalar operators, and the one-lane `Load`/`Store` wrappers become a
/// bare index and an assignment.
pub fn scalarize_trivial_fallback(
    body: Block,
    ctx: &TransformContext,
    td: &TargetDescriptor,
    hwy_call_names: &AHashSet<String>,
) -> Block {
    if !is_scalarization_eligible(td.target(), ctx.element_type, hwy_call_names) {
        return body;
    }
    let element_type = ctx.element_type;
    let exprs_scalarized = map_block_exprs(body, &mut |e| scalarize_expr(e, td, element_type));
    map_block_stmts(exprs_scalarized, &mut |s| scalarize_store_stmt(s, td))
}

fn scalarize_expr(e: Expr, td: &TargetDescriptor, element_type: ElementType) -> Expr {
    let pkg = td.backend_package();
    let Expr::Call { callee, args, .. } = e else { return e };
    match *callee {
        Expr::Selector { base, field } if base.as_ident() == Some(pkg) => {
            if field.starts_with("Load") && field.ends_with("Slice") {
                slice_to_index(one_arg(args))
            } else if field.starts_with("Broadcast") {
                one_arg(args)
            } else if field.starts_with("Zero") {
                zero_literal(element_type)
            } else {
                Expr::call(Expr::selector(Expr::ident(pkg), field), [], args)
            }
        }
        Expr::Selector { base, field } => match field.as_str() {
            "Add" => Expr::binary(BinaryOp::Add, *base, one_arg(args)),
            "Sub" => Expr::binary(BinaryOp::Sub, *base, one_arg(args)),
            "Mul" => Expr::binary(BinaryOp::Mul, *base, one_arg(args)),
            "Div" => Expr::binary(BinaryOp::Div, *base, one_arg(args)),
            "MulAdd" => {
                let mut it = args.into_iter();
                let mul_by = it.next().unwrap_or(Expr::Int(0));
                let add_to = it.next().unwrap_or(Expr::Int(0));
                Expr::binary(BinaryOp::Add, Expr::binary(BinaryOp::Mul, *base, mul_by), add_to)
            }
            "Max" => Expr::call(Expr::ident("max"), [], vec![*base, one_arg(args)]),
            "Min" => Expr::call(Expr::ident("min"), [], vec![*base, one_arg(args)]),
            _ => Expr::call(Expr::selector(*base, field), [], args),
        },
        other => Expr::call(other, [], args),
    }
}

fn one_arg(args: Vec<Expr>) -> Expr {
    args.into_iter().next().unwrap_or(Expr::Int(0))
}

fn slice_to_index(expr: Expr) -> Expr {
    match expr {
        Expr::Slice { base, low, high: None } => Expr::Index {
            base,
            index: low.unwrap_or_else(|| Box::new(Expr::Int(0))),
        },
        other => other,
    }
}

fn zero_literal(element_type: ElementType) -> Expr {
    if matches!(
        element_type,
        ElementType::F32 | ElementType::F64 | ElementType::F16 | ElementType::Bf16
    ) {
        Expr::Float(0.0)
    } else {
        Expr::Int(0)
    }
}

/// `archsimd.Store<Type>Slice(value, dst[i:])`, a statement in its own
/// right rather than a nested expression, becomes `dst[i] = value`.
fn scalarize_store_stmt(stmt: Stmt, td: &TargetDescriptor) -> Stmt {
    let Stmt::Expr(Expr::Call { callee, args, .. }) = &stmt else { return stmt };
    let Expr::Selector { base, field } = callee.as_ref() else { return stmt };
    if base.as_ident() != Some(td.backend_package()) || !field.starts_with("Store") || !field.ends_with("Slice") || args.len() != 2 {
        return stmt;
    }
    let Expr::Slice { base: dst, low, high: None } = &args[1] else { return stmt };
    Stmt::Assign {
        lhs: vec![Expr::Index {
            base: dst.clone(),
            index: low.clone().unwrap_or_else(|| Box::new(Expr::Int(0))),
        }],
        op: AssignOp::Assign,
        rhs: vec![args[0].clone()],
    }
}

// ---------------------------------------------------------------------
// 2. Blank-assignment folding (§4.9 item 2)
// ---------------------------------------------------------------------

/// `_ = f(...)` whose right-hand side is a void-returning in-place call
/// (the accumulator rewrite's output shape, §4.6) becomes `f(...)`. A
/// bounds-check hint `_ = slice[i]` has an `Index` right-hand side, not a
/// `Call`, and is left untouched.
pub fn fold_blank_assignments(body: Block) -> Block {
    map_block_stmts(body, &mut |stmt| match stmt {
        Stmt::Assign { lhs, op: AssignOp::Assign, rhs }
            if lhs.len() == 1 && rhs.len() == 1 && lhs[0].as_ident() == Some("_") && matches!(rhs[0], Expr::Call { .. }) =>
        {
            Stmt::Expr(rhs.into_iter().next().expect("len checked above"))
        }
        other => other,
    })
}

// ---------------------------------------------------------------------
// 3. Numeric-constant rewrite (§4.9 item 3)
// ---------------------------------------------------------------------

fn is_lane_query(name: &str) -> bool {
    matches!(name, "NumLanes" | "NumElements")
}

/// `NumLanes()`/`NumElements()` calls are replaced with the compile-time
/// lane count of the *receiver's* inferred vector element type, falling
/// back to the function's element type when the receiver is unknown or
/// has no recorded inference (§4.9 item 3).
pub fn rewrite_numeric_constants(body: Block, ctx: &TransformContext, td: &TargetDescriptor) -> Block {
    map_block_exprs(body, &mut |e| {
        let Expr::Call { callee, args, .. } = &e else { return e };
        if !args.is_empty() {
            return e;
        }
        let receiver = match callee.as_ref() {
            Expr::Selector { base, field } if is_lane_query(field) => Some(base.as_ref()),
            Expr::Ident(name) if is_lane_query(name) => None,
            _ => return e,
        };
        let default = td.lanes_for(ctx.element_type);
        let lanes = match receiver.and_then(Expr::as_ident) {
            Some(var) => ctx.lanes_for_var_or_default(var, default),
            None => default,
        };
        Expr::Int(lanes as i64)
    })
}

// ---------------------------------------------------------------------
// 5. Stack-array slice fix-up (§4.9 item 5)
// ---------------------------------------------------------------------

/// An argument that is a bare reference to a variable declared as `[N]T`
/// on the stack (tracked by the context builder in `ctx.stack_array_vars`,
/// §4.3) becomes `x[:]` at the call site — the shape a slice-typed
/// parameter (`Store`, a helper, the reduction IIFE's own buffer) needs.
pub fn fixup_stack_array_slices(body: Block, ctx: &TransformContext) -> Block {
    map_block_exprs(body, &mut |e| {
        let Expr::Call { callee, type_args, args } = e else { return e };
        let args = args
            .into_iter()
            .map(|a| match a.as_ident() {
                Some(name) if ctx.stack_array_vars.contains(name) => Expr::slice_full(Expr::ident(name)),
                _ => a,
            })
            .collect();
        Expr::Call { callee, type_args, args }
    })
}

// ---------------------------------------------------------------------
// 6. Half-precision scalar tail lowering (§4.9 item 6)
// ---------------------------------------------------------------------

/// On every target's scalar tail path, binary arithmetic and comparisons
/// whose operands include a half-precision scalar (or a half-precision
/// slice element) are rewritten to an explicit convert-to-f32, operate,
/// convert-back sequence: every half-precision leaf in the operator
/// subtree is converted once, the operator itself runs natively in f32
/// (custom half-precision types carry no operators of their own), and the
/// whole result is converted back — except for comparisons, which already
/// produce a `bool` and need no convert-back.
pub fn lower_half_precision_scalar_tail(body: Block, ctx: &TransformContext) -> Block {
    if !ctx.element_type.is_half_precision() {
        return body;
    }
    lower_hp_block(body, ctx)
}

fn lower_hp_block(block: Block, ctx: &TransformContext) -> Block {
    block
        .into_iter()
        .map(|node| StmtNode {
            line: node.line,
            node: lower_hp_stmt(node.node, ctx),
        })
        .collect()
}

fn lower_hp_stmt(stmt: Stmt, ctx: &TransformContext) -> Stmt {
    match stmt {
        Stmt::Expr(e) => Stmt::Expr(lower_hp_expr(e, ctx)),
        Stmt::Assign { lhs, op, rhs } => Stmt::Assign {
            lhs: lhs.into_iter().map(|e| lower_hp_expr(e, ctx)).collect(),
            op,
            rhs: rhs.into_iter().map(|e| lower_hp_expr(e, ctx)).collect(),
        },
        Stmt::VarDecl { name, ty, value } => Stmt::VarDecl {
            name,
            ty,
            value: value.map(|e| lower_hp_expr(e, ctx)),
        },
        Stmt::If { cond, then_block, else_block } => Stmt::If {
            cond: lower_hp_expr(cond, ctx),
            then_block: lower_hp_block(then_block, ctx),
            else_block: else_block.map(|b| lower_hp_block(b, ctx)),
        },
        Stmt::For { init, cond, post, body } => Stmt::For {
            init: init.map(|s| Box::new(lower_hp_stmt(*s, ctx))),
            cond: cond.map(|e| lower_hp_expr(e, ctx)),
            post: post.map(|s| Box::new(lower_hp_stmt(*s, ctx))),
            body: lower_hp_block(body, ctx),
        },
        Stmt::Range { key, value, expr, body } => Stmt::Range {
            key,
            value,
            expr: lower_hp_expr(expr, ctx),
            body: lower_hp_block(body, ctx),
        },
        Stmt::Switch { tag, cases } => Stmt::Switch {
            tag: tag.map(|e| lower_hp_expr(e, ctx)),
            cases: cases
                .into_iter()
                .map(|c| SwitchCase {
                    values: c.values.into_iter().map(|e| lower_hp_expr(e, ctx)).collect(),
                    body: lower_hp_block(c.body, ctx),
                })
                .collect(),
        },
        Stmt::Return(vals) => Stmt::Return(vals.into_iter().map(|e| lower_hp_expr(e, ctx)).collect()),
        Stmt::Block(b) => Stmt::Block(lower_hp_block(b, ctx)),
    }
}

fn lower_hp_expr(e: Expr, ctx: &TransformContext) -> Expr {
    match e {
        Expr::Binary { op, lhs, rhs } => {
            if contains_hp_leaf(&lhs, ctx) || contains_hp_leaf(&rhs, ctx) {
                let converted = Expr::Binary {
                    op,
                    lhs: Box::new(substitute_hp_leaves(*lhs, ctx)),
                    rhs: Box::new(substitute_hp_leaves(*rhs, ctx)),
                };
                if is_comparison(op) { converted } else { from_f32_conversion(converted, ctx.element_type) }
            } else {
                Expr::Binary {
                    op,
                    lhs: Box::new(lower_hp_expr(*lhs, ctx)),
                    rhs: Box::new(lower_hp_expr(*rhs, ctx)),
                }
            }
        }
        Expr::Unary { op, expr } if contains_hp_leaf(&expr, ctx) => {
            let converted = Expr::Unary {
                op,
                expr: Box::new(substitute_hp_leaves(*expr, ctx)),
            };
            from_f32_conversion(converted, ctx.element_type)
        }
        Expr::Unary { op, expr } => Expr::Unary {
            op,
            expr: Box::new(lower_hp_expr(*expr, ctx)),
        },
        Expr::Call { callee, type_args, args } => Expr::Call {
            callee: Box::new(lower_hp_expr(*callee, ctx)),
            type_args,
            args: args.into_iter().map(|a| lower_hp_expr(a, ctx)).collect(),
        },
        Expr::Selector { base, field } => Expr::Selector {
            base: Box::new(lower_hp_expr(*base, ctx)),
            field,
        },
        Expr::Index { base, index } => Expr::Index {
            base: Box::new(lower_hp_expr(*base, ctx)),
            index: Box::new(lower_hp_expr(*index, ctx)),
        },
        Expr::Paren(e) => Expr::Paren(Box::new(lower_hp_expr(*e, ctx))),
        other => other,
    }
}

/// Whether `expr` is (or contains, through the operator tree) a
/// half-precision scalar leaf: a scalar variable tracked in
/// `ctx.half_precision_scalar_vars`, or an index into a half-precision
/// slice tracked in `ctx.half_precision_slice_vars`.
fn contains_hp_leaf(expr: &Expr, ctx: &TransformContext) -> bool {
    match expr {
        Expr::Ident(name) => ctx.half_precision_scalar_vars.contains(name),
        Expr::Index { base, .. } => base.as_ident().map(|n| ctx.half_precision_slice_vars.contains(n)).unwrap_or(false),
        Expr::Binary { lhs, rhs, .. } => contains_hp_leaf(lhs, ctx) || contains_hp_leaf(rhs, ctx),
        Expr::Unary { expr, .. } => contains_hp_leaf(expr, ctx),
        Expr::Paren(e) => contains_hp_leaf(e, ctx),
        _ => false,
    }
}

/// Replaces every half-precision leaf found by `contains_hp_leaf` with its
/// f32 conversion, recursing through the operator tree but leaving
/// anything that is already a plain f32 operand (a literal, an unrelated
/// variable) alone.
fn substitute_hp_leaves(expr: Expr, ctx: &TransformContext) -> Expr {
    match expr {
        Expr::Ident(name) if ctx.half_precision_scalar_vars.contains(&name) => to_f32_conversion(Expr::Ident(name), ctx.element_type),
        Expr::Index { base, index } if base.as_ident().map(|n| ctx.half_precision_slice_vars.contains(n)).unwrap_or(false) => {
            to_f32_conversion(Expr::Index { base, index }, ctx.element_type)
        }
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op,
            lhs: Box::new(substitute_hp_leaves(*lhs, ctx)),
            rhs: Box::new(substitute_hp_leaves(*rhs, ctx)),
        },
        Expr::Unary { op, expr } => Expr::Unary {
            op,
            expr: Box::new(substitute_hp_leaves(*expr, ctx)),
        },
        Expr::Paren(e) => Expr::Paren(Box::new(substitute_hp_leaves(*e, ctx))),
        other => other,
    }
}

fn is_comparison(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
    )
}

/// The host-scalar conversion helper package (§4.6 item 1, "native NEON":
/// "wrap constant broadcasts with an integer cast and a host-scalar
/// conversion helper") — named after the same package `scalar_type_name`
/// qualifies the type with, so `float16.Float16` pairs with
/// `float16.ToFloat32`/`float16.FromFloat32`.
fn hp_package(element_type: ElementType) -> &'static str {
    match element_type {
        ElementType::F16 => "float16",
        ElementType::Bf16 => "bfloat16",
        _ => unreachable!("only called for half-precision element types"),
    }
}

fn to_f32_conversion(expr: Expr, element_type: ElementType) -> Expr {
    Expr::call(Expr::selector(Expr::ident(hp_package(element_type)), "ToFloat32"), [], vec![expr])
}

fn from_f32_conversion(expr: Expr, element_type: ElementType) -> Expr {
    Expr::call(Expr::selector(Expr::ident(hp_package(element_type)), "FromFloat32"), [], vec![expr])
}

// ---------------------------------------------------------------------
// Shared statement-level mapper (post-order, mirrors `tree::map_block_exprs`
// but rewrites whole statements rather than only the expressions inside
// them — needed by scalarization's Store-to-assignment conversion and by
// blank-assignment folding).
// ---------------------------------------------------------------------

fn map_block_stmts<F: FnMut(Stmt) -> Stmt>(block: Block, f: &mut F) -> Block {
    block
        .into_iter()
        .map(|node| StmtNode {
            line: node.line,
            node: map_stmt(node.node, f),
        })
        .collect()
}

fn map_stmt<F: FnMut(Stmt) -> Stmt>(stmt: Stmt, f: &mut F) -> Stmt {
    let recursed = match stmt {
        Stmt::If { cond, then_block, else_block } => Stmt::If {
            cond,
            then_block: map_block_stmts(then_block, f),
            else_block: else_block.map(|b| map_block_stmts(b, f)),
        },
        Stmt::For { init, cond, post, body } => Stmt::For {
            init: init.map(|s| Box::new(map_stmt(*s, f))),
            cond,
            post: post.map(|s| Box::new(map_stmt(*s, f))),
            body: map_block_stmts(body, f),
        },
        Stmt::Range { key, value, expr, body } => Stmt::Range {
            key,
            value,
            expr,
            body: map_block_stmts(body, f),
        },
        Stmt::Switch { tag, cases } => Stmt::Switch {
            tag,
            cases: cases
                .into_iter()
                .map(|c| SwitchCase {
                    values: c.values,
                    body: map_block_stmts(c.body, f),
                })
                .collect(),
        },
        Stmt::Block(b) => Stmt::Block(map_block_stmts(b, f)),
        other => other,
    };
    f(recursed)
}
