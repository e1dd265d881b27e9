//! The helper inliner (§4.5): every call to a same-file, non-`Base*`
//! helper is expanded in place via post-order substitution — a helper's
//! own body is first fully inlined (recursively, guarding against call
//! cycles) before it is spliced into its call site, so no helper's
//! expansion is ever computed twice and no nested helper call can blow up
//! the output exponentially.
//!
//! Inlining only recognizes a helper call in the two shapes base functions
//! actually use it in: the sole right-hand side of a `:=` define, or a
//! bare expression statement. Both shapes are exhaustively recursed into
//! nested `If`/`For`/`Range`/`Switch`/`Block` bodies.

use ahash::{AHashMap, AHashSet};

use simd_context::TransformContext;
use simd_diag::{Diagnostic, Diagnostics};
use simd_ir::tree::{as_plain_call, map_block_exprs};
use simd_ir::{Block, Expr, ParsedFunc, Stmt, StmtNode, is_base_name};
use simd_target::TargetDescriptor;

use crate::identifier_resolver;

pub fn inline_helpers(
    body: Block,
    parsed: &ParsedFunc,
    helpers: &AHashMap<String, ParsedFunc>,
    generic_half_precision: &AHashSet<String>,
    ctx: &mut TransformContext,
    td: &TargetDescriptor,
    hwy_call_names: &AHashSet<String>,
    diagnostics: &mut Diagnostics,
) -> Block {
    // Half-precision regime and the generic-set classification only change
    // how an operation *lowers* (§4.6), not whether a same-file helper gets
    // inlined; `td` is still threaded through so a spliced helper body can
    // run identifier resolution against the current element type.
    let _ = (generic_half_precision, hwy_call_names);
    let mut in_progress = AHashSet::new();
    in_progress.insert(parsed.name.clone());
    inline_block(body, helpers, ctx, td, &mut in_progress, diagnostics)
}

fn inline_block(
    block: Block,
    helpers: &AHashMap<String, ParsedFunc>,
    ctx: &mut TransformContext,
    td: &TargetDescriptor,
    in_progress: &mut AHashSet<String>,
    diagnostics: &mut Diagnostics,
) -> Block {
    let mut out = Block::new();
    for node in block {
        inline_stmt_node(node, helpers, ctx, td, in_progress, diagnostics, &mut out);
    }
    out
}

fn inline_stmt_node(
    node: StmtNode,
    helpers: &AHashMap<String, ParsedFunc>,
    ctx: &mut TransformContext,
    td: &TargetDescriptor,
    in_progress: &mut AHashSet<String>,
    diagnostics: &mut Diagnostics,
    out: &mut Block,
) {
    let line = node.line;
    match node.node {
        Stmt::Assign { lhs, op, rhs } if lhs.len() == 1 && rhs.len() == 1 => {
            if let Some(helper) = helper_callee(&rhs[0], helpers)
                && let Some(mut expanded) = expand_call(&rhs[0], helper, helpers, ctx, td, in_progress, diagnostics)
                && let Some(tail) = expanded.pop()
            {
                out.extend(expanded);
                if let Stmt::Return(mut vals) = tail.node
                    && vals.len() == 1
                {
                    out.push(StmtNode {
                        line,
                        node: Stmt::Assign { lhs, op, rhs: vec![vals.remove(0)] },
                    });
                    return;
                }
                diagnostics.push(Diagnostic::MalformedInput(
                    "helper inlined without a single-value trailing return".into(),
                ));
            }
            out.push(StmtNode { line, node: Stmt::Assign { lhs, op, rhs } });
        }
        Stmt::Expr(e) => {
            if let Some(helper) = helper_callee(&e, helpers)
                && let Some(expanded) = expand_call(&e, helper, helpers, ctx, td, in_progress, diagnostics)
            {
                for stmt in expanded {
                    if !matches!(stmt.node, Stmt::Return(_)) {
                        out.push(stmt);
                    }
                }
                return;
            }
            out.push(StmtNode { line, node: Stmt::Expr(e) });
        }
        Stmt::If { cond, then_block, else_block } => out.push(StmtNode {
            line,
            node: Stmt::If {
                cond,
                then_block: inline_block(then_block, helpers, ctx, td, in_progress, diagnostics),
                else_block: else_block.map(|b| inline_block(b, helpers, ctx, td, in_progress, diagnostics)),
            },
        }),
        Stmt::For { init, cond, post, body } => out.push(StmtNode {
            line,
            node: Stmt::For {
                init,
                cond,
                post,
                body: inline_block(body, helpers, ctx, td, in_progress, diagnostics),
            },
        }),
        Stmt::Range { key, value, expr, body } => out.push(StmtNode {
            line,
            node: Stmt::Range {
                key,
                value,
                expr,
                body: inline_block(body, helpers, ctx, td, in_progress, diagnostics),
            },
        }),
        Stmt::Switch { tag, cases } => out.push(StmtNode {
            line,
            node: Stmt::Switch {
                tag,
                cases: cases
                    .into_iter()
                    .map(|c| simd_ir::SwitchCase {
                        values: c.values,
                        body: inline_block(c.body, helpers, ctx, td, in_progress, diagnostics),
                    })
                    .collect(),
            },
        }),
        Stmt::Block(b) => out.push(StmtNode {
            line,
            node: Stmt::Block(inline_block(b, helpers, ctx, td, in_progress, diagnostics)),
        }),
        other => out.push(StmtNode { line, node: other }),
    }
}

fn helper_callee<'a>(expr: &Expr, helpers: &'a AHashMap<String, ParsedFunc>) -> Option<&'a ParsedFunc> {
    let (name, _) = as_plain_call(expr)?;
    if is_base_name(name) {
        return None;
    }
    helpers.get(name)
}

/// Expands one call site: substitutes parameters with the caller's actual
/// argument expressions, recursively inlines any helper calls the
/// helper's own body makes (post-order — the helper's expansion is
/// complete before it is handed back), then α-renames every local the
/// helper declares so it cannot collide with a same-named local at the
/// call site.
fn expand_call(
    call_expr: &Expr,
    helper: &ParsedFunc,
    helpers: &AHashMap<String, ParsedFunc>,
    ctx: &mut TransformContext,
    td: &TargetDescriptor,
    in_progress: &mut AHashSet<String>,
    diagnostics: &mut Diagnostics,
) -> Option<Block> {
    if in_progress.contains(&helper.name) {
        diagnostics.push(Diagnostic::MalformedInput(format!(
            "cyclic helper inlining detected at `{}`, leaving call site untouched",
            helper.name
        )));
        return None;
    }
    let (_, args) = as_plain_call(call_expr)?;

    let mut substitutions: AHashMap<String, Expr> = AHashMap::new();
    for (param, arg) in helper.params.iter().zip(args.iter()) {
        substitutions.insert(param.name.clone(), arg.clone());
    }

    in_progress.insert(helper.name.clone());
    let inlined_body = inline_block(helper.body.clone(), helpers, ctx, td, in_progress, diagnostics);
    in_progress.remove(&helper.name);

    let substituted = map_block_exprs(inlined_body, &mut |e| match &e {
        Expr::Ident(n) => substitutions.get(n).cloned().unwrap_or(e),
        _ => e,
    });

    // The helper's body may reference its own type parameter or a registry
    // constant; the one `resolve_identifiers` pass `lib.rs` runs happens
    // once, before inlining, over only the base function's body, so a
    // spliced-in helper body needs its own resolution pass before it leaves
    // this function.
    let substituted = identifier_resolver::resolve_identifiers(substituted, helper, td, ctx.element_type);

    let local_names = collect_local_names(&substituted);
    let suffix = ctx.next_inline_suffix();
    let renames: AHashMap<String, String> = local_names
        .into_iter()
        .map(|n| {
            let fresh = format!("{n}_{suffix}");
            (n, fresh)
        })
        .collect();
    Some(rename_locals(substituted, &renames))
}

pub(crate) fn collect_local_names(block: &Block) -> AHashSet<String> {
    let mut names = AHashSet::new();
    collect_local_names_block(block, &mut names);
    names
}

fn collect_local_names_block(block: &Block, names: &mut AHashSet<String>) {
    for node in block {
        collect_local_names_stmt(&node.node, names);
    }
}

fn collect_local_names_stmt(stmt: &Stmt, names: &mut AHashSet<String>) {
    match stmt {
        Stmt::Assign { lhs, op: simd_ir::AssignOp::Define, .. } => {
            for e in lhs {
                if let Some(n) = e.as_ident() {
                    names.insert(n.to_string());
                }
            }
        }
        Stmt::VarDecl { name, .. } => {
            names.insert(name.clone());
        }
        Stmt::If { then_block, else_block, .. } => {
            collect_local_names_block(then_block, names);
            if let Some(b) = else_block {
                collect_local_names_block(b, names);
            }
        }
        Stmt::For { init, body, .. } => {
            if let Some(init) = init {
                collect_local_names_stmt(init, names);
            }
            collect_local_names_block(body, names);
        }
        Stmt::Range { key, value, body, .. } => {
            if let Some(k) = key {
                names.insert(k.clone());
            }
            if let Some(v) = value {
                names.insert(v.clone());
            }
            collect_local_names_block(body, names);
        }
        Stmt::Switch { cases, .. } => {
            for c in cases {
                collect_local_names_block(&c.body, names);
            }
        }
        Stmt::Block(b) => collect_local_names_block(b, names),
        _ => {}
    }
}

pub(crate) fn rename_locals(block: Block, renames: &AHashMap<String, String>) -> Block {
    let renamed_idents = map_block_exprs(block, &mut |e| match &e {
        Expr::Ident(n) => renames.get(n).map(|fresh| Expr::ident(fresh.clone())).unwrap_or(e),
        _ => e,
    });
    rename_decl_names(renamed_idents, renames)
}

fn rename_decl_names(block: Block, renames: &AHashMap<String, String>) -> Block {
    block
        .into_iter()
        .map(|node| StmtNode {
            line: node.line,
            node: rename_decl_names_stmt(node.node, renames),
        })
        .collect()
}

fn rename_decl_names_stmt(stmt: Stmt, renames: &AHashMap<String, String>) -> Stmt {
    match stmt {
        Stmt::VarDecl { name, ty, value } => Stmt::VarDecl {
            name: renames.get(&name).cloned().unwrap_or(name),
            ty,
            value,
        },
        Stmt::If { cond, then_block, else_block } => Stmt::If {
            cond,
            then_block: rename_decl_names(then_block, renames),
            else_block: else_block.map(|b| rename_decl_names(b, renames)),
        },
        Stmt::For { init, cond, post, body } => Stmt::For {
            init: init.map(|s| Box::new(rename_decl_names_stmt(*s, renames))),
            cond,
            post,
            body: rename_decl_names(body, renames),
        },
        Stmt::Range { key, value, expr, body } => Stmt::Range {
            key: key.map(|k| renames.get(&k).cloned().unwrap_or(k)),
            value: value.map(|v| renames.get(&v).cloned().unwrap_or(v)),
            expr,
            body: rename_decl_names(body, renames),
        },
        Stmt::Switch { tag, cases } => Stmt::Switch {
            tag,
            cases: cases
                .into_iter()
                .map(|c| simd_ir::SwitchCase {
                    values: c.values,
                    body: rename_decl_names(c.body, renames),
                })
                .collect(),
        },
        Stmt::Block(b) => Stmt::Block(rename_decl_names(b, renames)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simd_ir::{BinaryOp, Param, TypeExpr};
    use simd_target::{ElementType, Target};

    fn clamp_helper() -> ParsedFunc {
        // func clampOne(x T) T { y := x; return y }
        ParsedFunc {
            name: "clampOne".into(),
            type_params: vec![],
            params: vec![Param::new("x", TypeExpr::named("T"))],
            results: vec![],
            body: vec![
                StmtNode::new(Stmt::define(Expr::ident("y"), Expr::ident("x"))),
                StmtNode::new(Stmt::returns(vec![Expr::ident("y")])),
            ],
            hwy_calls: vec![],
            loop_info: None,
            conditional_blocks: vec![],
        }
    }

    fn parsed_caller() -> ParsedFunc {
        ParsedFunc {
            name: "BaseClampAll".into(),
            type_params: vec![],
            params: vec![],
            results: vec![],
            body: vec![],
            hwy_calls: vec![],
            loop_info: None,
            conditional_blocks: vec![],
        }
    }

    #[test]
    fn helper_call_in_define_is_expanded_and_locals_renamed() {
        let mut ctx = TransformContext::new("BaseClampAll", Target::Avx2, ElementType::F32);
        let mut diags = Diagnostics::new();
        let mut helpers = AHashMap::new();
        helpers.insert("clampOne".to_string(), clamp_helper());
        let body: Block = vec![StmtNode::new(Stmt::define(
            Expr::ident("out"),
            Expr::call(Expr::ident("clampOne"), [], vec![Expr::ident("v")]),
        ))];
        let result = inline_helpers(
            body,
            &parsed_caller(),
            &helpers,
            &AHashSet::new(),
            &mut ctx,
            &TargetDescriptor::new(Target::Avx2),
            &AHashSet::new(),
            &mut diags,
        );
        assert_eq!(result.len(), 2);
        match &result[0].node {
            Stmt::Assign { lhs, rhs, .. } => {
                let renamed = lhs[0].as_ident().unwrap();
                assert!(renamed.starts_with("y_inl"));
                assert_eq!(rhs[0], Expr::ident("v"));
            }
            _ => panic!("expected define"),
        }
        match &result[1].node {
            Stmt::Assign { lhs, rhs, .. } => {
                assert_eq!(lhs[0], Expr::ident("out"));
                let renamed = rhs[0].as_ident().unwrap();
                assert!(renamed.starts_with("y_inl"));
            }
            _ => panic!("expected assignment carrying the return value"),
        }
    }

    #[test]
    fn base_prefixed_callee_is_never_treated_as_a_helper() {
        let mut ctx = TransformContext::new("BaseAdd", Target::Avx2, ElementType::F32);
        let mut diags = Diagnostics::new();
        let helpers = AHashMap::new();
        let body: Block = vec![StmtNode::new(Stmt::expr(Expr::call(
            Expr::ident("BaseHelper"),
            [],
            vec![Expr::ident("x")],
        )))];
        let result = inline_helpers(
            body.clone(),
            &parsed_caller(),
            &helpers,
            &AHashSet::new(),
            &mut ctx,
            &TargetDescriptor::new(Target::Avx2),
            &AHashSet::new(),
            &mut diags,
        );
        assert_eq!(result, body);
    }

    #[test]
    fn expression_statement_call_drops_trailing_return() {
        let mut ctx = TransformContext::new("BaseClampAll", Target::Neon, ElementType::F32);
        let mut diags = Diagnostics::new();
        let mut helpers = AHashMap::new();
        helpers.insert(
            "touch".to_string(),
            ParsedFunc {
                name: "touch".into(),
                type_params: vec![],
                params: vec![Param::new("x", TypeExpr::named("T"))],
                results: vec![],
                body: vec![
                    StmtNode::new(Stmt::expr(Expr::binary(BinaryOp::Add, Expr::ident("x"), Expr::Int(1)))),
                    StmtNode::new(Stmt::returns(vec![Expr::ident("x")])),
                ],
                hwy_calls: vec![],
                loop_info: None,
                conditional_blocks: vec![],
            },
        );
        let body: Block = vec![StmtNode::new(Stmt::expr(Expr::call(Expr::ident("touch"), [], vec![Expr::ident("v")])))];
        let result = inline_helpers(
            body,
            &parsed_caller(),
            &helpers,
            &AHashSet::new(),
            &mut ctx,
            &TargetDescriptor::new(Target::Neon),
            &AHashSet::new(),
            &mut diags,
        );
        assert_eq!(result.len(), 1);
        assert!(matches!(&result[0].node, Stmt::Expr(Expr::Binary { .. })));
    }

    #[test]
    fn helper_s_own_type_param_and_registry_constant_are_resolved_after_splicing() {
        let mut ctx = TransformContext::new("BaseClampAll", Target::Avx2, ElementType::F64);
        let mut diags = Diagnostics::new();
        let mut helpers = AHashMap::new();
        helpers.insert(
            "withBound".to_string(),
            ParsedFunc {
                name: "withBound".into(),
                type_params: vec![simd_ir::TypeParam::new("T", "any")],
                params: vec![Param::new("x", TypeExpr::named("T"))],
                results: vec![],
                body: vec![
                    StmtNode::new(Stmt::define(Expr::ident("cast"), Expr::ident("T"))),
                    StmtNode::new(Stmt::define(Expr::ident("bound"), Expr::ident("Epsilon"))),
                    StmtNode::new(Stmt::returns(vec![Expr::ident("x")])),
                ],
                hwy_calls: vec![],
                loop_info: None,
                conditional_blocks: vec![],
            },
        );
        let body: Block = vec![StmtNode::new(Stmt::define(
            Expr::ident("out"),
            Expr::call(Expr::ident("withBound"), [], vec![Expr::ident("v")]),
        ))];
        let result = inline_helpers(
            body,
            &parsed_caller(),
            &helpers,
            &AHashSet::new(),
            &mut ctx,
            &TargetDescriptor::new(Target::Avx2),
            &AHashSet::new(),
            &mut diags,
        );
        // `T` resolves to the element type's scalar name; `Epsilon` resolves
        // to its f64-suffixed registry name. Neither identifier survives
        // unresolved once spliced into the caller.
        let rhs_values: Vec<&Expr> = result
            .iter()
            .filter_map(|node| match &node.node {
                Stmt::Assign { rhs, .. } => rhs.first(),
                _ => None,
            })
            .collect();
        assert!(rhs_values.iter().any(|e| **e == Expr::ident("float64")));
        assert!(rhs_values.iter().any(|e| **e == Expr::ident("Epsilon_f64")));
        assert!(!rhs_values.iter().any(|e| **e == Expr::ident("T")));
        assert!(!rhs_values.iter().any(|e| **e == Expr::ident("Epsilon")));
    }
}
