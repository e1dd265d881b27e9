//! The loop transformer and unroll-with-cleanup pass (§4.8): rewrites the
//! main SIMD loop's stride/condition to the target's concrete lane count,
//! picks an unroll factor from the operations the loop body contains,
//! replicates the body that many times, and attaches a cleanup loop plus
//! scalar-tail handling so the function still covers every element.
//!
//! The main loop is located by matching [`LoopInfo::iterator`] against a
//! `for` statement's init or condition (§3 "Invariant: if present, exactly
//! one loop in the body is 'the main SIMD loop'"); every other loop shape
//! (scalar tail loops, nested nothing-to-do-with-SIMD loops) is left
//! untouched, matching §4.8 "Scalar tail loops ... are left alone".
//!
//! The unroll-factor heuristic classifies the *original*, pre-lowering
//! vocabulary calls in the main loop's body (located independently in
//! `parsed.body`) rather than the already-lowered body this pass receives
//! — lowering renames free-function constructors (`Load` -> `LoadFloat32x8Slice`)
//! and collapses synthesized ops to their identity's backend names, so only
//! the original vocabulary names classify the way §4.8's table describes.

use simd_ir::tree::map_block_exprs;
use simd_ir::{AssignOp, BinaryOp, Block, Expr, LoopInfo, ParsedFunc, Stmt, StmtNode, TypeExpr, UnrollHint};
use simd_target::{OpComplexity, Target, TargetDescriptor, op_complexity};

use crate::naming;
use simd_context::TransformContext;

/// Top-level entry point: finds `loop_info`'s loop inside `body` and
/// rewrites it in place, appending cleanup/tail statements immediately
/// after it. Bodies with no matching loop pass through unchanged — a
/// caller only invokes this when `parsed.loop_info` is `Some`, but a
/// malformed `LoopInfo` (§3 invariant violated by the front end) degrades
/// to a no-op rather than a panic.
pub fn transform_loop(
    body: Block,
    parsed: &ParsedFunc,
    loop_info: &LoopInfo,
    ctx: &TransformContext,
    td: &TargetDescriptor,
) -> Block {
    let factor = find_loop_body(&parsed.body, &loop_info.iterator)
        .map(|original| unroll_factor(original, td.target(), loop_info.unroll_hint))
        .unwrap_or(1);
    let mut found = false;
    rewrite_block(body, parsed, loop_info, ctx, td, factor, &mut found)
}

fn rewrite_block(
    block: Block,
    parsed: &ParsedFunc,
    loop_info: &LoopInfo,
    ctx: &TransformContext,
    td: &TargetDescriptor,
    factor: u32,
    found: &mut bool,
) -> Block {
    let mut out = Block::new();
    let mut iter = block.into_iter().peekable();
    while let Some(node) = iter.next() {
        if !*found && is_main_loop(&node.node, &loop_info.iterator) {
            *found = true;
            let next_sibling = iter.peek().map(|n| &n.node);
            let mut expanded = expand_main_loop(node, parsed, loop_info, ctx, td, factor, next_sibling);
            // The scalar tail loop, if one follows and qualifies for
            // dropping (§4.8 "Tail handling"), is consumed here so it
            // never reaches `out`.
            if expanded.drop_next_sibling && iter.peek().is_some() {
                iter.next();
            }
            out.append(&mut expanded.statements);
            continue;
        }
        out.push(StmtNode {
            line: node.line,
            node: rewrite_stmt(node.node, parsed, loop_info, ctx, td, factor, found),
        });
    }
    out
}

fn rewrite_stmt(
    stmt: Stmt,
    parsed: &ParsedFunc,
    loop_info: &LoopInfo,
    ctx: &TransformContext,
    td: &TargetDescriptor,
    factor: u32,
    found: &mut bool,
) -> Stmt {
    match stmt {
        Stmt::If { cond, then_block, else_block } => Stmt::If {
            cond,
            then_block: rewrite_block(then_block, parsed, loop_info, ctx, td, factor, found),
            else_block: else_block.map(|b| rewrite_block(b, parsed, loop_info, ctx, td, factor, found)),
        },
        Stmt::For { init, cond, post, body } => Stmt::For {
            init,
            cond,
            post,
            body: rewrite_block(body, parsed, loop_info, ctx, td, factor, found),
        },
        Stmt::Range { key, value, expr, body } => Stmt::Range {
            key,
            value,
            expr,
            body: rewrite_block(body, parsed, loop_info, ctx, td, factor, found),
        },
        Stmt::Switch { tag, cases } => Stmt::Switch {
            tag,
            cases: cases
                .into_iter()
                .map(|c| simd_ir::SwitchCase {
                    values: c.values,
                    body: rewrite_block(c.body, parsed, loop_info, ctx, td, factor, found),
                })
                .collect(),
        },
        Stmt::Block(b) => Stmt::Block(rewrite_block(b, parsed, loop_info, ctx, td, factor, found)),
        other => other,
    }
}

fn is_main_loop(stmt: &Stmt, iterator: &str) -> bool {
    let Stmt::For { init, cond, .. } = stmt else { return false };
    let init_matches = matches!(
        init.as_deref(),
        Some(Stmt::Assign { lhs, op: AssignOp::Define, .. })
            if lhs.first().and_then(Expr::as_ident) == Some(iterator)
    );
    let cond_matches = cond.as_ref().map(|c| cond_lhs_is_iterator(c, iterator)).unwrap_or(false);
    init_matches || cond_matches
}

fn cond_lhs_is_iterator(cond: &Expr, iterator: &str) -> bool {
    match cond {
        Expr::Binary { lhs, .. } => lhs.as_ref().as_ident() == Some(iterator),
        _ => false,
    }
}

/// Finds the innermost `for` statement matching `iterator` anywhere in
/// `block`, returning its own body (the statements to classify and, later,
/// to replicate) — used to classify the *original* vocabulary calls before
/// any lowering has touched them.
fn find_loop_body<'a>(block: &'a Block, iterator: &str) -> Option<&'a Block> {
    for node in block {
        if is_main_loop(&node.node, iterator)
            && let Stmt::For { body, .. } = &node.node
        {
            return Some(body);
        }
        if let Some(found) = find_loop_body_in_stmt(&node.node, iterator) {
            return Some(found);
        }
    }
    None
}

fn find_loop_body_in_stmt<'a>(stmt: &'a Stmt, iterator: &str) -> Option<&'a Block> {
    match stmt {
        Stmt::If { then_block, else_block, .. } => {
            find_loop_body(then_block, iterator).or_else(|| else_block.as_ref().and_then(|b| find_loop_body(b, iterator)))
        }
        Stmt::For { body, .. } => find_loop_body(body, iterator),
        Stmt::Range { body, .. } => find_loop_body(body, iterator),
        Stmt::Switch { cases, .. } => cases.iter().find_map(|c| find_loop_body(&c.body, iterator)),
        Stmt::Block(b) => find_loop_body(b, iterator),
        _ => None,
    }
}

struct Expansion {
    statements: Block,
    drop_next_sibling: bool,
}

/// Rewrites the located main loop into: the stride/condition-rewritten,
/// unrolled loop; an optional cleanup loop (unroll factor > 1); and an
/// optional scalar-tail `if` calling the fallback specialization
/// (functions with no return value, §4.8 "Tail handling"). Also decides
/// whether a scalar tail loop already following the main loop in source
/// should be dropped in favor of the synthesized fallback call.
fn expand_main_loop(
    main_for: StmtNode,
    parsed: &ParsedFunc,
    loop_info: &LoopInfo,
    ctx: &TransformContext,
    td: &TargetDescriptor,
    factor: u32,
    next_sibling: Option<&Stmt>,
) -> Expansion {
    let Stmt::For { init, cond, body, .. } = main_for.node else {
        unreachable!("is_main_loop only matches Stmt::For")
    };
    let iterator = loop_info.iterator.as_str();

    let lanes = td.lanes_for(ctx.element_type);
    let bound_expr = cond.as_ref().and_then(extract_bound).cloned();

    let mut statements = Block::new();

    let iterator_hoisted =
        matches!(init.as_deref(), Some(Stmt::Assign { lhs, op: AssignOp::Define, .. }) if lhs.first().and_then(Expr::as_ident) == Some(iterator));
    if iterator_hoisted
        && let Some(Stmt::Assign { rhs, .. }) = init.as_deref()
    {
        statements.push(StmtNode::new(Stmt::VarDecl {
            name: iterator.to_string(),
            ty: None,
            value: rhs.first().cloned(),
        }));
    }

    let stride = lanes * factor;
    let new_cond = bound_expr.clone().map(|bound| {
        Expr::binary(
            BinaryOp::Le,
            Expr::binary(BinaryOp::Add, Expr::ident(iterator), Expr::Int(stride as i64)),
            bound,
        )
    });
    let new_post = Some(Box::new(Stmt::Assign {
        lhs: vec![Expr::ident(iterator)],
        op: AssignOp::AddAssign,
        rhs: vec![Expr::Int(stride as i64)],
    }));
    let new_init = if iterator_hoisted { None } else { init };

    let unrolled_body = unroll_body(&body, iterator, lanes, factor);
    statements.push(StmtNode {
        line: main_for.line,
        node: Stmt::For { init: new_init, cond: new_cond, post: new_post, body: unrolled_body },
    });

    if factor > 1 {
        statements.push(StmtNode::new(cleanup_loop(&body, iterator, lanes, bound_expr.clone())));
    }

    let mut drop_next_sibling = false;
    if parsed.results.is_empty()
        && let Some(bound) = bound_expr
    {
        let fallback_td = TargetDescriptor::new(Target::Fallback);
        let fallback_name =
            naming::specialized_function_name(&parsed.name, &fallback_td, ctx.element_type, !parsed.type_params.is_empty());
        let args = fallback_call_args(parsed, iterator);
        statements.push(StmtNode::new(Stmt::If {
            cond: Expr::binary(BinaryOp::Lt, Expr::ident(iterator), bound),
            then_block: vec![StmtNode::new(Stmt::expr(Expr::call(Expr::ident(fallback_name), [], args)))],
            else_block: None,
        }));

        if let Some(tail) = next_sibling
            && is_droppable_scalar_tail(tail, iterator)
        {
            drop_next_sibling = true;
        }
    }

    Expansion { statements, drop_next_sibling }
}

/// The bound expression out of a `i < n` / `i <= n` condition — the
/// right-hand side the rewritten condition re-uses and the fallback's
/// scalar-tail guard compares against.
fn extract_bound(cond: &Expr) -> Option<&Expr> {
    match cond {
        Expr::Binary { op: BinaryOp::Lt | BinaryOp::Le, rhs, .. } => Some(rhs.as_ref()),
        _ => None,
    }
}

fn fallback_call_args(parsed: &ParsedFunc, iterator: &str) -> Vec<Expr> {
    parsed
        .params
        .iter()
        .map(|p| match &p.ty {
            TypeExpr::Slice(_) => Expr::slice_from(Expr::ident(p.name.as_str()), Expr::ident(iterator)),
            _ => Expr::ident(p.name.as_str()),
        })
        .collect()
}

/// §4.8 "Unroll factor": classifies every call in the loop body, takes the
/// factor of the most conservative (smallest-factor) class present,
/// applies the AVX-512 bonus and the NEON cap, then lets an explicit hint
/// override the computed value. Fallback never unrolls regardless of hint.
fn unroll_factor(original_body: &Block, target: Target, hint: UnrollHint) -> u32 {
    if !target.unrolls() {
        return 1;
    }
    match hint {
        UnrollHint::Disabled => return 1,
        UnrollHint::Fixed(n) => return n.max(1),
        UnrollHint::Auto => {}
    }

    let classes = classify_loop_body(original_body);
    let mut factor = classes
        .iter()
        .map(OpComplexity::base_unroll_factor)
        .min()
        .unwrap_or_else(|| OpComplexity::Simple.base_unroll_factor());

    let all_non_complex = !classes.contains(&OpComplexity::Complex);
    if matches!(target, Target::Avx512) && all_non_complex {
        factor = (factor + 1).min(4);
    }
    if matches!(target, Target::Neon) {
        factor = factor.min(4);
    }
    factor
}

/// Every complexity class present in the loop body: one entry per known
/// vocabulary call name, plus [`OpComplexity::Reduction`] whenever the
/// body contains a self-accumulating assignment (`acc = acc.Op(...)` /
/// `acc = v.Op(..., acc)`) — the shape a reduction loop builds its running
/// total with, even though the individual op (`Add`, `MulAdd`) classifies
/// as `Simple` on its own (§4.8 scenario 2: a plain `sum.Add(Load(...))`
/// accumulation loop unrolls like a reduction, not like a plain map).
fn classify_loop_body(body: &Block) -> Vec<OpComplexity> {
    let mut classes: Vec<OpComplexity> = collect_call_names(body).into_iter().map(|name| op_complexity(&name)).collect();
    if has_self_accumulation(body) {
        classes.push(OpComplexity::Reduction);
    }
    if classes.is_empty() {
        classes.push(OpComplexity::Simple);
    }
    classes
}

fn call_name(callee: &Expr) -> Option<&str> {
    match callee {
        Expr::Ident(n) => Some(n.as_str()),
        Expr::Selector { field, .. } => Some(field.as_str()),
        _ => None,
    }
}

/// Every call name reachable in `body` — read-only, `map_block_exprs` is
/// reused purely for its traversal (as `half_precision` does for its own
/// call-graph scan); the rewritten tree is discarded.
fn collect_call_names(body: &Block) -> Vec<String> {
    let mut names = Vec::new();
    let _ = map_block_exprs(body.clone(), &mut |e| {
        if let Expr::Call { callee, .. } = &e
            && let Some(name) = call_name(callee)
        {
            names.push(name.to_string());
        }
        e
    });
    names
}

fn has_self_accumulation(body: &Block) -> bool {
    body.iter().any(|node| match &node.node {
        Stmt::Assign { lhs, op: AssignOp::Assign, rhs } if lhs.len() == 1 && rhs.len() == 1 => {
            let Some(name) = lhs[0].as_ident() else { return false };
            expr_mentions_ident_as_receiver(&rhs[0], name)
        }
        _ => false,
    })
}

fn expr_mentions_ident_as_receiver(expr: &Expr, name: &str) -> bool {
    match expr {
        Expr::Call { callee, args, .. } => {
            let recv_matches = match callee.as_ref() {
                Expr::Selector { base, .. } => base.as_ident() == Some(name),
                _ => false,
            };
            recv_matches || args.iter().any(|a| a.as_ident() == Some(name))
        }
        _ => false,
    }
}

/// Replicates `body` `factor` times: iteration 0 unchanged, iterations
/// `k > 0` with every locally-declared identifier renamed (`inliner`'s
/// α-renaming machinery, reused verbatim — the two passes solve the exact
/// same "don't let two copies of the same locals collide" problem) and
/// every slice-low/index expression whose base is the iterator offset by
/// `k * lanes` (§4.8 "Unrolling").
fn unroll_body(body: &Block, iterator: &str, lanes: u32, factor: u32) -> Block {
    let mut out = Block::new();
    for k in 0..factor.max(1) {
        if k == 0 {
            out.extend(body.clone());
            continue;
        }
        let offset = k * lanes;
        let offset_body = offset_iterator_refs(body.clone(), iterator, offset);
        let suffix = format!("u{k}");
        let locals = crate::inliner::collect_local_names(&offset_body);
        let renames = locals
            .into_iter()
            .filter(|n| n != iterator)
            .map(|n| {
                let fresh = format!("{n}_{suffix}");
                (n, fresh)
            })
            .collect();
        out.extend(crate::inliner::rename_locals(offset_body, &renames));
    }
    out
}

/// A cleanup loop runs one un-unrolled copy of the body per remaining full
/// vector chunk at stride `lanes` (§4.8 "Cleanup"). Reuses `body` verbatim
/// (its locals are already correctly scoped to this fresh loop).
fn cleanup_loop(body: &Block, iterator: &str, lanes: u32, bound: Option<Expr>) -> Stmt {
    let cond = bound.map(|b| {
        Expr::binary(BinaryOp::Le, Expr::binary(BinaryOp::Add, Expr::ident(iterator), Expr::Int(lanes as i64)), b)
    });
    Stmt::For {
        init: None,
        cond,
        post: Some(Box::new(Stmt::Assign {
            lhs: vec![Expr::ident(iterator)],
            op: AssignOp::AddAssign,
            rhs: vec![Expr::Int(lanes as i64)],
        })),
        body: body.clone(),
    }
}

/// Offsets every slice-low or index expression whose base identifier is
/// `iterator` (optionally already `iterator + <const>`) by `offset`,
/// recursing through the whole expression tree otherwise unchanged.
fn offset_iterator_refs(block: Block, iterator: &str, offset: u32) -> Block {
    block.into_iter().map(|node| StmtNode { line: node.line, node: offset_stmt(node.node, iterator, offset) }).collect()
}

fn offset_stmt(stmt: Stmt, iterator: &str, offset: u32) -> Stmt {
    match stmt {
        Stmt::Expr(e) => Stmt::Expr(offset_expr(e, iterator, offset)),
        Stmt::Assign { lhs, op, rhs } => Stmt::Assign {
            lhs: lhs.into_iter().map(|e| offset_expr(e, iterator, offset)).collect(),
            op,
            rhs: rhs.into_iter().map(|e| offset_expr(e, iterator, offset)).collect(),
        },
        Stmt::VarDecl { name, ty, value } => {
            Stmt::VarDecl { name, ty, value: value.map(|e| offset_expr(e, iterator, offset)) }
        }
        Stmt::If { cond, then_block, else_block } => Stmt::If {
            cond: offset_expr(cond, iterator, offset),
            then_block: offset_iterator_refs(then_block, iterator, offset),
            else_block: else_block.map(|b| offset_iterator_refs(b, iterator, offset)),
        },
        Stmt::For { init, cond, post, body } => {
            Stmt::For { init, cond, post, body: offset_iterator_refs(body, iterator, offset) }
        }
        Stmt::Range { key, value, expr, body } => {
            Stmt::Range { key, value, expr, body: offset_iterator_refs(body, iterator, offset) }
        }
        Stmt::Switch { tag, cases } => Stmt::Switch {
            tag,
            cases: cases
                .into_iter()
                .map(|c| simd_ir::SwitchCase { values: c.values, body: offset_iterator_refs(c.body, iterator, offset) })
                .collect(),
        },
        Stmt::Return(vals) => Stmt::Return(vals.into_iter().map(|e| offset_expr(e, iterator, offset)).collect()),
        Stmt::Block(b) => Stmt::Block(offset_iterator_refs(b, iterator, offset)),
    }
}

fn offset_expr(expr: Expr, iterator: &str, offset: u32) -> Expr {
    match expr {
        Expr::Slice { base, low, high } => Expr::Slice {
            base: Box::new(offset_expr(*base, iterator, offset)),
            low: low.map(|e| Box::new(add_offset(*e, iterator, offset))),
            high: high.map(|e| Box::new(add_offset(*e, iterator, offset))),
        },
        Expr::Index { base, index } => Expr::Index {
            base: Box::new(offset_expr(*base, iterator, offset)),
            index: Box::new(add_offset(*index, iterator, offset)),
        },
        Expr::Selector { base, field } => Expr::selector(offset_expr(*base, iterator, offset), field),
        Expr::Call { callee, type_args, args } => Expr::Call {
            callee: Box::new(offset_expr(*callee, iterator, offset)),
            type_args,
            args: args.into_iter().map(|a| offset_expr(a, iterator, offset)).collect(),
        },
        Expr::Unary { op, expr } => Expr::unary(op, offset_expr(*expr, iterator, offset)),
        Expr::Binary { op, lhs, rhs } => {
            Expr::binary(op, offset_expr(*lhs, iterator, offset), offset_expr(*rhs, iterator, offset))
        }
        Expr::Paren(e) => Expr::Paren(Box::new(offset_expr(*e, iterator, offset))),
        Expr::Conversion { ty, expr } => Expr::Conversion { ty, expr: Box::new(offset_expr(*expr, iterator, offset)) },
        Expr::StarCast { ty, expr } => Expr::StarCast { ty, expr: Box::new(offset_expr(*expr, iterator, offset)) },
        Expr::CompositeLit { ty, elems } => {
            Expr::CompositeLit { ty, elems: elems.into_iter().map(|e| offset_expr(e, iterator, offset)).collect() }
        }
        Expr::KeyValue { key, value } => Expr::KeyValue {
            key: Box::new(offset_expr(*key, iterator, offset)),
            value: Box::new(offset_expr(*value, iterator, offset)),
        },
        Expr::AddrOf(e) => Expr::AddrOf(Box::new(offset_expr(*e, iterator, offset))),
        Expr::Deref(e) => Expr::Deref(Box::new(offset_expr(*e, iterator, offset))),
        other => other,
    }
}

/// `e` is either bare `iterator` or `iterator + <const>` — the two shapes
/// a slice-low/index expression built from the loop counter can take.
/// Anything else (a dynamic, non-iterator-derived bound) is left alone.
fn add_offset(e: Expr, iterator: &str, offset: u32) -> Expr {
    match &e {
        Expr::Ident(n) if n == iterator => Expr::binary(BinaryOp::Add, Expr::ident(iterator), Expr::Int(offset as i64)),
        Expr::Binary { op: BinaryOp::Add, lhs, rhs } if lhs.as_ident() == Some(iterator) => match rhs.as_ref() {
            Expr::Int(c) => Expr::binary(BinaryOp::Add, Expr::ident(iterator), Expr::Int(*c + offset as i64)),
            _ => e,
        },
        _ => e,
    }
}

/// §4.8 "Tail handling": a following scalar tail loop is dropped only when
/// it is the simple `for ; i < n; i++` shape over the same iterator and
/// declares no locals of its own — anything that binds a new local depends
/// on state the synthesized fallback call cannot be assumed to reproduce,
/// so it is left in place.
fn is_droppable_scalar_tail(stmt: &Stmt, iterator: &str) -> bool {
    let Stmt::For { init, cond, post, body } = stmt else { return false };
    if init.is_some() {
        return false;
    }
    let bound_matches = matches!(cond, Some(Expr::Binary { op: BinaryOp::Lt, lhs, .. }) if lhs.as_ident() == Some(iterator));
    if !bound_matches {
        return false;
    }
    let post_is_increment = matches!(
        post.as_deref(),
        Some(Stmt::Assign { lhs, op: AssignOp::AddAssign, rhs, .. })
            if lhs.first().and_then(Expr::as_ident) == Some(iterator) && matches!(rhs.first(), Some(Expr::Int(1)))
    );
    if !post_is_increment {
        return false;
    }
    crate::inliner::collect_local_names(body).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simd_context::TransformContext;
    use simd_ir::{Param, ReturnField, TypeExpr, TypeParam};
    use simd_target::ElementType;

    fn simple_map_loop() -> Stmt {
        Stmt::For {
            init: Some(Box::new(Stmt::define(Expr::ident("i"), Expr::Int(0)))),
            cond: Some(Expr::binary(
                BinaryOp::Lt,
                Expr::ident("i"),
                Expr::call(Expr::ident("len"), [], vec![Expr::ident("out")]),
            )),
            post: Some(Box::new(Stmt::Assign { lhs: vec![Expr::ident("i")], op: AssignOp::AddAssign, rhs: vec![Expr::Int(1)] })),
            body: vec![
                StmtNode::new(Stmt::define(
                    Expr::ident("v"),
                    Expr::call(Expr::ident("Load"), [], vec![Expr::slice_from(Expr::ident("in"), Expr::ident("i"))]),
                )),
                StmtNode::new(Stmt::expr(Expr::call(
                    Expr::ident("Store"),
                    [],
                    vec![
                        Expr::call(Expr::selector(Expr::ident("v"), "Add"), [], vec![Expr::ident("one")]),
                        Expr::slice_from(Expr::ident("out"), Expr::ident("i")),
                    ],
                ))),
            ],
        }
    }

    fn parsed_map(results: Vec<ReturnField>) -> ParsedFunc {
        ParsedFunc {
            name: "BaseAdd".into(),
            type_params: vec![TypeParam::new("T", "Floats")],
            params: vec![
                Param::new("in", TypeExpr::slice(TypeExpr::named("T"))),
                Param::new("out", TypeExpr::slice(TypeExpr::named("T"))),
            ],
            results,
            body: vec![StmtNode::new(simple_map_loop())],
            hwy_calls: vec![],
            loop_info: Some(LoopInfo::new("i", "out", UnrollHint::Auto)),
            conditional_blocks: vec![],
        }
    }

    #[test]
    fn simple_map_unrolls_four_on_avx2_and_synthesizes_fallback_tail() {
        let parsed = parsed_map(vec![]);
        let td = TargetDescriptor::new(Target::Avx2);
        let ctx = TransformContext::new("BaseAdd", Target::Avx2, ElementType::F32);
        let out = transform_loop(parsed.body.clone(), &parsed, parsed.loop_info.as_ref().unwrap(), &ctx, &td);

        // VarDecl (hoisted i) + main loop + cleanup loop + fallback-tail if.
        assert_eq!(out.len(), 4);
        assert!(matches!(out[0].node, Stmt::VarDecl { .. }));
        match &out[1].node {
            Stmt::For { post, cond, body, .. } => {
                assert_eq!(body.len(), 8, "four unrolled copies of two statements each");
                assert!(matches!(post.as_deref(), Some(Stmt::Assign { rhs, .. }) if rhs[0] == Expr::Int(32)));
                assert!(matches!(
                    cond,
                    Some(Expr::Binary { op: BinaryOp::Le, lhs, .. })
                        if matches!(lhs.as_ref(), Expr::Binary { op: BinaryOp::Add, rhs, .. } if rhs.as_ref() == &Expr::Int(32))
                ));
            }
            other => panic!("expected main for loop, got {other:?}"),
        }
        assert!(matches!(out[2].node, Stmt::For { .. }), "expected cleanup loop");
        assert!(matches!(out[3].node, Stmt::If { .. }), "expected fallback tail");
    }

    #[test]
    fn fallback_target_never_unrolls_and_skips_cleanup() {
        let parsed = parsed_map(vec![]);
        let td = TargetDescriptor::new(Target::Fallback);
        let ctx = TransformContext::new("BaseAdd", Target::Fallback, ElementType::F32);
        let out = transform_loop(parsed.body.clone(), &parsed, parsed.loop_info.as_ref().unwrap(), &ctx, &td);
        match &out[0].node {
            Stmt::For { body, .. } => assert_eq!(body.len(), 2, "no unrolling on fallback"),
            other => panic!("expected main for loop, got {other:?}"),
        }
        let for_loop_count = out.iter().filter(|n| matches!(n.node, Stmt::For { .. })).count();
        assert_eq!(for_loop_count, 1, "no cleanup loop when the factor is 1");
    }

    #[test]
    fn functions_with_return_values_get_no_fallback_tail() {
        let parsed = parsed_map(vec![ReturnField { name: None, ty: TypeExpr::named("T") }]);
        let td = TargetDescriptor::new(Target::Avx2);
        let ctx = TransformContext::new("BaseAdd", Target::Avx2, ElementType::F32);
        let out = transform_loop(parsed.body.clone(), &parsed, parsed.loop_info.as_ref().unwrap(), &ctx, &td);
        assert!(!out.iter().any(|n| matches!(n.node, Stmt::If { .. })));
    }

    #[test]
    fn unroll_hint_disabled_skips_unrolling_regardless_of_op_mix() {
        let mut parsed = parsed_map(vec![]);
        parsed.loop_info = Some(LoopInfo::new("i", "out", UnrollHint::Disabled));
        let td = TargetDescriptor::new(Target::Avx2);
        let ctx = TransformContext::new("BaseAdd", Target::Avx2, ElementType::F32);
        let out = transform_loop(parsed.body.clone(), &parsed, parsed.loop_info.as_ref().unwrap(), &ctx, &td);
        let for_loop_count = out.iter().filter(|n| matches!(n.node, Stmt::For { .. })).count();
        assert_eq!(for_loop_count, 1, "no cleanup loop when unrolling is disabled");
    }

    #[test]
    fn droppable_scalar_tail_is_consumed_not_emitted() {
        let mut parsed = parsed_map(vec![]);
        let scalar_tail = StmtNode::new(Stmt::For {
            init: None,
            cond: Some(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::call(Expr::ident("len"), [], vec![Expr::ident("out")]))),
            post: Some(Box::new(Stmt::Assign { lhs: vec![Expr::ident("i")], op: AssignOp::AddAssign, rhs: vec![Expr::Int(1)] })),
            body: vec![StmtNode::new(Stmt::expr(Expr::call(Expr::ident("touch"), [], vec![Expr::ident("out")])))],
        });
        parsed.body.push(scalar_tail);
        let td = TargetDescriptor::new(Target::Avx2);
        let ctx = TransformContext::new("BaseAdd", Target::Avx2, ElementType::F32);
        let out = transform_loop(parsed.body.clone(), &parsed, parsed.loop_info.as_ref().unwrap(), &ctx, &td);
        let for_loop_count = out.iter().filter(|n| matches!(n.node, Stmt::For { .. })).count();
        assert_eq!(for_loop_count, 2, "main + cleanup only, scalar tail dropped");
    }

    #[test]
    fn scalar_tail_assigning_a_new_local_is_preserved() {
        let mut parsed = parsed_map(vec![]);
        let scalar_tail = StmtNode::new(Stmt::For {
            init: None,
            cond: Some(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::call(Expr::ident("len"), [], vec![Expr::ident("out")]))),
            post: Some(Box::new(Stmt::Assign { lhs: vec![Expr::ident("i")], op: AssignOp::AddAssign, rhs: vec![Expr::Int(1)] })),
            body: vec![StmtNode::new(Stmt::define(Expr::ident("tmp"), Expr::ident("i")))],
        });
        parsed.body.push(scalar_tail);
        let td = TargetDescriptor::new(Target::Avx2);
        let ctx = TransformContext::new("BaseAdd", Target::Avx2, ElementType::F32);
        let out = transform_loop(parsed.body.clone(), &parsed, parsed.loop_info.as_ref().unwrap(), &ctx, &td);
        let for_loop_count = out.iter().filter(|n| matches!(n.node, Stmt::For { .. })).count();
        assert_eq!(for_loop_count, 3, "main + cleanup + preserved scalar tail");
    }

    #[test]
    fn reduction_shaped_accumulator_loop_unrolls_by_two() {
        let mut parsed = ParsedFunc {
            name: "BaseSum".into(),
            type_params: vec![TypeParam::new("T", "Floats")],
            params: vec![Param::new("in", TypeExpr::slice(TypeExpr::named("T")))],
            results: vec![ReturnField { name: None, ty: TypeExpr::named("T") }],
            body: vec![],
            hwy_calls: vec![],
            loop_info: Some(LoopInfo::new("i", "in", UnrollHint::Auto)),
            conditional_blocks: vec![],
        };
        parsed.body = vec![StmtNode::new(Stmt::For {
            init: Some(Box::new(Stmt::define(Expr::ident("i"), Expr::Int(0)))),
            cond: Some(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::call(Expr::ident("len"), [], vec![Expr::ident("in")]))),
            post: Some(Box::new(Stmt::Assign { lhs: vec![Expr::ident("i")], op: AssignOp::AddAssign, rhs: vec![Expr::Int(1)] })),
            body: vec![StmtNode::new(Stmt::assign(
                Expr::ident("sum"),
                Expr::call(
                    Expr::selector(Expr::ident("sum"), "Add"),
                    [],
                    vec![Expr::call(Expr::ident("Load"), [], vec![Expr::slice_from(Expr::ident("in"), Expr::ident("i"))])],
                ),
            ))],
        })];
        let td = TargetDescriptor::new(Target::Avx2);
        let ctx = TransformContext::new("BaseSum", Target::Avx2, ElementType::F64);
        let out = transform_loop(parsed.body.clone(), &parsed, parsed.loop_info.as_ref().unwrap(), &ctx, &td);
        match &out[0].node {
            Stmt::For { body, .. } => assert_eq!(body.len(), 2, "unroll factor 2 despite Simple-classified calls"),
            other => panic!("expected main for loop, got {other:?}"),
        }
    }
}
