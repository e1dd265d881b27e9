//! The operation lowerer (§4.6) — the largest pass. Every call of a known
//! vocabulary operation is lowered to either a free function in the backend
//! package or a method call on a concrete vector type; accumulator patterns
//! are rewritten to their in-place variant; reductions are inlined to a
//! store-and-sum IIFE; `Base*` callees are mechanically suffixed; and
//! abstract generic types (`Vec[T]`, `Mask[T]`) are lowered to concrete
//! backend vector types via [`specialize_type`] (used both here, for type
//! arguments, and by `assemble` for the function's own signature).

use ahash::AHashSet;

use simd_context::TransformContext;
use simd_diag::{Diagnostic, Diagnostics};
use simd_ir::tree::map_block_exprs;
use simd_ir::{Block, Expr, TypeExpr, is_base_name};
use simd_target::{BackendPackage, Dispatch, ElementType, OpInfo, TargetDescriptor, is_reduction_op};

use crate::naming;

/// Runs the operation lowerer over an already identifier-resolved,
/// helper-inlined body: expression-level lowering first (bottom-up, so a
/// nested call's operands are already in their final shape before the
/// outer call is classified), then the accumulator in-place rewrite (a
/// statement-level pattern), then reduction inlining (§4.6, also re-run as
/// post-processor 4 in `post.rs` — idempotent, since by then no
/// `Reduce*` call remains).
pub fn lower_block(
    body: Block,
    ctx: &mut TransformContext,
    td: &TargetDescriptor,
    hwy_call_names: &AHashSet<String>,
    diagnostics: &mut Diagnostics,
) -> Block {
    let lowered = map_block_exprs(body, &mut |e| lower_one(e, ctx, td, hwy_call_names, diagnostics));
    let lowered = rewrite_accumulators(lowered, td);
    inline_reductions(lowered, ctx, td)
}

/// `NumLanes`/`NumElements` queries are genuine vocabulary but are resolved
/// to a compile-time integer literal later, by post-processor 3 (§4.9) —
/// the lowerer passes them through untouched rather than diagnosing them
/// as unknown operations.
fn is_lane_query(name: &str) -> bool {
    matches!(name, "NumLanes" | "NumElements")
}

fn lower_one(
    e: Expr,
    ctx: &mut TransformContext,
    td: &TargetDescriptor,
    hwy_call_names: &AHashSet<String>,
    diagnostics: &mut Diagnostics,
) -> Expr {
    let Expr::Call { callee, type_args, args } = e else { return e };
    match *callee {
        Expr::Ident(name) if is_lane_query(&name) => Expr::call(Expr::ident(name), type_args, args),
        Expr::Selector { base, field } if is_lane_query(&field) => Expr::call(Expr::selector(*base, field), type_args, args),
        Expr::Ident(name) if is_base_name(&name) => {
            // §4.6 "Cross-package Base* calls": mechanically suffixed,
            // type arguments stripped (the callee is now a concrete
            // function with no type parameters of its own).
            let specialized = naming::specialized_function_name(&name, td, ctx.element_type, true);
            Expr::call(Expr::ident(specialized), [], args)
        }
        Expr::Ident(name) if is_reduction_op(&name) => {
            // Left for `inline_reductions`; no modeled target resolves
            // reductions through the op table (§3 OpInfo, §4.6).
            Expr::call(Expr::ident(name), type_args, args)
        }
        Expr::Ident(name) => match td.op(&name) {
            Some(op) => lower_free_style(&name, op, args, ctx, td),
            None => {
                if hwy_call_names.contains(&name) {
                    diagnostics.push(Diagnostic::UnknownOperation(name.clone()));
                }
                Expr::call(Expr::ident(name), type_args, args)
            }
        },
        Expr::Selector { base, field } if base.as_ident() == Some(td.backend_package()) => {
            // Already a backend-package call (idempotence: running the
            // lowerer twice on output that has no more abstract-vocabulary
            // calls is a no-op, §8).
            Expr::call(Expr::selector(*base, field), type_args, args)
        }
        Expr::Selector { base, field } if is_reduction_op(&field) => {
            Expr::call(Expr::selector(*base, field), type_args, args)
        }
        Expr::Selector { base, field } => match td.op(&field) {
            Some(op) => lower_method_style(&field, op, *base, args, ctx, td),
            None => {
                if hwy_call_names.contains(&field) {
                    diagnostics.push(Diagnostic::UnknownOperation(field.clone()));
                }
                Expr::call(Expr::selector(*base, field), type_args, args)
            }
        },
        other => Expr::call(other, type_args, args),
    }
}

/// A bare, prefix-less vocabulary call (`Load(...)`, `Set[T](...)`) — the
/// shape constructors use (§4.6 intro; scenario 1).
fn lower_free_style(name: &str, op: OpInfo, args: Vec<Expr>, ctx: &TransformContext, td: &TargetDescriptor) -> Expr {
    match op.dispatch {
        Dispatch::Free => build_free_call(name, &op, args, ctx, td),
        Dispatch::Method => {
            // §4.6 "Method-call lowering": `hwy.Op(a, b)` becomes `a.Op(b)`.
            let mut it = args.into_iter();
            match it.next() {
                Some(recv) => Expr::call(Expr::selector(recv, op.backend_name), [], it.collect()),
                None => build_free_call(name, &op, Vec::new(), ctx, td),
            }
        }
        Dispatch::Synthesized => {
            let x = args.into_iter().next().unwrap_or(Expr::Int(0));
            synthesize_identity(name, x, ctx, td)
        }
    }
}

/// A method call already in receiver form (`v.Add(x)`, `sum.ReduceSum()`
/// minus the reduction case, which never reaches here).
fn lower_method_style(
    name: &str,
    op: OpInfo,
    recv: Expr,
    args: Vec<Expr>,
    ctx: &TransformContext,
    td: &TargetDescriptor,
) -> Expr {
    match op.dispatch {
        Dispatch::Method => Expr::call(Expr::selector(recv, op.backend_name), [], args),
        Dispatch::Free => {
            let mut all = Vec::with_capacity(args.len() + 1);
            all.push(recv);
            all.extend(args);
            build_free_call(name, &op, all, ctx, td)
        }
        Dispatch::Synthesized => synthesize_identity(name, recv, ctx, td),
    }
}

/// Resolves an [`OpInfo`]'s declared backend package (§3 OpInfo: "core",
/// "special", "hwy-wrapper", or a contrib package") to the package
/// identifier it's actually called against. `Core` is the main
/// `archsimd`-style package `TargetDescriptor::backend_package` names;
/// the others are sibling packages the same backend ships the less
/// universally-supported operation families in.
fn package_name(package: &BackendPackage, td: &TargetDescriptor) -> String {
    match package {
        BackendPackage::Core => td.backend_package().to_string(),
        BackendPackage::Special => "archspecial".to_string(),
        BackendPackage::HwyWrapper => "hwy".to_string(),
        BackendPackage::Contrib(name) => name.clone(),
    }
}

/// Builds the free-function call for a constructor op (`Load`, `Store`,
/// `Broadcast`/`Set`, `Zero`) using the `Load<VectorType>Slice` /
/// `Store<VectorType>Slice` / `Broadcast<VectorType>` naming templates
/// (§4.6 "Free-function lowering"), or a plain `<pkg>.<BackendName>(args...)`
/// for anything else dispatched as `Dispatch::Free` (e.g. `Pow`).
///
/// `Load`/`Store` bridge regime 2's promoted-AVX split between the native,
/// memory-matching vector (what a slice actually holds) and the f32-backed
/// compute vector (what [`TargetDescriptor::vector_type_name`] now names)
/// with explicit `Wrap`/`Unwrap` conversions (§4.6 "conversions insert
/// wrap/unwrap calls"). On every other regime the two names coincide and
/// the call shape is exactly what it was before promotion was modeled.
fn build_free_call(vocab_name: &str, op: &OpInfo, args: Vec<Expr>, ctx: &TransformContext, td: &TargetDescriptor) -> Expr {
    let pkg = package_name(&op.package, td);
    let et = ctx.element_type;
    match vocab_name {
        "Load" => {
            let width = args
                .first()
                .and_then(crate::context_build::detect_static_slice_width)
                .unwrap_or_else(|| td.lanes_for(et));
            let native_vt = td.native_vector_type_name_at(et, width);
            let load = Expr::call(Expr::selector(Expr::ident(pkg.clone()), format!("Load{native_vt}Slice")), [], args);
            if td.is_half_precision_promoted(et) {
                Expr::call(Expr::selector(Expr::ident(pkg), format!("Unwrap{native_vt}")), [], vec![load])
            } else {
                load
            }
        }
        "Store" => {
            let native_vt = td.native_vector_type_name(et);
            if td.is_half_precision_promoted(et) {
                let mut it = args.into_iter();
                let value = it.next().unwrap_or(Expr::Int(0));
                let rest: Vec<Expr> = it.collect();
                let wrapped = Expr::call(Expr::selector(Expr::ident(pkg.clone()), format!("Wrap{native_vt}")), [], vec![value]);
                let mut new_args = vec![wrapped];
                new_args.extend(rest);
                Expr::call(Expr::selector(Expr::ident(pkg), format!("Store{native_vt}Slice")), [], new_args)
            } else {
                Expr::call(Expr::selector(Expr::ident(pkg), format!("Store{native_vt}Slice")), [], args)
            }
        }
        "Broadcast" | "Set" => build_broadcast_call(&pkg, &td.vector_type_name(et), args, ctx, td),
        "Zero" => {
            let vt = td.vector_type_name(et);
            Expr::call(Expr::selector(Expr::ident(pkg), format!("Zero{vt}")), [], Vec::new())
        }
        _ => Expr::call(Expr::selector(Expr::ident(pkg), op.backend_name.clone()), [], args),
    }
}

/// Builds `<pkg>.Broadcast<VectorType>(args...)`, wrapping each argument in
/// the target's host-scalar conversion helper first when broadcasting a
/// half-precision constant on a *native* target (§4.6 regime 1: "wrap
/// constant broadcasts with ... a host-scalar conversion helper"). Promoted
/// AVX needs no such wrap here — its vector type already names the f32
/// compute representation a host float literal builds directly.
fn build_broadcast_call(pkg: &str, vt: &str, args: Vec<Expr>, ctx: &TransformContext, td: &TargetDescriptor) -> Expr {
    let args = if td.is_half_precision_native(ctx.element_type) {
        match td.half_precision_package(ctx.element_type) {
            Some(helper_pkg) => args
                .into_iter()
                .map(|a| Expr::call(Expr::selector(Expr::ident(helper_pkg), "FromFloat32"), [], vec![a]))
                .collect(),
            None => args,
        }
    } else {
        args
    };
    Expr::call(Expr::selector(Expr::ident(pkg.to_string()), format!("Broadcast{vt}")), [], args)
}

/// Synthesizes the identity used when no direct backend method exists
/// (§4.6): `Neg(x) -> broadcast(0).Sub(x)`, `Abs(x) -> x.Max(broadcast(0).Sub(x))`,
/// `IsNaN(x) -> x.Eq(x).Xor(true_mask)`, `Not/MaskNot(x) -> x.Xor(true_mask)`.
fn synthesize_identity(name: &str, x: Expr, ctx: &TransformContext, td: &TargetDescriptor) -> Expr {
    let vt = td.vector_type_name(ctx.element_type);
    let pkg = td.backend_package();
    let zero = || build_broadcast_call(pkg, &vt, vec![zero_literal(ctx.element_type)], ctx, td);
    let true_mask = || Expr::call(Expr::selector(Expr::ident(pkg), format!("MaskTrue{vt}")), [], Vec::new());
    match name {
        "Neg" => Expr::call(Expr::selector(zero(), "Sub"), [], vec![x]),
        "Abs" => {
            let negated = Expr::call(Expr::selector(zero(), "Sub"), [], vec![x.clone()]);
            Expr::call(Expr::selector(x, "Max"), [], vec![negated])
        }
        "IsNaN" => {
            let eq = Expr::call(Expr::selector(x.clone(), "Eq"), [], vec![x]);
            Expr::call(Expr::selector(eq, "Xor"), [], vec![true_mask()])
        }
        "Not" | "MaskNot" => Expr::call(Expr::selector(x, "Xor"), [], vec![true_mask()]),
        _ => x,
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

/// §4.6 "Accumulator in-place rewrite": `acc = v.Op(…, acc)` becomes
/// `_ = v.OpAcc(…, &acc)` — the blank assignment is folded to a plain
/// expression statement by post-processor 2.
fn rewrite_accumulators(block: Block, td: &TargetDescriptor) -> Block {
    block
        .into_iter()
        .map(|node| simd_ir::StmtNode {
            line: node.line,
            node: rewrite_accumulator_stmt(node.node, td),
        })
        .collect()
}

fn rewrite_accumulator_stmt(stmt: simd_ir::Stmt, td: &TargetDescriptor) -> simd_ir::Stmt {
    use simd_ir::{AssignOp, Stmt, SwitchCase};
    match stmt {
        Stmt::Assign { lhs, op: AssignOp::Assign, rhs } if lhs.len() == 1 && rhs.len() == 1 => {
            match try_rewrite_accumulator(&lhs[0], &rhs[0], td) {
                Some(rewritten) => rewritten,
                None => Stmt::Assign { lhs, op: AssignOp::Assign, rhs },
            }
        }
        Stmt::If { cond, then_block, else_block } => Stmt::If {
            cond,
            then_block: rewrite_accumulators(then_block, td),
            else_block: else_block.map(|b| rewrite_accumulators(b, td)),
        },
        Stmt::For { init, cond, post, body } => Stmt::For {
            init,
            cond,
            post,
            body: rewrite_accumulators(body, td),
        },
        Stmt::Range { key, value, expr, body } => Stmt::Range {
            key,
            value,
            expr,
            body: rewrite_accumulators(body, td),
        },
        Stmt::Switch { tag, cases } => Stmt::Switch {
            tag,
            cases: cases
                .into_iter()
                .map(|c| SwitchCase {
                    values: c.values,
                    body: rewrite_accumulators(c.body, td),
                })
                .collect(),
        },
        Stmt::Block(b) => Stmt::Block(rewrite_accumulators(b, td)),
        other => other,
    }
}

fn try_rewrite_accumulator(lhs: &Expr, rhs: &Expr, td: &TargetDescriptor) -> Option<simd_ir::Stmt> {
    use simd_ir::AssignOp;
    let acc_name = lhs.as_ident()?;
    let Expr::Call { callee, type_args, args } = rhs else { return None };
    let Expr::Selector { base, field } = callee.as_ref() else { return None };
    let op = td.op(field)?;
    let idx = op.accumulator_arg_index?;
    let inplace = op.inplace_variant?;
    if idx == 0 || idx > args.len() || args[idx - 1].as_ident() != Some(acc_name) {
        return None;
    }
    let mut new_args = args.clone();
    new_args[idx - 1] = Expr::addr_of(Expr::ident(acc_name));
    let call = Expr::Call {
        callee: Box::new(Expr::selector((**base).clone(), inplace)),
        type_args: type_args.clone(),
        args: new_args,
    };
    Some(simd_ir::Stmt::Assign {
        lhs: vec![Expr::ident("_")],
        op: AssignOp::Assign,
        rhs: vec![call],
    })
}

/// §4.6 "Reduction inlining": `ReduceSum(v)` / `v.ReduceSum()` becomes the
/// store-and-sum IIFE. Shared with post-processor 4 (§4.9); a second run
/// over output with no remaining `Reduce*` calls is a no-op.
pub fn inline_reductions(block: Block, ctx: &TransformContext, td: &TargetDescriptor) -> Block {
    map_block_exprs(block, &mut |e| {
        let Expr::Call { callee, args, .. } = &e else { return e };
        match callee.as_ref() {
            Expr::Selector { base, field } if is_reduction_op(field) && args.is_empty() => {
                build_reduction_iife((**base).clone(), field, ctx, td)
            }
            Expr::Ident(name) if is_reduction_op(name) && args.len() == 1 => {
                build_reduction_iife(args[0].clone(), name, ctx, td)
            }
            _ => e.clone(),
        }
    })
}

fn build_reduction_iife(recv: Expr, op_name: &str, ctx: &TransformContext, td: &TargetDescriptor) -> Expr {
    let lanes = match recv.as_ident() {
        Some(name) => ctx.lanes_for_var_or_default(name, td.lanes_for(ctx.element_type)),
        None => td.lanes_for(ctx.element_type),
    };
    let scalar_ty = TypeExpr::parse(td.scalar_type_name(ctx.element_type));

    let buf_name = "t";
    let buf_decl = simd_ir::Stmt::VarDecl {
        name: buf_name.to_string(),
        ty: Some(TypeExpr::array(lanes as u64, scalar_ty.clone())),
        value: None,
    };
    let store_stmt = simd_ir::Stmt::expr(Expr::call(
        Expr::selector(recv, "StoreSlice"),
        [],
        vec![Expr::slice_full(Expr::ident(buf_name))],
    ));
    let lane_values: Vec<Expr> = (0..lanes)
        .map(|i| Expr::index(Expr::ident(buf_name), Expr::Int(i as i64)))
        .collect();
    let folded = fold_lane_values(lane_values, op_name);
    let return_stmt = simd_ir::Stmt::returns(vec![folded]);

    let func_lit = Expr::FuncLit {
        params: Vec::new(),
        results: vec![scalar_ty],
        body: vec![
            simd_ir::StmtNode::new(buf_decl),
            simd_ir::StmtNode::new(store_stmt),
            simd_ir::StmtNode::new(return_stmt),
        ],
    };
    Expr::call(func_lit, [], Vec::new())
}

fn fold_lane_values(values: Vec<Expr>, op_name: &str) -> Expr {
    match op_name {
        "ReduceSum" => simd_ir::tree::left_associated_sum(values),
        "ReduceMax" => left_associated_call(values, "scalarMax"),
        "ReduceMin" => left_associated_call(values, "scalarMin"),
        _ => simd_ir::tree::left_associated_sum(values),
    }
}

/// `ReduceMax`/`ReduceMin` have no infix operator to left-associate the way
/// `ReduceSum` does, so they fold through a package-level scalar helper
/// instead (`scalarMax(scalarMax(t[0], t[1]), t[2])`, ...).
fn left_associated_call(values: Vec<Expr>, helper: &str) -> Expr {
    let mut iter = values.into_iter();
    let first = iter.next().unwrap_or(Expr::Int(0));
    iter.fold(first, |acc, v| Expr::call(Expr::ident(helper), [], vec![acc, v]))
}

/// Lowers abstract generic vector types (`Vec[T]`, `Mask[T]`) to concrete
/// backend types, recursing through slices/pointers/arrays/function types
/// (§4.6 "type conversions, composite-literal element types..."). Shared
/// with `assemble` for the specialized function's own parameter/return
/// types. When `force_generic` is set (the half-precision generic regime,
/// §4.6 "Generic fallback"), `Vec`/`Mask` are left abstract — only their
/// own type argument is recursively specialized.
pub fn specialize_type(ty: &TypeExpr, td: &TargetDescriptor, element_type: ElementType, force_generic: bool) -> TypeExpr {
    match ty {
        TypeExpr::Generic(name, args) if name == "Vec" && args.len() == 1 => {
            if force_generic {
                TypeExpr::Generic(name.clone(), vec![specialize_type(&args[0], td, element_type, force_generic)])
            } else {
                TypeExpr::qualified(td.backend_package(), td.vector_type_name(element_type))
            }
        }
        TypeExpr::Generic(name, args) if name == "Mask" && args.len() == 1 => {
            if force_generic {
                ty.clone()
            } else {
                TypeExpr::qualified(td.backend_package(), format!("{}Mask", td.vector_type_name(element_type)))
            }
        }
        TypeExpr::Slice(inner) => TypeExpr::slice(specialize_type(inner, td, element_type, force_generic)),
        TypeExpr::Pointer(inner) => TypeExpr::pointer(specialize_type(inner, td, element_type, force_generic)),
        TypeExpr::Array(n, inner) => TypeExpr::array(*n, specialize_type(inner, td, element_type, force_generic)),
        TypeExpr::Func(params, results) => TypeExpr::Func(
            params.iter().map(|p| specialize_type(p, td, element_type, force_generic)).collect(),
            results.iter().map(|p| specialize_type(p, td, element_type, force_generic)).collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simd_target::Target;

    fn ctx(target: Target, element_type: ElementType) -> TransformContext {
        TransformContext::new("BaseAdd", target, element_type)
    }

    #[test]
    fn bare_load_lowers_to_backend_free_function() {
        let mut c = ctx(Target::Avx2, ElementType::F32);
        let mut diags = Diagnostics::new();
        let td = TargetDescriptor::new(Target::Avx2);
        let body: Block = vec![simd_ir::StmtNode::new(simd_ir::Stmt::expr(Expr::call(
            Expr::ident("Load"),
            [],
            vec![Expr::slice_from(Expr::ident("in"), Expr::ident("i"))],
        )))];
        let out = lower_block(body, &mut c, &td, &AHashSet::new(), &mut diags);
        match &out[0].node {
            simd_ir::Stmt::Expr(Expr::Call { callee, .. }) => {
                assert!(matches!(callee.as_ref(), Expr::Selector { field, .. } if field == "LoadFloat32x8Slice"));
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn bare_store_lowers_to_backend_free_function() {
        let mut c = ctx(Target::Avx2, ElementType::F32);
        let mut diags = Diagnostics::new();
        let td = TargetDescriptor::new(Target::Avx2);
        let body: Block = vec![simd_ir::StmtNode::new(simd_ir::Stmt::expr(Expr::call(
            Expr::ident("Store"),
            [],
            vec![Expr::ident("v"), Expr::slice_from(Expr::ident("out"), Expr::ident("i"))],
        )))];
        let out = lower_block(body, &mut c, &td, &AHashSet::new(), &mut diags);
        match &out[0].node {
            simd_ir::Stmt::Expr(Expr::Call { callee, args, .. }) => {
                assert!(matches!(callee.as_ref(), Expr::Selector { base, field } if base.as_ident() == Some("archsimd") && field == "StoreFloat32x8Slice"));
                assert_eq!(args[0], Expr::ident("v"));
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn method_call_keeps_backend_name_for_renamed_ops() {
        let mut c = ctx(Target::Avx2, ElementType::F32);
        let mut diags = Diagnostics::new();
        let td = TargetDescriptor::new(Target::Avx2);
        let body: Block = vec![simd_ir::StmtNode::new(simd_ir::Stmt::expr(Expr::call(
            Expr::selector(Expr::ident("v"), "Blend"),
            [],
            vec![Expr::ident("a"), Expr::ident("b")],
        )))];
        let out = lower_block(body, &mut c, &td, &AHashSet::new(), &mut diags);
        match &out[0].node {
            simd_ir::Stmt::Expr(Expr::Call { callee, .. }) => {
                assert!(matches!(callee.as_ref(), Expr::Selector { field, .. } if field == "Select"));
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn accumulator_pattern_becomes_inplace_call() {
        let mut c = ctx(Target::Neon, ElementType::F32);
        let mut diags = Diagnostics::new();
        let td = TargetDescriptor::new(Target::Neon);
        let body: Block = vec![simd_ir::StmtNode::new(simd_ir::Stmt::assign(
            Expr::ident("acc"),
            Expr::call(Expr::selector(Expr::ident("v"), "MulAdd"), [], vec![Expr::ident("a"), Expr::ident("acc")]),
        ))];
        let out = lower_block(body, &mut c, &td, &AHashSet::new(), &mut diags);
        match &out[0].node {
            simd_ir::Stmt::Assign { lhs, rhs, .. } => {
                assert_eq!(lhs[0], Expr::ident("_"));
                match &rhs[0] {
                    Expr::Call { callee, args, .. } => {
                        assert!(matches!(callee.as_ref(), Expr::Selector { field, .. } if field == "MulAddAcc"));
                        assert_eq!(args[1], Expr::addr_of(Expr::ident("acc")));
                    }
                    _ => panic!("expected call"),
                }
            }
            _ => panic!("expected assignment"),
        }
    }

    #[test]
    fn reduce_sum_inlines_to_store_and_sum_iife() {
        let mut c = ctx(Target::Avx2, ElementType::F64);
        let mut diags = Diagnostics::new();
        let td = TargetDescriptor::new(Target::Avx2);
        let body: Block = vec![simd_ir::StmtNode::new(simd_ir::Stmt::returns(vec![Expr::call(
            Expr::selector(Expr::ident("sum"), "ReduceSum"),
            [],
            vec![],
        )]))];
        let out = lower_block(body, &mut c, &td, &AHashSet::new(), &mut diags);
        match &out[0].node {
            simd_ir::Stmt::Return(vals) => match &vals[0] {
                Expr::Call { callee, .. } => assert!(matches!(callee.as_ref(), Expr::FuncLit { .. })),
                _ => panic!("expected IIFE call"),
            },
            _ => panic!("expected return"),
        }
    }

    #[test]
    fn unknown_operation_is_left_untouched_and_diagnosed() {
        let mut c = ctx(Target::Avx2, ElementType::F32);
        let mut diags = Diagnostics::new();
        let td = TargetDescriptor::new(Target::Avx2);
        let mut known = AHashSet::new();
        known.insert("Frobnicate".to_string());
        let body: Block = vec![simd_ir::StmtNode::new(simd_ir::Stmt::expr(Expr::call(
            Expr::ident("Frobnicate"),
            [],
            vec![Expr::ident("x")],
        )))];
        let out = lower_block(body, &mut c, &td, &known, &mut diags);
        assert_eq!(out, body_untouched());
        assert_eq!(diags.warnings().count(), 1);

        fn body_untouched() -> Block {
            vec![simd_ir::StmtNode::new(simd_ir::Stmt::expr(Expr::call(
                Expr::ident("Frobnicate"),
                [],
                vec![Expr::ident("x")],
            )))]
        }
    }

    #[test]
    fn base_call_is_suffixed_and_loses_type_args() {
        let mut c = ctx(Target::Avx512, ElementType::F64);
        let mut diags = Diagnostics::new();
        let td = TargetDescriptor::new(Target::Avx512);
        let body: Block = vec![simd_ir::StmtNode::new(simd_ir::Stmt::expr(Expr::call(
            Expr::ident("BaseClamp"),
            [TypeExpr::named("T")],
            vec![Expr::ident("x")],
        )))];
        let out = lower_block(body, &mut c, &td, &AHashSet::new(), &mut diags);
        match &out[0].node {
            simd_ir::Stmt::Expr(Expr::Call { callee, type_args, .. }) => {
                assert_eq!(callee.as_ref(), &Expr::ident("BaseClamp_AVX512_f64"));
                assert!(type_args.is_empty());
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn specialize_type_lowers_vec_generic_to_concrete_backend_type() {
        let td = TargetDescriptor::new(Target::Avx2);
        let ty = TypeExpr::Generic("Vec".into(), vec![TypeExpr::named("float32")]);
        let out = specialize_type(&ty, &td, ElementType::F32, false);
        assert_eq!(out.to_string(), "archsimd.Float32x8");
    }

    #[test]
    fn specialize_type_keeps_vec_generic_abstract_when_force_generic() {
        let td = TargetDescriptor::new(Target::Avx2);
        let ty = TypeExpr::Generic("Vec".into(), vec![TypeExpr::named("float32")]);
        let out = specialize_type(&ty, &td, ElementType::F16, true);
        assert_eq!(out.to_string(), "Vec[float32]");
    }
}
