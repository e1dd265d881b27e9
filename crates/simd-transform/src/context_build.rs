//! Context construction and collection (§4.3): the five numbered steps that
//! seed a fresh [`TransformContext`] before any rewrite touches the cloned
//! body.

use simd_context::{TransformContext, VarInfo};
use simd_ir::tree::as_plain_call;
use simd_ir::{Block, Expr, ParsedFunc, Stmt, TypeExpr};
use simd_target::{ElementType, Target};

/// Steps 1–2: register every parameter and half-precision-marked named
/// return as a local, then walk the body for the rest.
pub fn build_context(parsed: &ParsedFunc, target: Target, element_type: ElementType) -> TransformContext {
    let mut ctx = TransformContext::new(parsed.name.clone(), target, element_type);

    for param in &parsed.params {
        ctx.declare_local(param.name.clone(), VarInfo::declared(param.ty.clone()));
        if is_slice_of(&param.ty) {
            if mentions_type_param(&param.ty, parsed) {
                mark_stack_or_slice(&mut ctx, &param.name, &param.ty, element_type);
            }
        } else if mentions_type_param(&param.ty, parsed) && element_type.is_half_precision() {
            ctx.half_precision_scalar_vars.insert(param.name.clone());
        }
    }

    for ret in &parsed.results {
        let Some(name) = &ret.name else { continue };
        ctx.declare_local(name.clone(), VarInfo::declared(ret.ty.clone()));
        if !is_slice_of(&ret.ty) && mentions_type_param(&ret.ty, parsed) && element_type.is_half_precision() {
            ctx.half_precision_scalar_vars.insert(name.clone());
        }
    }

    collect_locals(&parsed.body, &mut ctx);
    prescan_loads(&parsed.body, &mut ctx, element_type);

    ctx
}

fn is_slice_of(ty: &TypeExpr) -> bool {
    matches!(ty, TypeExpr::Slice(_))
}

fn mark_stack_or_slice(ctx: &mut TransformContext, name: &str, ty: &TypeExpr, element_type: ElementType) {
    if element_type.is_half_precision() {
        ctx.half_precision_slice_vars.insert(name.to_string());
    }
    let _ = ty;
}

/// Whether `ty` mentions one of `parsed`'s type-parameter names, stripping
/// slice/pointer/array/generic wrappers (§4.4 uses the same notion to know
/// whether an identifier refers to a type parameter; here we ask the same
/// question of a declared type).
fn mentions_type_param(ty: &TypeExpr, parsed: &ParsedFunc) -> bool {
    ty.base_name()
        .map(|n| parsed.is_type_param(n))
        .unwrap_or(false)
}

/// Step 3: every name bound by `:=`, `var`, `for i := …`, or `for _, x :=
/// range …`, recursing into every nested block.
fn collect_locals(block: &Block, ctx: &mut TransformContext) {
    for node in block {
        collect_locals_stmt(&node.node, ctx);
    }
}

fn collect_locals_stmt(stmt: &Stmt, ctx: &mut TransformContext) {
    match stmt {
        Stmt::Assign {
            lhs,
            op: simd_ir::AssignOp::Define,
            ..
        } => {
            for e in lhs {
                if let Some(name) = e.as_ident()
                    && !ctx.is_local(name)
                {
                    ctx.declare_local(name.to_string(), VarInfo::untyped());
                }
            }
        }
        Stmt::VarDecl { name, ty, .. } => {
            let info = ty.clone().map(VarInfo::declared).unwrap_or_else(VarInfo::untyped);
            if matches!(ty, Some(TypeExpr::Array(..))) {
                ctx.stack_array_vars.insert(name.clone());
            }
            ctx.declare_local(name.clone(), info);
        }
        Stmt::If { then_block, else_block, .. } => {
            collect_locals(then_block, ctx);
            if let Some(b) = else_block {
                collect_locals(b, ctx);
            }
        }
        Stmt::For { init, body, .. } => {
            if let Some(init) = init {
                collect_locals_stmt(init, ctx);
            }
            collect_locals(body, ctx);
        }
        Stmt::Range { key, value, body, .. } => {
            if let Some(k) = key {
                ctx.declare_local(k.clone(), VarInfo::untyped());
            }
            if let Some(v) = value {
                ctx.declare_local(v.clone(), VarInfo::untyped());
            }
            collect_locals(body, ctx);
        }
        Stmt::Switch { cases, .. } => {
            for c in cases {
                collect_locals(&c.body, ctx);
            }
        }
        Stmt::Block(b) => collect_locals(b, ctx),
        Stmt::Expr(_) | Stmt::Return(_) | Stmt::Assign { .. } => {}
    }
}

/// Steps 4–5: pre-scan for the widest `Load` call against the function's
/// element type and seed the function-wide inferred lane count, tracking
/// each load-assigned variable's own inferred (lane count, element type)
/// along the way.
fn prescan_loads(block: &Block, ctx: &mut TransformContext, element_type: ElementType) {
    for node in block {
        prescan_stmt(&node.node, ctx, element_type);
    }
}

fn prescan_stmt(stmt: &Stmt, ctx: &mut TransformContext, element_type: ElementType) {
    match stmt {
        Stmt::Assign {
            lhs,
            op: simd_ir::AssignOp::Define,
            rhs,
        } if lhs.len() == 1 && rhs.len() == 1 => {
            if let (Some(name), Some((call_name, args))) = (lhs[0].as_ident(), as_plain_call(&rhs[0]))
                && call_name == "Load"
                && let Some(slice_expr) = args.first()
            {
                let lanes = detect_static_slice_width(slice_expr).unwrap_or(0);
                if lanes > 0 {
                    ctx.record_load(name, element_type, lanes);
                }
            }
        }
        Stmt::If { then_block, else_block, .. } => {
            prescan_loads(then_block, ctx, element_type);
            if let Some(b) = else_block {
                prescan_loads(b, ctx, element_type);
            }
        }
        Stmt::For { body, .. } => prescan_loads(body, ctx, element_type),
        Stmt::Range { body, .. } => prescan_loads(body, ctx, element_type),
        Stmt::Switch { cases, .. } => {
            for c in cases {
                prescan_loads(&c.body, ctx, element_type);
            }
        }
        Stmt::Block(b) => prescan_loads(b, ctx, element_type),
        _ => {}
    }
}

/// Statically detectable slice width from a load argument's source shape:
/// `data[:16]` (scenario 6) or `in[lo:hi]` with literal bounds. Anything
/// else (e.g. `in[i:]`, the common strided-loop shape) has no statically
/// detectable width and is left to the target default.
pub(crate) fn detect_static_slice_width(expr: &Expr) -> Option<u32> {
    match expr {
        Expr::Slice {
            low: None,
            high: Some(high),
            ..
        } => match high.as_ref() {
            Expr::Int(n) => Some(*n as u32),
            _ => None,
        },
        Expr::Slice {
            low: Some(low),
            high: Some(high),
            ..
        } => match (low.as_ref(), high.as_ref()) {
            (Expr::Int(lo), Expr::Int(hi)) if hi >= lo => Some((*hi - *lo) as u32),
            _ => None,
        },
        _ => None,
    }
}
