//! Constant hoisting (§4.7): once the operation lowerer has turned a
//! broadcast-of-constant vocabulary call (`Set[T](1.0)`, `Broadcast[T](0)`)
//! into `<pkg>.Broadcast<VectorType>(<literal>)`, that call is lifted to a
//! package-level declaration and replaced at its call site by a reference
//! to the generated name — so the constant is materialized once per
//! specialization instead of once per loop iteration.
//!
//! Only a literal argument is eligible; a `Broadcast<VectorType>(x)` where
//! `x` is itself a runtime value (e.g. a function parameter) carries no
//! constant to hoist and is left untouched.

use simd_context::{HoistedConstant, TransformContext};
use simd_ir::tree::map_block_exprs;
use simd_ir::{Block, Expr};
use simd_target::{ElementType, TargetDescriptor};

const ONES_WORDS: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven", "twelve",
    "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
];

pub fn hoist_constants(body: Block, ctx: &mut TransformContext, td: &TargetDescriptor) -> Block {
    let pkg = td.backend_package();
    let element_type = ctx.element_type;
    map_block_exprs(body, &mut |e| {
        let Expr::Call { callee, args, .. } = &e else { return e };
        if args.len() != 1 {
            return e;
        }
        let Expr::Selector { base, field } = callee.as_ref() else { return e };
        if base.as_ident() != Some(pkg) || !field.starts_with("Broadcast") {
            return e;
        }
        if literal_value(&args[0]).is_none() {
            return e;
        }
        if !should_hoist(&args[0], element_type, td) {
            return e;
        }
        hoist_one(field, &args[0], ctx)
    })
}

/// §4.7 "Policy carve-outs": half-precision float constants are not
/// hoisted on a *native* half-precision target (NEON) — their broadcast
/// builder there takes a host-scalar conversion, not the plain vector
/// constant a package-level `var` initializer can hold. Integer-mask
/// constants inside half-precision code are hoisted only on *promoted*
/// AVX, where the underlying storage is the f32 compute vector the mask
/// actually matches. Neither carve-out applies outside half-precision
/// element types, where every literal hoists as before.
fn should_hoist(literal: &Expr, element_type: ElementType, td: &TargetDescriptor) -> bool {
    if !element_type.is_half_precision() {
        return true;
    }
    match literal {
        Expr::Float(_) => !td.is_half_precision_native(element_type),
        Expr::Int(_) => td.is_half_precision_promoted(element_type),
        _ => true,
    }
}

fn hoist_one(vt_field: &str, literal: &Expr, ctx: &mut TransformContext) -> Expr {
    let vector_type_name = vt_field.strip_prefix("Broadcast").unwrap_or(vt_field).to_string();
    let local_name = local_name_for(literal);

    if let Some(existing) = ctx.hoisted.get(&local_name) {
        return Expr::ident(existing.generated_name.clone());
    }

    let generated_name = format!(
        "{}_{}_{}_{}",
        ctx.function_name,
        ctx.target.suffix(),
        local_name,
        ctx.element_type.suffix()
    );
    let inserted = ctx.hoisted.insert(HoistedConstant {
        local_name: local_name.clone(),
        generated_name: generated_name.clone(),
        value: literal.clone(),
        vector_type_name,
    });
    debug_assert!(inserted, "local_name_for should only collide for values already hoisted");
    Expr::ident(generated_name)
}

fn literal_value(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Int(n) => Some(*n as f64),
        Expr::Float(f) => Some(*f),
        _ => None,
    }
}

/// A short, readable key for the hoisted-constant table (§4.7, §8
/// "Hoisted-constant emission order is a pure function of the set of
/// keys" — keys must be stable and collision-free across the literals a
/// single function actually broadcasts). Small integer-valued literals
/// spell out as words (`1.0` -> `one`); anything else falls back to a
/// sanitized decimal rendering (`1.5` -> `1_5`, `-2.0` -> `neg_2`).
fn local_name_for(expr: &Expr) -> String {
    let value = literal_value(expr).unwrap_or(0.0);
    let truncated = value.trunc();
    if value == truncated && truncated.abs() < ONES_WORDS.len() as f64 {
        let idx = truncated.abs() as usize;
        if truncated < 0.0 { format!("neg_{}", ONES_WORDS[idx]) } else { ONES_WORDS[idx].to_string() }
    } else {
        let rendered = format!("{value}");
        let sanitized = rendered.replace('.', "_");
        match sanitized.strip_prefix('-') {
            Some(rest) => format!("neg_{rest}"),
            None => sanitized,
        }
    }
}
