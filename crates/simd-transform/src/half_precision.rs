//! Half-precision classification (§4.6 "Half-precision policy", §9 Open
//! Question: "treat classification as monotone"). A function is classified
//! "generic" — confined to the `force_generic` specialize-type regime even
//! on targets that would otherwise promote or natively support f16/bf16 —
//! when either its own body directly calls an operation with no
//! half-precision backend variant, or it calls (directly or transitively)
//! another function already classified generic. The fixpoint below computes
//! that set once per front-end unit, before any single function is
//! transformed (§6).

use ahash::{AHashMap, AHashSet};

use simd_ir::ParsedFunc;
use simd_ir::tree::map_block_exprs;
use simd_ir::{Block, Expr};

/// Operations with no half-precision backend variant on any modeled target
/// (§4.6 scenario 4: "`BaseF()` ... uses `RoundToEven` (no half-precision
/// backend variant)"). `Sqrt` is deliberately absent — every modeled
/// backend carries a half-precision square root.
const NO_HALF_PRECISION_BACKEND: &[&str] = &["RoundToEven", "Pow", "Exp", "Log", "Sin", "Cos"];

fn call_name(callee: &Expr) -> Option<&str> {
    match callee {
        Expr::Ident(n) => Some(n.as_str()),
        Expr::Selector { field, .. } => Some(field.as_str()),
        _ => None,
    }
}

/// Whether `body` directly calls an operation with no half-precision
/// backend variant. Read-only: `map_block_exprs` is reused purely for its
/// bottom-up traversal, the rewritten tree is discarded.
pub fn needs_generic_half_precision(body: &Block) -> bool {
    let mut found = false;
    let _ = map_block_exprs(body.clone(), &mut |e| {
        if let Expr::Call { callee, .. } = &e
            && let Some(name) = call_name(callee)
            && NO_HALF_PRECISION_BACKEND.contains(&name)
        {
            found = true;
        }
        e
    });
    found
}

/// Every bare (non-selector) call target in `body` — same-file helpers and
/// `Base*` callees, the only calls that matter for the cross-function part
/// of the classification (a selector call is always a backend or ambient
/// package call, never a same-file function).
fn direct_callees(body: &Block) -> AHashSet<String> {
    let mut names = AHashSet::new();
    let _ = map_block_exprs(body.clone(), &mut |e| {
        if let Expr::Call { callee, .. } = &e
            && let Expr::Ident(name) = callee.as_ref()
        {
            names.insert(name.clone());
        }
        e
    });
    names
}

/// §6: computes the generic set for a whole front-end unit. Classification
/// is monotone — a function only ever joins the set, never leaves it — so a
/// simple work-to-fixpoint loop over the (small, per-file) call graph
/// terminates.
pub fn compute_generic_half_precision_set(functions: &[ParsedFunc]) -> AHashSet<String> {
    let mut generic: AHashSet<String> = functions
        .iter()
        .filter(|f| needs_generic_half_precision(&f.body))
        .map(|f| f.name.clone())
        .collect();

    let callees_by_fn: AHashMap<String, AHashSet<String>> =
        functions.iter().map(|f| (f.name.clone(), direct_callees(&f.body))).collect();

    loop {
        let mut changed = false;
        for f in functions {
            if generic.contains(&f.name) {
                continue;
            }
            if let Some(callees) = callees_by_fn.get(&f.name)
                && callees.iter().any(|c| generic.contains(c))
            {
                generic.insert(f.name.clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    generic
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simd_ir::{Stmt, StmtNode};

    fn func(name: &str, body: Block) -> ParsedFunc {
        ParsedFunc {
            name: name.to_string(),
            type_params: vec![],
            params: vec![],
            results: vec![],
            body,
            hwy_calls: vec![],
            loop_info: None,
            conditional_blocks: vec![],
        }
    }

    #[test]
    fn direct_use_of_unsupported_op_is_generic() {
        let body: Block = vec![StmtNode::new(Stmt::expr(Expr::call(
            Expr::selector(Expr::ident("v"), "RoundToEven"),
            [],
            vec![],
        )))];
        assert!(needs_generic_half_precision(&body));
    }

    #[test]
    fn pure_arithmetic_body_is_not_generic() {
        let body: Block = vec![StmtNode::new(Stmt::expr(Expr::call(
            Expr::selector(Expr::ident("v"), "Add"),
            [],
            vec![Expr::ident("w")],
        )))];
        assert!(!needs_generic_half_precision(&body));
    }

    #[test]
    fn caller_of_a_generic_function_is_transitively_generic() {
        let base_f = func(
            "BaseF",
            vec![StmtNode::new(Stmt::expr(Expr::call(
                Expr::selector(Expr::ident("v"), "RoundToEven"),
                [],
                vec![],
            )))],
        );
        let base_g = func(
            "BaseG",
            vec![StmtNode::new(Stmt::expr(Expr::call(Expr::ident("BaseF"), [], vec![])))],
        );
        let set = compute_generic_half_precision_set(&[base_f, base_g]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("BaseF"));
        assert!(set.contains("BaseG"));
    }

    #[test]
    fn unrelated_function_stays_out_of_the_set() {
        let base_f = func(
            "BaseF",
            vec![StmtNode::new(Stmt::expr(Expr::call(
                Expr::selector(Expr::ident("v"), "RoundToEven"),
                [],
                vec![],
            )))],
        );
        let base_h = func(
            "BaseH",
            vec![StmtNode::new(Stmt::expr(Expr::call(
                Expr::selector(Expr::ident("v"), "Add"),
                [],
                vec![Expr::ident("w")],
            )))],
        );
        let set = compute_generic_half_precision_set(&[base_f, base_h]);
        assert!(!set.contains("BaseH"));
    }
}
