//! Whole-pipeline coverage across the full target × element-type matrix
//! (§8 "universally quantified" properties), complementing the per-pass
//! unit tests colocated in each `simd-transform` module.

mod common;

use common::{ALL_ELEMENT_TYPES, ALL_TARGETS, base_add, run};
use pretty_assertions::assert_eq;
use simd_target::TargetDescriptor;

#[test]
fn every_target_element_type_pair_specializes_without_error() {
    for target in ALL_TARGETS {
        for element_type in ALL_ELEMENT_TYPES {
            let parsed = base_add();
            let outcome = run(&parsed, target, element_type);
            assert!(
                !outcome.diagnostics.has_errors(),
                "{target:?}/{element_type:?} produced error diagnostics: {:?}",
                outcome.diagnostics.errors().collect::<Vec<_>>()
            );
            assert!(
                outcome.function.type_params.is_empty(),
                "{target:?}/{element_type:?} left type parameters on the assembled signature"
            );
        }
    }
}

#[test]
fn fallback_never_unrolls_across_every_element_type() {
    for element_type in ALL_ELEMENT_TYPES {
        let parsed = base_add();
        let outcome = run(&parsed, simd_target::Target::Fallback, element_type);
        assert!(outcome.function.name.starts_with("BaseAdd_fallback"));
    }
}

#[test]
fn hoisted_constant_names_are_disjoint_across_specializations() {
    let parsed = base_add();
    let mut seen = std::collections::HashSet::new();
    for target in ALL_TARGETS {
        for element_type in ALL_ELEMENT_TYPES {
            let outcome = run(&parsed, target, element_type);
            for c in &outcome.hoisted_constants {
                assert!(
                    seen.insert(c.generated_name.clone()),
                    "constant name `{}` collided across specializations",
                    c.generated_name
                );
            }
        }
    }
}

#[test]
fn hoisted_constant_emission_order_is_deterministic() {
    let parsed = base_add();
    let first = run(&parsed, simd_target::Target::Avx2, simd_target::ElementType::F32);
    let second = run(&parsed, simd_target::Target::Avx2, simd_target::ElementType::F32);
    assert_eq!(first.hoisted_constants, second.hoisted_constants);
}

#[test]
fn identifier_resolution_is_idempotent() {
    let parsed = base_add();
    for target in ALL_TARGETS {
        for element_type in ALL_ELEMENT_TYPES {
            let td = TargetDescriptor::new(target);
            let once = simd_transform::identifier_resolver::resolve_identifiers(
                parsed.body.clone(),
                &parsed,
                &td,
                element_type,
            );
            let twice = simd_transform::identifier_resolver::resolve_identifiers(once.clone(), &parsed, &td, element_type);
            assert_eq!(once, twice, "{target:?}/{element_type:?} resolver was not idempotent");
        }
    }
}
