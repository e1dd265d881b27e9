//! Result assembly (§4.10) — the final step: compute the specialized
//! function's name, lower its parameter and return types the same way the
//! operation lowerer lowers type arguments inside the body (so a `Vec[T]`
//! parameter and a `Vec[T]` cast inside the body always agree on the
//! concrete backend type), and package the already-transformed body under
//! that signature.

use simd_ir::{Block, Param, ParsedFunc, ReturnField, TypeExpr};
use simd_target::{ElementType, TargetDescriptor};

use crate::{identifier_resolver, lowerer, naming};

/// The generated function (§3, §4.10). Hoisted-constant declarations are
/// reported alongside this in `TransformOutcome`, not carried on it — they
/// are package-level, not part of the function itself.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFunction {
    pub name: String,
    pub type_params: Vec<TypeExpr>,
    pub params: Vec<Param>,
    pub results: Vec<ReturnField>,
    pub body: Block,
}

/// §4.10: "Name = `<BaseName><TargetSuffix>[<TypeTag>]`", then the
/// parameter/return types are specialized the same way a `Vec[T]` type
/// argument inside the body would be (type-parameter substitution first,
/// then `lowerer::specialize_type`), and the already fully-transformed body
/// is carried through unchanged.
pub fn assemble(
    parsed: &ParsedFunc,
    body: Block,
    element_type: ElementType,
    td: &TargetDescriptor,
    force_generic_half_precision: bool,
) -> OutputFunction {
    let has_type_params = !parsed.type_params.is_empty();
    let name = naming::specialized_function_name(&parsed.name, td, element_type, has_type_params);

    let params = parsed
        .params
        .iter()
        .map(|p| Param::new(p.name.clone(), specialize_signature_type(&p.ty, parsed, td, element_type, force_generic_half_precision)))
        .collect();
    let results = parsed
        .results
        .iter()
        .map(|r| ReturnField {
            name: r.name.clone(),
            ty: specialize_signature_type(&r.ty, parsed, td, element_type, force_generic_half_precision),
        })
        .collect();

    OutputFunction {
        name,
        // A specialization has no type parameters of its own (§4.10: every
        // type parameter has been resolved to the concrete element type).
        type_params: Vec::new(),
        params,
        results,
        body,
    }
}

fn specialize_signature_type(
    ty: &TypeExpr,
    parsed: &ParsedFunc,
    td: &TargetDescriptor,
    element_type: ElementType,
    force_generic: bool,
) -> TypeExpr {
    let substituted = identifier_resolver::resolve_type(ty, parsed, td, element_type);
    lowerer::specialize_type(&substituted, td, element_type, force_generic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simd_ir::{Stmt, StmtNode, TypeParam};
    use simd_target::Target;

    fn base_add() -> ParsedFunc {
        ParsedFunc {
            name: "BaseAdd".into(),
            type_params: vec![TypeParam::new("T", "Floats")],
            params: vec![
                Param::new("in", TypeExpr::slice(TypeExpr::named("T"))),
                Param::new("out", TypeExpr::slice(TypeExpr::named("T"))),
            ],
            results: vec![],
            body: vec![StmtNode::new(Stmt::expr(simd_ir::Expr::ident("noop")))],
            hwy_calls: vec![],
            loop_info: None,
            conditional_blocks: vec![],
        }
    }

    #[test]
    fn assembled_name_and_signature_match_target_and_element_type() {
        let td = TargetDescriptor::new(Target::Avx2);
        let out = assemble(&base_add(), base_add().body, ElementType::F32, &td, false);
        assert_eq!(out.name, "BaseAdd_AVX2");
        assert_eq!(out.params[0].ty.to_string(), "[]archsimd.Float32x8");
        assert!(out.type_params.is_empty());
    }

    #[test]
    fn non_default_element_type_carries_a_name_tag() {
        let td = TargetDescriptor::new(Target::Neon);
        let out = assemble(&base_add(), base_add().body, ElementType::F64, &td, false);
        assert_eq!(out.name, "BaseAdd_NEON_f64");
        assert_eq!(out.params[0].ty.to_string(), "[]archsimd.Float64x2");
    }

    #[test]
    fn force_generic_keeps_vec_type_abstract() {
        let mut parsed = base_add();
        parsed.params[0].ty = TypeExpr::slice(TypeExpr::Generic("Vec".into(), vec![TypeExpr::named("T")]));
        let td = TargetDescriptor::new(Target::Avx2);
        let out = assemble(&parsed, parsed.body.clone(), ElementType::F16, &td, true);
        assert_eq!(out.params[0].ty.to_string(), "[]Vec[float16.Float16]");
    }
}
