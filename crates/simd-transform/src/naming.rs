//! Naming helpers shared by the operation lowerer (`Base*` callee suffixing,
//! §4.6 "Cross-package `Base*` calls") and result assembly (generated
//! function naming, §4.10), so the two halves of "what a specialization is
//! called" can never drift apart.

use simd_target::{ElementType, TargetDescriptor};

/// §4.10 "Name = `<BaseName><TargetSuffix>[<TypeTag>]`", §6 "emitted naming
/// scheme". `f32` is treated as the default element type: a generic base
/// function's f32 specialization carries no type tag, matching §4.10's
/// "type tag only for non-default element types when the base has type
/// parameters".
pub fn specialized_function_name(
    base_name: &str,
    td: &TargetDescriptor,
    element_type: ElementType,
    has_type_params: bool,
) -> String {
    let mut name = format!("{base_name}_{}", td.suffix());
    if has_type_params && element_type != ElementType::F32 {
        name.push('_');
        name.push_str(element_type.suffix());
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simd_target::Target;

    #[test]
    fn default_element_type_carries_no_tag() {
        let td = TargetDescriptor::new(Target::Avx2);
        assert_eq!(
            specialized_function_name("BaseAdd", &td, ElementType::F32, true),
            "BaseAdd_AVX2"
        );
        assert_eq!(
            specialized_function_name("BaseAdd", &td, ElementType::F64, true),
            "BaseAdd_AVX2_f64"
        );
    }

    #[test]
    fn non_generic_base_never_carries_a_tag() {
        let td = TargetDescriptor::new(Target::Neon);
        assert_eq!(
            specialized_function_name("BaseFoo", &td, ElementType::F64, false),
            "BaseFoo_NEON"
        );
    }
}
