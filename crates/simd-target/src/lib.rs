//! Per-target static tables (§3 "Target descriptor", §4.1). Everything here
//! is pure data: element-type → lane count, element-type → vector type
//! name, and the operation dispatch map. Adding a target is adding a table
//! entry, not new rewrite logic (§4.1 "Why this shape").

use std::fmt;

/// One of the four backend variants the generator emits against (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Fallback,
    Neon,
    Avx2,
    Avx512,
}

impl Target {
    pub const ALL: [Target; 4] = [Target::Fallback, Target::Neon, Target::Avx2, Target::Avx512];

    /// The suffix embedded both in generated function names
    /// (`<BaseName>_<suffix>`) and in hoisted-constant names
    /// (`<BaseName>_<Suffix>_<LocalName>_<ElemTag>`, §6). The fallback
    /// target's function suffix is lowercase (`BaseAdd_fallback`, §4.8
    /// "Tail handling") while the vector targets are upper-case, matching
    /// the backend package's own naming.
    pub fn suffix(&self) -> &'static str {
        match self {
            Target::Fallback => "fallback",
            Target::Neon => "NEON",
            Target::Avx2 => "AVX2",
            Target::Avx512 => "AVX512",
        }
    }

    /// Whether this target ever unrolls its main SIMD loop (§4.8: "Fallback
    /// is never unrolled").
    pub fn unrolls(&self) -> bool {
        !matches!(self, Target::Fallback)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Element types the generator specializes over (GLOSSARY tags:
/// `f32, f64, f16, bf16, i32, i64, u32, u64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    F32,
    F64,
    F16,
    Bf16,
    I32,
    I64,
    U32,
    U64,
}

impl ElementType {
    pub const ALL: [ElementType; 8] = [
        ElementType::F32,
        ElementType::F64,
        ElementType::F16,
        ElementType::Bf16,
        ElementType::I32,
        ElementType::I64,
        ElementType::U32,
        ElementType::U64,
    ];

    /// The suffix used both by the identifier resolver's "suffix swap"
    /// (§4.4) and by hoisted-constant element tags (§6).
    pub fn suffix(&self) -> &'static str {
        match self {
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::F16 => "f16",
            ElementType::Bf16 => "bf16",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::U32 => "u32",
            ElementType::U64 => "u64",
        }
    }

    /// Reverse of `suffix`, used when an identifier already carries a
    /// recognized type suffix and needs swapping to the current element
    /// type (§4.4 "Suffix swap").
    pub fn from_suffix(s: &str) -> Option<ElementType> {
        Self::ALL.into_iter().find(|et| et.suffix() == s)
    }

    pub fn is_half_precision(&self) -> bool {
        matches!(self, ElementType::F16 | ElementType::Bf16)
    }

    /// Byte width of one scalar element, used by the narrower-load
    /// detection in §4.6 ("a load on a slice of statically detectable
    /// width `w < default_lanes × elem_size`").
    pub fn byte_width(&self) -> u32 {
        match self {
            ElementType::F16 | ElementType::Bf16 => 2,
            ElementType::F32 | ElementType::I32 | ElementType::U32 => 4,
            ElementType::F64 | ElementType::I64 | ElementType::U64 => 8,
        }
    }

    /// The `Float32`/`Int32`/`Uint64`/... name fragment used to build a
    /// vector type name (`Float32x8`).
    fn capitalized_name(&self) -> &'static str {
        match self {
            ElementType::F32 => "Float32",
            ElementType::F64 => "Float64",
            ElementType::F16 => "Float16",
            ElementType::Bf16 => "BFloat16",
            ElementType::I32 => "Int32",
            ElementType::I64 => "Int64",
            ElementType::U32 => "Uint32",
            ElementType::U64 => "Uint64",
        }
    }

    /// f32 is the compute-in-float32 convention's fallback element type
    /// (§4.4 "Base-name lookup" — "if no exact match, fall back to the
    /// f32 variant for half-precision").
    pub fn f32_fallback(&self) -> ElementType {
        if self.is_half_precision() { ElementType::F32 } else { *self }
    }
}

/// How an operation is called on its output vector type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// `a.Op(b, c)` — a method on the concrete vector type.
    Method,
    /// `<backend-package>.BackendName(args...)` — a free function, used for
    /// constructors (`Load`, `Broadcast`, `Zero`) and store.
    Free,
    /// No direct backend call exists; the lowerer synthesizes an identity
    /// (§4.6: `Neg`, `Abs`, `IsNaN`, `MaskNot`).
    Synthesized,
}

/// Backend sub-package an operation's free function or special helper lives
/// in (§3 OpInfo: "core", "special", "hwy-wrapper", or a contrib package).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendPackage {
    Core,
    Special,
    HwyWrapper,
    Contrib(String),
}

/// Per (target, operation-name) dispatch record (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpInfo {
    pub dispatch: Dispatch,
    pub backend_name: String,
    pub package: BackendPackage,
    pub inplace_variant: Option<String>,
    pub accumulator_arg_index: Option<usize>,
}

impl OpInfo {
    fn method(name: &str) -> Self {
        Self {
            dispatch: Dispatch::Method,
            backend_name: name.to_string(),
            package: BackendPackage::Core,
            inplace_variant: None,
            accumulator_arg_index: None,
        }
    }

    fn free(name: &str, package: BackendPackage) -> Self {
        Self {
            dispatch: Dispatch::Free,
            backend_name: name.to_string(),
            package,
            inplace_variant: None,
            accumulator_arg_index: None,
        }
    }

    fn synthesized(name: &str) -> Self {
        Self {
            dispatch: Dispatch::Synthesized,
            backend_name: name.to_string(),
            package: BackendPackage::Core,
            inplace_variant: None,
            accumulator_arg_index: None,
        }
    }

    fn with_inplace(mut self, variant: &str, accumulator_arg_index: usize) -> Self {
        self.inplace_variant = Some(variant.to_string());
        self.accumulator_arg_index = Some(accumulator_arg_index);
        self
    }
}

/// Complexity class used by the loop transformer's unroll heuristic
/// (§4.8). Not per-target: the same call classifies the same way
/// everywhere, only the *base factor* and target-specific bonus differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpComplexity {
    Simple,
    Medium,
    Complex,
    Reduction,
}

impl OpComplexity {
    pub fn base_unroll_factor(&self) -> u32 {
        match self {
            OpComplexity::Simple => 4,
            OpComplexity::Medium => 2,
            OpComplexity::Complex => 2,
            OpComplexity::Reduction => 2,
        }
    }
}

/// Classifies a vocabulary operation name for the unroll heuristic (§4.8).
pub fn op_complexity(name: &str) -> OpComplexity {
    match name {
        "Add" | "Sub" | "Mul" | "Div" | "MulAdd" | "Load" | "Store" | "Broadcast" | "Set"
        | "Zero" | "Neg" | "Abs" | "Min" | "Max" => OpComplexity::Simple,
        "Eq" | "Ne" | "Lt" | "Le" | "Gt" | "Ge" | "Select" | "Blend" | "Shuffle" | "And"
        | "Or" | "Xor" | "Not" | "IsNaN" => OpComplexity::Medium,
        "Sqrt" | "RoundToEven" | "Pow" | "Exp" | "Log" | "Sin" | "Cos" => OpComplexity::Complex,
        "ReduceSum" | "ReduceMax" | "ReduceMin" => OpComplexity::Reduction,
        _ => OpComplexity::Medium,
    }
}

/// True for the reduction family, used by the operation lowerer to route
/// into reduction inlining instead of a table lookup (§4.6: no modeled
/// target carries a native reduction method, so these never resolve
/// through `TargetDescriptor::op`).
pub fn is_reduction_op(name: &str) -> bool {
    matches!(name, "ReduceSum" | "ReduceMax" | "ReduceMin")
}

/// The target descriptor contract (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDescriptor {
    target: Target,
}

impl TargetDescriptor {
    pub fn new(target: Target) -> Self {
        Self { target }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn suffix(&self) -> &'static str {
        self.target.suffix()
    }

    /// Default (full-width) lane count for `element_type` on this target.
    pub fn lanes_for(&self, element_type: ElementType) -> u32 {
        use ElementType::*;
        match self.target {
            Target::Fallback => 1,
            Target::Neon => match element_type {
                F32 | I32 | U32 => 4,
                F64 | I64 | U64 => 2,
                F16 | Bf16 => 8,
            },
            Target::Avx2 => match element_type {
                F32 | I32 | U32 => 8,
                F64 | I64 | U64 => 4,
                F16 | Bf16 => 16,
            },
            Target::Avx512 => match element_type {
                F32 | I32 | U32 => 16,
                F64 | I64 | U64 => 8,
                F16 | Bf16 => 32,
            },
        }
    }

    /// The element type a vector of `element_type` is actually computed in
    /// on this target (§4.6 "Half-precision policy"). Native NEON and every
    /// non-half-precision case compute directly in `element_type`; promoted
    /// AVX computes in f32 and converts at the load/store boundary.
    pub fn compute_element_type(&self, element_type: ElementType) -> ElementType {
        if self.is_half_precision_promoted(element_type) { ElementType::F32 } else { element_type }
    }

    /// Backend vector type name at the default lane count, e.g.
    /// `Float32x8`. On `Fallback` this is just the scalar type name. For a
    /// half-precision element type on a promoted-AVX target this names the
    /// internal f32-backed compute vector (`Float32x16`, not `Float16x16`)
    /// — regime 2 is "backed internally by f32 vectors" (§4.6), distinct
    /// from regime 1's native NEON name. Use [`Self::native_vector_type_name`]
    /// for the type that actually matches the slice's in-memory layout.
    pub fn vector_type_name(&self, element_type: ElementType) -> String {
        self.vector_type_name_at(element_type, self.lanes_for(element_type))
    }

    /// Backend vector type name at an explicit (possibly narrower) lane
    /// count, used by narrow-load detection (§4.6, scenario 6) and by the
    /// constant hoister when the inferred lane count is smaller than the
    /// target default (§4.7).
    pub fn vector_type_name_at(&self, element_type: ElementType, lanes: u32) -> String {
        if matches!(self.target, Target::Fallback) {
            return self.scalar_type_name(element_type).to_string();
        }
        format!("{}x{}", self.compute_element_type(element_type).capitalized_name(), lanes)
    }

    /// The vector type matching `element_type`'s actual in-memory layout,
    /// regardless of compute regime — what `Load`/`Store` read and write.
    /// Equal to [`Self::vector_type_name`] everywhere except promoted AVX,
    /// where the compute type diverges from storage and the lowerer must
    /// bridge the two with `Wrap`/`Unwrap` conversions (§4.6).
    pub fn native_vector_type_name(&self, element_type: ElementType) -> String {
        self.native_vector_type_name_at(element_type, self.lanes_for(element_type))
    }

    pub fn native_vector_type_name_at(&self, element_type: ElementType, lanes: u32) -> String {
        if matches!(self.target, Target::Fallback) {
            return self.scalar_type_name(element_type).to_string();
        }
        format!("{}x{}", element_type.capitalized_name(), lanes)
    }

    /// The host-scalar conversion package for a half-precision element type
    /// (`float16`/`bfloat16`, matching `scalar_type_name`'s own qualifier),
    /// used to wrap a host float literal before broadcasting it into a
    /// native half-precision vector (§4.6 regime 1: "wrap constant
    /// broadcasts with ... a host-scalar conversion helper").
    pub fn half_precision_package(&self, element_type: ElementType) -> Option<&'static str> {
        match element_type {
            ElementType::F16 => Some("float16"),
            ElementType::Bf16 => Some("bfloat16"),
            _ => None,
        }
    }

    pub fn scalar_type_name(&self, element_type: ElementType) -> &'static str {
        match element_type {
            ElementType::F32 => "float32",
            ElementType::F64 => "float64",
            ElementType::F16 => "float16.Float16",
            ElementType::Bf16 => "bfloat16.BFloat16",
            ElementType::I32 => "int32",
            ElementType::I64 => "int64",
            ElementType::U32 => "uint32",
            ElementType::U64 => "uint64",
        }
    }

    pub fn short_type_tag(&self, element_type: ElementType) -> String {
        format!(
            "{}x{}",
            element_type.suffix().to_ascii_uppercase(),
            self.lanes_for(element_type)
        )
    }

    /// The backend package functions/methods for vector operations live
    /// in, e.g. `archsimd` (§6, scenario 6: `archsimd.LoadUint8x16Slice`).
    pub fn backend_package(&self) -> &'static str {
        "archsimd"
    }

    /// §4.6 "Half-precision policy": regime 2, "Promoted AVX" — backed
    /// internally by f32 vectors. NEON is regime 1 (native); Fallback
    /// never promotes (regime 3, generic).
    pub fn is_half_precision_promoted(&self, element_type: ElementType) -> bool {
        element_type.is_half_precision() && matches!(self.target, Target::Avx2 | Target::Avx512)
    }

    pub fn is_half_precision_native(&self, element_type: ElementType) -> bool {
        element_type.is_half_precision() && matches!(self.target, Target::Neon)
    }

    /// Per (target, operation-name) dispatch lookup (§4.1).
    pub fn op(&self, operation_name: &str) -> Option<OpInfo> {
        if is_reduction_op(operation_name) {
            return None;
        }
        match operation_name {
            "Load" => Some(OpInfo::free("LoadSlice", BackendPackage::Core)),
            "Store" => Some(OpInfo::free("StoreSlice", BackendPackage::Core)),
            "Broadcast" | "Set" => Some(OpInfo::free("Broadcast", BackendPackage::Core)),
            "Zero" => Some(OpInfo::free("Zero", BackendPackage::Core)),
            "Add" => Some(OpInfo::method("Add")),
            "Sub" => Some(OpInfo::method("Sub")),
            "Mul" => Some(OpInfo::method("Mul")),
            "Div" => Some(OpInfo::method("Div")),
            "MulAdd" => Some(self.mul_add_op()),
            "Max" => Some(OpInfo::method("Max")),
            "Min" => Some(OpInfo::method("Min")),
            "Eq" => Some(OpInfo::method("Eq")),
            "Ne" => Some(OpInfo::method("Ne")),
            "Lt" => Some(OpInfo::method("Lt")),
            "Le" => Some(OpInfo::method("Le")),
            "Gt" => Some(OpInfo::method("Gt")),
            "Ge" => Some(OpInfo::method("Ge")),
            "And" => Some(OpInfo::method("And")),
            "Or" => Some(OpInfo::method("Or")),
            "Xor" => Some(OpInfo::method("Xor")),
            "Select" | "Blend" => Some(OpInfo::method("Select")),
            "Shuffle" => Some(OpInfo::method("Shuffle")),
            "Sqrt" => Some(OpInfo::method("Sqrt")),
            "RoundToEven" => Some(OpInfo::method("RoundToEven")),
            "Pow" => Some(OpInfo::free("Pow", BackendPackage::Special)),
            "Neg" => Some(OpInfo::synthesized("NegViaZeroSub")),
            "Abs" => Some(OpInfo::synthesized("AbsViaMaxNegSub")),
            "IsNaN" => Some(OpInfo::synthesized("IsNaNViaSelfEqXor")),
            "Not" | "MaskNot" => Some(OpInfo::synthesized("NotViaXorTrueMask")),
            _ => None,
        }
    }

    fn mul_add_op(&self) -> OpInfo {
        let op = OpInfo::method("MulAdd");
        match self.target {
            Target::Fallback => op,
            Target::Neon | Target::Avx2 | Target::Avx512 => op.with_inplace("MulAddAcc", 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lane_counts_match_register_widths() {
        let avx2 = TargetDescriptor::new(Target::Avx2);
        assert_eq!(avx2.lanes_for(ElementType::F32), 8);
        assert_eq!(avx2.lanes_for(ElementType::F64), 4);
        let avx512 = TargetDescriptor::new(Target::Avx512);
        assert_eq!(avx512.lanes_for(ElementType::F32), 16);
        let neon = TargetDescriptor::new(Target::Neon);
        assert_eq!(neon.lanes_for(ElementType::F32), 4);
        assert_eq!(TargetDescriptor::new(Target::Fallback).lanes_for(ElementType::U32), 1);
    }

    #[test]
    fn vector_type_name_formats_as_expected() {
        let avx2 = TargetDescriptor::new(Target::Avx2);
        assert_eq!(avx2.vector_type_name(ElementType::F32), "Float32x8");
        assert_eq!(avx2.vector_type_name_at(ElementType::U32, 4), "Uint32x4");
    }

    #[test]
    fn mul_add_has_inplace_variant_on_vector_targets() {
        let neon = TargetDescriptor::new(Target::Neon);
        let op = neon.op("MulAdd").unwrap();
        assert_eq!(op.inplace_variant.as_deref(), Some("MulAddAcc"));
        assert_eq!(op.accumulator_arg_index, Some(2));

        let fallback = TargetDescriptor::new(Target::Fallback);
        assert!(fallback.op("MulAdd").unwrap().inplace_variant.is_none());
    }

    #[test]
    fn reduce_sum_never_resolves_through_op_table() {
        for target in Target::ALL {
            let td = TargetDescriptor::new(target);
            assert!(td.op("ReduceSum").is_none());
        }
    }

    #[test]
    fn half_precision_regime_by_target() {
        let avx2 = TargetDescriptor::new(Target::Avx2);
        assert!(avx2.is_half_precision_promoted(ElementType::F16));
        let neon = TargetDescriptor::new(Target::Neon);
        assert!(neon.is_half_precision_native(ElementType::F16));
        assert!(!neon.is_half_precision_promoted(ElementType::F16));
    }

    #[test]
    fn suffix_swap_round_trips() {
        assert_eq!(ElementType::from_suffix("f64"), Some(ElementType::F64));
        assert_eq!(ElementType::F32.f32_fallback(), ElementType::F32);
        assert_eq!(ElementType::F16.f32_fallback(), ElementType::F32);
    }
}
