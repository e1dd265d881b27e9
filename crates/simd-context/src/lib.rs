//! The per-specialization mutable scratchpad (§3 "TransformContext").
//!
//! One `TransformContext` is created per (base-function, target,
//! element-type) triple, lives for exactly one call of the top-level
//! `transform`, and is discarded (§3 "Lifecycle"). Nothing here is shared
//! across specializations — no globals, per §5 "Concurrency & resource
//! model".

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use simd_ir::{Expr, TypeExpr};
use simd_target::{ElementType, Target};

/// What a local variable is known to hold, accumulated during context
/// construction (§4.3) and refined as later passes observe loads.
#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub declared_type: Option<TypeExpr>,
    pub inferred_element_type: Option<ElementType>,
    pub inferred_lanes: Option<u32>,
}

impl VarInfo {
    pub fn declared(ty: TypeExpr) -> Self {
        Self {
            declared_type: Some(ty),
            inferred_element_type: None,
            inferred_lanes: None,
        }
    }

    pub fn untyped() -> Self {
        Self {
            declared_type: None,
            inferred_element_type: None,
            inferred_lanes: None,
        }
    }

    pub fn with_inferred(mut self, element_type: ElementType, lanes: u32) -> Self {
        self.inferred_element_type = Some(element_type);
        self.inferred_lanes = Some(lanes);
        self
    }
}

/// One entry of the constant hoister's table (§4.7). Keyed on the local
/// variable name being hoisted away; `generated_name` is what replaces the
/// local at every reference.
#[derive(Debug, Clone, PartialEq)]
pub struct HoistedConstant {
    pub local_name: String,
    pub generated_name: String,
    pub value: Expr,
    pub vector_type_name: String,
}

/// The hoisted-constant table (§3, §4.7). Keys are unique within one
/// function (the invariant the constant hoister maintains); emission order
/// is a pure function of the key set (§8 "Hoisted-constant emission order
/// is a pure function of the set of keys").
#[derive(Debug, Default, Clone)]
pub struct HoistedConstants {
    entries: AHashMap<String, HoistedConstant>,
}

impl HoistedConstants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hoisted constant. Returns `false` (and leaves the table
    /// untouched) if `local_name` is already registered, preserving the
    /// per-function key uniqueness invariant.
    pub fn insert(&mut self, entry: HoistedConstant) -> bool {
        if self.entries.contains_key(&entry.local_name) {
            return false;
        }
        self.entries.insert(entry.local_name.clone(), entry);
        true
    }

    pub fn get(&self, local_name: &str) -> Option<&HoistedConstant> {
        self.entries.get(local_name)
    }

    pub fn contains(&self, local_name: &str) -> bool {
        self.entries.contains_key(local_name)
    }

    /// Deterministic emission order: sorted by key (§4.7 "Emission", §8).
    pub fn ordered(&self) -> Vec<&HoistedConstant> {
        let sorted: BTreeMap<&str, &HoistedConstant> =
            self.entries.iter().map(|(k, v)| (k.as_str(), v)).collect();
        sorted.into_values().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The per-specialization mutable scratchpad (§3).
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub function_name: String,
    pub target: Target,
    pub element_type: ElementType,

    /// Local-variable name → declared/inferred type info.
    pub vars: AHashMap<String, VarInfo>,
    /// Names bound anywhere in the body (`:=`, `var`, `for i :=`, `for _, x
    /// := range`), §4.3 step 3 — prevents the constant hoister from lifting
    /// locals and lets the identifier resolver tell a local shadowing a
    /// type-parameter name from a genuine type-parameter reference.
    pub locally_defined: AHashSet<String>,
    /// Variables assigned from a lane-count query (`v.NumLanes()`), used by
    /// post-processor 3's numeric-constant rewrite.
    pub lane_query_vars: AHashSet<String>,
    /// Variables declared as a stack array (`var buf [N]T`), used by
    /// post-processor 5's slice fix-up.
    pub stack_array_vars: AHashSet<String>,
    /// Half-precision scalar holders, used by post-processor 6.
    pub half_precision_scalar_vars: AHashSet<String>,
    /// Half-precision slice holders.
    pub half_precision_slice_vars: AHashSet<String>,

    /// Function-wide inferred lane count, seeded from the largest
    /// load-slice width seen for the function's element type (§4.3 step 4).
    pub inferred_lane_count: Option<u32>,

    pub hoisted: HoistedConstants,

    /// Counter for fresh inline-rename suffixes (§4.5, §5 "Inlining keeps
    /// an explicit counter to guarantee fresh variable names").
    inline_suffix_counter: u32,

    /// Set when a function must remain on the generic half-precision path
    /// even though its own body would otherwise qualify for promotion/
    /// native lowering (§3, §4.6 "Half-precision policy" regime 3, §9 "the
    /// half-precision fixpoint ... treat classification as monotone").
    pub force_generic_half_precision: bool,
}

impl TransformContext {
    pub fn new(function_name: impl Into<String>, target: Target, element_type: ElementType) -> Self {
        Self {
            function_name: function_name.into(),
            target,
            element_type,
            vars: AHashMap::new(),
            locally_defined: AHashSet::new(),
            lane_query_vars: AHashSet::new(),
            stack_array_vars: AHashSet::new(),
            half_precision_scalar_vars: AHashSet::new(),
            half_precision_slice_vars: AHashSet::new(),
            inferred_lane_count: None,
            hoisted: HoistedConstants::new(),
            inline_suffix_counter: 0,
            force_generic_half_precision: false,
        }
    }

    pub fn declare_local(&mut self, name: impl Into<String>, info: VarInfo) {
        let name = name.into();
        self.locally_defined.insert(name.clone());
        self.vars.insert(name, info);
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.locally_defined.contains(name)
    }

    pub fn record_load(&mut self, var_name: &str, element_type: ElementType, lanes: u32) {
        let info = self.vars.entry(var_name.to_string()).or_insert_with(VarInfo::untyped);
        info.inferred_element_type = Some(element_type);
        info.inferred_lanes = Some(lanes);
        if element_type == self.element_type {
            self.inferred_lane_count = Some(self.inferred_lane_count.unwrap_or(0).max(lanes));
        }
    }

    /// The lane count a vector-variable operation should use: the
    /// variable's own inferred lane count if known, else the function's
    /// default (§4.6 "Reduction inlining": "the lane count is taken from
    /// the inferred vector-variable type when available, otherwise the
    /// function default").
    pub fn lanes_for_var_or_default(&self, var_name: &str, default: u32) -> u32 {
        self.vars
            .get(var_name)
            .and_then(|v| v.inferred_lanes)
            .unwrap_or(default)
    }

    /// Returns a fresh suffix for α-renaming a helper's locals during
    /// inlining (§4.5). Monotonically increasing within one context's
    /// lifetime, so two inlined call sites of the same helper never
    /// collide.
    pub fn next_inline_suffix(&mut self) -> String {
        let s = self.inline_suffix_counter;
        self.inline_suffix_counter += 1;
        format!("inl{s}")
    }
}
