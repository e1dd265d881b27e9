//! `ParsedFunc` (§3) — the immutable input record the front-end parser hands
//! to the transformer. Everything in this module is read-only from the
//! transformer's point of view; it is cloned, never mutated in place.

use crate::stmt::{Block, Param};
use crate::types::TypeExpr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParam {
    pub name: String,
    pub constraint: String,
}

impl TypeParam {
    pub fn new(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnField {
    pub name: Option<String>,
    pub ty: TypeExpr,
}

/// The explicit unroll hint carried on `LoopInfo` (§3): "negative = auto,
/// 0 = disable, positive = override".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnrollHint {
    Auto,
    Disabled,
    Fixed(u32),
}

impl From<i32> for UnrollHint {
    fn from(value: i32) -> Self {
        match value {
            v if v < 0 => UnrollHint::Auto,
            0 => UnrollHint::Disabled,
            v => UnrollHint::Fixed(v as u32),
        }
    }
}

/// Identifies the function's main strided loop (§3). Invariant: if present,
/// exactly one loop in the body matches `iterator` — callers that construct
/// a `LoopInfo` by hand are responsible for that invariant; the transformer
/// treats a missing match as "no main loop found" rather than panicking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopInfo {
    pub iterator: String,
    pub bound_name: String,
    pub unroll_hint: UnrollHint,
}

impl LoopInfo {
    pub fn new(iterator: impl Into<String>, bound_name: impl Into<String>, unroll_hint: UnrollHint) -> Self {
        Self {
            iterator: iterator.into(),
            bound_name: bound_name.into(),
            unroll_hint,
        }
    }
}

/// One entry of the pre-extracted call list against the abstract SIMD
/// vocabulary ("HwyCalls", §3). `line` mirrors the owning statement's line
/// when known, so the operation lowerer can cross-reference conditional
/// filtering without re-walking the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRef {
    pub name: String,
    pub line: Option<u32>,
}

/// A `//hwy:if <predicate> ... //hwy:else ... //hwy:endif` region (§4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalBlock {
    pub start_line: u32,
    pub else_line: Option<u32>,
    pub end_line: u32,
    pub predicate: ConditionalPredicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalPredicate {
    Target(String),
    ElementType(String),
    Both(String, String),
    Not(Box<ConditionalPredicate>),
    Any(Vec<ConditionalPredicate>),
}

impl ConditionalPredicate {
    pub fn matches(&self, target: &str, element_type: &str) -> bool {
        match self {
            ConditionalPredicate::Target(t) => t.eq_ignore_ascii_case(target),
            ConditionalPredicate::ElementType(e) => e.eq_ignore_ascii_case(element_type),
            ConditionalPredicate::Both(t, e) => {
                t.eq_ignore_ascii_case(target) && e.eq_ignore_ascii_case(element_type)
            }
            ConditionalPredicate::Not(inner) => !inner.matches(target, element_type),
            ConditionalPredicate::Any(preds) => preds.iter().any(|p| p.matches(target, element_type)),
        }
    }
}

/// Immutable record describing one base function (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFunc {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub results: Vec<ReturnField>,
    pub body: Block,
    pub hwy_calls: Vec<CallRef>,
    pub loop_info: Option<LoopInfo>,
    pub conditional_blocks: Vec<ConditionalBlock>,
}

impl ParsedFunc {
    /// Whether `name` names one of this function's type parameters.
    pub fn is_type_param(&self, name: &str) -> bool {
        self.type_params.iter().any(|tp| tp.name == name)
    }

    /// A base function is one whose callees get their own specialization
    /// rather than being inlined (§4.5: "helper functions whose names do
    /// not start with `Base`").
    pub fn is_base_function(&self) -> bool {
        is_base_name(&self.name)
    }
}

pub fn is_base_name(name: &str) -> bool {
    name.starts_with("Base")
}
