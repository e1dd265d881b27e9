//! `TransformOptions` (§6 consumed interfaces, §7 "Contradictory options").
//!
//! This crate owns only the options struct itself — no file I/O. §1 names
//! "file discovery, CLI driver, build-system glue" as external
//! collaborators, and the teacher's own `core-config` TOML-loading (`fs`,
//! `dirs`, `toml`) belongs to that external driver here, not to the core.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options accepted by `simd_transform::transform` (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformOptions {
    /// Overrides `simd_ir::tree::DEFAULT_MAX_CLONE_DEPTH` (§5 "around
    /// 1000"). `None` means "use the default".
    #[serde(default)]
    pub max_clone_depth: Option<u32>,

    /// An explicit type argument supplied alongside a base function that
    /// also declares a type parameter of the same role. §7 "Contradictory
    /// options": the declared type parameter always wins; setting this has
    /// no effect on the output beyond the warning it triggers, but the
    /// caller may still want it recorded for diagnostics.
    #[serde(default)]
    pub explicit_type_argument: Option<String>,

    /// Local import-alias → canonical package path, used only to
    /// disambiguate a single ambient-math-package name clash (§4.4, §6).
    #[serde(default)]
    pub import_aliases: BTreeMap<String, String>,

    /// When true, a function the half-precision fixpoint would otherwise
    /// classify as asm-eligible is forced onto the generic path anyway —
    /// an escape hatch for callers who've observed a miscompile and want
    /// to pin a function to the safe regime without editing its body
    /// (§9: "treat classification as monotone, never downgrade").
    #[serde(default)]
    pub force_generic_half_precision: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            max_clone_depth: None,
            explicit_type_argument: None,
            import_aliases: BTreeMap::new(),
            force_generic_half_precision: false,
        }
    }
}

impl TransformOptions {
    pub fn effective_max_clone_depth(&self) -> u32 {
        self.max_clone_depth
            .unwrap_or(simd_ir::tree::DEFAULT_MAX_CLONE_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_uses_crate_default_clone_depth() {
        let opts = TransformOptions::default();
        assert_eq!(opts.effective_max_clone_depth(), simd_ir::tree::DEFAULT_MAX_CLONE_DEPTH);
    }

    #[test]
    fn override_is_honored() {
        let opts = TransformOptions {
            max_clone_depth: Some(42),
            ..Default::default()
        };
        assert_eq!(opts.effective_max_clone_depth(), 42);
    }

    #[test]
    fn contradictory_option_round_trips_through_clone() {
        let opts = TransformOptions {
            explicit_type_argument: Some("float32".into()),
            ..Default::default()
        };
        assert_eq!(opts.clone(), opts);
        assert_eq!(opts.explicit_type_argument.as_deref(), Some("float32"));
    }
}
