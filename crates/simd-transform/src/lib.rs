//! The pass pipeline (§4.2–§4.10) and the top-level `transform` entry point
//! (§6 "Exposed").
//!
//! Each specialization runs the passes in the data-dependency order laid
//! out by §2's overview table: conditional filtering happens before the
//! clone even exists (it decides what gets cloned), then context
//! construction, identifier resolution, helper inlining, operation
//! lowering, constant hoisting, loop transformation, and finally the
//! post-processors before result assembly. One `tracing` span wraps the
//! whole specialization; passes that make a locally interesting decision
//! (a lowering picked, a constant hoisted, an unroll factor chosen) log at
//! `debug!` inside it, mirroring the granularity the teacher uses around
//! `dispatcher::dispatch`.

pub mod assemble;
pub mod conditional_filter;
pub mod context_build;
pub mod half_precision;
pub mod hoist;
pub mod identifier_resolver;
pub mod inliner;
pub mod loop_transform;
pub mod lowerer;
pub mod post;

pub use assemble::OutputFunction;
pub use half_precision::{compute_generic_half_precision_set, needs_generic_half_precision};

use ahash::{AHashMap, AHashSet};
use anyhow::bail;

use simd_config::TransformOptions;
use simd_context::HoistedConstant;
use simd_diag::{Diagnostic, Diagnostics};
use simd_ir::ParsedFunc;
use simd_target::{ElementType, Target, TargetDescriptor};

/// The result of one (base-function, target, element-type) specialization
/// (§6: `transform(parsed, target, element_type, options) → { function_ast,
/// hoisted_constants }`).
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub function: OutputFunction,
    pub hoisted_constants: Vec<HoistedConstant>,
    pub diagnostics: Diagnostics,
}

/// Runs every pass over one base function for one (target, element-type)
/// pair and returns the specialized function plus its hoisted constants.
///
/// `helpers` is the directory of same-file functions keyed by name (§6
/// "Consumed" — used only by the inliner; `Base*` functions should not be
/// present, they are specialized on their own rather than inlined).
/// `generic_half_precision` is the fixpoint set computed once per file by
/// [`compute_generic_half_precision_set`] and shared across every
/// specialization of every function in that file.
pub fn transform(
    parsed: &ParsedFunc,
    helpers: &AHashMap<String, ParsedFunc>,
    generic_half_precision: &AHashSet<String>,
    target: Target,
    element_type: ElementType,
    options: &TransformOptions,
) -> anyhow::Result<TransformOutcome> {
    let span = tracing::info_span!(
        "transform",
        function = %parsed.name,
        target = %target,
        element_type = element_type.suffix(),
    );
    let _enter = span.enter();

    if parsed.name.is_empty() {
        bail!("malformed input: base function has no name");
    }

    let mut diagnostics = Diagnostics::new();
    let td = TargetDescriptor::new(target);

    if let Some(explicit) = &options.explicit_type_argument
        && !parsed.type_params.is_empty()
    {
        diagnostics.push(Diagnostic::ContradictoryOptions(format!(
            "explicit type argument `{explicit}` conflicts with declared type parameter; \
             keeping the declared parameter"
        )));
    }

    let max_depth = options.effective_max_clone_depth();
    let filtered = conditional_filter::filter_block(
        &parsed.body,
        &parsed.conditional_blocks,
        target,
        element_type,
    );
    let cloned = simd_ir::tree::clone_block_with_depth_guard(&filtered, max_depth).map_err(|e| {
        diagnostics.push(Diagnostic::OverDeepClone { max: max_depth });
        e
    })?;

    let mut ctx = context_build::build_context(parsed, target, element_type);
    ctx.force_generic_half_precision =
        options.force_generic_half_precision || generic_half_precision.contains(&parsed.name);

    let hwy_call_names: AHashSet<String> =
        parsed.hwy_calls.iter().map(|c| c.name.clone()).collect();

    tracing::debug!(calls = hwy_call_names.len(), "context built");

    let body = identifier_resolver::resolve_identifiers(cloned, parsed, &td, element_type);
    let body = inliner::inline_helpers(
        body,
        parsed,
        helpers,
        generic_half_precision,
        &mut ctx,
        &td,
        &hwy_call_names,
        &mut diagnostics,
    );
    let body = lowerer::lower_block(body, &mut ctx, &td, &hwy_call_names, &mut diagnostics);
    let body = hoist::hoist_constants(body, &mut ctx, &td);
    let body = match &parsed.loop_info {
        Some(loop_info) => {
            tracing::debug!(iterator = %loop_info.iterator, "transforming main SIMD loop");
            loop_transform::transform_loop(body, parsed, loop_info, &ctx, &td)
        }
        None => body,
    };
    let body = post::run_post_processors(body, parsed, &mut ctx, &td, &hwy_call_names, &mut diagnostics);

    let function = assemble::assemble(
        parsed,
        body,
        element_type,
        &td,
        ctx.force_generic_half_precision,
    );
    let hoisted_constants: Vec<HoistedConstant> = ctx.hoisted.ordered().into_iter().cloned().collect();

    tracing::debug!(hoisted = hoisted_constants.len(), name = %function.name, "specialization assembled");

    Ok(TransformOutcome {
        function,
        hoisted_constants,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simd_ir::{BinaryOp, Block, Expr, LoopInfo, Param, ReturnField, Stmt, StmtNode, TypeExpr, UnrollHint};

    fn base_add() -> ParsedFunc {
        // BaseAdd[T Floats](in, out []T) { for i := 0; i < len(out); i += v.NumLanes() {
        //   v := Load(in[i:]); Store(v.Add(Set[T](1.0)), out[i:]) } }
        let body: Block = vec![StmtNode::at(
            1,
            Stmt::For {
                init: Some(Box::new(Stmt::define(Expr::ident("i"), Expr::Int(0)))),
                cond: Some(Expr::binary(
                    BinaryOp::Lt,
                    Expr::ident("i"),
                    Expr::call(Expr::ident("len"), [], vec![Expr::ident("out")]),
                )),
                post: Some(Box::new(Stmt::Assign {
                    lhs: vec![Expr::ident("i")],
                    op: simd_ir::AssignOp::AddAssign,
                    rhs: vec![Expr::Int(1)],
                })),
                body: vec![
                    StmtNode::new(Stmt::define(
                        Expr::ident("v"),
                        Expr::call(Expr::ident("Load"), [], vec![Expr::slice_from(Expr::ident("in"), Expr::ident("i"))]),
                    )),
                    StmtNode::new(Stmt::expr(Expr::call(
                        Expr::ident("Store"),
                        [],
                        vec![
                            Expr::call(
                                Expr::selector(Expr::ident("v"), "Add"),
                                [],
                                vec![Expr::call(Expr::ident("Set"), [TypeExpr::named("T")], vec![Expr::Float(1.0)])],
                            ),
                            Expr::slice_from(Expr::ident("out"), Expr::ident("i")),
                        ],
                    ))),
                ],
            },
        )];

        ParsedFunc {
            name: "BaseAdd".into(),
            type_params: vec![simd_ir::TypeParam::new("T", "Floats")],
            params: vec![
                Param::new("in", TypeExpr::slice(TypeExpr::named("T"))),
                Param::new("out", TypeExpr::slice(TypeExpr::named("T"))),
            ],
            results: vec![],
            body,
            hwy_calls: vec![
                simd_ir::CallRef { name: "Load".into(), line: Some(2) },
                simd_ir::CallRef { name: "Add".into(), line: Some(3) },
                simd_ir::CallRef { name: "Set".into(), line: Some(3) },
                simd_ir::CallRef { name: "Store".into(), line: Some(3) },
            ],
            loop_info: Some(LoopInfo::new("i", "out", UnrollHint::Auto)),
            conditional_blocks: vec![],
        }
    }

    #[test]
    fn simple_map_specializes_without_error() {
        let parsed = base_add();
        let helpers = AHashMap::new();
        let generic = AHashSet::new();
        let outcome = transform(
            &parsed,
            &helpers,
            &generic,
            Target::Avx2,
            ElementType::F32,
            &TransformOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.function.name, "BaseAdd_AVX2");
        assert!(!outcome.diagnostics.has_errors());
        assert_eq!(outcome.hoisted_constants.len(), 1);
        assert_eq!(outcome.hoisted_constants[0].local_name, "one");
    }

    #[test]
    fn empty_name_is_malformed() {
        let mut parsed = base_add();
        parsed.name = String::new();
        let helpers = AHashMap::new();
        let generic = AHashSet::new();
        assert!(
            transform(
                &parsed,
                &helpers,
                &generic,
                Target::Avx2,
                ElementType::F32,
                &TransformOptions::default(),
            )
            .is_err()
        );
    }

    #[test]
    fn fallback_target_never_unrolls() {
        let parsed = base_add();
        let helpers = AHashMap::new();
        let generic = AHashSet::new();
        let outcome = transform(
            &parsed,
            &helpers,
            &generic,
            Target::Fallback,
            ElementType::F32,
            &TransformOptions::default(),
        )
        .unwrap();
        assert_eq!(outcome.function.name, "BaseAdd_fallback");
    }

    #[test]
    fn returns_are_empty_when_results_absent() {
        let parsed = base_add();
        assert_eq!(parsed.results, Vec::<ReturnField>::new());
    }
}
