#![allow(dead_code)] // Shared across integration tests; each test binary uses a subset of helpers.

use ahash::{AHashMap, AHashSet};
use simd_config::TransformOptions;
use simd_ir::{
    AssignOp, BinaryOp, Block, CallRef, Expr, LoopInfo, Param, ParsedFunc, Stmt, StmtNode, TypeExpr, TypeParam,
    UnrollHint,
};
use simd_target::{ElementType, Target};
use simd_transform::TransformOutcome;

/// `BaseAdd[T Floats](in, out []T)`: the spec's "simple map" scenario (§8.1)
/// — one main loop, a `Load`/`Add`/`Set`/`Store` body, auto unroll.
pub fn base_add() -> ParsedFunc {
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
                op: AssignOp::AddAssign,
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
        type_params: vec![TypeParam::new("T", "Floats")],
        params: vec![
            Param::new("in", TypeExpr::slice(TypeExpr::named("T"))),
            Param::new("out", TypeExpr::slice(TypeExpr::named("T"))),
        ],
        results: vec![],
        body,
        hwy_calls: vec![
            CallRef { name: "Load".into(), line: Some(2) },
            CallRef { name: "Add".into(), line: Some(3) },
            CallRef { name: "Set".into(), line: Some(3) },
            CallRef { name: "Store".into(), line: Some(3) },
        ],
        loop_info: Some(LoopInfo::new("i", "out", UnrollHint::Auto)),
        conditional_blocks: vec![],
    }
}

pub fn run(parsed: &ParsedFunc, target: Target, element_type: ElementType) -> TransformOutcome {
    let helpers = AHashMap::new();
    let generic = AHashSet::new();
    simd_transform::transform(parsed, &helpers, &generic, target, element_type, &TransformOptions::default())
        .expect("transform of a well-formed base function must not fail")
}

pub const ALL_TARGETS: [Target; 4] = [Target::Fallback, Target::Neon, Target::Avx2, Target::Avx512];

pub const ALL_ELEMENT_TYPES: [ElementType; 8] = [
    ElementType::F32,
    ElementType::F64,
    ElementType::F16,
    ElementType::Bf16,
    ElementType::I32,
    ElementType::I64,
    ElementType::U32,
    ElementType::U64,
];
