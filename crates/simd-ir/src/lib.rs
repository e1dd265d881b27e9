//! The input IR and tagged-variant tree the transformer rewrites (§3 Data
//! Model, §9 "dynamic dispatch on node kind is expressed as a tagged
//! variant ... visitors take the variant as a sum type with exhaustive
//! match").
//!
//! The base functions this crate's types describe are themselves written
//! in a Go-shaped surface syntax (see SPEC_FULL.md's "Supplemented
//! detail"), so `Expr`/`Stmt`/`TypeExpr` model Go expression, statement,
//! and type shapes rather than an abstract IR of their own.

pub mod expr;
pub mod parsed_func;
pub mod stmt;
pub mod tree;
pub mod types;

pub use expr::{BinaryOp, Expr, UnaryOp};
pub use parsed_func::{
    CallRef, ConditionalBlock, ConditionalPredicate, LoopInfo, ParsedFunc, ReturnField, TypeParam,
    UnrollHint, is_base_name,
};
pub use stmt::{AssignOp, Block, Param, Stmt, StmtNode, SwitchCase};
pub use types::TypeExpr;
