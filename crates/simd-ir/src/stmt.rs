//! The statement half of the tagged-variant tree.

use crate::expr::Expr;
use crate::types::TypeExpr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `:=`
    Define,
    /// `=`
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self { name: name.into(), ty }
    }
}

/// A statement together with the source line it started on, when known.
/// The conditional filter (§4.2) is the only consumer of `line`; everything
/// else ignores it. Absent line info degrades filtering to a no-op rather
/// than a hard error (§4.2 "failure mode").
#[derive(Debug, Clone, PartialEq)]
pub struct StmtNode {
    pub line: Option<u32>,
    pub node: Stmt,
}

impl StmtNode {
    pub fn new(node: Stmt) -> Self {
        Self { line: None, node }
    }

    pub fn at(line: u32, node: Stmt) -> Self {
        Self { line: Some(line), node }
    }
}

pub type Block = Vec<StmtNode>;

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// Empty means the `default:` arm.
    pub values: Vec<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        lhs: Vec<Expr>,
        op: AssignOp,
        rhs: Vec<Expr>,
    },
    VarDecl {
        name: String,
        ty: Option<TypeExpr>,
        value: Option<Expr>,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Range {
        key: Option<String>,
        value: Option<String>,
        expr: Expr,
        body: Block,
    },
    Switch {
        tag: Option<Expr>,
        cases: Vec<SwitchCase>,
    },
    Return(Vec<Expr>),
    Block(Block),
}

impl Stmt {
    pub fn expr(e: Expr) -> Self {
        Stmt::Expr(e)
    }

    pub fn define(lhs: Expr, rhs: Expr) -> Self {
        Stmt::Assign {
            lhs: vec![lhs],
            op: AssignOp::Define,
            rhs: vec![rhs],
        }
    }

    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Stmt::Assign {
            lhs: vec![lhs],
            op: AssignOp::Assign,
            rhs: vec![rhs],
        }
    }

    pub fn returns(vals: Vec<Expr>) -> Self {
        Stmt::Return(vals)
    }

    /// True for the three loop shapes the conditional filter and loop
    /// transformer both need to recurse into (§4.2, §4.8).
    pub fn is_loop(&self) -> bool {
        matches!(self, Stmt::For { .. } | Stmt::Range { .. })
    }
}
