//! The expression half of the tagged-variant tree (§9: "dynamic dispatch on
//! node kind is expressed as a tagged variant over statement and expression
//! shapes; visitors take the variant as a sum type with exhaustive match").

use crate::types::TypeExpr;
use smallvec::SmallVec;

use crate::stmt::{Block, Param};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Plus,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

/// One node of a Go-shaped expression tree. See SPEC_FULL.md's "Supplemented
/// detail" for why the shape is Go's rather than some abstract IR: the base
/// functions this crate specializes are themselves Go source.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// `base.field` — a package selector (`hwy.Add`) or a method/field access
    /// (`v.Add`, `acc.lane`).
    Selector { base: Box<Expr>, field: String },
    /// `base[index]`
    Index { base: Box<Expr>, index: Box<Expr> },
    /// `base[low:high]`, either bound optional.
    Slice {
        base: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
    },
    /// `callee[type_args...](args...)`
    Call {
        callee: Box<Expr>,
        type_args: SmallVec<[TypeExpr; 1]>,
        args: Vec<Expr>,
    },
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Paren(Box<Expr>),
    /// `T(expr)` — a type conversion.
    Conversion { ty: TypeExpr, expr: Box<Expr> },
    /// `(*[N]T)(ptr)` — the star-cast idiom used to avoid reslice-then-index
    /// on AVX/NEON stores (§4.6, Open Question in §9).
    StarCast { ty: TypeExpr, expr: Box<Expr> },
    /// `T{elems...}`
    CompositeLit { ty: TypeExpr, elems: Vec<Expr> },
    /// `key: value` inside a composite literal.
    KeyValue { key: Box<Expr>, value: Box<Expr> },
    AddrOf(Box<Expr>),
    Deref(Box<Expr>),
    /// `func(params...) (results...) { body }` used by reduction inlining's
    /// IIFE idiom (§4.6).
    FuncLit {
        params: Vec<Param>,
        results: Vec<TypeExpr>,
        body: Block,
    },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn selector(base: Expr, field: impl Into<String>) -> Self {
        Expr::Selector {
            base: Box::new(base),
            field: field.into(),
        }
    }

    pub fn call(callee: Expr, type_args: impl IntoIterator<Item = TypeExpr>, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            type_args: type_args.into_iter().collect(),
            args,
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::Unary { op, expr: Box::new(expr) }
    }

    pub fn index(base: Expr, index: Expr) -> Self {
        Expr::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    pub fn slice_from(base: Expr, low: Expr) -> Self {
        Expr::Slice {
            base: Box::new(base),
            low: Some(Box::new(low)),
            high: None,
        }
    }

    pub fn slice_full(base: Expr) -> Self {
        Expr::Slice {
            base: Box::new(base),
            low: None,
            high: None,
        }
    }

    pub fn addr_of(expr: Expr) -> Self {
        Expr::AddrOf(Box::new(expr))
    }

    /// The identifier this expression resolves to when read as a bare
    /// reference, if it is one.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(n) => Some(n),
            _ => None,
        }
    }
}
