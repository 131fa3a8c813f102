//! Syntax tree for isl notation and `.scop` files.
//!
//! The tree keeps names as written and a span on every node, so that the
//! semantic pass can point at the offending text when a name is unknown or
//! an expression is not affine.

use crate::utils::location::Span;
use serde::Serialize;
use std::fmt;

/// A parsed `.scop` file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScopFile {
    pub items: Vec<Item>,
}

/// A top-level item of a `.scop` file.
#[derive(Debug, Clone, Serialize)]
pub enum Item {
    /// `params N, M;`
    Params { names: Vec<String>, span: Span },
    /// `context { : N >= 1 };`
    Context(SetExpr),
    /// `stmt { S[i] : ... } { A[i] = ...; }`
    Stmt { domain: SetExpr, body: BodyStmt },
    /// `schedule { S[i] -> [i] };`
    Schedule(MapExpr),
}

/// A union of basic sets with an optional parameter prefix.
#[derive(Debug, Clone, Serialize)]
pub struct SetExpr {
    /// Names in the `[N, M] ->` prefix
    pub params: Vec<String>,
    pub parts: Vec<BasicSetExpr>,
    pub span: Span,
}

/// `S[i, j] : constraints`; `tuple` is `None` for `{ : N >= 1 }`.
#[derive(Debug, Clone, Serialize)]
pub struct BasicSetExpr {
    pub tuple: Option<Tuple>,
    pub constraints: Vec<Chain>,
    pub span: Span,
}

/// A union of basic maps with an optional parameter prefix.
#[derive(Debug, Clone, Serialize)]
pub struct MapExpr {
    pub params: Vec<String>,
    pub parts: Vec<BasicMapExpr>,
    pub span: Span,
}

/// `S[i] -> A[i + 1] : constraints`
#[derive(Debug, Clone, Serialize)]
pub struct BasicMapExpr {
    pub input: Tuple,
    pub output: Tuple,
    pub constraints: Vec<Chain>,
    pub span: Span,
}

/// `Name[e0, e1]` or `[e0, e1]`.
#[derive(Debug, Clone, Serialize)]
pub struct Tuple {
    pub name: Option<String>,
    pub elems: Vec<Expr>,
    pub span: Span,
}

impl Tuple {
    /// The element names, when every element is a plain name.
    pub fn var_names(&self) -> Option<Vec<String>> {
        self.elems
            .iter()
            .map(|e| match &e.kind {
                ExprKind::Var(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

/// A comparison chain, `0 <= i < N`.
#[derive(Debug, Clone, Serialize)]
pub struct Chain {
    /// `operands.len() == ops.len() + 1`
    pub operands: Vec<Expr>,
    pub ops: Vec<CmpOp>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "=",
            CmpOp::Ge => ">=",
            CmpOp::Gt => ">",
        };
        write!(f, "{}", s)
    }
}

/// A statement body, `target op= value`.
#[derive(Debug, Clone, Serialize)]
pub struct BodyStmt {
    pub target: Expr,
    /// `None` for plain assignment
    pub op: Option<BinOp>,
    pub value: Expr,
    pub span: Span,
}

/// An expression, in constraints as well as in bodies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        let span = left.span.merge(&right.span);
        Self::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, span)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    Int(i64),
    /// Float literal as written
    Float(String),
    Var(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        func: String,
        args: Vec<Expr>,
    },
    /// `A[i][j]`
    Access {
        array: String,
        indices: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        };
        write!(f, "{}", s)
    }
}
