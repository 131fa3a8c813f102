//! Statement bodies.
//!
//! A body is a small expression tree whose leaves refer to the statement's
//! accesses by position. Printing substitutes one AST expression per
//! access, so the same body renders differently for every schedule.

use crate::codegen::ast::AstExpr;
use serde::Serialize;
use std::fmt;

/// Arithmetic operators allowed in bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BodyOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BodyOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BodyOp::Add => "+",
            BodyOp::Sub => "-",
            BodyOp::Mul => "*",
            BodyOp::Div => "/",
            BodyOp::Mod => "%",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BodyOp::Add | BodyOp::Sub => 5,
            BodyOp::Mul | BodyOp::Div | BodyOp::Mod => 6,
        }
    }
}

impl fmt::Display for BodyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Right-hand side expression of a statement body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BodyExpr {
    Int(i64),
    /// Floating-point literal, kept as written
    Float(String),
    /// The access at this position in the statement's access list
    Access(usize),
    Neg(Box<BodyExpr>),
    Binary {
        op: BodyOp,
        left: Box<BodyExpr>,
        right: Box<BodyExpr>,
    },
    Call {
        func: String,
        args: Vec<BodyExpr>,
    },
}

impl BodyExpr {
    pub fn binary(op: BodyOp, left: BodyExpr, right: BodyExpr) -> Self {
        BodyExpr::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    /// Access positions referenced, in evaluation order.
    pub fn accesses(&self, out: &mut Vec<usize>) {
        match self {
            BodyExpr::Access(k) => out.push(*k),
            BodyExpr::Neg(e) => e.accesses(out),
            BodyExpr::Binary { left, right, .. } => {
                left.accesses(out);
                right.accesses(out);
            }
            BodyExpr::Call { args, .. } => args.iter().for_each(|a| a.accesses(out)),
            BodyExpr::Int(_) | BodyExpr::Float(_) => {}
        }
    }

    fn precedence(&self, exprs: &[AstExpr]) -> u8 {
        match self {
            BodyExpr::Binary { op, .. } => op.precedence(),
            BodyExpr::Neg(_) => 7,
            BodyExpr::Int(v) if *v < 0 => 7,
            BodyExpr::Access(k) => exprs.get(*k).map(|e| e.precedence()).unwrap_or(8),
            _ => 8,
        }
    }

    /// Render with `exprs[k]` standing in for access `k`.
    pub fn render(&self, exprs: &[AstExpr]) -> String {
        match self {
            BodyExpr::Int(v) => v.to_string(),
            BodyExpr::Float(text) => text.clone(),
            BodyExpr::Access(k) => exprs
                .get(*k)
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("/* access {} */", k)),
            BodyExpr::Neg(e) => format!("-{}", e.render_at(exprs, 8)),
            BodyExpr::Binary { op, left, right } => {
                let p = op.precedence();
                let right_min = if matches!(op, BodyOp::Add | BodyOp::Mul) { p } else { p + 1 };
                format!(
                    "{} {} {}",
                    left.render_at(exprs, p),
                    op,
                    right.render_at(exprs, right_min)
                )
            }
            BodyExpr::Call { func, args } => {
                let args: Vec<String> = args.iter().map(|a| a.render(exprs)).collect();
                format!("{}({})", func, args.join(", "))
            }
        }
    }

    fn render_at(&self, exprs: &[AstExpr], min_prec: u8) -> String {
        let text = self.render(exprs);
        if self.precedence(exprs) < min_prec {
            format!("({})", text)
        } else {
            text
        }
    }
}

/// The body of a statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StmtBody {
    /// `target = value;`
    Assignment { target: usize, value: BodyExpr },
    /// `target op= value;`
    CompoundAssign {
        target: usize,
        op: BodyOp,
        value: BodyExpr,
    },
}

impl StmtBody {
    /// The access written by the statement.
    pub fn target(&self) -> usize {
        match self {
            StmtBody::Assignment { target, .. } | StmtBody::CompoundAssign { target, .. } => *target,
        }
    }

    /// Render as a C statement, terminated by `;`.
    pub fn render(&self, exprs: &[AstExpr]) -> String {
        let target = BodyExpr::Access(self.target()).render(exprs);
        match self {
            StmtBody::Assignment { value, .. } => format!("{} = {};", target, value.render(exprs)),
            StmtBody::CompoundAssign { op, value, .. } => {
                format!("{} {}= {};", target, op, value.render(exprs))
            }
        }
    }
}
