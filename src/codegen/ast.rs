//! The generated AST.
//!
//! Loops, conditionals and blocks come out of the AST builder; user nodes
//! are its leaves. A user node carries the call expression `S(c0, ...)`
//! whose first argument is the statement identity.

use crate::polyhedral::id::TupleId;
use std::fmt;

/// Identity of a node created by the AST builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A leaf of the generated AST.
#[derive(Debug, Clone, PartialEq)]
pub struct UserNode {
    pub id: NodeId,
    pub expr: AstExpr,
    annotation: Option<NodeId>,
}

impl UserNode {
    pub fn new(id: NodeId, expr: AstExpr) -> Self {
        Self { id, expr, annotation: None }
    }

    pub fn set_annotation(&mut self, key: NodeId) {
        self.annotation = Some(key);
    }

    pub fn annotation(&self) -> Option<NodeId> {
        self.annotation
    }

    /// The statement identity in the first argument of the call.
    pub fn statement_id(&self) -> Option<&TupleId> {
        match &self.expr {
            AstExpr::Call(args) => match args.first() {
                Some(AstExpr::Id(id)) => Some(id),
                _ => None,
            },
            _ => None,
        }
    }
}

/// A node in the generated AST.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// A for loop
    For {
        iterator: String,
        lower: AstExpr,
        upper: AstExpr,
        /// Print the loop condition as `iterator < upper`
        strict: bool,
        step: i64,
        body: Vec<AstNode>,
    },
    /// An if statement
    If {
        condition: AstExpr,
        then_body: Vec<AstNode>,
        else_body: Option<Vec<AstNode>>,
    },
    /// A block of statements
    Block {
        statements: Vec<AstNode>,
    },
    /// A statement instance
    User(UserNode),
}

impl AstNode {
    /// All user nodes in pre-order.
    pub fn user_nodes(&self) -> Vec<&UserNode> {
        let mut out = Vec::new();
        self.collect_users(&mut out);
        out
    }

    fn collect_users<'a>(&'a self, out: &mut Vec<&'a UserNode>) {
        match self {
            AstNode::For { body, .. } => body.iter().for_each(|n| n.collect_users(out)),
            AstNode::If { then_body, else_body, .. } => {
                then_body.iter().for_each(|n| n.collect_users(out));
                if let Some(e) = else_body {
                    e.iter().for_each(|n| n.collect_users(out));
                }
            }
            AstNode::Block { statements } => statements.iter().for_each(|n| n.collect_users(out)),
            AstNode::User(u) => out.push(u),
        }
    }

    /// Call `f` on every expression of the tree, user expressions included.
    pub fn visit_exprs(&self, f: &mut dyn FnMut(&AstExpr)) {
        match self {
            AstNode::For { lower, upper, body, .. } => {
                f(lower);
                f(upper);
                body.iter().for_each(|n| n.visit_exprs(f));
            }
            AstNode::If { condition, then_body, else_body } => {
                f(condition);
                then_body.iter().for_each(|n| n.visit_exprs(f));
                if let Some(e) = else_body {
                    e.iter().for_each(|n| n.visit_exprs(f));
                }
            }
            AstNode::Block { statements } => statements.iter().for_each(|n| n.visit_exprs(f)),
            AstNode::User(u) => f(&u.expr),
        }
    }

    /// Indented debug dump of the tree.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, indent: usize) {
        let prefix = "  ".repeat(indent);
        match self {
            AstNode::For { iterator, lower, upper, strict, step, body } => {
                let cmp = if *strict { "<" } else { "<=" };
                out.push_str(&format!(
                    "{}for {} = {}; {} {} {}; step {}\n",
                    prefix, iterator, lower, iterator, cmp, upper, step
                ));
                body.iter().for_each(|n| n.dump_into(out, indent + 1));
            }
            AstNode::If { condition, then_body, else_body } => {
                out.push_str(&format!("{}if {}\n", prefix, condition));
                then_body.iter().for_each(|n| n.dump_into(out, indent + 1));
                if let Some(e) = else_body {
                    out.push_str(&format!("{}else\n", prefix));
                    e.iter().for_each(|n| n.dump_into(out, indent + 1));
                }
            }
            AstNode::Block { statements } => {
                out.push_str(&format!("{}block\n", prefix));
                statements.iter().for_each(|n| n.dump_into(out, indent + 1));
            }
            AstNode::User(u) => {
                let ann = u.annotation.map(|a| a.to_string()).unwrap_or_else(|| "-".into());
                out.push_str(&format!("{}user {} {} [{}]\n", prefix, u.id, u.expr, ann));
            }
        }
    }
}

/// An expression in the generated AST.
#[derive(Debug, Clone, PartialEq)]
pub enum AstExpr {
    /// Integer constant
    Int(i64),
    /// Loop counter or parameter
    Var(String),
    /// Tuple identity (callee of a user node, array of an access)
    Id(TupleId),
    Neg(Box<AstExpr>),
    /// Binary operation
    Binary {
        op: AstBinOp,
        left: Box<AstExpr>,
        right: Box<AstExpr>,
    },
    /// Minimum of two or more operands
    Min(Vec<AstExpr>),
    /// Maximum of two or more operands
    Max(Vec<AstExpr>),
    /// `floord(e, d)`
    FloorDiv(Box<AstExpr>, i64),
    /// `ceild(e, d)`
    CeilDiv(Box<AstExpr>, i64),
    /// Call; the first argument is the callee
    Call(Vec<AstExpr>),
    /// Array access `A[e0][e1]`
    Access {
        array: TupleId,
        indices: Vec<AstExpr>,
    },
    /// `cond ? then : otherwise`
    Select {
        cond: Box<AstExpr>,
        then: Box<AstExpr>,
        otherwise: Box<AstExpr>,
    },
}

impl AstExpr {
    pub fn int(v: i64) -> Self { Self::Int(v) }
    pub fn var(name: &str) -> Self { Self::Var(name.to_string()) }

    pub fn binary(op: AstBinOp, left: Self, right: Self) -> Self {
        Self::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn add(self, other: Self) -> Self {
        Self::binary(AstBinOp::Add, self, other)
    }

    pub fn sub(self, other: Self) -> Self {
        Self::binary(AstBinOp::Sub, self, other)
    }

    pub fn mul(self, other: Self) -> Self {
        Self::binary(AstBinOp::Mul, self, other)
    }

    pub fn and(self, other: Self) -> Self {
        Self::binary(AstBinOp::And, self, other)
    }

    /// `min` of the operands, or the operand itself when there is one.
    /// Integer operands are folded into one.
    pub fn min_of(args: Vec<AstExpr>) -> Self {
        Self::fold_extremum(args, i64::min, Self::Min)
    }

    /// `max` of the operands, or the operand itself when there is one.
    /// Integer operands are folded into one.
    pub fn max_of(args: Vec<AstExpr>) -> Self {
        Self::fold_extremum(args, i64::max, Self::Max)
    }

    fn fold_extremum(args: Vec<AstExpr>, pick: fn(i64, i64) -> i64, make: fn(Vec<AstExpr>) -> Self) -> Self {
        let mut out: Vec<AstExpr> = Vec::with_capacity(args.len());
        // the folded constant stays where the first one was
        let mut constant: Option<(usize, i64)> = None;
        for arg in args {
            match arg {
                AstExpr::Int(v) => {
                    constant = Some(match constant {
                        None => (out.len(), v),
                        Some((pos, c)) => (pos, pick(c, v)),
                    });
                }
                other => out.push(other),
            }
        }
        if let Some((pos, c)) = constant {
            out.insert(pos, AstExpr::Int(c));
        }
        if out.len() == 1 {
            out.remove(0)
        } else {
            make(out)
        }
    }

    /// C precedence used for parenthesization; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            AstExpr::Int(v) if *v < 0 => 7,
            AstExpr::Neg(_) => 7,
            AstExpr::Binary { op, .. } => op.precedence(),
            AstExpr::Select { .. } => 0,
            _ => 8,
        }
    }

    /// Names of the helper functions (`min`, `max`, `floord`, `ceild`) used.
    pub fn helpers(&self, out: &mut Vec<&'static str>) {
        fn add(name: &'static str, out: &mut Vec<&'static str>) {
            if !out.contains(&name) {
                out.push(name);
            }
        }
        match self {
            AstExpr::Min(args) => {
                add("min", out);
                args.iter().for_each(|a| a.helpers(out));
            }
            AstExpr::Max(args) => {
                add("max", out);
                args.iter().for_each(|a| a.helpers(out));
            }
            AstExpr::FloorDiv(e, _) => {
                add("floord", out);
                e.helpers(out);
            }
            AstExpr::CeilDiv(e, _) => {
                add("ceild", out);
                e.helpers(out);
            }
            AstExpr::Neg(e) => e.helpers(out),
            AstExpr::Binary { left, right, .. } => {
                left.helpers(out);
                right.helpers(out);
            }
            AstExpr::Call(args) => args.iter().for_each(|a| a.helpers(out)),
            AstExpr::Access { indices, .. } => indices.iter().for_each(|a| a.helpers(out)),
            AstExpr::Select { cond, then, otherwise } => {
                cond.helpers(out);
                then.helpers(out);
                otherwise.helpers(out);
            }
            AstExpr::Int(_) | AstExpr::Var(_) | AstExpr::Id(_) => {}
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, min_prec: u8) -> fmt::Result {
        if self.precedence() < min_prec {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }

    fn fmt_nested(f: &mut fmt::Formatter<'_>, name: &str, args: &[AstExpr]) -> fmt::Result {
        // min(a, b, c) prints as min(min(a, b), c)
        match args.split_last() {
            None => write!(f, "{}()", name),
            Some((only, [])) => write!(f, "{}", only),
            Some((last, rest)) => {
                write!(f, "{}(", name)?;
                Self::fmt_nested(f, name, rest)?;
                write!(f, ", {})", last)
            }
        }
    }
}

impl fmt::Display for AstExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstExpr::Int(v) => write!(f, "{}", v),
            AstExpr::Var(name) => write!(f, "{}", name),
            AstExpr::Id(id) => write!(f, "{}", id),
            AstExpr::Neg(e) => {
                write!(f, "-")?;
                e.fmt_at(f, 8)
            }
            AstExpr::Binary { op, left, right } => {
                let p = op.precedence();
                left.fmt_at(f, p)?;
                write!(f, " {} ", op)?;
                let right_min = if op.is_associative() { p } else { p + 1 };
                right.fmt_at(f, right_min)
            }
            AstExpr::Min(args) => Self::fmt_nested(f, "min", args),
            AstExpr::Max(args) => Self::fmt_nested(f, "max", args),
            AstExpr::FloorDiv(e, d) => write!(f, "floord({}, {})", e, d),
            AstExpr::CeilDiv(e, d) => write!(f, "ceild({}, {})", e, d),
            AstExpr::Call(args) => {
                let Some((callee, rest)) = args.split_first() else {
                    return Ok(());
                };
                callee.fmt_at(f, 8)?;
                let rest: Vec<String> = rest.iter().map(|a| a.to_string()).collect();
                write!(f, "({})", rest.join(", "))
            }
            AstExpr::Access { array, indices } => {
                write!(f, "{}", array)?;
                for idx in indices {
                    write!(f, "[{}]", idx)?;
                }
                Ok(())
            }
            AstExpr::Select { cond, then, otherwise } => {
                cond.fmt_at(f, 1)?;
                write!(f, " ? ")?;
                then.fmt_at(f, 1)?;
                write!(f, " : ")?;
                otherwise.fmt_at(f, 0)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstBinOp {
    Add, Sub, Mul, Div, Mod,
    Lt, Le, Gt, Ge, Eq, Ne,
    And, Or,
}

impl AstBinOp {
    pub fn precedence(self) -> u8 {
        match self {
            AstBinOp::Or => 1,
            AstBinOp::And => 2,
            AstBinOp::Eq | AstBinOp::Ne => 3,
            AstBinOp::Lt | AstBinOp::Le | AstBinOp::Gt | AstBinOp::Ge => 4,
            AstBinOp::Add | AstBinOp::Sub => 5,
            AstBinOp::Mul | AstBinOp::Div | AstBinOp::Mod => 6,
        }
    }

    /// Operators whose right operand can share their precedence unparenthesized.
    fn is_associative(self) -> bool {
        matches!(self, AstBinOp::Add | AstBinOp::Mul | AstBinOp::And | AstBinOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AstBinOp::Add => "+",
            AstBinOp::Sub => "-",
            AstBinOp::Mul => "*",
            AstBinOp::Div => "/",
            AstBinOp::Mod => "%",
            AstBinOp::Lt => "<",
            AstBinOp::Le => "<=",
            AstBinOp::Gt => ">",
            AstBinOp::Ge => ">=",
            AstBinOp::Eq => "==",
            AstBinOp::Ne => "!=",
            AstBinOp::And => "&&",
            AstBinOp::Or => "||",
        }
    }
}

impl fmt::Display for AstBinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
