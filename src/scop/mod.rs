//! Static control parts.
//!
//! A [`Scop`] owns the statements code is generated for: each with an
//! iteration domain, its accesses and a body. Statement identity is the
//! tuple identity of the domain.

pub mod body;
pub mod registry;
pub mod statement;

pub use body::{BodyExpr, BodyOp, StmtBody};
pub use registry::StatementRegistry;
pub use statement::{Access, AccessKind, Statement};

use crate::polyhedral::id::TupleId;
use crate::polyhedral::set::{IntegerSet, UnionSet};
use crate::polyhedral::space::Space;
use crate::utils::errors::{ScopError, ScopErrorKind};
use serde::Serialize;

/// An array referenced by the SCoP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrayInfo {
    pub id: TupleId,
    pub rank: usize,
}

/// A static control part.
#[derive(Debug, Clone, Serialize)]
pub struct Scop {
    pub name: String,
    /// Parameter names, shared by every domain
    pub params: Vec<String>,
    /// Parameter-only constraints
    pub context: IntegerSet,
    statements: Vec<Statement>,
    arrays: Vec<ArrayInfo>,
}

impl Scop {
    pub fn new(name: &str, params: Vec<String>) -> Self {
        let context = IntegerSet::from_space(Space::set(0).with_param_names(params.clone()));
        Self {
            name: name.to_string(),
            params,
            context,
            statements: Vec::new(),
            arrays: Vec::new(),
        }
    }

    /// Replace the context.
    pub fn with_context(mut self, context: IntegerSet) -> Result<Self, ScopError> {
        if context.dim() != 0 || context.n_param() != self.params.len() {
            return Err(ScopError::new(
                ScopErrorKind::ParameterMismatch,
                format!("context {} does not match parameters [{}]", context, self.params.join(", ")),
            ));
        }
        self.context = context;
        Ok(self)
    }

    /// Add a statement, checking it against the rest of the SCoP.
    pub fn add_statement(&mut self, stmt: Statement) -> Result<(), ScopError> {
        if self.statements.iter().any(|s| s.id == stmt.id) {
            return Err(ScopError::new(
                ScopErrorKind::DuplicateStatement,
                format!("statement {} is defined twice", stmt.id),
            ));
        }
        if stmt.domain.n_param() != self.params.len() {
            return Err(ScopError::new(
                ScopErrorKind::ParameterMismatch,
                format!(
                    "domain of {} has {} parameters, the SCoP has {}",
                    stmt.id,
                    stmt.domain.n_param(),
                    self.params.len()
                ),
            ));
        }

        let mut arrays = self.arrays.clone();
        for access in &stmt.accesses {
            if access.index.n_param() != self.params.len() {
                return Err(ScopError::new(
                    ScopErrorKind::ParameterMismatch,
                    format!("an access of {} has the wrong parameters", stmt.id),
                ));
            }
            let Some(array) = &access.array else { continue };
            match arrays.iter().find(|a| a.id == *array) {
                Some(info) if info.rank != access.rank() => {
                    return Err(ScopError::new(
                        ScopErrorKind::RankMismatch,
                        format!(
                            "array {} is accessed with rank {} in {} but rank {} elsewhere",
                            array,
                            access.rank(),
                            stmt.id,
                            info.rank
                        ),
                    ));
                }
                Some(_) => {}
                None => arrays.push(ArrayInfo { id: array.clone(), rank: access.rank() }),
            }
        }

        self.arrays = arrays;
        self.statements.push(stmt);
        Ok(())
    }

    /// Number of statements.
    pub fn n_stmt(&self) -> usize {
        self.statements.len()
    }

    /// Statement at position `i`.
    pub fn stmt(&self, i: usize) -> Option<&Statement> {
        self.statements.get(i)
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn arrays(&self) -> &[ArrayInfo] {
        &self.arrays
    }

    /// The union of all statement domains, in statement order.
    pub fn domain(&self) -> UnionSet {
        UnionSet::from_sets(self.statements.iter().map(|s| s.domain.clone()).collect())
    }
}
