//! Resolution of statement identities.

use crate::polyhedral::id::TupleId;
use crate::scop::statement::Statement;
use crate::scop::Scop;
use crate::utils::errors::CodegenError;

/// Finds the statement that owns a tuple identity.
#[derive(Debug, Clone, Copy)]
pub struct StatementRegistry<'a> {
    scop: &'a Scop,
}

impl<'a> StatementRegistry<'a> {
    pub fn new(scop: &'a Scop) -> Self {
        Self { scop }
    }

    /// The statement whose domain carries `id`.
    ///
    /// Identities are compared by handle, so a statement with the same name
    /// but a different identity never matches. The first match wins.
    pub fn resolve(&self, id: &TupleId) -> Result<&'a Statement, CodegenError> {
        (0..self.scop.n_stmt())
            .filter_map(|i| self.scop.stmt(i))
            .find(|stmt| stmt.domain.tuple_id() == Some(id))
            .ok_or_else(|| CodegenError::StatementNotFound { id: id.clone() })
    }
}
