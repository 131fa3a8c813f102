//! Statements of a SCoP.

use crate::codegen::ast::AstExpr;
use crate::codegen::build::AstBuild;
use crate::polyhedral::id::TupleId;
use crate::polyhedral::pw_aff::PwMultiAff;
use crate::polyhedral::set::IntegerSet;
use crate::scop::body::StmtBody;
use crate::utils::errors::{CodegenError, ScopError, ScopErrorKind};
use serde::Serialize;

/// Access kind (read or write).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessKind {
    Read,
    Write,
}

/// One access of a statement.
///
/// `index` maps the statement domain to the array subscripts. An access
/// without an array is an affine value used in the body, such as the `i` in
/// `A[i] = i`; its index has a single output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Access {
    pub array: Option<TupleId>,
    pub index: PwMultiAff,
    pub kind: AccessKind,
}

impl Access {
    pub fn read(array: TupleId, index: PwMultiAff) -> Self {
        Self { array: Some(array), index, kind: AccessKind::Read }
    }

    pub fn write(array: TupleId, index: PwMultiAff) -> Self {
        Self { array: Some(array), index, kind: AccessKind::Write }
    }

    pub fn value(index: PwMultiAff) -> Self {
        Self { array: None, index, kind: AccessKind::Read }
    }

    /// Number of subscripts.
    pub fn rank(&self) -> usize {
        self.index.n_out()
    }
}

/// A statement: iteration domain, accesses and body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub id: TupleId,
    pub domain: IntegerSet,
    pub accesses: Vec<Access>,
    pub body: StmtBody,
}

impl Statement {
    /// Create a statement; its identity is the tuple identity of `domain`.
    pub fn new(domain: IntegerSet, accesses: Vec<Access>, body: StmtBody) -> Result<Self, ScopError> {
        let id = domain.tuple_id().cloned().ok_or_else(|| {
            ScopError::new(ScopErrorKind::UnknownStatement, format!("domain {} has no tuple identity", domain))
        })?;

        for (k, access) in accesses.iter().enumerate() {
            let from_domain = access.index.in_tuple().map_or(true, |t| *t == id);
            if access.index.n_in() != domain.dim() || !from_domain {
                return Err(ScopError::new(
                    ScopErrorKind::AccessSpaceMismatch,
                    format!("access {} of {} does not start from its domain", k, id),
                ));
            }
            if access.array.is_none() && access.index.n_out() != 1 {
                return Err(ScopError::new(
                    ScopErrorKind::AccessSpaceMismatch,
                    format!("value access {} of {} must have one output", k, id),
                ));
            }
        }

        let mut used = Vec::new();
        used.push(body.target());
        match &body {
            StmtBody::Assignment { value, .. } | StmtBody::CompoundAssign { value, .. } => value.accesses(&mut used),
        }
        if let Some(bad) = used.iter().find(|&&k| k >= accesses.len()) {
            return Err(ScopError::new(
                ScopErrorKind::AccessSpaceMismatch,
                format!("body of {} refers to access {} of {}", id, bad, accesses.len()),
            ));
        }

        Ok(Self { id, domain, accesses, body })
    }

    /// Number of domain dimensions.
    pub fn dim(&self) -> usize {
        self.domain.dim()
    }

    /// Turn every access into an AST expression at the current build.
    ///
    /// `rewrite` receives each access with its position and returns the
    /// index re-expressed over the loop counters.
    pub fn build_ast_exprs<F>(&self, build: &AstBuild, mut rewrite: F) -> Result<Vec<AstExpr>, CodegenError>
    where
        F: FnMut(usize, &Access) -> Result<PwMultiAff, CodegenError>,
    {
        let mut exprs = Vec::with_capacity(self.accesses.len());
        for (k, access) in self.accesses.iter().enumerate() {
            let index = rewrite(k, access)?;
            let expr = build.access_expr(access.array.as_ref(), &index).ok_or_else(|| {
                CodegenError::malformed(&self.id, format!("access {} has no value on the schedule", k))
            })?;
            exprs.push(expr);
        }
        Ok(exprs)
    }

    /// The body as C text with `exprs` substituted for the accesses.
    pub fn render(&self, exprs: &[AstExpr]) -> String {
        self.body.render(exprs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::{AffineExpr, AffineMap, IdContext, Space};
    use crate::scop::body::BodyExpr;

    fn line(ctx: &mut IdContext) -> IntegerSet {
        IntegerSet::rectangular(&[3]).with_tuple(ctx.id("S"))
    }

    fn index(domain: &IntegerSet, array: TupleId) -> PwMultiAff {
        let space = Space::map_from(&domain.space, &Space::set(1).with_tuple(Some(array)));
        PwMultiAff::from_affine_map(AffineMap::with_space(space, vec![AffineExpr::var(0, 1, 0)]))
    }

    #[test]
    fn test_statement_identity_from_domain() {
        let mut ctx = IdContext::new();
        let domain = line(&mut ctx);
        let a = ctx.id("A");
        let stmt = Statement::new(
            domain.clone(),
            vec![Access::write(a.clone(), index(&domain, a))],
            StmtBody::Assignment { target: 0, value: BodyExpr::Int(0) },
        )
        .unwrap();
        assert_eq!(stmt.id, ctx.id("S"));
        assert_eq!(stmt.dim(), 1);
    }

    #[test]
    fn test_rejects_anonymous_domain() {
        let err = Statement::new(
            IntegerSet::rectangular(&[3]),
            vec![],
            StmtBody::Assignment { target: 0, value: BodyExpr::Int(0) },
        )
        .unwrap_err();
        assert_eq!(err.kind, ScopErrorKind::UnknownStatement);
    }

    #[test]
    fn test_rejects_dangling_body_access() {
        let mut ctx = IdContext::new();
        let domain = line(&mut ctx);
        let a = ctx.id("A");
        let err = Statement::new(
            domain.clone(),
            vec![Access::write(a.clone(), index(&domain, a))],
            StmtBody::Assignment { target: 0, value: BodyExpr::Access(3) },
        )
        .unwrap_err();
        assert_eq!(err.kind, ScopErrorKind::AccessSpaceMismatch);
    }

    #[test]
    fn test_rejects_foreign_access_space() {
        let mut ctx = IdContext::new();
        let domain = line(&mut ctx);
        let other = IntegerSet::rectangular(&[3]).with_tuple(ctx.id("T"));
        let a = ctx.id("A");
        let err = Statement::new(
            domain,
            vec![Access::write(a.clone(), index(&other, a))],
            StmtBody::Assignment { target: 0, value: BodyExpr::Int(1) },
        )
        .unwrap_err();
        assert_eq!(err.kind, ScopErrorKind::AccessSpaceMismatch);
    }
}
