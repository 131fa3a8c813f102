//! Re-expressing access indices over the loop counters.

use crate::polyhedral::id::TupleId;
use crate::polyhedral::pw_aff::PwMultiAff;
use crate::utils::errors::CodegenError;
use std::fmt;

/// A replacement for the default pullback.
///
/// Receives the original index, the statement identity and the inverse
/// schedule of the leaf, and returns the index over the loop counters.
pub trait AccessRewrite {
    fn rewrite(&self, index: &PwMultiAff, stmt: &TupleId, inverse: &PwMultiAff) -> PwMultiAff;
}

impl<F> AccessRewrite for F
where
    F: Fn(&PwMultiAff, &TupleId, &PwMultiAff) -> PwMultiAff,
{
    fn rewrite(&self, index: &PwMultiAff, stmt: &TupleId, inverse: &PwMultiAff) -> PwMultiAff {
        self(index, stmt, inverse)
    }
}

/// How access indices are rewritten at each leaf.
pub enum IndexRewriter {
    /// Compose the index with the inverse schedule
    Pullback,
    /// Replace the default for every access of every statement
    Custom(Box<dyn AccessRewrite>),
}

impl Default for IndexRewriter {
    fn default() -> Self {
        IndexRewriter::Pullback
    }
}

impl fmt::Debug for IndexRewriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexRewriter::Pullback => write!(f, "Pullback"),
            IndexRewriter::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl IndexRewriter {
    pub fn custom(rewrite: impl AccessRewrite + 'static) -> Self {
        IndexRewriter::Custom(Box::new(rewrite))
    }

    /// Rewrite access `access` of `stmt`.
    ///
    /// The result must take as many inputs as `inverse` and keep the
    /// outputs of `index`.
    pub fn rewrite(
        &self,
        stmt: &TupleId,
        access: usize,
        index: &PwMultiAff,
        inverse: &PwMultiAff,
    ) -> Result<PwMultiAff, CodegenError> {
        let rewritten = match self {
            IndexRewriter::Pullback => index.pullback(inverse).map_err(|e| {
                CodegenError::malformed(stmt, format!("cannot pull back access {}: {}", access, e))
            })?,
            IndexRewriter::Custom(custom) => custom.rewrite(index, stmt, inverse),
        };

        let (expected_in, expected_out) = (inverse.n_in(), index.n_out());
        if rewritten.n_in() != expected_in || rewritten.n_out() != expected_out {
            return Err(CodegenError::RewriteArityMismatch {
                stmt: stmt.clone(),
                access,
                expected_in,
                expected_out,
                found_in: rewritten.n_in(),
                found_out: rewritten.n_out(),
            });
        }
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::{AffineExpr, AffineMap, IdContext, Space};

    // S[i] -> A[i + 1] and the inverse [c0] -> S[c0 - 2]
    fn fixture(ctx: &mut IdContext) -> (TupleId, PwMultiAff, PwMultiAff) {
        let s = ctx.id("S");
        let a = ctx.id("A");
        let domain = Space::set(1).with_tuple(Some(s.clone()));
        let array = Space::set(1).with_tuple(Some(a));
        let index = PwMultiAff::from_affine_map(AffineMap::with_space(
            Space::map_from(&domain, &array),
            vec![AffineExpr::var(0, 1, 0) + AffineExpr::constant(1, 1, 0)],
        ));
        let inverse = PwMultiAff::from_affine_map(AffineMap::with_space(
            Space::map_from(&Space::set(1), &domain),
            vec![AffineExpr::var(0, 1, 0) - AffineExpr::constant(2, 1, 0)],
        ));
        (s, index, inverse)
    }

    #[test]
    fn test_pullback() {
        let mut ctx = IdContext::new();
        let (s, index, inverse) = fixture(&mut ctx);
        let out = IndexRewriter::Pullback.rewrite(&s, 0, &index, &inverse).unwrap();
        assert_eq!(out.eval(&[5], &[]), Some(vec![4]));
        assert_eq!(out.out_tuple(), index.out_tuple());
    }

    #[test]
    fn test_custom_replaces_pullback() {
        let mut ctx = IdContext::new();
        let (s, index, inverse) = fixture(&mut ctx);
        let rewriter = IndexRewriter::custom(|index: &PwMultiAff, _: &TupleId, inverse: &PwMultiAff| {
            let space = Space::map_from(&inverse.space.domain(), &index.space.range());
            PwMultiAff::constant(space, &[7])
        });
        let out = rewriter.rewrite(&s, 0, &index, &inverse).unwrap();
        assert_eq!(out.eval(&[0], &[]), Some(vec![7]));
    }

    #[test]
    fn test_arity_mismatch() {
        let mut ctx = IdContext::new();
        let (s, index, inverse) = fixture(&mut ctx);
        let rewriter = IndexRewriter::custom(|_: &PwMultiAff, _: &TupleId, _: &PwMultiAff| {
            PwMultiAff::constant(Space::map(2, 1), &[0])
        });
        let err = rewriter.rewrite(&s, 3, &index, &inverse).unwrap_err();
        assert_eq!(
            err,
            CodegenError::RewriteArityMismatch {
                stmt: s,
                access: 3,
                expected_in: 1,
                expected_out: 1,
                found_in: 2,
                found_out: 1,
            }
        );
    }
}
