//! The walk pass: annotating leaves with their rewritten accesses.
//!
//! The [`Annotator`] is the `at_each_domain` hook of the AST build. For
//! every leaf it resolves the statement, inverts the schedule of the leaf,
//! rewrites each access over the loop counters and stores the resulting
//! expressions in an [`AnnotationCache`] keyed by the leaf identity. The
//! cache is then handed to the printer, which never recomputes anything.

use crate::codegen::ast::{AstExpr, NodeId, UserNode};
use crate::codegen::build::{AstBuild, AtEachDomain};
use crate::codegen::rewrite::IndexRewriter;
use crate::scop::{Statement, StatementRegistry};
use crate::utils::errors::CodegenError;
use log::debug;
use std::collections::HashMap;

/// What the printer needs to render one leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated<'a> {
    pub stmt: &'a Statement,
    /// One expression per access of `stmt`
    pub exprs: Vec<AstExpr>,
}

impl Annotated<'_> {
    /// The statement body with the cached expressions substituted.
    pub fn render(&self) -> String {
        self.stmt.render(&self.exprs)
    }
}

/// Leaf identity to annotation, for one generation.
#[derive(Debug, Default, Clone)]
pub struct AnnotationCache<'a> {
    entries: HashMap<NodeId, Annotated<'a>>,
}

impl<'a> AnnotationCache<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the annotation of `leaf`; a leaf is annotated once.
    pub fn insert(&mut self, leaf: NodeId, annotated: Annotated<'a>) -> Result<(), CodegenError> {
        if self.entries.contains_key(&leaf) {
            return Err(CodegenError::inconsistent(leaf, "leaf annotated twice"));
        }
        self.entries.insert(leaf, annotated);
        Ok(())
    }

    pub fn get(&self, leaf: NodeId) -> Option<&Annotated<'a>> {
        self.entries.get(&leaf)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The `at_each_domain` hook that fills an [`AnnotationCache`].
pub struct Annotator<'a> {
    registry: StatementRegistry<'a>,
    rewriter: &'a IndexRewriter,
    cache: AnnotationCache<'a>,
}

impl<'a> Annotator<'a> {
    pub fn new(registry: StatementRegistry<'a>, rewriter: &'a IndexRewriter) -> Self {
        Self { registry, rewriter, cache: AnnotationCache::new() }
    }

    /// The cache built so far; ends the walk.
    pub fn into_cache(self) -> AnnotationCache<'a> {
        self.cache
    }
}

impl AtEachDomain for Annotator<'_> {
    fn at_each_domain(&mut self, mut node: UserNode, build: &AstBuild) -> Result<UserNode, CodegenError> {
        let id = node
            .statement_id()
            .cloned()
            .ok_or_else(|| CodegenError::inconsistent(node.id, "leaf does not call a statement"))?;
        let stmt = self.registry.resolve(&id)?;

        let inverse = build
            .schedule()
            .reverse()
            .as_pw_multi_aff()
            .map_err(|e| CodegenError::malformed(&id, format!("schedule cannot be inverted: {}", e)))?;
        let rewriter = self.rewriter;
        let exprs = stmt.build_ast_exprs(build, |k, access| rewriter.rewrite(&id, k, &access.index, &inverse))?;

        debug!("annotated {} ({}) with {} access(es)", node.id, id, exprs.len());
        self.cache.insert(node.id, Annotated { stmt, exprs })?;
        node.set_annotation(node.id);
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::build::AstBuilder;
    use crate::polyhedral::{AffineExpr, AffineMap, IdContext, IntegerSet, PwMultiAff, Space};
    use crate::schedule::Schedule;
    use crate::scop::{Access, BodyExpr, BodyOp, Scop, StmtBody};

    // S[i] : 0 <= i < 3, A[i] = A[i] + 1
    fn scop(ctx: &mut IdContext) -> Scop {
        let domain = IntegerSet::rectangular(&[3]).with_tuple(ctx.id("S"));
        let a = ctx.id("A");
        let space = Space::map_from(&domain.space, &Space::set(1).with_tuple(Some(a.clone())));
        let index = PwMultiAff::from_affine_map(AffineMap::with_space(space, vec![AffineExpr::var(0, 1, 0)]));
        let body = StmtBody::Assignment {
            target: 0,
            value: BodyExpr::binary(BodyOp::Add, BodyExpr::Access(1), BodyExpr::Int(1)),
        };
        let stmt = Statement::new(
            domain,
            vec![Access::write(a.clone(), index.clone()), Access::read(a, index)],
            body,
        )
        .unwrap();
        let mut scop = Scop::new("inc", vec![]);
        scop.add_statement(stmt).unwrap();
        scop
    }

    #[test]
    fn test_annotates_every_leaf_once() {
        let mut ctx = IdContext::new();
        let scop = scop(&mut ctx);
        let rewriter = IndexRewriter::Pullback;
        let mut annotator = Annotator::new(StatementRegistry::new(&scop), &rewriter);
        let tree = AstBuilder::new()
            .node_from(&Schedule::sequential(scop.domain()), &mut annotator)
            .unwrap();
        let cache = annotator.into_cache();

        let leaves = tree.user_nodes();
        assert_eq!(leaves.len(), 1);
        assert_eq!(cache.len(), 1);
        let key = leaves[0].annotation().unwrap();
        assert_eq!(cache.get(key).unwrap().render(), "A[c0] = A[c0] + 1;");
    }

    #[test]
    fn test_unknown_statement() {
        let mut ctx = IdContext::new();
        let scop = scop(&mut ctx);
        let stray = IntegerSet::rectangular(&[2]).with_tuple(ctx.fresh("S"));
        let rewriter = IndexRewriter::Pullback;
        let mut annotator = Annotator::new(StatementRegistry::new(&scop), &rewriter);
        let schedule = Schedule::sequential(crate::polyhedral::UnionSet::from_sets(vec![stray]));
        let err = AstBuilder::new().node_from(&schedule, &mut annotator).unwrap_err();
        assert!(matches!(err, CodegenError::StatementNotFound { .. }));
    }

    #[test]
    fn test_duplicate_leaf() {
        let mut ctx = IdContext::new();
        let scop = scop(&mut ctx);
        let stmt = &scop.statements()[0];
        let mut cache = AnnotationCache::new();
        cache.insert(NodeId(0), Annotated { stmt, exprs: vec![] }).unwrap();
        let err = cache.insert(NodeId(0), Annotated { stmt, exprs: vec![] }).unwrap_err();
        assert!(matches!(err, CodegenError::InconsistentAnnotationState { .. }));
    }
}
