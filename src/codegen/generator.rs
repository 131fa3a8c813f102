//! The code generation pipeline.

use crate::codegen::annotate::Annotator;
use crate::codegen::ast::AstNode;
use crate::codegen::build::{AstBuild, AstBuilder};
use crate::codegen::printer::{AstPrinter, StatementPrinter};
use crate::codegen::rewrite::{AccessRewrite, IndexRewriter};
use crate::codegen::source::CSource;
use crate::codegen::CodegenOptions;
use crate::codegen::ast::UserNode;
use crate::schedule::Schedule;
use crate::scop::{Scop, StatementRegistry};
use crate::utils::errors::CodegenError;
use log::debug;

/// Generates C code for a SCoP under a schedule.
///
/// Generation is two passes: the AST build with the [`Annotator`] as its
/// leaf hook, then printing from the annotation cache.
#[derive(Debug)]
pub struct CodeGenerator<'a> {
    scop: &'a Scop,
    schedule: &'a Schedule,
    rewriter: IndexRewriter,
    options: CodegenOptions,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(scop: &'a Scop, schedule: &'a Schedule) -> Self {
        Self {
            scop,
            schedule,
            rewriter: IndexRewriter::Pullback,
            options: CodegenOptions::default(),
        }
    }

    /// Replace the default pullback for every access.
    pub fn with_custom_pullback(mut self, rewrite: impl AccessRewrite + 'static) -> Self {
        self.rewriter = IndexRewriter::custom(rewrite);
        self
    }

    pub fn with_options(mut self, options: CodegenOptions) -> Self {
        self.options = options;
        self
    }

    fn builder(&self) -> AstBuilder {
        AstBuilder::new().with_context(self.scop.context.clone())
    }

    /// The AST with call expressions at the leaves, without annotations.
    pub fn build_ast(&self) -> Result<AstNode, CodegenError> {
        let mut keep = |node: UserNode, _: &AstBuild| Ok::<_, CodegenError>(node);
        self.builder().node_from(self.schedule, &mut keep)
    }

    /// Generate the code. Any error aborts generation.
    pub fn generate(&self) -> Result<CSource, CodegenError> {
        debug!(
            "generating code for {} ({} statement(s), {} scheduled)",
            self.scop.name,
            self.scop.n_stmt(),
            self.schedule.n_stmt()
        );

        let mut annotator = Annotator::new(StatementRegistry::new(self.scop), &self.rewriter);
        let tree = self.builder().node_from(self.schedule, &mut annotator)?;
        let cache = annotator.into_cache();
        debug!("annotated {} leaves", cache.len());

        let text = AstPrinter::new(self.options.clone()).print(&tree, &mut StatementPrinter::new(&cache))?;
        Ok(CSource::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::{AffineExpr, AffineMap, IdContext, IntegerSet, PwMultiAff, Space, TupleId};
    use crate::scop::{Access, BodyExpr, Statement, StmtBody};
    use std::cell::Cell;
    use std::rc::Rc;

    // S[i] : 0 <= i < 3, A[i] = i
    fn scop(ctx: &mut IdContext) -> Scop {
        let domain = IntegerSet::rectangular(&[3]).with_tuple(ctx.id("S"));
        let a = ctx.id("A");
        let to_a = Space::map_from(&domain.space, &Space::set(1).with_tuple(Some(a.clone())));
        let to_value = Space::map_from(&domain.space, &Space::set(1));
        let index = |space: Space| {
            PwMultiAff::from_affine_map(AffineMap::with_space(space, vec![AffineExpr::var(0, 1, 0)]))
        };
        let stmt = Statement::new(
            domain,
            vec![Access::write(a, index(to_a)), Access::value(index(to_value))],
            StmtBody::Assignment { target: 0, value: BodyExpr::Access(1) },
        )
        .unwrap();
        let mut scop = Scop::new("fill", vec![]);
        scop.add_statement(stmt).unwrap();
        scop
    }

    #[test]
    fn test_generate() {
        let mut ctx = IdContext::new();
        let scop = scop(&mut ctx);
        let schedule = Schedule::sequential(scop.domain());
        let code = CodeGenerator::new(&scop, &schedule).generate().unwrap();
        assert_eq!(code.as_str(), "for (int c0 = 0; c0 <= 2; c0 += 1)\n  A[c0] = c0;\n");
    }

    #[test]
    fn test_custom_pullback_runs_once_per_access() {
        let mut ctx = IdContext::new();
        let scop = scop(&mut ctx);
        let schedule = Schedule::sequential(scop.domain());
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let code = CodeGenerator::new(&scop, &schedule)
            .with_custom_pullback(move |index: &PwMultiAff, _: &TupleId, inverse: &PwMultiAff| {
                counter.set(counter.get() + 1);
                let space = Space::map_from(&inverse.space.domain(), &index.space.range());
                PwMultiAff::constant(space, &[0])
            })
            .generate()
            .unwrap();
        assert_eq!(calls.get(), 2);
        assert!(code.as_str().contains("A[0] = 0;"));
    }

    #[test]
    fn test_build_ast_leaves_calls() {
        let mut ctx = IdContext::new();
        let scop = scop(&mut ctx);
        let schedule = Schedule::sequential(scop.domain());
        let tree = CodeGenerator::new(&scop, &schedule).build_ast().unwrap();
        assert_eq!(tree.user_nodes()[0].expr.to_string(), "S(c0)");
        assert_eq!(tree.user_nodes()[0].annotation(), None);
    }
}
