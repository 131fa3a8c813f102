//! The print pass: C text from an annotated AST.

use crate::codegen::annotate::AnnotationCache;
use crate::codegen::ast::{AstNode, UserNode};
use crate::codegen::CodegenOptions;
use crate::utils::errors::CodegenError;
use crate::utils::pretty::CodeFormatter;

/// Prints one leaf of the AST.
pub trait PrintUser {
    fn print_user(&mut self, out: &mut CodeFormatter, node: &UserNode) -> Result<(), CodegenError>;
}

/// Prints the call expression of the leaf, `S(c0, c1);`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallPrinter;

impl PrintUser for CallPrinter {
    fn print_user(&mut self, out: &mut CodeFormatter, node: &UserNode) -> Result<(), CodegenError> {
        out.writeln(&format!("{};", node.expr));
        Ok(())
    }
}

/// Prints statement bodies from the annotation cache.
#[derive(Debug)]
pub struct StatementPrinter<'c, 'a> {
    cache: &'c AnnotationCache<'a>,
}

impl<'c, 'a> StatementPrinter<'c, 'a> {
    pub fn new(cache: &'c AnnotationCache<'a>) -> Self {
        Self { cache }
    }
}

impl PrintUser for StatementPrinter<'_, '_> {
    fn print_user(&mut self, out: &mut CodeFormatter, node: &UserNode) -> Result<(), CodegenError> {
        let key = node
            .annotation()
            .ok_or_else(|| CodegenError::inconsistent(node.id, "leaf has no annotation"))?;
        let annotated = self
            .cache
            .get(key)
            .ok_or_else(|| CodegenError::inconsistent(node.id, format!("no cache entry for {}", key)))?;
        out.writeln(&annotated.render());
        Ok(())
    }
}

const HELPER_MACROS: [(&str, &str); 4] = [
    ("floord", "#define floord(n,d) (((n)<0) ? -((-(n)+(d)-1)/(d)) : (n)/(d))"),
    ("ceild", "#define ceild(n,d) (((n)<0) ? -((-(n))/(d)) : ((n)+(d)-1)/(d))"),
    ("min", "#define min(x,y)    ((x) < (y) ? (x) : (y))"),
    ("max", "#define max(x,y)    ((x) > (y) ? (x) : (y))"),
];

/// Prints an AST as C.
#[derive(Debug, Clone)]
pub struct AstPrinter {
    options: CodegenOptions,
}

impl AstPrinter {
    pub fn new(options: CodegenOptions) -> Self {
        Self { options }
    }

    /// Print `tree`, delegating every leaf to `user`.
    pub fn print(&self, tree: &AstNode, user: &mut dyn PrintUser) -> Result<String, CodegenError> {
        let mut out = CodeFormatter::with_width(self.options.indent);
        if self.options.emit_macros {
            let mut used = Vec::new();
            tree.visit_exprs(&mut |e| e.helpers(&mut used));
            let mut any = false;
            for (name, definition) in HELPER_MACROS {
                if used.contains(&name) {
                    out.writeln(definition);
                    any = true;
                }
            }
            if any {
                out.writeln("");
            }
        }
        print_node(&mut out, tree, user)?;
        Ok(out.finish())
    }
}

impl Default for AstPrinter {
    fn default() -> Self {
        Self::new(CodegenOptions::default())
    }
}

fn print_node(out: &mut CodeFormatter, node: &AstNode, user: &mut dyn PrintUser) -> Result<(), CodegenError> {
    match node {
        AstNode::For { iterator, lower, upper, strict, step, body } => {
            let cmp = if *strict { "<" } else { "<=" };
            let header = format!(
                "for (int {it} = {}; {it} {} {}; {it} += {})",
                lower,
                cmp,
                upper,
                step,
                it = iterator
            );
            print_body(out, &header, body, user)
        }
        AstNode::If { condition, then_body, else_body } => {
            let header = format!("if ({})", condition);
            match else_body {
                None => print_body(out, &header, then_body, user),
                Some(else_body) => {
                    out.block(&header, |f| print_nodes(f, then_body, user))?;
                    out.block("else", |f| print_nodes(f, else_body, user))
                }
            }
        }
        AstNode::Block { statements } => print_nodes(out, statements, user),
        AstNode::User(node) => user.print_user(out, node),
    }
}

fn print_nodes(out: &mut CodeFormatter, nodes: &[AstNode], user: &mut dyn PrintUser) -> Result<(), CodegenError> {
    for node in nodes {
        print_node(out, node, user)?;
    }
    Ok(())
}

/// Braces only around bodies of more than one statement.
fn print_body(
    out: &mut CodeFormatter,
    header: &str,
    body: &[AstNode],
    user: &mut dyn PrintUser,
) -> Result<(), CodegenError> {
    match body {
        [AstNode::Block { statements }] => print_body(out, header, statements, user),
        [single] => out.nested(header, |f| print_node(f, single, user)),
        _ => out.block(header, |f| print_nodes(f, body, user)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::ast::{AstBinOp, AstExpr, NodeId};
    use crate::polyhedral::IdContext;

    fn call(ctx: &mut IdContext, name: &str, k: u32, args: &[&str]) -> AstNode {
        let mut exprs = vec![AstExpr::Id(ctx.id(name))];
        exprs.extend(args.iter().map(|a| AstExpr::var(a)));
        AstNode::User(UserNode::new(NodeId(k), AstExpr::Call(exprs)))
    }

    fn for_loop(it: &str, lower: AstExpr, upper: AstExpr, body: Vec<AstNode>) -> AstNode {
        AstNode::For { iterator: it.into(), lower, upper, strict: false, step: 1, body }
    }

    #[test]
    fn test_single_statement_body_has_no_braces() {
        let mut ctx = IdContext::new();
        let tree = for_loop("c0", AstExpr::Int(0), AstExpr::Int(2), vec![call(&mut ctx, "S", 0, &["c0"])]);
        let text = AstPrinter::default().print(&tree, &mut CallPrinter).unwrap();
        assert_eq!(text, "for (int c0 = 0; c0 <= 2; c0 += 1)\n  S(c0);\n");
    }

    #[test]
    fn test_braces_and_guards() {
        let mut ctx = IdContext::new();
        let guard = AstExpr::binary(AstBinOp::Le, AstExpr::var("c0"), AstExpr::Int(2));
        let tree = for_loop(
            "c0",
            AstExpr::Int(0),
            AstExpr::Int(4),
            vec![
                AstNode::If { condition: guard, then_body: vec![call(&mut ctx, "S", 0, &["c0"])], else_body: None },
                call(&mut ctx, "T", 1, &["c0"]),
            ],
        );
        let text = AstPrinter::default().print(&tree, &mut CallPrinter).unwrap();
        assert_eq!(
            text,
            "for (int c0 = 0; c0 <= 4; c0 += 1) {\n  if (c0 <= 2)\n    S(c0);\n  T(c0);\n}\n"
        );
    }

    #[test]
    fn test_macros_for_used_helpers() {
        let mut ctx = IdContext::new();
        let upper = AstExpr::min_of(vec![AstExpr::var("N"), AstExpr::Int(9)]);
        let tree = for_loop("c0", AstExpr::Int(0), upper, vec![call(&mut ctx, "S", 0, &["c0"])]);
        let options = CodegenOptions { emit_macros: true, ..CodegenOptions::default() };
        let text = AstPrinter::new(options).print(&tree, &mut CallPrinter).unwrap();
        assert!(text.starts_with("#define min(x,y)"));
        assert!(!text.contains("#define max"));
        assert!(text.contains("c0 <= min(N, 9)"));
    }

    #[test]
    fn test_statement_printer_needs_annotation() {
        let mut ctx = IdContext::new();
        let tree = call(&mut ctx, "S", 0, &[]);
        let cache = AnnotationCache::new();
        let err = AstPrinter::default()
            .print(&tree, &mut StatementPrinter::new(&cache))
            .unwrap_err();
        assert!(matches!(err, CodegenError::InconsistentAnnotationState { .. }));
    }
}
