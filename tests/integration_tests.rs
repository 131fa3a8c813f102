//! Integration tests for the code generation pipeline.

use polylearn::codegen::{AnnotationCache, Annotator, AstPrinter, StatementPrinter};
use polylearn::prelude::*;
use polylearn::{compile, generate, parse, transform};

fn generate_source(source: &str) -> String {
    compile(source, "test", &[], CodegenOptions::default()).expect("Failed to generate").into_string()
}

fn generate_with(source: &str, transforms: &[BandTransform]) -> String {
    compile(source, "test", transforms, CodegenOptions::default()).expect("Failed to generate").into_string()
}

fn codegen_error(source: &str) -> CodegenError {
    let program = parse(source, "test").expect("Failed to parse");
    CodeGenerator::new(&program.scop, &program.schedule).generate().unwrap_err()
}

#[test]
fn test_single_loop() {
    let code = generate_source("stmt { S[i] : 0 <= i < 3 } { A[i] = A[i] + 1; }");
    assert_eq!(code, "for (int c0 = 0; c0 <= 2; c0 += 1)\n  A[c0] = A[c0] + 1;\n");
}

#[test]
fn test_parametric_loop() {
    let source = r#"
        params N;
        context { : N >= 1 };
        stmt { S[i] : 0 <= i < N } { A[i] = 0; }
    "#;
    assert_eq!(generate_source(source), "for (int c0 = 0; c0 < N; c0 += 1)\n  A[c0] = 0;\n");
}

#[test]
fn test_sequential_statements() {
    let source = r#"
        stmt { S[i] : 0 <= i < 3 } { A[i] = 0; }
        stmt { T[i] : 0 <= i < 3 } { B[i] = A[i]; }
    "#;
    assert_eq!(
        generate_source(source),
        "for (int c0 = 0; c0 <= 2; c0 += 1)\n  A[c0] = 0;\n\
         for (int c0 = 0; c0 <= 2; c0 += 1)\n  B[c0] = A[c0];\n"
    );
}

#[test]
fn test_fused_statements() {
    let source = r#"
        stmt { S[i] : 0 <= i < 3 } { A[i] = 0; }
        stmt { T[i] : 0 <= i < 3 } { B[i] = A[i]; }
        schedule { S[i] -> [i, 0]; T[i] -> [i, 1] };
    "#;
    assert_eq!(
        generate_source(source),
        "for (int c0 = 0; c0 <= 2; c0 += 1) {\n  A[c0] = 0;\n  B[c0] = A[c0];\n}\n"
    );
}

#[test]
fn test_interchange() {
    let source = "stmt { S[i, j] : 0 <= i < 2 and 0 <= j < 4 } { A[i][j] = B[j][i]; }";
    let code = generate_with(source, &[BandTransform::Interchange(0, 1)]);
    assert_eq!(
        code,
        "for (int c0 = 0; c0 <= 3; c0 += 1)\n  for (int c1 = 0; c1 <= 1; c1 += 1)\n    A[c1][c0] = B[c0][c1];\n"
    );
}

#[test]
fn test_skew() {
    let source = "stmt { S[i, j] : 0 <= i < 3 and 0 <= j < 3 } { A[i][j] = 0; }";
    let code = generate_with(source, &[BandTransform::Skew { target: 1, source: 0, factor: 1 }]);
    assert!(code.contains("for (int c1 = c0; c1 <= c0 + 2; c1 += 1)"), "{}", code);
    assert!(code.contains("A[c0][c1 - c0] = 0;"), "{}", code);
}

#[test]
fn test_shift_and_reverse() {
    let source = "stmt { S[i] : 0 <= i < 3 } { A[i] = i; }";
    assert_eq!(
        generate_with(source, &[BandTransform::Shift { dim: 0, offset: 1 }]),
        "for (int c0 = 1; c0 <= 3; c0 += 1)\n  A[c0 - 1] = c0 - 1;\n"
    );
    assert_eq!(
        generate_with(source, &[BandTransform::Reverse(0)]),
        "for (int c0 = -2; c0 <= 0; c0 += 1)\n  A[-c0] = -c0;\n"
    );
}

#[test]
fn test_transform_needs_a_large_enough_band() {
    let program = parse("stmt { S[i] : 0 <= i < 3 } { A[i] = 0; }", "test").unwrap();
    assert!(transform(&program.schedule, &[BandTransform::Interchange(0, 1)]).is_err());
}

#[test]
fn test_determinism() {
    let source = r#"
        params N;
        stmt { S[i, j] : 0 <= i < N and 0 <= j <= i } { L[i][j] = L[i][j] / D[j]; }
        stmt { T[i] : 0 <= i < N } { D[i] = sqrt(D[i]); }
        schedule { S[i, j] -> [i, j, 0]; T[i] -> [i, i, 1] };
    "#;
    assert_eq!(generate_source(source), generate_source(source));
}

#[test]
fn test_resolve_follows_identity() {
    let first = parse(
        "stmt { S[i] : 0 <= i < 3 } { A[i] = 0; }\nstmt { T[i] : 0 <= i < 3 } { B[i] = 0; }",
        "first",
    )
    .unwrap();
    let swapped = parse(
        "stmt { T[i] : 0 <= i < 3 } { A[i] = 0; }\nstmt { S[i] : 0 <= i < 3 } { B[i] = 0; }",
        "swapped",
    )
    .unwrap();

    let written = |program: &ScopProgram, name: &str| -> String {
        let id = program.ids.lookup(name).unwrap();
        let stmt = StatementRegistry::new(&program.scop).resolve(id).unwrap();
        assert_eq!(&stmt.id, id);
        stmt.accesses[stmt.body.target()].array.as_ref().unwrap().name().to_string()
    };
    assert_eq!(written(&first, "S"), "A");
    assert_eq!(written(&swapped, "S"), "B");
    assert_eq!(written(&swapped, "T"), "A");
}

#[test]
fn test_resolve_rejects_fresh_identity() {
    let mut program = parse("stmt { S[i] : 0 <= i < 3 } { A[i] = 0; }", "test").unwrap();
    let other = program.ids.fresh("S");
    let err = StatementRegistry::new(&program.scop).resolve(&other).unwrap_err();
    assert!(matches!(err, CodegenError::StatementNotFound { .. }));
}

#[test]
fn test_pullback_round_trip() {
    let mut ids = IdContext::new();
    let domain = parse_set("{ S[i, j] : 0 <= i < 4 and 0 <= j < 3 }", &mut ids).unwrap().sets.remove(0);
    let schedule = parse_union_map("{ S[i, j] -> [j, i + j] }", &mut ids).unwrap().remove(0);
    let index = polylearn::frontend::parse_pw_multi_aff("{ S[i, j] -> A[i + 1, 2j - i] }", &mut ids).unwrap();

    let inverse = BasicMap::from_affine_map(&schedule, &domain).reverse().as_pw_multi_aff().unwrap();
    let pulled = index.pullback(&inverse).unwrap();

    let points = domain.points_in_box(-1, 5, &[]);
    assert_eq!(points.len(), 12);
    for point in points {
        let c = schedule.apply(&point, &[]);
        assert_eq!(pulled.eval(&c, &[]), index.eval(&point, &[]), "at {:?}", point);
    }
}

#[test]
fn test_custom_rewrite_replaces_pullback() {
    use std::cell::Cell;
    use std::rc::Rc;

    let program = parse("stmt { S[i, j] : 0 <= i < 2 and 0 <= j < 2 } { A[i][j] = B[j]; }", "test").unwrap();
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let code = CodeGenerator::new(&program.scop, &program.schedule)
        .with_custom_pullback(move |index: &PwMultiAff, _: &TupleId, inverse: &PwMultiAff| {
            counter.set(counter.get() + 1);
            let space = Space::map_from(&inverse.space.domain(), &index.space.range());
            PwMultiAff::constant(space, &vec![7; index.n_out()])
        })
        .generate()
        .unwrap();

    // one leaf, two accesses
    assert_eq!(calls.get(), 2);
    assert!(code.as_str().contains("A[7][7] = B[7];"));
}

#[test]
fn test_rewrite_arity_mismatch() {
    let program = parse("stmt { S[i] : 0 <= i < 3 } { A[i] = 0; }", "test").unwrap();
    let err = CodeGenerator::new(&program.scop, &program.schedule)
        .with_custom_pullback(|_: &PwMultiAff, _: &TupleId, inverse: &PwMultiAff| {
            PwMultiAff::constant(Space::map_from(&inverse.space.domain(), &Space::set(2)), &[0, 0])
        })
        .generate()
        .unwrap_err();
    assert!(matches!(err, CodegenError::RewriteArityMismatch { expected_out: 1, found_out: 2, .. }));
}

#[test]
fn test_non_unimodular_schedule() {
    let err = codegen_error("stmt { S[i] : 0 <= i < 3 } { A[i] = 0; }\nschedule { S[i] -> [2i] };");
    assert!(matches!(err, CodegenError::MalformedSchedule { .. }));
}

#[test]
fn test_unannotated_tree_fails_to_print() {
    let program = parse("stmt { S[i] : 0 <= i < 3 } { A[i] = 0; }", "test").unwrap();
    let tree = CodeGenerator::new(&program.scop, &program.schedule).build_ast().unwrap();
    let cache = AnnotationCache::new();
    let err = AstPrinter::default().print(&tree, &mut StatementPrinter::new(&cache)).unwrap_err();
    assert!(matches!(err, CodegenError::InconsistentAnnotationState { .. }));
}

#[test]
fn test_every_leaf_annotated_once() {
    let source = r#"
        params N;
        context { : N >= 1 };
        stmt { S[i] : 0 <= i < N } { A[i] = 0; }
        stmt { T[i] : 0 <= i < 2N } { B[i] = A[i]; }
        stmt { U[i, j] : 0 <= i < N and 0 <= j < 3 } { C[i][j] = B[i]; }
        schedule { S[i] -> [i, 0, 0]; T[i] -> [i, 1, 0]; U[i, j] -> [i, 2, j] };
    "#;
    let program = parse(source, "test").unwrap();
    let rewriter = IndexRewriter::Pullback;
    let mut annotator = Annotator::new(StatementRegistry::new(&program.scop), &rewriter);
    let tree = AstBuilder::new()
        .with_context(program.scop.context.clone())
        .node_from(&program.schedule, &mut annotator)
        .unwrap();
    let cache = annotator.into_cache();

    let leaves = tree.user_nodes();
    assert_eq!(leaves.len(), 3);
    assert_eq!(cache.len(), leaves.len());
    for leaf in leaves {
        let key = leaf.annotation().expect("leaf without annotation");
        let annotated = cache.get(key).expect("annotation missing from the cache");
        assert_eq!(Some(&annotated.stmt.id), leaf.statement_id());
        assert_eq!(annotated.exprs.len(), annotated.stmt.accesses.len());
    }
}

#[test]
fn test_fused_loops_with_different_parametric_bounds() {
    let source = r#"
        params N;
        context { : N >= 1 };
        stmt { S[i] : 0 <= i < N } { A[i] = 0; }
        stmt { T[i] : 0 <= i < 2N } { B[i] = 0; }
        schedule { S[i] -> [i, 0]; T[i] -> [i, 1] };
    "#;
    assert_eq!(
        generate_source(source),
        "for (int c0 = 0; c0 < 2 * N; c0 += 1) {\n  if (N >= c0 + 1)\n    A[c0] = 0;\n  B[c0] = 0;\n}\n"
    );
}

#[test]
fn test_macros() {
    let source = r#"
        params N;
        stmt { S[i] : 0 <= i < N and i <= 9 } { A[i] = 0; }
    "#;
    let options = CodegenOptions { emit_macros: true, ..CodegenOptions::default() };
    let code = compile(source, "test", &[], options).unwrap();
    assert!(code.as_str().starts_with("#define min(x,y)"), "{}", code.as_str());
    assert!(code.as_str().contains("c0 <= min("), "{}", code.as_str());
}

#[test]
fn test_generate_entry_point() {
    let program = parse("stmt { S[i] : 0 <= i < 3 } { A[i] = 0; }", "fill").unwrap();
    let code = generate(&program.scop, &program.schedule, CodegenOptions { indent: 4, emit_macros: false }).unwrap();
    assert_eq!(code.as_str(), "for (int c0 = 0; c0 <= 2; c0 += 1)\n    A[c0] = 0;\n");
    assert!(code.to_string().starts_with("```c\n"));
}

#[test]
fn test_parse_errors_are_positioned() {
    let err = parse_scop("stmt { S[i] : 0 <= i < } { A[i] = 0; }", "test").unwrap_err();
    match err {
        PolyLearnError::Parse(e) => {
            assert_eq!(e.span.start_line, 1);
            assert_eq!(e.span.start_column, 24);
            assert_eq!(e.found.as_deref(), Some("'}'"));
        }
        other => panic!("expected a parse error, got {}", other),
    }

    let err = parse_scop("params N;\nstmt { S[i] : 0 <= i < M } { A[i] = 0; }", "test").unwrap_err();
    match err {
        PolyLearnError::Parse(e) => {
            assert_eq!(e.kind, ParseErrorKind::UnknownName);
            assert_eq!(e.span.start_line, 2);
        }
        other => panic!("expected a parse error, got {}", other),
    }
}
