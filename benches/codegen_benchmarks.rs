//! Benchmarks for the code generator.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use polylearn::codegen::{CodeGenerator, CodegenOptions};
use polylearn::schedule::BandTransform;

const GEMM: &str = r#"
    params N, M, K;
    context { : N >= 1 and M >= 1 and K >= 1 };
    stmt { S[i, j] : 0 <= i < N and 0 <= j < M } { C[i][j] = 0; }
    stmt { T[i, j, k] : 0 <= i < N and 0 <= j < M and 0 <= k < K } { C[i][j] += A[i][k] * B[k][j]; }
    schedule { S[i, j] -> [i, j, 0, 0]; T[i, j, k] -> [i, j, 1, k] };
"#;

/// Benchmark parsing and lowering speed.
fn bench_parsing(c: &mut Criterion) {
    c.bench_function("parse_gemm", |b| {
        b.iter(|| polylearn::frontend::parse_scop(black_box(GEMM), "gemm").unwrap())
    });
}

/// Benchmark lexer speed.
fn bench_lexing(c: &mut Criterion) {
    c.bench_function("lex_gemm", |b| {
        b.iter(|| polylearn::frontend::Lexer::new(black_box(GEMM)).tokenize().unwrap())
    });
}

/// Benchmark the full build-annotate-print pipeline.
fn bench_generate(c: &mut Criterion) {
    let program = polylearn::frontend::parse_scop(GEMM, "gemm").unwrap();
    c.bench_function("generate_gemm", |b| {
        b.iter(|| {
            CodeGenerator::new(black_box(&program.scop), &program.schedule)
                .with_options(CodegenOptions::default())
                .generate()
                .unwrap()
        })
    });

    let skewed = polylearn::transform(&program.schedule, &[BandTransform::Skew { target: 1, source: 0, factor: 1 }]).unwrap();
    c.bench_function("generate_gemm_skewed", |b| {
        b.iter(|| CodeGenerator::new(&program.scop, black_box(&skewed)).generate().unwrap())
    });
}

criterion_group!(benches, bench_parsing, bench_lexing, bench_generate);
criterion_main!(benches);
