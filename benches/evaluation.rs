//! Expression Evaluation Benchmarks
//!
//! Compares three ways of evaluating the same single-variable expressions:
//! - **Direct**: a hand-written Rust closure
//! - **Interpreted**: `Expression::evaluate_at`, walking the canonical term list
//! - **JIT**: the expression compiled once with Cranelift and called through `CompiledFunction`
//!
//! A second group measures the one-time cost of building and compiling each expression.
//!
//! ## Usage
//!
//! Run with: `cargo bench --bench evaluation`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use polyterm_jit::{Expression, Symbol, Term};

/// An expression builder paired with the equivalent hand-written function.
struct Case {
    name: &'static str,
    build: fn(&Symbol) -> Expression,
    direct: fn(f64) -> f64,
}

const CASES: [Case; 4] = [
    Case {
        name: "linear",
        build: linear,
        direct: linear_direct,
    },
    Case {
        name: "quadratic",
        build: quadratic,
        direct: quadratic_direct,
    },
    Case {
        name: "mixed_powers",
        build: mixed_powers,
        direct: mixed_powers_direct,
    },
    Case {
        name: "high_degree",
        build: high_degree,
        direct: high_degree_direct,
    },
];

fn linear(x: &Symbol) -> Expression {
    2.2 * x + 1.1
}

fn linear_direct(x: f64) -> f64 {
    2.2 * x + 1.1
}

fn quadratic(x: &Symbol) -> Expression {
    3.0 * x.pow(2.0) - 2.0 * x + 7.0
}

fn quadratic_direct(x: f64) -> f64 {
    3.0 * x * x - 2.0 * x + 7.0
}

fn mixed_powers(x: &Symbol) -> Expression {
    2.0 + 1.0 / x.pow(2.0) + 6.0 * x + 6.0 - 10.0 * x.pow(-3.0) + x.pow(0.25)
}

fn mixed_powers_direct(x: f64) -> f64 {
    2.0 + 1.0 / x.powi(2) + 6.0 * x + 6.0 - 10.0 * x.powi(-3) + x.powf(0.25)
}

/// Sum of x^p / p for p in 1..=12
fn high_degree(x: &Symbol) -> Expression {
    (1..=12)
        .map(|p| Term::new(1.0 / f64::from(p), x.clone(), f64::from(p)))
        .collect()
}

fn high_degree_direct(x: f64) -> f64 {
    (1..=12).map(|p| x.powi(p) / f64::from(p)).sum()
}

fn benchmark_evaluation(c: &mut Criterion) {
    let x = Symbol::new("x");
    let input = 1.7;

    let mut group = c.benchmark_group("Expression Evaluation");

    for case in &CASES {
        let (name, direct) = (case.name, case.direct);
        let expression = (case.build)(&x);
        let compiled = expression.compile().unwrap();

        group.bench_with_input(BenchmarkId::new("Direct", name), &input, |b, &input| {
            b.iter(|| black_box(direct(black_box(input))))
        });

        group.bench_with_input(BenchmarkId::new("Interpreted", name), &input, |b, &input| {
            b.iter(|| black_box(expression.evaluate_at(black_box(input))))
        });

        group.bench_with_input(BenchmarkId::new("JIT", name), &input, |b, &input| {
            b.iter(|| black_box(compiled.call(black_box(input))))
        });
    }

    group.finish();
}

fn benchmark_batch(c: &mut Criterion) {
    let x = Symbol::new("x");
    let expression = 2.0 + 1.0 / x.pow(2.0) + 6.0 * &x + 6.0 - 10.0 * x.pow(-3.0) + x.pow(0.25);
    let compiled = expression.compile().unwrap();
    let inputs: Vec<f64> = (1..=100_000).map(|i| i as f64 * 1e-3).collect();

    let mut group = c.benchmark_group("Batch Evaluation");

    group.bench_function("JIT sequential", |b| {
        let mut outputs = vec![0.0; inputs.len()];
        b.iter(|| {
            compiled.eval_into(black_box(&inputs), &mut outputs).unwrap();
            black_box(outputs[0])
        })
    });

    group.bench_function("JIT parallel", |b| {
        b.iter(|| black_box(compiled.eval_par(black_box(&inputs))))
    });

    group.finish();
}

fn benchmark_compilation_time(c: &mut Criterion) {
    let x = Symbol::new("x");

    let mut group = c.benchmark_group("Compilation Time");

    for case in &CASES {
        group.bench_with_input(BenchmarkId::new("Compile", case.name), &x, |b, x| {
            b.iter(|| black_box((case.build)(x).compile().unwrap()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_evaluation,
    benchmark_batch,
    benchmark_compilation_time
);
criterion_main!(benches);
