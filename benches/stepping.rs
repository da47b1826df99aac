//! Stepping Engine Benchmarks
//!
//! Three workloads are measured:
//! 1. Calculator - arithmetic with a full precedence table, growing input
//! 2. Ambiguous sums - every derivation of `1+1+...` without precedence
//! 3. Resolution - effective grammar of a deep inheritance chain
//!
//! Run with: cargo bench --bench stepping

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gramstep::prelude::*;

// ============================================================================
// Test Data
// ============================================================================

const CALC: &str = "Grammar: Calc
TokenSplitter: whitespace
N := /[0-9]+/
<e> ::= <e> '+' <e> | <e> '-' <e> | <e> '*' <e> | <e> '/' <e> | '(' <e> ')' | N
Precedence: left '+' '-'
Precedence: left '*' '/'";

const SUMS: &str = "Grammar: Sums\nN := /[0-9]+/\n<e> ::= <e> '+' <e> | N";

fn expression(terms: usize) -> String {
    let ops = ["+", "*", "-", "/"];
    let mut text = String::from("1");
    for i in 0..terms {
        text.push(' ');
        text.push_str(ops[i % ops.len()]);
        if i % 5 == 4 {
            text.push_str(" (2 + 3)");
        } else {
            text.push_str(&format!(" {}", i + 2));
        }
    }
    text
}

/// `depth` grammars, each extending the previous one and adding a rule
fn chain(depth: usize) -> GrammarRegistry {
    let mut registry = GrammarRegistry::new();
    registry
        .register_text("Grammar: L0\nN := /[0-9]+/\n<r0> ::= N")
        .unwrap();
    for i in 1..depth {
        let text = format!(
            "Grammar: L{i}\nExtends Grammar: L{prev}\n<r{i}> ::= <r{prev}> '{i}'\n<r0> |= '-' N",
            i = i,
            prev = i - 1
        );
        registry.register_text(&text).unwrap();
    }
    registry
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_calculator(c: &mut Criterion) {
    let mut group = c.benchmark_group("calculator");
    let mut registry = GrammarRegistry::new();
    registry.register_text(CALC).unwrap();

    for terms in [4, 16, 64] {
        let input = expression(terms);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(terms), &input, |b, input| {
            b.iter(|| parse(&mut registry, "Calc", black_box(input.as_str())))
        });
    }
    group.finish();
}

fn bench_ambiguous(c: &mut Criterion) {
    let mut group = c.benchmark_group("ambiguous_sums");
    let mut registry = GrammarRegistry::new();
    registry.register_text(SUMS).unwrap();

    for terms in [3, 5, 7] {
        let input = vec!["1"; terms].join("+");
        group.bench_with_input(BenchmarkId::from_parameter(terms), &input, |b, input| {
            b.iter(|| parse(&mut registry, "Sums", black_box(input.as_str())))
        });
    }
    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    for depth in [4, 16, 64] {
        let mut registry = chain(depth);
        let leaf = format!("L{}", depth - 1);
        group.bench_with_input(BenchmarkId::new("cold", depth), &leaf, |b, leaf| {
            b.iter(|| {
                registry.invalidate();
                registry.effective(black_box(leaf)).map(|g| g.productions.len())
            })
        });
        group.bench_with_input(BenchmarkId::new("cached", depth), &leaf, |b, leaf| {
            b.iter(|| registry.effective(black_box(leaf)).map(|g| g.productions.len()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_calculator, bench_ambiguous, bench_resolution);
criterion_main!(benches);
