//! Benchmarks for pipeline assembly and status replay.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pipeforge::assembler::assemble;
use pipeforge::history::{completed_steps, ExecutionEvent};
use pipeforge::skeleton::{qc_skeleton, skeleton_for, QC_FILTER_MAP};
use pipeforge::context::ProcessKind;
use pipeforge::testing::{qc_context, HistoryBuilder};

const FILTER_STEPS: [&str; 5] = [
    "ClassifierFilter",
    "CellSizeDistributionFilter",
    "MitochondrialContentFilter",
    "NumGenesVsNumUmisFilter",
    "DoubletScoresFilter",
];

/// A finished QC execution over `samples` samples.
fn qc_history(samples: u64) -> Vec<ExecutionEvent> {
    let mut history = HistoryBuilder::new();
    let root = history.execution_started();
    let map = history.map_started(Some(&root), QC_FILTER_MAP, samples);

    let mut last = map.clone();
    for index in 0..samples {
        let iteration = history.iteration_started(&map, index);
        let mut previous = iteration;
        for step in FILTER_STEPS {
            previous = history.task(Some(&previous), step);
        }
        last = history.iteration_succeeded(&previous, QC_FILTER_MAP, index);
    }
    let map_exit = history.map_finished(&last, QC_FILTER_MAP);
    let integration = history.task(Some(&map_exit), "DataIntegration");
    let embedding = history.task(Some(&integration), "ConfigureEmbedding");
    history.execution_succeeded(&embedding);
    history.build()
}

fn assembly_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");
    for samples in [1_usize, 16, 128] {
        let names: Vec<String> = (0..samples).map(|i| format!("sample-{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let ctx = qc_context(&refs);
        let skeleton = skeleton_for(ProcessKind::QualityControl);

        group.bench_with_input(BenchmarkId::new("qc", samples), &ctx, |b, ctx| {
            b.iter(|| assemble(black_box(&skeleton), black_box(ctx)));
        });
    }

    let ctx = qc_context(&["sample-0"]);
    let partial = qc_skeleton(&["doubletScores", "dataIntegration", "configureEmbedding"]);
    group.bench_function("qc_partial", |b| {
        b.iter(|| assemble(black_box(&partial), black_box(&ctx)));
    });
    group.finish();
}

fn replay_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("completed_steps");
    for samples in [8_u64, 64, 512] {
        let events = qc_history(samples);
        group.bench_with_input(BenchmarkId::new("qc", samples), &events, |b, events| {
            b.iter(|| completed_steps(black_box(events)));
        });
    }
    group.finish();
}

criterion_group!(benches, assembly_benchmark, replay_benchmark);
criterion_main!(benches);
