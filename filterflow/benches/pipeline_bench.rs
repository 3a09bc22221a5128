//! Benchmarks for pipeline dispatch and tank throughput.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use filterflow::prelude::*;
use filterflow::stock::{PassThrough, SplitWords, Waste};
use serde_json::{json, Value};

fn linear_chain(len: usize) -> Pipeline {
    let names: Vec<String> = (0..len).map(|i| format!("p{i}")).collect();
    let mut builder = PipelineBuilder::new("chain");
    for name in &names {
        builder = builder.filter(name.as_str(), PassThrough::new(), Value::Null).unwrap();
    }
    builder = builder.filter("waste", Waste::new(), Value::Null).unwrap();
    let mut chain: Vec<&str> = names.iter().map(String::as_str).collect();
    chain.push("waste");
    builder.chain(&chain).unwrap().build().unwrap()
}

fn dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_chain");
    for len in [1, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let mut pipeline = linear_chain(len);
            b.iter(|| pipeline.send(black_box(Packet::new("unit"))).unwrap());
        });
    }
    group.finish();
}

fn tank_benchmark(c: &mut Criterion) {
    c.bench_function("tank_overflow_1000", |b| {
        b.iter(|| {
            let mut pipeline = PipelineBuilder::new("tank")
                .filter("tank", TankQueue::new(), json!({"tank_size": 64}))
                .unwrap()
                .filter("waste", Waste::new(), Value::Null)
                .unwrap()
                .main("tank", "waste")
                .unwrap()
                .build()
                .unwrap();
            for n in 0..1000_i64 {
                let priority = (n * 7919) % 1000;
                pipeline.send(Packet::new("").with_attr("seq_num", priority)).unwrap();
            }
            pipeline.shut_down().unwrap();
        });
    });
}

fn split_benchmark(c: &mut Criterion) {
    let text = "the quick brown fox jumps over the lazy dog ".repeat(64);
    c.bench_function("split_words", |b| {
        let mut pipeline = PipelineBuilder::new("split")
            .filter("split", SplitWords::new(), Value::Null)
            .unwrap()
            .filter("waste", Waste::new(), Value::Null)
            .unwrap()
            .main("split", "waste")
            .unwrap()
            .build()
            .unwrap();
        b.iter(|| pipeline.send(Packet::new(black_box(text.as_str()))).unwrap());
    });
}

criterion_group!(benches, dispatch_benchmark, tank_benchmark, split_benchmark);
criterion_main!(benches);
