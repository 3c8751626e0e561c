use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pql::{Table, scan, split_statements};

const PIPELINE: &str = "StormEvents \
    | where State == 'TEXAS' and DamageProperty > 0 \
    | summarize Total=sum(DamageProperty), Events=count() by State, EventType \
    | where Total > 1000000 \
    | top 10 by Total desc \
    | project State, EventType, Total";

fn large_table() -> Table {
    Table::new(
        "T",
        vec!["a".to_string(), "b".to_string()],
        (0..10_000)
            .map(|n: i64| vec![n.to_string(), (n % 7).to_string()])
            .collect(),
    )
}

fn bench_scan(c: &mut Criterion) {
    c.bench_function("scan_pipeline", |b| {
        b.iter(|| scan(black_box(PIPELINE)))
    });
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_pipeline", |b| {
        b.iter(|| pql::compile(black_box(PIPELINE)).unwrap())
    });
}

fn bench_split(c: &mut Criterion) {
    let source = format!("{PIPELINE};\n").repeat(50);
    c.bench_function("split_statements", |b| {
        b.iter(|| split_statements(black_box(&source)))
    });
}

fn bench_eval(c: &mut Criterion) {
    let tables = [large_table()];
    c.bench_function("eval_where_take", |b| {
        b.iter(|| pql::eval(black_box("T | where b | take 100"), black_box(&tables)).unwrap())
    });
}

criterion_group!(benches, bench_scan, bench_compile, bench_split, bench_eval);
criterion_main!(benches);
