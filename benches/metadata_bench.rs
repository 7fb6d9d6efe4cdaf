use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sqlstorm::metadata::Metadata;

fn registry_reads(c: &mut Criterion) {
    let meta = Metadata::new();
    for i in 0..50 {
        let mut res = meta.create_table();
        res.table_mut().unwrap().name = format!("table{}", i);
        res.complete().unwrap();
    }

    c.bench_function("snapshot_read", |b| {
        let mut idx = 0;
        b.iter(|| {
            idx = (idx + 1) % meta.size();
            black_box(meta.get(idx))
        })
    });

    c.bench_function("full_scan", |b| b.iter(|| black_box(meta.tables()).len()));
}

fn registry_churn(c: &mut Criterion) {
    c.bench_function("create_drop_tail", |b| {
        let meta = Metadata::new();
        b.iter(|| {
            let mut res = meta.create_table();
            res.table_mut().unwrap().name = "churn".to_string();
            res.complete().unwrap();
            let mut drop_res = meta.drop_table(meta.size() - 1);
            drop_res.complete().unwrap();
        })
    });

    c.bench_function("alter_in_place", |b| {
        let meta = Metadata::new();
        let mut res = meta.create_table();
        res.table_mut().unwrap().name = "stable".to_string();
        res.complete().unwrap();

        b.iter(|| {
            let mut alter = meta.alter_table(0);
            alter.table_mut().unwrap().engine = "heap".to_string();
            alter.complete().unwrap();
        })
    });
}

criterion_group!(benches, registry_reads, registry_churn);
criterion_main!(benches);
