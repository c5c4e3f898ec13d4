// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko

use clktree_config::ClockTable;
use clktree_core::soc::s3c64xx::Formulas;
use clktree_core::{build_tree, ClockTree, RegisterBlock};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::PathBuf;
use std::sync::Arc;

fn load_tree() -> ClockTree {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../configs/clocks/s3c6410.yaml");
    let table = ClockTable::from_file(&path).expect("clock table");
    let block = Arc::new(RegisterBlock::with_values(
        table.registers.iter().map(|r| (r.offset, r.value)),
    ));
    build_tree(
        table.settings.xtal_hz,
        table.settings.armclk_mask,
        &table,
        block,
        &Formulas,
    )
    .expect("clock tree")
}

// Rate queries walk to the root on every call; depth drives the cost.
fn bench_get_rate_by_depth(c: &mut Criterion) {
    let tree = load_tree();
    let mut group = c.benchmark_group("get_rate_by_depth");

    for (label, name, instance) in [
        ("root", "xtal", None),
        ("pll", "fout_apll", None),
        ("bus", "pclk", None),
        ("peripheral", "uart", Some(0)),
        ("source", "lcd_sclk", None),
    ] {
        let id = tree.lookup(name, instance).expect("clock");
        group.bench_with_input(BenchmarkId::from_parameter(label), &id, |b, &id| {
            b.iter(|| tree.get_rate(black_box(id)))
        });
    }
    group.finish();
}

fn bench_set_rate(c: &mut Criterion) {
    let tree = load_tree();
    let arm = tree.lookup("armclk", None).expect("armclk");
    let mmc = tree.lookup("mmc_bus", Some(0)).expect("mmc_bus:0");

    c.bench_function("set_rate_armclk", |b| {
        let mut toggle = false;
        b.iter(|| {
            toggle = !toggle;
            let rate = if toggle { 266_000_000 } else { 532_000_000 };
            tree.set_rate(arm, black_box(rate))
        })
    });
    c.bench_function("round_rate_mmc", |b| {
        b.iter(|| tree.round_rate(mmc, black_box(100_000_000)))
    });
}

fn bench_enable_disable(c: &mut Criterion) {
    let tree = load_tree();
    let rtc = tree.lookup("rtc", None).expect("rtc");
    c.bench_function("enable_disable_pair", |b| {
        b.iter(|| {
            tree.enable(rtc).and_then(|_| tree.disable(rtc))
        })
    });
}

fn bench_summary(c: &mut Criterion) {
    let tree = load_tree();
    c.bench_function("summary_full_tree", |b| b.iter(|| tree.summary()));
}

criterion_group!(
    benches,
    bench_get_rate_by_depth,
    bench_set_rate,
    bench_enable_disable,
    bench_summary,
);
criterion_main!(benches);
