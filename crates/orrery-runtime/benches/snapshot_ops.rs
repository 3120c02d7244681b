//! Benchmarks for pool compaction and snapshot capture.
//!
//! Measures the two operations on the simulation's tick path: `arrange`
//! over a fragmented pool and steady-state `take_snapshot` against a
//! full ring.

use std::cell::RefCell;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use orrery_runtime::{AttributeStore, Frame, NodeIndex, SnapshotList};

/// A pool with every other instance removed, so half the cells are holes.
fn fragmented_store(cells: NodeIndex) -> AttributeStore {
    let mut store = AttributeStore::new();
    store.setup(cells as usize);
    store.add_nodes(0, 0, cells, 0, 1);
    for node_index in (0..cells).step_by(2) {
        store.remove_node(0, node_index, 0, 1);
    }
    store
}

fn bench_arrange(c: &mut Criterion) {
    let mut group = c.benchmark_group("arrange");

    for &cells in &[1024u16, 8192] {
        group.throughput(Throughput::Elements(cells as u64));
        group.bench_with_input(BenchmarkId::from_parameter(cells), &cells, |b, &cells| {
            b.iter_batched(
                || fragmented_store(cells),
                |mut store| store.arrange(),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_take_snapshot(c: &mut Criterion) {
    let mut frame = Frame::new();
    let probe = frame.add_node("probe", 1024);
    frame.add_attr(probe, "x", 1).unwrap();
    frame.setup(1024);

    let frame = Rc::new(RefCell::new(frame));
    let mut snapshots = SnapshotList::new();
    snapshots.set_frame(Rc::clone(&frame));
    snapshots.set_max_size(8).unwrap();

    let mut tick = 0u64;
    c.bench_function("take_snapshot_1024_cells", |b| {
        b.iter(|| {
            snapshots.take_snapshot(tick).unwrap();
            tick += 1;
        });
    });
}

criterion_group!(benches, bench_arrange, bench_take_snapshot);
criterion_main!(benches);
