// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for allocate/free throughput under each policy.

use block_heap::{Heap, HeapConfig, Policy};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_free_roundtrip");
    for policy in [Policy::FirstFit, Policy::BestFit, Policy::WorstFit] {
        let heap = Heap::new(&HeapConfig {
            policy,
            ..Default::default()
        })
        .unwrap();
        group.bench_function(policy.name(), |b| {
            b.iter(|| {
                let p = heap.allocate(black_box(1024)).unwrap();
                heap.free(p).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_fragmented_alloc(c: &mut Criterion) {
    // A heap with many live allocations forces longer list scans.
    let heap = Heap::new(&HeapConfig::default()).unwrap();
    let _pins: Vec<_> = (0..256).map(|_| heap.allocate(64).unwrap()).collect();

    c.bench_function("alloc_free_fragmented", |b| {
        b.iter(|| {
            let p = heap.allocate(black_box(128)).unwrap();
            heap.free(p).unwrap();
        })
    });
}

criterion_group!(benches, bench_roundtrip, bench_fragmented_alloc);
criterion_main!(benches);
