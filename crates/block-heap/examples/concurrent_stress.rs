// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: hammer one heap from many threads and verify the invariants
//! afterwards.
//!
//! ```bash
//! cargo run -p block-heap --example concurrent_stress
//! ```

use block_heap::{Heap, HeapConfig};
use std::sync::Arc;
use std::time::Instant;

const THREADS: usize = 8;
const ROUNDS: usize = 2_000;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn")
        .init();

    let heap = Arc::new(Heap::new(&HeapConfig::default())?);
    let start = Instant::now();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let heap = Arc::clone(&heap);
            std::thread::spawn(move || {
                let mut live = Vec::new();
                for i in 0..ROUNDS {
                    let size = 16 + (t * 37 + i * 13) % 2048;
                    let p = heap.allocate(size).expect("allocation failed");
                    unsafe { std::ptr::write_bytes(p.as_ptr(), t as u8, size) };
                    live.push(p);
                    // Keep a rolling window of live allocations.
                    if live.len() >= 16 {
                        heap.free(live.remove(0)).expect("free failed");
                    }
                }
                for p in live {
                    heap.free(p).expect("free failed");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let elapsed = start.elapsed();
    let stats = heap.stats();
    println!(
        "{} threads x {} rounds in {:.2?} ({:.0} ops/s)",
        THREADS,
        ROUNDS,
        elapsed,
        (THREADS * ROUNDS * 2) as f64 / elapsed.as_secs_f64(),
    );
    println!("{}", stats.summary());

    anyhow::ensure!(stats.allocated_bytes == 0, "leak detected");
    heap.verify()?;
    println!("verify: ok");
    Ok(())
}
