// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: row-blocked parallel reduction on the thread pool.
//!
//! Splits a large table into row blocks, submits one task per block, and
//! waits for quiescence — the shape a row-blocked matrix multiply uses,
//! minus the numeric kernel.
//!
//! ```bash
//! cargo run -p task-pool --example parallel_sum
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use task_pool::{PoolConfig, ThreadPool};

const ROWS: usize = 4096;
const COLS: usize = 512;
const BLOCK: usize = 64;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let pool = ThreadPool::new(PoolConfig {
        num_threads: Some(4),
        queue_size: 128,
        ..Default::default()
    })?;

    let table: Arc<Vec<u64>> = Arc::new((0..ROWS * COLS).map(|v| (v % 251) as u64).collect());
    let total = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    for block_start in (0..ROWS).step_by(BLOCK) {
        let table = Arc::clone(&table);
        let total = Arc::clone(&total);
        pool.submit(move || {
            let end = (block_start + BLOCK).min(ROWS);
            let sum: u64 = table[block_start * COLS..end * COLS].iter().sum();
            total.fetch_add(sum, Ordering::Relaxed);
        })?;
    }

    pool.wait_all();
    let elapsed = start.elapsed();

    let expected: u64 = table.iter().sum();
    let got = total.load(Ordering::Relaxed);
    println!("sum = {got} (expected {expected}) in {elapsed:.2?}");
    anyhow::ensure!(got == expected, "parallel sum mismatch");

    pool.print_info();
    println!("{}", pool.queue_stats().summary());
    pool.shutdown();
    Ok(())
}
