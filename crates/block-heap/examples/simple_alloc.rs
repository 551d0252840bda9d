// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: basic allocator usage through the process-wide facade.
//!
//! ```bash
//! cargo run -p block-heap --example simple_alloc
//! ```

use block_heap::{alloc, cleanup, dump, free, init, stats, verify};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    init(true)?;

    // A few allocations of mixed sizes.
    let sizes = [64usize, 100, 1024, 4096, 10_000];
    let mut ptrs = Vec::new();
    for &size in &sizes {
        let p = alloc(size);
        anyhow::ensure!(!p.is_null(), "allocation of {size} bytes failed");
        println!("alloc({size:>6}) -> {:#x}", p as usize);
        ptrs.push(p);
    }

    let s = stats()?;
    println!("\n{}", s.summary());
    verify()?;

    // Free everything and show the heap collapsing back.
    for p in ptrs {
        free(p)?;
    }
    let s = stats()?;
    println!("{}", s.summary());
    anyhow::ensure!(s.allocated_bytes == 0, "leak detected");

    dump();
    cleanup()?;
    Ok(())
}
