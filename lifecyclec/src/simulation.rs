use std::collections::VecDeque;

use clap::Args;
use color_eyre::eyre::{self, WrapErr};
use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use lifecyclevm::mem::{self, CollectionStats, GenerationalHeap, HeapError};

use crate::{
    print_header, print_row, DEFAULT_PROMOTION_THRESHOLD, DEFAULT_YOUNG_CAPACITY, OBJECT_COUNT,
    OBJECT_SIZE, REPORT_EVERY,
};

#[derive(Args, Debug, Clone)]
pub struct SimulationArgs {
    #[arg(long, default_value_t = OBJECT_COUNT)]
    pub objects: usize,

    #[arg(long, default_value_t = OBJECT_SIZE)]
    pub object_size: usize,

    #[arg(long, default_value_t = DEFAULT_YOUNG_CAPACITY)]
    pub young_capacity: usize,

    #[arg(long, default_value_t = DEFAULT_PROMOTION_THRESHOLD)]
    pub promotion_threshold: u32,

    /// Keep only the last N objects rooted. Everything stays rooted if not
    /// given.
    #[arg(long)]
    pub retain: Option<usize>,

    #[arg(long, default_value_t = REPORT_EVERY)]
    pub report_every: usize,

    /// Stop at the first allocation that fails.
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Serialize, Debug)]
pub struct SimulationReport {
    pub allocated: usize,
    pub failed: usize,
    pub resident_bytes: usize,
    pub old_bytes: usize,
    pub stats: CollectionStats,
}

impl SimulationReport {
    pub fn print(&self) {
        print_header("Minor GC simulation");
        print_row("objects allocated", self.allocated);
        let failed = if self.failed > 0 {
            self.failed.to_string().red()
        } else {
            self.failed.to_string().green()
        };
        print_row("allocations failed", failed);
        print_row("young bytes", self.resident_bytes);
        print_row("old bytes", self.old_bytes);
        print_row("minor collections", self.stats.collections);
        print_row("bytes reclaimed", self.stats.reclaimed_bytes);
        print_row("objects promoted", self.stats.promoted_objects);
    }
}

pub fn run(args: &SimulationArgs) -> eyre::Result<SimulationReport> {
    if args.retain == Some(0) {
        eyre::bail!("--retain has to keep at least one object");
    }
    let mut heap = GenerationalHeap::new(mem::Options {
        young_capacity: args.young_capacity,
        promotion_threshold: args.promotion_threshold,
    });
    let mut roots = VecDeque::new();
    let mut failed = 0;
    info!("Starting minor GC simulation");
    for i in 0..args.objects {
        match heap.allocate(args.object_size) {
            Ok(handle) => roots.push_back(handle),
            Err(err @ HeapError::OutOfMemory { .. }) if !args.fail_fast => {
                warn!("Allocation {i} failed: {err}");
                failed += 1;
            }
            Err(err) => return Err(err).wrap_err_with(|| format!("allocation {i} failed")),
        }
        if let Some(retain) = args.retain {
            while roots.len() > retain {
                if let Some(handle) = roots.pop_front() {
                    heap.release(handle)?;
                }
            }
        }
        if args.report_every != 0 && i % args.report_every == 0 {
            info!("Allocated {} KB so far...", allocated_kb(i, args.object_size));
        }
    }
    Ok(SimulationReport {
        allocated: args.objects - failed,
        failed,
        resident_bytes: heap.resident_bytes(),
        old_bytes: heap.old_bytes(),
        stats: heap.stats(),
    })
}

fn allocated_kb(objects: usize, object_size: usize) -> usize {
    objects.saturating_mul(object_size) >> 10
}
