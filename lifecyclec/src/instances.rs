use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use clap::Args;
use color_eyre::eyre;
use serde::Serialize;
use tracing::info;

use lifecyclevm::{
    mem::{self, CollectionStats},
    runtime::class::{ClassDefinition, ClassState},
    vm::{self, Vm},
};

use crate::{print_header, print_row, DEFAULT_YOUNG_CAPACITY};

const PERSON_CLASS: &str = "Person";
// object header, a name reference and an age
const PERSON_SIZE: usize = 24;

#[derive(Args, Debug, Clone)]
pub struct InstanceArgs {
    #[arg(long, default_value_t = 1)]
    pub count: usize,

    #[arg(long, default_value_t = PERSON_SIZE)]
    pub instance_size: usize,

    #[arg(long, default_value_t = DEFAULT_YOUNG_CAPACITY)]
    pub young_capacity: usize,

    /// Drop every instance and run a full collection at the end.
    #[arg(long)]
    pub release: bool,
}

#[derive(Serialize, Debug)]
pub struct InstanceReport {
    pub class: String,
    pub state: ClassState,
    pub static_block_runs: usize,
    pub instances: usize,
    pub resident_bytes: usize,
    pub old_bytes: usize,
    pub stats: CollectionStats,
}

impl InstanceReport {
    pub fn print(&self) {
        print_header("Instance allocation");
        print_row("class", &self.class);
        print_row("state", format!("{:?}", self.state));
        print_row("static block runs", self.static_block_runs);
        print_row("instances", self.instances);
        print_row("young bytes", self.resident_bytes);
        print_row("old bytes", self.old_bytes);
        print_row("bytes reclaimed", self.stats.reclaimed_bytes);
    }
}

/// Defines a class and creates instances of it on the vm's heap. The first
/// instance initializes the class.
pub fn run(args: &InstanceArgs) -> eyre::Result<InstanceReport> {
    let vm = Vm::new(vm::Options {
        heap: mem::Options::with_young_capacity(args.young_capacity),
    });
    let static_block_runs = Arc::new(AtomicUsize::new(0));
    let runs = static_block_runs.clone();
    vm.define_class(
        PERSON_CLASS,
        ClassDefinition::new()
            .with_instance_size(args.instance_size)
            .with_static_initializer(move |_| {
                runs.fetch_add(1, Ordering::SeqCst);
                info!("Static block of {PERSON_CLASS} executed");
                Ok(())
            }),
    )?;

    let mut handles = Vec::with_capacity(args.count);
    for _ in 0..args.count {
        handles.push(vm.allocate_instance(PERSON_CLASS)?);
    }
    info!("Created {} instances of {PERSON_CLASS}", handles.len());
    if args.release {
        for handle in &handles {
            vm.heap.release(*handle)?;
        }
        vm.heap.collect();
    }

    let heap = vm.heap.lock();
    Ok(InstanceReport {
        class: PERSON_CLASS.to_owned(),
        state: vm.runtime.state_of(PERSON_CLASS),
        static_block_runs: static_block_runs.load(Ordering::SeqCst),
        instances: handles.len(),
        resident_bytes: heap.resident_bytes(),
        old_bytes: heap.old_bytes(),
        stats: heap.stats(),
    })
}
