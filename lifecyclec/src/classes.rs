use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use color_eyre::eyre;
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use lifecyclevm::runtime::{
    class::{ClassDefinition, ClassState},
    Runtime,
};

use crate::{print_header, print_row};

const MAIN_CLASS: &str = "Main";
const DUMMY_CLASS: &str = "DummyClass";

#[derive(Serialize, Debug)]
pub struct ClassReport {
    pub accesses: usize,
    pub static_block_runs: usize,
    pub initialization_order: Vec<String>,
    pub states: Vec<(String, ClassState)>,
}

impl ClassReport {
    pub fn print(&self) {
        print_header("Class lifecycle");
        print_row("accesses", self.accesses);
        print_row("static block runs", self.static_block_runs);
        print_row("initialization order", self.initialization_order.join(" -> "));
        for (class, state) in &self.states {
            let state = match state {
                ClassState::Initialized => format!("{state:?}").green(),
                ClassState::Failed => format!("{state:?}").red(),
                _ => format!("{state:?}").yellow(),
            };
            print_row(class, state);
        }
    }
}

/// Accesses a class with a static block twice. The block only runs on the
/// first access.
pub fn run() -> eyre::Result<ClassReport> {
    let runtime = Runtime::new();
    let static_block_runs = Arc::new(AtomicUsize::new(0));
    let runs = static_block_runs.clone();
    runtime.define(MAIN_CLASS, ClassDefinition::new())?;
    runtime.define(
        DUMMY_CLASS,
        ClassDefinition::new().with_static_initializer(move |_| {
            runs.fetch_add(1, Ordering::SeqCst);
            info!("Static block of {DUMMY_CLASS} executed");
            Ok(())
        }),
    )?;

    runtime.ensure_initialized(MAIN_CLASS)?;
    info!("Program started, {MAIN_CLASS} initialized");
    let mut accesses = 0;
    for attempt in ["first", "second"] {
        info!("Accessing {DUMMY_CLASS} for the {attempt} time");
        runtime.ensure_initialized(DUMMY_CLASS)?;
        accesses += 1;
    }

    let classes = runtime.classes();
    let mut states: Vec<_> = classes
        .descriptors()
        .map(|descriptor| (descriptor.identifier.clone(), descriptor.state))
        .collect();
    states.sort_by(|(left, _), (right, _)| left.cmp(right));
    Ok(ClassReport {
        accesses,
        static_block_runs: static_block_runs.load(Ordering::SeqCst),
        initialization_order: classes.initialization_order().to_vec(),
        states,
    })
}
