use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use lifecyclevm::{
    mem::{GenerationalHeap, HeapError, Options},
    runtime::class::{registry::ClassRegistry, ClassDefinition, ClassError, ClassState},
};

const KB: usize = 1024;

fn young_heap(capacity: usize) -> GenerationalHeap {
    GenerationalHeap::new(Options {
        young_capacity: capacity,
        promotion_threshold: 2,
    })
}

#[test]
fn ten_live_kilobyte_objects_overflow_a_four_kilobyte_young_generation() {
    let mut heap = young_heap(4 * KB);
    let results: Vec<_> = (0..5).map(|_| heap.allocate(KB)).collect();
    for result in &results[..4] {
        assert!(result.is_ok());
    }
    assert!(matches!(results[4], Err(HeapError::OutOfMemory { .. })));
    let stats = heap.stats();
    assert_eq!(stats.collections, 1);
    assert_eq!(stats.reclaimed_bytes, 0);
}

#[test]
fn releasing_two_objects_lets_the_fifth_allocation_succeed() {
    let mut heap = young_heap(4 * KB);
    let handles: Vec<_> = (0..4).map(|_| heap.allocate(KB).unwrap()).collect();
    heap.release(handles[0]).unwrap();
    heap.release(handles[1]).unwrap();
    let before = heap.stats();
    heap.allocate(KB).unwrap();
    let after = heap.stats();
    assert_eq!(after.collections - before.collections, 1);
    assert_eq!(after.reclaimed_bytes - before.reclaimed_bytes, 2 * KB as u64);
}

#[test]
fn release_everything_then_collect_returns_to_empty() {
    let mut heap = young_heap(64 * KB);
    let sizes = [KB, 3 * KB, 512, 7, 4 * KB];
    let handles: Vec<_> = sizes.iter().map(|s| heap.allocate(*s).unwrap()).collect();
    let before = heap.stats().reclaimed_bytes;
    for handle in handles {
        heap.release(handle).unwrap();
    }
    let stats = heap.collect();
    assert_eq!(heap.resident_bytes(), 0);
    assert_eq!(
        stats.reclaimed_bytes - before,
        sizes.iter().sum::<usize>() as u64
    );
}

#[test]
fn collect_reclaims_released_objects_in_both_generations() {
    let mut heap = young_heap(4 * KB);
    let promoted = heap.allocate(KB).unwrap();
    heap.collect();
    heap.collect();
    assert_eq!(heap.old_bytes(), KB);
    let young = heap.allocate(KB).unwrap();
    let before = heap.stats().reclaimed_bytes;

    heap.release(promoted).unwrap();
    heap.release(young).unwrap();
    let stats = heap.collect();
    assert_eq!(heap.resident_bytes(), 0);
    assert_eq!(heap.old_bytes(), 0);
    assert_eq!(stats.reclaimed_bytes - before, 2 * KB as u64);
    assert_eq!(heap.live_objects(), 0);
}

#[test]
fn leaking_allocation_loop_promotes_survivors() {
    // the allocation loop never releases anything, every survivor ends up
    // in the old generation
    let mut heap = young_heap(16 * KB);
    let mut failures = 0;
    for _ in 0..100 {
        if heap.allocate(KB).is_err() {
            failures += 1;
        }
    }
    let stats = heap.stats();
    assert!(stats.collections > 0);
    assert_eq!(stats.reclaimed_bytes, 0);
    assert_eq!(stats.failed_allocations, failures);
    assert_eq!(
        heap.old_bytes() + heap.resident_bytes(),
        stats.allocated_bytes as usize
    );
    assert!(heap.resident_bytes() <= 16 * KB);
}

#[test]
fn class_is_initialized_on_first_active_use_only() {
    let mut registry = ClassRegistry::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    registry
        .define(
            "DummyClass",
            ClassDefinition::new().with_static_initializer(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();
    registry.define("Main", ClassDefinition::new()).unwrap();

    registry.ensure_initialized("Main").unwrap();
    assert_eq!(registry.state_of("DummyClass"), ClassState::NotLoaded);

    // first access
    registry.ensure_initialized("DummyClass").unwrap();
    // second access
    registry.ensure_initialized("DummyClass").unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    similar_asserts::assert_eq!(
        registry.initialization_order().to_vec(),
        vec!["Main".to_owned(), "DummyClass".to_owned()]
    );
}

#[test]
fn static_initializer_can_initialize_other_classes() {
    let mut registry = ClassRegistry::new();
    registry.define("Helper", ClassDefinition::new()).unwrap();
    registry
        .define(
            "App",
            ClassDefinition::new()
                .with_dependency("Helper")
                .with_static_initializer(|registry| {
                    registry.ensure_initialized("Helper")?;
                    Ok(())
                }),
        )
        .unwrap();
    registry.ensure_initialized("App").unwrap();
    similar_asserts::assert_eq!(
        registry.initialization_order().to_vec(),
        vec!["Helper".to_owned(), "App".to_owned()]
    );
}

#[test]
fn failed_class_reports_the_same_error_kind_forever() {
    let mut registry = ClassRegistry::new();
    registry
        .define(
            "Broken",
            ClassDefinition::new().with_static_initializer(|_| Err("division by zero".into())),
        )
        .unwrap();
    for _ in 0..3 {
        assert!(matches!(
            registry.ensure_initialized("Broken"),
            Err(ClassError::InitializationFailed { .. })
        ));
    }
    assert_eq!(registry.state_of("Broken"), ClassState::Failed);
}
