#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use crate::graph::ServiceGraph;
use crate::tests::common::{probe_export, registry_with, Probe, Recorder};

#[test]
fn test_start_shutdown_has_exactly_one_winner_across_threads() {
    let rec = Recorder::new();
    let registry = registry_with(vec![probe_export(Probe::new("db", &rec))]);
    let graph = ServiceGraph::build(registry.handles());
    let node = graph.node("db").expect("db node").clone();

    let winners = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(2));
    let threads: Vec<_> = (0..2)
        .map(|_| {
            let node = node.clone();
            let winners = winners.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                if node.start_shutdown() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().expect("thread panicked");
    }

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert!(node.shutdown_started());
}

#[test]
fn test_shutdown_guard_survives_rebuilding_the_graph() {
    let rec = Recorder::new();
    let registry = registry_with(vec![probe_export(Probe::new("db", &rec))]);

    let first = ServiceGraph::build(registry.handles());
    assert!(first.node("db").expect("node").start_shutdown());

    // A new graph over the same registry shares the per-component guard
    let second = ServiceGraph::build(registry.handles());
    let node = second.node("db").expect("node");
    assert!(node.shutdown_started());
    assert!(!node.start_shutdown());
}

#[test]
fn test_guards_are_independent_per_node() {
    let rec = Recorder::new();
    let registry = registry_with(vec![
        probe_export(Probe::new("a", &rec)),
        probe_export(Probe::new("b", &rec)),
    ]);
    let graph = ServiceGraph::build(registry.handles());

    assert!(graph.node("a").expect("a").start_shutdown());
    assert!(!graph.node("b").expect("b").shutdown_started());
    assert!(graph.node("b").expect("b").start_shutdown());
}
