//! Plain-text rendering of plans and registry contents.
use keel_core::component::StartupKind;
use keel_core::{ComponentRegistry, ExecutionPlan};

pub fn print_plan(title: &str, plan: &ExecutionPlan) {
    println!("{} plan ({} component(s)):", title, plan.len());
    if plan.is_empty() {
        println!("  (nothing to do)");
        return;
    }
    for group in plan.groups() {
        println!("  group {}:", group.key());
        for (i, wave) in group.wave_names().iter().enumerate() {
            println!("    wave {}: {}", i + 1, wave.join(", "));
        }
    }
}

pub fn print_components(registry: &ComponentRegistry) {
    let handles = registry.handles();
    if handles.is_empty() {
        println!("No components registered.");
        return;
    }
    println!("Registered components:");
    for handle in handles {
        let caps = handle.capabilities();
        let startup = match caps.startup {
            Some(StartupKind::Async) => "async start",
            Some(StartupKind::Blocking) => "blocking start",
            None => "no start",
        };
        let shutdown = if caps.is_shutdownable() { "shutdown" } else { "no shutdown" };
        println!("  - {} [{}, {}] ({})", handle.metadata(), startup, shutdown, handle.type_name());
    }
}
