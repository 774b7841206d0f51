//! Town Life Simulation
//!
//! Headless runner: builds the default town, ticks it forward, reports
//! notable events, and writes periodic JSON snapshots.

use clap::Parser;
use std::collections::HashMap;

use ai_town::config::SimConfig;
use ai_town::events::SimEventKind;
use ai_town::output;
use ai_town::runner::Simulation;

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "ai_town")]
#[command(about = "A persistent small-town life simulation")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks (simulated minutes) to run
    #[arg(long, default_value_t = 10_000)]
    ticks: u64,

    /// Interval between world snapshots (in ticks)
    #[arg(long, default_value_t = 500)]
    snapshot_interval: u64,

    /// Global price multiplier
    #[arg(long, default_value_t = 1.0)]
    price: f64,

    /// Global wage multiplier
    #[arg(long, default_value_t = 1.0)]
    wage: f64,

    /// Global risk multiplier for illness and accidents
    #[arg(long, default_value_t = 1.0)]
    risk: f64,

    /// Extra randomly generated residents added at start
    #[arg(long, default_value_t = 0)]
    extra_residents: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    println!("Town Life Simulation");
    println!("====================");
    println!("Seed: {}", args.seed);
    println!("Ticks: {}", args.ticks);
    println!("Snapshot interval: {}", args.snapshot_interval);
    println!();

    let config = SimConfig::load_or_default();
    let mut sim = Simulation::new(config, args.seed);
    sim.set_levers(args.price, args.wage, args.risk);

    for _ in 0..args.extra_residents {
        sim.add_resident();
    }

    println!("Starting at {}", sim.clock_label());
    println!();

    let initial = output::generate_snapshot(&mut sim.world);
    if let Err(e) = output::write_current_state(&initial) {
        eprintln!("Warning: could not write initial state: {e}");
    }

    let mut event_totals: HashMap<SimEventKind, u64> = HashMap::new();
    let mut halted = None;

    for step in 0..args.ticks {
        sim.step();

        for event in sim.take_events() {
            *event_totals.entry(event.kind).or_default() += 1;
            match event.kind {
                SimEventKind::Death
                | SimEventKind::Arrest
                | SimEventKind::EmergencyLoan => {
                    println!(
                        "[{}] {:?}: {} ({})",
                        sim.clock_label(),
                        event.kind,
                        event.agent_id,
                        event.detail
                    );
                }
                _ => {}
            }
        }

        if step > 0 && step % args.snapshot_interval == 0 {
            let snapshot = output::generate_snapshot(&mut sim.world);
            if let Err(e) = output::write_snapshot_to_dir(&snapshot) {
                eprintln!("Warning: could not write snapshot: {e}");
            }
            if let Err(e) = output::write_current_state(&snapshot) {
                eprintln!("Warning: could not write current state: {e}");
            }
        }

        if step > 0 && step % 1440 == 0 {
            println!("{} ({} ticks elapsed)", sim.clock_label(), step);
        }

        if sim.all_dead() {
            halted = Some("every resident has passed away".to_string());
            break;
        }
        if let Some(winner) = sim.charm_winner() {
            halted = Some(format!("{winner} reached maximum charm"));
            break;
        }
    }

    let final_snapshot = output::generate_snapshot(&mut sim.world);
    if let Err(e) = output::write_snapshot_to_dir(&final_snapshot) {
        eprintln!("Warning: could not write final snapshot: {e}");
    }
    if let Err(e) = output::write_current_state(&final_snapshot) {
        eprintln!("Warning: could not write final state: {e}");
    }

    println!();
    match halted {
        Some(reason) => println!("Simulation ended early: {reason}."),
        None => println!("Simulation complete at {}.", sim.clock_label()),
    }
    if !event_totals.is_empty() {
        println!("Event totals:");
        let mut totals: Vec<_> = event_totals.into_iter().collect();
        totals.sort_by_key(|(kind, _)| format!("{kind:?}"));
        for (kind, count) in totals {
            println!("  {kind:?}: {count}");
        }
    }
}
