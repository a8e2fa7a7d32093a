//! Poolsim quickstart: an elastic pool under random load.
//!
//! Demonstrates:
//!   1. Building a SimConfig and Simulation
//!   2. Subscribing to pool spawn/despawn events
//!   3. Generating Bernoulli arrivals and ticking at 60 Hz
//!   4. Reading metrics and an owned snapshot
//!   5. Resizing the pool at runtime
//!
//! Run with:
//!   RUST_LOG=poolsim_engine=debug cargo run --example quickstart

use poolsim_engine::{
    BernoulliArrivals, PoolConfig, PoolEvent, ProcessingTime, SimConfig, Simulation, WorkerState,
};

// ─── Run parameters ─────────────────────────────────────────────

const FRAME_MS: u64 = 16;
const TICKS: u32 = 600;
const ARRIVAL_PROBABILITY: f64 = 0.1;
const SEED: u64 = 42;

fn bar(progress: f64, width: usize) -> String {
    let filled = (progress * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Poolsim Quickstart ===\n");

    let config = SimConfig {
        pool: PoolConfig {
            min_workers: 1,
            max_workers: 6,
            startup_ms: 500,
            idle_despawn_threshold_ms: 3_000,
            autoscale: true,
        },
        cores: 4,
        processing: ProcessingTime::Uniform {
            min_ms: 200,
            max_ms: 2_000,
        },
        seed: SEED,
        ..SimConfig::default()
    };
    println!(
        "Pool: {}..{} workers, {} cores, startup {} ms",
        config.pool.min_workers, config.pool.max_workers, config.cores, config.pool.startup_ms
    );

    let mut sim = Simulation::new(config)?;
    let events = sim.subscribe(|event: &PoolEvent| match event {
        PoolEvent::Spawned { worker, .. } => println!("  + {worker}"),
        PoolEvent::Despawned { worker, .. } => println!("  - {worker}"),
    });

    let mut arrivals = BernoulliArrivals::new(ARRIVAL_PROBABILITY, SEED)?;
    println!("\nRunning {TICKS} ticks of {FRAME_MS} ms...");
    for i in 0..TICKS {
        if arrivals.arrives() {
            sim.generate_request(format!("job-{i}").as_str());
        }
        let report = sim.tick(FRAME_MS)?;
        if report.tick.0 % 120 == 0 {
            let m = &report.metrics;
            println!(
                "tick {:>4} @ {:>6}: queue {:>2}, busy {}, idle {}, starting {}, free cores {}",
                report.tick.0, report.now, m.queue_len, m.busy, m.idle, m.starting, m.free_cores
            );
        }
    }

    println!("\nShrinking to at most 2 workers...");
    sim.set_max_workers(2);
    for _ in 0..240 {
        sim.tick(FRAME_MS)?;
    }

    let snap = sim.snapshot();
    println!("\nWorkers at {}:", snap.now);
    for w in &snap.pool.workers {
        println!(
            "  {:<4} {:<8} {} {}",
            w.id.to_string(),
            w.state.to_string(),
            bar(w.progress, 20),
            w.request.map(|r| format!("request {r}")).unwrap_or_default()
        );
    }

    let totals = sim.totals();
    println!(
        "\nSubmitted {}, completed {}, outstanding {}, core waits {}, spawned {}, despawned {}",
        totals.submitted,
        totals.completed,
        totals.outstanding(),
        totals.core_waits,
        totals.spawned,
        totals.despawned
    );
    println!("Idle now: {}", sim.pool().count(WorkerState::Idle));

    events.unsubscribe();
    println!("Done.");
    Ok(())
}
