use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

use fsw_lib::{
    channel::BusRxQueue,
    scenario::{Harness, Scenario},
};

#[derive(Parser, Debug)]
#[command(version)]
struct Opts {
    /// Scenario configuration toml file.
    ///
    /// The default nominal scenario is used when not provided.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Number of control cycles to run, overrides the scenario
    #[arg(long)]
    cycles: Option<u64>,

    /// Wall clock period of a control cycle in milliseconds, overrides the
    /// scenario. Zero runs as fast as possible.
    #[arg(long)]
    cycle_period_ms: Option<u64>,

    /// Seed for the simulated sensor noise, overrides the scenario
    #[arg(long)]
    seed: Option<u64>,

    /// Print the final board state as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let opts = Opts::parse();

    let intr = interruptor::Interruptor::new();
    let intr_clone = intr.clone();
    ctrlc::set_handler(move || {
        if intr_clone.is_set() {
            let exit_code = if cfg!(target_family = "unix") {
                // 128 (fatal error signal "n") + 2 (control-c is fatal error signal 2)
                130
            } else {
                // Windows code 3221225786
                // -1073741510 == C000013A
                -1073741510
            };
            std::process::exit(exit_code);
        } else {
            intr_clone.set();
        }
    })?;

    let mut scenario = Scenario::load(opts.scenario.as_ref())?;
    if let Some(c) = opts.cycles {
        scenario.cycles = c;
    }
    if let Some(ms) = opts.cycle_period_ms {
        scenario.cycle_period = Duration::from_millis(ms);
    }
    if let Some(seed) = opts.seed {
        scenario.seed = seed;
    }

    info!(
        name = %scenario.name,
        cycles = scenario.cycles,
        period = ?scenario.cycle_period,
        "Running scenario"
    );

    let mut queue = BusRxQueue::new();
    let mut harness = Harness::new(&scenario, &mut queue);
    harness.init();

    let mut next_deadline = Instant::now();
    for _ in 0..scenario.cycles {
        if intr.is_set() {
            break;
        }

        harness.step();

        // Fixed-rate loop; an overrun just starts the next cycle right away
        next_deadline += scenario.cycle_period;
        let now = Instant::now();
        if next_deadline > now {
            std::thread::sleep(next_deadline - now);
        } else {
            next_deadline = now;
        }
    }

    let telemetry = harness.telemetry();
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&telemetry)?);
    } else {
        println!("Stopped at\n{:#?}", harness.info());
        println!("Status: {}", telemetry.status);
        println!("EPS: {}", telemetry.eps);
        println!("Mission: {}", telemetry.mission_result);
        println!(
            "Bus: {} datagrams sent, {} scripted datagrams dropped",
            harness.bus_log().len(),
            harness.dropped_datagrams()
        );
    }

    Ok(())
}

mod interruptor {
    use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
    use std::sync::Arc;

    #[derive(Clone, Debug)]
    #[repr(transparent)]
    pub struct Interruptor(Arc<AtomicBool>);

    impl Interruptor {
        pub fn new() -> Self {
            Interruptor(Arc::new(AtomicBool::new(false)))
        }

        pub fn set(&self) {
            self.0.store(true, SeqCst);
        }

        pub fn is_set(&self) -> bool {
            self.0.load(SeqCst)
        }
    }

    impl Default for Interruptor {
        fn default() -> Self {
            Self::new()
        }
    }
}
