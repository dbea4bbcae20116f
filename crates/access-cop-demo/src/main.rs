// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Races threads into one externally-synchronized object and logs the tally
//! of violations the registry raised.

use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use access_cop::{AccessKind, Policy, Registry, RegistryConfig, Violation, ViolationKind};
use anyhow::{ensure, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const HOLD_CHECKPOINT: &str = "demo.hold";

#[derive(Parser, Debug)]
#[command(author, version, about = "Race threads into one guarded object")]
struct Args {
    /// Number of racing threads
    #[arg(long, default_value_t = 2)]
    threads: usize,
    /// Time each thread holds its access, in milliseconds
    #[arg(long, default_value_t = 100)]
    hold_ms: u64,
    /// Extra fault-injection pause inside the access, in milliseconds
    #[arg(long, default_value_t = 0)]
    pause_ms: u64,
    /// Registry config (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

enum Outcome {
    Clean,
    Violation(ViolationKind),
    Panicked,
}

#[derive(Debug, Default)]
struct Tally {
    clean: usize,
    concurrent: usize,
    other: usize,
}

fn load_config(path: Option<&PathBuf>) -> Result<RegistryConfig> {
    let Some(path) = path else {
        return Ok(RegistryConfig::default());
    };
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    RegistryConfig::from_json_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

/// Silences the default panic message for violation payloads; they are
/// already reported by the registry's sink.
fn quiet_violation_panics() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if info.payload().downcast_ref::<Violation>().is_none() {
            previous(info);
        }
    }));
}

fn run(args: &Args, registry: &Registry) -> Tally {
    let shared = Arc::new(Vec::<u64>::with_capacity(16));
    registry.monitor(&shared, Policy::ExternallySynchronized);
    registry
        .faults()
        .add_pause(HOLD_CHECKPOINT, Duration::from_millis(args.pause_ms));

    let barrier = Barrier::new(args.threads);
    let hold = Duration::from_millis(args.hold_ms);
    let outcomes: Vec<Outcome> = thread::scope(|s| {
        let handles: Vec<_> = (0..args.threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    registry.enter(&shared, AccessKind::Modify);
                    thread::sleep(hold);
                    registry.faults().pause(HOLD_CHECKPOINT);
                    registry.leave(&shared);
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(()) => Outcome::Clean,
                Err(payload) => payload
                    .downcast_ref::<Violation>()
                    .map_or(Outcome::Panicked, |v| Outcome::Violation(v.kind)),
            })
            .collect()
    });

    let mut tally = Tally::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Clean => tally.clean += 1,
            Outcome::Violation(ViolationKind::ConcurrentAccess) => tally.concurrent += 1,
            Outcome::Violation(kind) => {
                warn!(%kind, "unexpected violation");
                tally.other += 1;
            }
            Outcome::Panicked => {
                warn!("racer panicked without a violation payload");
                tally.other += 1;
            }
        }
    }
    tally
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    ensure!(args.threads > 0, "--threads must be at least 1");
    let config = load_config(args.config.as_ref())?;
    let registry = Registry::with_config(config);
    quiet_violation_panics();

    info!(threads = args.threads, hold_ms = args.hold_ms, pause_ms = args.pause_ms, "racing");
    let tally = run(&args, &registry);
    info!(
        clean = tally.clean,
        concurrent = tally.concurrent,
        other = tally.other,
        violations = registry.violation_count(),
        "race finished"
    );
    Ok(())
}
