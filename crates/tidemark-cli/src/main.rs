#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use clap::Parser;
use config::{CliArgs, Pair, RunConfig};
use std::io::{self, BufWriter, Write};
use telemetry::init_telemetry;
use tidemark::{Coordinator, ExitReason, LabelEvery, RunSummary};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let mut coordinator = Coordinator::new(config.coordinator);
    for (round, pairs) in config.rounds.iter().enumerate() {
        if round > 0 {
            coordinator.reset()?;
        }
        for pair in pairs {
            coordinator.add_producer(label_every(pair, config.label_zero)?)?;
        }

        tracing::info!(round, producers = pairs.len(), "starting round");
        let summary = coordinator.run(render_step, |_, line| writeln!(out, "{line}"))?;
        log_summary(round, &summary);
    }

    out.flush()?;
    Ok(())
}

fn log_startup_info(config: &RunConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting tidemark with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting tidemark: watermarks {}, steps 0..={}, {} round(s)",
            config.coordinator.watermarks,
            config.coordinator.step_bound,
            config.rounds.len()
        );
    }
}

fn label_every(pair: &Pair, label_zero: bool) -> tidemark::Result<LabelEvery> {
    let generator = LabelEvery::new(pair.multiple, pair.label.as_str())?;
    Ok(if label_zero {
        generator.matching_zero()
    } else {
        generator
    })
}

/// Concatenates the labels of one step in lane order. A lane that ended early
/// shows as `-`, and the step number leads the line when no live lane fired.
fn render_step(step: u64, slots: &[Option<String>]) -> String {
    let mut line: String = slots
        .iter()
        .map(|slot| slot.as_deref().unwrap_or("-"))
        .collect();
    if slots.iter().flatten().all(String::is_empty) {
        line.insert_str(0, &step.to_string());
    }
    line
}

fn log_summary(round: usize, summary: &RunSummary) {
    for exit in &summary.producers {
        match &exit.reason {
            ExitReason::Completed | ExitReason::Stopped => tracing::debug!(
                round,
                producer = exit.producer,
                steps = exit.steps_pushed,
                reason = ?exit.reason,
                "producer exited"
            ),
            reason => tracing::warn!(
                round,
                producer = exit.producer,
                steps = exit.steps_pushed,
                ?reason,
                "producer exited early"
            ),
        }
    }
    tracing::info!(
        round,
        steps = summary.steps,
        stopped_early = summary.stopped_early,
        "round finished"
    );
}
