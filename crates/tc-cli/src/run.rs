//! `transcore run`: score a step-event feed on a rayon worker pool.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use rayon::prelude::*;
use tc_score::{
    EndOfRun, PartialResult, RunLifecycle, RunSummary, ScoringConfig, WorkerRole,
    read_scoring_config,
};

use crate::feed::{EventFeed, read_event_feed};

/// How workers accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AccumulationMode {
    /// Every worker adds straight into the shared, locked histograms.
    Shared,
    /// Each worker fills its own partial result; partials are merged at the end.
    Partial,
}

pub fn load_config(path: Option<&Path>) -> Result<ScoringConfig> {
    match path {
        Some(p) => read_scoring_config(p)
            .with_context(|| format!("invalid scoring config {}", p.display())),
        None => Ok(ScoringConfig::default()),
    }
}

pub fn cmd_run(
    config: Option<&Path>,
    events: &Path,
    output: &Path,
    threads: usize,
    mode: AccumulationMode,
) -> Result<RunSummary> {
    let cfg = load_config(config)?;
    let feed = read_event_feed(events)?;

    // 0 lets rayon pick the number of threads.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("failed to build worker pool")?;
    tracing::info!(threads = pool.current_num_threads(), ?mode, "worker pool ready");

    let run = RunLifecycle::new(output);
    run.begin_run(&cfg)?;

    match mode {
        AccumulationMode::Shared => pool.install(|| score_shared(&run, &feed))?,
        AccumulationMode::Partial => {
            let partials = pool.install(|| score_partials(&run, &feed))?;
            for partial in partials {
                let n = partial.primaries();
                run.merge_partial(partial)?;
                run.end_run(WorkerRole::Worker, n)?;
            }
        }
    }

    let primaries = feed.primaries.len() as u64;
    let outcome = match run.end_run(WorkerRole::Master, primaries) {
        Ok(outcome) => outcome,
        Err(e) if e.is_persistence() => {
            tracing::warn!(error = %e, "writing results failed; retrying once");
            EndOfRun::Finalized(run.retry_persist()?)
        }
        Err(e) => return Err(e.into()),
    };
    match outcome {
        EndOfRun::Finalized(summary) => Ok(summary),
        other => anyhow::bail!("run did not finalize: {other:?}"),
    }
}

fn score_shared(run: &RunLifecycle, feed: &EventFeed) -> tc_core::Result<()> {
    feed.primaries
        .par_iter()
        .try_for_each(|(_, events)| events.iter().try_for_each(|e| run.score(e)))
}

fn score_partials(run: &RunLifecycle, feed: &EventFeed) -> tc_core::Result<Vec<PartialResult>> {
    feed.primaries
        .par_iter()
        .fold(
            || run.new_partial(),
            |partial, (_, events)| {
                let mut partial = partial?;
                for e in events {
                    partial.score(e);
                }
                partial.record_primary();
                Ok(partial)
            },
        )
        .collect()
}
