//! Run lifecycle: `NotStarted → Running → Finalizing → Finalized`.
//!
//! One [`RunLifecycle`] is constructed per run and shared by reference with
//! every worker. `begin_run` allocates histograms; workers score events;
//! end-of-run signals may arrive from many workers, but only the first
//! [`WorkerRole::Master`] signal freezes the histograms and persists them.
//! Workers must have finished (joined, or reported their own end of run)
//! before the master signals; adds racing with finalization are rejected.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use serde::Serialize;
use tc_core::{Error, Result, ResultSink, RunState, ScoringSnapshot};

use crate::accumulator::{DropCounts, ScoringAccumulator};
use crate::config::ScoringConfig;
use crate::events::{StepEvent, TrackStep};
use crate::partial::PartialResult;
use crate::plan::{ExitBin, ScoringPlan};
use crate::writer::DatWriter;

/// Who is signalling end of run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    /// The designated finalizer.
    Master,
    /// A worker reporting its own completion; never finalizes.
    Worker,
}

/// Outcome of [`RunLifecycle::end_run`].
#[derive(Debug, Clone, PartialEq)]
pub enum EndOfRun {
    /// This call finalized the run.
    Finalized(RunSummary),
    /// A worker's completion was recorded.
    Reported {
        /// Primaries reported by all workers so far.
        worker_primaries: u64,
    },
    /// The run was already finalizing or finalized; nothing was done.
    Ignored,
}

/// What a finalized run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Primary particles reported by the finalizer.
    pub primaries: u64,
    /// Sum of primaries reported by workers (0 if none reported).
    pub worker_primaries: u64,
    /// Files written; empty when the run had no primaries.
    pub files: Vec<PathBuf>,
    /// Sum of the energy-deposition histogram.
    pub total_energy_deposited: f64,
    /// Sum of the exit-spectrum histogram.
    pub total_exits: u64,
    /// Values that fell outside every bin or were rejected as invalid.
    pub dropped: DropCounts,
}

struct PendingPersist {
    snapshot: ScoringSnapshot,
    primaries: u64,
}

/// Lifecycle coordinator for one run.
pub struct RunLifecycle {
    out_dir: PathBuf,
    sink: Box<dyn ResultSink>,
    state: AtomicU8,
    scoring: OnceLock<ScoringAccumulator>,
    worker_primaries: AtomicU64,
    pending: Mutex<Option<PendingPersist>>,
    retry_used: AtomicBool,
}

impl RunLifecycle {
    /// Run writing `.dat` files under `out_dir`.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self::with_sink(out_dir, Box::new(DatWriter))
    }

    /// Run persisting through a custom sink.
    pub fn with_sink(out_dir: impl Into<PathBuf>, sink: Box<dyn ResultSink>) -> Self {
        Self {
            out_dir: out_dir.into(),
            sink,
            state: AtomicU8::new(RunState::NotStarted.as_u8()),
            scoring: OnceLock::new(),
            worker_primaries: AtomicU64::new(0),
            pending: Mutex::new(None),
            retry_used: AtomicBool::new(false),
        }
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Output directory.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Validate `config`, allocate zeroed histograms and enter `Running`.
    ///
    /// Fails with [`Error::InvalidBinningPolicy`] / [`Error::Config`] before any
    /// state change, or [`Error::LifecycleViolation`] if the run was already begun.
    pub fn begin_run(&self, config: &ScoringConfig) -> Result<()> {
        let plan = Arc::new(ScoringPlan::from_config(config)?);
        let edep_bins = plan.energy_deposition.binning.count();
        let spectrum_bins = plan.exit_spectrum.binning.count();
        self.scoring.set(ScoringAccumulator::new(plan)).map_err(|_| {
            Error::LifecycleViolation(format!("begin_run called in state {}", self.state()))
        })?;
        self.state.store(RunState::Running.as_u8(), Ordering::Release);
        tracing::info!(
            out_dir = %self.out_dir.display(),
            edep_bins,
            spectrum_bins,
            sink = self.sink.name(),
            "run started"
        );
        Ok(())
    }

    /// The run's accumulator, once begun.
    pub fn accumulator(&self) -> Result<&ScoringAccumulator> {
        self.scoring
            .get()
            .ok_or_else(|| Error::LifecycleViolation("run has not been started".into()))
    }

    /// The accumulator for adds. Rejected while `NotStarted`, even once the
    /// histograms are published.
    fn scoring(&self) -> Result<&ScoringAccumulator> {
        if self.state() == RunState::NotStarted {
            return self.report(Err(Error::LifecycleViolation(
                "scoring before the run was started".into(),
            )));
        }
        self.accumulator()
    }

    /// A fresh worker-local partial result with this run's binning.
    pub fn new_partial(&self) -> Result<PartialResult> {
        Ok(PartialResult::new(Arc::clone(self.scoring()?.plan())))
    }

    /// Add `amount` to deposition bin `bin` (see [`ScoringAccumulator::add_energy`]).
    pub fn add_energy(&self, bin: Option<usize>, amount: f64) -> Result<()> {
        self.report(self.scoring()?.add_energy(bin, amount))
    }

    /// Increment exit-spectrum bin `bin`.
    pub fn add_spectrum_count(&self, bin: Option<usize>) -> Result<()> {
        self.report(self.scoring()?.add_spectrum_count(bin))
    }

    /// Score energy deposited at a pre-step `position`.
    pub fn score_deposit(&self, position: [f64; 3], edep: f64) -> Result<()> {
        let acc = self.scoring()?;
        self.report(acc.add_energy(acc.plan().deposit_bin(position), edep))
    }

    /// Score a track step if it is a configured particle leaving the world.
    pub fn score_exit(&self, step: &TrackStep) -> Result<()> {
        let acc = self.scoring()?;
        match acc.plan().exit_bin(step) {
            ExitBin::NotScored => Ok(()),
            ExitBin::Scored(bin) => self.report(acc.add_spectrum_count(bin)),
        }
    }

    /// Score one step event.
    pub fn score(&self, event: &StepEvent) -> Result<()> {
        self.report(self.scoring()?.score(event))
    }

    /// Merge (and consume) a worker's partial result.
    pub fn merge_partial(&self, partial: PartialResult) -> Result<()> {
        self.report(self.scoring()?.absorb(partial))
    }

    /// Copy of the histograms: point-in-time while running, final afterwards.
    pub fn snapshot(&self) -> Result<ScoringSnapshot> {
        Ok(self.accumulator()?.snapshot())
    }

    /// Signal end of run.
    ///
    /// A `Worker` signal records `primary_count` and returns. The first `Master`
    /// signal moves `Running → Finalizing`, freezes the histograms, persists them
    /// (skipped for an empty run) and moves to `Finalized`. Any later or
    /// concurrent signal returns [`EndOfRun::Ignored`].
    ///
    /// On a persistence failure the run stays `Finalizing`, the frozen histograms
    /// are kept, and [`RunLifecycle::retry_persist`] may be called once.
    pub fn end_run(&self, role: WorkerRole, primary_count: u64) -> Result<EndOfRun> {
        match role {
            WorkerRole::Worker => self.worker_done(primary_count),
            WorkerRole::Master => self.finalize(primary_count),
        }
    }

    fn worker_done(&self, primary_count: u64) -> Result<EndOfRun> {
        match self.state() {
            RunState::NotStarted => Err(Error::LifecycleViolation(
                "worker end of run before the run was started".into(),
            )),
            RunState::Running => {
                let total =
                    self.worker_primaries.fetch_add(primary_count, Ordering::AcqRel) + primary_count;
                tracing::debug!(primaries = primary_count, total, "worker end of run");
                Ok(EndOfRun::Reported { worker_primaries: total })
            }
            state => {
                tracing::debug!(%state, "worker end of run after finalization ignored");
                Ok(EndOfRun::Ignored)
            }
        }
    }

    fn finalize(&self, primary_count: u64) -> Result<EndOfRun> {
        if let Err(current) = self.state.compare_exchange(
            RunState::Running.as_u8(),
            RunState::Finalizing.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return match RunState::from_u8(current) {
                RunState::NotStarted => Err(Error::LifecycleViolation(
                    "end of run signalled before the run was started".into(),
                )),
                state => {
                    tracing::debug!(%state, "redundant end of run ignored");
                    Ok(EndOfRun::Ignored)
                }
            };
        }

        let acc = self.accumulator()?;
        let snapshot = acc.seal();
        let worker_primaries = self.worker_primaries.load(Ordering::Acquire);
        if worker_primaries != 0 && worker_primaries != primary_count {
            tracing::warn!(
                primaries = primary_count,
                worker_primaries,
                "primary count differs from the sum reported by workers"
            );
        }
        tracing::info!(primaries = primary_count, "run finalizing");

        let scored =
            snapshot.energy_deposition.total() != 0.0 || snapshot.exit_spectrum.total() != 0;
        if primary_count == 0 {
            if !scored {
                tracing::info!("no primaries processed; skipping result files");
                return Ok(EndOfRun::Finalized(self.complete(&snapshot, primary_count, Vec::new())));
            }
            tracing::warn!("end of run reported zero primaries but histograms are filled; writing");
        }

        match self.sink.write(&snapshot, &self.out_dir) {
            Ok(files) => Ok(EndOfRun::Finalized(self.complete(&snapshot, primary_count, files))),
            Err(e) => {
                tracing::error!(error = %e, "failed to persist run results");
                *self.pending.lock().expect("pending persist mutex poisoned") =
                    Some(PendingPersist { snapshot, primaries: primary_count });
                Err(e)
            }
        }
    }

    /// Retry persisting after [`RunLifecycle::end_run`] returned a persistence error.
    ///
    /// Allowed once per run; a second attempt is a [`Error::LifecycleViolation`].
    pub fn retry_persist(&self) -> Result<RunSummary> {
        if self.state() != RunState::Finalizing {
            return Err(Error::LifecycleViolation(format!(
                "retry_persist called in state {}",
                self.state()
            )));
        }
        if self.retry_used.swap(true, Ordering::AcqRel) {
            return Err(Error::LifecycleViolation("persistence retry already attempted".into()));
        }
        let pending = self
            .pending
            .lock()
            .expect("pending persist mutex poisoned")
            .take()
            .ok_or_else(|| Error::LifecycleViolation("no failed persist to retry".into()))?;

        tracing::info!(out_dir = %self.out_dir.display(), "retrying result persistence");
        match self.sink.write(&pending.snapshot, &self.out_dir) {
            Ok(files) => Ok(self.complete(&pending.snapshot, pending.primaries, files)),
            Err(e) => {
                tracing::error!(error = %e, "persistence retry failed");
                Err(e)
            }
        }
    }

    fn complete(&self, snapshot: &ScoringSnapshot, primaries: u64, files: Vec<PathBuf>) -> RunSummary {
        self.state.store(RunState::Finalized.as_u8(), Ordering::Release);
        let dropped = self.scoring.get().map(|a| a.drops()).unwrap_or_default();
        let summary = RunSummary {
            primaries,
            worker_primaries: self.worker_primaries.load(Ordering::Acquire),
            files,
            total_energy_deposited: snapshot.energy_deposition.total(),
            total_exits: snapshot.exit_spectrum.total(),
            dropped,
        };
        tracing::info!(
            primaries,
            total_energy_deposited = summary.total_energy_deposited,
            total_exits = summary.total_exits,
            out_of_range_deposits = dropped.out_of_range_deposits,
            invalid_deposits = dropped.invalid_deposits,
            out_of_range_exits = dropped.out_of_range_exits,
            "run finalized"
        );
        summary
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && matches!(e, Error::LifecycleViolation(_))
        {
            tracing::error!(state = %self.state(), error = %e, "scoring outside a running run");
        }
        result
    }
}
