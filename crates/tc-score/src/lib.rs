//! # tc-score
//!
//! Run-scoped scoring for a detector-simulation worker pool.
//!
//! Transport threads hand per-step events (energy deposits and track steps)
//! to a shared [`RunLifecycle`]. Deposits are binned along one axis with a
//! linear or logarithmic [`BinningPolicy`](tc_core::BinningPolicy); tracks of
//! the configured particle kinds that leave the world fill an exit-energy
//! spectrum. At end of run the histograms are frozen and written exactly once.
//!
//! ## Example
//!
//! ```no_run
//! use tc_score::{RunLifecycle, ScoringConfig, WorkerRole};
//!
//! let run = RunLifecycle::new("out/geant4/FTFP_BERT_HP");
//! run.begin_run(&ScoringConfig::default()).unwrap();
//! std::thread::scope(|s| {
//!     for _ in 0..4 {
//!         s.spawn(|| run.score_deposit([0.0, 0.0, 0.37], 1.2e-3).unwrap());
//!     }
//! });
//! run.end_run(WorkerRole::Master, 4).unwrap();
//! ```

#![warn(clippy::all)]

pub mod accumulator;
pub mod binning;
pub mod config;
pub mod events;
pub mod lifecycle;
pub mod partial;
pub mod plan;
pub mod writer;

pub use accumulator::{DropCounts, ScoringAccumulator};
pub use binning::{CompiledBinning, index};
pub use config::{
    Axis, DepositionConfig, ExitDetectionConfig, ScoringConfig, SpectrumConfig,
    read_scoring_config,
};
pub use events::{ExitClassifier, StepEvent, TrackStep};
pub use lifecycle::{EndOfRun, RunLifecycle, RunSummary, WorkerRole};
pub use partial::PartialResult;
pub use plan::{ExitBin, QuantityPlan, ScoringPlan};
pub use writer::{
    DatWriter, ResultTable, format_histogram, parse_result_table, read_histogram_file,
    write_results,
};
