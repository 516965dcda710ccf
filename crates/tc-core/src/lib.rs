//! # tc-core
//!
//! Shared error type, histogram data model and persistence trait for
//! transcore, the run-scoped scoring layer that sits downstream of a
//! detector-simulation stepping loop.

#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::ResultSink;
pub use types::{
    BinValue, BinningPolicy, Histogram, ParticleKind, RunState, ScoringSnapshot, format_real,
};
