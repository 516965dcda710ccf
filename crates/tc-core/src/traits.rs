//! Core traits for transcore
//!
//! The run lifecycle hands frozen histograms to a [`ResultSink`] instead of
//! writing files itself, so the persistence format can be swapped (or
//! observed in tests) without touching the accumulation path.

use std::path::{Path, PathBuf};

use crate::Result;
use crate::types::ScoringSnapshot;

/// Destination for the final histograms of a run.
pub trait ResultSink: Send + Sync {
    /// Persist `snapshot` under `out_dir`, returning the paths written.
    ///
    /// Failures must be returned, not retried: the caller owns the retry decision.
    fn write(&self, snapshot: &ScoringSnapshot, out_dir: &Path) -> Result<Vec<PathBuf>>;

    /// Sink name (e.g. "dat").
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BinningPolicy, Histogram};

    struct NullSink;

    impl ResultSink for NullSink {
        fn write(&self, snapshot: &ScoringSnapshot, out_dir: &Path) -> Result<Vec<PathBuf>> {
            Ok(vec![out_dir.join(&snapshot.energy_deposition.name)])
        }

        fn name(&self) -> &str {
            "null"
        }
    }

    #[test]
    fn sink_is_object_safe() {
        let p = BinningPolicy::Linear { min: 0.0, max: 1.0, count: 2 };
        let snapshot = ScoringSnapshot {
            energy_deposition: Histogram::zeroed("edep", "z", "e", p),
            exit_spectrum: Histogram::zeroed("spectrum", "e", "n", p),
        };
        let sink: Box<dyn ResultSink> = Box::new(NullSink);
        assert_eq!(sink.name(), "null");
        let paths = sink.write(&snapshot, Path::new("/out")).unwrap();
        assert_eq!(paths, vec![PathBuf::from("/out/edep")]);
    }
}
