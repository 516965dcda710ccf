//! Common data types for transcore

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mapping from a real value to a histogram bin.
///
/// The upper bound is exclusive for both variants: a value equal to `max` has no bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BinningPolicy {
    /// `count` equal-width bins on `[min, max)`.
    Linear {
        /// Lower edge of the first bin.
        min: f64,
        /// Upper edge of the last bin (exclusive).
        max: f64,
        /// Number of bins.
        count: usize,
    },
    /// `count` bins equally spaced in `log10` on `[min, max)`. Requires `min > 0`.
    #[serde(alias = "log")]
    Logarithmic {
        /// Lower edge of the first bin (> 0).
        min: f64,
        /// Upper edge of the last bin (exclusive).
        max: f64,
        /// Number of bins.
        count: usize,
    },
}

impl BinningPolicy {
    /// Lower edge of the first bin.
    pub fn min(&self) -> f64 {
        match *self {
            Self::Linear { min, .. } | Self::Logarithmic { min, .. } => min,
        }
    }

    /// Upper edge of the last bin (exclusive).
    pub fn max(&self) -> f64 {
        match *self {
            Self::Linear { max, .. } | Self::Logarithmic { max, .. } => max,
        }
    }

    /// Number of bins.
    pub fn count(&self) -> usize {
        match *self {
            Self::Linear { count, .. } | Self::Logarithmic { count, .. } => count,
        }
    }

    /// Whether bins are equally spaced in `log10`.
    pub fn is_logarithmic(&self) -> bool {
        matches!(self, Self::Logarithmic { .. })
    }

    /// Check that the policy describes a usable histogram.
    pub fn validate(&self) -> Result<()> {
        let (min, max, count) = (self.min(), self.max(), self.count());
        if count == 0 {
            return Err(Error::InvalidBinningPolicy("bin count must be at least 1".into()));
        }
        if !min.is_finite() || !max.is_finite() {
            return Err(Error::InvalidBinningPolicy(format!(
                "bounds must be finite (min={min}, max={max})"
            )));
        }
        if min >= max {
            return Err(Error::InvalidBinningPolicy(format!(
                "min must be below max (min={min}, max={max})"
            )));
        }
        if self.is_logarithmic() && min <= 0.0 {
            return Err(Error::InvalidBinningPolicy(format!(
                "logarithmic binning requires min > 0 (min={min})"
            )));
        }
        Ok(())
    }

    /// Bin edges (length = `count + 1`). The first and last edges are exactly `min` and `max`.
    pub fn bin_edges(&self) -> Vec<f64> {
        let n = self.count();
        let mut edges: Vec<f64> = (0..=n).map(|i| self.position(i as f64)).collect();
        if let Some(first) = edges.first_mut() {
            *first = self.min();
        }
        if let Some(last) = edges.last_mut() {
            *last = self.max();
        }
        edges
    }

    /// Centre of bin `i`: arithmetic for linear bins, geometric for logarithmic bins.
    pub fn bin_center(&self, i: usize) -> f64 {
        self.position(i as f64 + 0.5)
    }

    /// Centres of all bins in increasing order.
    pub fn bin_centers(&self) -> Vec<f64> {
        (0..self.count()).map(|i| self.bin_center(i)).collect()
    }

    /// Value at fractional bin coordinate `t` (0 = `min`, `count` = `max`).
    fn position(&self, t: f64) -> f64 {
        match *self {
            Self::Linear { min, max, count } => min + t * (max - min) / count as f64,
            Self::Logarithmic { min, max, count } => {
                let log_min = min.log10();
                let d_log = (max.log10() - log_min) / count as f64;
                10f64.powf(log_min + t * d_log)
            }
        }
    }
}

/// Numeric content of one histogram bin.
pub trait BinValue:
    Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Add `other` into `self`.
    fn accumulate(&mut self, other: Self);

    /// Value as `f64` (for summaries).
    fn to_f64(self) -> f64;

    /// Text form used in result files.
    fn format_value(self) -> String;

    /// Parse the text form written by [`BinValue::format_value`].
    fn parse_value(s: &str) -> Option<Self>;
}

impl BinValue for f64 {
    #[inline]
    fn accumulate(&mut self, other: Self) {
        *self += other;
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn format_value(self) -> String {
        format_real(self)
    }

    fn parse_value(s: &str) -> Option<Self> {
        s.parse().ok()
    }
}

impl BinValue for u64 {
    #[inline]
    fn accumulate(&mut self, other: Self) {
        *self += other;
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn format_value(self) -> String {
        self.to_string()
    }

    fn parse_value(s: &str) -> Option<Self> {
        // Tools that round-trip through floats write counts as `12` or `12.0`.
        s.parse().ok().or_else(|| {
            let v: f64 = s.parse().ok()?;
            (v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64).then_some(v as u64)
        })
    }
}

/// Shortest round-trip text for `x`, switching to exponent form outside `[1e-4, 1e15)`.
pub fn format_real(x: f64) -> String {
    let a = x.abs();
    if x == 0.0 || (1e-4..1e15).contains(&a) { format!("{x}") } else { format!("{x:e}") }
}

/// A 1D histogram with immutable binning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram<T> {
    /// Histogram name (also used for log messages).
    pub name: String,
    /// Label of the binned quantity (first column of the result file).
    pub x_label: String,
    /// Label of the accumulated quantity (second column of the result file).
    pub y_label: String,
    /// Binning policy.
    pub policy: BinningPolicy,
    /// Bin contents (length = `policy.count()`).
    pub bin_content: Vec<T>,
}

impl<T: BinValue> Histogram<T> {
    /// Create a histogram with all bins zeroed.
    pub fn zeroed(
        name: impl Into<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
        policy: BinningPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            policy,
            bin_content: vec![T::default(); policy.count()],
        }
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.bin_content.len()
    }

    /// Sum over all bins.
    pub fn total(&self) -> T {
        self.bin_content.iter().fold(T::default(), |mut acc, &v| {
            acc.accumulate(v);
            acc
        })
    }

    /// Whether `other` has the same binning (policy and bin count).
    pub fn same_shape<U>(&self, other: &Histogram<U>) -> bool {
        self.policy == other.policy && self.bin_content.len() == other.bin_content.len()
    }
}

/// Lifecycle state of a scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RunState {
    /// `begin_run` has not been called.
    NotStarted = 0,
    /// Histograms are allocated and accept additions.
    Running = 1,
    /// Histograms are frozen; results are being persisted.
    Finalizing = 2,
    /// Results were written; the run is closed.
    Finalized = 3,
}

impl RunState {
    /// Encoding used for atomic storage.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode from [`RunState::as_u8`]. Unknown values map to `Finalized`.
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::NotStarted,
            1 => Self::Running,
            2 => Self::Finalizing,
            _ => Self::Finalized,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Finalizing => "finalizing",
            Self::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// Particle species as reported by the transport engine.
///
/// Parsing accepts both generic names (`electron`, `photon`) and Geant4 names (`e-`, `gamma`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParticleKind {
    Neutron,
    Proton,
    Electron,
    Positron,
    Photon,
    MuonPlus,
    MuonMinus,
    PionPlus,
    PionMinus,
    /// Any other species, kept by name.
    Other(String),
}

impl ParticleKind {
    /// Canonical (generic) name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Neutron => "neutron",
            Self::Proton => "proton",
            Self::Electron => "electron",
            Self::Positron => "positron",
            Self::Photon => "photon",
            Self::MuonPlus => "muon+",
            Self::MuonMinus => "muon-",
            Self::PionPlus => "pion+",
            Self::PionMinus => "pion-",
            Self::Other(name) => name,
        }
    }
}

impl FromStr for ParticleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        if name.is_empty() {
            return Err(Error::Config("empty particle name".into()));
        }
        Ok(match name.to_ascii_lowercase().as_str() {
            "neutron" => Self::Neutron,
            "proton" => Self::Proton,
            "electron" | "e-" => Self::Electron,
            "positron" | "e+" => Self::Positron,
            "photon" | "gamma" => Self::Photon,
            "muon+" | "mu+" => Self::MuonPlus,
            "muon" | "muon-" | "mu-" => Self::MuonMinus,
            "pion+" | "pi+" => Self::PionPlus,
            "pion-" | "pi-" => Self::PionMinus,
            _ => Self::Other(name.to_string()),
        })
    }
}

impl TryFrom<String> for ParticleKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ParticleKind> for String {
    fn from(p: ParticleKind) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for ParticleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frozen copy of all run histograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSnapshot {
    /// Deposited energy per position bin.
    pub energy_deposition: Histogram<f64>,
    /// Exit counts per kinetic-energy bin.
    pub exit_spectrum: Histogram<u64>,
}
