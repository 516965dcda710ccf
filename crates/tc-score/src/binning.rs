//! Value → bin index mapping for linear and logarithmic binning.
//!
//! Semantics match a ROOT-style fill with `FlowPolicy::Drop`: values outside
//! `[min, max)` have no bin, and a value exactly equal to `max` is dropped
//! rather than folded into the last bin.

use tc_core::{BinningPolicy, Result};

/// Bin index of `value` under `policy`, or `None` when out of range.
///
/// The policy is not validated here; one with no bins maps every value to `None`.
///
/// Pure and allocation-free; safe to call from any number of threads.
pub fn index(value: f64, policy: &BinningPolicy) -> Option<usize> {
    CompiledBinning::from_policy(*policy).index(value)
}

/// A validated [`BinningPolicy`] with its logarithms precomputed.
///
/// `index` performs exactly the arithmetic of the free [`index`] function,
/// so both agree bit-for-bit; only the `log10` of the bounds is hoisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompiledBinning {
    policy: BinningPolicy,
    lo: f64,
    span: f64,
}

impl CompiledBinning {
    /// Validate `policy` and precompute its bounds.
    pub fn new(policy: BinningPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self::from_policy(policy))
    }

    fn from_policy(policy: BinningPolicy) -> Self {
        let (min, max) = (policy.min(), policy.max());
        let (lo, hi) = if policy.is_logarithmic() { (min.log10(), max.log10()) } else { (min, max) };
        Self { policy, lo, span: hi - lo }
    }

    /// The policy this binning was compiled from.
    pub fn policy(&self) -> &BinningPolicy {
        &self.policy
    }

    /// Number of bins.
    pub fn count(&self) -> usize {
        self.policy.count()
    }

    /// Bin index of `value`, or `None` when out of range (including NaN).
    #[inline]
    pub fn index(&self, value: f64) -> Option<usize> {
        let (min, max, count) = (self.policy.min(), self.policy.max(), self.policy.count());
        if count == 0 {
            return None;
        }
        // Range decided on the raw value so `max` itself never rounds into a bin.
        if !(value >= min && value < max) {
            return None;
        }
        let coord = match self.policy {
            BinningPolicy::Linear { .. } => value - self.lo,
            BinningPolicy::Logarithmic { .. } => {
                if value <= 0.0 {
                    return None;
                }
                value.log10() - self.lo
            }
        };
        let t = (coord / self.span * count as f64).floor();
        if !(t >= 0.0) {
            // Only reachable when log10 rounds below log10(min) for a value within an ulp of min.
            return Some(0);
        }
        // `value < max` already holds; rounding near max can still produce `count`.
        Some((t as usize).min(count - 1))
    }
}
