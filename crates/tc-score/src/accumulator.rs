//! Run-scoped, thread-safe scoring histograms.
//!
//! Each histogram has its own mutex; an add holds it only for one bin update.
//! Sums are exact for integer counts. For deposited energy the final value is
//! the sum of all accepted amounts, but floating-point addition is not
//! associative, so different thread interleavings may differ in the last
//! ulps. That is inherent to concurrent `f64` accumulation and is not
//! treated as an error.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tc_core::{Error, Histogram, Result, ScoringSnapshot};

use crate::events::StepEvent;
use crate::partial::PartialResult;
use crate::plan::{ExitBin, ScoringPlan};

/// Counts of values that were not added to any bin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    /// Deposits whose position had no bin.
    pub out_of_range_deposits: u64,
    /// Deposits with a negative or non-finite amount.
    pub invalid_deposits: u64,
    /// Scored exits whose energy had no bin.
    pub out_of_range_exits: u64,
}

impl DropCounts {
    /// Add `other` into `self`.
    pub fn merge(&mut self, other: &DropCounts) {
        self.out_of_range_deposits += other.out_of_range_deposits;
        self.invalid_deposits += other.invalid_deposits;
        self.out_of_range_exits += other.out_of_range_exits;
    }
}

/// Where an energy addition goes.
pub(crate) enum Slot {
    Bin(usize),
    OutOfRange,
    Invalid,
}

#[inline]
pub(crate) fn energy_slot(bin: Option<usize>, amount: f64, n_bins: usize) -> Slot {
    if !(amount >= 0.0) || !amount.is_finite() {
        return Slot::Invalid;
    }
    count_slot(bin, n_bins)
}

#[inline]
pub(crate) fn count_slot(bin: Option<usize>, n_bins: usize) -> Slot {
    match bin {
        Some(b) if b < n_bins => Slot::Bin(b),
        _ => Slot::OutOfRange,
    }
}

/// Shared accumulator for one run. Pass by reference (or `Arc`) to every worker.
pub struct ScoringAccumulator {
    plan: Arc<ScoringPlan>,
    energy_deposition: Mutex<Histogram<f64>>,
    exit_spectrum: Mutex<Histogram<u64>>,
    sealed: AtomicBool,
    out_of_range_deposits: AtomicU64,
    invalid_deposits: AtomicU64,
    out_of_range_exits: AtomicU64,
}

impl ScoringAccumulator {
    /// Allocate zeroed histograms for `plan`.
    pub fn new(plan: Arc<ScoringPlan>) -> Self {
        let energy_deposition = plan.energy_deposition.zeroed();
        let exit_spectrum = plan.exit_spectrum.zeroed();
        tracing::debug!(
            edep_bins = energy_deposition.n_bins(),
            spectrum_bins = exit_spectrum.n_bins(),
            "scoring histograms allocated"
        );
        Self {
            plan,
            energy_deposition: Mutex::new(energy_deposition),
            exit_spectrum: Mutex::new(exit_spectrum),
            sealed: AtomicBool::new(false),
            out_of_range_deposits: AtomicU64::new(0),
            invalid_deposits: AtomicU64::new(0),
            out_of_range_exits: AtomicU64::new(0),
        }
    }

    /// The compiled scoring setup.
    pub fn plan(&self) -> &Arc<ScoringPlan> {
        &self.plan
    }

    /// Add `amount` to deposition bin `bin`. `None` (out of range) is counted and dropped.
    pub fn add_energy(&self, bin: Option<usize>, amount: f64) -> Result<()> {
        let n_bins = self.plan.energy_deposition.binning.count();
        match energy_slot(bin, amount, n_bins) {
            Slot::Bin(b) => {
                let mut h = self.energy_deposition.lock().expect("energy deposition mutex poisoned");
                self.ensure_open("energy deposition")?;
                h.bin_content[b] += amount;
            }
            Slot::OutOfRange => {
                self.ensure_open("energy deposition")?;
                self.out_of_range_deposits.fetch_add(1, Ordering::Relaxed);
            }
            Slot::Invalid => {
                self.ensure_open("energy deposition")?;
                self.invalid_deposits.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Increment exit-spectrum bin `bin` by one. `None` (out of range) is counted and dropped.
    pub fn add_spectrum_count(&self, bin: Option<usize>) -> Result<()> {
        let n_bins = self.plan.exit_spectrum.binning.count();
        match count_slot(bin, n_bins) {
            Slot::Bin(b) => {
                let mut h = self.exit_spectrum.lock().expect("exit spectrum mutex poisoned");
                self.ensure_open("exit spectrum")?;
                h.bin_content[b] += 1;
            }
            _ => {
                self.ensure_open("exit spectrum")?;
                self.out_of_range_exits.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Bin and add one step event.
    pub fn score(&self, event: &StepEvent) -> Result<()> {
        match event {
            StepEvent::Deposit { position, edep } => {
                self.add_energy(self.plan.deposit_bin(*position), *edep)
            }
            StepEvent::Track(step) => match self.plan.exit_bin(step) {
                ExitBin::NotScored => Ok(()),
                ExitBin::Scored(bin) => self.add_spectrum_count(bin),
            },
        }
    }

    /// Merge a worker's partial result. The partial is consumed.
    pub fn absorb(&self, partial: PartialResult) -> Result<()> {
        let (edep, spectrum, drops) = partial.into_parts();
        {
            let mut own_edep =
                self.energy_deposition.lock().expect("energy deposition mutex poisoned");
            let mut own_spectrum = self.exit_spectrum.lock().expect("exit spectrum mutex poisoned");
            if !own_edep.same_shape(&edep) || !own_spectrum.same_shape(&spectrum) {
                return Err(Error::ShapeMismatch(format!(
                    "partial result binning ({:?}, {:?}) differs from run binning ({:?}, {:?})",
                    edep.policy, spectrum.policy, own_edep.policy, own_spectrum.policy
                )));
            }
            self.ensure_open("partial result")?;
            for (dst, src) in own_edep.bin_content.iter_mut().zip(&edep.bin_content) {
                *dst += *src;
            }
            for (dst, src) in own_spectrum.bin_content.iter_mut().zip(&spectrum.bin_content) {
                *dst += *src;
            }
        }
        self.out_of_range_deposits.fetch_add(drops.out_of_range_deposits, Ordering::Relaxed);
        self.invalid_deposits.fetch_add(drops.invalid_deposits, Ordering::Relaxed);
        self.out_of_range_exits.fetch_add(drops.out_of_range_exits, Ordering::Relaxed);
        Ok(())
    }

    /// Point-in-time copy of all histograms. Final only once the accumulator is sealed.
    pub fn snapshot(&self) -> ScoringSnapshot {
        let edep = self.energy_deposition.lock().expect("energy deposition mutex poisoned");
        let spectrum = self.exit_spectrum.lock().expect("exit spectrum mutex poisoned");
        ScoringSnapshot { energy_deposition: edep.clone(), exit_spectrum: spectrum.clone() }
    }

    /// Reject all further additions and return the final histograms.
    ///
    /// Every add that acquired a histogram lock before this call is included;
    /// every later add fails with [`Error::LifecycleViolation`].
    pub fn seal(&self) -> ScoringSnapshot {
        let edep = self.energy_deposition.lock().expect("energy deposition mutex poisoned");
        let spectrum = self.exit_spectrum.lock().expect("exit spectrum mutex poisoned");
        self.sealed.store(true, Ordering::Release);
        ScoringSnapshot { energy_deposition: edep.clone(), exit_spectrum: spectrum.clone() }
    }

    /// Whether [`ScoringAccumulator::seal`] has been called.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Values dropped so far.
    pub fn drops(&self) -> DropCounts {
        DropCounts {
            out_of_range_deposits: self.out_of_range_deposits.load(Ordering::Relaxed),
            invalid_deposits: self.invalid_deposits.load(Ordering::Relaxed),
            out_of_range_exits: self.out_of_range_exits.load(Ordering::Relaxed),
        }
    }

    fn ensure_open(&self, what: &str) -> Result<()> {
        if self.is_sealed() {
            return Err(Error::LifecycleViolation(format!(
                "{what} added after the run's histograms were frozen"
            )));
        }
        Ok(())
    }
}
