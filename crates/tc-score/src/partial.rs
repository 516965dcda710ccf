//! Worker-owned histograms, merged into the run accumulator at the end.

use std::sync::Arc;

use tc_core::{Error, Histogram, Result};

use crate::accumulator::{DropCounts, Slot, count_slot, energy_slot};
use crate::events::StepEvent;
use crate::plan::{ExitBin, ScoringPlan};

/// Histograms filled by exactly one worker, without locking.
///
/// Hand it to [`crate::RunLifecycle::merge_partial`] (or
/// [`crate::ScoringAccumulator::absorb`]) when the worker is done; merging
/// consumes it.
#[derive(Debug)]
pub struct PartialResult {
    plan: Arc<ScoringPlan>,
    energy_deposition: Histogram<f64>,
    exit_spectrum: Histogram<u64>,
    drops: DropCounts,
    primaries: u64,
}

impl PartialResult {
    /// Zeroed partial result for `plan`.
    pub fn new(plan: Arc<ScoringPlan>) -> Self {
        Self {
            energy_deposition: plan.energy_deposition.zeroed(),
            exit_spectrum: plan.exit_spectrum.zeroed(),
            plan,
            drops: DropCounts::default(),
            primaries: 0,
        }
    }

    /// Add `amount` to deposition bin `bin`; out-of-range and invalid amounts are counted.
    pub fn add_energy(&mut self, bin: Option<usize>, amount: f64) {
        match energy_slot(bin, amount, self.energy_deposition.n_bins()) {
            Slot::Bin(b) => self.energy_deposition.bin_content[b] += amount,
            Slot::OutOfRange => self.drops.out_of_range_deposits += 1,
            Slot::Invalid => self.drops.invalid_deposits += 1,
        }
    }

    /// Count one exit in spectrum bin `bin`.
    pub fn add_spectrum_count(&mut self, bin: Option<usize>) {
        match count_slot(bin, self.exit_spectrum.n_bins()) {
            Slot::Bin(b) => self.exit_spectrum.bin_content[b] += 1,
            _ => self.drops.out_of_range_exits += 1,
        }
    }

    /// Bin and add one step event.
    pub fn score(&mut self, event: &StepEvent) {
        match event {
            StepEvent::Deposit { position, edep } => {
                let bin = self.plan.deposit_bin(*position);
                self.add_energy(bin, *edep);
            }
            StepEvent::Track(step) => {
                if let ExitBin::Scored(bin) = self.plan.exit_bin(step) {
                    self.add_spectrum_count(bin);
                }
            }
        }
    }

    /// Note that one more primary particle was fully processed by this worker.
    pub fn record_primary(&mut self) {
        self.primaries += 1;
    }

    /// Primaries recorded with [`PartialResult::record_primary`].
    pub fn primaries(&self) -> u64 {
        self.primaries
    }

    /// Deposited energy per position bin.
    pub fn energy_deposition(&self) -> &Histogram<f64> {
        &self.energy_deposition
    }

    /// Exit counts per kinetic-energy bin.
    pub fn exit_spectrum(&self) -> &Histogram<u64> {
        &self.exit_spectrum
    }

    /// Values this worker could not bin.
    pub fn drops(&self) -> DropCounts {
        self.drops
    }

    /// Combine two partials of the same plan (e.g. a rayon `reduce`).
    ///
    /// Fails with [`Error::ShapeMismatch`] when the binnings differ.
    pub fn merge(mut self, other: PartialResult) -> Result<PartialResult> {
        if !self.energy_deposition.same_shape(&other.energy_deposition)
            || !self.exit_spectrum.same_shape(&other.exit_spectrum)
        {
            return Err(Error::ShapeMismatch(format!(
                "cannot merge partial results with binning ({:?}, {:?}) and ({:?}, {:?})",
                self.energy_deposition.policy,
                self.exit_spectrum.policy,
                other.energy_deposition.policy,
                other.exit_spectrum.policy
            )));
        }
        for (dst, src) in
            self.energy_deposition.bin_content.iter_mut().zip(&other.energy_deposition.bin_content)
        {
            *dst += *src;
        }
        for (dst, src) in
            self.exit_spectrum.bin_content.iter_mut().zip(&other.exit_spectrum.bin_content)
        {
            *dst += *src;
        }
        self.drops.merge(&other.drops);
        self.primaries += other.primaries;
        Ok(self)
    }

    pub(crate) fn into_parts(self) -> (Histogram<f64>, Histogram<u64>, DropCounts) {
        (self.energy_deposition, self.exit_spectrum, self.drops)
    }
}
