//! A validated [`ScoringConfig`] compiled for the per-step hot path.

use tc_core::{BinValue, Histogram, ParticleKind, Result};

use crate::binning::CompiledBinning;
use crate::config::{Axis, ScoringConfig};
use crate::events::{ExitClassifier, TrackStep};

/// Output metadata and binning of one scored quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityPlan {
    /// Output stem; results go to `<name>.dat`.
    pub name: String,
    pub x_label: String,
    pub y_label: String,
    /// Binning with its bounds precomputed.
    pub binning: CompiledBinning,
}

impl QuantityPlan {
    /// A zeroed histogram with this quantity's binning.
    pub fn zeroed<T: BinValue>(&self) -> Histogram<T> {
        Histogram::zeroed(&self.name, &self.x_label, &self.y_label, *self.binning.policy())
    }
}

/// Where a track step lands in the exit spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitBin {
    /// Not an exit, or a particle kind that is not scored.
    NotScored,
    /// A scored exit; `None` when its energy is outside the spectrum range.
    Scored(Option<usize>),
}

/// Compiled scoring setup shared (read-only) by every worker of a run.
#[derive(Debug, Clone)]
pub struct ScoringPlan {
    pub energy_deposition: QuantityPlan,
    pub exit_spectrum: QuantityPlan,
    axis: Axis,
    particles: Vec<ParticleKind>,
    classifier: ExitClassifier,
}

impl ScoringPlan {
    /// Validate `config` and compile its binning.
    pub fn from_config(config: &ScoringConfig) -> Result<Self> {
        config.validate()?;
        let edep = &config.energy_deposition;
        let spectrum = &config.exit_spectrum;
        Ok(Self {
            energy_deposition: QuantityPlan {
                name: edep.name.clone(),
                x_label: edep.x_label.clone(),
                y_label: edep.y_label.clone(),
                binning: CompiledBinning::new(edep.binning)?,
            },
            exit_spectrum: QuantityPlan {
                name: spectrum.name.clone(),
                x_label: spectrum.x_label.clone(),
                y_label: spectrum.y_label.clone(),
                binning: CompiledBinning::new(spectrum.binning)?,
            },
            axis: edep.axis,
            particles: spectrum.particles.clone(),
            classifier: ExitClassifier::with_vacuum_materials(
                config.exit_detection.vacuum_materials.clone(),
            ),
        })
    }

    /// Deposition bin for a pre-step position.
    #[inline]
    pub fn deposit_bin(&self, position: [f64; 3]) -> Option<usize> {
        self.energy_deposition.binning.index(self.axis.component(position))
    }

    /// Exit-spectrum bin for a track step.
    pub fn exit_bin(&self, step: &TrackStep) -> ExitBin {
        if !self.particles.contains(&step.particle) || !self.classifier.is_exiting(step) {
            return ExitBin::NotScored;
        }
        ExitBin::Scored(self.exit_spectrum.binning.index(step.kinetic_energy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_core::BinningPolicy;

    fn track(particle: ParticleKind, energy: f64, left_world: bool) -> TrackStep {
        TrackStep {
            particle,
            kinetic_energy: energy,
            post_volume: (!left_world).then(|| "Target".to_string()),
            post_material: None,
        }
    }

    #[test]
    fn only_configured_particles_leaving_world_are_scored() {
        let plan = ScoringPlan::from_config(&ScoringConfig::default()).unwrap();
        assert_eq!(plan.exit_bin(&track(ParticleKind::Photon, 1e-3, true)), ExitBin::NotScored);
        assert_eq!(plan.exit_bin(&track(ParticleKind::Neutron, 1e-3, false)), ExitBin::NotScored);
        assert!(matches!(
            plan.exit_bin(&track(ParticleKind::Neutron, 1e-3, true)),
            ExitBin::Scored(Some(_))
        ));
        assert_eq!(plan.exit_bin(&track(ParticleKind::Neutron, 10.0, true)), ExitBin::Scored(None));
    }

    #[test]
    fn deposit_uses_configured_axis() {
        let mut cfg = ScoringConfig::default();
        cfg.energy_deposition.binning = BinningPolicy::Linear { min: 0.0, max: 2.0, count: 4 };
        let plan = ScoringPlan::from_config(&cfg).unwrap();
        assert_eq!(plan.deposit_bin([5.0, 5.0, 1.0]), Some(2));

        cfg.energy_deposition.axis = Axis::X;
        let plan = ScoringPlan::from_config(&cfg).unwrap();
        assert_eq!(plan.deposit_bin([5.0, 5.0, 1.0]), None);
        assert_eq!(plan.deposit_bin([0.1, 5.0, 1.0]), Some(0));
    }

    #[test]
    fn invalid_config_fails_fast() {
        let mut cfg = ScoringConfig::default();
        cfg.energy_deposition.binning = BinningPolicy::Linear { min: 2.0, max: 0.0, count: 4 };
        assert!(ScoringPlan::from_config(&cfg).is_err());
    }
}
