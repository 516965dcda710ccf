//! Per-step events consumed from the transport engine's stepping loop.

use serde::{Deserialize, Serialize};
use tc_core::ParticleKind;

/// One scoring-relevant step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEvent {
    /// Energy deposited by a step, at its pre-step position.
    Deposit {
        /// Pre-step point `[x, y, z]`.
        position: [f64; 3],
        /// Deposited energy (non-negative).
        edep: f64,
    },
    /// A track step whose post-step point may lie outside the world.
    Track(TrackStep),
}

/// Track state at the end of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackStep {
    /// Species of the track.
    pub particle: ParticleKind,
    /// Kinetic energy after the step.
    pub kinetic_energy: f64,
    /// Name of the post-step physical volume; `None` when the track left the world.
    #[serde(default)]
    pub post_volume: Option<String>,
    /// Material of the post-step volume, when there is one.
    #[serde(default)]
    pub post_material: Option<String>,
}

/// Decides whether a [`TrackStep`] is an exit.
///
/// Leaving the world is the defining condition. The optional vacuum-material
/// list also counts steps that enter a named (typically near-vacuum) material;
/// that is a geometry-specific approximation and is empty by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitClassifier {
    vacuum_materials: Vec<String>,
}

impl ExitClassifier {
    /// Classifier that only accepts "left the world".
    pub fn leaving_world() -> Self {
        Self::default()
    }

    /// Also treat entering any of `materials` as an exit.
    pub fn with_vacuum_materials(materials: Vec<String>) -> Self {
        Self { vacuum_materials: materials }
    }

    /// Whether `step` counts as leaving the geometry.
    pub fn is_exiting(&self, step: &TrackStep) -> bool {
        if step.post_volume.is_none() {
            return true;
        }
        match &step.post_material {
            Some(m) => self.vacuum_materials.iter().any(|v| v == m),
            None => false,
        }
    }
}
