//! Scoring configuration: which quantities are histogrammed and how.
//!
//! Supplied once at `begin_run`. Defaults reproduce the classic depth-dose
//! plus neutron-leakage setup: z in `[0, 2)` cm over 100 linear bins and
//! exit kinetic energy in `[1e-11, 10)` GeV over 100 logarithmic bins.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tc_core::{BinningPolicy, Error, ParticleKind, Result};

/// Spatial axis used to bin energy deposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    /// Component of `position` along this axis.
    #[inline]
    pub fn component(self, position: [f64; 3]) -> f64 {
        match self {
            Self::X => position[0],
            Self::Y => position[1],
            Self::Z => position[2],
        }
    }
}

/// Complete scoring configuration for one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Energy deposition profile along one axis.
    #[serde(default)]
    pub energy_deposition: DepositionConfig,

    /// Kinetic-energy spectrum of particles leaving the world.
    #[serde(default)]
    pub exit_spectrum: SpectrumConfig,

    /// How a step is recognised as leaving the geometry.
    #[serde(default)]
    pub exit_detection: ExitDetectionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DepositionConfig {
    #[serde(default = "default_depth_binning")]
    pub binning: BinningPolicy,
    #[serde(default)]
    pub axis: Axis,
    /// Output name; results go to `<name>.dat`.
    #[serde(default = "default_edep_name")]
    pub name: String,
    #[serde(default = "default_edep_x_label")]
    pub x_label: String,
    #[serde(default = "default_edep_y_label")]
    pub y_label: String,
}

impl Default for DepositionConfig {
    fn default() -> Self {
        Self {
            binning: default_depth_binning(),
            axis: Axis::Z,
            name: default_edep_name(),
            x_label: default_edep_x_label(),
            y_label: default_edep_y_label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpectrumConfig {
    #[serde(default = "default_spectrum_binning")]
    pub binning: BinningPolicy,
    /// Particle kinds scored when they leave the world.
    #[serde(default = "default_particles")]
    pub particles: Vec<ParticleKind>,
    #[serde(default = "default_spectrum_name")]
    pub name: String,
    #[serde(default = "default_spectrum_x_label")]
    pub x_label: String,
    #[serde(default = "default_spectrum_y_label")]
    pub y_label: String,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            binning: default_spectrum_binning(),
            particles: default_particles(),
            name: default_spectrum_name(),
            x_label: default_spectrum_x_label(),
            y_label: default_spectrum_y_label(),
        }
    }
}

/// Exit detection. Leaving the world (no post-step volume) always counts;
/// `vacuum_materials` additionally treats entering a named material as an exit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExitDetectionConfig {
    #[serde(default)]
    pub vacuum_materials: Vec<String>,
}

fn default_depth_binning() -> BinningPolicy {
    BinningPolicy::Linear { min: 0.0, max: 2.0, count: 100 }
}

fn default_spectrum_binning() -> BinningPolicy {
    BinningPolicy::Logarithmic { min: 1e-11, max: 10.0, count: 100 }
}

fn default_particles() -> Vec<ParticleKind> {
    vec![ParticleKind::Neutron]
}

fn default_edep_name() -> String {
    "edep_profile".to_string()
}

fn default_edep_x_label() -> String {
    "z_cm".to_string()
}

fn default_edep_y_label() -> String {
    "edep_GeV".to_string()
}

fn default_spectrum_name() -> String {
    "neutron_spectrum".to_string()
}

fn default_spectrum_x_label() -> String {
    "energy_GeV".to_string()
}

fn default_spectrum_y_label() -> String {
    "count".to_string()
}

impl ScoringConfig {
    /// Check every binning policy and output name.
    ///
    /// Binning problems surface as [`Error::InvalidBinningPolicy`] naming the quantity.
    pub fn validate(&self) -> Result<()> {
        let quantities = [
            ("energy_deposition", &self.energy_deposition.binning),
            ("exit_spectrum", &self.exit_spectrum.binning),
        ];
        for (what, policy) in quantities {
            policy.validate().map_err(|e| match e {
                Error::InvalidBinningPolicy(msg) => {
                    Error::InvalidBinningPolicy(format!("{what}: {msg}"))
                }
                other => other,
            })?;
        }

        let mut seen = HashSet::new();
        for name in [&self.energy_deposition.name, &self.exit_spectrum.name] {
            if name.trim().is_empty() {
                return Err(Error::Config("output name must not be empty".into()));
            }
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(Error::Config(format!("output name '{name}' must be a plain file stem")));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::Config(format!("duplicate output name '{name}'")));
            }
        }

        for label in [
            &self.energy_deposition.x_label,
            &self.energy_deposition.y_label,
            &self.exit_spectrum.x_label,
            &self.exit_spectrum.y_label,
        ] {
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(Error::Config(format!(
                    "column label '{label}' must be a single non-empty token"
                )));
            }
        }

        if self.exit_spectrum.particles.is_empty() {
            return Err(Error::Config("exit_spectrum.particles must not be empty".into()));
        }
        Ok(())
    }

    /// Serialize as YAML (the `default-config` form).
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

/// Read a scoring config from YAML (default) or JSON (`.json` extension), then validate it.
pub fn read_scoring_config(path: &Path) -> Result<ScoringConfig> {
    let bytes = std::fs::read(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let cfg: ScoringConfig = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        serde_yaml_ng::from_slice(&bytes)?
    };
    cfg.validate()?;
    Ok(cfg)
}
