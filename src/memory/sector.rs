//! Process-wide sector configuration.
//!
//! [`SectorTable`] is built once at startup from [`CortexConfig`] and handed
//! to the classifier and the store. It is never mutated afterwards.

use anyhow::{ensure, Result};

use crate::config::{CortexConfig, SectorProfileConfig};
use crate::memory::types::Sector;

/// Decay rate and classification weight for one sector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorProfile {
    /// Salience decay rate per day.
    pub decay_lambda: f64,
    /// Multiplier applied to the sector's classification score.
    pub weight: f64,
}

impl SectorProfile {
    /// Built-in profile for a sector.
    pub const fn builtin(sector: Sector) -> Self {
        match sector {
            Sector::Episodic => Self { decay_lambda: 0.015, weight: 1.2 },
            Sector::Semantic => Self { decay_lambda: 0.005, weight: 1.0 },
            Sector::Procedural => Self { decay_lambda: 0.008, weight: 1.1 },
            Sector::Emotional => Self { decay_lambda: 0.020, weight: 1.3 },
            Sector::Reflective => Self { decay_lambda: 0.001, weight: 0.8 },
        }
    }

    fn resolve(sector: Sector, overrides: &SectorProfileConfig) -> Self {
        let builtin = Self::builtin(sector);
        Self {
            decay_lambda: overrides.decay_lambda.unwrap_or(builtin.decay_lambda),
            weight: overrides.weight.unwrap_or(builtin.weight),
        }
    }
}

/// Immutable per-sector configuration shared by the classifier and the store.
#[derive(Debug, Clone)]
pub struct SectorTable {
    profiles: [SectorProfile; 5],
    secondary_ratio: f64,
}

impl SectorTable {
    /// Build the table from config, validating every rate and weight.
    pub fn from_config(config: &CortexConfig) -> Result<Self> {
        let s = &config.sectors;
        let profiles = [
            SectorProfile::resolve(Sector::Episodic, &s.episodic),
            SectorProfile::resolve(Sector::Semantic, &s.semantic),
            SectorProfile::resolve(Sector::Procedural, &s.procedural),
            SectorProfile::resolve(Sector::Emotional, &s.emotional),
            SectorProfile::resolve(Sector::Reflective, &s.reflective),
        ];
        Self::new(profiles, config.classifier.secondary_ratio)
    }

    pub fn new(profiles: [SectorProfile; 5], secondary_ratio: f64) -> Result<Self> {
        for (sector, profile) in Sector::ALL.iter().zip(profiles.iter()) {
            ensure!(
                profile.decay_lambda.is_finite() && profile.decay_lambda > 0.0,
                "sector {sector}: decay_lambda must be > 0, got {}",
                profile.decay_lambda
            );
            ensure!(
                profile.weight.is_finite() && profile.weight > 0.0,
                "sector {sector}: weight must be > 0, got {}",
                profile.weight
            );
        }
        ensure!(
            secondary_ratio > 0.0 && secondary_ratio <= 1.0,
            "classifier.secondary_ratio must be in (0, 1], got {secondary_ratio}"
        );
        Ok(Self {
            profiles,
            secondary_ratio,
        })
    }

    pub fn profile(&self, sector: Sector) -> SectorProfile {
        self.profiles[sector.index()]
    }

    pub fn decay_lambda(&self, sector: Sector) -> f64 {
        self.profile(sector).decay_lambda
    }

    pub fn weight(&self, sector: Sector) -> f64 {
        self.profile(sector).weight
    }

    pub fn secondary_ratio(&self) -> f64 {
        self.secondary_ratio
    }
}

impl Default for SectorTable {
    fn default() -> Self {
        Self {
            profiles: Sector::ALL.map(SectorProfile::builtin),
            secondary_ratio: 0.7,
        }
    }
}
