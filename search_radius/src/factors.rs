use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::RadiusError;

/// Environment and condition multipliers. All four default to 1.0, which
/// leaves the table speeds and mobility ratios untouched.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CorrectionFactors {
    pub weather: f64,
    pub terrain: f64,
    pub health: f64,
    /// Applies to the walking mobility ratio only.
    pub mental: f64,
}

impl CorrectionFactors {
    pub const NEUTRAL: CorrectionFactors = CorrectionFactors {
        weather: 1.0,
        terrain: 1.0,
        health: 1.0,
        mental: 1.0,
    };

    /// Combined multiplier on walking and transit speeds.
    pub fn speed_multiplier(&self) -> f64 {
        self.weather * self.terrain * self.health
    }

    pub fn mobility_multiplier(&self) -> f64 {
        self.mental
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }

    pub fn validate(&self) -> Result<(), RadiusError> {
        let named = [
            ("weather", self.weather),
            ("terrain", self.terrain),
            ("health", self.health),
            ("mental", self.mental),
        ];
        for (name, value) in named {
            if !value.is_finite() || value <= 0.0 {
                return Err(RadiusError::InvalidParameter(format!(
                    "{} factor must be a positive number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn from_json_str(text: &str) -> Result<Self, RadiusError> {
        let factors: CorrectionFactors = serde_json::from_str(text)
            .map_err(|e| RadiusError::InvalidParameter(format!("correction factors: {}", e)))?;
        factors.validate()?;
        Ok(factors)
    }

    pub fn load(path: &Path) -> Result<Self, RadiusError> {
        let text = fs::read_to_string(path).map_err(|e| {
            RadiusError::InvalidParameter(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }
}

impl Default for CorrectionFactors {
    fn default() -> Self {
        Self::NEUTRAL
    }
}
