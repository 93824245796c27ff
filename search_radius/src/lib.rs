//! Missing-person search radius estimation and radius map rendering.
//!
//! The estimator turns `(age, gender, elapsed hours)` into walking and transit
//! travel distances using static demographic speed tables, and the renderer
//! draws the resulting radius as a circle on any `plotters` drawing area.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod estimate;
pub mod factors;
pub mod glyph;
pub mod render;
pub mod tables;

pub use estimate::{
    age_cap_km, estimate, round2, EstimateBreakdown, EstimateResult, Estimator,
};
pub use factors::CorrectionFactors;
pub use glyph::GlyphTextBackend;
pub use render::{draw_radius, RadiusLayout};
pub use tables::{list_tables, AgeBracket, SpeedRange, TableRow};

#[derive(Error, Debug)]
pub enum RadiusError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid gender '{0}': expected M or F")]
    InvalidGender(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("render target unavailable ({width}x{height})")]
    RenderTargetUnavailable { width: u32, height: u32 },
    #[error("rendering failed: {0}")]
    Render(String),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    pub fn code(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Gender {
    type Err = RadiusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "M" => Ok(Gender::Male),
            "F" => Ok(Gender::Female),
            other => Err(RadiusError::InvalidGender(other.to_string())),
        }
    }
}

/// A validated estimator input: non-negative age, known gender and a
/// strictly positive elapsed time in hours.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Subject {
    pub age: u32,
    pub gender: Gender,
    pub duration_h: f64,
}

impl Subject {
    pub fn new(age: i64, gender: &str, duration_h: f64) -> Result<Self, RadiusError> {
        if age < 0 {
            return Err(RadiusError::InvalidInput(format!(
                "age must be >= 0, got {}",
                age
            )));
        }
        let age = u32::try_from(age)
            .map_err(|_| RadiusError::InvalidInput(format!("age {} is out of range", age)))?;
        if !duration_h.is_finite() || duration_h <= 0.0 {
            return Err(RadiusError::InvalidInput(format!(
                "duration must be a positive number of hours, got {}",
                duration_h
            )));
        }
        let gender = gender.parse()?;
        Ok(Self {
            age,
            gender,
            duration_h,
        })
    }

    /// Validate raw text fields as typed into a form or read from a CSV row.
    pub fn parse(age: &str, gender: &str, duration_h: &str) -> Result<Self, RadiusError> {
        let age_value: i64 = age
            .trim()
            .parse()
            .map_err(|_| RadiusError::InvalidInput(format!("age '{}' is not an integer", age.trim())))?;
        let duration_value: f64 = duration_h.trim().parse().map_err(|_| {
            RadiusError::InvalidInput(format!("duration '{}' is not a number", duration_h.trim()))
        })?;
        Self::new(age_value, gender, duration_value)
    }
}
