// Demographic locomotion tables. Speeds are km/h; every bracket carries an
// entry for both genders in the walking and transit tables and a mobility
// ratio, so lookups are total over (AgeBracket, Gender).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Gender;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgeBracket {
    #[serde(rename = "0-5")]
    Age0To5,
    #[serde(rename = "6-12")]
    Age6To12,
    #[serde(rename = "13-17")]
    Age13To17,
    #[serde(rename = "18-59")]
    Age18To59,
    #[serde(rename = "60+")]
    Age60Plus,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 5] = [
        AgeBracket::Age0To5,
        AgeBracket::Age6To12,
        AgeBracket::Age13To17,
        AgeBracket::Age18To59,
        AgeBracket::Age60Plus,
    ];

    /// Half-open classification: [0,6) [6,13) [13,18) [18,60) [60,inf).
    pub fn from_age(age: u32) -> Self {
        if age < 6 {
            AgeBracket::Age0To5
        } else if age < 13 {
            AgeBracket::Age6To12
        } else if age < 18 {
            AgeBracket::Age13To17
        } else if age < 60 {
            AgeBracket::Age18To59
        } else {
            AgeBracket::Age60Plus
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgeBracket::Age0To5 => "0-5",
            AgeBracket::Age6To12 => "6-12",
            AgeBracket::Age13To17 => "13-17",
            AgeBracket::Age18To59 => "18-59",
            AgeBracket::Age60Plus => "60+",
        }
    }

    pub fn min_age(&self) -> u32 {
        match self {
            AgeBracket::Age0To5 => 0,
            AgeBracket::Age6To12 => 6,
            AgeBracket::Age13To17 => 13,
            AgeBracket::Age18To59 => 18,
            AgeBracket::Age60Plus => 60,
        }
    }

    pub fn walk_speed(&self, gender: Gender) -> SpeedRange {
        match (self, gender) {
            (AgeBracket::Age0To5, _) => SpeedRange::new(1.5, 2.5),
            (AgeBracket::Age6To12, _) => SpeedRange::new(3.0, 4.0),
            (AgeBracket::Age13To17, _) => SpeedRange::new(4.0, 5.0),
            (AgeBracket::Age18To59, Gender::Male) => SpeedRange::new(4.5, 5.5),
            (AgeBracket::Age18To59, Gender::Female) => SpeedRange::new(4.0, 5.0),
            (AgeBracket::Age60Plus, _) => SpeedRange::new(2.5, 3.5),
        }
    }

    /// Bus-assisted travel speed. Gender-independent in every bracket.
    pub fn transit_speed(&self, _gender: Gender) -> SpeedRange {
        match self {
            AgeBracket::Age0To5 => SpeedRange::new(0.5, 1.0),
            AgeBracket::Age6To12 => SpeedRange::new(10.0, 15.0),
            AgeBracket::Age13To17 => SpeedRange::new(15.0, 20.0),
            AgeBracket::Age18To59 => SpeedRange::new(18.0, 25.0),
            AgeBracket::Age60Plus => SpeedRange::new(12.0, 18.0),
        }
    }

    /// Fraction of elapsed time spent effectively walking.
    pub fn mobility_ratio(&self) -> f64 {
        match self {
            AgeBracket::Age0To5 => 0.4,
            AgeBracket::Age6To12 => 0.6,
            AgeBracket::Age13To17 => 0.7,
            AgeBracket::Age18To59 => 0.8,
            AgeBracket::Age60Plus => 0.5,
        }
    }
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpeedRange {
    pub min_kmh: f64,
    pub max_kmh: f64,
}

impl SpeedRange {
    pub const fn new(min_kmh: f64, max_kmh: f64) -> Self {
        Self { min_kmh, max_kmh }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableRow {
    pub bracket: AgeBracket,
    pub gender: Gender,
    pub walk: SpeedRange,
    pub transit: SpeedRange,
    pub mobility_ratio: f64,
}

pub fn list_tables() -> Vec<TableRow> {
    AgeBracket::ALL
        .iter()
        .flat_map(|bracket| {
            Gender::ALL.iter().map(move |gender| TableRow {
                bracket: *bracket,
                gender: *gender,
                walk: bracket.walk_speed(*gender),
                transit: bracket.transit_speed(*gender),
                mobility_ratio: bracket.mobility_ratio(),
            })
        })
        .collect()
}
