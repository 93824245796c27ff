//! Walking/transit distance estimation.
//!
//! Both candidate distances use the upper bound of the bracket's speed range.
//! Walking is discounted by the bracket's mobility ratio; transit is treated
//! as continuous for the whole elapsed time. The search radius is the larger
//! of the two, clamped by an age-based ceiling, and rounding to 2 decimals
//! happens only when the [`EstimateResult`] is built.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::factors::CorrectionFactors;
use crate::tables::AgeBracket;
use crate::{Gender, RadiusError, Subject};

const YOUNG_CHILD_MAX_AGE: u32 = 5;
const CHILD_MAX_AGE: u32 = 12;
const ELDERLY_MIN_AGE: u32 = 71;
const VULNERABLE_CAP_KM: f64 = 6.0;
const CHILD_CAP_KM: f64 = 10.0;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EstimateResult {
    /// Walking distance in km.
    pub walk: f64,
    /// Transit (bus-assisted) distance in km.
    pub bus: f64,
    /// Search radius in km.
    pub radius: f64,
}

/// Unrounded intermediate values of one estimate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EstimateBreakdown {
    pub bracket: AgeBracket,
    pub walk_speed_kmh: f64,
    pub transit_speed_kmh: f64,
    pub mobility_ratio: f64,
    pub walk_km: f64,
    pub bus_km: f64,
    pub uncapped_radius_km: f64,
    pub cap_km: Option<f64>,
    pub radius_km: f64,
}

impl EstimateBreakdown {
    pub fn cap_applied(&self) -> bool {
        self.radius_km < self.uncapped_radius_km
    }

    pub fn result(&self) -> EstimateResult {
        EstimateResult {
            walk: round2(self.walk_km),
            bus: round2(self.bus_km),
            radius: round2(self.radius_km),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Estimator {
    factors: CorrectionFactors,
}

impl Estimator {
    pub fn new(factors: CorrectionFactors) -> Result<Self, RadiusError> {
        factors.validate()?;
        Ok(Self { factors })
    }

    pub fn factors(&self) -> &CorrectionFactors {
        &self.factors
    }

    /// Assumes `duration_h > 0`; validate untrusted input with [`Subject`].
    pub fn estimate(&self, age: u32, gender: Gender, duration_h: f64) -> EstimateResult {
        self.breakdown(age, gender, duration_h).result()
    }

    pub fn estimate_subject(&self, subject: &Subject) -> EstimateResult {
        self.estimate(subject.age, subject.gender, subject.duration_h)
    }

    pub fn breakdown(&self, age: u32, gender: Gender, duration_h: f64) -> EstimateBreakdown {
        let bracket = AgeBracket::from_age(age);
        let speed_k = self.factors.speed_multiplier();

        let walk_speed_kmh = bracket.walk_speed(gender).max_kmh * speed_k;
        let transit_speed_kmh = bracket.transit_speed(gender).max_kmh * speed_k;
        let mobility_ratio =
            (bracket.mobility_ratio() * self.factors.mobility_multiplier()).clamp(0.0, 1.0);

        let walk_km = walk_speed_kmh * mobility_ratio * duration_h;
        let bus_km = transit_speed_kmh * duration_h;
        let uncapped_radius_km = walk_km.max(bus_km);

        let cap_km = age_cap_km(age);
        let radius_km = match cap_km {
            Some(cap) => uncapped_radius_km.min(cap),
            None => uncapped_radius_km,
        };

        debug!(
            age,
            %gender,
            %bracket,
            walk_speed_kmh,
            transit_speed_kmh,
            mobility_ratio,
            ?cap_km,
            "estimated {:.3} km (uncapped {:.3} km)",
            radius_km,
            uncapped_radius_km
        );

        EstimateBreakdown {
            bracket,
            walk_speed_kmh,
            transit_speed_kmh,
            mobility_ratio,
            walk_km,
            bus_km,
            uncapped_radius_km,
            cap_km,
            radius_km,
        }
    }
}

/// Estimate with neutral correction factors.
pub fn estimate(age: u32, gender: Gender, duration_h: f64) -> EstimateResult {
    Estimator::default().estimate(age, gender, duration_h)
}

/// Hard ceiling on the search radius for young children and the elderly.
pub fn age_cap_km(age: u32) -> Option<f64> {
    if age <= YOUNG_CHILD_MAX_AGE || age >= ELDERLY_MIN_AGE {
        Some(VULNERABLE_CAP_KM)
    } else if age <= CHILD_MAX_AGE {
        Some(CHILD_CAP_KM)
    } else {
        None
    }
}

/// Round to 2 decimals from the exact binary value, ties away from zero.
///
/// `0.015` is stored just below the tie and rounds down; `0.125` is an exact
/// tie and rounds up.
pub fn round2(value: f64) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_string().parse().ok())
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn adult_male_two_hours() {
        let r = estimate(30, Gender::Male, 2.0);
        assert!(approx(r.walk, 8.8), "{:?}", r);
        assert!(approx(r.bus, 50.0), "{:?}", r);
        assert!(approx(r.radius, 50.0), "{:?}", r);
    }

    #[test]
    fn toddler_is_capped_at_six_km() {
        let b = Estimator::default().breakdown(4, Gender::Female, 10.0);
        assert!(approx(b.walk_km, 10.0));
        assert!(approx(b.bus_km, 10.0));
        assert!(approx(b.uncapped_radius_km, 10.0));
        assert_eq!(b.cap_km, Some(6.0));
        assert!(b.cap_applied());

        let r = b.result();
        assert!(approx(r.walk, 10.0));
        assert!(approx(r.bus, 10.0));
        assert!(approx(r.radius, 6.0));
    }

    #[test]
    fn cap_boundaries() {
        assert_eq!(age_cap_km(0), Some(6.0));
        assert_eq!(age_cap_km(5), Some(6.0));
        assert_eq!(age_cap_km(6), Some(10.0));
        assert_eq!(age_cap_km(10), Some(10.0));
        assert_eq!(age_cap_km(12), Some(10.0));
        assert_eq!(age_cap_km(13), None);
        assert_eq!(age_cap_km(30), None);
        assert_eq!(age_cap_km(70), None);
        assert_eq!(age_cap_km(71), Some(6.0));
    }

    #[test]
    fn capped_radius_never_exceeds_cap() {
        for (age, cap) in [(5, 6.0), (71, 6.0), (10, 10.0)] {
            for gender in Gender::ALL {
                let r = estimate(age, gender, 48.0);
                assert!(r.radius <= cap, "age {} {:?}", age, r);
            }
        }
        let r = estimate(30, Gender::Female, 48.0);
        assert!(approx(r.radius, 1200.0), "{:?}", r);
    }

    #[test]
    fn cap_is_never_a_floor() {
        let r = estimate(3, Gender::Male, 0.5);
        assert!(approx(r.radius, 0.5), "{:?}", r);
        assert!(r.radius < 6.0);
    }

    #[test]
    fn radius_is_max_of_modes_when_uncapped() {
        for age in [0, 6, 13, 18, 45, 60, 70, 71, 95] {
            for gender in Gender::ALL {
                for duration in [0.1, 0.75, 1.0, 3.5, 12.0] {
                    let b = Estimator::default().breakdown(age, gender, duration);
                    assert!(b.walk_km >= 0.0 && b.bus_km >= 0.0 && b.radius_km >= 0.0);
                    assert!(approx(b.uncapped_radius_km, b.walk_km.max(b.bus_km)));
                    assert!(b.radius_km <= b.uncapped_radius_km);
                    if let Some(cap) = b.cap_km {
                        assert!(b.radius_km <= cap);
                    } else {
                        assert!(approx(b.radius_km, b.uncapped_radius_km));
                    }
                }
            }
        }
    }

    #[test]
    fn distances_grow_with_duration() {
        for age in [2, 9, 15, 40, 65, 80] {
            for gender in Gender::ALL {
                let mut prev = estimate(age, gender, 0.05);
                for step in 1..200 {
                    let duration = 0.05 + step as f64 * 0.25;
                    let next = estimate(age, gender, duration);
                    assert!(next.walk >= prev.walk, "age {} d {}", age, duration);
                    assert!(next.bus >= prev.bus, "age {} d {}", age, duration);
                    prev = next;
                }
            }
        }
    }

    #[test]
    fn results_round_to_two_decimals() {
        // 25 km/h transit for 14/75 h is 4.666.. km
        let r = estimate(30, Gender::Female, 14.0 / 75.0);
        assert!(approx(r.bus, 4.67), "{:?}", r);
        for value in [r.walk, r.bus, r.radius] {
            assert!(approx(value * 100.0, (value * 100.0).round()), "{}", value);
        }
    }

    #[test]
    fn rounding_uses_exact_binary_value() {
        // 0.015 is stored as 0.01499999..., below the tie
        assert_eq!(round2(0.015), 0.01);
        // 0.125 and 0.375 are exact ties
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(1.005), 1.0);
        assert_eq!(round2(14.0 / 3.0), 4.67);
        assert_eq!(round2(1200.0), 1200.0);
        assert_eq!(round2(0.0), 0.0);
        assert!(round2(f64::NAN).is_nan());
    }

    #[test]
    fn short_toddler_estimate_rounds_down_below_tie() {
        let b = Estimator::default().breakdown(4, Gender::Female, 0.015);
        assert!((b.walk_km - 0.015).abs() < 1e-12, "{:?}", b);
        let r = b.result();
        assert_eq!(r.walk, 0.01, "{:?}", r);
        assert_eq!(r.bus, 0.01, "{:?}", r);
        assert_eq!(r.radius, 0.01, "{:?}", r);
    }

    #[test]
    fn rounding_happens_after_cap_and_max() {
        let b = Estimator::default().breakdown(30, Gender::Female, 14.0 / 75.0);
        assert!((b.bus_km - 14.0 / 3.0).abs() < 1e-12);
        assert!((b.radius_km - 14.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn correction_factors_scale_speeds_and_mobility() {
        let factors = CorrectionFactors {
            weather: 0.5,
            terrain: 0.8,
            health: 1.0,
            mental: 0.5,
        };
        let estimator = Estimator::new(factors).unwrap();
        let b = estimator.breakdown(30, Gender::Male, 2.0);
        assert!(approx(b.walk_speed_kmh, 5.5 * 0.4));
        assert!(approx(b.transit_speed_kmh, 25.0 * 0.4));
        assert!(approx(b.mobility_ratio, 0.4));
        assert!(approx(b.walk_km, 5.5 * 0.4 * 0.4 * 2.0));
        // mental state does not touch transit
        assert!(approx(b.bus_km, 25.0 * 0.4 * 2.0));
    }

    #[test]
    fn mobility_ratio_never_exceeds_one() {
        let estimator = Estimator::new(CorrectionFactors {
            mental: 3.0,
            ..CorrectionFactors::NEUTRAL
        })
        .unwrap();
        let b = estimator.breakdown(30, Gender::Male, 1.0);
        assert!(approx(b.mobility_ratio, 1.0));
    }

    #[test]
    fn invalid_factors_are_rejected() {
        let err = Estimator::new(CorrectionFactors {
            health: 0.0,
            ..CorrectionFactors::NEUTRAL
        })
        .unwrap_err();
        assert!(matches!(err, RadiusError::InvalidParameter(_)));
    }

    #[test]
    fn subject_pipeline_matches_direct_call() {
        let subject = Subject::parse("8", "M", "1.25").unwrap();
        let estimator = Estimator::default();
        assert_eq!(
            estimator.estimate_subject(&subject),
            estimator.estimate(8, Gender::Male, 1.25)
        );
    }
}
