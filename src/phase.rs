//! Lunar phase from time alone
//!
//! The phase is the fraction of the mean synodic month elapsed since a
//! reference new moon: 0 is new, 0.5 is full. It needs no ephemeris and is
//! therefore always available, even in degraded mode.

use serde::Serialize;

use crate::utils::config::{REFERENCE_NEW_MOON_JD, SYNODIC_MONTH_DAYS};
use crate::utils::time_utils::AstronomicalTime;

/// Phase value in [0, 1) for an instant.
pub fn compute_phase(time: &AstronomicalTime) -> f64 {
    let whole = REFERENCE_NEW_MOON_JD.trunc();
    let elapsed = (time.day() - whole as i64) as f64 + time.fraction()
        - (REFERENCE_NEW_MOON_JD - whole);
    let phase = (elapsed / SYNODIC_MONTH_DAYS).rem_euclid(1.0);
    if phase >= 1.0 {
        0.0
    } else {
        phase
    }
}

/// Fraction of the lunar disk illuminated, from the phase angle.
pub fn illuminated_fraction(phase: f64) -> f64 {
    (1.0 - (std::f64::consts::TAU * phase).cos()) / 2.0
}

/// Eight named phase buckets, each centred on a multiple of 1/8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    NewMoon,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    FullMoon,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl PhaseName {
    /// Bucket for a phase value; upper bucket edges are inclusive.
    pub fn from_phase(phase: f64) -> Self {
        match phase {
            p if p <= 1.0 / 16.0 => Self::NewMoon,
            p if p <= 3.0 / 16.0 => Self::WaxingCrescent,
            p if p <= 5.0 / 16.0 => Self::FirstQuarter,
            p if p <= 7.0 / 16.0 => Self::WaxingGibbous,
            p if p <= 9.0 / 16.0 => Self::FullMoon,
            p if p <= 11.0 / 16.0 => Self::WaningGibbous,
            p if p <= 13.0 / 16.0 => Self::LastQuarter,
            p if p <= 15.0 / 16.0 => Self::WaningCrescent,
            _ => Self::NewMoon,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NewMoon => "New Moon",
            Self::WaxingCrescent => "Waxing Crescent",
            Self::FirstQuarter => "First Quarter",
            Self::WaxingGibbous => "Waxing Gibbous",
            Self::FullMoon => "Full Moon",
            Self::WaningGibbous => "Waning Gibbous",
            Self::LastQuarter => "Last Quarter",
            Self::WaningCrescent => "Waning Crescent",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::NewMoon => "🌑",
            Self::WaxingCrescent => "🌒",
            Self::FirstQuarter => "🌓",
            Self::WaxingGibbous => "🌔",
            Self::FullMoon => "🌕",
            Self::WaningGibbous => "🌖",
            Self::LastQuarter => "🌗",
            Self::WaningCrescent => "🌘",
        }
    }
}

/// Phase value with its derived presentation quantities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoonPhase {
    pub value: f64,
    pub name: PhaseName,
    pub illumination: f64,
}

impl MoonPhase {
    pub fn at(time: &AstronomicalTime) -> Self {
        let value = compute_phase(time);
        Self {
            value,
            name: PhaseName::from_phase(value),
            illumination: illuminated_fraction(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_epoch_is_new() {
        let t = AstronomicalTime::from_jd(REFERENCE_NEW_MOON_JD);
        assert!(compute_phase(&t) < 1e-9 || compute_phase(&t) > 1.0 - 1e-9);
    }

    #[test]
    fn half_period_is_full() {
        let t = AstronomicalTime::from_jd(REFERENCE_NEW_MOON_JD + SYNODIC_MONTH_DAYS / 2.0);
        assert!((compute_phase(&t) - 0.5).abs() < 1e-9);
        assert_eq!(MoonPhase::at(&t).name, PhaseName::FullMoon);
        assert!((MoonPhase::at(&t).illumination - 1.0).abs() < 1e-9);
    }

    #[test]
    fn before_epoch_wraps_positive() {
        let t = AstronomicalTime::from_jd(REFERENCE_NEW_MOON_JD - SYNODIC_MONTH_DAYS / 4.0);
        assert!((compute_phase(&t) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn bucket_edges() {
        assert_eq!(PhaseName::from_phase(0.0), PhaseName::NewMoon);
        assert_eq!(PhaseName::from_phase(0.0625), PhaseName::NewMoon);
        assert_eq!(PhaseName::from_phase(0.07), PhaseName::WaxingCrescent);
        assert_eq!(PhaseName::from_phase(0.25), PhaseName::FirstQuarter);
        assert_eq!(PhaseName::from_phase(0.75), PhaseName::LastQuarter);
        assert_eq!(PhaseName::from_phase(0.9375), PhaseName::WaningCrescent);
        assert_eq!(PhaseName::from_phase(0.95), PhaseName::NewMoon);
    }
}
