//! Production and demand predictors.
//!
//! A [`Predictor`] maps a timestamp to solar, wind and demand power. Solar and
//! wind are per installed kW; the caller scales them by the configured
//! capacities (see [`crate::config::Settings::scale_prediction`]). The
//! daylight rule is applied by wrapping a predictor in [`DaylightMasked`].

use std::f64::consts::PI;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Timelike};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Deserialize;
use thiserror::Error;

use crate::sim::types::EnergyState;

/// Why a prediction could not be produced.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("cannot read profile \"{}\": {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("invalid profile: {0}")]
    Csv(#[from] csv::Error),
    #[error("profile hour {0} is out of range (expected 0-23)")]
    HourOutOfRange(u32),
    #[error("no prediction available for hour {0}")]
    MissingHour(u32),
    #[error("predictor unavailable: {0}")]
    Unavailable(String),
}

/// Source of per-hour production and demand predictions.
pub trait Predictor {
    /// Predicts `(solar, wind, demand)` for the hour starting at `at`.
    ///
    /// # Errors
    ///
    /// Returns a `PredictorError` when no prediction is available; callers
    /// substitute an all-zero state.
    fn predict(&self, at: NaiveDateTime) -> Result<EnergyState, PredictorError>;
}

impl<P: Predictor + ?Sized> Predictor for &P {
    fn predict(&self, at: NaiveDateTime) -> Result<EnergyState, PredictorError> {
        (**self).predict(at)
    }
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn predict(&self, at: NaiveDateTime) -> Result<EnergyState, PredictorError> {
        (**self).predict(at)
    }
}

/// Inclusive range of hours with solar production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaylightWindow {
    /// First daylight hour (inclusive).
    pub start_hour: u32,
    /// Last daylight hour (inclusive).
    pub end_hour: u32,
}

impl DaylightWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// Whether `hour` is inside the window.
    pub fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour <= self.end_hour
    }
}

impl Default for DaylightWindow {
    fn default() -> Self {
        Self::new(6, 19)
    }
}

/// Zeroes solar predictions outside a daylight window.
#[derive(Debug, Clone)]
pub struct DaylightMasked<P> {
    inner: P,
    window: DaylightWindow,
}

impl<P: Predictor> DaylightMasked<P> {
    pub fn new(inner: P, window: DaylightWindow) -> Self {
        Self { inner, window }
    }

    /// The wrapped predictor.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: Predictor> Predictor for DaylightMasked<P> {
    fn predict(&self, at: NaiveDateTime) -> Result<EnergyState, PredictorError> {
        let mut state = self.inner.predict(at)?;
        if !self.window.contains(at.hour()) {
            state.solar_kw = 0.0;
        }
        Ok(state)
    }
}

/// Returns the same state for every hour.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConstantPredictor(pub EnergyState);

impl ConstantPredictor {
    pub fn new(solar_kw: f64, wind_kw: f64, demand_kw: f64) -> Self {
        Self(EnergyState::new(solar_kw, wind_kw, demand_kw))
    }
}

impl Predictor for ConstantPredictor {
    fn predict(&self, _at: NaiveDateTime) -> Result<EnergyState, PredictorError> {
        Ok(self.0)
    }
}

/// Gaussian noise via the Box-Muller transform.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    z0 * std_dev
}

/// Deterministic household model.
///
/// Solar follows a half-cosine between sunrise and sunset with a peak of
/// 1 kW per installed kW. Wind oscillates ±50 % around its mean over the
/// day. Demand has a morning and an evening peak on top of a base load.
/// Each value gets multiplicative Gaussian noise drawn from an RNG seeded
/// with `(seed, timestamp)`, so the same hour always predicts the same
/// values.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticPredictor {
    /// Random seed.
    pub seed: u64,
    /// Hour of the solar ramp-up (fractional hours).
    pub sunrise_hour: f64,
    /// Hour solar returns to zero (fractional hours).
    pub sunset_hour: f64,
    /// Mean wind output per installed kW.
    pub wind_mean_per_kw: f64,
    /// Always-on household load (kW).
    pub base_demand_kw: f64,
    /// Extra load at the morning peak (kW).
    pub morning_peak_kw: f64,
    /// Extra load at the evening peak (kW).
    pub evening_peak_kw: f64,
    /// Relative noise standard deviation (0.05 = ±5 %).
    pub noise_std: f64,
}

impl SyntheticPredictor {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            sunrise_hour: 6.0,
            sunset_hour: 20.0,
            wind_mean_per_kw: 0.3,
            base_demand_kw: 0.6,
            morning_peak_kw: 0.9,
            evening_peak_kw: 1.6,
            noise_std: 0.05,
        }
    }

    fn solar_fraction(&self, hour: f64) -> f64 {
        let span = self.sunset_hour - self.sunrise_hour;
        if span <= 0.0 || hour <= self.sunrise_hour || hour >= self.sunset_hour {
            return 0.0;
        }
        let x = (hour - self.sunrise_hour) / span;
        0.5 * (1.0 - (2.0 * PI * x).cos())
    }

    fn wind_per_kw(&self, hour: f64) -> f64 {
        // Windier overnight, calmest mid-afternoon.
        self.wind_mean_per_kw * (1.0 + 0.5 * (2.0 * PI * (hour + 3.0) / 24.0).cos())
    }

    fn demand_kw(&self, hour: f64) -> f64 {
        let bump = |center: f64, width: f64| (-((hour - center) / width).powi(2)).exp();
        self.base_demand_kw
            + self.morning_peak_kw * bump(7.5, 1.5)
            + self.evening_peak_kw * bump(19.0, 2.0)
    }

    fn rng_for(&self, at: NaiveDateTime) -> StdRng {
        let stamp = at.and_utc().timestamp() as u64;
        StdRng::seed_from_u64(self.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ stamp)
    }
}

impl Default for SyntheticPredictor {
    fn default() -> Self {
        Self::new(42)
    }
}

impl Predictor for SyntheticPredictor {
    fn predict(&self, at: NaiveDateTime) -> Result<EnergyState, PredictorError> {
        let hour = f64::from(at.hour()) + f64::from(at.minute()) / 60.0;
        let mut rng = self.rng_for(at);
        let mut noisy = |value: f64| value * (1.0 + gaussian_noise(&mut rng, self.noise_std));

        Ok(EnergyState {
            solar_kw: noisy(self.solar_fraction(hour)),
            wind_kw: noisy(self.wind_per_kw(hour)),
            demand_kw: noisy(self.demand_kw(hour)),
        }
        .clamped())
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    hour: u32,
    solar_kw: f64,
    wind_kw: f64,
    demand_kw: f64,
}

/// Hour-of-day profile read from CSV (`hour,solar_kw,wind_kw,demand_kw`).
///
/// Later rows for the same hour replace earlier ones. Hours without a row
/// fail to predict.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePredictor {
    hours: [Option<EnergyState>; 24],
}

impl ProfilePredictor {
    /// Reads a profile from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns a `PredictorError` if the file cannot be read, a row is
    /// malformed, or an hour is outside 0-23.
    pub fn from_csv_path(path: &Path) -> Result<Self, PredictorError> {
        let reader = csv::Reader::from_path(path).map_err(|source| PredictorError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv(reader)
    }

    /// Reads a profile from any CSV source with a header row.
    ///
    /// # Errors
    ///
    /// Returns a `PredictorError` if a row is malformed or an hour is outside 0-23.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PredictorError> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, PredictorError> {
        let mut hours = [None; 24];
        for row in reader.deserialize() {
            let row: ProfileRow = row?;
            let slot = hours
                .get_mut(row.hour as usize)
                .ok_or(PredictorError::HourOutOfRange(row.hour))?;
            *slot = Some(EnergyState::new(row.solar_kw, row.wind_kw, row.demand_kw));
        }
        Ok(Self { hours })
    }

    /// Hours with no profile row.
    pub fn missing_hours(&self) -> Vec<u32> {
        (0u32..24)
            .filter(|&h| self.hours[h as usize].is_none())
            .collect()
    }
}

impl Predictor for ProfilePredictor {
    fn predict(&self, at: NaiveDateTime) -> Result<EnergyState, PredictorError> {
        let hour = at.hour();
        self.hours
            .get(hour as usize)
            .copied()
            .flatten()
            .ok_or(PredictorError::MissingHour(hour))
    }
}

/// Predictor chosen at startup.
///
/// Enum dispatch keeps callers free of trait objects.
#[derive(Debug, Clone)]
pub enum HouseholdModel {
    /// Built-in synthetic model.
    Synthetic(SyntheticPredictor),
    /// CSV hour-of-day profile.
    Profile(ProfilePredictor),
}

impl Predictor for HouseholdModel {
    fn predict(&self, at: NaiveDateTime) -> Result<EnergyState, PredictorError> {
        match self {
            Self::Synthetic(p) => p.predict(at),
            Self::Profile(p) => p.predict(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap_or_default()
    }

    #[test]
    fn daylight_window_is_inclusive() {
        let window = DaylightWindow::default();
        assert!(!window.contains(5));
        assert!(window.contains(6));
        assert!(window.contains(19));
        assert!(!window.contains(20));
    }

    #[test]
    fn masked_predictor_zeroes_night_solar_only() {
        let masked = DaylightMasked::new(ConstantPredictor::new(1.0, 0.5, 2.0), DaylightWindow::default());
        let night = masked.predict(at(2)).ok();
        assert_eq!(night, Some(EnergyState::new(0.0, 0.5, 2.0)));
        let day = masked.predict(at(12)).ok();
        assert_eq!(day, Some(EnergyState::new(1.0, 0.5, 2.0)));
    }

    #[test]
    fn synthetic_is_deterministic_per_timestamp() {
        let p = SyntheticPredictor::new(7);
        for h in 0..24 {
            assert_eq!(p.predict(at(h)).ok(), p.predict(at(h)).ok());
        }
    }

    #[test]
    fn synthetic_seeds_differ() {
        let a = SyntheticPredictor::new(1);
        let b = SyntheticPredictor::new(2);
        let differs = (0..24).any(|h| a.predict(at(h)).ok() != b.predict(at(h)).ok());
        assert!(differs);
    }

    #[test]
    fn synthetic_solar_follows_sun() {
        let p = SyntheticPredictor {
            noise_std: 0.0,
            ..SyntheticPredictor::default()
        };
        let solar = |h| p.predict(at(h)).map(|e| e.solar_kw).unwrap_or(-1.0);
        assert_eq!(solar(0), 0.0);
        assert_eq!(solar(6), 0.0);
        assert_eq!(solar(22), 0.0);
        assert!((solar(13) - 1.0).abs() < 1e-9);
        assert!((solar(10) - solar(16)).abs() < 1e-9);
    }

    #[test]
    fn synthetic_values_are_non_negative() {
        let p = SyntheticPredictor {
            noise_std: 0.5,
            ..SyntheticPredictor::new(99)
        };
        for h in 0..24 {
            let e = p.predict(at(h)).unwrap_or_default();
            assert!(e.solar_kw >= 0.0 && e.wind_kw >= 0.0 && e.demand_kw >= 0.0);
        }
    }

    #[test]
    fn synthetic_demand_peaks_in_evening() {
        let p = SyntheticPredictor {
            noise_std: 0.0,
            ..SyntheticPredictor::default()
        };
        let demand = |h| p.predict(at(h)).map(|e| e.demand_kw).unwrap_or(0.0);
        assert!(demand(19) > demand(3));
        assert!(demand(19) > demand(13));
        assert!(demand(8) > demand(3));
    }

    #[test]
    fn profile_reads_rows_by_hour() {
        let csv = "hour,solar_kw,wind_kw,demand_kw\n0,0.0,0.4,0.8\n12,0.9,0.2,1.1\n";
        let profile = ProfilePredictor::from_reader(csv.as_bytes());
        assert!(profile.is_ok(), "profile should parse: {:?}", profile.err());
        let Ok(profile) = profile else { return };
        assert_eq!(profile.predict(at(12)).ok(), Some(EnergyState::new(0.9, 0.2, 1.1)));
        assert!(matches!(
            profile.predict(at(5)),
            Err(PredictorError::MissingHour(5))
        ));
        assert_eq!(profile.missing_hours().len(), 22);
    }

    #[test]
    fn profile_rejects_hour_out_of_range() {
        let csv = "hour,solar_kw,wind_kw,demand_kw\n24,0.0,0.0,1.0\n";
        assert!(matches!(
            ProfilePredictor::from_reader(csv.as_bytes()),
            Err(PredictorError::HourOutOfRange(24))
        ));
    }

    #[test]
    fn profile_rejects_malformed_row() {
        let csv = "hour,solar_kw,wind_kw,demand_kw\n3,abc,0.0,1.0\n";
        assert!(matches!(
            ProfilePredictor::from_reader(csv.as_bytes()),
            Err(PredictorError::Csv(_))
        ));
    }
}
