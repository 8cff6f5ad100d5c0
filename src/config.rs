//! User settings: installed capacities, battery state, reserve and operating mode.
//!
//! Settings load from TOML and accept partial JSON updates. Both paths run
//! every key through the same per-key validation, so a bad value is reported
//! with its key and never half-applied.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::predictor::DaylightWindow;
use crate::sim::types::{BatteryState, EnergyState, OperatingMode};

/// Keys accepted by [`Settings::apply_updates`].
pub const KNOWN_KEYS: &[&str] = &[
    "solar_capacity_kw",
    "wind_capacity_kw",
    "battery_capacity_kwh",
    "battery_current_charge_kwh",
    "min_battery_reserve_user_percent",
    "allow_grid_charge",
    "operating_mode",
    "daylight_start_hour",
    "daylight_end_hour",
];

/// Household configuration used by status reports and simulations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Installed solar capacity (kW). Scales per-kW solar predictions.
    pub solar_capacity_kw: f64,
    /// Installed wind capacity (kW). Scales per-kW wind predictions.
    pub wind_capacity_kw: f64,
    /// Usable battery capacity (kWh).
    pub battery_capacity_kwh: f64,
    /// Battery charge at the start of a simulation (kWh).
    pub battery_current_charge_kwh: f64,
    /// Reserve the engine will not discharge below (percent of capacity).
    pub min_battery_reserve_user_percent: u8,
    /// Accepted and stored, but no decision reads it.
    pub allow_grid_charge: bool,
    /// Policy used by the decision engine.
    pub operating_mode: OperatingMode,
    /// First hour of the day with solar production (inclusive).
    pub daylight_start_hour: u32,
    /// Last hour of the day with solar production (inclusive).
    pub daylight_end_hour: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            solar_capacity_kw: 5.0,
            wind_capacity_kw: 2.0,
            battery_capacity_kwh: 10.0,
            battery_current_charge_kwh: 5.0,
            min_battery_reserve_user_percent: 20,
            allow_grid_charge: false,
            operating_mode: OperatingMode::SelfSufficiency,
            daylight_start_hour: 6,
            daylight_end_hour: 19,
        }
    }
}

/// Configuration error with the offending key and the violated constraint.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("config error: {field} - {message}")]
pub struct ConfigError {
    /// Settings key (e.g. `"min_battery_reserve_user_percent"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Outcome of a partial settings update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettingsUpdate {
    /// Keys whose values were written.
    pub applied: Vec<String>,
    /// Unrecognized keys, skipped.
    pub ignored: Vec<String>,
    /// Keys rejected by validation.
    pub errors: Vec<ConfigError>,
}

impl SettingsUpdate {
    /// True when nothing was written.
    pub fn is_rejected(&self) -> bool {
        self.applied.is_empty()
    }
}

impl Settings {
    /// Parses settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns every `ConfigError` found; an unreadable file yields a single error.
    pub fn from_toml_file(path: &Path) -> Result<Self, Vec<ConfigError>> {
        let content = fs::read_to_string(path).map_err(|e| {
            vec![ConfigError::new(
                "settings",
                format!("cannot read \"{}\": {e}", path.display()),
            )]
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses settings from a TOML string.
    ///
    /// Missing keys keep their defaults and unknown keys are skipped with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns every `ConfigError` found if the TOML is malformed or any
    /// value is out of range.
    pub fn from_toml_str(s: &str) -> Result<Self, Vec<ConfigError>> {
        let table: toml::Table =
            toml::from_str(s).map_err(|e| vec![ConfigError::new("toml", e.to_string())])?;
        let value = serde_json::to_value(table)
            .map_err(|e| vec![ConfigError::new("toml", e.to_string())])?;
        let Value::Object(map) = value else {
            return Err(vec![ConfigError::new("toml", "expected a table")]);
        };

        let mut settings = Self::default();
        let update = settings.apply_updates(&map);
        if update.errors.is_empty() {
            Ok(settings)
        } else {
            Err(update.errors)
        }
    }

    /// Writes the settings as pretty-printed TOML.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::new("settings", e.to_string()))?;
        fs::write(path, content).map_err(|e| {
            ConfigError::new(
                "settings",
                format!("cannot write \"{}\": {e}", path.display()),
            )
        })
    }

    /// Applies a partial update.
    ///
    /// Each key is validated on its own. Unknown keys are ignored with a
    /// warning. Nothing is written unless at least one key is valid.
    pub fn apply_updates(&mut self, updates: &Map<String, Value>) -> SettingsUpdate {
        let mut candidate = self.clone();
        let mut report = SettingsUpdate::default();

        for (key, value) in updates {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "ignoring unknown settings key");
                report.ignored.push(key.clone());
                continue;
            }
            match candidate.apply_key(key, value) {
                Ok(()) => report.applied.push(key.clone()),
                Err(err) => report.errors.push(err),
            }
        }

        if candidate.daylight_start_hour > candidate.daylight_end_hour {
            report.errors.push(ConfigError::new(
                "daylight_start_hour",
                format!(
                    "must be <= daylight_end_hour ({} > {})",
                    candidate.daylight_start_hour, candidate.daylight_end_hour
                ),
            ));
            candidate.daylight_start_hour = self.daylight_start_hour;
            candidate.daylight_end_hour = self.daylight_end_hour;
            report
                .applied
                .retain(|k| k != "daylight_start_hour" && k != "daylight_end_hour");
        }

        if !report.is_rejected() {
            if candidate.allow_grid_charge && !self.allow_grid_charge {
                tracing::warn!("allow_grid_charge is set but the decision engine never charges from the grid");
            }
            *self = candidate;
        }
        report
    }

    fn apply_key(&mut self, key: &str, value: &Value) -> Result<(), ConfigError> {
        match key {
            "solar_capacity_kw" => self.solar_capacity_kw = non_negative_number(key, value)?,
            "wind_capacity_kw" => self.wind_capacity_kw = non_negative_number(key, value)?,
            "battery_capacity_kwh" => self.battery_capacity_kwh = non_negative_number(key, value)?,
            "battery_current_charge_kwh" => {
                self.battery_current_charge_kwh = non_negative_number(key, value)?;
            }
            "min_battery_reserve_user_percent" => {
                let percent = bounded_integer(key, value, 100)?;
                self.min_battery_reserve_user_percent = percent as u8;
            }
            "allow_grid_charge" => {
                self.allow_grid_charge = value
                    .as_bool()
                    .ok_or_else(|| ConfigError::new(key, format!("must be a boolean, got {value}")))?;
            }
            "operating_mode" => {
                let name = value
                    .as_str()
                    .ok_or_else(|| ConfigError::new(key, format!("must be a string, got {value}")))?;
                self.operating_mode = name.parse().map_err(|e: String| ConfigError::new(key, e))?;
            }
            "daylight_start_hour" => self.daylight_start_hour = bounded_integer(key, value, 23)? as u32,
            "daylight_end_hour" => self.daylight_end_hour = bounded_integer(key, value, 23)? as u32,
            _ => return Err(ConfigError::new(key, "unknown key")),
        }
        Ok(())
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the settings are valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("solar_capacity_kw", self.solar_capacity_kw),
            ("wind_capacity_kw", self.wind_capacity_kw),
            ("battery_capacity_kwh", self.battery_capacity_kwh),
            ("battery_current_charge_kwh", self.battery_current_charge_kwh),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(ConfigError::new(field, "must be a finite number >= 0"));
            }
        }
        if self.min_battery_reserve_user_percent > 100 {
            errors.push(ConfigError::new(
                "min_battery_reserve_user_percent",
                "must be in [0, 100]",
            ));
        }
        if self.daylight_start_hour > 23 {
            errors.push(ConfigError::new("daylight_start_hour", "must be in [0, 23]"));
        }
        if self.daylight_end_hour > 23 {
            errors.push(ConfigError::new("daylight_end_hour", "must be in [0, 23]"));
        }
        if self.daylight_start_hour > self.daylight_end_hour {
            errors.push(ConfigError::new(
                "daylight_start_hour",
                "must be <= daylight_end_hour",
            ));
        }

        errors
    }

    /// Battery snapshot for a decision or the start of a simulation.
    pub fn battery_state(&self) -> BatteryState {
        BatteryState::new(
            self.battery_current_charge_kwh,
            self.battery_capacity_kwh,
            f64::from(self.min_battery_reserve_user_percent),
        )
    }

    /// Hours during which solar production is possible.
    pub fn daylight(&self) -> DaylightWindow {
        DaylightWindow::new(self.daylight_start_hour, self.daylight_end_hour)
    }

    /// Scales per-kW generation by the installed capacities and clamps negatives.
    ///
    /// Demand passes through unchanged.
    pub fn scale_prediction(&self, raw: EnergyState) -> EnergyState {
        let raw = raw.clamped();
        EnergyState {
            solar_kw: raw.solar_kw * self.solar_capacity_kw,
            wind_kw: raw.wind_kw * self.wind_capacity_kw,
            demand_kw: raw.demand_kw,
        }
        .clamped()
    }
}

fn non_negative_number(key: &str, value: &Value) -> Result<f64, ConfigError> {
    match value.as_f64() {
        Some(n) if n.is_finite() && n >= 0.0 => Ok(n),
        Some(n) => Err(ConfigError::new(key, format!("must be >= 0, got {n}"))),
        None => Err(ConfigError::new(key, format!("must be a number, got {value}"))),
    }
}

fn bounded_integer(key: &str, value: &Value, max: u64) -> Result<u64, ConfigError> {
    match value.as_u64() {
        Some(n) if n <= max => Ok(n),
        _ => Err(ConfigError::new(
            key,
            format!("must be an integer in [0, {max}], got {value}"),
        )),
    }
}
