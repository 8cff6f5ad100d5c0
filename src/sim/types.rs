//! Core simulation types: energy inputs, battery state, operating modes, flow
//! allocations, and the hourly trace produced by the simulator.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::pricing::PriceQuote;

/// Rounds `value` to `decimals` places (half away from zero).
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// Production and demand for one time step.
///
/// All quantities are non-negative power values (kW). Over a one-hour step
/// they double as energy (kWh).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyState {
    /// Solar production (kW).
    pub solar_kw: f64,
    /// Wind production (kW).
    pub wind_kw: f64,
    /// Household demand (kW).
    pub demand_kw: f64,
}

impl EnergyState {
    /// Creates an energy state from raw values.
    pub fn new(solar_kw: f64, wind_kw: f64, demand_kw: f64) -> Self {
        Self {
            solar_kw,
            wind_kw,
            demand_kw,
        }
    }

    /// All-zero state, used when a predictor is unavailable.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Combined solar and wind production (kW).
    pub fn total_generation_kw(&self) -> f64 {
        self.solar_kw + self.wind_kw
    }

    /// Returns a copy with every negative or non-finite value replaced by 0.
    pub fn clamped(self) -> Self {
        Self {
            solar_kw: non_negative(self.solar_kw),
            wind_kw: non_negative(self.wind_kw),
            demand_kw: non_negative(self.demand_kw),
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Battery charge, capacity and the user-configured reserve.
///
/// Construct with [`BatteryState::new`], which enforces
/// `0 <= charge <= capacity` and `0 <= reserve <= 100`.
///
/// # Examples
///
/// ```
/// use synapse_home::sim::types::BatteryState;
///
/// let battery = BatteryState::new(5.0, 10.0, 20.0);
/// assert_eq!(battery.min_reserve_kwh(), 2.0);
/// assert_eq!(battery.headroom_kwh(), 5.0);
/// assert_eq!(battery.dischargeable_kwh(), 3.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatteryState {
    /// Stored energy (kWh).
    pub charge_kwh: f64,
    /// Usable capacity (kWh).
    pub capacity_kwh: f64,
    /// Minimum reserve as a percentage of capacity (0-100).
    pub min_reserve_percent: f64,
}

impl BatteryState {
    /// Creates a battery state, clamping out-of-range values into the valid domain.
    pub fn new(charge_kwh: f64, capacity_kwh: f64, min_reserve_percent: f64) -> Self {
        let capacity_kwh = non_negative(capacity_kwh);
        let clamped_charge = non_negative(charge_kwh).min(capacity_kwh);
        if clamped_charge != charge_kwh {
            tracing::warn!(
                charge_kwh,
                capacity_kwh,
                "battery charge outside [0, capacity]; clamped to {clamped_charge:.2} kWh"
            );
        }
        let reserve = if min_reserve_percent.is_finite() {
            min_reserve_percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            charge_kwh: clamped_charge,
            capacity_kwh,
            min_reserve_percent: reserve,
        }
    }

    /// Reserve floor in kWh: `capacity * reserve_percent / 100`.
    pub fn min_reserve_kwh(&self) -> f64 {
        self.capacity_kwh * self.min_reserve_percent / 100.0
    }

    /// Energy that can still be stored (kWh).
    pub fn headroom_kwh(&self) -> f64 {
        (self.capacity_kwh - self.charge_kwh).max(0.0)
    }

    /// Energy available above the reserve floor (kWh, never negative).
    pub fn dischargeable_kwh(&self) -> f64 {
        (self.charge_kwh - self.min_reserve_kwh()).max(0.0)
    }

    /// Applies one step's battery flows and clamps the charge to `[0, capacity]`.
    pub fn apply(&mut self, flow: &FlowAllocation) {
        let next = self.charge_kwh + flow.power_to_battery - flow.power_from_battery;
        self.charge_kwh = next.clamp(0.0, self.capacity_kwh);
    }
}

/// User-selected policy that orders flow priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OperatingMode {
    /// Minimize grid cost using time-of-use prices.
    CostOptimization,
    /// Minimize grid interaction.
    #[default]
    SelfSufficiency,
    /// Prefer storing and using renewable energy.
    Environmental,
    /// Fallback policy for unrecognized modes.
    Unknown,
}

impl OperatingMode {
    /// All modes in display order.
    pub const ALL: [OperatingMode; 4] = [
        Self::CostOptimization,
        Self::SelfSufficiency,
        Self::Environmental,
        Self::Unknown,
    ];

    /// Display name used in settings files and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CostOptimization => "Cost Optimization",
            Self::SelfSufficiency => "Self-Sufficiency",
            Self::Environmental => "Environmental",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "cost_optimization" => Ok(Self::CostOptimization),
            "self_sufficiency" => Ok(Self::SelfSufficiency),
            "environmental" => Ok(Self::Environmental),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!(
                "must be one of \"Cost Optimization\", \"Self-Sufficiency\", \
                 \"Environmental\", \"Unknown\"; got \"{s}\""
            )),
        }
    }
}

impl TryFrom<String> for OperatingMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OperatingMode> for String {
    fn from(mode: OperatingMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Recommended action label attached to every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    #[default]
    NoAction,
    UseOwnGeneration,
    ChargeBattery,
    ExportSurplus,
    DischargeBattery,
    ImportFromGrid,
    ExportToGrid,
    ChargeBatteryLowGridPrice,
    DischargeBatteryHighGridPrice,
    UseOwnGenerationRenewable,
    ChargeBatteryRenewablePriority,
    ExportRenewableSurplus,
    DischargeBatteryRenewable,
    ImportFromGridLastResort,
    DefaultSurplusHandling,
    DefaultDeficitHandling,
}

impl Action {
    /// Wire label, e.g. `"CHARGE_BATTERY"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAction => "NO_ACTION",
            Self::UseOwnGeneration => "USE_OWN_GENERATION",
            Self::ChargeBattery => "CHARGE_BATTERY",
            Self::ExportSurplus => "EXPORT_SURPLUS",
            Self::DischargeBattery => "DISCHARGE_BATTERY",
            Self::ImportFromGrid => "IMPORT_FROM_GRID",
            Self::ExportToGrid => "EXPORT_TO_GRID",
            Self::ChargeBatteryLowGridPrice => "CHARGE_BATTERY_LOW_GRID_PRICE",
            Self::DischargeBatteryHighGridPrice => "DISCHARGE_BATTERY_HIGH_GRID_PRICE",
            Self::UseOwnGenerationRenewable => "USE_OWN_GENERATION_RENEWABLE",
            Self::ChargeBatteryRenewablePriority => "CHARGE_BATTERY_RENEWABLE_PRIORITY",
            Self::ExportRenewableSurplus => "EXPORT_RENEWABLE_SURPLUS",
            Self::DischargeBatteryRenewable => "DISCHARGE_BATTERY_RENEWABLE",
            Self::ImportFromGridLastResort => "IMPORT_FROM_GRID_LAST_RESORT",
            Self::DefaultSurplusHandling => "DEFAULT_SURPLUS_HANDLING",
            Self::DefaultDeficitHandling => "DEFAULT_DEFICIT_HANDLING",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision engine output for one step.
///
/// Flow values are rounded to 2 decimals and never negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowAllocation {
    /// Power delivered to household loads (kW).
    pub power_to_home: f64,
    /// Power stored in the battery (kW).
    pub power_to_battery: f64,
    /// Power drawn from the battery (kW).
    pub power_from_battery: f64,
    /// Power imported from the grid (kW).
    pub power_from_grid: f64,
    /// Power exported to the grid (kW).
    pub power_to_grid: f64,
    /// First action that took effect during the decision.
    pub recommended_action: Action,
    /// Mode the decision was made under.
    pub current_operating_mode: OperatingMode,
    /// Reserve floor used for the decision (kWh).
    pub actual_min_reserve_kwh: f64,
}

impl fmt::Display for FlowAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "home={:.2}  bat(+{:.2}/-{:.2})  grid(+{:.2}/-{:.2})  {}",
            self.power_to_home,
            self.power_to_battery,
            self.power_from_battery,
            self.power_from_grid,
            self.power_to_grid,
            self.recommended_action,
        )
    }
}

/// Complete record of one simulated hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyResult {
    /// Step index within the horizon (0-based).
    pub hour_index: usize,
    /// Wall-clock start of the hour.
    pub timestamp: NaiveDateTime,
    /// Hour of day (0-23) used for the price lookup.
    pub hour: u32,
    /// Predicted solar energy after capacity scaling (kWh).
    pub predicted_solar_kwh: f64,
    /// Predicted wind energy after capacity scaling (kWh).
    pub predicted_wind_kwh: f64,
    /// Predicted household demand (kWh).
    pub predicted_demand_kwh: f64,
    /// Buying price for this hour ($/kWh).
    pub buying_price_per_kwh: f64,
    /// Selling price for this hour ($/kWh).
    pub selling_price_per_kwh: f64,
    /// Decision engine output.
    pub decision: FlowAllocation,
    /// Battery charge after applying this hour's flows (kWh).
    pub simulated_battery_charge_kwh_end_of_hour: f64,
    /// `import * buy - export * sell` for this hour ($, negative = revenue).
    pub hourly_net_cost: f64,
}

impl HourlyResult {
    /// Price quote that applied to this hour.
    pub fn prices(&self) -> PriceQuote {
        PriceQuote {
            buying_price_per_kwh: self.buying_price_per_kwh,
            selling_price_per_kwh: self.selling_price_per_kwh,
        }
    }
}

impl fmt::Display for HourlyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "h={:>2} {} | solar={:>5.2} wind={:>5.2} demand={:>5.2} kWh | \
             buy={:.2} sell={:.2} | {} | bat={:>5.2} kWh  cost={:>7.4}",
            self.hour_index,
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.predicted_solar_kwh,
            self.predicted_wind_kwh,
            self.predicted_demand_kwh,
            self.buying_price_per_kwh,
            self.selling_price_per_kwh,
            self.decision,
            self.simulated_battery_charge_kwh_end_of_hour,
            self.hourly_net_cost,
        )
    }
}

/// Running totals at the end of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    /// Total grid import (kWh).
    pub total_grid_import_kwh: f64,
    /// Total grid export (kWh).
    pub total_grid_export_kwh: f64,
    /// Net grid cost ($, negative = net revenue).
    pub net_grid_cost: f64,
    /// Battery charge after the last hour (kWh).
    pub final_battery_charge_kwh: f64,
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Simulation Summary ---")?;
        writeln!(
            f,
            "Total grid import:     {:.2} kWh",
            self.total_grid_import_kwh
        )?;
        writeln!(
            f,
            "Total grid export:     {:.2} kWh",
            self.total_grid_export_kwh
        )?;
        writeln!(f, "Net grid cost:         {:.4} $", self.net_grid_cost)?;
        write!(
            f,
            "Final battery charge:  {:.2} kWh",
            self.final_battery_charge_kwh
        )
    }
}

/// Ordered hourly records plus totals for one simulation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationTrace {
    /// One entry per simulated hour, in order.
    pub hourly_results: Vec<HourlyResult>,
    /// Aggregate totals.
    pub summary: SimulationSummary,
}
