//! Hourly simulator that threads battery state through the decision engine.

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::config::Settings;
use crate::predictor::Predictor;
use crate::pricing::PriceTable;

use super::decision::decide;
use super::power_balance::{BALANCE_TOLERANCE_KW, balance_residual};
use super::types::{
    BatteryState, EnergyState, HourlyResult, SimulationSummary, SimulationTrace, round_to,
};

/// Number of hourly steps in one simulation.
pub const HORIZON_HOURS: usize = 24;

/// Truncates a timestamp to the start of its hour.
pub fn start_of_hour(at: NaiveDateTime) -> NaiveDateTime {
    at.date().and_hms_opt(at.hour(), 0, 0).unwrap_or(at)
}

/// Parses a `YYYY-MM-DDTHH:MM` timestamp.
///
/// # Errors
///
/// Returns a `chrono::ParseError` if `s` is not in that format.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%dT%H:%M")
}

/// Current local time truncated to the hour.
pub fn current_hour() -> NaiveDateTime {
    start_of_hour(chrono::Local::now().naive_local())
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    import_kwh: f64,
    export_kwh: f64,
    net_cost: f64,
}

/// Stepping simulator over a fixed 24-hour horizon.
///
/// Owns its predictor and a battery snapshot; the price table and settings
/// are borrowed. Each [`Simulator::step`] makes one decision, applies the
/// battery flows and advances one hour.
pub struct Simulator<'a, P: Predictor> {
    predictor: P,
    prices: &'a PriceTable,
    settings: &'a Settings,
    battery: BatteryState,
    start: NaiveDateTime,
    next_index: usize,
    totals: Totals,
}

impl<'a, P: Predictor> Simulator<'a, P> {
    /// Creates a simulator starting at `start`.
    ///
    /// # Arguments
    ///
    /// * `start` - Timestamp of the first simulated hour
    /// * `predictor` - Source of per-kW generation and demand predictions
    /// * `prices` - TOU price table
    /// * `battery` - Initial battery state
    /// * `settings` - Installed capacities and operating mode
    pub fn new(
        start: NaiveDateTime,
        predictor: P,
        prices: &'a PriceTable,
        battery: BatteryState,
        settings: &'a Settings,
    ) -> Self {
        Self {
            predictor,
            prices,
            settings,
            battery,
            start,
            next_index: 0,
            totals: Totals::default(),
        }
    }

    /// Current battery state.
    pub fn battery(&self) -> &BatteryState {
        &self.battery
    }

    /// Number of steps taken so far.
    pub fn steps_taken(&self) -> usize {
        self.next_index
    }

    /// Simulates the next hour and returns its record.
    pub fn step(&mut self) -> HourlyResult {
        let hour_index = self.next_index;
        let timestamp = self.start + Duration::hours(hour_index as i64);
        let hour = timestamp.hour();

        let raw = match self.predictor.predict(timestamp) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(%timestamp, %err, "prediction unavailable; using zeros");
                EnergyState::zero()
            }
        };
        let energy = round_energy(self.settings.scale_prediction(raw));
        let quote = self.prices.lookup(hour);

        let decision = decide(&energy, &self.battery, &quote, self.settings.operating_mode);

        let residual = balance_residual(&energy, &decision);
        if residual.abs() > BALANCE_TOLERANCE_KW + 1e-9 {
            tracing::warn!(hour_index, residual, "decision does not balance");
        }

        self.battery.apply(&decision);

        let cost = decision.power_from_grid * quote.buying_price_per_kwh
            - decision.power_to_grid * quote.selling_price_per_kwh;
        self.totals.import_kwh += decision.power_from_grid;
        self.totals.export_kwh += decision.power_to_grid;
        self.totals.net_cost += cost;
        self.next_index += 1;

        tracing::debug!(
            hour_index,
            hour,
            action = %decision.recommended_action,
            battery_kwh = self.battery.charge_kwh,
            cost,
            "simulated hour"
        );

        HourlyResult {
            hour_index,
            timestamp,
            hour,
            predicted_solar_kwh: energy.solar_kw,
            predicted_wind_kwh: energy.wind_kw,
            predicted_demand_kwh: energy.demand_kw,
            buying_price_per_kwh: quote.buying_price_per_kwh,
            selling_price_per_kwh: quote.selling_price_per_kwh,
            decision,
            simulated_battery_charge_kwh_end_of_hour: round_to(self.battery.charge_kwh, 2),
            hourly_net_cost: round_to(cost, 4),
        }
    }

    /// Totals accumulated so far.
    pub fn summary(&self) -> SimulationSummary {
        SimulationSummary {
            total_grid_import_kwh: round_to(self.totals.import_kwh, 2),
            total_grid_export_kwh: round_to(self.totals.export_kwh, 2),
            net_grid_cost: round_to(self.totals.net_cost, 4),
            final_battery_charge_kwh: round_to(self.battery.charge_kwh, 2),
        }
    }

    /// Runs the remaining steps of the horizon and returns the full trace.
    pub fn run(mut self) -> SimulationTrace {
        let mut hourly_results = Vec::with_capacity(HORIZON_HOURS);
        while self.next_index < HORIZON_HOURS {
            hourly_results.push(self.step());
        }
        let summary = self.summary();
        tracing::info!(
            start = %self.start,
            import_kwh = summary.total_grid_import_kwh,
            export_kwh = summary.total_grid_export_kwh,
            net_cost = summary.net_grid_cost,
            final_battery_kwh = summary.final_battery_charge_kwh,
            "simulation complete"
        );
        SimulationTrace {
            hourly_results,
            summary,
        }
    }
}

/// Simulates 24 hours from `start` and returns the trace.
///
/// Predictor failures become all-zero hours and never abort the run.
pub fn simulate<P: Predictor>(
    start: NaiveDateTime,
    predictor: P,
    prices: &PriceTable,
    battery: BatteryState,
    settings: &Settings,
) -> SimulationTrace {
    Simulator::new(start, predictor, prices, battery, settings).run()
}

/// Rounds predictions to the 2-decimal grid the decision engine reports on.
fn round_energy(energy: EnergyState) -> EnergyState {
    EnergyState {
        solar_kw: round_to(energy.solar_kw, 2),
        wind_kw: round_to(energy.wind_kw, 2),
        demand_kw: round_to(energy.demand_kw, 2),
    }
    .clamped()
}
