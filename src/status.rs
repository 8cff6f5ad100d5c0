//! Point-in-time status: one prediction, one price lookup, one decision.

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

use crate::config::Settings;
use crate::predictor::{DaylightMasked, Predictor};
use crate::pricing::{PriceQuote, PriceTable};
use crate::sim::decision::decide;
use crate::sim::types::{EnergyState, FlowAllocation, round_to};

/// Instantaneous production and demand (kW, 2 decimals).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveData {
    pub solar: f64,
    pub wind: f64,
    pub home_demand: f64,
}

/// Headline indicators for the current hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusKpi {
    /// Solar plus wind (kW).
    pub total_production: f64,
    /// Household demand (kW).
    pub total_consumption: f64,
    /// Percent of demand met by grid import; `None` when demand is zero.
    pub grid_dependence: Option<f64>,
    /// Percent of demand met without the grid.
    pub self_sufficiency: f64,
}

impl StatusKpi {
    /// Derives the indicators from a decision and the inputs it was made from.
    pub fn from_decision(energy: &EnergyState, flow: &FlowAllocation) -> Self {
        let generation = energy.total_generation_kw();
        let demand = energy.demand_kw;
        let import = flow.power_from_grid;

        let grid_dependence = (demand > 0.0).then(|| round_to(import / demand * 100.0, 2));

        let self_sufficiency = if demand <= 0.0 {
            100.0
        } else if import <= 0.0 {
            let own_supply =
                (generation - flow.power_to_battery - flow.power_to_grid) + flow.power_from_battery;
            (own_supply / demand * 100.0).min(100.0)
        } else {
            ((demand - import) / demand * 100.0).max(0.0)
        };

        Self {
            total_production: round_to(generation, 2),
            total_consumption: round_to(demand, 2),
            grid_dependence,
            self_sufficiency: round_to(self_sufficiency, 2),
        }
    }
}

/// Full status snapshot as served by `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub timestamp: NaiveDateTime,
    pub live_data: LiveData,
    pub kpi: StatusKpi,
    pub tou_prices: PriceQuote,
    pub decision_engine_output: FlowAllocation,
    pub user_settings: Settings,
}

/// Builds the status snapshot for `at`.
///
/// Solar is zeroed outside the configured daylight window and generation is
/// scaled by installed capacity. A failing predictor reports zeros.
pub fn status_at<P: Predictor>(
    at: NaiveDateTime,
    predictor: P,
    prices: &PriceTable,
    settings: &Settings,
) -> StatusReport {
    let masked = DaylightMasked::new(predictor, settings.daylight());
    let raw = masked.predict(at).unwrap_or_else(|err| {
        tracing::warn!(timestamp = %at, %err, "prediction unavailable; using zeros");
        EnergyState::zero()
    });
    let energy = settings.scale_prediction(raw);
    let quote = prices.lookup(at.hour());
    let decision = decide(&energy, &settings.battery_state(), &quote, settings.operating_mode);

    StatusReport {
        timestamp: at,
        live_data: LiveData {
            solar: round_to(energy.solar_kw, 2),
            wind: round_to(energy.wind_kw, 2),
            home_demand: round_to(energy.demand_kw, 2),
        },
        kpi: StatusKpi::from_decision(&energy, &decision),
        tou_prices: quote,
        decision_engine_output: decision,
        user_settings: settings.clone(),
    }
}
