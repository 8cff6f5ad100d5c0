//! Post-hoc KPI computation from a simulation trace.

use std::fmt;

use super::types::{HourlyResult, SimulationTrace};

/// Aggregate key performance indicators for one simulated horizon.
///
/// Computed from the hourly records so reported figures always match the
/// trace.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct KpiReport {
    /// Total household demand (kWh).
    pub total_demand_kwh: f64,
    /// Total solar and wind generation (kWh).
    pub total_generation_kwh: f64,
    /// Share of demand not met by grid import (%); 100 when there is no demand.
    pub self_sufficiency_pct: f64,
    /// Share of demand met by grid import (%).
    pub grid_dependence_pct: f64,
    /// Largest hourly import (kWh).
    pub peak_import_kwh: f64,
    /// Largest hourly export (kWh).
    pub peak_export_kwh: f64,
    /// Energy into plus out of the battery (kWh).
    pub battery_throughput_kwh: f64,
    /// Battery equivalent full cycles (throughput / 2*capacity).
    pub battery_equivalent_full_cycles: f64,
}

impl KpiReport {
    /// Computes all KPIs from a trace.
    ///
    /// # Arguments
    ///
    /// * `trace` - Complete simulation trace
    /// * `battery_capacity_kwh` - Battery capacity for the cycle count
    pub fn from_trace(trace: &SimulationTrace, battery_capacity_kwh: f64) -> Self {
        Self::from_results(&trace.hourly_results, battery_capacity_kwh)
    }

    /// Computes all KPIs from hourly records.
    pub fn from_results(results: &[HourlyResult], battery_capacity_kwh: f64) -> Self {
        let mut demand = 0.0_f64;
        let mut generation = 0.0_f64;
        let mut import = 0.0_f64;
        let mut peak_import = 0.0_f64;
        let mut peak_export = 0.0_f64;
        let mut throughput = 0.0_f64;

        for r in results {
            let d = &r.decision;
            demand += r.predicted_demand_kwh;
            generation += r.predicted_solar_kwh + r.predicted_wind_kwh;
            import += d.power_from_grid;
            peak_import = peak_import.max(d.power_from_grid);
            peak_export = peak_export.max(d.power_to_grid);
            throughput += d.power_to_battery + d.power_from_battery;
        }

        // No demand means nothing was drawn from the grid: fully self-sufficient.
        let (self_sufficiency_pct, grid_dependence_pct) = if demand > 0.0 {
            let dependence = (100.0 * import / demand).min(100.0);
            (100.0 - dependence, dependence)
        } else {
            (100.0, 0.0)
        };

        let cycles = if battery_capacity_kwh > 0.0 {
            throughput / (2.0 * battery_capacity_kwh)
        } else {
            0.0
        };

        Self {
            total_demand_kwh: demand,
            total_generation_kwh: generation,
            self_sufficiency_pct,
            grid_dependence_pct,
            peak_import_kwh: peak_import,
            peak_export_kwh: peak_export,
            battery_throughput_kwh: throughput,
            battery_equivalent_full_cycles: cycles,
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ---")?;
        writeln!(f, "Total demand:          {:.2} kWh", self.total_demand_kwh)?;
        writeln!(f, "Total generation:      {:.2} kWh", self.total_generation_kwh)?;
        writeln!(f, "Self-sufficiency:      {:.1}%", self.self_sufficiency_pct)?;
        writeln!(f, "Grid dependence:       {:.1}%", self.grid_dependence_pct)?;
        writeln!(f, "Peak import:           {:.2} kWh", self.peak_import_kwh)?;
        writeln!(f, "Peak export:           {:.2} kWh", self.peak_export_kwh)?;
        write!(
            f,
            "Battery throughput:    {:.2} kWh ({:.2} equiv. cycles)",
            self.battery_throughput_kwh, self.battery_equivalent_full_cycles
        )
    }
}
