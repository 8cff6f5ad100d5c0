//! CSV export for simulation traces.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::SimulationTrace;

/// Column header for hourly trace export.
pub const HEADER: &str = "hour_index,timestamp,hour,predicted_solar_kwh,predicted_wind_kwh,\
                          predicted_demand_kwh,buying_price_per_kwh,selling_price_per_kwh,\
                          power_to_home,power_to_battery,power_from_battery,power_from_grid,\
                          power_to_grid,recommended_action,battery_charge_kwh,hourly_net_cost";

/// Exports a trace to a CSV file at the given path.
///
/// Writes a header row followed by one row per simulated hour. Produces
/// deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(trace: &SimulationTrace, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(trace, buf)
}

/// Writes a trace as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(trace: &SimulationTrace, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in &trace.hourly_results {
        let d = &r.decision;
        wtr.write_record(&[
            r.hour_index.to_string(),
            r.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            r.hour.to_string(),
            format!("{:.2}", r.predicted_solar_kwh),
            format!("{:.2}", r.predicted_wind_kwh),
            format!("{:.2}", r.predicted_demand_kwh),
            format!("{:.4}", r.buying_price_per_kwh),
            format!("{:.4}", r.selling_price_per_kwh),
            format!("{:.2}", d.power_to_home),
            format!("{:.2}", d.power_to_battery),
            format!("{:.2}", d.power_from_battery),
            format!("{:.2}", d.power_from_grid),
            format!("{:.2}", d.power_to_grid),
            d.recommended_action.to_string(),
            format!("{:.2}", r.simulated_battery_charge_kwh_end_of_hour),
            format!("{:.4}", r.hourly_net_cost),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
