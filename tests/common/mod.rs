//! Shared test fixtures for integration tests.

use chrono::{NaiveDate, NaiveDateTime};
use synapse_home::config::Settings;
use synapse_home::pricing::{PriceSchedule, PriceTable, PriceTier};

/// Midnight on a fixed summer day.
pub fn midnight() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid fixed date")
}

/// Single all-day tier at `rate`.
pub fn all_day(rate_per_kwh: f64) -> PriceTier {
    PriceTier {
        start_hour: 0,
        end_hour: 24,
        rate_per_kwh,
    }
}

/// Flat buy/sell prices for every hour.
pub fn flat_prices(buy: f64, sell: f64) -> PriceTable {
    PriceTable::from_schedule(PriceSchedule {
        buying_prices: vec![all_day(buy)],
        selling_prices: vec![all_day(sell)],
    })
}

/// The bundled TOU schedule in `data/tou_pricing.json`.
pub fn bundled_prices() -> PriceTable {
    PriceTable::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/data/tou_pricing.json"))
}

/// Settings where predictor outputs pass through unscaled.
pub fn unit_capacity_settings() -> Settings {
    Settings {
        solar_capacity_kw: 1.0,
        wind_capacity_kw: 1.0,
        ..Settings::default()
    }
}
