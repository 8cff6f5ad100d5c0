//! Time-of-use (TOU) price schedule and the load-once price table.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Buying and selling price for one hour.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Price paid per imported kWh ($/kWh).
    pub buying_price_per_kwh: f64,
    /// Price received per exported kWh ($/kWh).
    pub selling_price_per_kwh: f64,
}

impl PriceQuote {
    /// Creates a quote from buying and selling prices.
    pub fn new(buying_price_per_kwh: f64, selling_price_per_kwh: f64) -> Self {
        Self {
            buying_price_per_kwh,
            selling_price_per_kwh,
        }
    }
}

/// One `[start_hour, end_hour)` rate band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTier {
    /// First hour covered (inclusive).
    pub start_hour: u32,
    /// Hour where the tier ends (exclusive).
    pub end_hour: u32,
    /// Rate for the band ($/kWh).
    pub rate_per_kwh: f64,
}

impl PriceTier {
    /// Whether `hour` falls in `[start_hour, end_hour)`.
    pub fn covers(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }
}

/// Which side of the tariff a tier list describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TariffSide {
    Buying,
    Selling,
}

/// Ordered tier lists for buying and selling.
///
/// Lookups return the rate of the first covering tier, or `0.0` when no tier
/// covers the hour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSchedule {
    /// Import tiers, scanned in order.
    #[serde(default)]
    pub buying_prices: Vec<PriceTier>,
    /// Export tiers, scanned in order.
    #[serde(default)]
    pub selling_prices: Vec<PriceTier>,
}

/// Failure to read or parse a price schedule.
#[derive(Debug, Error)]
pub enum PriceError {
    #[error("cannot read price schedule \"{}\": {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid price schedule: {0}")]
    Parse(#[from] serde_json::Error),
}

impl PriceSchedule {
    /// Parses a schedule from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Parse`] if the JSON does not match the schedule shape.
    pub fn from_json_str(s: &str) -> Result<Self, PriceError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Reads and parses a schedule file.
    ///
    /// # Errors
    ///
    /// Returns a `PriceError` if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self, PriceError> {
        let content = fs::read_to_string(path).map_err(|source| PriceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Tier list for one side.
    pub fn tiers(&self, side: TariffSide) -> &[PriceTier] {
        match side {
            TariffSide::Buying => &self.buying_prices,
            TariffSide::Selling => &self.selling_prices,
        }
    }

    /// Rate of the first tier covering `hour`, or `0.0`.
    pub fn rate(&self, side: TariffSide, hour: u32) -> f64 {
        self.tiers(side)
            .iter()
            .find(|tier| tier.covers(hour))
            .map_or(0.0, |tier| tier.rate_per_kwh)
    }

    /// Buying and selling price for `hour`.
    pub fn quote(&self, hour: u32) -> PriceQuote {
        PriceQuote {
            buying_price_per_kwh: self.rate(TariffSide::Buying, hour),
            selling_price_per_kwh: self.rate(TariffSide::Selling, hour),
        }
    }

    /// Hours of the day (0-23) not covered by any tier on `side`.
    pub fn uncovered_hours(&self, side: TariffSide) -> Vec<u32> {
        (0..24)
            .filter(|&hour| !self.tiers(side).iter().any(|tier| tier.covers(hour)))
            .collect()
    }

    /// Drops tiers with negative or non-finite rates.
    fn sanitized(mut self) -> Self {
        for (side, tiers) in [
            ("buying", &mut self.buying_prices),
            ("selling", &mut self.selling_prices),
        ] {
            tiers.retain(|tier| {
                let ok = tier.rate_per_kwh.is_finite() && tier.rate_per_kwh >= 0.0;
                if !ok {
                    tracing::warn!(
                        side,
                        start_hour = tier.start_hour,
                        end_hour = tier.end_hour,
                        rate = tier.rate_per_kwh,
                        "dropping price tier with invalid rate"
                    );
                }
                ok
            });
        }
        self
    }
}

/// Where a [`PriceTable`] reads its schedule from.
#[derive(Debug, Clone)]
pub enum PriceSource {
    /// JSON file on disk.
    File(PathBuf),
    /// JSON document held in memory.
    Json(String),
    /// Already-parsed schedule.
    Schedule(PriceSchedule),
}

/// Price table that loads its schedule once and serves lookups from the cache.
///
/// A missing or malformed source produces an empty schedule (every lookup
/// returns zero) and a warning; lookups never fail. Concurrent readers share
/// the cached schedule; [`PriceTable::reload`] drops it so the next lookup
/// reads the source again.
#[derive(Debug)]
pub struct PriceTable {
    source: PriceSource,
    cache: OnceLock<PriceSchedule>,
}

impl PriceTable {
    /// Creates a table that loads lazily from `source`.
    pub fn new(source: PriceSource) -> Self {
        Self {
            source,
            cache: OnceLock::new(),
        }
    }

    /// Creates a table backed by a JSON file.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(PriceSource::File(path.into()))
    }

    /// Creates a table backed by an in-memory schedule.
    pub fn from_schedule(schedule: PriceSchedule) -> Self {
        Self::new(PriceSource::Schedule(schedule))
    }

    /// Returns the cached schedule, loading it on first use.
    pub fn schedule(&self) -> &PriceSchedule {
        self.cache.get_or_init(|| self.load())
    }

    /// Loads the schedule eagerly.
    pub fn preload(&self) -> &PriceSchedule {
        self.schedule()
    }

    /// Whether the schedule has been loaded since creation or the last reload.
    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Drops the cached schedule; the next lookup reads the source again.
    pub fn reload(&mut self) {
        self.cache = OnceLock::new();
    }

    /// Buying and selling price for an hour of day.
    ///
    /// Hours with no covering tier (including hours outside `0..24`) price at zero.
    pub fn lookup(&self, hour: u32) -> PriceQuote {
        self.schedule().quote(hour)
    }

    fn load(&self) -> PriceSchedule {
        let loaded = match &self.source {
            PriceSource::File(path) => PriceSchedule::from_json_file(path),
            PriceSource::Json(json) => PriceSchedule::from_json_str(json),
            PriceSource::Schedule(schedule) => Ok(schedule.clone()),
        };
        let schedule = match loaded {
            Ok(schedule) => schedule.sanitized(),
            Err(err) => {
                tracing::warn!(%err, "using empty price schedule; all prices are zero");
                return PriceSchedule::default();
            }
        };

        for (name, side) in [("buying", TariffSide::Buying), ("selling", TariffSide::Selling)] {
            let gaps = schedule.uncovered_hours(side);
            if !gaps.is_empty() && gaps.len() < 24 {
                tracing::warn!(side = name, hours = ?gaps, "hours not covered by any tier price at zero");
            }
        }
        schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(start_hour: u32, end_hour: u32, rate_per_kwh: f64) -> PriceTier {
        PriceTier {
            start_hour,
            end_hour,
            rate_per_kwh,
        }
    }

    fn gapped_schedule() -> PriceSchedule {
        PriceSchedule {
            buying_prices: vec![tier(0, 5, 0.12), tier(6, 17, 0.22), tier(17, 24, 0.35)],
            selling_prices: vec![tier(0, 5, 0.04), tier(6, 24, 0.08)],
        }
    }

    #[test]
    fn uncovered_hour_prices_at_zero() {
        let table = PriceTable::from_schedule(gapped_schedule());
        let quote = table.lookup(5);
        assert_eq!(quote.buying_price_per_kwh, 0.0);
        assert_eq!(quote.selling_price_per_kwh, 0.0);
    }

    #[test]
    fn end_hour_is_exclusive() {
        let schedule = gapped_schedule();
        assert_eq!(schedule.rate(TariffSide::Buying, 16), 0.22);
        assert_eq!(schedule.rate(TariffSide::Buying, 17), 0.35);
        assert_eq!(schedule.rate(TariffSide::Buying, 23), 0.35);
        assert_eq!(schedule.rate(TariffSide::Buying, 24), 0.0);
    }

    #[test]
    fn first_matching_tier_wins_on_overlap() {
        let schedule = PriceSchedule {
            buying_prices: vec![tier(0, 12, 0.10), tier(6, 18, 0.40)],
            selling_prices: Vec::new(),
        };
        assert_eq!(schedule.rate(TariffSide::Buying, 8), 0.10);
        assert_eq!(schedule.rate(TariffSide::Buying, 13), 0.40);
    }

    #[test]
    fn uncovered_hours_lists_gaps() {
        let schedule = gapped_schedule();
        assert_eq!(schedule.uncovered_hours(TariffSide::Buying), vec![5]);
        assert_eq!(schedule.uncovered_hours(TariffSide::Selling), vec![5]);
    }

    #[test]
    fn missing_file_yields_empty_schedule() {
        let table = PriceTable::from_path("does/not/exist/tou_pricing.json");
        assert_eq!(table.lookup(12), PriceQuote::default());
        assert!(table.schedule().buying_prices.is_empty());
    }

    #[test]
    fn malformed_json_yields_empty_schedule() {
        let table = PriceTable::new(PriceSource::Json("{ not json".to_string()));
        assert_eq!(table.lookup(3), PriceQuote::default());
    }

    #[test]
    fn missing_side_defaults_to_empty() {
        let json = r#"{"buying_prices": [{"start_hour": 0, "end_hour": 24, "rate_per_kwh": 0.2}]}"#;
        let table = PriceTable::new(PriceSource::Json(json.to_string()));
        assert_eq!(table.lookup(10), PriceQuote::new(0.2, 0.0));
    }

    #[test]
    fn negative_rates_are_dropped() {
        let schedule = PriceSchedule {
            buying_prices: vec![tier(0, 24, -0.5)],
            selling_prices: vec![tier(0, 24, 0.05)],
        };
        let table = PriceTable::from_schedule(schedule);
        assert_eq!(table.lookup(1), PriceQuote::new(0.0, 0.05));
    }

    #[test]
    fn loads_lazily_and_reloads_on_demand() {
        let mut table = PriceTable::from_schedule(gapped_schedule());
        assert!(!table.is_loaded());
        table.lookup(1);
        assert!(table.is_loaded());
        table.reload();
        assert!(!table.is_loaded());
        table.preload();
        assert!(table.is_loaded());
    }
}
