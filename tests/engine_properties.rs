//! Property checks for the decision engine over seeded random inputs.
//!
//! Two input families: values on the 0.01 grid the engine reports on, and
//! arbitrary non-negative floats that the engine has to snap itself.

use chrono::{NaiveDate, NaiveDateTime};
use rand::{Rng, SeedableRng, rngs::StdRng};

use synapse_home::config::Settings;
use synapse_home::predictor::ConstantPredictor;
use synapse_home::pricing::{PriceQuote, PriceSchedule, PriceTable, PriceTier};
use synapse_home::sim::decision::decide;
use synapse_home::sim::power_balance::{balance_residual, is_balanced};
use synapse_home::sim::types::{BatteryState, EnergyState, OperatingMode, round_to};
use synapse_home::status::status_at;

const CASES: usize = 2_000;
/// Half a cent of a kWh: the most a single 2-decimal rounding can move a flow.
const ROUNDING: f64 = 0.005 + 1e-9;

fn grid_value(rng: &mut StdRng, max_hundredths: u32) -> f64 {
    f64::from(rng.random_range(0..=max_hundredths)) / 100.0
}

struct Case {
    energy: EnergyState,
    battery: BatteryState,
    prices: PriceQuote,
    mode: OperatingMode,
}

fn any_value(rng: &mut StdRng, max: f64) -> f64 {
    rng.random_range(0.0..max)
}

fn random_off_grid_case(rng: &mut StdRng) -> Case {
    let capacity = any_value(rng, 20.0);
    let charge = any_value(rng, 20.0).min(capacity);
    let reserve = any_value(rng, 100.0);
    let mode = OperatingMode::ALL[rng.random_range(0..OperatingMode::ALL.len())];
    Case {
        energy: EnergyState::new(any_value(rng, 8.0), any_value(rng, 4.0), any_value(rng, 9.0)),
        battery: BatteryState::new(charge, capacity, reserve),
        prices: PriceQuote::new(any_value(rng, 0.5), any_value(rng, 0.5)),
        mode,
    }
}

fn random_case(rng: &mut StdRng) -> Case {
    let capacity = grid_value(rng, 2_000);
    let charge = (grid_value(rng, 2_000)).min(capacity);
    let reserve = f64::from(rng.random_range(0..=100u32));
    let mode = OperatingMode::ALL[rng.random_range(0..OperatingMode::ALL.len())];
    Case {
        energy: EnergyState::new(grid_value(rng, 800), grid_value(rng, 400), grid_value(rng, 900)),
        battery: BatteryState::new(charge, capacity, reserve),
        prices: PriceQuote::new(grid_value(rng, 50), grid_value(rng, 50)),
        mode,
    }
}

fn cases(seed: u64) -> Vec<Case> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..CASES).map(|_| random_case(&mut rng)).collect()
}

fn off_grid_cases(seed: u64) -> Vec<Case> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..CASES).map(|_| random_off_grid_case(&mut rng)).collect()
}

fn all_cases(seed: u64) -> Vec<Case> {
    let mut all = cases(seed);
    all.extend(off_grid_cases(seed.wrapping_add(1_000)));
    all
}

#[test]
fn energy_balances_within_rounding() {
    for c in all_cases(1) {
        let flow = decide(&c.energy, &c.battery, &c.prices, c.mode);
        assert!(
            is_balanced(&c.energy, &flow),
            "unbalanced by {:.4}: {:?} {:?} -> {flow:?}",
            balance_residual(&c.energy, &flow),
            c.energy,
            c.battery
        );
    }
}

#[test]
fn demand_is_always_met() {
    for c in all_cases(2) {
        let flow = decide(&c.energy, &c.battery, &c.prices, c.mode);
        assert_eq!(flow.power_to_home, round_to(c.energy.demand_kw, 2), "{:?}", c.energy);
    }
}

#[test]
fn discharge_respects_reserve() {
    for c in all_cases(3) {
        let flow = decide(&c.energy, &c.battery, &c.prices, c.mode);
        let allowed = (c.battery.charge_kwh - c.battery.min_reserve_kwh()).max(0.0);
        assert!(
            flow.power_from_battery <= allowed + ROUNDING,
            "discharged {} with only {allowed} above reserve",
            flow.power_from_battery
        );
    }
}

#[test]
fn charge_respects_capacity() {
    for c in all_cases(4) {
        let flow = decide(&c.energy, &c.battery, &c.prices, c.mode);
        assert!(flow.power_to_battery <= c.battery.headroom_kwh() + ROUNDING);
        let mut after = c.battery;
        after.apply(&flow);
        assert!(after.charge_kwh >= 0.0 && after.charge_kwh <= after.capacity_kwh);
    }
}

#[test]
fn never_charges_and_discharges_together() {
    for c in all_cases(5) {
        let flow = decide(&c.energy, &c.battery, &c.prices, c.mode);
        assert!(flow.power_to_battery == 0.0 || flow.power_from_battery == 0.0);
        assert!(flow.power_to_grid == 0.0 || flow.power_from_grid == 0.0);
    }
}

#[test]
fn outputs_are_non_negative_and_rounded() {
    for c in all_cases(6) {
        let flow = decide(&c.energy, &c.battery, &c.prices, c.mode);
        for v in [
            flow.power_to_home,
            flow.power_to_battery,
            flow.power_from_battery,
            flow.power_from_grid,
            flow.power_to_grid,
        ] {
            assert!(v >= 0.0);
            assert!(((v * 100.0).round() - v * 100.0).abs() < 1e-6, "{v} not on 0.01 grid");
        }
    }
}

#[test]
fn identical_inputs_give_identical_outputs() {
    for c in all_cases(7) {
        let a = decide(&c.energy, &c.battery, &c.prices, c.mode);
        let b = decide(&c.energy, &c.battery, &c.prices, c.mode);
        assert_eq!(a, b);
        assert_eq!(a.power_from_grid.to_bits(), b.power_from_grid.to_bits());
    }
}

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid fixed date")
}

#[test]
fn status_decisions_balance_on_off_grid_inputs() {
    let tier = |rate_per_kwh| PriceTier {
        start_hour: 0,
        end_hour: 24,
        rate_per_kwh,
    };
    let prices = PriceTable::from_schedule(PriceSchedule {
        buying_prices: vec![tier(0.2)],
        selling_prices: vec![tier(0.1)],
    });

    for c in off_grid_cases(8).into_iter().take(500) {
        let settings = Settings {
            solar_capacity_kw: 1.0,
            wind_capacity_kw: 1.0,
            battery_capacity_kwh: c.battery.capacity_kwh,
            battery_current_charge_kwh: c.battery.charge_kwh,
            min_battery_reserve_user_percent: c.battery.min_reserve_percent as u8,
            operating_mode: c.mode,
            ..Settings::default()
        };
        let report = status_at(noon(), ConstantPredictor(c.energy), &prices, &settings);
        let flow = &report.decision_engine_output;
        assert!(
            is_balanced(&c.energy, flow),
            "unbalanced by {:.4}: {:?} -> {flow:?}",
            balance_residual(&c.energy, flow),
            c.energy
        );
        assert_eq!(flow.power_to_home, round_to(c.energy.demand_kw, 2));
    }
}
