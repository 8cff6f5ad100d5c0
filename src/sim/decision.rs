//! Energy-flow decision engine.
//!
//! [`decide`] is a pure function: it routes generation, battery and grid
//! power to cover household demand under one [`OperatingMode`] and returns a
//! [`FlowAllocation`]. All four modes share one surplus routine and one
//! deficit routine; a [`ModePolicy`] supplies the per-mode action labels and
//! the price-dependent choices.

use crate::pricing::PriceQuote;

use super::types::{Action, BatteryState, EnergyState, FlowAllocation, OperatingMode, round_to};

/// Selling price above which cost optimization exports surplus before charging ($/kWh).
pub const HIGH_SELL_PRICE: f64 = 0.20;
/// Buying price below which charging is labelled as a low-price opportunity ($/kWh).
pub const LOW_BUY_PRICE: f64 = 0.15;
/// Buying price above which discharging is labelled as a high-price response ($/kWh).
pub const HIGH_BUY_PRICE: f64 = 0.25;

/// Per-mode action labels with price predicates already resolved.
///
/// A `None` stage still moves power; it just never contributes a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModePolicy {
    /// Label for covering demand from own generation.
    pub own_generation: Option<Action>,
    /// When set, surplus is exported instead of charged while the battery has
    /// room. The label is assigned even if the surplus is zero.
    pub export_before_charge: Option<Action>,
    /// Label for charging the battery from surplus.
    pub charge: Option<Action>,
    /// Label for exporting surplus left after charging.
    pub export: Option<Action>,
    /// Label for discharging the battery into a deficit.
    pub discharge: Option<Action>,
    /// Label for importing the remaining deficit.
    pub import: Option<Action>,
    /// Label assigned unconditionally at the end of a surplus step.
    pub surplus_summary: Option<Action>,
    /// Label assigned unconditionally at the end of a deficit step.
    pub deficit_summary: Option<Action>,
}

impl ModePolicy {
    const EMPTY: Self = Self {
        own_generation: None,
        export_before_charge: None,
        charge: None,
        export: None,
        discharge: None,
        import: None,
        surplus_summary: None,
        deficit_summary: None,
    };

    /// Builds the policy for `mode` at the given prices.
    pub fn resolve(mode: OperatingMode, prices: &PriceQuote) -> Self {
        let buy = prices.buying_price_per_kwh;
        let sell = prices.selling_price_per_kwh;

        match mode {
            OperatingMode::SelfSufficiency => Self {
                own_generation: Some(Action::UseOwnGeneration),
                charge: Some(Action::ChargeBattery),
                export: Some(Action::ExportSurplus),
                discharge: Some(Action::DischargeBattery),
                import: Some(Action::ImportFromGrid),
                ..Self::EMPTY
            },
            OperatingMode::CostOptimization => Self {
                export_before_charge: (sell > buy && sell > HIGH_SELL_PRICE)
                    .then_some(Action::ExportToGrid),
                charge: Some(if buy < LOW_BUY_PRICE {
                    Action::ChargeBatteryLowGridPrice
                } else {
                    Action::ChargeBattery
                }),
                export: Some(Action::ExportToGrid),
                discharge: Some(if buy > sell && buy > HIGH_BUY_PRICE {
                    Action::DischargeBatteryHighGridPrice
                } else {
                    Action::DischargeBattery
                }),
                import: Some(Action::ImportFromGrid),
                ..Self::EMPTY
            },
            OperatingMode::Environmental => Self {
                own_generation: Some(Action::UseOwnGenerationRenewable),
                charge: Some(Action::ChargeBatteryRenewablePriority),
                export: Some(Action::ExportRenewableSurplus),
                discharge: Some(Action::DischargeBatteryRenewable),
                import: Some(Action::ImportFromGridLastResort),
                ..Self::EMPTY
            },
            OperatingMode::Unknown => Self {
                surplus_summary: Some(Action::DefaultSurplusHandling),
                deficit_summary: Some(Action::DefaultDeficitHandling),
                ..Self::EMPTY
            },
        }
    }
}

/// When a candidate label counts as taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Always,
    OnFlow,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    action: Action,
    amount: f64,
    trigger: Trigger,
}

impl Candidate {
    fn fired(&self) -> bool {
        match self.trigger {
            Trigger::Always => true,
            Trigger::OnFlow => self.amount > 0.0,
        }
    }
}

/// Ordered label candidates; the first one that fired wins.
#[derive(Debug, Default)]
struct Labels(Vec<Candidate>);

impl Labels {
    fn on_flow(&mut self, action: Option<Action>, amount: f64) {
        if let Some(action) = action {
            self.0.push(Candidate {
                action,
                amount,
                trigger: Trigger::OnFlow,
            });
        }
    }

    fn always(&mut self, action: Option<Action>) {
        if let Some(action) = action {
            self.0.push(Candidate {
                action,
                amount: 0.0,
                trigger: Trigger::Always,
            });
        }
    }

    fn winner(&self) -> Action {
        self.0
            .iter()
            .find(|c| c.fired())
            .map_or(Action::NoAction, |c| c.action)
    }
}

/// Flow amounts in whole hundredths of a kW.
#[derive(Debug, Default)]
struct Flows {
    to_home: f64,
    to_battery: f64,
    from_battery: f64,
    from_grid: f64,
    to_grid: f64,
}

/// Resolution of every reported flow: hundredths of a kW.
const STEPS_PER_KW: f64 = 100.0;

/// Computes the energy-flow allocation for one step.
///
/// Demand is always met in full: own generation first, then the battery down
/// to its reserve, then the grid. Surplus goes to the battery up to capacity
/// and the rest is exported, except in cost optimization when the selling
/// price is high enough to export first.
///
/// Generation and demand are snapped to the 0.01 kW grid before routing and
/// the grid flow of each branch takes the remainder, so the reported flows
/// balance exactly and `power_to_home` equals demand rounded to 2 decimals.
/// Battery flows round down, never past the reserve or the capacity.
///
/// The caller guarantees a battery state inside its bounds; see
/// [`BatteryState::new`]. Negative or non-finite inputs count as zero.
///
/// # Examples
///
/// ```
/// use synapse_home::pricing::PriceQuote;
/// use synapse_home::sim::decision::decide;
/// use synapse_home::sim::types::{Action, BatteryState, EnergyState, OperatingMode};
///
/// let flow = decide(
///     &EnergyState::new(0.0, 0.0, 3.0),
///     &BatteryState::new(1.5, 10.0, 20.0),
///     &PriceQuote::new(0.10, 0.05),
///     OperatingMode::SelfSufficiency,
/// );
/// assert_eq!(flow.power_from_grid, 3.0);
/// assert_eq!(flow.recommended_action, Action::ImportFromGrid);
/// ```
pub fn decide(
    energy: &EnergyState,
    battery: &BatteryState,
    prices: &PriceQuote,
    mode: OperatingMode,
) -> FlowAllocation {
    let policy = ModePolicy::resolve(mode, prices);
    let generation = to_steps(energy.total_generation_kw());
    let demand = to_steps(energy.demand_kw);

    let mut flows = Flows {
        to_home: demand,
        ..Flows::default()
    };
    let mut labels = Labels::default();

    if generation >= demand {
        route_surplus(&policy, generation, demand, battery, &mut flows, &mut labels);
    } else {
        route_deficit(&policy, generation, demand, battery, &mut flows, &mut labels);
    }

    FlowAllocation {
        power_to_home: from_steps(flows.to_home),
        power_to_battery: from_steps(flows.to_battery),
        power_from_battery: from_steps(flows.from_battery),
        power_from_grid: from_steps(flows.from_grid),
        power_to_grid: from_steps(flows.to_grid),
        recommended_action: labels.winner(),
        current_operating_mode: mode,
        actual_min_reserve_kwh: round_to(battery.min_reserve_kwh(), 2),
    }
}

fn route_surplus(
    policy: &ModePolicy,
    generation: f64,
    demand: f64,
    battery: &BatteryState,
    flows: &mut Flows,
    labels: &mut Labels,
) {
    labels.on_flow(policy.own_generation, demand);
    let surplus = generation - demand;

    let headroom = steps_within(battery.headroom_kwh());
    if headroom > 0.0 {
        if let Some(action) = policy.export_before_charge {
            labels.always(Some(action));
        } else {
            flows.to_battery = surplus.min(headroom);
            labels.on_flow(policy.charge, flows.to_battery);
        }
    }

    flows.to_grid = surplus - flows.to_battery;
    if flows.to_grid > 0.0 {
        labels.on_flow(policy.export, flows.to_grid);
    }

    labels.always(policy.surplus_summary);
}

fn route_deficit(
    policy: &ModePolicy,
    generation: f64,
    demand: f64,
    battery: &BatteryState,
    flows: &mut Flows,
    labels: &mut Labels,
) {
    labels.on_flow(policy.own_generation, generation);
    let deficit = demand - generation;

    let available = steps_within(battery.dischargeable_kwh());
    if available > 0.0 {
        flows.from_battery = deficit.min(available);
        labels.on_flow(policy.discharge, flows.from_battery);
    }

    flows.from_grid = deficit - flows.from_battery;
    if flows.from_grid > 0.0 {
        labels.on_flow(policy.import, flows.from_grid);
    }

    labels.always(policy.deficit_summary);
}

/// Nearest whole number of hundredths; negative, NaN and infinite map to 0.
fn to_steps(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        (value * STEPS_PER_KW).round()
    } else {
        0.0
    }
}

/// Whole hundredths that fit under `limit` without exceeding it.
fn steps_within(limit: f64) -> f64 {
    if limit.is_finite() && limit > 0.0 {
        // The epsilon keeps e.g. 0.29 (28.999...96 hundredths) at 29.
        (limit * STEPS_PER_KW + 1e-6).floor()
    } else {
        0.0
    }
}

fn from_steps(steps: f64) -> f64 {
    if steps > 0.0 { steps / STEPS_PER_KW } else { 0.0 }
}
