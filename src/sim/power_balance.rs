//! Energy balance checks for decision outputs.

use super::types::{EnergyState, FlowAllocation};

/// Tolerance for balance checks on 2-decimal rounded flows (kW).
pub const BALANCE_TOLERANCE_KW: f64 = 0.01;

/// Sinks minus sources for one decision.
///
/// Sinks are home, battery charge and export; sources are generation,
/// battery discharge and import. A balanced allocation returns ~0.
///
/// # Arguments
///
/// * `energy` - Inputs the decision was made from
/// * `flow` - Decision engine output
///
/// # Returns
///
/// Residual in kW (positive = more routed than available)
pub fn balance_residual(energy: &EnergyState, flow: &FlowAllocation) -> f64 {
    let sinks = flow.power_to_home + flow.power_to_battery + flow.power_to_grid;
    let sources = energy.total_generation_kw() + flow.power_from_battery + flow.power_from_grid;
    sinks - sources
}

/// Whether `flow` balances `energy` within [`BALANCE_TOLERANCE_KW`].
///
/// The extra epsilon absorbs binary error on values that are already rounded.
pub fn is_balanced(energy: &EnergyState, flow: &FlowAllocation) -> bool {
    balance_residual(energy, flow).abs() <= BALANCE_TOLERANCE_KW + 1e-9
}
