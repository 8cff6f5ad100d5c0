/// Energy-flow decision engine.
pub mod decision;
pub mod engine;
pub mod kpi;
pub mod power_balance;
pub mod types;

pub use decision::decide;
pub use engine::{HORIZON_HOURS, Simulator, simulate};
