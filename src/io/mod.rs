/// CSV export of simulation traces.
pub mod export;
