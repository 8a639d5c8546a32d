//! File I/O for simulation setups.

pub mod scenario;

pub use scenario::{Scenario, read_scenario, write_scenario};
