//! Finite-volume transport of unsaturated water flow and heat through a
//! soil node graph.
//!
//! The engine advances one process (water or heat) at a time over a fixed
//! topology: rows are assembled from the property model, relaxed with a
//! Gauss-Seidel sweep inside a nonlinear approximation loop, and committed
//! back to node state on convergence.
//!
//! # Architecture
//!
//! ```text
//! SoilMesh + PropertyModel ──► assemble() ──► LinearSystem rows
//!                                                 │
//!                  TransportSolver (approximation loop) ──► relax()
//!                                                 │
//!                              BalanceSheet ◄── commit / observe
//!                                                 │
//!                      TimeStepper (sub-step halving over a period)
//! ```
//!
//! The relaxation kernel never sees coordinates or physics, only normalized
//! rows and a sweep profile, so water and heat share one code path.

pub mod assemble;
pub mod balance;
pub mod column;
pub mod config;
pub mod driver;
pub mod mean;
pub mod mesh;
pub mod property;
pub mod relax;
pub mod stepper;
pub mod system;

pub use assemble::assemble;
pub use balance::{BalanceRecord, BalanceSheet};
pub use column::{ColumnSpec, build_column};
pub use config::SolverConfig;
pub use driver::{StepOutcome, TransportSolver};
pub use mean::{MeanKind, compute_mean};
pub use mesh::{BoundaryKind, Node, NodeLink, SoilMesh};
pub use property::{BoundaryForcing, PropertyModel};
pub use relax::{SweepProfile, iteration_budget};
pub use stepper::{PeriodSummary, TimeStepper};
pub use system::{LinearSystem, RowEntry, SystemRow};

/// Tracked physical process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Process {
    Water,
    Heat,
}

impl Process {
    /// Reads this process's unknown from node state.
    pub fn state(&self, node: &Node) -> f64 {
        match self {
            Process::Water => node.total_head,
            Process::Heat => node.temperature,
        }
    }

    /// Writes this process's unknown into node state.
    pub fn store(&self, node: &mut Node, value: f64) {
        match self {
            Process::Water => node.total_head = value,
            Process::Heat => node.temperature = value,
        }
    }

    /// This process's sink/source term on a node (m^3/s or W).
    pub fn source(&self, node: &Node) -> f64 {
        match self {
            Process::Water => node.water_source,
            Process::Heat => node.heat_source,
        }
    }
}
