pub mod geom;
pub mod io;
pub mod transport;

// Prelude
pub use geom::point::Point;
pub use transport::{
    BalanceRecord, BoundaryForcing, BoundaryKind, ColumnSpec, MeanKind, Node, NodeLink,
    PeriodSummary, Process, PropertyModel, SoilMesh, SolverConfig, StepOutcome, TimeStepper,
    TransportSolver, build_column, compute_mean,
};
