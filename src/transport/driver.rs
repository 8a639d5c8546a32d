//! Sub-step driver: runs the nonlinear approximation loop for one process
//! and commits the result to node state.

use anyhow::{Result, ensure};
use log::{debug, warn};

use crate::transport::Process;
use crate::transport::assemble::assemble;
use crate::transport::balance::{BalanceRecord, BalanceSheet};
use crate::transport::config::SolverConfig;
use crate::transport::mesh::SoilMesh;
use crate::transport::property::{BoundaryForcing, PropertyModel};
use crate::transport::relax::{RelaxStatus, SweepProfile, relax};
use crate::transport::system::LinearSystem;

/// Result of one sub-step attempt.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    /// The final approximation brought the residual norm under tolerance.
    pub converged: bool,
    /// Relinearization passes actually run.
    pub approximations: usize,
    /// Conservation diagnostics of the last approximation.
    pub balance: BalanceRecord,
}

/// Owns the mesh and the workspace needed to advance it through time.
///
/// One solver instance serves both processes; water and heat steps reuse the
/// same row storage. The mesh topology must be complete before construction,
/// since the rows are sized once. State and sources stay editable through
/// [`mesh_mut`].
///
/// [`mesh_mut`]: TransportSolver::mesh_mut
pub struct TransportSolver {
    mesh: SoilMesh,
    config: SolverConfig,
    system: LinearSystem,
    balance: BalanceSheet,
    previous: Vec<f64>,
    trace: Vec<BalanceRecord>,
}

impl TransportSolver {
    pub fn new(mesh: SoilMesh, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        ensure!(!mesh.is_empty(), "cannot solve on an empty mesh");
        let nodes = mesh.len();
        let system = LinearSystem::new(nodes, mesh.max_row_width());
        Ok(Self {
            mesh,
            config,
            system,
            balance: BalanceSheet::new(),
            previous: Vec::with_capacity(nodes),
            trace: Vec::new(),
        })
    }

    pub fn mesh(&self) -> &SoilMesh {
        &self.mesh
    }

    /// Mutable node access for state and source updates between steps.
    pub fn mesh_mut(&mut self) -> &mut SoilMesh {
        &mut self.mesh
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Current iterate of node `i`, committed or not.
    pub fn unknown(&self, i: usize) -> f64 {
        self.system.unknown(i)
    }

    /// Conservation record of the most recent step of `process`.
    pub fn balance(&self, process: Process) -> BalanceRecord {
        self.balance.record(process)
    }

    /// Balance diagnostics of every approximation of the most recent step,
    /// in the order they ran.
    pub fn approximation_records(&self) -> &[BalanceRecord] {
        &self.trace
    }

    /// Advances `process` by `dt` seconds, committing node state only when
    /// the step converges. On failure the mesh keeps its previous state and
    /// the caller decides whether to retry with a smaller sub-step.
    pub fn solve_process(
        &mut self,
        process: Process,
        model: &dyn PropertyModel,
        dt: f64,
    ) -> StepOutcome {
        self.run(process, model, dt, false)
    }

    /// Like [`solve_process`] but commits the final iterate even without
    /// convergence. Last resort once the sub-step cannot shrink further.
    ///
    /// [`solve_process`]: TransportSolver::solve_process
    pub fn solve_process_forced(
        &mut self,
        process: Process,
        model: &dyn PropertyModel,
        dt: f64,
    ) -> StepOutcome {
        self.run(process, model, dt, true)
    }

    /// One sub-step: up to `max_approximations` rounds of assemble + relax,
    /// each round relinearizing against the freshest iterate. Divergence
    /// aborts the loop; an exhausted iteration budget moves on to the next
    /// round, which gets a larger allowance. A round that meets tolerance
    /// with the balance ratio inside the acceptance threshold ends the loop
    /// early.
    fn run(
        &mut self,
        process: Process,
        model: &dyn PropertyModel,
        dt: f64,
        commit_always: bool,
    ) -> StepOutcome {
        let config = self.config;
        let profile = match process {
            Process::Water => SweepProfile::water(),
            Process::Heat => SweepProfile::heat(),
        };
        let tolerance = match process {
            Process::Water => config.water_tolerance,
            Process::Heat => config.heat_tolerance,
        };

        self.previous.clear();
        self.previous
            .extend(self.mesh.nodes().iter().map(|node| process.state(node)));
        for (i, &value) in self.previous.iter().enumerate() {
            self.system.set_unknown(i, value);
        }
        let initial_storage = total_storage(&self.mesh, model, &self.previous);
        self.trace.clear();

        let mut converged = false;
        let mut approximations = 0;
        for k in 0..config.max_approximations {
            approximations = k + 1;
            assemble(
                &mut self.system,
                &self.mesh,
                model,
                process,
                &self.previous,
                dt,
            );
            let status = relax(&mut self.system, &self.mesh, &profile, &config, k, tolerance);

            let inflow = net_inflow(&self.mesh, model, process, self.system.x(), dt);
            self.balance.open(process, initial_storage);
            self.balance.add_flow(process, inflow);
            let record = self
                .balance
                .evaluate(process, total_storage(&self.mesh, model, self.system.x()));
            self.trace.push(record);
            debug!(
                "{:?} approximation {}/{}: {:?}, balance error {:.3e}, ratio {:.6}",
                process, approximations, config.max_approximations, status, record.error, record.ratio
            );

            converged = status.converged();
            match status {
                RelaxStatus::Diverged => break,
                RelaxStatus::ToleranceMet => {
                    if (record.ratio - 1.0).abs() <= config.ratio_threshold {
                        break;
                    }
                }
                RelaxStatus::BudgetExhausted => {}
            }
        }

        if converged || commit_always {
            for i in 0..self.mesh.len() {
                let value = self.system.unknown(i);
                process.store(self.mesh.node_mut(i), value);
            }
            let record = self
                .balance
                .close(process, total_storage(&self.mesh, model, self.system.x()));
            if (record.ratio - 1.0).abs() > config.ratio_threshold {
                warn!(
                    "{:?} step committed with balance ratio {:.6} (error {:.3e})",
                    process, record.ratio, record.error
                );
            }
        }

        StepOutcome {
            converged,
            approximations,
            balance: self.balance.record(process),
        }
    }
}

fn total_storage(mesh: &SoilMesh, model: &dyn PropertyModel, x: &[f64]) -> f64 {
    (0..mesh.len()).map(|i| model.storage(mesh, x, i)).sum()
}

/// Net quantity entering the domain over `dt`: sinks/sources, boundary
/// forcings, and the link fluxes leaving prescribed nodes. Internal link
/// fluxes between solved nodes cancel pairwise and are not counted.
fn net_inflow(
    mesh: &SoilMesh,
    model: &dyn PropertyModel,
    process: Process,
    x: &[f64],
    dt: f64,
) -> f64 {
    let mut rate = 0.0;
    for i in 0..mesh.len() {
        let node = mesh.node(i);
        match model.boundary_forcing(mesh, x, i) {
            BoundaryForcing::Prescribed(_) => {
                for link in node.links() {
                    let k = model.conductance(mesh, x, i, link.index, link);
                    rate += k * (x[i] - x[link.index]);
                }
            }
            BoundaryForcing::None => rate += process.source(node),
            BoundaryForcing::Flux(q) => rate += process.source(node) + q,
            BoundaryForcing::Exchange {
                conductance,
                reference,
            } => {
                rate += process.source(node) + conductance * (reference - x[i]);
            }
        }
    }
    rate * dt
}
