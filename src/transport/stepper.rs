//! Adaptive sub-stepping: advances the solver through a requested period,
//! shrinking the sub-step on failure and growing it back when the solution
//! comes easily.

use anyhow::{Result, ensure};
use log::{debug, warn};

use crate::transport::Process;
use crate::transport::balance::BalanceRecord;
use crate::transport::config::SolverConfig;
use crate::transport::driver::TransportSolver;
use crate::transport::property::PropertyModel;

/// What happened over one advanced period.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodSummary {
    /// Committed sub-steps.
    pub sub_steps: usize,
    /// Process steps force-accepted at the minimum sub-step.
    pub forced: usize,
    /// Water balance of the last sub-step.
    pub water: BalanceRecord,
    /// Heat balance of the last sub-step.
    pub heat: BalanceRecord,
}

/// Controls the sub-step length between `min_dt` and `max_dt`.
///
/// A failed sub-step halves the length and retries the same interval; a
/// sub-step where every process converged within half the approximation
/// allowance doubles it again. At `min_dt` there is nothing left to shrink
/// and the result is committed regardless.
#[derive(Debug, Clone)]
pub struct TimeStepper {
    min_dt: f64,
    max_dt: f64,
    current_dt: f64,
}

impl TimeStepper {
    /// Starts at the largest allowed sub-step.
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            min_dt: config.min_dt,
            max_dt: config.max_dt,
            current_dt: config.max_dt,
        }
    }

    /// Working sub-step length in seconds.
    pub fn current_dt(&self) -> f64 {
        self.current_dt
    }

    /// Advances `period` seconds of simulated time, running water before
    /// heat within each sub-step. Supplying `None` for a model skips that
    /// process entirely.
    pub fn advance(
        &mut self,
        solver: &mut TransportSolver,
        water: Option<&dyn PropertyModel>,
        heat: Option<&dyn PropertyModel>,
        period: f64,
    ) -> Result<PeriodSummary> {
        ensure!(period > 0.0, "period must be positive, got {period}");
        ensure!(
            water.is_some() || heat.is_some(),
            "nothing to advance: no process model supplied"
        );

        let mut summary = PeriodSummary::default();
        let mut elapsed = 0.0;
        loop {
            let remaining = period - elapsed;
            if remaining <= period * 1e-12 {
                break;
            }
            let dt = self.current_dt.min(remaining);
            let at_floor = dt <= self.min_dt;

            let snapshot: Vec<(f64, f64)> = solver
                .mesh()
                .nodes()
                .iter()
                .map(|node| (node.total_head, node.temperature))
                .collect();

            let mut round_converged = true;
            let mut worst_approximations = 0;
            let mut failed = false;
            for (process, model) in [(Process::Water, water), (Process::Heat, heat)] {
                let Some(model) = model else { continue };
                let outcome = if at_floor {
                    solver.solve_process_forced(process, model, dt)
                } else {
                    solver.solve_process(process, model, dt)
                };
                worst_approximations = worst_approximations.max(outcome.approximations);
                if !outcome.converged {
                    if at_floor {
                        warn!(
                            "{:?} forced through at minimum sub-step {dt:.3} s \
                             after {} approximations",
                            process, outcome.approximations
                        );
                        summary.forced += 1;
                        round_converged = false;
                    } else {
                        failed = true;
                        break;
                    }
                }
            }

            if failed {
                for (i, &(head, temperature)) in snapshot.iter().enumerate() {
                    let node = solver.mesh_mut().node_mut(i);
                    node.total_head = head;
                    node.temperature = temperature;
                }
                self.current_dt = (dt * 0.5).max(self.min_dt);
                debug!("sub-step of {dt:.3} s failed, retrying at {:.3} s", self.current_dt);
                continue;
            }

            elapsed += dt;
            summary.sub_steps += 1;

            let easy = worst_approximations <= solver.config().max_approximations / 2;
            if round_converged && easy && self.current_dt < self.max_dt {
                self.current_dt = (self.current_dt * 2.0).min(self.max_dt);
                debug!("growing sub-step to {:.3} s", self.current_dt);
            }
        }

        summary.water = solver.balance(Process::Water);
        summary.heat = solver.balance(Process::Heat);
        Ok(summary)
    }
}
