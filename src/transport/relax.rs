//! The Gauss-Seidel relaxation kernel shared by both processes.
//!
//! Water and heat sweeps differ only in policy: traversal order, the surface
//! ponding clamp, residual normalization, the divergence guard, and which
//! rows take part. One kernel parameterized by [`SweepProfile`] covers both.

use crate::transport::config::SolverConfig;
use crate::transport::mesh::SoilMesh;
use crate::transport::system::LinearSystem;
use log::warn;

/// Node traversal order across sweep iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOrdering {
    /// Flip direction every iteration; even iterations run deepest-first.
    /// Alternation cancels the directional bias of in-place updates.
    Alternating,
    /// Ascending node index on every iteration.
    Forward,
}

/// Candidate clamping applied after the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClampPolicy {
    /// Surface-node heads may not drop below the node elevation: water
    /// either ponds on the surface or infiltrates, it cannot vanish.
    SurfaceFloor,
    None,
}

/// Per-node residual measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualPolicy {
    /// Absolute change, divided by the pressure-head magnitude when that
    /// magnitude exceeds 1 m. Keeps nodes with large heads from masking
    /// non-convergence elsewhere.
    HeadScaled,
    /// Plain absolute change.
    Absolute,
}

/// Early-abort rule for diverging relaxations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergenceGuard {
    /// Abort once the norm exceeds ten times the best norm seen so far.
    TenfoldBest,
    None,
}

/// Which rows a sweep visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityPolicy {
    AllNodes,
    /// Skip surface nodes and rows without an equation (zero stored
    /// diagonal); their values are prescribed elsewhere.
    SkipSurfaceInactive,
}

/// Per-process behavior of the relaxation kernel.
#[derive(Debug, Clone, Copy)]
pub struct SweepProfile {
    pub ordering: SweepOrdering,
    pub clamp: ClampPolicy,
    pub residual: ResidualPolicy,
    pub guard: DivergenceGuard,
    pub activity: ActivityPolicy,
}

impl SweepProfile {
    /// Water flow: alternating sweeps, ponding floor on surface nodes,
    /// head-scaled residuals, tenfold divergence guard, every node visited.
    pub fn water() -> Self {
        Self {
            ordering: SweepOrdering::Alternating,
            clamp: ClampPolicy::SurfaceFloor,
            residual: ResidualPolicy::HeadScaled,
            guard: DivergenceGuard::TenfoldBest,
            activity: ActivityPolicy::AllNodes,
        }
    }

    /// Heat: forward sweeps over active subsurface rows, absolute residuals,
    /// no divergence guard.
    pub fn heat() -> Self {
        Self {
            ordering: SweepOrdering::Forward,
            clamp: ClampPolicy::None,
            residual: ResidualPolicy::Absolute,
            guard: DivergenceGuard::None,
            activity: ActivityPolicy::SkipSurfaceInactive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Traversal {
    Forward,
    Reverse,
}

/// Outcome of one relaxation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxStatus {
    /// Residual norm at or below tolerance.
    ToleranceMet,
    /// Budget ran out with the norm still above tolerance. A later
    /// approximation may still succeed with its larger allowance.
    BudgetExhausted,
    /// Aborted by the divergence guard; retrying at this sub-step is
    /// pointless.
    Diverged,
}

impl RelaxStatus {
    pub fn converged(&self) -> bool {
        matches!(self, RelaxStatus::ToleranceMet)
    }
}

/// Inner-iteration allowance for 0-based approximation `k`.
///
/// Later approximations work against freshly relinearized coefficients and
/// earn proportionally more iterations; no approximation gets fewer than 20.
pub fn iteration_budget(total: usize, max_approximations: usize, k: usize) -> usize {
    debug_assert!(max_approximations > 0);
    let share = total as f64 / max_approximations as f64 * (k + 1) as f64;
    (share as usize).max(20)
}

/// Relaxes the assembled system until the residual norm reaches `tolerance`
/// or the approximation's iteration budget runs out. Running out of budget
/// is non-convergence. With [`DivergenceGuard::TenfoldBest`] active, a norm
/// exceeding ten times the best seen aborts immediately.
pub fn relax(
    system: &mut LinearSystem,
    mesh: &SoilMesh,
    profile: &SweepProfile,
    config: &SolverConfig,
    approximation: usize,
    tolerance: f64,
) -> RelaxStatus {
    let max_iterations = iteration_budget(
        config.iteration_budget,
        config.max_approximations,
        approximation,
    );
    let omega = config.relaxation_factor;

    let mut norm: f64 = 1.0;
    let mut best_norm: f64 = 1.0;
    let mut iteration = 0;

    while norm > tolerance && iteration < max_iterations {
        let traversal = match profile.ordering {
            SweepOrdering::Alternating if iteration % 2 == 0 => Traversal::Reverse,
            _ => Traversal::Forward,
        };
        norm = sweep(system, mesh, profile, traversal, omega);

        if let DivergenceGuard::TenfoldBest = profile.guard {
            if norm > best_norm * 10.0 {
                warn!(
                    "relaxation diverging at approximation {approximation}, \
                     iteration {iteration}: norm {norm:.3e} vs best {best_norm:.3e}"
                );
                return RelaxStatus::Diverged;
            }
            if norm < best_norm {
                best_norm = norm;
            }
        }
        iteration += 1;
    }

    if norm <= tolerance {
        RelaxStatus::ToleranceMet
    } else {
        RelaxStatus::BudgetExhausted
    }
}

/// One in-place pass over all rows; returns the infinity-norm residual.
fn sweep(
    system: &mut LinearSystem,
    mesh: &SoilMesh,
    profile: &SweepProfile,
    traversal: Traversal,
    omega: f64,
) -> f64 {
    let n = system.len();
    let mut norm: f64 = 0.0;
    match traversal {
        Traversal::Forward => {
            for i in 0..n {
                norm = norm.max(update_node(system, mesh, profile, omega, i));
            }
        }
        Traversal::Reverse => {
            for i in (0..n).rev() {
                norm = norm.max(update_node(system, mesh, profile, omega, i));
            }
        }
    }
    norm
}

fn update_node(
    system: &mut LinearSystem,
    mesh: &SoilMesh,
    profile: &SweepProfile,
    omega: f64,
    i: usize,
) -> f64 {
    let node = mesh.node(i);
    if profile.activity == ActivityPolicy::SkipSurfaceInactive
        && (node.is_surface || !system.row(i).is_active())
    {
        return 0.0;
    }

    let old = system.unknown(i);
    let mut new = system.candidate(i);
    if omega != 1.0 {
        new = old + omega * (new - old);
    }

    if profile.clamp == ClampPolicy::SurfaceFloor && node.is_surface && new < node.position.z {
        new = node.position.z;
    }

    let mut residual = (new - old).abs();
    if profile.residual == ResidualPolicy::HeadScaled {
        let head = (new - node.position.z).abs();
        if head > 1.0 {
            residual /= head;
        }
    }

    system.set_unknown(i, new);
    residual
}
