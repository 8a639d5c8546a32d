//! Process-wide numerical configuration, fixed for one simulation run.

use crate::transport::mean::MeanKind;
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// Configuration for the transport solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Averaging scheme for inter-node conductivities. The engine hands it
    /// to the property model; implementations dispatch through
    /// [`crate::transport::mean::compute_mean`].
    pub mean: MeanKind,
    /// Gauss-Seidel relaxation factor omega. 1.0 is the plain update;
    /// values below 1 damp oscillating systems at the cost of speed.
    pub relaxation_factor: f64,
    /// Relinearization passes per sub-step.
    pub max_approximations: usize,
    /// Total inner-iteration budget shared across the approximations of one
    /// sub-step. Each approximation k receives
    /// `max(20, budget / max_approximations * (k+1))` iterations.
    pub iteration_budget: usize,
    /// Residual norm target for the water process, m.
    pub water_tolerance: f64,
    /// Residual norm target for the heat process, K.
    pub heat_tolerance: f64,
    /// Smallest sub-step the time stepper may take, s.
    pub min_dt: f64,
    /// Largest sub-step the time stepper may take, s.
    pub max_dt: f64,
    /// Balance-ratio deviation from 1.0 below which the approximation loop
    /// accepts the step early; a committed step still beyond it is logged.
    pub ratio_threshold: f64,
}

impl SolverConfig {
    pub fn new() -> Self {
        Self {
            mean: MeanKind::Logarithmic,
            relaxation_factor: 1.0,
            max_approximations: 10,
            iteration_budget: 100,
            water_tolerance: 1e-12,
            heat_tolerance: 1e-12,
            min_dt: 1.0,
            max_dt: 600.0,
            ratio_threshold: 1e-5,
        }
    }

    /// Checks the configuration once, before any solving starts.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_approximations > 0, "need at least one approximation");
        ensure!(self.iteration_budget > 0, "need a positive iteration budget");
        ensure!(
            self.relaxation_factor > 0.0 && self.relaxation_factor <= 2.0,
            "relaxation factor {} outside (0, 2]",
            self.relaxation_factor
        );
        ensure!(self.water_tolerance > 0.0, "water tolerance must be positive");
        ensure!(self.heat_tolerance > 0.0, "heat tolerance must be positive");
        ensure!(self.min_dt > 0.0, "minimum sub-step must be positive");
        ensure!(
            self.min_dt <= self.max_dt,
            "minimum sub-step {} exceeds maximum {}",
            self.min_dt,
            self.max_dt
        );
        ensure!(self.ratio_threshold > 0.0, "ratio threshold must be positive");
        Ok(())
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SolverConfig::new();
        assert_eq!(config.mean, MeanKind::Logarithmic);
        assert!((config.relaxation_factor - 1.0).abs() < 1e-12);
        assert_eq!(config.max_approximations, 10);
        assert_eq!(config.iteration_budget, 100);
        assert!((config.water_tolerance - 1e-12).abs() < 1e-24);
        assert!((config.min_dt - 1.0).abs() < 1e-12);
        assert!((config.max_dt - 600.0).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SolverConfig::new();
        config.max_approximations = 0;
        assert!(config.validate().is_err());

        let mut config = SolverConfig::new();
        config.relaxation_factor = 2.5;
        assert!(config.validate().is_err());

        let mut config = SolverConfig::new();
        config.min_dt = 900.0;
        assert!(config.validate().is_err());

        let mut config = SolverConfig::new();
        config.heat_tolerance = 0.0;
        assert!(config.validate().is_err());
    }
}
