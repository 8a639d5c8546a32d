//! Averaging operators blending two per-node material values (e.g.
//! conductivities) into a single inter-node value.

use serde::{Deserialize, Serialize};

/// Averaging scheme for inter-node properties, selected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MeanKind {
    /// Sign-preserving geometric mean.
    Geometric,
    /// Logarithmic mean, the usual choice for hydraulic conductivity.
    #[default]
    Logarithmic,
}

pub fn arithmetic_mean(v1: f64, v2: f64) -> f64 {
    (v1 + v2) * 0.5
}

/// Geometric mean carrying the sign of the first operand.
///
/// The operands must not have opposite signs.
pub fn geometric_mean(v1: f64, v2: f64) -> f64 {
    v1.signum() * (v1 * v2).sqrt()
}

/// Logarithmic mean of two positive values.
///
/// Equal inputs return the common value, so the log ratio cannot reach 0/0.
pub fn logarithmic_mean(v1: f64, v2: f64) -> f64 {
    if v1 == v2 {
        v1
    } else {
        (v1 - v2) / (v1 / v2).ln()
    }
}

/// Blends two node properties into one link property using the configured
/// scheme.
pub fn compute_mean(kind: MeanKind, v1: f64, v2: f64) -> f64 {
    match kind {
        MeanKind::Geometric => geometric_mean(v1, v2),
        MeanKind::Logarithmic => logarithmic_mean(v1, v2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logarithmic_mean_equal_inputs() {
        for v in [1e-9, 0.5, 1.0, 3.7, 1e6] {
            assert_eq!(logarithmic_mean(v, v), v);
        }
    }

    #[test]
    fn test_logarithmic_mean_between_geometric_and_arithmetic() {
        let (v1, v2) = (2.0, 8.0);
        let lm = logarithmic_mean(v1, v2);
        let gm = geometric_mean(v1, v2);
        let am = arithmetic_mean(v1, v2);
        assert!(gm < lm && lm < am, "expected {gm} < {lm} < {am}");
        assert!((lm - 4.328085122666891).abs() < 1e-12);
    }

    #[test]
    fn test_logarithmic_mean_symmetric() {
        let ab = logarithmic_mean(0.3, 7.0);
        let ba = logarithmic_mean(7.0, 0.3);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_geometric_mean_sign() {
        assert_eq!(geometric_mean(2.0, 8.0), 4.0);
        assert_eq!(geometric_mean(-2.0, -8.0), -4.0);
    }

    #[test]
    fn test_compute_mean_dispatch() {
        assert_eq!(compute_mean(MeanKind::Geometric, 4.0, 9.0), 6.0);
        assert_eq!(compute_mean(MeanKind::Logarithmic, 5.0, 5.0), 5.0);
        assert_eq!(MeanKind::default(), MeanKind::Logarithmic);
    }
}
