//! One-dimensional soil column construction.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::geom::point::Point;
use crate::transport::mesh::{BoundaryKind, Node, SoilMesh};

/// Geometry and boundary layout of a vertical soil column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Depth of the soil profile in m.
    pub total_depth: f64,
    /// Vertical extent of one cell in m.
    pub cell_thickness: f64,
    /// Horizontal cross-section of the column in m^2.
    pub surface_area: f64,
    /// Classification of the deepest node.
    pub bottom_boundary: BoundaryKind,
    /// Mark the first subsurface node as exchanging heat with the
    /// atmosphere.
    pub heat_exchange_surface: bool,
}

impl ColumnSpec {
    pub fn new() -> Self {
        Self {
            total_depth: 1.0,
            cell_thickness: 0.05,
            surface_area: 1.0,
            bottom_boundary: BoundaryKind::FreeDrainage,
            heat_exchange_surface: true,
        }
    }
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the column mesh: a surface node at z = 0 holding the plan area,
/// then one node per cell. The first centroid sits half a cell below the
/// surface, the rest follow at full spacing, and every adjacent pair is
/// linked through the column cross-section.
pub fn build_column(spec: &ColumnSpec) -> Result<SoilMesh> {
    ensure!(spec.total_depth > 0.0, "column depth must be positive");
    ensure!(spec.cell_thickness > 0.0, "cell thickness must be positive");
    ensure!(spec.surface_area > 0.0, "surface area must be positive");

    let cells = (spec.total_depth / spec.cell_thickness - 1e-9).ceil() as usize;
    ensure!(cells >= 2, "column needs at least two cells, got {cells}");

    let mut mesh = SoilMesh::new(cells + 1, 0);

    let mut surface = Node::new(Point::new(0.0, 0.0, 0.0), spec.surface_area);
    surface.is_surface = true;
    surface.boundary = BoundaryKind::Runoff;
    mesh.add_node(surface)?;

    let volume = spec.cell_thickness * spec.surface_area;
    for i in 1..=cells {
        let z = -spec.cell_thickness / 2.0 - (i - 1) as f64 * spec.cell_thickness;
        let mut node = Node::new(Point::new(0.0, 0.0, z), volume);
        if i == 1 && spec.heat_exchange_surface {
            node.is_boundary = true;
            node.boundary = BoundaryKind::AtmosphericHeatExchange;
        } else if i == cells {
            node.is_boundary = true;
            node.boundary = spec.bottom_boundary;
        }
        mesh.add_node(node)?;
        mesh.link_vertical(i - 1, i, spec.surface_area)?;
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_layout() {
        let spec = ColumnSpec {
            total_depth: 1.0,
            cell_thickness: 0.1,
            surface_area: 2.0,
            ..ColumnSpec::new()
        };
        let mesh = build_column(&spec).unwrap();
        assert_eq!(mesh.len(), 11);

        let surface = mesh.node(0);
        assert!(surface.is_surface);
        assert_eq!(surface.boundary, BoundaryKind::Runoff);
        assert_eq!(surface.volume, 2.0);
        assert_eq!(surface.position.z, 0.0);
        assert!(surface.up().is_none());

        assert!((mesh.node(1).position.z + 0.05).abs() < 1e-12);
        assert!((mesh.node(2).position.z + 0.15).abs() < 1e-12);
        assert!((mesh.node(10).position.z + 0.95).abs() < 1e-12);
        assert!((mesh.node(1).volume - 0.2).abs() < 1e-12);

        assert_eq!(mesh.node(1).boundary, BoundaryKind::AtmosphericHeatExchange);
        assert!(mesh.node(1).is_boundary);
        assert_eq!(mesh.node(10).boundary, BoundaryKind::FreeDrainage);
        assert!(mesh.node(10).down().is_none());

        let middle = mesh.node(5);
        assert_eq!(middle.up().unwrap().index, 4);
        assert_eq!(middle.down().unwrap().index, 6);
        assert_eq!(middle.up().unwrap().area, 2.0);
    }

    #[test]
    fn test_partial_last_cell_rounds_up() {
        let spec = ColumnSpec {
            total_depth: 0.95,
            cell_thickness: 0.1,
            ..ColumnSpec::new()
        };
        let mesh = build_column(&spec).unwrap();
        assert_eq!(mesh.len(), 11);

        // 0.9 / 0.3 lands one ulp above 3.0 and must not gain a cell.
        let spec = ColumnSpec {
            total_depth: 0.9,
            cell_thickness: 0.3,
            ..ColumnSpec::new()
        };
        let mesh = build_column(&spec).unwrap();
        assert_eq!(mesh.len(), 4);
    }

    #[test]
    fn test_heat_exchange_flag_off() {
        let spec = ColumnSpec {
            heat_exchange_surface: false,
            ..ColumnSpec::new()
        };
        let mesh = build_column(&spec).unwrap();
        assert_eq!(mesh.node(1).boundary, BoundaryKind::None);
        assert!(!mesh.node(1).is_boundary);
    }

    #[test]
    fn test_rejects_degenerate_columns() {
        let mut spec = ColumnSpec::new();
        spec.cell_thickness = 0.0;
        assert!(build_column(&spec).is_err());

        let mut spec = ColumnSpec::new();
        spec.surface_area = -1.0;
        assert!(build_column(&spec).is_err());

        let spec = ColumnSpec {
            total_depth: 0.1,
            cell_thickness: 0.1,
            ..ColumnSpec::new()
        };
        assert!(build_column(&spec).is_err());
    }
}
