//! Interface to the soil property and boundary collaborator.

use crate::transport::mesh::{NodeLink, SoilMesh};

/// Forcing applied to a node by its boundary condition.
#[derive(Debug, Clone, Copy)]
pub enum BoundaryForcing {
    /// No boundary contribution.
    None,
    /// Prescribed flow into the volume: m^3/s for water, W for heat.
    Flux(f64),
    /// Linearized exchange `conductance * (reference - x)` with an external
    /// reservoir, e.g. the atmosphere above a heat-exchange node.
    Exchange { conductance: f64, reference: f64 },
    /// The unknown is held at a fixed value; the node's row carries no
    /// equation.
    Prescribed(f64),
}

/// Physics supplied from outside the engine.
///
/// The engine owns topology, assembly and iteration; implementations own the
/// constitutive relations (retention and conductivity curves, thermal
/// properties). `x` is the current iterate of the process unknown, total
/// hydraulic head in m for water and temperature in K for heat, so nonlinear
/// models relinearize against the freshest values on every approximation.
pub trait PropertyModel {
    /// Storage capacity of node `i` per unit change of the unknown
    /// (m^2 for water, J/K for heat).
    fn capacity(&self, mesh: &SoilMesh, x: &[f64], i: usize) -> f64;

    /// Transfer coefficient of the directed link `i -> j` (m^2/s for water,
    /// W/K for heat), already area- and mean-weighted.
    ///
    /// Queried once per direction, so returning different values for
    /// `i -> j` and `j -> i` expresses upwinded advective coupling.
    fn conductance(
        &self,
        mesh: &SoilMesh,
        x: &[f64],
        i: usize,
        j: usize,
        link: &NodeLink,
    ) -> f64;

    /// Boundary forcing for node `i`. Defaults to no contribution.
    fn boundary_forcing(&self, _mesh: &SoilMesh, _x: &[f64], _i: usize) -> BoundaryForcing {
        BoundaryForcing::None
    }

    /// Stored quantity in node `i` (m^3 for water, J for heat); read only by
    /// balance accounting.
    fn storage(&self, mesh: &SoilMesh, x: &[f64], i: usize) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::point::Point;
    use crate::transport::mesh::Node;

    struct Uniform;
    impl PropertyModel for Uniform {
        fn capacity(&self, mesh: &SoilMesh, _x: &[f64], i: usize) -> f64 {
            mesh.node(i).volume
        }

        fn conductance(
            &self,
            _mesh: &SoilMesh,
            _x: &[f64],
            _i: usize,
            _j: usize,
            link: &NodeLink,
        ) -> f64 {
            link.area
        }

        fn storage(&self, mesh: &SoilMesh, x: &[f64], i: usize) -> f64 {
            mesh.node(i).volume * x[i]
        }
    }

    #[test]
    fn test_default_boundary_forcing_is_none() {
        let mut mesh = SoilMesh::new(1, 0);
        mesh.add_node(Node::new(Point::new(0., 0., 0.), 2.0)).unwrap();
        let x = [1.5];

        let model = Uniform;
        assert_eq!(model.capacity(&mesh, &x, 0), 2.0);
        assert_eq!(model.storage(&mesh, &x, 0), 3.0);
        assert!(matches!(
            model.boundary_forcing(&mesh, &x, 0),
            BoundaryForcing::None
        ));
    }
}
