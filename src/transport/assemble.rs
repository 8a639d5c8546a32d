//! Builds the linear-system rows for one process and one sub-step.

use crate::transport::Process;
use crate::transport::mesh::SoilMesh;
use crate::transport::property::{BoundaryForcing, PropertyModel};
use crate::transport::system::LinearSystem;

/// Assembles one implicit finite-volume row per node and normalizes it.
///
/// For node i with capacity C, link conductances K_ij, sink/source q and
/// boundary forcing f:
///
/// ```text
/// (C/dt + sum K_ij + K_bnd) x_i - sum K_ij x_j = (C/dt) x_prev_i + q + f
/// ```
///
/// `previous` holds the unknowns at the start of the sub-step; capacities
/// and conductances are evaluated against the current iterate in `system`,
/// which is what makes repeated assembly a relinearization. Nodes with
/// [`BoundaryForcing::Prescribed`] get no equation: the row is deactivated
/// and the unknown pinned.
pub fn assemble(
    system: &mut LinearSystem,
    mesh: &SoilMesh,
    model: &dyn PropertyModel,
    process: Process,
    previous: &[f64],
    dt: f64,
) {
    debug_assert!(dt > 0.0, "sub-step length must be positive");
    debug_assert_eq!(previous.len(), mesh.len());

    for i in 0..mesh.len() {
        let forcing = model.boundary_forcing(mesh, system.x(), i);
        if let BoundaryForcing::Prescribed(value) = forcing {
            system.deactivate_row(i, value);
            continue;
        }

        let node = mesh.node(i);
        let capacity = model.capacity(mesh, system.x(), i);
        let mut diagonal = capacity / dt;
        let mut rhs = diagonal * previous[i] + process.source(node);

        system.clear_row(i);
        for link in node.links() {
            let k = model.conductance(mesh, system.x(), i, link.index, link);
            diagonal += k;
            system.add_entry(i, link.index, -k);
        }

        match forcing {
            BoundaryForcing::None | BoundaryForcing::Prescribed(_) => {}
            BoundaryForcing::Flux(q) => rhs += q,
            BoundaryForcing::Exchange {
                conductance,
                reference,
            } => {
                diagonal += conductance;
                rhs += conductance * reference;
            }
        }

        system.finalize_row(i, diagonal, rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::point::Point;
    use crate::transport::mesh::{Node, NodeLink};

    /// Constant unit capacity and link conductance equal to the link area.
    struct Uniform {
        exchange_on: Option<usize>,
        prescribed_on: Option<usize>,
    }

    impl Uniform {
        fn plain() -> Self {
            Self {
                exchange_on: None,
                prescribed_on: None,
            }
        }
    }

    impl PropertyModel for Uniform {
        fn capacity(&self, _mesh: &SoilMesh, _x: &[f64], _i: usize) -> f64 {
            1.0
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

        fn boundary_forcing(&self, _mesh: &SoilMesh, _x: &[f64], i: usize) -> BoundaryForcing {
            if self.prescribed_on == Some(i) {
                BoundaryForcing::Prescribed(280.0)
            } else if self.exchange_on == Some(i) {
                BoundaryForcing::Exchange {
                    conductance: 2.0,
                    reference: 300.0,
                }
            } else {
                BoundaryForcing::None
            }
        }

        fn storage(&self, _mesh: &SoilMesh, x: &[f64], i: usize) -> f64 {
            x[i]
        }
    }

    fn chain(n: usize) -> SoilMesh {
        let mut mesh = SoilMesh::new(n, 0);
        for k in 0..n {
            mesh.add_node(Node::new(Point::new(0., 0., -0.1 * k as f64), 0.1))
                .unwrap();
        }
        for k in 0..n - 1 {
            mesh.link_vertical(k, k + 1, 1.0).unwrap();
        }
        mesh
    }

    #[test]
    fn test_interior_row_values() {
        let mesh = chain(3);
        let mut system = LinearSystem::new(3, 2);
        let previous = vec![5.0; 3];

        assemble(
            &mut system,
            &mesh,
            &Uniform::plain(),
            Process::Heat,
            &previous,
            0.5,
        );

        // Middle row: diag = 1/0.5 + 1 + 1 = 4, rhs = (2*5)/4 = 2.5,
        // off-diagonals = -1/4.
        let row = system.row(1);
        assert!((row.diagonal() - 4.0).abs() < 1e-12);
        assert!((row.rhs() - 2.5).abs() < 1e-12);
        let columns: Vec<usize> = row.entries().iter().map(|e| e.column).collect();
        assert_eq!(columns, vec![0, 2]);
        for entry in row.entries() {
            assert!((entry.value + 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_source_enters_rhs() {
        let mut mesh = chain(2);
        mesh.set_heat_source(0, 3.0);
        let mut system = LinearSystem::new(2, 2);
        let previous = vec![0.0; 2];

        assemble(
            &mut system,
            &mesh,
            &Uniform::plain(),
            Process::Heat,
            &previous,
            1.0,
        );

        // Row 0: diag = 1 + 1 = 2, rhs = (0 + 3)/2.
        assert!((system.row(0).rhs() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_prescribed_row_is_deactivated() {
        let mesh = chain(3);
        let mut system = LinearSystem::new(3, 2);
        let model = Uniform {
            exchange_on: None,
            prescribed_on: Some(2),
        };

        assemble(&mut system, &mesh, &model, Process::Heat, &[0.0; 3], 1.0);

        assert!(!system.row(2).is_active());
        assert_eq!(system.unknown(2), 280.0);
        assert_eq!(system.candidate(2), 280.0);
        // Neighbors still reference the pinned node.
        assert!(system.row(1).entries().iter().any(|e| e.column == 2));
    }

    #[test]
    fn test_exchange_forcing_enters_diagonal_and_rhs() {
        let mesh = chain(2);
        let mut system = LinearSystem::new(2, 2);
        let model = Uniform {
            exchange_on: Some(0),
            prescribed_on: None,
        };

        assemble(&mut system, &mesh, &model, Process::Heat, &[290.0; 2], 1.0);

        // Row 0: diag = 1 + 1 + 2 = 4, rhs = (290 + 2*300)/4.
        let row = system.row(0);
        assert!((row.diagonal() - 4.0).abs() < 1e-12);
        assert!((row.rhs() - 222.5).abs() < 1e-12);
    }
}
