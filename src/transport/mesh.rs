//! Soil node graph: control volumes with up/down/lateral links.
//!
//! Topology is built once at initialization and never changes afterwards;
//! only node state (heads, temperatures, sink/source terms) is mutated
//! while a simulation runs.

use crate::geom::point::Point;
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// Boundary classification of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// Interior node, no boundary condition.
    #[default]
    None,
    /// Surface node shedding ponded water out of the domain.
    Runoff,
    /// Deepest node draining under unit hydraulic gradient.
    FreeDrainage,
    /// Node held at a prescribed temperature.
    FixedTemperature,
    /// Subsurface node exchanging heat with the atmosphere.
    AtmosphericHeatExchange,
}

/// A directed relation to a neighboring control volume.
#[derive(Debug, Clone, Copy)]
pub struct NodeLink {
    /// Index of the neighbor node.
    pub index: usize,
    /// Flow cross-section between the two volumes in m^2.
    pub area: f64,
}

/// A single control volume.
#[derive(Debug, Clone)]
pub struct Node {
    /// Centroid position; `z` is the elevation in m.
    pub position: Point,
    /// Volume in m^3. Surface nodes store their plan area in m^2 instead.
    pub volume: f64,
    /// Atmosphere-facing node; the ponding clamp applies to it.
    pub is_surface: bool,
    /// Node sits on the domain boundary.
    pub is_boundary: bool,
    /// Boundary condition kind.
    pub boundary: BoundaryKind,
    /// Soil/material index, resolved by the property model.
    pub soil: usize,
    /// Total hydraulic head in m (elevation + pressure head).
    pub total_head: f64,
    /// Temperature in K.
    pub temperature: f64,
    /// Water sink/source in m^3/s, positive into the volume.
    pub water_source: f64,
    /// Heat sink/source in W, positive into the volume.
    pub heat_source: f64,
    up: Option<NodeLink>,
    down: Option<NodeLink>,
    lateral: Vec<NodeLink>,
}

impl Node {
    /// Creates an interior node with zero pressure head and a temperature
    /// of 20 degC. Flags, state and sources are adjusted field by field.
    pub fn new(position: Point, volume: f64) -> Self {
        Self {
            position,
            volume,
            is_surface: false,
            is_boundary: false,
            boundary: BoundaryKind::None,
            soil: 0,
            total_head: position.z,
            temperature: 293.15,
            water_source: 0.0,
            heat_source: 0.0,
            up: None,
            down: None,
            lateral: Vec::new(),
        }
    }

    pub fn up(&self) -> Option<&NodeLink> {
        self.up.as_ref()
    }

    pub fn down(&self) -> Option<&NodeLink> {
        self.down.as_ref()
    }

    pub fn lateral(&self) -> &[NodeLink] {
        &self.lateral
    }

    /// All links in their fixed scan order: up, down, then laterals.
    pub fn links(&self) -> impl Iterator<Item = &NodeLink> {
        self.up.iter().chain(self.down.iter()).chain(self.lateral.iter())
    }
}

/// The discretized domain: a fixed-topology graph of control volumes.
#[derive(Debug, Clone)]
pub struct SoilMesh {
    nodes: Vec<Node>,
    capacity: usize,
    lateral_slots: usize,
}

impl SoilMesh {
    /// Creates an empty mesh sized for `capacity` nodes, each with at most
    /// `lateral_slots` lateral neighbors.
    pub fn new(capacity: usize, lateral_slots: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            capacity,
            lateral_slots,
        }
    }

    /// Inserts a node and returns its index. Indices are assigned in
    /// insertion order and are the node identity everywhere in the crate.
    pub fn add_node(&mut self, node: Node) -> Result<usize> {
        ensure!(
            self.nodes.len() < self.capacity,
            "mesh capacity of {} nodes exhausted",
            self.capacity
        );
        ensure!(node.volume > 0.0, "node volume must be positive");
        self.nodes.push(node);
        Ok(self.nodes.len() - 1)
    }

    /// Links `upper` to `lower` vertically, in both directions.
    ///
    /// Each node can have at most one up and one down link.
    pub fn link_vertical(&mut self, upper: usize, lower: usize, area: f64) -> Result<()> {
        ensure!(upper != lower, "cannot link node {upper} to itself");
        ensure!(upper < self.nodes.len(), "no node {upper}");
        ensure!(lower < self.nodes.len(), "no node {lower}");
        ensure!(area > 0.0, "link area must be positive");
        ensure!(
            self.nodes[upper].down.is_none(),
            "node {upper} already has a down link"
        );
        ensure!(
            self.nodes[lower].up.is_none(),
            "node {lower} already has an up link"
        );
        self.nodes[upper].down = Some(NodeLink { index: lower, area });
        self.nodes[lower].up = Some(NodeLink { index: upper, area });
        Ok(())
    }

    /// Links `a` and `b` laterally, in both directions.
    pub fn link_lateral(&mut self, a: usize, b: usize, area: f64) -> Result<()> {
        ensure!(a != b, "cannot link node {a} to itself");
        ensure!(a < self.nodes.len(), "no node {a}");
        ensure!(b < self.nodes.len(), "no node {b}");
        ensure!(area > 0.0, "link area must be positive");
        ensure!(
            self.nodes[a].lateral.len() < self.lateral_slots,
            "node {a} has no free lateral slot (max {})",
            self.lateral_slots
        );
        ensure!(
            self.nodes[b].lateral.len() < self.lateral_slots,
            "node {b} has no free lateral slot (max {})",
            self.lateral_slots
        );
        self.nodes[a].lateral.push(NodeLink { index: b, area });
        self.nodes[b].lateral.push(NodeLink { index: a, area });
        Ok(())
    }

    /// Looks up the link from node `i` to node `j`: the up relation first,
    /// then down, then each lateral slot in order. Neighbor lists hold at
    /// most 2 + lateral_slots entries, so a linear scan is the right tool.
    pub fn get_link(&self, i: usize, j: usize) -> Option<&NodeLink> {
        let node = self.nodes.get(i)?;
        if let Some(link) = &node.up {
            if link.index == j {
                return Some(link);
            }
        }
        if let Some(link) = &node.down {
            if link.index == j {
                return Some(link);
            }
        }
        node.lateral.iter().find(|link| link.index == j)
    }

    /// Full 3D distance between two node centroids in m.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.nodes[i].position.distance_to(&self.nodes[j].position)
    }

    /// Horizontal distance between two node centroids in m.
    pub fn distance_2d(&self, i: usize, j: usize) -> f64 {
        self.nodes[i].position.distance_2d_to(&self.nodes[j].position)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn lateral_slots(&self) -> usize {
        self.lateral_slots
    }

    /// Widest possible neighbor row: up + down + lateral slots.
    pub fn max_row_width(&self) -> usize {
        2 + self.lateral_slots
    }

    pub fn node(&self, i: usize) -> &Node {
        &self.nodes[i]
    }

    pub fn node_mut(&mut self, i: usize) -> &mut Node {
        &mut self.nodes[i]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn total_head(&self, i: usize) -> f64 {
        self.nodes[i].total_head
    }

    pub fn temperature(&self, i: usize) -> f64 {
        self.nodes[i].temperature
    }

    /// Pressure head in m: total head minus elevation.
    pub fn pressure_head(&self, i: usize) -> f64 {
        self.nodes[i].total_head - self.nodes[i].position.z
    }

    /// Standing water depth in m on a surface node, zero when drained.
    pub fn ponding_depth(&self, i: usize) -> f64 {
        self.pressure_head(i).max(0.0)
    }

    pub fn set_total_head(&mut self, i: usize, head: f64) {
        self.nodes[i].total_head = head;
    }

    /// Sets the water state from a pressure head (total = elevation + psi).
    pub fn set_pressure_head(&mut self, i: usize, psi: f64) {
        self.nodes[i].total_head = self.nodes[i].position.z + psi;
    }

    pub fn set_temperature(&mut self, i: usize, temperature: f64) {
        self.nodes[i].temperature = temperature;
    }

    /// Pins node `i` to a prescribed temperature and classifies it as a
    /// fixed-temperature boundary.
    pub fn set_fixed_temperature(&mut self, i: usize, temperature: f64) {
        let node = &mut self.nodes[i];
        node.is_boundary = true;
        node.boundary = BoundaryKind::FixedTemperature;
        node.temperature = temperature;
    }

    pub fn set_water_source(&mut self, i: usize, flow: f64) {
        self.nodes[i].water_source = flow;
    }

    pub fn set_heat_source(&mut self, i: usize, power: f64) {
        self.nodes[i].heat_source = power;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_node_column() -> SoilMesh {
        let mut mesh = SoilMesh::new(3, 1);
        for k in 0..3 {
            let z = -0.1 * k as f64;
            mesh.add_node(Node::new(Point::new(0., 0., z), 0.1)).unwrap();
        }
        mesh.link_vertical(0, 1, 1.0).unwrap();
        mesh.link_vertical(1, 2, 1.0).unwrap();
        mesh
    }

    #[test]
    fn test_vertical_links_are_symmetric() {
        let mesh = three_node_column();
        assert_eq!(mesh.get_link(0, 1).unwrap().index, 1);
        assert_eq!(mesh.get_link(1, 0).unwrap().index, 0);
        assert_eq!(mesh.get_link(1, 2).unwrap().index, 2);
        assert_eq!(mesh.get_link(2, 1).unwrap().index, 1);
        assert!(mesh.get_link(0, 2).is_none());
        assert!(mesh.get_link(2, 0).is_none());
    }

    #[test]
    fn test_get_link_absent_for_bad_index() {
        let mesh = three_node_column();
        assert!(mesh.get_link(7, 0).is_none());
        assert!(mesh.get_link(0, 7).is_none());
    }

    #[test]
    fn test_link_scan_order() {
        let mut mesh = SoilMesh::new(4, 2);
        for k in 0..4 {
            mesh.add_node(Node::new(Point::new(k as f64, 0., 0.), 1.0))
                .unwrap();
        }
        mesh.link_vertical(0, 1, 1.0).unwrap();
        mesh.link_vertical(1, 2, 1.0).unwrap();
        mesh.link_lateral(1, 3, 0.5).unwrap();

        let order: Vec<usize> = mesh.node(1).links().map(|l| l.index).collect();
        assert_eq!(order, vec![0, 2, 3]);
    }

    #[test]
    fn test_lateral_slots_are_bounded() {
        let mut mesh = SoilMesh::new(3, 1);
        for _ in 0..3 {
            mesh.add_node(Node::new(Point::new(0., 0., 0.), 1.0)).unwrap();
        }
        mesh.link_lateral(0, 1, 1.0).unwrap();
        assert!(mesh.link_lateral(0, 2, 1.0).is_err());
    }

    #[test]
    fn test_single_up_and_down_link() {
        let mut mesh = SoilMesh::new(3, 0);
        for k in 0..3 {
            mesh.add_node(Node::new(Point::new(0., 0., -(k as f64)), 1.0))
                .unwrap();
        }
        mesh.link_vertical(0, 1, 1.0).unwrap();
        assert!(mesh.link_vertical(0, 2, 1.0).is_err());
        assert!(mesh.link_vertical(2, 1, 1.0).is_err());
    }

    #[test]
    fn test_capacity_is_fixed_at_init() {
        let mut mesh = SoilMesh::new(1, 0);
        mesh.add_node(Node::new(Point::new(0., 0., 0.), 1.0)).unwrap();
        assert!(mesh.add_node(Node::new(Point::new(0., 0., -1.), 1.0)).is_err());
    }

    #[test]
    fn test_distance_queries() {
        let mut mesh = SoilMesh::new(2, 0);
        mesh.add_node(Node::new(Point::new(0., 0., 0.), 1.0)).unwrap();
        mesh.add_node(Node::new(Point::new(3., 4., -12.), 1.0)).unwrap();
        assert!((mesh.distance(0, 1) - 13.0).abs() < 1e-12);
        assert!((mesh.distance_2d(0, 1) - 5.0).abs() < 1e-12);
        assert!(mesh.distance(0, 1) >= mesh.distance_2d(0, 1));
    }

    #[test]
    fn test_pressure_head_and_ponding() {
        let mut mesh = SoilMesh::new(1, 0);
        mesh.add_node(Node::new(Point::new(0., 0., -0.5), 1.0)).unwrap();

        mesh.set_pressure_head(0, -2.0);
        assert!((mesh.total_head(0) - (-2.5)).abs() < 1e-12);
        assert!((mesh.pressure_head(0) - (-2.0)).abs() < 1e-12);
        assert_eq!(mesh.ponding_depth(0), 0.0);

        mesh.set_total_head(0, -0.45);
        assert!((mesh.ponding_depth(0) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_temperature_marks_boundary() {
        let mut mesh = SoilMesh::new(1, 0);
        mesh.add_node(Node::new(Point::new(0., 0., -1.), 1.0)).unwrap();
        mesh.set_fixed_temperature(0, 285.15);
        let node = mesh.node(0);
        assert!(node.is_boundary);
        assert_eq!(node.boundary, BoundaryKind::FixedTemperature);
        assert_eq!(node.temperature, 285.15);
    }
}
