use std::env;

use anyhow::Result;
use vadose::io::{Scenario, read_scenario, write_scenario};
use vadose::{
    BoundaryForcing, BoundaryKind, ColumnSpec, MeanKind, NodeLink, PropertyModel, SoilMesh,
    SolverConfig, TimeStepper, TransportSolver, build_column, compute_mean,
};

/// Ponded infiltration into a dry column, driven from a scenario file.
///
/// Part 1: 2 cm of ponded water seeps into silty soil over one hour. Every
///         15-minute period the water budget is audited: storage change
///         must match the free-drainage outflow.
/// Part 2: the scenario is reloaded with a thousandfold conductivity. The
///         pond empties within the first sub-step, the surface clamp holds
///         the head at the terrain and the phantom supply shows up in the
///         balance ratio.
fn main() -> Result<()> {
    env_logger::init();

    let column = ColumnSpec {
        total_depth: 0.5,
        cell_thickness: 0.05,
        ..ColumnSpec::new()
    };
    let scenario = Scenario::new(column, SolverConfig::new());

    let path = env::temp_dir().join("vadose_infiltration_scenario.json");
    write_scenario(&path, &scenario)?;
    let loaded = read_scenario(&path)?;
    println!("Ponded Infiltration -- Water Budget Audit");
    println!("{:=<62}", "");
    println!();
    println!("Scenario file: {}", path.display());
    println!(
        "Column: {:.2} m deep, {:.0} mm cells, {:.0} cm of ponded water",
        loaded.column.total_depth,
        loaded.column.cell_thickness * 1000.0,
        2.0
    );
    println!();

    // ==================================================================
    // PART 1: slow seepage, audited every period
    // ==================================================================
    println!("PART 1: One Hour of Seepage");
    println!("{:-<62}", "");
    println!();

    let mut mesh = build_column(&loaded.column)?;
    prime_column(&mut mesh, 0.02, -2.0);

    // Silty soil with a Gardner conductivity curve.
    let soil = GardnerSoil {
        saturated_conductivity: 1.0e-7,
        decay: 5.0,
        storativity: 0.1,
        mean: loaded.solver.mean,
    };
    println!("  K_sat = {:.1e} m/s, Gardner decay = {:.1} 1/m", soil.saturated_conductivity, soil.decay);
    println!("  initial pressure head in the soil: -2.0 m");
    println!();

    let mut solver = TransportSolver::new(mesh, loaded.solver)?;
    let mut stepper = TimeStepper::new(&loaded.solver);

    println!(
        "  {:>6}  {:>9}  {:>10}  {:>12}  {:>12}",
        "Period", "Sub-steps", "Pond [mm]", "Soil [m3]", "Error [m3]"
    );
    println!("  {:-<56}", "");

    let mut audit_ok = true;
    for period in 1..=4 {
        let summary = stepper.advance(&mut solver, Some(&soil), None, 900.0)?;
        let water = summary.water;
        audit_ok &= water.error.abs() < 1.0e-9;
        println!(
            "  {:>6}  {:>9}  {:>10.3}  {:>12.6}  {:>12.3e}",
            period,
            summary.sub_steps,
            solver.mesh().ponding_depth(0) * 1000.0,
            soil_storage(solver.mesh(), &soil),
            water.error
        );
    }
    println!("  {:-<56}", "");
    println!();
    let pond_left = solver.mesh().ponding_depth(0);
    if audit_ok && pond_left > 0.0 {
        println!("  PASS: pond recedes and every period balances within 1e-9 m3");
    } else {
        println!("  FAIL: pond at {pond_left:.4} m, audit ok = {audit_ok}");
    }
    println!();

    // ==================================================================
    // PART 2: conductive soil exhausts the pond
    // ==================================================================
    println!("PART 2: Pond Exhaustion and Runoff");
    println!("{:-<62}", "");
    println!();

    let loaded = read_scenario(&path)?;
    let mut mesh = build_column(&loaded.column)?;
    prime_column(&mut mesh, 0.02, -2.0);

    let fast_soil = GardnerSoil {
        saturated_conductivity: 1.0e-4,
        ..soil
    };
    let soil_before = soil_storage(&mesh, &fast_soil);
    let mut solver = TransportSolver::new(mesh, loaded.solver)?;
    let mut stepper = TimeStepper::new(&loaded.solver);
    let summary = stepper.advance(&mut solver, Some(&fast_soil), None, 600.0)?;

    let pond = solver.mesh().ponding_depth(0);
    let soil_after = soil_storage(solver.mesh(), &fast_soil);
    let gained = soil_after - soil_before;
    println!("  K_sat raised to {:.1e} m/s, one {:.0} s period", fast_soil.saturated_conductivity, 600.0);
    println!("  pond depth after the period:   {:.4} m", pond);
    println!("  soil water gained:             {:.4} m3", gained);
    println!("  pond volume available:         {:.4} m3", 0.02);
    println!("  last sub-step balance ratio:   {:.3}", summary.water.ratio);
    println!();
    println!("  The clamp keeps the surface at the terrain once the pond is");
    println!("  gone, so the soil drinks more than the pond held; the excess");
    println!("  is the supply a runoff or ponding-rate boundary would deliver.");
    println!();
    if pond == 0.0 && gained > 0.04 && summary.water.ratio > 1.1 {
        println!("  PASS: pond exhausted, clamp held, imbalance reported");
    } else {
        println!(
            "  FAIL: pond {pond:.4} m, gained {gained:.4} m3, ratio {:.3}",
            summary.water.ratio
        );
    }

    Ok(())
}

/// Ponds `depth` metres of water on the surface node and sets a uniform
/// pressure head in every soil cell.
fn prime_column(mesh: &mut SoilMesh, depth: f64, psi: f64) {
    mesh.set_total_head(0, depth);
    for i in 1..mesh.len() {
        mesh.set_pressure_head(i, psi);
    }
}

/// Water stored below the surface, m3.
fn soil_storage(mesh: &SoilMesh, model: &GardnerSoil) -> f64 {
    let heads: Vec<f64> = mesh.nodes().iter().map(|node| node.total_head).collect();
    (1..mesh.len()).map(|i| model.storage(mesh, &heads, i)).sum()
}

/// Linear-storage soil with a Gardner exponential conductivity curve and
/// unit-gradient outflow through the free-drainage bottom.
#[derive(Clone, Copy)]
struct GardnerSoil {
    saturated_conductivity: f64,
    decay: f64,
    storativity: f64,
    mean: MeanKind,
}

impl GardnerSoil {
    fn cell_conductivity(&self, mesh: &SoilMesh, x: &[f64], i: usize) -> f64 {
        let node = mesh.node(i);
        if node.is_surface {
            return self.saturated_conductivity;
        }
        let psi = (x[i] - node.position.z).min(0.0);
        self.saturated_conductivity * (self.decay * psi).exp()
    }
}

impl PropertyModel for GardnerSoil {
    fn capacity(&self, mesh: &SoilMesh, _x: &[f64], i: usize) -> f64 {
        let node = mesh.node(i);
        if node.is_surface {
            node.volume
        } else {
            node.volume * self.storativity
        }
    }

    fn conductance(
        &self,
        mesh: &SoilMesh,
        x: &[f64],
        i: usize,
        j: usize,
        link: &NodeLink,
    ) -> f64 {
        let mean = compute_mean(
            self.mean,
            self.cell_conductivity(mesh, x, i),
            self.cell_conductivity(mesh, x, j),
        );
        mean * link.area / mesh.distance(i, j)
    }

    fn boundary_forcing(&self, mesh: &SoilMesh, x: &[f64], i: usize) -> BoundaryForcing {
        let node = mesh.node(i);
        if node.boundary == BoundaryKind::FreeDrainage {
            let area = node.up().map(|link| link.area).unwrap_or(0.0);
            BoundaryForcing::Flux(-self.cell_conductivity(mesh, x, i) * area)
        } else {
            BoundaryForcing::None
        }
    }

    fn storage(&self, mesh: &SoilMesh, x: &[f64], i: usize) -> f64 {
        let node = mesh.node(i);
        if node.is_surface {
            node.volume * (x[i] - node.position.z)
        } else {
            node.volume * self.storativity * x[i]
        }
    }
}
