//! Scenario file I/O.
//!
//! A scenario bundles the column geometry and the solver configuration in
//! one JSON document, so a simulation setup can be versioned and shared.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::transport::column::ColumnSpec;
use crate::transport::config::SolverConfig;

/// Everything needed to reproduce a column simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scenario {
    pub column: ColumnSpec,
    pub solver: SolverConfig,
}

impl Scenario {
    pub fn new(column: ColumnSpec, solver: SolverConfig) -> Self {
        Self { column, solver }
    }
}

/// Writes a scenario to a JSON file.
///
/// # Example
/// ```no_run
/// use vadose::io::{write_scenario, Scenario};
/// use std::path::Path;
///
/// let scenario = Scenario::default();
/// write_scenario(Path::new("column.json"), &scenario).unwrap();
/// ```
pub fn write_scenario(path: &Path, scenario: &Scenario) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, scenario)
        .with_context(|| format!("Failed to serialize scenario to: {}", path.display()))?;

    Ok(())
}

/// Reads a scenario from a JSON file.
pub fn read_scenario(path: &Path) -> Result<Scenario> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let scenario: Scenario = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize scenario from: {}", path.display()))?;

    Ok(scenario)
}
