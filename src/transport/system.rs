//! Per-node sparse row storage for the relaxation engine.
//!
//! Rows are stored in normalized form: after [`LinearSystem::finalize_row`]
//! every off-diagonal entry and the right-hand side have been divided by the
//! diagonal, so the Gauss-Seidel candidate for a node is
//! `rhs - sum(entry * x[neighbor])` with no division in the sweep loop.
//! The raw diagonal is kept; a stored diagonal of exactly 0.0 means the row
//! has no equation and its unknown is prescribed from outside.

/// One off-diagonal coefficient of a row.
#[derive(Debug, Clone, Copy)]
pub struct RowEntry {
    /// Column (neighbor node) index.
    pub column: usize,
    /// Normalized coefficient a_ij / a_ii.
    pub value: f64,
}

/// Sparse row of the linear system for one node.
#[derive(Debug, Clone)]
pub struct SystemRow {
    diagonal: f64,
    rhs: f64,
    entries: Vec<RowEntry>,
}

impl SystemRow {
    fn with_width(width: usize) -> Self {
        Self {
            diagonal: 0.0,
            rhs: 0.0,
            entries: Vec::with_capacity(width),
        }
    }

    /// Raw (pre-normalization) diagonal; 0.0 marks an inactive row.
    pub fn diagonal(&self) -> f64 {
        self.diagonal
    }

    /// Normalized right-hand side.
    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    pub fn entries(&self) -> &[RowEntry] {
        &self.entries
    }

    /// Whether this row carries an equation to solve.
    pub fn is_active(&self) -> bool {
        self.diagonal != 0.0
    }
}

/// Row buffers plus the unknown vector, sized once at construction.
///
/// Entry storage keeps its capacity across reassemblies; relinearizing a
/// fixed topology allocates nothing.
#[derive(Debug, Clone)]
pub struct LinearSystem {
    rows: Vec<SystemRow>,
    x: Vec<f64>,
}

impl LinearSystem {
    /// Creates buffers for `nodes` rows of at most `row_width` neighbors.
    pub fn new(nodes: usize, row_width: usize) -> Self {
        Self {
            rows: (0..nodes).map(|_| SystemRow::with_width(row_width)).collect(),
            x: vec![0.0; nodes],
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn unknown(&self, i: usize) -> f64 {
        self.x[i]
    }

    pub fn set_unknown(&mut self, i: usize, value: f64) {
        self.x[i] = value;
    }

    pub fn row(&self, i: usize) -> &SystemRow {
        &self.rows[i]
    }

    /// Empties row `i` for reassembly, keeping the entry capacity.
    pub fn clear_row(&mut self, i: usize) {
        let row = &mut self.rows[i];
        row.diagonal = 0.0;
        row.rhs = 0.0;
        row.entries.clear();
    }

    /// Appends a raw off-diagonal coefficient to row `i`.
    pub fn add_entry(&mut self, i: usize, column: usize, value: f64) {
        self.rows[i].entries.push(RowEntry { column, value });
    }

    /// Stores the raw diagonal and normalizes the row by it.
    pub fn finalize_row(&mut self, i: usize, diagonal: f64, rhs: f64) {
        debug_assert!(diagonal != 0.0, "active row {i} needs a nonzero diagonal");
        let row = &mut self.rows[i];
        row.diagonal = diagonal;
        row.rhs = rhs / diagonal;
        for entry in &mut row.entries {
            entry.value /= diagonal;
        }
    }

    /// Marks row `i` as having no equation and pins its unknown to `value`.
    ///
    /// The right-hand side is set to the same value, so a sweep that does
    /// visit the row reproduces the prescribed unknown exactly.
    pub fn deactivate_row(&mut self, i: usize, value: f64) {
        let row = &mut self.rows[i];
        row.diagonal = 0.0;
        row.rhs = value;
        row.entries.clear();
        self.x[i] = value;
    }

    /// Gauss-Seidel candidate for row `i`: rhs minus each stored entry times
    /// the neighbor's current unknown (already-updated values included).
    pub fn candidate(&self, i: usize) -> f64 {
        let row = &self.rows[i];
        let mut value = row.rhs;
        for entry in &row.entries {
            value -= entry.value * self.x[entry.column];
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_normalizes_row() {
        let mut system = LinearSystem::new(2, 2);
        system.add_entry(0, 1, -2.0);
        system.finalize_row(0, 4.0, 8.0);

        let row = system.row(0);
        assert_eq!(row.diagonal(), 4.0);
        assert_eq!(row.rhs(), 2.0);
        assert_eq!(row.entries()[0].value, -0.5);
        assert!(row.is_active());

        system.set_unknown(1, 2.0);
        // candidate = 2 - (-0.5 * 2) = 3
        assert_eq!(system.candidate(0), 3.0);
    }

    #[test]
    fn test_deactivated_row_reproduces_pinned_value() {
        let mut system = LinearSystem::new(2, 2);
        system.add_entry(0, 1, -1.0);
        system.finalize_row(0, 2.0, 1.0);
        system.deactivate_row(0, 285.15);

        let row = system.row(0);
        assert!(!row.is_active());
        assert_eq!(system.unknown(0), 285.15);
        assert_eq!(system.candidate(0), 285.15);
    }

    #[test]
    fn test_rows_rebuild_with_identical_topology() {
        let mut system = LinearSystem::new(3, 2);
        for pass in 0..2 {
            let scale = 1.0 + pass as f64;
            for i in 0..3 {
                system.clear_row(i);
                if i > 0 {
                    system.add_entry(i, i - 1, -scale);
                }
                if i < 2 {
                    system.add_entry(i, i + 1, -scale);
                }
                system.finalize_row(i, 4.0 * scale, 1.0);
            }
        }
        let columns: Vec<usize> = system.row(1).entries().iter().map(|e| e.column).collect();
        assert_eq!(columns, vec![0, 2]);
        assert_eq!(system.row(1).entries()[0].value, -0.25);
    }
}
