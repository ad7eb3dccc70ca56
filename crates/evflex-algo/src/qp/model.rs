//! Incrementally built convex quadratic program.
//!
//! ```text
//! minimize    ½·xᵀPx + qᵀx + c
//! subject to  A_eq·x  = b_eq
//!             A_le·x ≤ b_le
//!             l ≤ x ≤ u
//! ```
//!
//! `P` is kept as its upper triangle, which is what conic interior-point
//! solvers expect. Variable bounds are stored separately and turned into
//! inequality rows by the backend.

use std::collections::BTreeMap;

/// Handle to a variable of one [`QpModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One linear row: Σ coeff·x  (=|≤)  rhs. Coefficients are merged per column.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRow {
    pub coeffs: Vec<(usize, f64)>,
    pub rhs: f64,
}

impl LinearRow {
    fn new(coeffs: &[(VarId, f64)], rhs: f64) -> Self {
        let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
        for &(var, coeff) in coeffs {
            *merged.entry(var.0).or_insert(0.0) += coeff;
        }
        Self {
            coeffs: merged.into_iter().filter(|(_, c)| *c != 0.0).collect(),
            rhs,
        }
    }

    fn activity(&self, x: &[f64]) -> f64 {
        self.coeffs.iter().map(|&(col, c)| c * x[col]).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QpModel {
    lower: Vec<f64>,
    upper: Vec<f64>,
    equalities: Vec<LinearRow>,
    inequalities: Vec<LinearRow>,
    /// Upper triangle of P keyed by (row, col) with row <= col.
    quadratic: BTreeMap<(usize, usize), f64>,
    linear: Vec<f64>,
    constant: f64,
}

impl QpModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a continuous variable with bounds `[lower, upper]` (infinite allowed).
    pub fn add_var(&mut self, lower: f64, upper: f64) -> VarId {
        let id = VarId(self.lower.len());
        self.lower.push(lower);
        self.upper.push(upper);
        self.linear.push(0.0);
        id
    }

    pub fn add_eq(&mut self, coeffs: &[(VarId, f64)], rhs: f64) {
        self.equalities.push(LinearRow::new(coeffs, rhs));
    }

    pub fn add_leq(&mut self, coeffs: &[(VarId, f64)], rhs: f64) {
        self.inequalities.push(LinearRow::new(coeffs, rhs));
    }

    /// Σ coeff·x ≥ rhs, stored as −Σ coeff·x ≤ −rhs.
    pub fn add_geq(&mut self, coeffs: &[(VarId, f64)], rhs: f64) {
        let negated: Vec<(VarId, f64)> = coeffs.iter().map(|&(v, c)| (v, -c)).collect();
        self.inequalities.push(LinearRow::new(&negated, -rhs));
    }

    /// Add `coeff·x` to the objective.
    pub fn add_linear_cost(&mut self, var: VarId, coeff: f64) {
        self.linear[var.0] += coeff;
    }

    /// Add `coeff·x_a·x_b` to the objective.
    ///
    /// In `½xᵀPx` form a square term contributes `2·coeff` on the diagonal
    /// and a cross term contributes `coeff` to the upper-triangle entry.
    pub fn add_quadratic_cost(&mut self, a: VarId, b: VarId, coeff: f64) {
        let (row, col) = if a.0 <= b.0 { (a.0, b.0) } else { (b.0, a.0) };
        let entry = if row == col { 2.0 * coeff } else { coeff };
        *self.quadratic.entry((row, col)).or_insert(0.0) += entry;
    }

    pub fn add_constant_cost(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn num_vars(&self) -> usize {
        self.lower.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.equalities.len() + self.inequalities.len()
    }

    pub fn bounds(&self, var: VarId) -> (f64, f64) {
        (self.lower[var.0], self.upper[var.0])
    }

    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    pub fn equalities(&self) -> &[LinearRow] {
        &self.equalities
    }

    pub fn inequalities(&self) -> &[LinearRow] {
        &self.inequalities
    }

    pub fn quadratic_entries(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
        self.quadratic.iter().map(|(&k, &v)| (k, v))
    }

    pub fn linear_costs(&self) -> &[f64] {
        &self.linear
    }

    pub fn constant_cost(&self) -> f64 {
        self.constant
    }

    /// Objective value at a point.
    pub fn objective_value(&self, x: &[f64]) -> f64 {
        let quad: f64 = self
            .quadratic
            .iter()
            .map(|(&(r, c), &v)| {
                if r == c {
                    0.5 * v * x[r] * x[r]
                } else {
                    v * x[r] * x[c]
                }
            })
            .sum();
        let lin: f64 = self.linear.iter().zip(x).map(|(q, xi)| q * xi).sum();
        quad + lin + self.constant
    }

    /// Largest violation of any bound or constraint at `x`.
    pub fn max_violation(&self, x: &[f64]) -> f64 {
        let bounds = self
            .lower
            .iter()
            .zip(&self.upper)
            .zip(x)
            .map(|((&l, &u), &xi)| (l - xi).max(xi - u).max(0.0));
        let eqs = self
            .equalities
            .iter()
            .map(|row| (row.activity(x) - row.rhs).abs());
        let les = self
            .inequalities
            .iter()
            .map(|row| (row.activity(x) - row.rhs).max(0.0));
        bounds.chain(eqs).chain(les).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_merge_repeated_columns() {
        let mut model = QpModel::new();
        let x = model.add_var(0.0, 1.0);
        let y = model.add_var(0.0, 1.0);
        model.add_eq(&[(x, 1.0), (y, 2.0), (x, 0.5)], 3.0);
        assert_eq!(model.equalities()[0].coeffs, vec![(0, 1.5), (1, 2.0)]);
    }

    #[test]
    fn geq_is_stored_negated() {
        let mut model = QpModel::new();
        let x = model.add_var(0.0, 10.0);
        model.add_geq(&[(x, 1.0)], 4.0);
        let row = &model.inequalities()[0];
        assert_eq!(row.coeffs, vec![(0, -1.0)]);
        assert_eq!(row.rhs, -4.0);
        assert!(model.max_violation(&[3.0]) > 0.9);
        assert_eq!(model.max_violation(&[5.0]), 0.0);
    }

    #[test]
    fn objective_matches_expanded_square() {
        // (x + y)^2 + 2x
        let mut model = QpModel::new();
        let x = model.add_var(f64::NEG_INFINITY, f64::INFINITY);
        let y = model.add_var(f64::NEG_INFINITY, f64::INFINITY);
        model.add_quadratic_cost(x, x, 1.0);
        model.add_quadratic_cost(y, y, 1.0);
        model.add_quadratic_cost(y, x, 2.0);
        model.add_linear_cost(x, 2.0);
        let value = model.objective_value(&[1.5, -0.5]);
        assert!((value - (1.0 + 3.0)).abs() < 1e-12);
    }
}
