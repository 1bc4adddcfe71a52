//! Optional linear constraints over the flat variable vector.
//!
//! `lower ≤ A·x ≤ upper`, with `A` given as `(row, col, value)` triplets.
//! The rows are appended after every scenario's nonlinear rows and their
//! Jacobian values never change.

use crate::ScopfError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearConstraints {
    pub entries: Vec<(usize, usize, f64)>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl LinearConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one row `lower ≤ Σ coef·x[col] ≤ upper` and return its index.
    pub fn add_row(&mut self, terms: &[(usize, f64)], lower: f64, upper: f64) -> usize {
        let row = self.lower.len();
        self.entries
            .extend(terms.iter().map(|&(col, coef)| (row, col, coef)));
        self.lower.push(lower);
        self.upper.push(upper);
        row
    }

    pub fn n_rows(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn validate(&self, n_vars: usize) -> Result<(), ScopfError> {
        ScopfError::check_len("linear constraint upper bounds", self.lower.len(), self.upper.len())?;
        for &(row, col, value) in &self.entries {
            if row >= self.n_rows() || col >= n_vars {
                return Err(ScopfError::DataValidation(format!(
                    "linear constraint entry ({row}, {col}) outside {} x {n_vars}",
                    self.n_rows()
                )));
            }
            if !value.is_finite() {
                return Err(ScopfError::DataValidation(format!(
                    "linear constraint entry ({row}, {col}) is not finite"
                )));
            }
        }
        for (row, (lo, up)) in self.lower.iter().zip(&self.upper).enumerate() {
            if lo > up {
                return Err(ScopfError::DataValidation(format!(
                    "linear constraint row {row} has lower {lo} above upper {up}"
                )));
            }
        }
        Ok(())
    }

    /// `A·x`
    pub fn evaluate(&self, x: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.n_rows()];
        for &(row, col, value) in &self.entries {
            out[row] += value * x[col];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_row_and_evaluate() {
        let mut lin = LinearConstraints::new();
        lin.add_row(&[(0, 1.0), (2, -1.0)], -0.1, 0.1);
        let r = lin.add_row(&[(1, 2.0)], 0.0, f64::INFINITY);
        assert_eq!(r, 1);
        assert!(lin.validate(3).is_ok());
        assert_eq!(lin.evaluate(&[1.0, 0.5, 0.25]), vec![0.75, 1.0]);
    }

    #[test]
    fn test_validate_rejects_bad_column() {
        let mut lin = LinearConstraints::new();
        lin.add_row(&[(5, 1.0)], 0.0, 1.0);
        assert!(lin.validate(3).is_err());
    }

    #[test]
    fn test_validate_rejects_crossed_bounds() {
        let mut lin = LinearConstraints::new();
        lin.add_row(&[(0, 1.0)], 2.0, 1.0);
        assert!(lin.validate(1).is_err());
    }
}
