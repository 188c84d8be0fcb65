//! Small dense linear algebra
//!
//! Matrices here are at most a few dozen rows wide (one row per random
//! variable), so everything is a plain row-major `Vec<f64>`.

use serde::{Deserialize, Serialize};

use crate::error::LinalgError;

/// Square row-major matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    n: usize,
    data: Vec<f64>,
}

impl Matrix {
    #[must_use]
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    #[must_use]
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    #[must_use]
    pub fn diagonal(values: &[f64]) -> Self {
        let mut m = Self::zeros(values.len());
        for (i, v) in values.iter().enumerate() {
            m[(i, i)] = *v;
        }
        m
    }

    /// Build from rows; every row must have `rows.len()` entries.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, LinalgError> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for row in rows {
            if row.len() != n {
                return Err(LinalgError::DimensionMismatch {
                    expected: n,
                    found: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { n, data })
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// y = A·x
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.n);
        (0..self.n).map(|i| dot(self.row(i), x)).collect()
    }

    /// y = Aᵀ·x
    pub fn transpose_mul_vec(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.n);
        let mut out = vec![0.0; self.n];
        for (i, xi) in x.iter().enumerate() {
            for (j, o) in out.iter_mut().enumerate() {
                *o += self[(i, j)] * xi;
            }
        }
        out
    }

    /// C = A·B
    pub fn mul(&self, other: &Matrix) -> Matrix {
        debug_assert_eq!(self.n, other.n);
        let n = self.n;
        let mut out = Matrix::zeros(n);
        for i in 0..n {
            for k in 0..n {
                let a = self[(i, k)];
                if a == 0.0 {
                    continue;
                }
                for j in 0..n {
                    out[(i, j)] += a * other[(k, j)];
                }
            }
        }
        out
    }

    #[must_use]
    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::zeros(self.n);
        for i in 0..self.n {
            for j in 0..self.n {
                out[(j, i)] = self[(i, j)];
            }
        }
        out
    }

    /// Lower Cholesky factor L with A = L·Lᵀ
    pub fn cholesky(&self) -> Result<Matrix, LinalgError> {
        let n = self.n;
        let mut l = Matrix::zeros(n);
        for i in 0..n {
            for j in 0..=i {
                let mut sum = self[(i, j)];
                for k in 0..j {
                    sum -= l[(i, k)] * l[(j, k)];
                }
                if i == j {
                    if sum <= 0.0 || !sum.is_finite() {
                        return Err(LinalgError::NotPositiveDefinite { row: i });
                    }
                    l[(i, i)] = sum.sqrt();
                } else {
                    l[(i, j)] = sum / l[(j, j)];
                }
            }
        }
        Ok(l)
    }

    /// Inverse of a lower triangular matrix by forward substitution
    pub fn lower_triangular_inverse(&self) -> Result<Matrix, LinalgError> {
        let n = self.n;
        let mut inv = Matrix::zeros(n);
        for col in 0..n {
            for i in col..n {
                let mut sum = if i == col { 1.0 } else { 0.0 };
                for k in col..i {
                    sum -= self[(i, k)] * inv[(k, col)];
                }
                let pivot = self[(i, i)];
                if pivot == 0.0 {
                    return Err(LinalgError::Singular { row: i });
                }
                inv[(i, col)] = sum / pivot;
            }
        }
        Ok(inv)
    }

    /// Inverse of a symmetric positive definite matrix, A⁻¹ = L⁻ᵀ·L⁻¹
    pub fn spd_inverse(&self) -> Result<Matrix, LinalgError> {
        let l_inv = self.cholesky()?.lower_triangular_inverse()?;
        Ok(l_inv.transpose().mul(&l_inv))
    }

    /// xᵀ·A·x
    pub fn quadratic_form(&self, x: &[f64]) -> f64 {
        dot(x, &self.mul_vec(x))
    }
}

impl std::ops::Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.n + j]
    }
}

impl std::ops::IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.n + j]
    }
}

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}
