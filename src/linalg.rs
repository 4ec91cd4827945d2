/**
 * RecoFactors
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use crate::types::{DenseMatrix, SparseMatrix};

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Mean squared error of the factor products over the observed entries only.
pub fn mean_squared_error(
    matrix: &SparseMatrix,
    users: &DenseMatrix,
    items: &DenseMatrix,
) -> f64 {
    if matrix.nnz() == 0 {
        return 0.0;
    }

    let sum: f64 = matrix.iter()
        .map(|(user, item, value)| {
            let error = value - dot(users.row(user as usize), items.row(item as usize));
            (error * error) as f64
        })
        .sum();

    sum / matrix.nnz() as f64
}

/// Accumulates the normal equations `(Σ v vᵀ + λI) x = Σ r v` of a ridge regression in
/// double precision. `a` is a dense, row-major `k x k` matrix.
pub struct NormalEquations {
    k: usize,
    a: Vec<f64>,
    b: Vec<f64>,
}

impl NormalEquations {

    pub fn new(k: usize) -> Self {
        NormalEquations { k, a: vec![0.0; k * k], b: vec![0.0; k] }
    }

    pub fn reset(&mut self) {
        for value in self.a.iter_mut() { *value = 0.0; }
        for value in self.b.iter_mut() { *value = 0.0; }
    }

    /// Adds the observation `target ≈ vᵀx`.
    pub fn add(&mut self, v: &[f32], target: f32) {
        let k = self.k;
        for i in 0..k {
            let v_i = v[i] as f64;
            // lower triangle only, the solver never reads the upper half
            for j in 0..i + 1 {
                self.a[i * k + j] += v_i * v[j] as f64;
            }
            self.b[i] += v_i * target as f64;
        }
    }

    pub fn regularize(&mut self, lambda: f64) {
        for i in 0..self.k {
            self.a[i * self.k + i] += lambda;
        }
    }

    /// Solves the system via a Cholesky decomposition into `x`, consumes the accumulated
    /// state in the process. Returns false if the system is not positive definite.
    pub fn solve_into(&mut self, x: &mut [f32]) -> bool {
        if !cholesky_in_place(&mut self.a, self.k) {
            return false;
        }
        substitute(&self.a, self.k, &mut self.b);

        for (target, value) in x.iter_mut().zip(self.b.iter()) {
            *target = *value as f32;
        }
        true
    }
}

/// Overwrites the lower triangle of `a` with `L` where `A = L Lᵀ`.
fn cholesky_in_place(a: &mut [f64], k: usize) -> bool {
    for i in 0..k {
        for j in 0..i + 1 {
            let mut sum = a[i * k + j];
            for p in 0..j {
                sum -= a[i * k + p] * a[j * k + p];
            }

            if i == j {
                if !(sum > 0.0) {
                    return false;
                }
                a[i * k + i] = sum.sqrt();
            } else {
                a[i * k + j] = sum / a[j * k + j];
            }
        }
    }
    true
}

/// Forward substitution `L y = b` followed by backward substitution `Lᵀ x = y`, in place.
fn substitute(l: &[f64], k: usize, b: &mut [f64]) {
    for i in 0..k {
        let mut sum = b[i];
        for p in 0..i {
            sum -= l[i * k + p] * b[p];
        }
        b[i] = sum / l[i * k + i];
    }

    for i in (0..k).rev() {
        let mut sum = b[i];
        for p in i + 1..k {
            sum -= l[p * k + i] * b[p];
        }
        b[i] = sum / l[i * k + i];
    }
}
