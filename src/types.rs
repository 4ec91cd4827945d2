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

use rand::Rng;
use rand::distributions::{IndependentSample, Normal};

/// A weighted observation (external user id, external item id, weight).
pub type Triple = (i64, i64, f32);

/// Sparse matrix in compressed row form. Column indices within a row are sorted ascending and
/// there are never explicit zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    num_rows: usize,
    num_cols: usize,
    row_offsets: Vec<usize>,
    columns: Vec<u32>,
    values: Vec<f32>,
}

impl SparseMatrix {

    /// Assembles a matrix from (row, column, value) entries. Entries for the same cell are
    /// summed, cells which end up at zero are left out.
    pub fn from_entries(
        num_rows: usize,
        num_cols: usize,
        mut entries: Vec<(u32, u32, f32)>,
    ) -> Self {

        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut merged: Vec<(u32, u32, f32)> = Vec::with_capacity(entries.len());
        for (row, col, value) in entries {
            assert!((row as usize) < num_rows && (col as usize) < num_cols,
                "entry ({}, {}) outside of a {}x{} matrix", row, col, num_rows, num_cols);

            match merged.last_mut() {
                Some(last) if last.0 == row && last.1 == col => last.2 += value,
                _ => merged.push((row, col, value)),
            }
        }
        merged.retain(|&(_, _, value)| value != 0.0);

        let mut row_offsets = vec![0; num_rows + 1];
        for &(row, _, _) in merged.iter() {
            row_offsets[row as usize + 1] += 1;
        }
        for row in 0..num_rows {
            row_offsets[row + 1] += row_offsets[row];
        }

        let columns = merged.iter().map(|&(_, col, _)| col).collect();
        let values = merged.iter().map(|&(_, _, value)| value).collect();

        SparseMatrix { num_rows, num_cols, row_offsets, columns, values }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Column indices and values of a row.
    pub fn row(&self, row: usize) -> (&[u32], &[f32]) {
        let start = self.row_offsets[row];
        let end = self.row_offsets[row + 1];
        (&self.columns[start..end], &self.values[start..end])
    }

    pub fn contains(&self, row: usize, col: u32) -> bool {
        self.row(row).0.binary_search(&col).is_ok()
    }

    pub fn get(&self, row: usize, col: u32) -> Option<f32> {
        let (columns, values) = self.row(row);
        columns.binary_search(&col).ok().map(|position| values[position])
    }

    /// All non-zero entries in row-major order.
    pub fn iter<'a>(&'a self) -> impl Iterator<Item=(u32, u32, f32)> + 'a {
        (0..self.num_rows).flat_map(move |row| {
            let (columns, values) = self.row(row);
            columns.iter().zip(values.iter())
                .map(move |(col, value)| (row as u32, *col, *value))
        })
    }

    /// The transposed matrix, which gives us column-wise slicing via `row`.
    pub fn transpose(&self) -> SparseMatrix {
        let entries = self.iter().map(|(row, col, value)| (col, row, value)).collect();
        SparseMatrix::from_entries(self.num_cols, self.num_rows, entries)
    }
}

/// Dense row-major matrix holding one factor vector per row.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    num_rows: usize,
    num_cols: usize,
    values: Vec<f32>,
}

impl DenseMatrix {

    pub fn zeros(num_rows: usize, num_cols: usize) -> Self {
        DenseMatrix { num_rows, num_cols, values: vec![0.0; num_rows * num_cols] }
    }

    /// Independent draws from a zero-mean gaussian.
    pub fn random_normal<R: Rng>(
        num_rows: usize,
        num_cols: usize,
        std_dev: f64,
        rng: &mut R,
    ) -> Self {
        let normal = Normal::new(0.0, std_dev);
        let values = (0..num_rows * num_cols)
            .map(|_| normal.ind_sample(rng) as f32)
            .collect();

        DenseMatrix { num_rows, num_cols, values }
    }

    /// Independent draws from a uniform distribution over [-scale / 2, scale / 2).
    pub fn random_uniform<R: Rng>(num_rows: usize, num_cols: usize, scale: f32, rng: &mut R) -> Self {
        let values = (0..num_rows * num_cols)
            .map(|_| (rng.gen::<f32>() - 0.5) * scale)
            .collect();

        DenseMatrix { num_rows, num_cols, values }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.values[row * self.num_cols..(row + 1) * self.num_cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        let num_cols = self.num_cols;
        &mut self.values[row * num_cols..(row + 1) * num_cols]
    }

    pub fn rows<'a>(&'a self) -> impl Iterator<Item=&'a [f32]> + 'a {
        (0..self.num_rows).map(move |row| self.row(row))
    }
}

/// User embeddings (one row per matrix row) and item embeddings (one row per matrix column).
#[derive(Debug, Clone)]
pub struct Factors {
    pub users: DenseMatrix,
    pub items: DenseMatrix,
}

impl Factors {

    pub fn dimension(&self) -> usize {
        self.users.num_cols()
    }
}
