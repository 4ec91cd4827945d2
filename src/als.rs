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

use std::time::Instant;

use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::factorizer::{Factorizer, Strategy};
use crate::linalg;
use crate::linalg::NormalEquations;
use crate::types::{DenseMatrix, Factors, SparseMatrix};
use crate::utils;

/// Standard deviation of the gaussian we draw initial factors from.
pub const INIT_STD_DEV: f64 = 0.1;

/// Plain alternating least squares, which we fall back to if no other backend is compiled in.
///
/// Each pass first solves a ridge regression per user with the item factors held fixed, then
/// one per item with the user factors held fixed. Rows without any observations are never
/// touched and keep their random initialization. The number of passes is fixed, there is no
/// convergence check.
pub struct AlternatingLeastSquares {
    iterations: usize,
    regularization: f64,
    seed: Option<u64>,
}

impl AlternatingLeastSquares {

    pub fn new(config: &TrainingConfig) -> Self {
        AlternatingLeastSquares {
            iterations: config.iterations,
            regularization: config.regularization as f64,
            seed: config.seed,
        }
    }
}

impl Factorizer for AlternatingLeastSquares {

    fn strategy(&self) -> Strategy {
        Strategy::FallbackAls
    }

    fn factorize(&self, matrix: &SparseMatrix, dimension: usize) -> Result<Factors> {

        let mut rng = utils::rng(self.seed);
        let mut users = DenseMatrix::random_normal(matrix.num_rows(), dimension, INIT_STD_DEV, &mut rng);
        let mut items = DenseMatrix::random_normal(matrix.num_cols(), dimension, INIT_STD_DEV, &mut rng);

        let by_item = matrix.transpose();

        for iteration in 0..self.iterations {
            let pass_start = Instant::now();

            solve_rows(&mut users, &items, matrix, self.regularization, "user")?;
            solve_rows(&mut items, &users, &by_item, self.regularization, "item")?;

            debug!(
                iteration,
                mse = linalg::mean_squared_error(matrix, &users, &items),
                millis = utils::to_millis(pass_start.elapsed()),
                "als pass finished"
            );
        }

        Ok(Factors { users, items })
    }
}

/// Recomputes every row of `targets` that has observations in `ratings`, holding `fixed`
/// constant. Row `r` of `ratings` refers to row `r` of `targets`, its columns to rows of `fixed`.
fn solve_rows(
    targets: &mut DenseMatrix,
    fixed: &DenseMatrix,
    ratings: &SparseMatrix,
    lambda: f64,
    side: &'static str,
) -> Result<()> {

    let mut equations = NormalEquations::new(targets.num_cols());

    for row in 0..ratings.num_rows() {
        let (columns, values) = ratings.row(row);

        if columns.is_empty() {
            continue;
        }

        equations.reset();
        for (col, value) in columns.iter().zip(values.iter()) {
            equations.add(fixed.row(*col as usize), *value);
        }
        equations.regularize(lambda);

        if !equations.solve_into(targets.row_mut(row)) {
            return Err(Error::NumericSolve { side, index: row });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;

    fn seeded(iterations: usize, seed: u64) -> AlternatingLeastSquares {
        let mut config = TrainingConfig::default();
        config.iterations = iterations;
        config.seed = Some(seed);
        AlternatingLeastSquares::new(&config)
    }

    fn small_matrix() -> SparseMatrix {
        SparseMatrix::from_entries(3, 4, vec![
            (0, 0, 3.0), (0, 1, 1.0),
            (1, 1, 2.0), (1, 2, 0.5),
            (2, 0, 1.0), (2, 3, 2.5),
        ])
    }

    #[test]
    fn output_shapes() {
        for &(m, n, d) in [(1, 1, 1), (3, 4, 2), (4, 3, 8), (2, 7, 32)].iter() {
            let entries = (0..m.max(n)).map(|i| ((i % m) as u32, (i % n) as u32, 1.0)).collect();
            let matrix = SparseMatrix::from_entries(m, n, entries);

            let factors = seeded(2, 1).factorize(&matrix, d).unwrap();

            assert_eq!((factors.users.num_rows(), factors.users.num_cols()), (m, d));
            assert_eq!((factors.items.num_rows(), factors.items.num_cols()), (n, d));
            assert_eq!(factors.dimension(), d);
        }
    }

    #[test]
    fn cold_rows_keep_their_initialization() {
        // user 1 and item 2 have no observations at all
        let matrix = SparseMatrix::from_entries(3, 3, vec![(0, 0, 1.0), (2, 1, 2.0), (0, 1, 0.5)]);

        let mut rng = utils::rng(Some(11));
        let initial_users = DenseMatrix::random_normal(3, 4, INIT_STD_DEV, &mut rng);
        let initial_items = DenseMatrix::random_normal(3, 4, INIT_STD_DEV, &mut rng);

        let factors = seeded(10, 11).factorize(&matrix, 4).unwrap();

        assert_eq!(factors.users.row(1), initial_users.row(1));
        assert_eq!(factors.items.row(2), initial_items.row(2));
        assert!(factors.users.row(1).iter().any(|value| *value != 0.0));
        assert!(factors.users.row(0) != initial_users.row(0));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let matrix = small_matrix();

        let a = seeded(5, 3).factorize(&matrix, 4).unwrap();
        let b = seeded(5, 3).factorize(&matrix, 4).unwrap();

        assert_eq!(a.users, b.users);
        assert_eq!(a.items, b.items);
    }

    #[test]
    fn fits_the_observed_entries() {
        let matrix = small_matrix();

        let mut rng = utils::rng(Some(5));
        let initial_users = DenseMatrix::random_normal(3, 8, INIT_STD_DEV, &mut rng);
        let initial_items = DenseMatrix::random_normal(4, 8, INIT_STD_DEV, &mut rng);
        let initial_error = linalg::mean_squared_error(&matrix, &initial_users, &initial_items);

        let factors = seeded(10, 5).factorize(&matrix, 8).unwrap();
        let error = linalg::mean_squared_error(&matrix, &factors.users, &factors.items);

        assert!(error < 0.25 * initial_error, "{} vs. {}", error, initial_error);
    }

    #[test]
    fn zero_iterations_return_the_initialization() {
        let matrix = small_matrix();

        let mut rng = utils::rng(Some(9));
        let initial_users = DenseMatrix::random_normal(3, 2, INIT_STD_DEV, &mut rng);

        let factors = seeded(0, 9).factorize(&matrix, 2).unwrap();

        assert_eq!(factors.users, initial_users);
    }
}
