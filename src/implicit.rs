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

use discorec::{Dataset, RecommenderBuilder};

use crate::als::INIT_STD_DEV;
use crate::config::TrainingConfig;
use crate::error::Result;
use crate::factorizer::{Factorizer, Strategy};
use crate::types::{DenseMatrix, Factors, SparseMatrix};
use crate::utils;

pub const ITERATIONS: usize = 20;
pub const REGULARIZATION: f32 = 0.01;

/// Implicit-feedback ALS as implemented by the `discorec` crate. The library works on our
/// dense indices directly, so its factors line up with the rows of the interaction matrix.
pub struct ImplicitAls {
    iterations: usize,
    regularization: f32,
    seed: Option<u64>,
}

impl ImplicitAls {

    pub fn new(config: &TrainingConfig) -> Self {
        ImplicitAls { iterations: ITERATIONS, regularization: REGULARIZATION, seed: config.seed }
    }
}

impl Factorizer for ImplicitAls {

    fn strategy(&self) -> Strategy {
        Strategy::ImplicitAls
    }

    fn factorize(&self, matrix: &SparseMatrix, dimension: usize) -> Result<Factors> {

        let mut data = Dataset::new();
        for (user, item, weight) in matrix.iter() {
            data.push(user, item, weight);
        }

        let recommender = RecommenderBuilder::new()
            .factors(dimension)
            .iterations(self.iterations)
            .regularization(self.regularization)
            .fit_implicit(&data);

        // Rows the library never saw keep a random vector, same as with our own ALS.
        let mut rng = utils::rng(self.seed);
        let mut users = DenseMatrix::random_normal(matrix.num_rows(), dimension, INIT_STD_DEV, &mut rng);
        let mut items = DenseMatrix::random_normal(matrix.num_cols(), dimension, INIT_STD_DEV, &mut rng);

        for user in 0..matrix.num_rows() as u32 {
            if let Some(factors) = recommender.user_factors(&user) {
                users.row_mut(user as usize).copy_from_slice(&factors.to_vec());
            }
        }

        for item in 0..matrix.num_cols() as u32 {
            if let Some(factors) = recommender.item_factors(&item) {
                items.row_mut(item as usize).copy_from_slice(&factors.to_vec());
            }
        }

        Ok(Factors { users, items })
    }
}
