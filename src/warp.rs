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

use rand::Rng;

use crate::config::TrainingConfig;
use crate::error::Result;
use crate::factorizer::{Factorizer, Strategy};
use crate::linalg;
use crate::types::{DenseMatrix, Factors, SparseMatrix};
use crate::utils;

pub const LEARNING_RATE: f32 = 0.05;
pub const EPOCHS: usize = 15;
/// How many negatives we sample per positive before giving up on it.
pub const MAX_SAMPLED: usize = 10;
const MARGIN: f32 = 1.0;

/// Matrix factorization with the weighted approximate-rank pairwise (WARP) loss, trained with
/// stochastic gradient descent. For every observed (user, item) pair we sample unobserved
/// items until one violates the margin, and push the pair apart with a step that grows with
/// the estimated rank of the positive item. The matrix entries act as sample weights.
pub struct Warp {
    epochs: usize,
    learning_rate: f32,
    seed: Option<u64>,
}

impl Warp {

    pub fn new(config: &TrainingConfig) -> Self {
        Warp { epochs: EPOCHS, learning_rate: LEARNING_RATE, seed: config.seed }
    }
}

impl Factorizer for Warp {

    fn strategy(&self) -> Strategy {
        Strategy::Warp
    }

    fn factorize(&self, matrix: &SparseMatrix, dimension: usize) -> Result<Factors> {

        let mut rng = utils::rng(self.seed);
        let scale = 1.0 / dimension as f32;
        let mut users = DenseMatrix::random_uniform(matrix.num_rows(), dimension, scale, &mut rng);
        let mut items = DenseMatrix::random_uniform(matrix.num_cols(), dimension, scale, &mut rng);

        let num_items = matrix.num_cols();

        // Without a second item there is nothing to rank against.
        if num_items < 2 {
            return Ok(Factors { users, items });
        }

        let mut positives: Vec<(u32, u32, f32)> = matrix.iter().collect();
        let mut user_snapshot = vec![0.0_f32; dimension];

        for epoch in 0..self.epochs {
            let epoch_start = Instant::now();
            rng.shuffle(&mut positives);

            let mut num_updates = 0;

            for &(user, positive, weight) in positives.iter() {
                let user = user as usize;
                let positive_score = linalg::dot(users.row(user), items.row(positive as usize));

                for trial in 1..MAX_SAMPLED + 1 {
                    let negative = rng.gen_range(0, num_items) as u32;

                    if matrix.contains(user, negative) {
                        continue;
                    }

                    let negative_score = linalg::dot(users.row(user), items.row(negative as usize));

                    if negative_score > positive_score - MARGIN {
                        // estimated rank of the positive item, from the number of trials needed
                        let rank = ((num_items - 1) / trial).max(1) as f32;
                        let step = self.learning_rate * weight * rank.ln();

                        update(&mut users, &mut items, user, positive as usize,
                            negative as usize, step, &mut user_snapshot);
                        num_updates += 1;
                        break;
                    }
                }
            }

            debug!(
                epoch,
                updates = num_updates,
                mse = linalg::mean_squared_error(matrix, &users, &items),
                millis = utils::to_millis(epoch_start.elapsed()),
                "warp epoch finished"
            );
        }

        Ok(Factors { users, items })
    }
}

/// One gradient step on the hinge `1 - u·(p - n)`: the user moves towards `p - n`, the
/// positive item towards the user and the negative item away from it.
fn update(
    users: &mut DenseMatrix,
    items: &mut DenseMatrix,
    user: usize,
    positive: usize,
    negative: usize,
    step: f32,
    user_before: &mut [f32],
) {
    user_before.copy_from_slice(users.row(user));

    {
        let user_factors = users.row_mut(user);
        for k in 0..user_factors.len() {
            user_factors[k] += step * (items.row(positive)[k] - items.row(negative)[k]);
        }
    }

    for (k, value) in items.row_mut(positive).iter_mut().enumerate() {
        *value += step * user_before[k];
    }

    for (k, value) in items.row_mut(negative).iter_mut().enumerate() {
        *value -= step * user_before[k];
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn seeded(seed: u64) -> Warp {
        let mut config = TrainingConfig::default();
        config.seed = Some(seed);
        Warp::new(&config)
    }

    #[test]
    fn output_shapes() {
        let matrix = SparseMatrix::from_entries(3, 5, vec![(0, 0, 1.0), (1, 4, 2.0), (2, 2, 0.5)]);

        let factors = seeded(1).factorize(&matrix, 6).unwrap();

        assert_eq!((factors.users.num_rows(), factors.users.num_cols()), (3, 6));
        assert_eq!((factors.items.num_rows(), factors.items.num_cols()), (5, 6));
    }

    #[test]
    fn single_item_matrices_are_left_alone() {
        let matrix = SparseMatrix::from_entries(2, 1, vec![(0, 0, 1.0), (1, 0, 1.0)]);

        let factors = seeded(2).factorize(&matrix, 3).unwrap();

        assert_eq!(factors.items.num_rows(), 1);
        assert!(factors.users.rows().all(|row| row.iter().all(|value| value.is_finite())));
    }

    #[test]
    fn ranks_observed_items_above_unobserved_ones() {
        // two groups of users with disjoint tastes
        let mut entries = Vec::new();
        for user in 0..20_u32 {
            let offset = if user < 10 { 0 } else { 4 };
            for item in 0..3_u32 {
                entries.push((user, item + offset, 1.0));
            }
        }
        let matrix = SparseMatrix::from_entries(20, 8, entries);

        let factors = seeded(3).factorize(&matrix, 8).unwrap();

        let mut correctly_ordered = 0;
        let mut total = 0;
        for user in 0..20 {
            for positive in matrix.row(user).0.iter() {
                for negative in 0..8_u32 {
                    if !matrix.contains(user, negative) {
                        let positive_score =
                            linalg::dot(factors.users.row(user), factors.items.row(*positive as usize));
                        let negative_score =
                            linalg::dot(factors.users.row(user), factors.items.row(negative as usize));
                        if positive_score > negative_score {
                            correctly_ordered += 1;
                        }
                        total += 1;
                    }
                }
            }
        }

        assert!(correctly_ordered * 4 >= total * 3, "{} of {}", correctly_ordered, total);
    }
}
