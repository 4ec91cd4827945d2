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

use fnv::FnvHashMap;

use crate::dictionary::{DataDictionary, Renaming};
use crate::types::{SparseMatrix, Triple};

/// The user x item matrix of a run, together with the mapping back to external identifiers.
#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    pub matrix: SparseMatrix,
    pub renaming: Renaming,
}

impl InteractionMatrix {

    pub fn num_users(&self) -> usize {
        self.matrix.num_rows()
    }

    pub fn num_items(&self) -> usize {
        self.matrix.num_cols()
    }
}

/// Sums up the weights of all triples sharing a (user, item) pair and assembles the sparse
/// matrix. Pairs whose summed weight is not positive are dropped. Returns `None` if nothing is
/// left, which means there is nothing to train on.
pub fn build_matrix(triples: &[Triple]) -> Option<InteractionMatrix> {

    let mut aggregated: FnvHashMap<(i64, i64), f64> =
        FnvHashMap::with_capacity_and_hasher(triples.len(), Default::default());

    for &(user, item, weight) in triples.iter() {
        *aggregated.entry((user, item)).or_insert(0.0) += weight as f64;
    }

    let num_pairs = aggregated.len();
    aggregated.retain(|_, weight| *weight > 0.0);
    let num_positive = aggregated.len();

    // Sums beyond the f32 range would end up as infinite weights in the matrix.
    aggregated.retain(|_, weight| (*weight as f32).is_finite());
    if aggregated.len() < num_positive {
        warn!(
            pairs = num_positive - aggregated.len(),
            "dropped interactions whose summed weight exceeds the f32 range"
        );
    }

    if aggregated.is_empty() {
        return None;
    }

    let data_dict = DataDictionary::from(aggregated.keys().cloned());

    let mut entries: Vec<(u32, u32, f32)> = Vec::with_capacity(aggregated.len());
    for (&(user, item), &weight) in aggregated.iter() {
        // Both ids were fed into the dictionary above.
        if let (Some(row), Some(col)) = (data_dict.user_index(user), data_dict.item_index(item)) {
            entries.push((row, col, weight as f32));
        }
    }

    let matrix = SparseMatrix::from_entries(data_dict.num_users(), data_dict.num_items(), entries);

    debug!(
        users = matrix.num_rows(),
        items = matrix.num_cols(),
        nnz = matrix.nnz(),
        duplicates = triples.len() - num_pairs,
        "assembled interaction matrix"
    );

    Some(InteractionMatrix { matrix, renaming: Renaming::from(data_dict) })
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn empty_input_yields_no_matrix() {
        assert!(build_matrix(&[]).is_none());
    }

    #[test]
    fn only_non_positive_pairs_yield_no_matrix() {
        assert!(build_matrix(&[(1, 2, 0.0), (3, 4, -1.0)]).is_none());
    }

    #[test]
    fn duplicates_are_summed() {
        let triples = vec![(1, 100, 0.5), (1, 100, 1.0), (2, 200, 1.0)];

        let interactions = build_matrix(&triples).unwrap();

        assert_eq!(interactions.num_users(), 2);
        assert_eq!(interactions.num_items(), 2);
        assert_eq!(interactions.matrix.nnz(), 2);

        assert_eq!(interactions.renaming.user_ids(), &[1, 2]);
        assert_eq!(interactions.renaming.item_ids(), &[100, 200]);
        assert_eq!(interactions.matrix.get(0, 0), Some(1.5));
        assert_eq!(interactions.matrix.get(1, 1), Some(1.0));
        assert_eq!(interactions.matrix.get(0, 1), None);
    }

    #[test]
    fn overflowing_sums_are_dropped() {
        let triples = vec![(1, 1, 2e38), (1, 1, 2e38), (2, 2, 1.0)];

        let interactions = build_matrix(&triples).unwrap();

        assert_eq!(interactions.renaming.user_ids(), &[2]);
        assert_eq!(interactions.renaming.item_ids(), &[2]);
        assert!(interactions.matrix.iter().all(|(_, _, weight)| weight.is_finite()));
    }

    #[test]
    fn only_overflowing_pairs_yield_no_matrix() {
        assert!(build_matrix(&[(1, 1, 3e38), (1, 1, 3e38)]).is_none());
    }

    #[test]
    fn large_but_representable_sums_survive() {
        let interactions = build_matrix(&[(1, 1, 1e38), (1, 1, 1e38)]).unwrap();

        assert_eq!(interactions.matrix.get(0, 0), Some(2e38));
    }

    #[test]
    fn identical_input_gives_identical_matrices() {
        let triples = vec![(9, 3, 1.0), (4, 3, 0.2), (9, 1, 0.4), (4, 8, 3.0)];
        let mut shuffled = triples.clone();
        shuffled.swap(0, 3);
        shuffled.swap(1, 2);

        let a = build_matrix(&triples).unwrap();
        let b = build_matrix(&shuffled).unwrap();

        assert_eq!(a.matrix, b.matrix);
        assert_eq!(a.renaming, b.renaming);
    }
}
