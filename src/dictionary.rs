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

/// Maps external user and item identifiers onto consecutive indices. Indices are handed out in
/// ascending order of the identifiers, so identical inputs always produce identical mappings.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDictionary {
    user_dict: FnvHashMap<i64, u32>,
    item_dict: FnvHashMap<i64, u32>,
}

impl DataDictionary {

    pub fn num_users(&self) -> usize {
        self.user_dict.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_dict.len()
    }

    pub fn user_index(&self, user_id: i64) -> Option<u32> {
        self.user_dict.get(&user_id).cloned()
    }

    pub fn item_index(&self, item_id: i64) -> Option<u32> {
        self.item_dict.get(&item_id).cloned()
    }
}

impl DataDictionary {

    pub fn from<I>(pairs: I) -> Self where I: Iterator<Item=(i64, i64)> {

        let mut users: Vec<i64> = Vec::new();
        let mut items: Vec<i64> = Vec::new();

        for (user, item) in pairs {
            users.push(user);
            items.push(item);
        }

        DataDictionary {
            user_dict: sorted_positions(users),
            item_dict: sorted_positions(items),
        }
    }
}

fn sorted_positions(mut ids: Vec<i64>) -> FnvHashMap<i64, u32> {
    ids.sort();
    ids.dedup();

    let mut dict = FnvHashMap::with_capacity_and_hasher(ids.len(), Default::default());
    for (index, id) in ids.into_iter().enumerate() {
        dict.insert(id, index as u32);
    }

    dict
}

/// The inverse of a `DataDictionary`, used to recover external identifiers at write time.
#[derive(Debug, Clone, PartialEq)]
pub struct Renaming {
    user_ids: Vec<i64>,
    item_ids: Vec<i64>,
}

impl Renaming {

    pub fn user_id(&self, user_index: u32) -> i64 {
        self.user_ids[user_index as usize]
    }

    pub fn item_id(&self, item_index: u32) -> i64 {
        self.item_ids[item_index as usize]
    }

    /// External user identifiers, position `i` belongs to user index `i`.
    pub fn user_ids(&self) -> &[i64] {
        &self.user_ids
    }

    pub fn item_ids(&self) -> &[i64] {
        &self.item_ids
    }
}

impl From<DataDictionary> for Renaming {

    fn from(data_dict: DataDictionary) -> Self {

        let mut user_ids = vec![0; data_dict.num_users()];
        let mut item_ids = vec![0; data_dict.num_items()];

        for (user, user_index) in data_dict.user_dict.into_iter() {
            user_ids[user_index as usize] = user;
        }

        for (item, item_index) in data_dict.item_dict.into_iter() {
            item_ids[item_index as usize] = item;
        }

        Renaming { user_ids, item_ids }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn positions_follow_sorted_order() {
        let data_dict = DataDictionary::from(vec![(30, 7), (10, 9), (20, 7), (10, -3)].into_iter());

        assert_eq!(data_dict.num_users(), 3);
        assert_eq!(data_dict.num_items(), 3);
        assert_eq!(data_dict.user_index(10), Some(0));
        assert_eq!(data_dict.user_index(20), Some(1));
        assert_eq!(data_dict.user_index(30), Some(2));
        assert_eq!(data_dict.item_index(-3), Some(0));
        assert_eq!(data_dict.item_index(7), Some(1));
        assert_eq!(data_dict.item_index(9), Some(2));
        assert_eq!(data_dict.user_index(40), None);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let pairs = vec![(5, 1), (3, 2), (4, 3), (3, 1)];
        let mut reversed = pairs.clone();
        reversed.reverse();

        assert_eq!(DataDictionary::from(pairs.into_iter()),
            DataDictionary::from(reversed.into_iter()));
    }

    #[test]
    fn renaming_inverts_the_dictionary() {
        let data_dict = DataDictionary::from(vec![(42, 1000), (17, 1001), (42, 999)].into_iter());
        let user_index = data_dict.user_index(42).unwrap();
        let item_index = data_dict.item_index(1001).unwrap();

        let renaming = Renaming::from(data_dict);

        assert_eq!(renaming.user_id(user_index), 42);
        assert_eq!(renaming.item_id(item_index), 1001);
        assert_eq!(renaming.user_ids(), &[17, 42]);
        assert_eq!(renaming.item_ids(), &[999, 1000, 1001]);
    }
}
