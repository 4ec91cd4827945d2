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

use std::time::Duration;

use rand::{SeedableRng, XorShiftRng};

pub fn to_millis(duration: Duration) -> u64 {
    (duration.as_secs() * 1_000) + (duration.subsec_nanos() / 1_000_000) as u64
}

/// A fast generator for parameter initialization, reproducible if a seed is given.
pub fn rng(seed: Option<u64>) -> XorShiftRng {
    match seed {
        // xorshift must not be seeded with all zeros, the constant words take care of that
        Some(seed) => XorShiftRng::from_seed([
            seed as u32,
            (seed >> 32) as u32,
            0x9E37_79B9,
            0x7F4A_7C15,
        ]),
        None => rand::weak_rng(),
    }
}
