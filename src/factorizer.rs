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

use std::fmt;
use std::str::FromStr;

use crate::als::AlternatingLeastSquares;
use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::types::{Factors, SparseMatrix};

/// Computes user and item embeddings whose inner products approximate the matrix entries.
/// Implementations must return one user row per matrix row and one item row per matrix
/// column, each with `dimension` columns.
pub trait Factorizer {

    fn strategy(&self) -> Strategy;

    fn factorize(&self, matrix: &SparseMatrix, dimension: usize) -> Result<Factors>;
}

/// The available factorization backends, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "implicit-als")]
    ImplicitAls,
    #[serde(rename = "warp")]
    Warp,
    #[serde(rename = "als")]
    FallbackAls,
}

pub const PREFERENCE_ORDER: [Strategy; 3] =
    [Strategy::ImplicitAls, Strategy::Warp, Strategy::FallbackAls];

impl Strategy {

    pub fn name(&self) -> &'static str {
        match *self {
            Strategy::ImplicitAls => "implicit-als",
            Strategy::Warp => "warp",
            Strategy::FallbackAls => "als",
        }
    }

    /// Whether this build carries the backend, decided by cargo features at compile time.
    pub fn is_available(&self) -> bool {
        match *self {
            Strategy::ImplicitAls => cfg!(feature = "implicit-als"),
            Strategy::Warp => cfg!(feature = "warp"),
            Strategy::FallbackAls => true,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(name: &str) -> Result<Strategy> {
        PREFERENCE_ORDER.iter()
            .find(|strategy| strategy.name() == name.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| Error::config(format!(
                "unknown factorization strategy '{}', expected one of implicit-als, warp, als",
                name)))
    }
}

/// Picks the requested strategy, or the first available one in preference order.
pub fn select(config: &TrainingConfig) -> Result<Box<dyn Factorizer>> {
    let strategy = match config.strategy {
        Some(strategy) if !strategy.is_available() => {
            return Err(Error::Unavailable(strategy.name()));
        },
        Some(strategy) => strategy,
        None => PREFERENCE_ORDER.iter()
            .find(|strategy| strategy.is_available())
            .cloned()
            .unwrap_or(Strategy::FallbackAls),
    };

    build(strategy, config)
}

/// Instantiates a strategy, fails for strategies this build does not carry.
pub fn build(strategy: Strategy, config: &TrainingConfig) -> Result<Box<dyn Factorizer>> {
    let factorizer: Box<dyn Factorizer> = match strategy {
        Strategy::ImplicitAls => implicit_als(config)?,
        Strategy::Warp => warp(config)?,
        Strategy::FallbackAls => Box::new(AlternatingLeastSquares::new(config)),
    };

    Ok(factorizer)
}

#[cfg(feature = "implicit-als")]
fn implicit_als(config: &TrainingConfig) -> Result<Box<dyn Factorizer>> {
    Ok(Box::new(crate::implicit::ImplicitAls::new(config)))
}

#[cfg(not(feature = "implicit-als"))]
fn implicit_als(_: &TrainingConfig) -> Result<Box<dyn Factorizer>> {
    Err(Error::Unavailable(Strategy::ImplicitAls.name()))
}

#[cfg(feature = "warp")]
fn warp(config: &TrainingConfig) -> Result<Box<dyn Factorizer>> {
    Ok(Box::new(crate::warp::Warp::new(config)))
}

#[cfg(not(feature = "warp"))]
fn warp(_: &TrainingConfig) -> Result<Box<dyn Factorizer>> {
    Err(Error::Unavailable(Strategy::Warp.name()))
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn strategy_names() {
        assert_eq!("implicit-als".parse::<Strategy>().unwrap(), Strategy::ImplicitAls);
        assert_eq!("WARP".parse::<Strategy>().unwrap(), Strategy::Warp);
        assert_eq!(" als ".parse::<Strategy>().unwrap(), Strategy::FallbackAls);
        assert!("lightfm".parse::<Strategy>().is_err());
        assert_eq!(Strategy::Warp.to_string(), "warp");
    }

    #[test]
    fn fallback_is_always_available() {
        assert!(Strategy::FallbackAls.is_available());
    }

    #[test]
    fn first_available_strategy_wins() {
        let factorizer = select(&TrainingConfig::default()).unwrap();

        let expected = PREFERENCE_ORDER.iter().find(|strategy| strategy.is_available()).unwrap();
        assert_eq!(factorizer.strategy(), *expected);
    }

    #[test]
    fn requested_strategy_is_honoured() {
        let mut config = TrainingConfig::default();
        config.strategy = Some(Strategy::FallbackAls);

        assert_eq!(select(&config).unwrap().strategy(), Strategy::FallbackAls);
    }

    #[test]
    fn unavailable_strategies_are_rejected() {
        for strategy in PREFERENCE_ORDER.iter().filter(|strategy| !strategy.is_available()) {
            let mut config = TrainingConfig::default();
            config.strategy = Some(*strategy);

            match select(&config) {
                Err(Error::Unavailable(name)) => assert_eq!(name, strategy.name()),
                _ => panic!("{} should not be selectable", strategy),
            }
        }
    }

    #[test]
    fn builds_exactly_the_compiled_in_strategies() {
        let config = TrainingConfig::default();

        for strategy in PREFERENCE_ORDER.iter() {
            match build(*strategy, &config) {
                Ok(factorizer) => {
                    assert!(strategy.is_available());
                    assert_eq!(factorizer.strategy(), *strategy);
                },
                Err(Error::Unavailable(name)) => {
                    assert!(!strategy.is_available());
                    assert_eq!(name, strategy.name());
                },
                Err(failure) => panic!("unexpected failure: {}", failure),
            }
        }
    }
}
