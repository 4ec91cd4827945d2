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

use std::io;
use std::result;

use thiserror::Error;

/// Everything that can go wrong during a training run. There is no local recovery anywhere,
/// errors travel up to the binary which terminates the process.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("postgres error: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("mysql error: {0}")]
    Mysql(#[from] sqlx::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot (de)serialize factor vector: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cannot parse timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    /// Regularization keeps the normal equations positive definite, so this indicates a defect.
    #[error("normal equations for {side} {index} are not positive definite")]
    NumericSolve { side: &'static str, index: usize },

    #[error("factorization strategy '{0}' is not available in this build")]
    Unavailable(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }
}

pub type Result<T> = result::Result<T, Error>;
