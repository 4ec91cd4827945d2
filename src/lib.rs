extern crate chrono;
extern crate figment;
extern crate fnv;
extern crate postgres;
extern crate rand;
extern crate rusqlite;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate sqlx;
extern crate thiserror;
extern crate tokio;
#[macro_use]
extern crate tracing;

#[cfg(feature = "implicit-als")]
extern crate discorec;

#[cfg(test)]
extern crate tempfile;

use std::time::Instant;

use chrono::{Local, NaiveDateTime, Timelike};

pub mod types;
pub mod error;
pub mod config;
pub mod utils;
pub mod extract;
pub mod dictionary;
pub mod matrix;
pub mod linalg;
pub mod factorizer;
pub mod als;
#[cfg(feature = "warp")]
pub mod warp;
#[cfg(feature = "implicit-als")]
pub mod implicit;
pub mod store;
pub mod pg;
pub mod mysql;
pub mod sqlite;
pub mod io;


use config::Config;
use error::Result;
use factorizer::Factorizer;
use store::Connector;

/// What a training run amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// There was nothing to train on, the factor tables were left untouched.
    NoInteractions,
    Trained(Summary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub num_users: usize,
    pub num_items: usize,
    pub dimension: usize,
}

/// Wall-clock time of the run with second precision, shared by all rows we write.
pub fn run_timestamp() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Extracts the interactions, factorizes them with the first available strategy and replaces
/// the factor tables. Every step opens and releases its own connection.
pub fn train(config: &Config, connector: &dyn Connector) -> Result<Outcome> {
    let factorizer = factorizer::select(&config.training)?;
    train_with(config, connector, &*factorizer, run_timestamp())
}

pub fn train_with(
    config: &Config,
    connector: &dyn Connector,
    factorizer: &dyn Factorizer,
    updated_at: NaiveDateTime,
) -> Result<Outcome> {

    let dimension = config.training.dimension;

    let extract_start = Instant::now();
    let triples = {
        let mut store = connector.connect()?;
        extract::interactions(&mut *store)?
    };
    info!(
        triples = triples.len(),
        millis = utils::to_millis(extract_start.elapsed()),
        "read interactions"
    );

    let interactions = match matrix::build_matrix(&triples) {
        Some(interactions) => interactions,
        None => {
            info!("no interactions, nothing to train on");
            return Ok(Outcome::NoInteractions);
        }
    };

    debug!(
        min_interactions_per_user = config.training.min_interactions_per_user,
        min_interactions_per_item = config.training.min_interactions_per_item,
        "interaction thresholds are not enforced"
    );

    let fit_start = Instant::now();
    info!(
        strategy = %factorizer.strategy(),
        users = interactions.num_users(),
        items = interactions.num_items(),
        nnz = interactions.matrix.nnz(),
        dimension,
        "factorizing"
    );
    let factors = factorizer.factorize(&interactions.matrix, dimension)?;
    info!(millis = utils::to_millis(fit_start.elapsed()), "factorization done");

    let users = io::factor_records(&factors.users, interactions.renaming.user_ids(), updated_at);
    let items = io::factor_records(&factors.items, interactions.renaming.item_ids(), updated_at);

    let write_start = Instant::now();
    {
        let mut store = connector.connect()?;
        store.replace_factors(&users, &items)?;
    }
    info!(
        users = users.len(),
        items = items.len(),
        millis = utils::to_millis(write_start.elapsed()),
        "replaced factor tables"
    );

    Ok(Outcome::Trained(Summary {
        num_users: factors.users.num_rows(),
        num_items: factors.items.num_rows(),
        dimension: factors.dimension(),
    }))
}
