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

use std::path::PathBuf;
use std::result;

use figment::providers::{Env, Serialized};
use figment::value::{Uncased, UncasedStr};
use figment::Figment;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::factorizer::Strategy;

pub const DEFAULT_DIMENSION: usize = 32;
pub const DEFAULT_ITERATIONS: usize = 10;
pub const DEFAULT_REGULARIZATION: f32 = 0.1;

/// Environment variables we honour and the configuration key each of them sets.
const ENVIRONMENT: &[(&str, &str)] = &[
    ("DB_BACKEND", "database.backend"),
    ("DB_SQLITE_PATH", "database.sqlite_path"),
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_USER", "database.user"),
    ("DB_PASS", "database.password"),
    ("DB_EVENTS_DB", "database.events_db"),
    ("DB_CATALOG_DB", "database.catalog_db"),
    ("CF_RATINGS_TABLE", "database.schema.ratings"),
    ("CF_EVENTS_TABLE", "database.schema.events"),
    ("CF_USER_FACTORS_TABLE", "database.schema.user_factors"),
    ("CF_ITEM_FACTORS_TABLE", "database.schema.item_factors"),
    ("CF_USER_COLUMN", "database.schema.user_column"),
    ("CF_ITEM_COLUMN", "database.schema.item_column"),
    ("CF_RATING_COLUMN", "database.schema.rating_column"),
    ("CF_FACTORS", "training.dimension"),
    ("CF_ITERATIONS", "training.iterations"),
    ("CF_REGULARIZATION", "training.regularization"),
    ("CF_SEED", "training.seed"),
    ("CF_STRATEGY", "training.strategy"),
    ("CF_MIN_USER_INTERACTIONS", "training.min_interactions_per_user"),
    ("CF_MIN_ITEM_INTERACTIONS", "training.min_interactions_per_item"),
];

/// Where the interaction events live and where the factors go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[serde(alias = "postgresql")]
    Postgres,
    #[serde(alias = "mariadb")]
    Mysql,
    Sqlite,
}

impl Backend {

    pub fn default_port(&self) -> u16 {
        match *self {
            Backend::Postgres => 5432,
            Backend::Mysql => 3306,
            Backend::Sqlite => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: Backend,
    /// Database file of the sqlite backend.
    pub sqlite_path: PathBuf,
    #[serde(deserialize_with = "text")]
    pub host: String,
    /// Falls back to the default port of the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(deserialize_with = "text")]
    pub user: String,
    #[serde(deserialize_with = "text")]
    pub password: String,
    /// Holds the interaction events, and receives the factor tables.
    #[serde(deserialize_with = "text")]
    pub events_db: String,
    /// Declared for completeness, we never read from the catalog.
    #[serde(deserialize_with = "text")]
    pub catalog_db: String,
    pub schema: Schema,
}

impl DatabaseConfig {

    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.backend.default_port())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            backend: Backend::Postgres,
            sqlite_path: PathBuf::from("interactions.sqlite3"),
            host: "localhost".to_string(),
            port: None,
            user: "cf".to_string(),
            password: String::new(),
            events_db: "interactions".to_string(),
            catalog_db: "catalog".to_string(),
            schema: Schema::default(),
        }
    }
}

/// Names of the relations we read from and write to, and of the identifier columns they share.
/// The factor tables key their rows by the same user and item columns as the sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    pub ratings: String,
    pub events: String,
    pub user_factors: String,
    pub item_factors: String,
    pub user_column: String,
    pub item_column: String,
    pub rating_column: String,
}

impl Schema {

    fn identifiers(&self) -> [(&'static str, &str); 7] {
        [
            ("CF_RATINGS_TABLE", self.ratings.as_str()),
            ("CF_EVENTS_TABLE", self.events.as_str()),
            ("CF_USER_FACTORS_TABLE", self.user_factors.as_str()),
            ("CF_ITEM_FACTORS_TABLE", self.item_factors.as_str()),
            ("CF_USER_COLUMN", self.user_column.as_str()),
            ("CF_ITEM_COLUMN", self.item_column.as_str()),
            ("CF_RATING_COLUMN", self.rating_column.as_str()),
        ]
    }
}

impl Default for Schema {
    fn default() -> Self {
        Schema {
            ratings: "ratings".to_string(),
            events: "user_events".to_string(),
            user_factors: "cf_user_factors".to_string(),
            item_factors: "cf_item_factors".to_string(),
            user_column: "user_id".to_string(),
            item_column: "item_id".to_string(),
            rating_column: "rating".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub dimension: usize,
    pub iterations: usize,
    pub regularization: f32,
    /// Seeds the random initialization, we draw from the OS if absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Forces a particular factorizer instead of the first available one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    // Neither threshold is enforced yet, entities are factorized regardless of their counts.
    pub min_interactions_per_user: usize,
    pub min_interactions_per_item: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            dimension: DEFAULT_DIMENSION,
            iterations: DEFAULT_ITERATIONS,
            regularization: DEFAULT_REGULARIZATION,
            seed: None,
            strategy: None,
            min_interactions_per_user: 3,
            min_interactions_per_item: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub training: TrainingConfig,
}

impl Config {

    /// The defaults, overridden by the environment. `CATALOG_DB` is an older spelling of
    /// `DB_CATALOG_DB` and loses against it.
    pub fn figment() -> Figment {
        let variables: Vec<&str> = ENVIRONMENT.iter().map(|&(variable, _)| variable).collect();

        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::raw().only(&["CATALOG_DB"]).map(|_| "database.catalog_db".into()))
            .merge(Env::raw().only(&variables).map(nested_key))
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Config::from_figment(Config::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()
            .map_err(|failure| Error::config(format!("cannot load configuration: {}", failure)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.training.dimension == 0 {
            return Err(Error::config("the embedding dimension must be at least 1"));
        }
        if !(self.training.regularization > 0.0) {
            return Err(Error::config("the regularization constant must be positive"));
        }
        for &(variable, name) in self.database.schema.identifiers().iter() {
            identifier(variable, name)?;
        }
        Ok(())
    }
}

fn nested_key(variable: &UncasedStr) -> Uncased<'_> {
    ENVIRONMENT.iter()
        .find(|&&(name, _)| variable.as_str().eq_ignore_ascii_case(name))
        .map(|&(_, key)| Uncased::from(key))
        .unwrap_or_else(|| Uncased::from(variable.as_str()))
}

/// The environment provider turns numeric looking values into numbers, free text settings
/// such as passwords take them back as text.
fn text<'de, D>(deserializer: D) -> result::Result<String, D::Error> where D: Deserializer<'de> {

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Text(String),
        Integer(i64),
        Unsigned(u64),
        Float(f64),
        Flag(bool),
    }

    let value = match Text::deserialize(deserializer)? {
        Text::Text(text) => text,
        Text::Integer(number) => number.to_string(),
        Text::Unsigned(number) => number.to_string(),
        Text::Float(number) => number.to_string(),
        Text::Flag(flag) => flag.to_string(),
    };

    Ok(value)
}

/// Table and column names end up inside SQL statements, so we only allow plain (optionally
/// schema-qualified) identifiers.
fn identifier(variable: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

    if valid {
        Ok(())
    } else {
        Err(Error::config(format!("{}='{}' is not a valid identifier", variable, name)))
    }
}
