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

use chrono::{Duration, NaiveDateTime};

use crate::config::{Backend, DatabaseConfig, Schema};
use crate::error::Result;
use crate::extract::{EventRow, RatingRow};
use crate::mysql::MysqlStore;
use crate::pg::PostgresStore;
use crate::sqlite::SqliteStore;

/// Factor rows older than this count as stale in the freshness report.
pub const STALE_AFTER_DAYS: i64 = 7;

/// Which of the two factor tables we are talking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Item,
}

impl Entity {

    pub fn table<'a>(&self, schema: &'a Schema) -> &'a str {
        match *self {
            Entity::User => &schema.user_factors,
            Entity::Item => &schema.item_factors,
        }
    }

    pub fn id_column<'a>(&self, schema: &'a Schema) -> &'a str {
        match *self {
            Entity::User => &schema.user_column,
            Entity::Item => &schema.item_column,
        }
    }
}

/// One persisted embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorRecord {
    pub id: i64,
    pub factors: Vec<f32>,
    pub updated_at: NaiveDateTime,
}

/// Row count and age of the rows in a factor table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Freshness {
    pub table: String,
    pub rows: i64,
    pub oldest: Option<NaiveDateTime>,
    pub newest: Option<NaiveDateTime>,
    pub stale: i64,
}

/// A connection to the relational store. Implementations own exactly one connection which is
/// released when the store is dropped.
pub trait Store {

    /// Ratings with a rating value and an item reference.
    fn explicit_ratings(&mut self) -> Result<Vec<RatingRow>>;

    /// Implicit events with an item reference.
    fn implicit_events(&mut self) -> Result<Vec<EventRow>>;

    /// Replaces the contents of both factor tables inside a single transaction.
    fn replace_factors(&mut self, users: &[FactorRecord], items: &[FactorRecord]) -> Result<()>;

    fn read_factors(&mut self, entity: Entity) -> Result<Vec<FactorRecord>>;

    fn freshness(&mut self, entity: Entity, stale_before: NaiveDateTime) -> Result<Freshness>;
}

/// Opens a fresh connection for every logical step of a run.
pub trait Connector {
    fn connect(&self) -> Result<Box<dyn Store>>;
}

impl Connector for DatabaseConfig {

    fn connect(&self) -> Result<Box<dyn Store>> {
        let store: Box<dyn Store> = match self.backend {
            Backend::Postgres => Box::new(PostgresStore::connect(self)?),
            Backend::Mysql => Box::new(MysqlStore::connect(self)?),
            Backend::Sqlite => Box::new(SqliteStore::open(&self.sqlite_path, self.schema.clone())?),
        };

        Ok(store)
    }
}

/// Gathers the freshness of both factor tables, rows last written before
/// `now - STALE_AFTER_DAYS` count as stale.
pub fn freshness_report(connector: &dyn Connector, now: NaiveDateTime) -> Result<Vec<Freshness>> {
    let mut store = connector.connect()?;
    let stale_before = now - Duration::days(STALE_AFTER_DAYS);

    Ok(vec![
        store.freshness(Entity::User, stale_before)?,
        store.freshness(Entity::Item, stale_before)?,
    ])
}
