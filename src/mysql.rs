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

use chrono::NaiveDateTime;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, Row};
use tokio::runtime::{Builder, Runtime};

use crate::config::{DatabaseConfig, Schema};
use crate::error::Result;
use crate::extract::{self, EventRow, RatingRow};
use crate::io;
use crate::store::{Entity, FactorRecord, Freshness, Store};

/// MySQL (or MariaDB) backend. sqlx only speaks async, so every store owns a single-threaded
/// runtime and blocks on it; the job itself stays sequential. The factor tables are expected to
/// have a text `factors` column and a `DATETIME` typed `updated_at` column.
pub struct MysqlStore {
    runtime: Runtime,
    conn: MySqlConnection,
    schema: Schema,
}

impl MysqlStore {

    /// Connects to the events database.
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port())
            .username(&config.user)
            .password(&config.password)
            .database(&config.events_db)
            .charset("utf8mb4");

        let conn = runtime.block_on(MySqlConnection::connect_with(&options))?;

        debug!(host = %config.host, database = %config.events_db, "connected to mysql");

        Ok(MysqlStore { runtime, conn, schema: config.schema.clone() })
    }
}

fn ratings_sql(schema: &Schema) -> String {
    format!(
        "SELECT CAST({user} AS SIGNED), CAST({item} AS SIGNED), CAST({rating} AS DOUBLE) \
         FROM {table} \
         WHERE {user} IS NOT NULL AND {item} IS NOT NULL AND {rating} IS NOT NULL",
        user = schema.user_column,
        item = schema.item_column,
        rating = schema.rating_column,
        table = schema.ratings)
}

fn events_sql(schema: &Schema) -> String {
    format!(
        "SELECT CAST({user} AS SIGNED), CAST({item} AS SIGNED), CAST(event AS CHAR), \
                CAST(weight AS CHAR) \
         FROM {table} \
         WHERE {user} IS NOT NULL AND {item} IS NOT NULL",
        user = schema.user_column,
        item = schema.item_column,
        table = schema.events)
}

fn insert_sql(entity: Entity, schema: &Schema) -> String {
    format!(
        "INSERT INTO {} ({}, factors, updated_at) VALUES (?, ?, ?)",
        entity.table(schema), entity.id_column(schema))
}

async fn fetch_ratings(conn: &mut MySqlConnection, schema: &Schema) -> Result<Vec<RatingRow>> {
    let sql = ratings_sql(schema);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

    let mut ratings = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        ratings.push(RatingRow {
            user_id: row.try_get(0)?,
            item_id: row.try_get(1)?,
            rating: row.try_get(2)?,
        });
    }

    Ok(ratings)
}

async fn fetch_events(conn: &mut MySqlConnection, schema: &Schema) -> Result<Vec<EventRow>> {
    let sql = events_sql(schema);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

    let mut events = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        let weight: Option<String> = row.try_get(3)?;
        events.push(EventRow {
            user_id: row.try_get(0)?,
            item_id: row.try_get(1)?,
            event: row.try_get(2)?,
            weight: weight.as_ref().and_then(|text| extract::multiplier(text)),
        });
    }

    Ok(events)
}

async fn replace(
    conn: &mut MySqlConnection,
    schema: &Schema,
    users: &[FactorRecord],
    items: &[FactorRecord],
) -> Result<()> {

    let mut tx = conn.begin().await?;

    for &(entity, records) in [(Entity::User, users), (Entity::Item, items)].iter() {
        let delete = format!("DELETE FROM {}", entity.table(schema));
        sqlx::query(&delete).execute(&mut *tx).await?;

        let insert = insert_sql(entity, schema);
        for record in records.iter() {
            sqlx::query(&insert)
                .bind(record.id)
                .bind(io::encode_factors(&record.factors)?)
                .bind(record.updated_at)
                .execute(&mut *tx)
                .await?;
        }
    }

    // Dropping the transaction without committing rolls everything back.
    tx.commit().await?;
    Ok(())
}

async fn fetch_factors(
    conn: &mut MySqlConnection,
    schema: &Schema,
    entity: Entity,
) -> Result<Vec<FactorRecord>> {

    let sql = format!(
        "SELECT CAST({} AS SIGNED), CAST(factors AS CHAR), updated_at FROM {} ORDER BY 1",
        entity.id_column(schema), entity.table(schema));
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        let factors: String = row.try_get(1)?;
        records.push(FactorRecord {
            id: row.try_get(0)?,
            factors: io::decode_factors(&factors)?,
            updated_at: row.try_get(2)?,
        });
    }

    Ok(records)
}

async fn fetch_freshness(
    conn: &mut MySqlConnection,
    schema: &Schema,
    entity: Entity,
    stale_before: NaiveDateTime,
) -> Result<Freshness> {

    let table = entity.table(schema);
    let sql = format!(
        "SELECT COUNT(*), MIN(updated_at), MAX(updated_at), \
                CAST(COALESCE(SUM(CASE WHEN updated_at < ? THEN 1 ELSE 0 END), 0) AS SIGNED) \
         FROM {}",
        table);

    let row = sqlx::query(&sql).bind(stale_before).fetch_one(&mut *conn).await?;

    Ok(Freshness {
        table: table.to_string(),
        rows: row.try_get(0)?,
        oldest: row.try_get(1)?,
        newest: row.try_get(2)?,
        stale: row.try_get(3)?,
    })
}

impl Store for MysqlStore {

    fn explicit_ratings(&mut self) -> Result<Vec<RatingRow>> {
        self.runtime.block_on(fetch_ratings(&mut self.conn, &self.schema))
    }

    fn implicit_events(&mut self) -> Result<Vec<EventRow>> {
        self.runtime.block_on(fetch_events(&mut self.conn, &self.schema))
    }

    fn replace_factors(&mut self, users: &[FactorRecord], items: &[FactorRecord]) -> Result<()> {
        self.runtime.block_on(replace(&mut self.conn, &self.schema, users, items))
    }

    fn read_factors(&mut self, entity: Entity) -> Result<Vec<FactorRecord>> {
        self.runtime.block_on(fetch_factors(&mut self.conn, &self.schema, entity))
    }

    fn freshness(&mut self, entity: Entity, stale_before: NaiveDateTime) -> Result<Freshness> {
        self.runtime.block_on(fetch_freshness(&mut self.conn, &self.schema, entity, stale_before))
    }
}
