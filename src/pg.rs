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
use postgres::{Client, NoTls};

use crate::config::{DatabaseConfig, Schema};
use crate::error::Result;
use crate::extract::{self, EventRow, RatingRow};
use crate::io;
use crate::store::{Entity, FactorRecord, Freshness, Store};

/// PostgreSQL backend on a blocking client. The factor tables are expected to have a text
/// `factors` column and a `timestamp` typed `updated_at` column.
pub struct PostgresStore {
    client: Client,
    schema: Schema,
}

impl PostgresStore {

    /// Connects to the events database.
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let client = Client::configure()
            .host(&config.host)
            .port(config.port())
            .user(&config.user)
            .password(&config.password)
            .dbname(&config.events_db)
            .connect(NoTls)?;

        debug!(host = %config.host, database = %config.events_db, "connected to postgres");

        Ok(PostgresStore { client, schema: config.schema.clone() })
    }
}

fn ratings_sql(schema: &Schema) -> String {
    format!(
        "SELECT {user}::BIGINT, {item}::BIGINT, {rating}::DOUBLE PRECISION FROM {table} \
         WHERE {user} IS NOT NULL AND {item} IS NOT NULL AND {rating} IS NOT NULL",
        user = schema.user_column,
        item = schema.item_column,
        rating = schema.rating_column,
        table = schema.ratings)
}

// The multiplier comes back as text so that junk in the column does not abort the extraction.
fn events_sql(schema: &Schema) -> String {
    format!(
        "SELECT {user}::BIGINT, {item}::BIGINT, event::TEXT, weight::TEXT FROM {table} \
         WHERE {user} IS NOT NULL AND {item} IS NOT NULL",
        user = schema.user_column,
        item = schema.item_column,
        table = schema.events)
}

fn insert_sql(entity: Entity, schema: &Schema) -> String {
    format!(
        "INSERT INTO {} ({}, factors, updated_at) VALUES ($1, $2, $3)",
        entity.table(schema), entity.id_column(schema))
}

impl Store for PostgresStore {

    fn explicit_ratings(&mut self) -> Result<Vec<RatingRow>> {
        let mut ratings = Vec::new();

        for row in self.client.query(ratings_sql(&self.schema).as_str(), &[])? {
            ratings.push(RatingRow {
                user_id: row.try_get(0)?,
                item_id: row.try_get(1)?,
                rating: row.try_get(2)?,
            });
        }

        Ok(ratings)
    }

    fn implicit_events(&mut self) -> Result<Vec<EventRow>> {
        let mut events = Vec::new();

        for row in self.client.query(events_sql(&self.schema).as_str(), &[])? {
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

    fn replace_factors(&mut self, users: &[FactorRecord], items: &[FactorRecord]) -> Result<()> {
        let mut tx = self.client.transaction()?;

        for &(entity, records) in [(Entity::User, users), (Entity::Item, items)].iter() {
            tx.execute(format!("DELETE FROM {}", entity.table(&self.schema)).as_str(), &[])?;

            let insert = tx.prepare(insert_sql(entity, &self.schema).as_str())?;
            for record in records.iter() {
                let factors = io::encode_factors(&record.factors)?;
                tx.execute(&insert, &[&record.id, &factors, &record.updated_at])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn read_factors(&mut self, entity: Entity) -> Result<Vec<FactorRecord>> {
        let sql = format!(
            "SELECT {}::BIGINT, factors::TEXT, updated_at FROM {} ORDER BY 1",
            entity.id_column(&self.schema), entity.table(&self.schema));

        let mut records = Vec::new();
        for row in self.client.query(sql.as_str(), &[])? {
            let factors: String = row.try_get(1)?;
            records.push(FactorRecord {
                id: row.try_get(0)?,
                factors: io::decode_factors(&factors)?,
                updated_at: row.try_get(2)?,
            });
        }

        Ok(records)
    }

    fn freshness(&mut self, entity: Entity, stale_before: NaiveDateTime) -> Result<Freshness> {
        let table = entity.table(&self.schema);
        let sql = format!(
            "SELECT COUNT(*), MIN(updated_at), MAX(updated_at), \
                    COUNT(*) FILTER (WHERE updated_at < $1) \
             FROM {}",
            table);

        let row = self.client.query_one(sql.as_str(), &[&stale_before])?;

        Ok(Freshness {
            table: table.to_string(),
            rows: row.try_get(0)?,
            oldest: row.try_get(1)?,
            newest: row.try_get(2)?,
            stale: row.try_get(3)?,
        })
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn wine_schema() -> Schema {
        Schema {
            ratings: "bottles".to_string(),
            item_factors: "cf_wine_factors".to_string(),
            item_column: "wine_id".to_string(),
            rating_column: "my_rating".to_string(),
            ..Schema::default()
        }
    }

    #[test]
    fn statements_use_configured_schema() {
        let schema = wine_schema();

        assert_eq!(ratings_sql(&schema),
            "SELECT user_id::BIGINT, wine_id::BIGINT, my_rating::DOUBLE PRECISION FROM bottles \
             WHERE user_id IS NOT NULL AND wine_id IS NOT NULL AND my_rating IS NOT NULL");
        assert!(events_sql(&schema).contains("wine_id::BIGINT"));
        assert!(events_sql(&schema).contains("FROM user_events "));
        assert_eq!(insert_sql(Entity::Item, &schema),
            "INSERT INTO cf_wine_factors (wine_id, factors, updated_at) VALUES ($1, $2, $3)");
        assert_eq!(insert_sql(Entity::User, &schema),
            "INSERT INTO cf_user_factors (user_id, factors, updated_at) VALUES ($1, $2, $3)");
    }

    #[test]
    fn multipliers_are_read_as_text() {
        assert!(events_sql(&Schema::default()).contains("weight::TEXT"));
    }
}
