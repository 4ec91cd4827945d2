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

use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rusqlite::types::Value;

use crate::config::Schema;
use crate::error::Result;
use crate::extract::{self, EventRow, RatingRow};
use crate::io;
use crate::store::{Entity, FactorRecord, Freshness, Store};

/// A single-file SQLite database holding both the interaction events and the factor tables.
/// Timestamps are stored as text in `io::TIMESTAMP_FORMAT`, which sorts chronologically.
pub struct SqliteStore {
    conn: Connection,
    schema: Schema,
}

impl SqliteStore {

    pub fn open<P: AsRef<Path>>(path: P, schema: Schema) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(SqliteStore { conn, schema })
    }

    #[cfg(test)]
    pub fn in_memory(schema: Schema) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(SqliteStore { conn, schema })
    }

    /// Creates the source and destination relations, schema management is otherwise left to
    /// whoever owns the database.
    #[cfg(test)]
    pub fn create_tables(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {ratings} ({user} INTEGER, {item} INTEGER, {rating} REAL);
             CREATE TABLE IF NOT EXISTS {events} ({user} INTEGER, {item} INTEGER, event TEXT, weight);
             CREATE TABLE IF NOT EXISTS {users} ({user} INTEGER PRIMARY KEY, factors TEXT NOT NULL, updated_at TEXT NOT NULL);
             CREATE TABLE IF NOT EXISTS {items} ({item} INTEGER PRIMARY KEY, factors TEXT NOT NULL, updated_at TEXT NOT NULL);",
            ratings = self.schema.ratings,
            events = self.schema.events,
            users = self.schema.user_factors,
            items = self.schema.item_factors,
            user = self.schema.user_column,
            item = self.schema.item_column,
            rating = self.schema.rating_column,
        ))?;
        Ok(())
    }

    #[cfg(test)]
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

/// Multipliers may come in as integers, reals or text, anything unusable is treated as absent.
fn numeric(value: Value) -> Option<f64> {
    match value {
        Value::Integer(value) => Some(value as f64),
        Value::Real(value) => Some(value),
        Value::Text(text) => extract::multiplier(&text),
        _ => None,
    }
}

impl Store for SqliteStore {

    fn explicit_ratings(&mut self) -> Result<Vec<RatingRow>> {
        let sql = format!(
            "SELECT {user}, {item}, {rating} FROM {table} \
             WHERE {user} IS NOT NULL AND {item} IS NOT NULL AND {rating} IS NOT NULL",
            user = self.schema.user_column,
            item = self.schema.item_column,
            rating = self.schema.rating_column,
            table = self.schema.ratings);

        let mut statement = self.conn.prepare(&sql)?;
        let rows = statement.query_map([], |row| {
            Ok(RatingRow {
                user_id: row.get(0)?,
                item_id: row.get(1)?,
                rating: numeric(row.get(2)?),
            })
        })?;

        let ratings = rows.collect::<::rusqlite::Result<Vec<_>>>()?;
        Ok(ratings)
    }

    fn implicit_events(&mut self) -> Result<Vec<EventRow>> {
        let sql = format!(
            "SELECT {user}, {item}, event, weight FROM {table} \
             WHERE {user} IS NOT NULL AND {item} IS NOT NULL",
            user = self.schema.user_column,
            item = self.schema.item_column,
            table = self.schema.events);

        let mut statement = self.conn.prepare(&sql)?;
        let rows = statement.query_map([], |row| {
            Ok(EventRow {
                user_id: row.get(0)?,
                item_id: row.get(1)?,
                event: row.get(2)?,
                weight: numeric(row.get(3)?),
            })
        })?;

        let events = rows.collect::<::rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    fn replace_factors(&mut self, users: &[FactorRecord], items: &[FactorRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;

        for &(entity, records) in [(Entity::User, users), (Entity::Item, items)].iter() {
            let table = entity.table(&self.schema);
            tx.execute(&format!("DELETE FROM {}", table), [])?;

            let mut insert = tx.prepare(&format!(
                "INSERT INTO {} ({}, factors, updated_at) VALUES (?1, ?2, ?3)",
                table, entity.id_column(&self.schema)))?;

            for record in records.iter() {
                insert.execute((
                    record.id,
                    io::encode_factors(&record.factors)?,
                    io::format_timestamp(&record.updated_at),
                ))?;
            }
        }

        // Dropping the transaction without committing rolls everything back.
        tx.commit()?;
        Ok(())
    }

    fn read_factors(&mut self, entity: Entity) -> Result<Vec<FactorRecord>> {
        let sql = format!(
            "SELECT {}, factors, updated_at FROM {} ORDER BY 1",
            entity.id_column(&self.schema), entity.table(&self.schema));

        let mut statement = self.conn.prepare(&sql)?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, factors, updated_at) = row?;
            records.push(FactorRecord {
                id,
                factors: io::decode_factors(&factors)?,
                updated_at: io::parse_timestamp(&updated_at)?,
            });
        }

        Ok(records)
    }

    fn freshness(&mut self, entity: Entity, stale_before: NaiveDateTime) -> Result<Freshness> {
        let table = entity.table(&self.schema);
        let sql = format!(
            "SELECT COUNT(*), MIN(updated_at), MAX(updated_at), \
                    COALESCE(SUM(CASE WHEN updated_at < ?1 THEN 1 ELSE 0 END), 0) \
             FROM {}",
            table);

        let (rows, oldest, newest, stale) = self.conn.query_row(
            &sql,
            (io::format_timestamp(&stale_before),),
            |row| Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
            )))?;

        Ok(Freshness {
            table: table.to_string(),
            rows,
            oldest: match oldest { Some(text) => Some(io::parse_timestamp(&text)?), None => None },
            newest: match newest { Some(text) => Some(io::parse_timestamp(&text)?), None => None },
            stale,
        })
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use chrono::NaiveDate;

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory(Schema::default()).unwrap();
        store.create_tables().unwrap();
        store
    }

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap().and_hms_opt(3, 4, 5).unwrap()
    }

    fn record(id: i64, factors: Vec<f32>, day: u32) -> FactorRecord {
        FactorRecord { id, factors, updated_at: at(day) }
    }

    #[test]
    fn reads_ratings_with_item_and_value() {
        let mut store = store();
        store.execute_batch(
            "INSERT INTO ratings VALUES (1, 10, 4), (1, NULL, 5), (2, 11, NULL), (3, 12, 2.5);"
        ).unwrap();

        let ratings = store.explicit_ratings().unwrap();

        assert_eq!(ratings, vec![
            RatingRow { user_id: 1, item_id: Some(10), rating: Some(4.0) },
            RatingRow { user_id: 3, item_id: Some(12), rating: Some(2.5) },
        ]);
    }

    #[test]
    fn reads_events_with_lenient_multipliers() {
        let mut store = store();
        store.execute_batch(
            "INSERT INTO user_events VALUES
                (1, 10, 'view', NULL),
                (1, 11, 'added_to_cellar', 2),
                (2, 10, 'search_click', '1.5'),
                (2, 12, 'opened', 'lots'),
                (3, NULL, 'view', 1.0);"
        ).unwrap();

        let events = store.implicit_events().unwrap();

        assert_eq!(events.len(), 4);
        assert_eq!(events[0].weight, None);
        assert_eq!(events[1].weight, Some(2.0));
        assert_eq!(events[2].weight, Some(1.5));
        assert_eq!(events[3].weight, None);
        assert_eq!(events[3].event, Some("opened".to_string()));
    }

    #[test]
    fn replaces_factor_tables_wholesale() {
        let mut store = store();

        store.replace_factors(
            &[record(1, vec![1.0, 2.0], 1), record(2, vec![3.0, 4.0], 1)],
            &[record(10, vec![0.5, 0.25], 1)],
        ).unwrap();

        store.replace_factors(
            &[record(3, vec![-1.0, 0.0], 2)],
            &[record(11, vec![0.125, 8.0], 2), record(12, vec![0.0, 0.0], 2)],
        ).unwrap();

        assert_eq!(store.read_factors(Entity::User).unwrap(), vec![record(3, vec![-1.0, 0.0], 2)]);
        assert_eq!(store.read_factors(Entity::Item).unwrap(), vec![
            record(11, vec![0.125, 8.0], 2),
            record(12, vec![0.0, 0.0], 2),
        ]);
    }

    #[test]
    fn failed_replacement_leaves_previous_snapshot() {
        let mut store = store();
        store.replace_factors(&[record(1, vec![1.0], 1)], &[record(10, vec![2.0], 1)]).unwrap();

        // duplicate primary keys make the item inserts fail after the users were rewritten
        let result = store.replace_factors(
            &[record(5, vec![5.0], 2)],
            &[record(20, vec![1.0], 2), record(20, vec![1.0], 2)],
        );

        assert!(result.is_err());
        assert_eq!(store.read_factors(Entity::User).unwrap(), vec![record(1, vec![1.0], 1)]);
        assert_eq!(store.read_factors(Entity::Item).unwrap(), vec![record(10, vec![2.0], 1)]);
    }

    #[test]
    fn reads_and_writes_with_configured_columns() {
        let schema = Schema {
            ratings: "bottles".to_string(),
            item_factors: "cf_wine_factors".to_string(),
            item_column: "wine_id".to_string(),
            rating_column: "my_rating".to_string(),
            ..Schema::default()
        };
        let mut store = SqliteStore::in_memory(schema).unwrap();
        store.create_tables().unwrap();
        store.execute_batch(
            "INSERT INTO bottles (user_id, wine_id, my_rating) VALUES (1, 10, 4);
             INSERT INTO user_events (user_id, wine_id, event, weight) VALUES (2, 11, 'view', 1);"
        ).unwrap();

        assert_eq!(store.explicit_ratings().unwrap(),
            vec![RatingRow { user_id: 1, item_id: Some(10), rating: Some(4.0) }]);
        assert_eq!(store.implicit_events().unwrap()[0].item_id, Some(11));

        store.replace_factors(&[], &[record(10, vec![1.0], 1)]).unwrap();
        assert_eq!(store.read_factors(Entity::Item).unwrap(), vec![record(10, vec![1.0], 1)]);
    }

    #[test]
    fn freshness_counts_stale_rows() {
        let mut store = store();
        store.replace_factors(
            &[record(1, vec![1.0], 1), record(2, vec![1.0], 10), record(3, vec![1.0], 20)],
            &[],
        ).unwrap();

        let users = store.freshness(Entity::User, at(10)).unwrap();
        let items = store.freshness(Entity::Item, at(10)).unwrap();

        assert_eq!(users, Freshness {
            table: "cf_user_factors".to_string(),
            rows: 3,
            oldest: Some(at(1)),
            newest: Some(at(20)),
            stale: 1,
        });
        assert_eq!(items.rows, 0);
        assert_eq!(items.oldest, None);
        assert_eq!(items.stale, 0);
    }
}
