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

use crate::error::Result;
use crate::store::Store;
use crate::types::Triple;

/// A row from the explicit ratings relation.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRow {
    pub user_id: i64,
    pub item_id: Option<i64>,
    pub rating: Option<f64>,
}

/// A row from the implicit event log.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub user_id: i64,
    pub item_id: Option<i64>,
    pub event: Option<String>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    View,
    SearchClick,
    AddToCollection,
    Consume,
    Unknown,
}

impl EventKind {

    pub fn from_name(name: &str) -> EventKind {
        match name {
            "view" => EventKind::View,
            "search_click" => EventKind::SearchClick,
            "added_to_cellar" => EventKind::AddToCollection,
            "opened" => EventKind::Consume,
            _ => EventKind::Unknown,
        }
    }

    /// Unknown kinds get a small default weight until somebody calibrates them.
    pub fn base_weight(&self) -> f64 {
        match *self {
            EventKind::View => 0.2,
            EventKind::SearchClick => 0.4,
            EventKind::AddToCollection => 1.0,
            EventKind::Consume => 0.1,
            EventKind::Unknown => 0.1,
        }
    }
}

/// Maps a star rating from [1, 5] onto a confidence weight in [0.5, 3.0]. Even a one-star
/// rating is a (weak) positive signal.
pub fn rating_weight(rating: f64) -> f64 {
    0.5 + (rating - 1.0) * (2.5 / 4.0)
}

/// Weight of an implicit event, missing or unusable multipliers count as 1.
pub fn event_weight(event: Option<&str>, multiplier: Option<f64>) -> f64 {
    let kind = event.map(EventKind::from_name).unwrap_or(EventKind::Unknown);

    let multiplier = match multiplier {
        Some(value) if value.is_finite() && value != 0.0 => value,
        _ => 1.0,
    };

    kind.base_weight() * multiplier
}

/// Event multipliers live in a loosely typed column, backends hand them over as text and
/// anything that does not parse as a number is treated as absent.
pub fn multiplier(text: &str) -> Option<f64> {
    text.trim().parse().ok()
}

pub fn rating_triple(row: &RatingRow) -> Option<Triple> {
    let item_id = row.item_id?;
    let rating = row.rating?;

    if rating < 1.0 || rating > 5.0 {
        return None;
    }

    positive((row.user_id, item_id, rating_weight(rating) as f32))
}

pub fn event_triple(row: &EventRow) -> Option<Triple> {
    let item_id = row.item_id?;
    let weight = event_weight(row.event.as_ref().map(|event| event.as_str()), row.weight);

    positive((row.user_id, item_id, weight as f32))
}

fn positive(triple: Triple) -> Option<Triple> {
    if triple.2 > 0.0 && triple.2.is_finite() {
        Some(triple)
    } else {
        None
    }
}

/// Reads both signal sources and normalizes them into weighted triples. The order of the
/// result carries no meaning.
pub fn interactions(store: &mut dyn Store) -> Result<Vec<Triple>> {

    let ratings = store.explicit_ratings()?;
    let events = store.implicit_events()?;

    let mut triples: Vec<Triple> = Vec::with_capacity(ratings.len() + events.len());
    triples.extend(ratings.iter().filter_map(rating_triple));
    let num_explicit = triples.len();
    triples.extend(events.iter().filter_map(event_triple));
    let num_implicit = triples.len() - num_explicit;

    info!(
        explicit = num_explicit,
        implicit = num_implicit,
        dropped = ratings.len() + events.len() - triples.len(),
        "extracted interactions"
    );

    Ok(triples)
}
