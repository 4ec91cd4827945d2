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
use std::io::prelude::*;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::store::{FactorRecord, Freshness};
use crate::types::DenseMatrix;

/// Timestamps are stored with second precision in this format wherever the backend has no
/// native timestamp type.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Factor vectors are persisted as a JSON array of floats.
pub fn encode_factors(factors: &[f32]) -> Result<String> {
    Ok(serde_json::to_string(factors)?)
}

pub fn decode_factors(json: &str) -> Result<Vec<f32>> {
    Ok(serde_json::from_str(json)?)
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    Ok(NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)?)
}

/// One record per row of `factors`, row `i` is stored under the external identifier `ids[i]`.
pub fn factor_records(
    factors: &DenseMatrix,
    ids: &[i64],
    updated_at: NaiveDateTime,
) -> Vec<FactorRecord> {

    assert_eq!(factors.num_rows(), ids.len(), "every factor row needs an identifier");

    factors.rows()
        .zip(ids.iter())
        .map(|(row, id)| FactorRecord { id: *id, factors: row.to_vec(), updated_at })
        .collect()
}

/// Outputs the freshness of the factor tables, either as one human readable line or as one
/// JSON object per table.
pub fn write_status<W: Write>(out: &mut W, report: &[Freshness], as_json: bool) -> io::Result<()> {

    for freshness in report.iter() {
        if as_json {
            let json = serde_json::to_string(freshness)?;
            writeln!(out, "{}", json)?;
        } else {
            writeln!(
                out,
                "{}: rows={} oldest={} newest={} stale={}",
                freshness.table,
                freshness.rows,
                freshness.oldest.as_ref().map(format_timestamp).unwrap_or_else(|| "-".to_string()),
                freshness.newest.as_ref().map(format_timestamp).unwrap_or_else(|| "-".to_string()),
                freshness.stale,
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn factor_vectors_are_json_arrays() {
        let json = encode_factors(&[0.5, -1.25, 3.0]).unwrap();

        assert_eq!(json, "[0.5,-1.25,3.0]");
        assert_eq!(decode_factors(&json).unwrap(), vec![0.5, -1.25, 3.0]);
        assert!(decode_factors("not json").is_err());
    }

    #[test]
    fn arbitrary_floats_survive_encoding() {
        let factors = vec![0.1_f32, -0.033_333_335, 1.0e-7, 12345.678];

        let decoded = decode_factors(&encode_factors(&factors).unwrap()).unwrap();

        assert_eq!(decoded, factors);
    }

    #[test]
    fn timestamps() {
        assert_eq!(format_timestamp(&noon()), "2024-03-01 12:00:00");
        assert_eq!(parse_timestamp("2024-03-01 12:00:00").unwrap(), noon());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn records_carry_external_ids() {
        let mut factors = DenseMatrix::zeros(2, 2);
        factors.row_mut(1).copy_from_slice(&[1.0, 2.0]);

        let records = factor_records(&factors, &[17, 42], noon());

        assert_eq!(records, vec![
            FactorRecord { id: 17, factors: vec![0.0, 0.0], updated_at: noon() },
            FactorRecord { id: 42, factors: vec![1.0, 2.0], updated_at: noon() },
        ]);
    }

    #[test]
    fn status_lines() {
        let report = vec![
            Freshness {
                table: "cf_user_factors".to_string(),
                rows: 2,
                oldest: Some(noon()),
                newest: Some(noon()),
                stale: 0,
            },
            Freshness {
                table: "cf_item_factors".to_string(),
                rows: 0,
                oldest: None,
                newest: None,
                stale: 0,
            },
        ];

        let mut text = Vec::new();
        write_status(&mut text, &report, false).unwrap();
        assert_eq!(String::from_utf8(text).unwrap(),
            "cf_user_factors: rows=2 oldest=2024-03-01 12:00:00 newest=2024-03-01 12:00:00 stale=0\n\
             cf_item_factors: rows=0 oldest=- newest=- stale=0\n");

        let mut json = Vec::new();
        write_status(&mut json, &report[1..], true).unwrap();
        assert_eq!(String::from_utf8(json).unwrap(),
            "{\"table\":\"cf_item_factors\",\"rows\":0,\"oldest\":null,\"newest\":null,\"stale\":0}\n");
    }
}
