//! Mortality CSV parsing and cleaning.
//!
//! Cleaning selects the fixed column subset, backward-fills the two numeric
//! columns inside their partitions and drops every row that still has a
//! missing value.

use super::error::{LoadError, LoadResult};
use crate::models::{MortalityRecord, Sex};
use serde::Deserialize;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

pub const COL_REGION: &str = "Region Name";
pub const COL_COUNTRY: &str = "Country Name";
pub const COL_YEAR: &str = "Year";
pub const COL_SEX: &str = "Sex";
pub const COL_AGE_GROUP: &str = "Age Group";
pub const COL_NUMBER: &str = "Number";
pub const COL_DEATH_RATE: &str = "Death rate per 100 000 population";

const REQUIRED_COLUMNS: [&str; 7] = [
    COL_REGION,
    COL_COUNTRY,
    COL_YEAR,
    COL_SEX,
    COL_AGE_GROUP,
    COL_NUMBER,
    COL_DEATH_RATE,
];

/// A mortality row as published, before cleaning. Any cell may be missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "Region Name")]
    pub region: Option<String>,
    #[serde(rename = "Country Name")]
    pub country: Option<String>,
    #[serde(rename = "Year", deserialize_with = "csv::invalid_option")]
    pub year: Option<i32>,
    #[serde(rename = "Sex")]
    pub sex: Option<String>,
    #[serde(rename = "Age Group")]
    pub age_group: Option<String>,
    #[serde(rename = "Number", deserialize_with = "csv::invalid_option")]
    pub number: Option<f64>,
    #[serde(
        rename = "Death rate per 100 000 population",
        deserialize_with = "csv::invalid_option"
    )]
    pub death_rate: Option<f64>,
}

/// Counters produced by [`clean_records`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub rows_read: usize,
    pub number_filled: usize,
    pub death_rate_filled: usize,
    pub rows_dropped: usize,
}

/// Parse the mortality CSV, keeping only the required columns.
pub fn parse_mortality_csv(bytes: &[u8], origin: &str) -> LoadResult<Vec<RawRecord>> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        origin: origin.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers().map_err(csv_err)?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(LoadError::MissingColumn {
                origin: origin.to_string(),
                column: column.to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for result in reader.deserialize::<RawRecord>() {
        rows.push(result.map_err(csv_err)?);
    }

    debug!("Parsed {} mortality rows from {}", rows.len(), origin);
    Ok(rows)
}

/// Backward-fill `values` inside partitions, preserving row order.
///
/// A missing value takes the next present value of the same partition.
/// Rows whose key is `None` belong to no partition and are left untouched.
/// Returns the number of cells filled.
pub fn backfill_by<K, F>(values: &mut [Option<f64>], key_of: F) -> usize
where
    K: Eq + Hash,
    F: Fn(usize) -> Option<K>,
{
    let mut next_present: HashMap<K, f64> = HashMap::new();
    let mut filled = 0;

    for i in (0..values.len()).rev() {
        let Some(key) = key_of(i) else {
            continue;
        };
        match values[i] {
            Some(v) => {
                next_present.insert(key, v);
            }
            None => {
                if let Some(&v) = next_present.get(&key) {
                    values[i] = Some(v);
                    filled += 1;
                }
            }
        }
    }

    filled
}

/// Hashable form of a float partition key; 0.0 and -0.0 share a key.
fn float_key(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Backfill, then drop rows with any remaining missing value.
///
/// The returned records carry no country code; see [`super::join`].
pub fn clean_records(raw: &[RawRecord]) -> (Vec<MortalityRecord>, CleanStats) {
    let mut stats = CleanStats {
        rows_read: raw.len(),
        ..CleanStats::default()
    };

    let mut numbers: Vec<Option<f64>> = raw
        .iter()
        .map(|r| r.number.filter(|v| v.is_finite()))
        .collect();
    let mut rates: Vec<Option<f64>> = raw
        .iter()
        .map(|r| r.death_rate.filter(|v| v.is_finite()))
        .collect();

    let demographic_key = |i: usize| {
        let r = &raw[i];
        Some((
            present(&r.region)?,
            present(&r.country)?,
            present(&r.sex)?,
            present(&r.age_group)?,
        ))
    };

    stats.number_filled = backfill_by(&mut numbers, demographic_key);

    let number_snapshot = numbers.clone();
    stats.death_rate_filled = backfill_by(&mut rates, |i| {
        let (region, country, sex, age_group) = demographic_key(i)?;
        Some((region, country, sex, age_group, float_key(number_snapshot[i]?)))
    });

    let records: Vec<MortalityRecord> = raw
        .iter()
        .zip(numbers.into_iter().zip(rates))
        .filter_map(|(r, (number, death_rate))| {
            Some(MortalityRecord {
                region: present(&r.region)?.to_string(),
                country: present(&r.country)?.to_string(),
                year: r.year?,
                sex: Sex::from(present(&r.sex)?),
                age_group: present(&r.age_group)?.to_string(),
                number: number?,
                death_rate: death_rate?,
                country_code: None,
            })
        })
        .collect();

    stats.rows_dropped = raw.len() - records.len();
    debug!(
        "Cleaned mortality rows: {} filled numbers, {} filled rates, {} dropped",
        stats.number_filled, stats.death_rate_filled, stats.rows_dropped
    );

    (records, stats)
}
