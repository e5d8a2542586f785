//! Grouping, summation and data-quality checks shared by the views.

use crate::models::{MortalityRecord, Sex, AGE_GROUP_ALL};
use std::collections::BTreeMap;

/// Sum `value` per `key`. Keys come back sorted.
pub fn sum_by<'a, K, I, FK, FV>(records: I, key: FK, value: FV) -> BTreeMap<K, f64>
where
    K: Ord,
    I: IntoIterator<Item = &'a MortalityRecord>,
    FK: Fn(&'a MortalityRecord) -> K,
    FV: Fn(&'a MortalityRecord) -> f64,
{
    let mut sums: BTreeMap<K, f64> = BTreeMap::new();
    for record in records {
        *sums.entry(key(record)).or_insert(0.0) += value(record);
    }
    sums
}

/// Arithmetic mean, `None` for an empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Min and max of the values, `None` for an empty input.
pub fn min_max<I: IntoIterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    values.into_iter().fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[derive(Default)]
struct Mix {
    sex_all: bool,
    sex_part: bool,
    age_all: bool,
    age_part: bool,
}

/// Whether any group sums an aggregate row together with the rows it covers.
///
/// Groups are formed by `key`. With `check_sex` false only the `[All]`
/// age group is considered, for sums that are already split by sex.
pub fn mixes_aggregates<'a, K, I, F>(records: I, key: F, check_sex: bool) -> bool
where
    K: Ord,
    I: IntoIterator<Item = &'a MortalityRecord>,
    F: Fn(&'a MortalityRecord) -> K,
{
    let mut groups: BTreeMap<K, Mix> = BTreeMap::new();
    for record in records {
        let mix = groups.entry(key(record)).or_default();
        if record.sex == Sex::All {
            mix.sex_all = true;
        } else {
            mix.sex_part = true;
        }
        if record.age_group == AGE_GROUP_ALL {
            mix.age_all = true;
        } else {
            mix.age_part = true;
        }
    }

    groups.values().any(|m| {
        (check_sex && m.sex_all && m.sex_part) || (m.age_all && m.age_part)
    })
}

/// Sorted, de-duplicated values of a string column.
pub fn distinct<'a, I, F>(records: I, field: F) -> Vec<String>
where
    I: IntoIterator<Item = &'a MortalityRecord>,
    F: Fn(&'a MortalityRecord) -> &'a str,
{
    let mut values: Vec<String> = records
        .into_iter()
        .map(|r| field(r).to_string())
        .collect();
    values.sort();
    values.dedup();
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(country: &str, year: i32, sex: Sex, age_group: &str, number: f64) -> MortalityRecord {
        MortalityRecord {
            region: "Europe".to_string(),
            country: country.to_string(),
            year,
            sex,
            age_group: age_group.to_string(),
            number,
            death_rate: number / 10.0,
            country_code: None,
        }
    }

    #[test]
    fn test_sum_by_sorts_keys() {
        let records = vec![
            record("Sweden", 2000, Sex::Male, "[0]", 1.0),
            record("Finland", 2000, Sex::Male, "[0]", 2.0),
            record("Sweden", 2000, Sex::Female, "[0]", 3.0),
        ];

        let sums = sum_by(&records, |r| r.country.as_str(), |r| r.number);

        let keys: Vec<_> = sums.keys().copied().collect();
        assert_eq!(keys, vec!["Finland", "Sweden"]);
        assert_eq!(sums["Sweden"], 4.0);
    }

    #[test]
    fn test_mean_and_min_max() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
        assert_eq!(min_max(vec![]), None);
        assert_eq!(min_max(vec![3.0, -1.0, 2.0]), Some((-1.0, 3.0)));
    }

    #[test]
    fn test_mixes_aggregates() {
        let split_only = vec![
            record("Finland", 2000, Sex::Male, "[0]", 1.0),
            record("Finland", 2000, Sex::Female, "[0]", 1.0),
        ];
        assert!(!mixes_aggregates(&split_only, |r| (r.country.as_str(), r.year), true));

        let with_total = vec![
            record("Finland", 2000, Sex::Male, "[0]", 1.0),
            record("Finland", 2000, Sex::All, "[0]", 1.0),
        ];
        assert!(mixes_aggregates(&with_total, |r| (r.country.as_str(), r.year), true));
        assert!(!mixes_aggregates(&with_total, |r| (r.country.as_str(), r.year), false));

        // A total in a different year is not mixed with these parts.
        let separate_years = vec![
            record("Finland", 2000, Sex::Male, "[0]", 1.0),
            record("Finland", 2001, Sex::All, "[0]", 1.0),
        ];
        assert!(!mixes_aggregates(&separate_years, |r| (r.country.as_str(), r.year), true));

        let with_age_total = vec![
            record("Finland", 2000, Sex::Male, "[0]", 1.0),
            record("Finland", 2000, Sex::Male, AGE_GROUP_ALL, 1.0),
        ];
        assert!(mixes_aggregates(&with_age_total, |r| r.year, false));
    }

    #[test]
    fn test_distinct() {
        let records = vec![
            record("Sweden", 2000, Sex::Male, "[0]", 1.0),
            record("Finland", 2000, Sex::Male, "[0]", 2.0),
            record("Sweden", 2001, Sex::Male, "[0]", 3.0),
        ];
        assert_eq!(
            distinct(&records, |r| r.country.as_str()),
            vec!["Finland".to_string(), "Sweden".to_string()]
        );
    }
}
