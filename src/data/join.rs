//! Country-code lookup and the left join onto the cleaned table.

use super::error::{LoadError, LoadResult};
use crate::models::MortalityRecord;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

pub const COL_LOOKUP_COUNTRY: &str = "Country";
pub const COL_LOOKUP_CODE: &str = "country-code";

#[derive(Debug, Deserialize)]
struct CodeRow {
    #[serde(rename = "Country")]
    country: Option<String>,
    #[serde(rename = "country-code")]
    code: Option<String>,
}

/// Country name → ISO numeric code.
#[derive(Debug, Clone, Default)]
pub struct CountryCodes {
    codes: HashMap<String, String>,
}

impl CountryCodes {
    /// Parse the lookup CSV. Codes are kept as text exactly as published.
    ///
    /// When a name appears more than once the first code wins, so the join
    /// can never duplicate mortality rows.
    pub fn parse_csv(bytes: &[u8], origin: &str) -> LoadResult<Self> {
        let csv_err = |source: csv::Error| LoadError::Csv {
            origin: origin.to_string(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(bytes);

        let headers = reader.headers().map_err(csv_err)?.clone();
        for column in [COL_LOOKUP_COUNTRY, COL_LOOKUP_CODE] {
            if !headers.iter().any(|h| h == column) {
                return Err(LoadError::MissingColumn {
                    origin: origin.to_string(),
                    column: column.to_string(),
                });
            }
        }

        let mut codes = HashMap::new();
        let mut duplicates = 0usize;
        for result in reader.deserialize::<CodeRow>() {
            let row = result.map_err(csv_err)?;
            let (Some(country), Some(code)) = (row.country, row.code) else {
                continue;
            };
            if country.is_empty() || code.is_empty() {
                continue;
            }
            if codes.contains_key(&country) {
                duplicates += 1;
                continue;
            }
            codes.insert(country, code);
        }

        if duplicates > 0 {
            warn!(
                "{} duplicate country names in {}; kept the first code of each",
                duplicates, origin
            );
        }
        debug!("Loaded {} country codes from {}", codes.len(), origin);

        Ok(Self { codes })
    }

    pub fn get(&self, country: &str) -> Option<&str> {
        self.codes.get(country).map(String::as_str)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.codes.len()
    }
}

impl FromIterator<(String, String)> for CountryCodes {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut codes = HashMap::new();
        for (country, code) in iter {
            codes.entry(country).or_insert(code);
        }
        Self { codes }
    }
}

/// Attach country codes to every record. Row count is preserved.
///
/// Returns the sorted names of countries without a code.
pub fn left_join(records: &mut [MortalityRecord], codes: &CountryCodes) -> Vec<String> {
    let mut unmatched = BTreeSet::new();

    for record in records.iter_mut() {
        record.country_code = codes.get(&record.country).map(String::from);
        if record.country_code.is_none() {
            unmatched.insert(record.country.clone());
        }
    }

    unmatched.into_iter().collect()
}
