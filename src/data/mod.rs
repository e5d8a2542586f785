//! Data loading.
//!
//! Fetches the mortality and country-code sources, cleans the mortality
//! rows, joins the codes, and hands out the resulting canonical table.

pub mod clean;
pub mod error;
pub mod join;
pub mod source;

pub use error::{LoadError, LoadResult};
pub use source::{DataSource, FetchOptions, SnapshotCache};

use crate::models::{LoadStats, MortalityRecord};
use std::sync::Arc;
use tracing::{info, warn};

/// The cleaned, joined, immutable table every view derives from.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<MortalityRecord>,
    stats: LoadStats,
}

impl Dataset {
    /// Build a dataset from already-clean records (codes attached or not).
    #[cfg(test)]
    pub fn from_records(records: Vec<MortalityRecord>) -> Self {
        let stats = LoadStats {
            rows_read: records.len(),
            rows_loaded: records.len(),
            ..LoadStats::default()
        };
        Self { records, stats }
    }

    pub fn records(&self) -> &[MortalityRecord] {
        &self.records
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }
}

/// The pair of inputs that make up the canonical table.
#[derive(Debug, Clone)]
pub struct DatasetSources {
    pub mortality: DataSource,
    pub codes: DataSource,
}

/// Parse, clean and join the raw bytes of both sources.
pub fn build_dataset(
    mortality_bytes: &[u8],
    mortality_origin: &str,
    codes_bytes: &[u8],
    codes_origin: &str,
) -> LoadResult<Dataset> {
    let raw = clean::parse_mortality_csv(mortality_bytes, mortality_origin)?;
    let (mut records, clean_stats) = clean::clean_records(&raw);
    if records.is_empty() {
        return Err(LoadError::Empty(mortality_origin.to_string()));
    }

    let codes = join::CountryCodes::parse_csv(codes_bytes, codes_origin)?;
    let unmatched = join::left_join(&mut records, &codes);
    if !unmatched.is_empty() {
        warn!(
            "{} countries have no country code and cannot be placed on the map",
            unmatched.len()
        );
    }

    let stats = LoadStats {
        rows_read: clean_stats.rows_read,
        number_filled: clean_stats.number_filled,
        death_rate_filled: clean_stats.death_rate_filled,
        rows_dropped: clean_stats.rows_dropped,
        rows_loaded: records.len(),
        unmatched_countries: unmatched,
    };

    Ok(Dataset { records, stats })
}

/// Fetch both sources concurrently and build the canonical table.
pub async fn load_dataset(sources: &DatasetSources, options: &FetchOptions) -> LoadResult<Dataset> {
    let client = source::build_client(options)?;
    let progress = source::progress_for(options);

    let (mortality_bytes, codes_bytes) = tokio::try_join!(
        sources.mortality.fetch(&client, options, &progress),
        sources.codes.fetch(&client, options, &progress),
    )?;

    let dataset = build_dataset(
        &mortality_bytes,
        &sources.mortality.to_string(),
        &codes_bytes,
        &sources.codes.to_string(),
    )?;

    let stats = dataset.stats();
    info!(
        "Loaded {} records ({} read, {} dropped, {} backfilled)",
        stats.rows_loaded,
        stats.rows_read,
        stats.rows_dropped,
        stats.number_filled + stats.death_rate_filled
    );

    Ok(dataset)
}

/// Owns the canonical table for the life of the process.
///
/// The table is loaded on first use and then shared read-only; `reload`
/// replaces it explicitly.
#[derive(Debug)]
pub struct DatasetStore {
    sources: DatasetSources,
    options: FetchOptions,
    current: Option<Arc<Dataset>>,
}

impl DatasetStore {
    pub fn new(sources: DatasetSources, options: FetchOptions) -> Self {
        Self {
            sources,
            options,
            current: None,
        }
    }

    pub fn sources(&self) -> &DatasetSources {
        &self.sources
    }

    /// The loaded table, if any.
    #[cfg(test)]
    pub fn current(&self) -> Option<Arc<Dataset>> {
        self.current.clone()
    }

    /// Return the table, loading it on first call.
    pub async fn get_or_load(&mut self) -> LoadResult<Arc<Dataset>> {
        if let Some(ref dataset) = self.current {
            return Ok(Arc::clone(dataset));
        }
        self.reload().await
    }

    /// Load the table again, bypassing any snapshot, and replace the current one.
    pub async fn reload(&mut self) -> LoadResult<Arc<Dataset>> {
        let options = if self.current.is_some() {
            FetchOptions {
                refresh: true,
                ..self.options.clone()
            }
        } else {
            self.options.clone()
        };

        let dataset = Arc::new(load_dataset(&self.sources, &options).await?);
        self.current = Some(Arc::clone(&dataset));
        Ok(dataset)
    }
}
