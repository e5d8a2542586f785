//! Filter choices offered by the dataset and resolution of the user's selection.

use super::aggregator::distinct;
use crate::data::Dataset;
use serde::Serialize;
use tracing::{debug, warn};

/// Year shown when none is requested.
pub const DEFAULT_YEAR: i32 = 2000;

/// Countries compared when none are requested.
pub fn default_comparison_countries() -> Vec<String> {
    vec![
        "Finland".to_string(),
        "Canada".to_string(),
        "United States of America".to_string(),
    ]
}

/// The values each control can take for a given dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub year_min: i32,
    pub year_max: i32,
    /// Sorted region names.
    pub regions: Vec<String>,
    /// Sorted country names across all regions.
    pub countries: Vec<String>,
}

impl FilterOptions {
    /// Collect the choices; `None` for an empty dataset.
    pub fn from_dataset(dataset: &Dataset) -> Option<Self> {
        let records = dataset.records();
        let year_min = records.iter().map(|r| r.year).min()?;
        let year_max = records.iter().map(|r| r.year).max()?;

        Some(Self {
            year_min,
            year_max,
            regions: distinct(records, |r| r.region.as_str()),
            countries: distinct(records, |r| r.country.as_str()),
        })
    }

    /// Clamp a requested year into the available range.
    pub fn clamp_year(&self, year: i32) -> i32 {
        year.clamp(self.year_min, self.year_max)
    }
}

/// Sorted countries of a region that have rows in the given year.
pub fn countries_in_region(dataset: &Dataset, region: &str, year: i32) -> Vec<String> {
    distinct(
        dataset
            .records()
            .iter()
            .filter(|r| r.region == region && r.year == year),
        |r| r.country.as_str(),
    )
}

/// Region of `country`, preferring its rows in `year`.
fn region_of(dataset: &Dataset, country: &str, year: i32) -> Option<String> {
    let records = dataset.records();
    records
        .iter()
        .find(|r| r.country == country && r.year == year)
        .or_else(|| records.iter().find(|r| r.country == country))
        .map(|r| r.region.clone())
}

/// Filter values as requested by the user; unset values fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionRequest {
    pub year: Option<i32>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub countries: Option<Vec<String>>,
}

/// Concrete filter values driving one recomputation of the views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub year: i32,
    pub region: Option<String>,
    pub country: Option<String>,
    pub countries: Vec<String>,
}

impl SelectionRequest {
    /// Fill unset values the way the controls default.
    ///
    /// Year defaults to 2000 and is clamped into the data's range. Region
    /// defaults to the selected country's region, else the first sorted
    /// region; country defaults to the first sorted country of that region
    /// and year. Requested comparison countries
    /// missing from the data are dropped with a warning.
    pub fn resolve(&self, dataset: &Dataset, options: &FilterOptions) -> Selection {
        let year = options.clamp_year(self.year.unwrap_or(DEFAULT_YEAR));
        if Some(year) != self.year {
            debug!("Using year {}", year);
        }

        let region = self
            .region
            .clone()
            .or_else(|| {
                self.country
                    .as_deref()
                    .and_then(|c| region_of(dataset, c, year))
            })
            .or_else(|| options.regions.first().cloned());

        let country = self.country.clone().or_else(|| {
            region
                .as_deref()
                .and_then(|r| countries_in_region(dataset, r, year).into_iter().next())
        });

        let requested = self
            .countries
            .clone()
            .unwrap_or_else(default_comparison_countries);
        let (countries, missing): (Vec<String>, Vec<String>) = requested
            .into_iter()
            .partition(|c| options.countries.binary_search(c).is_ok());
        if !missing.is_empty() {
            warn!("Countries not in the dataset: {}", missing.join(", "));
        }

        Selection {
            year,
            region,
            country,
            countries,
        }
    }
}
