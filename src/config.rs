//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.cvdash.toml` files.

use crate::analysis::{default_comparison_countries, SelectionRequest, DEFAULT_YEAR};
use crate::models::TotalsPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".cvdash.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Dataset sources.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Default filter values.
    #[serde(default)]
    pub filters: FiltersConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path (stdout when unset).
    #[serde(default)]
    pub output: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Where the two CSV inputs come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Mortality records CSV.
    #[serde(default = "default_mortality_url")]
    pub mortality_url: String,

    /// Country name to ISO numeric code lookup CSV.
    #[serde(default = "default_codes_url")]
    pub codes_url: String,

    /// Directory for snapshots of downloaded sources.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Download timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            mortality_url: default_mortality_url(),
            codes_url: default_codes_url(),
            cache_dir: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_mortality_url() -> String {
    "https://raw.githubusercontent.com/yuanma0427/BMI706-Project/main/Cardiovascular_diseases.csv"
        .to_string()
}

fn default_codes_url() -> String {
    "https://raw.githubusercontent.com/hms-dbmi/bmi706-2022/main/cancer_data/country_codes.csv"
        .to_string()
}

fn default_timeout() -> u64 {
    120
}

/// Filter values used when the command line leaves them unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Year shown by default (clamped into the data's range).
    #[serde(default = "default_year")]
    pub default_year: i32,

    /// Region shown by default (the country's region, else the first region).
    #[serde(default)]
    pub default_region: Option<String>,

    /// Country selected by default (first country of the region when unset).
    #[serde(default)]
    pub default_country: Option<String>,

    /// Countries on the comparison page.
    #[serde(default = "default_comparison_countries")]
    pub comparison_countries: Vec<String>,
}

impl FiltersConfig {
    /// The filter request these defaults describe.
    pub fn selection_request(&self) -> SelectionRequest {
        SelectionRequest {
            year: Some(self.default_year),
            region: self.default_region.clone(),
            country: self.default_country.clone(),
            countries: Some(self.comparison_countries.clone()),
        }
    }
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            default_year: default_year(),
            default_region: None,
            default_country: None,
            comparison_countries: default_comparison_countries(),
        }
    }
}

fn default_year() -> i32 {
    DEFAULT_YEAR
}

/// Aggregation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// How map, region, trend and comparison totals treat rows that are themselves totals.
    #[serde(default)]
    pub totals_policy: TotalsPolicy,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; only values
    /// the CLI actually provides are overridden.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.mortality_url {
            self.sources.mortality_url = url.clone();
        }
        if let Some(ref url) = args.codes_url {
            self.sources.codes_url = url.clone();
        }
        if let Some(ref dir) = args.cache_dir {
            self.sources.cache_dir = Some(dir.clone());
        }
        if let Some(timeout) = args.timeout {
            self.sources.timeout_seconds = timeout;
        }

        if let Some(year) = args.year {
            self.filters.default_year = year;
        }
        if let Some(ref region) = args.region {
            self.filters.default_region = Some(region.clone());
        }
        if let Some(ref country) = args.country {
            self.filters.default_country = Some(country.clone());
        }
        if let Some(countries) = args.comparison_countries() {
            self.filters.comparison_countries = countries;
        }

        if let Some(policy) = args.totals_policy {
            self.analysis.totals_policy = policy;
        }

        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
