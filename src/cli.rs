//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{Page, TotalsPolicy};
use clap::Parser;
use std::path::PathBuf;

/// cvdash - cardiovascular disease mortality dashboard
///
/// Loads the WHO-style mortality table and a country-code lookup, then
/// renders the dashboard panels for one set of filter values as Markdown
/// tables or JSON chart specs.
///
/// Examples:
///   cvdash --year 2010 --region Europe --country Finland
///   cvdash --page comparison --countries Finland,Canada --format json
///   cvdash --mortality-file data.csv --codes-file codes.csv --list-options
///   cvdash --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// URL of the mortality CSV
    ///
    /// Can also be set via CVDASH_MORTALITY_URL env var or .cvdash.toml config.
    #[arg(long, value_name = "URL", env = "CVDASH_MORTALITY_URL")]
    pub mortality_url: Option<String>,

    /// URL of the country-code lookup CSV
    #[arg(long, value_name = "URL", env = "CVDASH_CODES_URL")]
    pub codes_url: Option<String>,

    /// Read the mortality CSV from disk instead of downloading it
    #[arg(long, value_name = "FILE")]
    pub mortality_file: Option<PathBuf>,

    /// Read the country-code CSV from disk instead of downloading it
    #[arg(long, value_name = "FILE")]
    pub codes_file: Option<PathBuf>,

    /// Dashboard page to render (overview, comparison)
    #[arg(long, default_value = "overview", value_name = "PAGE")]
    pub page: Page,

    /// Year filter
    ///
    /// Clamped into the years present in the data. Default: from config or 2000.
    #[arg(short, long, value_name = "YEAR")]
    pub year: Option<i32>,

    /// Region whose countries are compared in the bar chart
    #[arg(short, long, value_name = "REGION")]
    pub region: Option<String>,

    /// Country highlighted in the region chart and used for trend and age panels
    #[arg(long, value_name = "COUNTRY")]
    pub country: Option<String>,

    /// Countries on the comparison page (comma-separated)
    ///
    /// Example: --countries "Finland,Canada,United States of America"
    #[arg(long, value_name = "COUNTRIES", value_delimiter = ',')]
    pub countries: Option<Vec<String>>,

    /// How rows that are themselves totals enter map, region, trend and comparison sums
    #[arg(long, value_name = "POLICY")]
    pub totals_policy: Option<TotalsPolicy>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report
    ///
    /// Written to stdout when neither this nor the config sets a path.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .cvdash.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for snapshots of downloaded sources
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Download timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Ignore cached snapshots and download the sources again
    #[arg(long)]
    pub refresh: bool,

    /// Print the available years, regions and countries, then exit
    #[arg(long)]
    pub list_options: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .cvdash.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown tables (default)
    #[default]
    Markdown,
    /// JSON chart specs
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        for url in [&self.mortality_url, &self.codes_url].into_iter().flatten() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!(
                    "Source URL must start with 'http://' or 'https://': {}",
                    url
                ));
            }
        }

        for path in [&self.mortality_file, &self.codes_file].into_iter().flatten() {
            if !path.is_file() {
                return Err(format!("Source file does not exist: {}", path.display()));
            }
        }

        if let Some(year) = self.year {
            if !(1900..=2100).contains(&year) {
                return Err(format!("Year out of range: {}", year));
            }
        }

        if let Some(ref countries) = self.countries {
            if countries.iter().all(|c| c.trim().is_empty()) {
                return Err("--countries needs at least one country name".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over `verbose_by_default` from the config file.
    pub fn log_level(&self, verbose_by_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_by_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Comparison countries with surrounding whitespace and empty entries removed.
    pub fn comparison_countries(&self) -> Option<Vec<String>> {
        self.countries.as_ref().map(|countries| {
            countries
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            mortality_url: None,
            codes_url: None,
            mortality_file: None,
            codes_file: None,
            page: Page::Overview,
            year: None,
            region: None,
            country: None,
            countries: None,
            totals_policy: None,
            format: OutputFormat::Markdown,
            output: None,
            config: None,
            cache_dir: None,
            timeout: None,
            refresh: false,
            list_options: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "cvdash",
            "--page",
            "comparison",
            "--countries",
            "Finland, Canada",
            "--totals-policy",
            "exclude-aggregates",
            "--format",
            "json",
            "--year",
            "2010",
        ])
        .unwrap();

        assert_eq!(args.page, Page::Comparison);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.totals_policy, Some(TotalsPolicy::ExcludeAggregates));
        assert_eq!(args.year, Some(2010));
        assert_eq!(
            args.comparison_countries(),
            Some(vec!["Finland".to_string(), "Canada".to_string()])
        );
    }

    #[test]
    fn test_validation_defaults_pass() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.mortality_url = Some("ftp://example.org/data.csv".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_file() {
        let mut args = make_args();
        args.codes_file = Some(PathBuf::from("/nonexistent/codes.csv"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_year_range() {
        let mut args = make_args();
        args.year = Some(20100);
        assert!(args.validate().is_err());

        args.year = Some(2010);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.mortality_url = Some("not-a-url".to_string());
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
