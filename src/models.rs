//! Data models for the mortality dashboard.
//!
//! This module contains the canonical record type, the derived rows each
//! view produces, and the panel structures handed to the report generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Age-group label used by the source for records covering every age.
pub const AGE_GROUP_ALL: &str = "[All]";

/// Age-group label used by the source for records with unknown age.
pub const AGE_GROUP_UNKNOWN: &str = "[Unknown]";

/// Sex category of a mortality record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sex {
    /// Both sexes combined (an aggregate row)
    All,
    Female,
    Male,
    Unknown,
    /// Any other label published by the source
    Other(String),
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::All => write!(f, "All"),
            Sex::Female => write!(f, "Female"),
            Sex::Male => write!(f, "Male"),
            Sex::Unknown => write!(f, "Unknown"),
            Sex::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Sex {
    fn from(s: &str) -> Self {
        match s.trim() {
            "All" => Sex::All,
            "Female" => Sex::Female,
            "Male" => Sex::Male,
            "Unknown" => Sex::Unknown,
            other => Sex::Other(other.to_string()),
        }
    }
}

impl Serialize for Sex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Sex {
    /// Position of the category in chart legends (All, Male, Female, rest).
    pub fn legend_rank(&self) -> u8 {
        match self {
            Sex::All => 0,
            Sex::Male => 1,
            Sex::Female => 2,
            Sex::Unknown => 3,
            Sex::Other(_) => 4,
        }
    }
}

/// A single cleaned and joined row of the canonical table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MortalityRecord {
    pub region: String,
    pub country: String,
    pub year: i32,
    pub sex: Sex,
    pub age_group: String,
    /// Number of deaths.
    pub number: f64,
    /// Death rate per 100 000 population.
    pub death_rate: f64,
    /// ISO numeric country code; `None` when the lookup has no match.
    pub country_code: Option<String>,
}

impl MortalityRecord {
    /// Whether this row already sums other rows (Sex = All or AgeGroup = [All]).
    pub fn is_aggregate_row(&self) -> bool {
        self.sex == Sex::All || self.age_group == AGE_GROUP_ALL
    }
}

/// Dashboard page: the overview plots or the multi-country comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    /// World map, region bars, trend and age/sex breakdown
    #[default]
    Overview,
    /// Multi-country comparison
    Comparison,
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Page::Overview => write!(f, "overview"),
            Page::Comparison => write!(f, "comparison"),
        }
    }
}

/// How totals are summed in the map, region, trend and comparison aggregates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum TotalsPolicy {
    /// Sum every row, including rows that are themselves aggregates
    #[default]
    AllRows,
    /// Skip Sex = All and AgeGroup = [All] rows before summing
    ExcludeAggregates,
}

impl TotalsPolicy {
    /// Whether a record participates in totals under this policy.
    pub fn includes(&self, record: &MortalityRecord) -> bool {
        match self {
            TotalsPolicy::AllRows => true,
            TotalsPolicy::ExcludeAggregates => !record.is_aggregate_row(),
        }
    }
}

impl fmt::Display for TotalsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TotalsPolicy::AllRows => write!(f, "all-rows"),
            TotalsPolicy::ExcludeAggregates => write!(f, "exclude-aggregates"),
        }
    }
}

/// Label distinguishing the concatenated series of the trend view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SeriesType {
    All,
    Female,
    Male,
    Unknown,
    Average,
}

impl fmt::Display for SeriesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesType::All => write!(f, "All"),
            SeriesType::Female => write!(f, "Female"),
            SeriesType::Male => write!(f, "Male"),
            SeriesType::Unknown => write!(f, "Unknown"),
            SeriesType::Average => write!(f, "Average"),
        }
    }
}

impl SeriesType {
    /// Line color used for the series in the trend chart.
    pub fn color(&self) -> &'static str {
        match self {
            SeriesType::All => "blue",
            SeriesType::Female => "purple",
            SeriesType::Male => "green",
            SeriesType::Unknown => "pink",
            SeriesType::Average => "orange",
        }
    }

    /// Every series type in legend order.
    pub fn all() -> [SeriesType; 5] {
        [
            SeriesType::All,
            SeriesType::Female,
            SeriesType::Male,
            SeriesType::Unknown,
            SeriesType::Average,
        ]
    }
}

/// Per-country, per-year totals backing the world map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryYearTotal {
    pub country: String,
    pub year: i32,
    pub country_code: Option<String>,
    pub total_deaths: f64,
    pub total_death_rate: f64,
}

/// World-map view: one year of country totals and its color domain.
#[derive(Debug, Clone, Serialize)]
pub struct WorldMapView {
    pub year: i32,
    pub rows: Vec<CountryYearTotal>,
    /// Min/max of `total_deaths` over `rows`; `None` when empty.
    pub color_domain: Option<(f64, f64)>,
    /// Countries present in `rows` that have no country code.
    pub unplottable: Vec<String>,
    pub double_counted: bool,
}

/// One bar of the region comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionBar {
    pub country: String,
    pub number: f64,
    pub highlighted: bool,
}

/// Region bar view: countries of one region in one year.
#[derive(Debug, Clone, Serialize)]
pub struct RegionBarView {
    pub region: String,
    pub year: i32,
    pub selected_country: Option<String>,
    /// Sorted by `number`, largest first.
    pub bars: Vec<RegionBar>,
    pub double_counted: bool,
}

/// A single (year, value) point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearValue {
    pub year: i32,
    pub number: f64,
}

/// One line of the trend chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub series_type: SeriesType,
    /// Sorted by year.
    pub points: Vec<YearValue>,
}

/// A row of the long-form trend table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub year: i32,
    pub number: f64,
    pub series_type: SeriesType,
}

/// Trend view for one country.
///
/// The total and unknown series only exist when the country has rows with
/// that sex category; female and male series are always built and may be
/// empty.
#[derive(Debug, Clone, Serialize)]
pub struct TrendView {
    pub country: String,
    pub all: Option<TrendSeries>,
    pub female: TrendSeries,
    pub male: TrendSeries,
    pub unknown: Option<TrendSeries>,
    pub average: TrendSeries,
    pub double_counted: bool,
}

impl TrendView {
    /// Non-empty series in legend order.
    pub fn series(&self) -> Vec<&TrendSeries> {
        [
            self.all.as_ref(),
            Some(&self.female),
            Some(&self.male),
            self.unknown.as_ref(),
            Some(&self.average),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.points.is_empty())
        .collect()
    }

    /// Concatenate every series into one table keyed by series type.
    pub fn long_form(&self) -> Vec<TrendPoint> {
        self.series()
            .into_iter()
            .flat_map(|s| {
                s.points.iter().map(move |p| TrendPoint {
                    year: p.year,
                    number: p.number,
                    series_type: s.series_type,
                })
            })
            .collect()
    }
}

/// One bar of the age/sex breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeSexBar {
    /// Age group with bracket characters removed.
    pub age_group: String,
    pub sex: Sex,
    pub number: f64,
}

/// Age/sex breakdown for one country in one year.
#[derive(Debug, Clone, Serialize)]
pub struct AgeSexView {
    pub country: String,
    pub year: i32,
    /// Ordered by age bucket, then sex legend order.
    pub bars: Vec<AgeSexBar>,
}

/// One bar of the multi-country comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonBar {
    pub country: String,
    pub gender: Sex,
    pub number: f64,
}

/// Multi-country comparison for one year.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonView {
    pub year: i32,
    pub countries: Vec<String>,
    /// All block, then Female, then Male; countries sorted inside each block.
    pub bars: Vec<ComparisonBar>,
    pub double_counted: bool,
}

/// Content of a report panel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "view", rename_all = "snake_case")]
pub enum PanelBody {
    WorldMap(WorldMapView),
    RegionBars(RegionBarView),
    Trend(TrendView),
    AgeSex(AgeSexView),
    Comparison(ComparisonView),
    /// The filters selected no rows.
    NoData(String),
}

/// A titled section of the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct Panel {
    pub title: String,
    pub body: PanelBody,
}

impl Panel {
    pub fn new(title: impl Into<String>, body: PanelBody) -> Self {
        Self {
            title: title.into(),
            body,
        }
    }

    /// Whether the panel's view flags a double count of aggregate rows.
    pub fn double_counted(&self) -> bool {
        match &self.body {
            PanelBody::WorldMap(v) => v.double_counted,
            PanelBody::RegionBars(v) => v.double_counted,
            PanelBody::Trend(v) => v.double_counted,
            PanelBody::Comparison(v) => v.double_counted,
            PanelBody::AgeSex(_) | PanelBody::NoData(_) => false,
        }
    }
}

/// Counters collected while loading the canonical table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadStats {
    /// Rows read from the mortality source.
    pub rows_read: usize,
    /// Missing `Number` cells filled by backfill.
    pub number_filled: usize,
    /// Missing death-rate cells filled by backfill.
    pub death_rate_filled: usize,
    /// Rows discarded because a value was still missing.
    pub rows_dropped: usize,
    /// Rows in the canonical table.
    pub rows_loaded: usize,
    /// Countries with no entry in the code lookup, sorted.
    pub unmatched_countries: Vec<String>,
}

/// Metadata about the dashboard report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub mortality_source: String,
    pub codes_source: String,
    pub page: Page,
    pub year: i32,
    pub totals_policy: TotalsPolicy,
}

/// The complete dashboard output for one set of filter values.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    pub load_stats: LoadStats,
    pub panels: Vec<Panel>,
}

impl DashboardReport {
    /// Titles of panels whose totals double count aggregate rows.
    pub fn double_count_warnings(&self) -> Vec<&str> {
        self.panels
            .iter()
            .filter(|p| p.double_counted())
            .map(|p| p.title.as_str())
            .collect()
    }
}
