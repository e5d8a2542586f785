//! Markdown and JSON report generation.
//!
//! This module renders a dashboard report either as a readable Markdown
//! document with one table per panel, or as a JSON document of chart specs.

use super::chart::{chart_for_panel, ChartSpec};
use crate::analysis::FilterOptions;
use crate::models::{
    AgeSexView, ComparisonView, DashboardReport, LoadStats, Panel, PanelBody, RegionBarView,
    ReportMetadata, TrendView, WorldMapView,
};
use anyhow::Result;
use serde::Serialize;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &DashboardReport) -> String {
    let mut output = String::new();

    output.push_str("# Visualizations for Cardiovascular Diseases Mortality\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_load_section(&report.load_stats));
    output.push_str(&generate_notes_section(report));

    for panel in &report.panels {
        output.push_str(&generate_panel_section(panel));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Mortality Source:** {}\n",
        metadata.mortality_source
    ));
    section.push_str(&format!("- **Country Codes:** {}\n", metadata.codes_source));
    section.push_str(&format!("- **Page:** {}\n", metadata.page));
    section.push_str(&format!("- **Year:** {}\n", metadata.year));
    section.push_str(&format!(
        "- **Totals Policy:** `{}`\n",
        metadata.totals_policy
    ));
    section.push('\n');

    section
}

/// Generate the data loading summary.
fn generate_load_section(stats: &LoadStats) -> String {
    let mut section = String::new();

    section.push_str("## Data Loading\n\n");
    section.push_str("| Rows Read | Numbers Backfilled | Rates Backfilled | Rows Dropped | **Rows Loaded** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | **{}** |\n\n",
        stats.rows_read,
        stats.number_filled,
        stats.death_rate_filled,
        stats.rows_dropped,
        stats.rows_loaded
    ));

    if !stats.unmatched_countries.is_empty() {
        section.push_str(&format!(
            "Countries without a country code: {}\n\n",
            stats.unmatched_countries.join(", ")
        ));
    }

    section
}

/// Generate data-quality notes for double-counted totals.
fn generate_notes_section(report: &DashboardReport) -> String {
    let flagged = report.double_count_warnings();
    if flagged.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Data Quality Notes\n\n");
    section.push_str(
        "> ⚠️ The following totals sum rows that are already totals (Sex = All or \
         Age Group = [All]) together with the rows they cover. Re-run with \
         `--totals-policy exclude-aggregates` to remove the double count.\n\n",
    );
    for title in flagged {
        section.push_str(&format!("- {}\n", title));
    }
    section.push('\n');

    section
}

/// Generate the section for one panel.
fn generate_panel_section(panel: &Panel) -> String {
    let mut section = format!("## {}\n\n", panel.title);

    let body = match &panel.body {
        PanelBody::WorldMap(view) => generate_world_map_table(view),
        PanelBody::RegionBars(view) => generate_region_table(view),
        PanelBody::Trend(view) => generate_trend_table(view),
        PanelBody::AgeSex(view) => generate_age_sex_table(view),
        PanelBody::Comparison(view) => generate_comparison_table(view),
        PanelBody::NoData(message) => format!("*{}*\n\n", message),
    };
    section.push_str(&body);

    section
}

fn generate_world_map_table(view: &WorldMapView) -> String {
    let mut table = String::new();

    if let Some((lo, hi)) = view.color_domain {
        table.push_str(&format!(
            "*Color scale ({}): {:.0} – {:.0} deaths*\n\n",
            view.year, lo, hi
        ));
    }

    table.push_str("| Country | Code | Mortality | Total Death Rate |\n");
    table.push_str("|:---|:---:|---:|---:|\n");
    for row in &view.rows {
        table.push_str(&format!(
            "| {} | {} | {:.0} | {:.2} |\n",
            row.country,
            row.country_code.as_deref().unwrap_or("-"),
            row.total_deaths,
            row.total_death_rate
        ));
    }
    table.push('\n');

    if !view.unplottable.is_empty() {
        table.push_str(&format!(
            "Not shown on the map (no country code): {}\n\n",
            view.unplottable.join(", ")
        ));
    }

    table
}

fn generate_region_table(view: &RegionBarView) -> String {
    let mut table = String::new();

    table.push_str("| Country | Total Mortality |\n");
    table.push_str("|:---|---:|\n");
    for bar in &view.bars {
        if bar.highlighted {
            table.push_str(&format!("| **{}** ◀ | **{:.0}** |\n", bar.country, bar.number));
        } else {
            table.push_str(&format!("| {} | {:.0} |\n", bar.country, bar.number));
        }
    }
    table.push('\n');

    table
}

fn generate_trend_table(view: &TrendView) -> String {
    let series = view.series();
    let mut table = String::new();

    table.push_str("| Year |");
    for s in &series {
        table.push_str(&format!(" {} |", s.series_type));
    }
    table.push('\n');
    table.push_str("|:---:|");
    for _ in &series {
        table.push_str("---:|");
    }
    table.push('\n');

    let mut years: Vec<i32> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.year))
        .collect();
    years.sort_unstable();
    years.dedup();

    for year in years {
        table.push_str(&format!("| {} |", year));
        for s in &series {
            match s.points.iter().find(|p| p.year == year) {
                Some(p) => table.push_str(&format!(" {:.0} |", p.number)),
                None => table.push_str(" – |"),
            }
        }
        table.push('\n');
    }
    table.push('\n');

    table
}

fn generate_age_sex_table(view: &AgeSexView) -> String {
    let mut table = String::new();

    table.push_str("| Age Group | Sex | Total Mortality |\n");
    table.push_str("|:---|:---|---:|\n");
    for bar in &view.bars {
        table.push_str(&format!(
            "| {} | {} | {:.0} |\n",
            bar.age_group, bar.sex, bar.number
        ));
    }
    table.push('\n');

    table
}

fn generate_comparison_table(view: &ComparisonView) -> String {
    let mut table = String::new();

    table.push_str(&format!(
        "*Year {}: {}*\n\n",
        view.year,
        view.countries.join(", ")
    ));
    table.push_str("| Country | Gender | Mortality |\n");
    table.push_str("|:---|:---|---:|\n");
    for bar in &view.bars {
        table.push_str(&format!(
            "| {} | {} | {:.0} |\n",
            bar.country, bar.gender, bar.number
        ));
    }
    table.push('\n');

    table
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by cvdash v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a ReportMetadata,
    load_stats: &'a LoadStats,
    warnings: Vec<String>,
    charts: Vec<ChartSpec>,
}

/// Generate a JSON document of chart specs.
pub fn generate_json_report(report: &DashboardReport) -> Result<String> {
    let charts = report
        .panels
        .iter()
        .map(chart_for_panel)
        .collect::<Result<Vec<_>>>()?;

    let warnings = report
        .double_count_warnings()
        .into_iter()
        .map(|title| format!("{}: totals double count aggregate rows", title))
        .collect();

    let doc = JsonReport {
        metadata: &report.metadata,
        load_stats: &report.load_stats,
        warnings,
        charts,
    };

    serde_json::to_string_pretty(&doc).map_err(Into::into)
}

/// Render the available filter values.
pub fn generate_options_listing(options: &FilterOptions) -> String {
    let mut listing = String::new();

    listing.push_str(&format!(
        "Years: {} – {}\n\n",
        options.year_min, options.year_max
    ));

    listing.push_str(&format!("Regions ({}):\n", options.regions.len()));
    for region in &options.regions {
        listing.push_str(&format!("  - {}\n", region));
    }

    listing.push_str(&format!("\nCountries ({}):\n", options.countries.len()));
    for country in &options.countries {
        listing.push_str(&format!("  - {}\n", country));
    }

    listing
}
