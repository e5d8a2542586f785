//! Analysis modules.
//!
//! Turns the canonical table plus a filter selection into the panels of
//! one dashboard page.

pub mod aggregator;
pub mod filters;
pub mod views;

pub use filters::{
    default_comparison_countries, FilterOptions, Selection, SelectionRequest, DEFAULT_YEAR,
};
pub use views::{age_sex, comparison, region_bars, trend, world_map, AGE_ORDER};

use crate::data::Dataset;
use crate::models::{Page, Panel, PanelBody, TotalsPolicy};
use tracing::info;

/// Build the panels of `page` for the given selection.
pub fn build_panels(
    dataset: &Dataset,
    page: Page,
    selection: &Selection,
    policy: TotalsPolicy,
) -> Vec<Panel> {
    info!(
        "Building {} page for year {} ({} totals)",
        page, selection.year, policy
    );

    match page {
        Page::Overview => overview_panels(dataset, selection, policy),
        Page::Comparison => vec![comparison_panel(dataset, selection, policy)],
    }
}

fn overview_panels(dataset: &Dataset, selection: &Selection, policy: TotalsPolicy) -> Vec<Panel> {
    let year = selection.year;
    let country = selection.country.as_deref();
    let country_label = country.unwrap_or("no country");
    let mut panels = Vec::with_capacity(4);

    let map = world_map(dataset, year, policy);
    let body = if map.rows.is_empty() {
        PanelBody::NoData(format!("No data available for {}.", year))
    } else {
        PanelBody::WorldMap(map)
    };
    panels.push(Panel::new(
        "Plot 1: World Map of cardiovascular disease mortality",
        body,
    ));

    let region = selection.region.as_deref().unwrap_or_default();
    let bars = region_bars(dataset, region, year, country, policy);
    let body = if bars.bars.is_empty() {
        PanelBody::NoData(format!("No data available for {} in {}.", region, year))
    } else {
        PanelBody::RegionBars(bars)
    };
    panels.push(Panel::new(
        format!(
            "Plot 2: Bar plot showing mortality comparison for each country in {} in {}",
            region, year
        ),
        body,
    ));

    let body = match country.and_then(|c| trend(dataset, c, policy)) {
        Some(view) => PanelBody::Trend(view),
        None => PanelBody::NoData("No data available for the selected country.".to_string()),
    };
    panels.push(Panel::new(
        format!("Plot 3: Trend Plot of Mortality for {} in {}", country_label, year),
        body,
    ));

    let body = match country {
        None => PanelBody::NoData(
            "Please select a country and year from the previous plots.".to_string(),
        ),
        Some(c) => match age_sex(dataset, c, year) {
            Some(view) => PanelBody::AgeSex(view),
            None => PanelBody::NoData(format!("No data available for {} in {}.", c, year)),
        },
    };
    panels.push(Panel::new(
        format!(
            "Plot 4: Cardiovascular disease mortality by age group and sex for {} in {}",
            country_label, year
        ),
        body,
    ));

    panels
}

fn comparison_panel(dataset: &Dataset, selection: &Selection, policy: TotalsPolicy) -> Panel {
    let body = match comparison(dataset, &selection.countries, selection.year, policy) {
        Some(view) => PanelBody::Comparison(view),
        None => PanelBody::NoData(
            "No data available for the selected countries. Please select different countries."
                .to_string(),
        ),
    };
    Panel::new("Comparison of Mortality Among Different Countries", body)
}
