//! Declarative chart specifications for an external renderer.
//!
//! Each panel becomes a Vega-Lite style spec: the derived rows plus the
//! encoding instructions (fields, types, scales, sort order, tooltips).
//! Nothing here draws anything.

use crate::analysis::AGE_ORDER;
use crate::models::{
    AgeSexView, ComparisonView, Panel, PanelBody, RegionBarView, SeriesType, TrendView,
    WorldMapView,
};
use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Map, Value};

const MAP_WIDTH: u32 = 600;
const MAP_HEIGHT: u32 = 300;
const MAP_PROJECTION: &str = "equirectangular";
const HIGHLIGHT_COLOR: &str = "red";
const BAR_COLOR: &str = "#1f77b4";

/// One chart, ready to hand to a renderer.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub encoding: Value,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    /// Shown instead of a chart when the filters matched nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChartSpec {
    fn new(title: &str, mark: &str, data: Value, encoding: Value) -> Self {
        Self {
            title: title.to_string(),
            mark: Some(mark.to_string()),
            data,
            encoding,
            properties: Map::new(),
            message: None,
        }
    }

    fn with_property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }
}

/// Build the chart spec for a panel.
pub fn chart_for_panel(panel: &Panel) -> Result<ChartSpec> {
    match &panel.body {
        PanelBody::WorldMap(view) => world_map_chart(&panel.title, view),
        PanelBody::RegionBars(view) => region_chart(&panel.title, view),
        PanelBody::Trend(view) => trend_chart(&panel.title, view),
        PanelBody::AgeSex(view) => age_sex_chart(&panel.title, view),
        PanelBody::Comparison(view) => comparison_chart(&panel.title, view),
        PanelBody::NoData(message) => Ok(ChartSpec {
            title: panel.title.clone(),
            mark: None,
            data: Value::Null,
            encoding: Value::Null,
            properties: Map::new(),
            message: Some(message.clone()),
        }),
    }
}

fn world_map_chart(title: &str, view: &WorldMapView) -> Result<ChartSpec> {
    let domain = view
        .color_domain
        .map(|(lo, hi)| json!([lo, hi]))
        .unwrap_or(Value::Null);

    let encoding = json!({
        "color": {
            "field": "total_deaths",
            "type": "quantitative",
            "scale": { "domain": domain, "scheme": "oranges" }
        },
        "tooltip": [
            { "field": "country", "type": "nominal", "title": "Country" },
            { "field": "total_deaths", "type": "quantitative", "title": "Mortality" },
            { "field": "total_death_rate", "type": "quantitative", "title": "Total_Mortality" }
        ]
    });

    Ok(
        ChartSpec::new(title, "geoshape", serde_json::to_value(&view.rows)?, encoding)
            .with_property("width", json!(MAP_WIDTH))
            .with_property("height", json!(MAP_HEIGHT))
            .with_property("projection", json!({ "type": MAP_PROJECTION }))
            .with_property(
                "lookup",
                json!({
                    "geometry_key": "id",
                    "data_key": "country_code",
                    "fields": ["total_deaths", "country", "total_death_rate"]
                }),
            )
            .with_property("background", json!({ "fill": "#aaa", "stroke": "white" })),
    )
}

fn region_chart(title: &str, view: &RegionBarView) -> Result<ChartSpec> {
    let encoding = json!({
        "x": {
            "field": "country",
            "type": "nominal",
            "sort": "-y",
            "title": "Country",
            "axis": { "labelAngle": -90, "labelFontSize": 10 }
        },
        "y": { "field": "number", "type": "quantitative", "title": "Total Mortality" },
        "color": {
            "condition": { "test": "datum.highlighted", "value": HIGHLIGHT_COLOR },
            "value": BAR_COLOR
        },
        "tooltip": [
            { "field": "country", "type": "nominal", "title": "Country" },
            { "field": "number", "type": "quantitative", "title": "Total Mortality" }
        ]
    });

    Ok(
        ChartSpec::new(title, "bar", serde_json::to_value(&view.bars)?, encoding)
            .with_property("width", json!(1200))
            .with_property("height", json!(600)),
    )
}

fn trend_chart(title: &str, view: &TrendView) -> Result<ChartSpec> {
    let domain: Vec<String> = SeriesType::all().iter().map(|s| s.to_string()).collect();
    let range: Vec<&str> = SeriesType::all().iter().map(|s| s.color()).collect();

    let encoding = json!({
        "x": { "field": "year", "type": "ordinal", "title": "Year" },
        "y": { "field": "number", "type": "quantitative", "title": "Mortality" },
        "color": {
            "field": "series_type",
            "type": "nominal",
            "title": "Mortality Type",
            "scale": { "domain": domain, "range": range }
        },
        "tooltip": [
            { "field": "year", "type": "ordinal" },
            { "field": "series_type", "type": "nominal" },
            { "field": "number", "type": "quantitative" }
        ]
    });

    Ok(
        ChartSpec::new(title, "line", serde_json::to_value(view.long_form())?, encoding)
            .with_property("width", json!(800))
            .with_property("height", json!(400)),
    )
}

fn age_sex_chart(title: &str, view: &AgeSexView) -> Result<ChartSpec> {
    let encoding = json!({
        "x": {
            "field": "age_group",
            "type": "nominal",
            "sort": AGE_ORDER,
            "axis": { "labelAngle": -90 }
        },
        "xOffset": { "field": "sex" },
        "y": {
            "field": "number",
            "type": "quantitative",
            "title": "Mortality",
            "axis": { "grid": false }
        },
        "color": {
            "field": "sex",
            "type": "nominal",
            "scale": { "domain": ["All", "Male", "Female"] }
        },
        "tooltip": [
            { "field": "sex", "type": "nominal", "title": "Sex" },
            { "field": "age_group", "type": "nominal", "title": "Age Group" },
            { "field": "number", "type": "quantitative", "title": "Total Mortality" }
        ]
    });

    Ok(
        ChartSpec::new(title, "bar", serde_json::to_value(&view.bars)?, encoding)
            .with_property("width", json!(800))
            .with_property("height", json!(400)),
    )
}

fn comparison_chart(title: &str, view: &ComparisonView) -> Result<ChartSpec> {
    let encoding = json!({
        "x": { "field": "country", "type": "nominal", "axis": { "labelAngle": 0 } },
        "xOffset": { "field": "gender" },
        "y": {
            "field": "number",
            "type": "quantitative",
            "title": "Mortality",
            "axis": { "grid": false }
        },
        "color": {
            "field": "gender",
            "type": "nominal",
            "scale": { "domain": ["All", "Female", "Male"] }
        },
        "tooltip": [
            { "field": "country", "type": "nominal", "title": "Country" },
            { "field": "gender", "type": "nominal" },
            { "field": "number", "type": "quantitative", "title": "Mortality" }
        ]
    });

    Ok(
        ChartSpec::new(title, "bar", serde_json::to_value(&view.bars)?, encoding)
            .with_property("width", json!(800))
            .with_property("height", json!(400)),
    )
}
