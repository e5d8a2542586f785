//! Report rendering: Markdown tables or JSON chart specs.

pub mod chart;
pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report, generate_options_listing};
