// Utils

pub mod prometheus_metrics;
pub mod text;

pub use text::{contains_any, escape_html, sanitize_filename, truncate_chars};
