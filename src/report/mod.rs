//! Final report assembly.
//!
//! This module produces the global risk synthesis and renders the
//! Markdown report combining camera findings, weather data, and the
//! annotated-image gallery.

pub mod generator;

pub use generator::{generate_final_report, ReportInputs};
