//! Image preprocessing applied to page rasters before recognition

pub mod pipeline;
pub mod steps;

pub use pipeline::{Pipeline, Preset};
