use crate::error::PipelineError;
use clap::ValueEnum;
use image::DynamicImage;
use serde::Deserialize;
use std::time::Instant;

use super::steps;

/// Preprocessing preset names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Hand the raster to the engine as rendered
    None,
    /// Grayscale only; enough for clean rendered pages
    #[default]
    Minimal,
    /// Grayscale, contrast stretch and unsharp mask for scanned templates
    Enhanced,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Enhanced => "enhanced",
        }
    }
}

/// Timing information for a single preprocessing step
#[derive(Debug, Clone)]
pub struct StepTiming {
    pub name: &'static str,
    pub time_ms: u64,
}

/// Preprocessed image plus how long each step took
#[derive(Debug, Clone)]
pub struct PreprocessingResult {
    pub image: DynamicImage,
    pub total_time_ms: u64,
    pub steps: Vec<StepTiming>,
}

type Step = fn(DynamicImage) -> Result<DynamicImage, PipelineError>;

const MINIMAL_STEPS: &[(&str, Step)] = &[("grayscale", steps::grayscale::apply as Step)];

const ENHANCED_STEPS: &[(&str, Step)] = &[
    ("grayscale", steps::grayscale::apply as Step),
    ("normalize", steps::normalize::apply as Step),
    ("sharpen", steps::sharpen::apply as Step),
];

/// Applies the steps of a preset in order
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    preset: Preset,
}

impl Pipeline {
    pub fn new(preset: Preset) -> Self {
        Self { preset }
    }

    fn steps(&self) -> &'static [(&'static str, Step)] {
        match self.preset {
            Preset::None => &[],
            Preset::Minimal => MINIMAL_STEPS,
            Preset::Enhanced => ENHANCED_STEPS,
        }
    }

    pub fn process(&self, image: DynamicImage) -> Result<PreprocessingResult, PipelineError> {
        let start = Instant::now();
        let mut timings = Vec::new();
        let mut img = image;

        for &(name, step) in self.steps() {
            let step_start = Instant::now();
            img = step(img)?;
            timings.push(StepTiming {
                name,
                time_ms: step_start.elapsed().as_millis() as u64,
            });
        }

        let result = PreprocessingResult {
            image: img,
            total_time_ms: start.elapsed().as_millis() as u64,
            steps: timings,
        };
        tracing::debug!(
            "Preprocessing ({}) took {}ms: {:?}",
            self.preset.as_str(),
            result.total_time_ms,
            result.steps
        );
        Ok(result)
    }
}
