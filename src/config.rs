use crate::error::{MatchError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for turning pixels into [`ImageFeatures`](crate::core::features::ImageFeatures).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Square working resolution; `None` keeps the decoded size.
    pub working_size: Option<u32>,
    pub sample_stride: usize,
    pub alpha_threshold: u8,
    pub quantize_step: u8,
    pub max_colors: usize,
    pub max_labels: usize,
    pub extract_texture: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            working_size: Some(100),
            sample_stride: 4,
            alpha_threshold: 128,
            quantize_step: 32,
            max_colors: 5,
            max_labels: 10,
            extract_texture: true,
        }
    }
}

/// Relative weight of each score component. Only the ratios matter for
/// ranking, the defaults sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub title: f64,
    pub category: f64,
    pub description: f64,
    pub color: f64,
    pub object: f64,
    pub feature: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            title: 0.30,
            category: 0.20,
            description: 0.15,
            color: 0.15,
            object: 0.10,
            feature: 0.10,
        }
    }
}

impl ScoreWeights {
    fn values(&self) -> [f64; 6] {
        [
            self.title,
            self.category,
            self.description,
            self.color,
            self.object,
            self.feature,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub extraction: ExtractionConfig,
    pub weights: ScoreWeights,
    pub top_k: usize,
    pub max_score: f64,
    /// Leave claimed and returned items out of scoring.
    pub skip_resolved_items: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            weights: ScoreWeights::default(),
            top_k: 5,
            max_score: 0.98,
            skip_resolved_items: false,
        }
    }
}

impl EngineConfig {
    /// `<config_dir>/lostfound/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lostfound").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            MatchError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: EngineConfig = serde_json::from_str(&raw).map_err(|e| {
            MatchError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        log::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Load an explicit file, else the default location if it exists, else
    /// built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ex = &self.extraction;
        if ex.sample_stride == 0 {
            return Err(MatchError::InvalidConfig(
                "sample_stride must be at least 1".into(),
            ));
        }
        if ex.quantize_step == 0 || ex.quantize_step > 128 {
            return Err(MatchError::InvalidConfig(format!(
                "quantize_step must be within 1..=128, got {}",
                ex.quantize_step
            )));
        }
        if ex.working_size == Some(0) {
            return Err(MatchError::InvalidConfig(
                "working_size must be positive".into(),
            ));
        }
        if self.top_k == 0 {
            return Err(MatchError::InvalidConfig("top_k must be at least 1".into()));
        }
        if !(self.max_score > 0.0 && self.max_score <= 1.0) {
            return Err(MatchError::InvalidConfig(format!(
                "max_score must be within (0, 1], got {}",
                self.max_score
            )));
        }

        let weights = self.weights.values();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(MatchError::InvalidConfig(
                "score weights must be finite and non-negative".into(),
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(MatchError::InvalidConfig(
                "at least one score weight must be positive".into(),
            ));
        }
        Ok(())
    }
}
