//! TOML configuration.
//!
//! Only `[db]` is required; every other section falls back to defaults.
//! The sections map onto the core parameter structs through the `to_*`
//! helpers so that `copycat-core` never sees TOML types.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use copycat_core::{DetectionParams, ExtractionLimits, ModelParams};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    #[serde(default = "default_rejection_threshold")]
    pub rejection_threshold: f64,
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,
    #[serde(default = "default_noise_floor")]
    pub noise_floor: f64,
    #[serde(default = "default_true")]
    pub exclude_same_author: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            rejection_threshold: default_rejection_threshold(),
            min_text_length: default_min_text_length(),
            noise_floor: default_noise_floor(),
            exclude_same_author: true,
        }
    }
}

fn default_rejection_threshold() -> f64 {
    0.3
}
fn default_min_text_length() -> usize {
    10
}
fn default_noise_floor() -> f64 {
    0.05
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    #[serde(default = "default_rebuild_every")]
    pub rebuild_every: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            rebuild_every: default_rebuild_every(),
        }
    }
}

fn default_max_features() -> usize {
    5000
}
fn default_rebuild_every() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: usize,
    #[serde(default = "default_max_pdf_pages")]
    pub max_pdf_pages: usize,
    #[serde(default = "default_max_image_pixels")]
    pub max_image_pixels: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: default_max_input_bytes(),
            max_pdf_pages: default_max_pdf_pages(),
            max_image_pixels: default_max_image_pixels(),
        }
    }
}

fn default_max_input_bytes() -> usize {
    50 * 1024 * 1024
}
fn default_max_pdf_pages() -> usize {
    500
}
fn default_max_image_pixels() -> u64 {
    40_000_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ocr_command")]
    pub command: String,
    #[serde(default = "default_ocr_language")]
    pub language: String,
    #[serde(default = "default_ocr_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_ocr_command(),
            language: default_ocr_language(),
            timeout_secs: default_ocr_timeout_secs(),
        }
    }
}

fn default_ocr_command() -> String {
    "tesseract".to_string()
}
fn default_ocr_language() -> String {
    "eng".to_string()
}
fn default_ocr_timeout_secs() -> u64 {
    60
}

impl Config {
    pub fn detection_params(&self) -> DetectionParams {
        DetectionParams {
            rejection_threshold: self.detection.rejection_threshold,
            min_text_length: self.detection.min_text_length,
            noise_floor: self.detection.noise_floor,
            exclude_same_author: self.detection.exclude_same_author,
        }
    }

    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            max_features: self.model.max_features,
            rebuild_every: self.model.rebuild_every,
        }
    }

    pub fn extraction_limits(&self) -> ExtractionLimits {
        ExtractionLimits {
            max_input_bytes: self.extraction.max_input_bytes,
            max_pdf_pages: self.extraction.max_pdf_pages,
            max_image_pixels: self.extraction.max_image_pixels,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if !(0.0..=1.0).contains(&config.detection.rejection_threshold) {
        anyhow::bail!("detection.rejection_threshold must be in [0.0, 1.0]");
    }

    if !(0.0..1.0).contains(&config.detection.noise_floor) {
        anyhow::bail!("detection.noise_floor must be in [0.0, 1.0)");
    }

    if config.model.max_features == 0 {
        anyhow::bail!("model.max_features must be > 0");
    }

    if config.model.rebuild_every == 0 {
        anyhow::bail!("model.rebuild_every must be > 0");
    }

    if config.extraction.max_input_bytes == 0 {
        anyhow::bail!("extraction.max_input_bytes must be > 0");
    }

    if config.ocr.enabled && config.ocr.timeout_secs == 0 {
        anyhow::bail!("ocr.timeout_secs must be > 0 when OCR is enabled");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse("[db]\npath = \"./data/copycat.sqlite\"\n").unwrap();
        assert_eq!(cfg.detection.rejection_threshold, 0.3);
        assert_eq!(cfg.detection.min_text_length, 10);
        assert!(cfg.detection.exclude_same_author);
        assert_eq!(cfg.model.max_features, 5000);
        assert_eq!(cfg.model.rebuild_every, 1);
        assert_eq!(cfg.extraction.max_pdf_pages, 500);
        assert_eq!(cfg.ocr.command, "tesseract");
        assert_eq!(cfg.detection_params(), DetectionParams::default());
        assert_eq!(cfg.model_params(), ModelParams::default());
        assert_eq!(cfg.extraction_limits(), ExtractionLimits::default());
    }

    #[test]
    fn test_overrides() {
        let cfg = parse(
            r#"
[db]
path = "x.sqlite"

[detection]
rejection_threshold = 0.4
exclude_same_author = false

[model]
rebuild_every = 10

[ocr]
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(cfg.detection.rejection_threshold, 0.4);
        assert!(!cfg.detection.exclude_same_author);
        assert_eq!(cfg.model.rebuild_every, 10);
        assert!(!cfg.ocr.enabled);
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let err = parse("[db]\npath = \"x\"\n[detection]\nrejection_threshold = 1.5\n")
            .unwrap_err();
        assert!(err.to_string().contains("rejection_threshold"));
    }

    #[test]
    fn test_rejects_zero_rebuild_every() {
        assert!(parse("[db]\npath = \"x\"\n[model]\nrebuild_every = 0\n").is_err());
    }

    #[test]
    fn test_missing_db_section() {
        assert!(parse("[detection]\nrejection_threshold = 0.3\n").is_err());
    }
}
