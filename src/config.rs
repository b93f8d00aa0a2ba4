//! Scoring configuration.
//!
//! [`ScoreConfig`] is the single configuration surface of the engine. It can
//! be built in code through [`ScoreConfig::builder`] or loaded from JSON:
//!
//! ```json
//! { "background": 0.5, "alpha_blend": "worst_case", "parallel_decode": true }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Background intensity used when none is given.
pub const DEFAULT_BACKGROUND: f32 = 0.5;

/// Dark and bright backgrounds compared by [`AlphaBlend::WorstCase`].
pub const WORST_CASE_BACKGROUNDS: [f32; 2] = [0.1, 0.9];

/// How images with transparency are flattened before comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaBlend {
    /// Composite onto the configured background intensity.
    #[default]
    Background,
    /// Composite onto dark and bright backgrounds and keep the lower score.
    ///
    /// The configured background is ignored. Opaque pairs are scored once.
    WorstCase,
}

/// Configuration for a scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Flat gray level in 0.0-1.0 used to composite transparent pixels.
    pub background: f32,

    /// Alpha flattening strategy.
    pub alpha_blend: AlphaBlend,

    /// Decode working-set ceiling in bytes, counted as 16 bytes per pixel.
    /// `None` applies [`DEFAULT_DECODE_CEILING`](crate::decode::DEFAULT_DECODE_CEILING).
    pub max_decode_bytes: Option<u64>,

    /// Decode the two inputs concurrently on the rayon pool.
    pub parallel_decode: bool,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            background: DEFAULT_BACKGROUND,
            alpha_blend: AlphaBlend::default(),
            max_decode_bytes: None,
            parallel_decode: true,
        }
    }
}

impl ScoreConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ScoreConfigBuilder {
        ScoreConfigBuilder::default()
    }

    /// Default configuration with a specific background intensity.
    #[must_use]
    pub fn with_background(background: f32) -> Self {
        Self {
            background,
            ..Self::default()
        }
    }

    /// Check the configuration before any I/O or decode work.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.background) {
            return Err(Error::InvalidBackground(self.background));
        }
        if self.max_decode_bytes == Some(0) {
            return Err(Error::Config("max_decode_bytes must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}

/// Builder for [`ScoreConfig`].
#[derive(Debug, Default)]
pub struct ScoreConfigBuilder {
    background: Option<f32>,
    alpha_blend: Option<AlphaBlend>,
    max_decode_bytes: Option<u64>,
    parallel_decode: Option<bool>,
}

impl ScoreConfigBuilder {
    /// Set the background intensity.
    #[must_use]
    pub fn background(mut self, background: f32) -> Self {
        self.background = Some(background);
        self
    }

    /// Set the alpha flattening strategy.
    #[must_use]
    pub fn alpha_blend(mut self, alpha_blend: AlphaBlend) -> Self {
        self.alpha_blend = Some(alpha_blend);
        self
    }

    /// Cap decoder allocations.
    #[must_use]
    pub fn max_decode_bytes(mut self, bytes: u64) -> Self {
        self.max_decode_bytes = Some(bytes);
        self
    }

    /// Enable or disable concurrent decoding.
    #[must_use]
    pub fn parallel_decode(mut self, parallel: bool) -> Self {
        self.parallel_decode = Some(parallel);
        self
    }

    /// Build the configuration.
    ///
    /// Values are not validated here; scoring calls validate before decoding.
    #[must_use]
    pub fn build(self) -> ScoreConfig {
        let defaults = ScoreConfig::default();
        ScoreConfig {
            background: self.background.unwrap_or(defaults.background),
            alpha_blend: self.alpha_blend.unwrap_or(defaults.alpha_blend),
            max_decode_bytes: self.max_decode_bytes.or(defaults.max_decode_bytes),
            parallel_decode: self.parallel_decode.unwrap_or(defaults.parallel_decode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultCode;

    #[test]
    fn test_defaults() {
        let config = ScoreConfig::default();
        assert_eq!(config.background, 0.5);
        assert_eq!(config.alpha_blend, AlphaBlend::Background);
        assert!(config.parallel_decode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ScoreConfig::builder()
            .background(0.25)
            .alpha_blend(AlphaBlend::WorstCase)
            .max_decode_bytes(1 << 20)
            .parallel_decode(false)
            .build();
        assert_eq!(config.background, 0.25);
        assert_eq!(config.alpha_blend, AlphaBlend::WorstCase);
        assert_eq!(config.max_decode_bytes, Some(1 << 20));
        assert!(!config.parallel_decode);
    }

    #[test]
    fn test_validate_background_range() {
        for ok in [0.0, 0.5, 1.0] {
            assert!(ScoreConfig::with_background(ok).validate().is_ok());
        }
        for bad in [-0.01, 1.01, f32::NAN, f32::INFINITY] {
            let err = ScoreConfig::with_background(bad).validate().unwrap_err();
            assert_eq!(err.code(), ResultCode::InvalidInput);
        }
    }

    #[test]
    fn test_json_partial_document() {
        let config = ScoreConfig::from_json_str(r#"{ "alpha_blend": "worst_case" }"#).unwrap();
        assert_eq!(config.alpha_blend, AlphaBlend::WorstCase);
        assert_eq!(config.background, DEFAULT_BACKGROUND);
    }

    #[test]
    fn test_json_rejects_out_of_range() {
        let err = ScoreConfig::from_json_str(r#"{ "background": 2.0 }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidBackground(_)));

        let err = ScoreConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
