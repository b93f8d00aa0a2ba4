//! Quality metrics for image comparison.
//!
//! The engine scores with **SSIMULACRA2** (higher is better, ~100 for
//! identical images, unbounded below). [`QualityBand`] maps a score to the
//! qualitative bands used by the command-line tool.
//!
//! | Band | Score | Description |
//! |------|-------|-------------|
//! | NearLossless | >= 90 | Near mathematically lossless |
//! | VisuallyLossless | < 90 | Visually lossless |
//! | Excellent | < 85 | Excellent quality |
//! | VeryHigh | < 80 | Very high quality |
//! | High | < 70 | High quality |
//! | Medium | < 50 | Medium quality |
//! | Low | < 30 | Low quality |
//! | VeryLow | < 10 | Very low quality |
//! | Extreme | < 0 | Extremely low quality, very strong distortion |

pub mod ssimulacra2;

use serde::{Deserialize, Serialize};

/// Qualitative interpretation of a SSIMULACRA2 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityBand {
    /// Score < 0 (or NaN).
    Extreme,
    /// Score < 10.
    VeryLow,
    /// Score < 30.
    Low,
    /// Score < 50.
    Medium,
    /// Score < 70.
    High,
    /// Score < 80.
    VeryHigh,
    /// Score < 85.
    Excellent,
    /// Score < 90.
    VisuallyLossless,
    /// Score >= 90.
    NearLossless,
}

impl QualityBand {
    /// Determine the band for a score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score.is_nan() || score < 0.0 {
            Self::Extreme
        } else if score < 10.0 {
            Self::VeryLow
        } else if score < 30.0 {
            Self::Low
        } else if score < 50.0 {
            Self::Medium
        } else if score < 70.0 {
            Self::High
        } else if score < 80.0 {
            Self::VeryHigh
        } else if score < 85.0 {
            Self::Excellent
        } else if score < 90.0 {
            Self::VisuallyLossless
        } else {
            Self::NearLossless
        }
    }

    /// Lowest score that falls into this band.
    #[must_use]
    pub fn min_score(self) -> f64 {
        match self {
            Self::Extreme => f64::NEG_INFINITY,
            Self::VeryLow => 0.0,
            Self::Low => 10.0,
            Self::Medium => 30.0,
            Self::High => 50.0,
            Self::VeryHigh => 70.0,
            Self::Excellent => 80.0,
            Self::VisuallyLossless => 85.0,
            Self::NearLossless => 90.0,
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Extreme => "Extremely low quality, very strong distortion",
            Self::VeryLow => "Very low quality",
            Self::Low => "Low quality",
            Self::Medium => "Medium quality",
            Self::High => "High quality",
            Self::VeryHigh => "Very high quality",
            Self::Excellent => "Excellent quality",
            Self::VisuallyLossless => "Visually lossless",
            Self::NearLossless => "Near mathematically lossless",
        }
    }

    /// Get a short code for this band.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Extreme => "EXT",
            Self::VeryLow => "VLO",
            Self::Low => "LOW",
            Self::Medium => "MED",
            Self::High => "HI",
            Self::VeryHigh => "VHI",
            Self::Excellent => "EXC",
            Self::VisuallyLossless => "VLL",
            Self::NearLossless => "NML",
        }
    }
}

impl std::fmt::Display for QualityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}
