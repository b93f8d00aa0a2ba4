//! Scoring entry points.
//!
//! [`Scorer`] owns a [`ScoreConfig`] and scores pairs of images given as
//! paths, encoded buffers or already decoded images. The free functions
//! mirror the C API one-to-one and use a default scorer.
//!
//! Checks run in a fixed order so that the reported failure is
//! deterministic:
//!
//! 1. configuration (background range), before any I/O or decoding
//! 2. file reads, original first
//! 3. empty buffers, original first
//! 4. decoding of both images (optionally in parallel), original's error wins
//! 5. minimum size, then equal dimensions
//! 6. the metric itself

use std::fmt;
use std::path::Path;

use tracing::{debug, info_span};

use crate::config::{AlphaBlend, ScoreConfig, WORST_CASE_BACKGROUNDS};
use crate::decode::{self, DecodedImage, MIN_DIMENSION};
use crate::diagnostics;
use crate::error::{Error, Result, ResultCode};
use crate::metrics::ssimulacra2::calculate_ssimulacra2;

/// Identifier of the metric implementation.
pub const VERSION: &str = "SSIMULACRA 2.1";

/// Maximum difference at which two scores count as the same result.
pub const CONSISTENCY_TOLERANCE: f64 = 1e-6;

/// Which side of the comparison an input belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// The reference image.
    Original,
    /// The image being judged.
    Distorted,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => f.write_str("Original"),
            Self::Distorted => f.write_str("Distorted"),
        }
    }
}

/// An error together with the input it belongs to, if any.
struct Failure {
    role: Option<ImageRole>,
    error: Error,
}

impl Failure {
    fn of(role: ImageRole) -> impl FnOnce(Error) -> Self {
        move |error| Self {
            role: Some(role),
            error,
        }
    }

    fn call(error: Error) -> Self {
        Self { role: None, error }
    }
}

/// Scores image pairs with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: ScoreConfig,
}

impl Scorer {
    /// Create a scorer. The configuration is validated on every call.
    #[must_use]
    pub fn new(config: ScoreConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    /// Read, decode and score two image files.
    pub fn score_files(&self, original: impl AsRef<Path>, distorted: impl AsRef<Path>) -> Result<f64> {
        let (original, distorted) = (original.as_ref(), distorted.as_ref());
        let _span = info_span!("ssimulacra2.score", source = "files").entered();
        debug!(original = %original.display(), distorted = %distorted.display(), "scoring files");

        finish(self.run_files(original, distorted))
    }

    /// Decode and score two encoded images held in memory.
    pub fn score_memory(&self, original: &[u8], distorted: &[u8]) -> Result<f64> {
        let _span = info_span!("ssimulacra2.score", source = "memory").entered();
        debug!(original = original.len(), distorted = distorted.len(), "scoring buffers");

        finish(
            self.config
                .validate()
                .map_err(Failure::call)
                .and_then(|()| self.run_memory(original, distorted)),
        )
    }

    /// Score two images that were already decoded.
    pub fn score_decoded(&self, original: &DecodedImage, distorted: &DecodedImage) -> Result<f64> {
        let _span = info_span!("ssimulacra2.score", source = "decoded").entered();

        finish(
            self.config
                .validate()
                .map_err(Failure::call)
                .and_then(|()| self.run_decoded(original, distorted)),
        )
    }

    fn run_files(&self, original: &Path, distorted: &Path) -> std::result::Result<f64, Failure> {
        self.config.validate().map_err(Failure::call)?;
        let original = decode::read_file(original).map_err(Failure::of(ImageRole::Original))?;
        let distorted = decode::read_file(distorted).map_err(Failure::of(ImageRole::Distorted))?;
        self.run_memory(&original, &distorted)
    }

    fn run_memory(&self, original: &[u8], distorted: &[u8]) -> std::result::Result<f64, Failure> {
        if original.is_empty() {
            return Err(Failure::of(ImageRole::Original)(Error::EmptyData));
        }
        if distorted.is_empty() {
            return Err(Failure::of(ImageRole::Distorted)(Error::EmptyData));
        }

        let config = &self.config;
        let (original, distorted) = if config.parallel_decode {
            rayon::join(
                || decode::decode_bytes(original, config),
                || decode::decode_bytes(distorted, config),
            )
        } else {
            let original = decode::decode_bytes(original, config).map_err(Failure::of(ImageRole::Original))?;
            (Ok(original), decode::decode_bytes(distorted, config))
        };
        let original = original.map_err(Failure::of(ImageRole::Original))?;
        let distorted = distorted.map_err(Failure::of(ImageRole::Distorted))?;

        self.run_decoded(&original, &distorted)
    }

    fn run_decoded(&self, original: &DecodedImage, distorted: &DecodedImage) -> std::result::Result<f64, Failure> {
        check_size(original).map_err(Failure::of(ImageRole::Original))?;
        check_size(distorted).map_err(Failure::of(ImageRole::Distorted))?;
        if original.dimensions() != distorted.dimensions() {
            return Err(Failure::call(Error::SizeMismatch {
                expected: original.dimensions(),
                actual: distorted.dimensions(),
            }));
        }

        let score_with = |background: f32| {
            calculate_ssimulacra2(original.pixels.as_ref(), distorted.pixels.as_ref(), background)
        };

        let has_alpha = original.has_alpha || distorted.has_alpha;
        let score = match self.config.alpha_blend {
            AlphaBlend::WorstCase if has_alpha => {
                let [dark, bright] = WORST_CASE_BACKGROUNDS;
                let (dark, bright) = rayon::join(|| score_with(dark), || score_with(bright));
                let (dark, bright) = (dark.map_err(Failure::call)?, bright.map_err(Failure::call)?);
                debug!(dark, bright, "worst-case alpha scores");
                dark.min(bright)
            }
            AlphaBlend::WorstCase | AlphaBlend::Background => {
                score_with(self.config.background).map_err(Failure::call)?
            }
        };
        Ok(score)
    }
}

fn check_size(image: &DecodedImage) -> Result<()> {
    let (width, height) = image.dimensions();
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(Error::TooSmall {
            width,
            height,
            min: MIN_DIMENSION,
        });
    }
    Ok(())
}

/// Update the diagnostic slot with the outcome of a call.
fn finish(result: std::result::Result<f64, Failure>) -> Result<f64> {
    match result {
        Ok(score) => {
            diagnostics::clear();
            debug!(score, "scored");
            Ok(score)
        }
        Err(Failure { role, error }) => {
            debug!(code = %error.code(), role = ?role, "scoring failed: {error}");
            match role {
                Some(role) => diagnostics::record_text(format!("{role} image: {}", error.details())),
                None => diagnostics::record(&error),
            }
            Err(error)
        }
    }
}

/// Score two image files with the default background (0.5).
pub fn compute_from_files(original: impl AsRef<Path>, distorted: impl AsRef<Path>) -> Result<f64> {
    Scorer::default().score_files(original, distorted)
}

/// Score two image files, compositing transparency onto `background`.
pub fn compute_from_files_with_background(
    original: impl AsRef<Path>,
    distorted: impl AsRef<Path>,
    background: f32,
) -> Result<f64> {
    Scorer::new(ScoreConfig::with_background(background)).score_files(original, distorted)
}

/// Score two encoded images held in memory with the default background (0.5).
pub fn compute_from_memory(original: &[u8], distorted: &[u8]) -> Result<f64> {
    Scorer::default().score_memory(original, distorted)
}

/// Score two encoded images held in memory, compositing onto `background`.
pub fn compute_from_memory_with_background(
    original: &[u8],
    distorted: &[u8],
    background: f32,
) -> Result<f64> {
    Scorer::new(ScoreConfig::with_background(background)).score_memory(original, distorted)
}

/// Fixed text for a result code.
#[must_use]
pub fn error_message(code: ResultCode) -> &'static str {
    code.message()
}

/// Metric identifier; never fails.
#[must_use]
pub fn version() -> &'static str {
    VERSION
}

/// Details of the most recent failed scoring call on this thread.
#[must_use]
pub fn last_error_details() -> String {
    diagnostics::last_error_details()
}

/// Whether two scores agree within [`CONSISTENCY_TOLERANCE`].
#[must_use]
pub fn scores_agree(a: f64, b: f64) -> bool {
    (a - b).abs() < CONSISTENCY_TOLERANCE
}
