//! # ssim2-engine
//!
//! SSIMULACRA2 image similarity scoring with file and in-memory entry points.
//!
//! The engine decodes two encoded images (PNG, JPEG, GIF, BMP, TIFF, WebP),
//! flattens transparency onto a gray background, and returns the
//! SSIMULACRA 2.1 score of the distorted image against the original.
//! Failures come back as a rich [`Error`] that collapses to a stable
//! [`ResultCode`], with multi-line [`Error::details`] for diagnostics.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ssim2_engine::{QualityBand, compute_from_files};
//!
//! let score = compute_from_files("original.png", "distorted.jpg")?;
//! println!("{score:.8} ({})", QualityBand::from_score(score));
//! # Ok::<(), ssim2_engine::Error>(())
//! ```
//!
//! With a custom configuration:
//!
//! ```rust,no_run
//! use ssim2_engine::{AlphaBlend, ScoreConfig, Scorer};
//!
//! let config = ScoreConfig::builder()
//!     .alpha_blend(AlphaBlend::WorstCase)
//!     .max_decode_bytes(512 * 1024 * 1024)
//!     .build();
//! let original = std::fs::read("original.png")?;
//! let distorted = std::fs::read("distorted.webp")?;
//! let score = Scorer::new(config).score_memory(&original, &distorted)?;
//! # let _ = score;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: [`Scorer`] and the free scoring functions
//! - [`config`]: background intensity, alpha strategy, decode limits
//! - [`decode`]: reading and decoding with failure classification
//! - [`format`]: container sniffing and header inspection
//! - [`analysis`]: human-readable buffer analysis
//! - [`metrics`]: the SSIMULACRA2 computation and quality bands
//! - [`diagnostics`]: per-thread last-error slot
//! - [`error`]: error types and result codes

pub mod analysis;
pub mod config;
pub mod decode;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod format;
pub mod metrics;

pub use analysis::{DataAnalysis, analyze_image_data};
pub use config::{AlphaBlend, DEFAULT_BACKGROUND, ScoreConfig, ScoreConfigBuilder};
pub use decode::{DEFAULT_DECODE_CEILING, DecodedImage, MIN_DIMENSION};
pub use engine::{
    CONSISTENCY_TOLERANCE, ImageRole, Scorer, VERSION, compute_from_files,
    compute_from_files_with_background, compute_from_memory, compute_from_memory_with_background,
    error_message, last_error_details, scores_agree, version,
};
pub use error::{Error, Result, ResultCode};
pub use format::ImageFormat;
pub use metrics::QualityBand;
