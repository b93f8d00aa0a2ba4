//! Error types and result codes for scoring operations.
//!
//! Two layers live here:
//!
//! - [`Error`] is the rich Rust error returned by every fallible operation.
//!   It carries the context needed to explain a failure (paths, declared and
//!   decoded dimensions, decoder messages, header analysis).
//! - [`ResultCode`] is the closed, ABI-stable taxonomy every [`Error`]
//!   collapses to. The ordinals match the C API and must not change.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::analysis::DataAnalysis;
use crate::format::ImageFormat;

/// Result type alias for scoring operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Closed enumeration of outcomes for a scoring call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i32)]
pub enum ResultCode {
    /// Success.
    Ok = 0,
    /// Malformed or null arguments, or a background outside 0.0-1.0.
    InvalidInput = -1,
    /// The path does not resolve to a readable file.
    FileNotFound = -2,
    /// Container magic bytes were not recognized.
    UnsupportedFormat = -3,
    /// The decoded images differ in dimensions.
    SizeMismatch = -4,
    /// A decoded image is smaller than the multi-scale minimum.
    TooSmall = -5,
    /// Allocation failed or the decode memory ceiling was exceeded.
    OutOfMemory = -6,
    /// Recognized format with a well-formed header but an invalid payload.
    CorruptData = -7,
    /// Zero-length input buffer.
    EmptyData = -8,
    /// Recognized format that the decoder rejected.
    DecodeFailed = -9,
    /// Unclassified failure.
    Unknown = -99,
}

impl ResultCode {
    /// Every code, in ordinal order (success first, `Unknown` last).
    pub const ALL: [ResultCode; 11] = [
        Self::Ok,
        Self::InvalidInput,
        Self::FileNotFound,
        Self::UnsupportedFormat,
        Self::SizeMismatch,
        Self::TooSmall,
        Self::OutOfMemory,
        Self::CorruptData,
        Self::EmptyData,
        Self::DecodeFailed,
        Self::Unknown,
    ];

    /// The raw ordinal used across the C boundary.
    #[must_use]
    pub fn raw(self) -> i32 {
        self as i32
    }

    /// Look up a code by its raw ordinal.
    #[must_use]
    pub fn from_raw(raw: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.raw() == raw)
    }

    /// Whether this code signals success.
    #[must_use]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Fixed human-readable text for this code.
    ///
    /// Total over the enumeration and independent of any diagnostic state.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "Success",
            Self::InvalidInput => "Invalid input parameters",
            Self::FileNotFound => "File not found or could not be loaded",
            Self::UnsupportedFormat => "Unsupported image format",
            Self::SizeMismatch => "Image size mismatch",
            Self::TooSmall => "Image too small (minimum 8x8 pixels)",
            Self::OutOfMemory => "Out of memory",
            Self::CorruptData => "Corrupt or invalid image data",
            Self::EmptyData => "Empty data buffer",
            Self::DecodeFailed => "Failed to decode image data",
            Self::Unknown => "Unknown error",
        }
    }

    /// Short identifier, as spelled in the enumeration.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::InvalidInput => "InvalidInput",
            Self::FileNotFound => "FileNotFound",
            Self::UnsupportedFormat => "UnsupportedFormat",
            Self::SizeMismatch => "SizeMismatch",
            Self::TooSmall => "TooSmall",
            Self::OutOfMemory => "OutOfMemory",
            Self::CorruptData => "CorruptData",
            Self::EmptyData => "EmptyData",
            Self::DecodeFailed => "DecodeFailed",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.raw())
    }
}

/// Errors that can occur while scoring a pair of images.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Background intensity is not a finite value in 0.0-1.0.
    #[error("Background intensity must be between 0.0 and 1.0, got {0}")]
    InvalidBackground(f32),

    /// Malformed arguments (null pointers, non UTF-8 paths, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A configuration document could not be read or parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A path could not be opened or read.
    #[error("Failed to read {path}: {source}")]
    FileNotFound {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The input buffer has zero length.
    #[error("Empty data buffer provided")]
    EmptyData,

    /// Magic bytes did not match any supported container.
    #[error("Unrecognized image container")]
    UnsupportedFormat {
        /// Header analysis of the rejected buffer.
        analysis: Box<DataAnalysis>,
    },

    /// The header is well formed but the payload failed to decode.
    #[error("Corrupt {format} data: {reason}")]
    CorruptData {
        /// Detected container.
        format: ImageFormat,
        /// Decoder message.
        reason: String,
        /// Header analysis of the rejected buffer.
        analysis: Box<DataAnalysis>,
    },

    /// The decoder rejected a buffer of a recognized format.
    #[error("Failed to decode {format} data: {reason}")]
    DecodeFailed {
        /// Detected container.
        format: ImageFormat,
        /// Decoder message.
        reason: String,
        /// Header analysis of the rejected buffer.
        analysis: Box<DataAnalysis>,
    },

    /// A decoded image is below the minimum size.
    #[error("Image too small: {width}x{height} pixels (minimum {min}x{min})")]
    TooSmall {
        /// Decoded width.
        width: usize,
        /// Decoded height.
        height: usize,
        /// Minimum side length.
        min: usize,
    },

    /// Image dimensions don't match between the original and distorted images.
    #[error("Dimension mismatch: original is {}x{}, distorted is {}x{}", expected.0, expected.1, actual.0, actual.1)]
    SizeMismatch {
        /// Original dimensions (width, height).
        expected: (usize, usize),
        /// Distorted dimensions (width, height).
        actual: (usize, usize),
    },

    /// Allocation failed or a decode limit was hit.
    #[error("Out of memory: {reason}")]
    OutOfMemory {
        /// What could not be allocated.
        reason: String,
    },

    /// The metric itself failed.
    #[error("SSIMULACRA2 computation failed: {reason}")]
    Metric {
        /// Reason for the failure.
        reason: String,
    },

    /// Anything else, including panics caught at the C boundary.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// The result code this error collapses to.
    #[must_use]
    pub fn code(&self) -> ResultCode {
        match self {
            Self::InvalidBackground(_) | Self::InvalidInput(_) | Self::Config(_) => {
                ResultCode::InvalidInput
            }
            Self::FileNotFound { .. } => ResultCode::FileNotFound,
            Self::EmptyData => ResultCode::EmptyData,
            Self::UnsupportedFormat { .. } => ResultCode::UnsupportedFormat,
            Self::CorruptData { .. } => ResultCode::CorruptData,
            Self::DecodeFailed { .. } => ResultCode::DecodeFailed,
            Self::TooSmall { .. } => ResultCode::TooSmall,
            Self::SizeMismatch { .. } => ResultCode::SizeMismatch,
            Self::OutOfMemory { .. } => ResultCode::OutOfMemory,
            Self::Metric { .. } | Self::Unknown(_) => ResultCode::Unknown,
        }
    }

    /// Header analysis attached to decode failures, if any.
    #[must_use]
    pub fn analysis(&self) -> Option<&DataAnalysis> {
        match self {
            Self::UnsupportedFormat { analysis }
            | Self::CorruptData { analysis, .. }
            | Self::DecodeFailed { analysis, .. } => Some(analysis),
            _ => None,
        }
    }

    /// Multi-line diagnostic text describing what specifically failed.
    #[must_use]
    pub fn details(&self) -> String {
        let mut out = self.to_string();
        match self {
            Self::FileNotFound { path, source } => {
                out.push_str(&format!("\nPath: {}\nI/O error kind: {:?}", path.display(), source.kind()));
            }
            Self::UnsupportedFormat { .. } => {
                out.push_str(&format!("\nSupported formats are {}", supported_format_list()));
            }
            Self::DecodeFailed { .. } => {
                out.push_str(
                    "\nPossible causes:\n\
                     - Unsupported image format variant\n\
                     - Incomplete image data\n\
                     - Corrupted image header",
                );
            }
            Self::TooSmall { min, .. } => {
                out.push_str(&format!("\nMinimum required size: {min}x{min} pixels"));
            }
            _ => {}
        }
        if let Some(analysis) = self.analysis() {
            out.push_str("\nImage analysis:\n");
            out.push_str(&analysis.to_string());
        }
        out
    }
}

fn supported_format_list() -> String {
    ImageFormat::ALL
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}
