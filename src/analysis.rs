//! Best-effort diagnostics for raw image buffers.

use std::fmt;

use serde::Serialize;

use crate::format::{self, ImageFormat};

/// Number of leading bytes shown in the hex dump.
const HEADER_DUMP_LEN: usize = 16;

/// Below this many bytes no container is reported.
const MIN_SNIFF_LEN: usize = 8;

/// Summary of an arbitrary byte buffer.
///
/// Produced by [`analyze_image_data`], which never fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataAnalysis {
    /// Buffer length in bytes.
    pub size: usize,
    /// First bytes of the buffer as space-separated hex.
    pub header_hex: String,
    /// Detected container, if the magic bytes matched.
    pub format: Option<ImageFormat>,
    /// Dimensions declared by the header, if parseable.
    pub dimensions: Option<(u32, u32)>,
    /// Structural anomalies found in the header or trailer.
    pub anomalies: Vec<String>,
}

impl DataAnalysis {
    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Analyze a buffer without decoding it.
///
/// Empty, truncated and unrecognized buffers all produce a descriptive
/// result.
#[must_use]
pub fn analyze_image_data(data: &[u8]) -> DataAnalysis {
    let header_hex = data
        .iter()
        .take(HEADER_DUMP_LEN)
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ");

    let header = if data.len() >= MIN_SNIFF_LEN {
        format::inspect(data)
    } else {
        format::HeaderInfo::default()
    };

    DataAnalysis {
        size: data.len(),
        header_hex,
        format: header.format,
        dimensions: header.dimensions,
        anomalies: header.anomalies,
    }
}

impl fmt::Display for DataAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Data size: 0 bytes\nData is null or empty");
        }

        writeln!(f, "Data size: {} bytes", self.size)?;
        writeln!(f, "Header bytes (hex): {}", self.header_hex)?;
        match self.format {
            Some(format) => writeln!(f, "Format detected: {format}")?,
            None if self.size < MIN_SNIFF_LEN => {
                writeln!(f, "Format detected: Data too small to determine format")?;
            }
            None => {
                writeln!(f, "Format detected: Unknown/Unsupported")?;
                let names: Vec<&str> = ImageFormat::ALL.iter().map(|f| f.name()).collect();
                writeln!(f, "Note: Supported formats are {}", names.join(", "))?;
            }
        }
        if let Some((w, h)) = self.dimensions {
            writeln!(f, "Declared dimensions: {w}x{h}")?;
        } else if self.format.is_some() {
            writeln!(f, "Declared dimensions: unreadable")?;
        }
        if self.anomalies.is_empty() {
            write!(f, "Anomalies: none")
        } else {
            write!(f, "Anomalies:")?;
            for anomaly in &self.anomalies {
                write!(f, "\n- {anomaly}")?;
            }
            Ok(())
        }
    }
}
