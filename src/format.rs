//! Container sniffing and header inspection.
//!
//! Nothing here decodes pixels. [`sniff`] identifies a container from its
//! magic bytes and [`inspect`] additionally parses the declared dimensions
//! and notes structural anomalies. Both accept arbitrary bytes and never
//! panic.

use std::fmt;

use serde::Serialize;

/// Image containers the engine can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG / JFIF.
    Jpeg,
    /// GIF (first frame only).
    Gif,
    /// Windows bitmap.
    Bmp,
    /// TIFF, either byte order.
    Tiff,
    /// WebP, lossy or lossless.
    WebP,
}

impl ImageFormat {
    /// All supported containers.
    pub const ALL: [ImageFormat; 6] = [
        Self::Png,
        Self::Jpeg,
        Self::Gif,
        Self::Bmp,
        Self::Tiff,
        Self::WebP,
    ];

    /// Display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Gif => "GIF",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
            Self::WebP => "WebP",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<ImageFormat> for image::ImageFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
            ImageFormat::Tiff => image::ImageFormat::Tiff,
            ImageFormat::WebP => image::ImageFormat::WebP,
        }
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Identify a container from its magic bytes.
#[must_use]
pub fn sniff(data: &[u8]) -> Option<ImageFormat> {
    if data.starts_with(&PNG_SIGNATURE) {
        Some(ImageFormat::Png)
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some(ImageFormat::Gif)
    } else if data.starts_with(b"BM") {
        Some(ImageFormat::Bmp)
    } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        Some(ImageFormat::Tiff)
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some(ImageFormat::WebP)
    } else {
        None
    }
}

/// What a header declares, without decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderInfo {
    /// Detected container.
    pub format: Option<ImageFormat>,
    /// Declared (width, height).
    pub dimensions: Option<(u32, u32)>,
    /// Structural problems found while parsing.
    pub anomalies: Vec<String>,
}

impl HeaderInfo {
    /// A known container whose header declares non-zero dimensions.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.format.is_some() && matches!(self.dimensions, Some((w, h)) if w > 0 && h > 0)
    }
}

/// Sniff the container and parse its header.
#[must_use]
pub fn inspect(data: &[u8]) -> HeaderInfo {
    let Some(format) = sniff(data) else {
        return HeaderInfo::default();
    };

    let mut anomalies = Vec::new();
    let dimensions = match format {
        ImageFormat::Png => png_header(data, &mut anomalies),
        ImageFormat::Jpeg => jpeg_header(data, &mut anomalies),
        ImageFormat::Gif => gif_header(data, &mut anomalies),
        ImageFormat::Bmp => bmp_header(data, &mut anomalies),
        ImageFormat::Tiff => tiff_header(data, &mut anomalies),
        ImageFormat::WebP => webp_header(data, &mut anomalies),
    };

    if let Some((w, h)) = dimensions {
        if w == 0 || h == 0 {
            anomalies.push(format!("Declared dimensions {w}x{h} contain a zero side"));
        }
    }

    HeaderInfo {
        format: Some(format),
        dimensions,
        anomalies,
    }
}

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn le_u24(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 3)
        .map(|b| u32::from(b[0]) | (u32::from(b[1]) << 8) | (u32::from(b[2]) << 16))
}

fn le_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn png_header(data: &[u8], anomalies: &mut Vec<String>) -> Option<(u32, u32)> {
    if data.len() < 24 {
        anomalies.push(format!(
            "Truncated PNG: {} bytes is too short for the IHDR chunk",
            data.len()
        ));
        return None;
    }
    if &data[12..16] != b"IHDR" {
        anomalies.push("First PNG chunk is not IHDR".to_string());
        return None;
    }
    if be_u32(data, 8) != Some(13) {
        anomalies.push("IHDR chunk length is not 13".to_string());
    }
    if !data.windows(4).rev().take(16).any(|w| w == b"IEND") {
        anomalies.push("PNG data does not end with an IEND chunk".to_string());
    }
    Some((be_u32(data, 16)?, be_u32(data, 20)?))
}

fn jpeg_header(data: &[u8], anomalies: &mut Vec<String>) -> Option<(u32, u32)> {
    if !data.ends_with(&[0xFF, 0xD9]) {
        anomalies.push("JPEG data does not end with an EOI marker".to_string());
    }

    let mut i = 2;
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            anomalies.push(format!("Expected a JPEG marker at offset {i}"));
            return None;
        }
        let marker = data[i + 1];
        match marker {
            // Fill bytes
            0xFF => {
                i += 1;
                continue;
            }
            // Standalone markers
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            }
            0xD9 => {
                anomalies.push("JPEG ends before any frame header".to_string());
                return None;
            }
            0xDA => {
                anomalies.push("JPEG scan starts before any frame header".to_string());
                return None;
            }
            0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                let (Some(height), Some(width)) = (be_u16(data, i + 5), be_u16(data, i + 7)) else {
                    anomalies.push("Truncated JPEG frame header".to_string());
                    return None;
                };
                return Some((u32::from(width), u32::from(height)));
            }
            _ => {}
        }
        let Some(length) = be_u16(data, i + 2) else {
            break;
        };
        if length < 2 {
            anomalies.push(format!("Invalid JPEG segment length {length} at offset {i}"));
            return None;
        }
        i += 2 + usize::from(length);
    }

    anomalies.push("Truncated JPEG: no frame header found".to_string());
    None
}

fn gif_header(data: &[u8], anomalies: &mut Vec<String>) -> Option<(u32, u32)> {
    let dims = le_u16(data, 6).zip(le_u16(data, 8));
    if dims.is_none() {
        anomalies.push("Truncated GIF logical screen descriptor".to_string());
    }
    if data.last() != Some(&0x3B) {
        anomalies.push("GIF data does not end with a trailer byte".to_string());
    }
    dims.map(|(w, h)| (u32::from(w), u32::from(h)))
}

fn bmp_header(data: &[u8], anomalies: &mut Vec<String>) -> Option<(u32, u32)> {
    let Some(declared) = le_u32(data, 2) else {
        anomalies.push("Truncated BMP file header".to_string());
        return None;
    };
    if declared as usize != data.len() {
        anomalies.push(format!(
            "BMP header declares {declared} bytes but the buffer holds {}",
            data.len()
        ));
    }

    match le_u32(data, 14) {
        Some(12) => {
            let dims = le_u16(data, 18).zip(le_u16(data, 20));
            if dims.is_none() {
                anomalies.push("Truncated BMP core header".to_string());
            }
            dims.map(|(w, h)| (u32::from(w), u32::from(h)))
        }
        Some(size) if size >= 40 => {
            let dims = le_u32(data, 18).zip(le_u32(data, 22));
            if dims.is_none() {
                anomalies.push("Truncated BMP info header".to_string());
            }
            // Negative heights mark top-down bitmaps.
            dims.map(|(w, h)| ((w as i32).unsigned_abs(), (h as i32).unsigned_abs()))
        }
        Some(size) => {
            anomalies.push(format!("Unknown BMP DIB header size {size}"));
            None
        }
        None => {
            anomalies.push("Truncated BMP: missing DIB header".to_string());
            None
        }
    }
}

fn tiff_header(data: &[u8], anomalies: &mut Vec<String>) -> Option<(u32, u32)> {
    let big_endian = data.starts_with(b"MM");
    let u16_at = |at: usize| if big_endian { be_u16(data, at) } else { le_u16(data, at) };
    let u32_at = |at: usize| if big_endian { be_u32(data, at) } else { le_u32(data, at) };

    let Some(ifd) = u32_at(4).map(|o| o as usize) else {
        anomalies.push("Truncated TIFF header".to_string());
        return None;
    };
    let Some(count) = u16_at(ifd) else {
        anomalies.push(format!("TIFF IFD offset {ifd} lies outside the buffer"));
        return None;
    };

    let mut width = None;
    let mut height = None;
    for entry in 0..usize::from(count) {
        let at = ifd + 2 + entry * 12;
        let (Some(tag), Some(kind)) = (u16_at(at), u16_at(at + 2)) else {
            anomalies.push("Truncated TIFF IFD".to_string());
            break;
        };
        let value = match kind {
            // SHORT values are left-justified in the 4-byte field.
            3 => u16_at(at + 8).map(u32::from),
            4 => u32_at(at + 8),
            _ => None,
        };
        match tag {
            256 => width = value,
            257 => height = value,
            _ => {}
        }
    }

    match (width, height) {
        (Some(w), Some(h)) => Some((w, h)),
        _ => {
            anomalies.push("TIFF IFD lacks ImageWidth/ImageLength tags".to_string());
            None
        }
    }
}

fn webp_header(data: &[u8], anomalies: &mut Vec<String>) -> Option<(u32, u32)> {
    if let Some(riff_size) = le_u32(data, 4) {
        let expected = riff_size as usize + 8;
        if expected != data.len() {
            anomalies.push(format!(
                "RIFF header declares {expected} bytes but the buffer holds {}",
                data.len()
            ));
        }
    }

    match data.get(12..16) {
        Some(b"VP8 ") => {
            if data.get(23..26) != Some(&[0x9D, 0x01, 0x2A][..]) {
                anomalies.push("Missing VP8 key frame start code".to_string());
                return None;
            }
            let dims = le_u16(data, 26).zip(le_u16(data, 28));
            if dims.is_none() {
                anomalies.push("Truncated VP8 frame header".to_string());
            }
            dims.map(|(w, h)| (u32::from(w & 0x3FFF), u32::from(h & 0x3FFF)))
        }
        Some(b"VP8L") => {
            if data.get(20) != Some(&0x2F) {
                anomalies.push("Missing VP8L signature byte".to_string());
                return None;
            }
            let Some(bits) = le_u32(data, 21) else {
                anomalies.push("Truncated VP8L header".to_string());
                return None;
            };
            Some(((bits & 0x3FFF) + 1, ((bits >> 14) & 0x3FFF) + 1))
        }
        Some(b"VP8X") => {
            let dims = le_u24(data, 24).zip(le_u24(data, 27));
            if dims.is_none() {
                anomalies.push("Truncated VP8X header".to_string());
            }
            dims.map(|(w, h)| (w + 1, h + 1))
        }
        Some(other) => {
            anomalies.push(format!(
                "Unknown WebP chunk {:?}",
                String::from_utf8_lossy(other)
            ));
            None
        }
        None => {
            anomalies.push("Truncated WebP: missing first chunk".to_string());
            None
        }
    }
}
