//! Reading and decoding encoded images.
//!
//! Every failure is classified into exactly one [`Error`] variant:
//!
//! | Condition | Error |
//! |-----------|-------|
//! | Zero-length buffer | [`Error::EmptyData`] |
//! | Magic bytes not recognized | [`Error::UnsupportedFormat`] |
//! | Declared size above the memory ceiling | [`Error::OutOfMemory`] |
//! | Decoded size above the memory ceiling | [`Error::OutOfMemory`] |
//! | Decoder limit or allocation failure | [`Error::OutOfMemory`] |
//! | Decoder error, header well formed | [`Error::CorruptData`] |
//! | Decoder error, header malformed | [`Error::DecodeFailed`] |
//! | Decoded side below [`MIN_DIMENSION`] | [`Error::TooSmall`] |

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageError, ImageReader, Limits};
use imgref::ImgVec;
use rgb::RGBA;
use tracing::debug;

use crate::analysis::analyze_image_data;
use crate::config::ScoreConfig;
use crate::error::{Error, Result};
use crate::format::{self, HeaderInfo, ImageFormat};

/// Minimum width and height for the multi-scale comparison.
pub const MIN_DIMENSION: usize = 8;

/// Size of one decoded RGBA f32 pixel.
const BYTES_PER_PIXEL: u64 = 16;

/// Working-set ceiling applied when [`ScoreConfig::max_decode_bytes`] is unset.
///
/// Same value as the decoder's own default allocation limit.
pub const DEFAULT_DECODE_CEILING: u64 = 512 * 1024 * 1024;

/// A decoded image, ready for compositing.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// sRGB-encoded RGBA samples normalized to 0.0-1.0.
    pub pixels: ImgVec<RGBA<f32>>,
    /// Whether the source carried an alpha channel.
    pub has_alpha: bool,
    /// Container the image was decoded from.
    pub format: ImageFormat,
}

impl DecodedImage {
    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.pixels.width()
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.pixels.height()
    }

    /// (width, height) in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width(), self.height())
    }
}

/// Read a whole file into memory.
///
/// Any I/O failure (missing file, permission denied, directory) is reported
/// as [`Error::FileNotFound`].
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::FileNotFound {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode an encoded image held in memory.
pub fn decode_bytes(data: &[u8], config: &ScoreConfig) -> Result<DecodedImage> {
    if data.is_empty() {
        return Err(Error::EmptyData);
    }

    let header = format::inspect(data);
    let Some(format) = header.format else {
        return Err(Error::UnsupportedFormat {
            analysis: Box::new(analyze_image_data(data)),
        });
    };
    debug!(%format, bytes = data.len(), dimensions = ?header.dimensions, "sniffed container");

    let ceiling = config.max_decode_bytes.unwrap_or(DEFAULT_DECODE_CEILING);
    if let Some((w, h)) = header.dimensions {
        check_working_set(u64::from(w), u64::from(h), format, ceiling)?;
    }

    let mut reader = ImageReader::with_format(Cursor::new(data), format.into());
    let mut limits = Limits::default();
    limits.max_alloc = Some(ceiling);
    reader.limits(limits);

    let image = reader
        .decode()
        .map_err(|err| classify(err, format, &header, data))?;

    let (width, height) = image.dimensions();
    let (width, height) = (width as usize, height as usize);
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(Error::TooSmall {
            width,
            height,
            min: MIN_DIMENSION,
        });
    }

    // Headers can lie or be unreadable; the decoded size is authoritative.
    check_working_set(width as u64, height as u64, format, ceiling)?;

    let has_alpha = image.color().has_alpha();
    let pixels = ImgVec::new(to_rgba_f32(&image)?, width, height);
    debug!(%format, width, height, has_alpha, "decoded image");

    Ok(DecodedImage {
        pixels,
        has_alpha,
        format,
    })
}

/// Read and decode an image file.
pub fn decode_file(path: &Path, config: &ScoreConfig) -> Result<DecodedImage> {
    let data = read_file(path)?;
    decode_bytes(&data, config)
}

/// Reject images whose f32 working copy would exceed `ceiling` bytes.
fn check_working_set(width: u64, height: u64, format: ImageFormat, ceiling: u64) -> Result<()> {
    let needed = width.saturating_mul(height).saturating_mul(BYTES_PER_PIXEL);
    if needed > ceiling {
        return Err(Error::OutOfMemory {
            reason: format!("{width}x{height} {format} image needs {needed} bytes, limit is {ceiling}"),
        });
    }
    Ok(())
}

/// Convert to normalized RGBA f32 in a single fallible allocation.
fn to_rgba_f32(image: &DynamicImage) -> Result<Vec<RGBA<f32>>> {
    let len = image.width() as usize * image.height() as usize;
    let mut out = Vec::new();
    out.try_reserve_exact(len).map_err(|e| Error::OutOfMemory {
        reason: format!("converting {len} pixels: {e}"),
    })?;

    let u8n = |v: u8| f32::from(v) / 255.0;
    let u16n = |v: u16| f32::from(v) / 65535.0;
    match image {
        DynamicImage::ImageLuma8(img) => out.extend(img.pixels().map(|p| {
            let v = u8n(p[0]);
            RGBA::new(v, v, v, 1.0)
        })),
        DynamicImage::ImageLumaA8(img) => out.extend(img.pixels().map(|p| {
            let v = u8n(p[0]);
            RGBA::new(v, v, v, u8n(p[1]))
        })),
        DynamicImage::ImageRgb8(img) => out.extend(
            img.pixels()
                .map(|p| RGBA::new(u8n(p[0]), u8n(p[1]), u8n(p[2]), 1.0)),
        ),
        DynamicImage::ImageRgba8(img) => out.extend(
            img.pixels()
                .map(|p| RGBA::new(u8n(p[0]), u8n(p[1]), u8n(p[2]), u8n(p[3]))),
        ),
        DynamicImage::ImageLuma16(img) => out.extend(img.pixels().map(|p| {
            let v = u16n(p[0]);
            RGBA::new(v, v, v, 1.0)
        })),
        DynamicImage::ImageLumaA16(img) => out.extend(img.pixels().map(|p| {
            let v = u16n(p[0]);
            RGBA::new(v, v, v, u16n(p[1]))
        })),
        DynamicImage::ImageRgb16(img) => out.extend(
            img.pixels()
                .map(|p| RGBA::new(u16n(p[0]), u16n(p[1]), u16n(p[2]), 1.0)),
        ),
        DynamicImage::ImageRgba16(img) => out.extend(
            img.pixels()
                .map(|p| RGBA::new(u16n(p[0]), u16n(p[1]), u16n(p[2]), u16n(p[3]))),
        ),
        DynamicImage::ImageRgb32F(img) => {
            out.extend(img.pixels().map(|p| RGBA::new(p[0], p[1], p[2], 1.0)));
        }
        DynamicImage::ImageRgba32F(img) => {
            out.extend(img.pixels().map(|p| RGBA::new(p[0], p[1], p[2], p[3])));
        }
        other => out.extend(
            other
                .pixels()
                .map(|(_, _, p)| RGBA::new(u8n(p[0]), u8n(p[1]), u8n(p[2]), u8n(p[3]))),
        ),
    }
    Ok(out)
}

fn classify(err: ImageError, format: ImageFormat, header: &HeaderInfo, data: &[u8]) -> Error {
    let reason = err.to_string();
    match err {
        ImageError::Limits(_) => Error::OutOfMemory { reason },
        ImageError::IoError(ref io) if io.kind() == std::io::ErrorKind::OutOfMemory => {
            Error::OutOfMemory { reason }
        }
        ImageError::Unsupported(_) => Error::DecodeFailed {
            format,
            reason,
            analysis: Box::new(analyze_image_data(data)),
        },
        _ if header.is_well_formed() => Error::CorruptData {
            format,
            reason,
            analysis: Box::new(analyze_image_data(data)),
        },
        _ => Error::DecodeFailed {
            format,
            reason,
            analysis: Box::new(analyze_image_data(data)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultCode;
    use image::{DynamicImage, RgbImage, RgbaImage};

    fn encode(image: DynamicImage, format: image::ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 8) as u8, (y * 8) as u8, 128])
        }))
    }

    #[test]
    fn test_decode_png() {
        let png = encode(gradient(16, 12), image::ImageFormat::Png);
        let decoded = decode_bytes(&png, &ScoreConfig::default()).unwrap();
        assert_eq!(decoded.dimensions(), (16, 12));
        assert_eq!(decoded.format, ImageFormat::Png);
        assert!(!decoded.has_alpha);

        let px = decoded.pixels.buf()[1];
        assert!((px.r - 8.0 / 255.0).abs() < 1e-6);
        assert_eq!(px.a, 1.0);
    }

    #[test]
    fn test_decode_rgba_png_keeps_alpha() {
        let img = RgbaImage::from_pixel(8, 8, image::Rgba([255, 0, 0, 128]));
        let png = encode(DynamicImage::ImageRgba8(img), image::ImageFormat::Png);
        let decoded = decode_bytes(&png, &ScoreConfig::default()).unwrap();
        assert!(decoded.has_alpha);
    }

    #[test]
    fn test_empty_is_empty_data() {
        let err = decode_bytes(&[], &ScoreConfig::default()).unwrap_err();
        assert_eq!(err.code(), ResultCode::EmptyData);
    }

    #[test]
    fn test_unknown_magic() {
        let err = decode_bytes(b"definitely not an image", &ScoreConfig::default()).unwrap_err();
        assert_eq!(err.code(), ResultCode::UnsupportedFormat);
        assert!(err.details().contains("Unknown/Unsupported"));
    }

    #[test]
    fn test_truncated_payload_is_corrupt() {
        let png = encode(gradient(32, 32), image::ImageFormat::Png);
        // Signature + complete IHDR chunk, no image data
        let err = decode_bytes(&png[..33], &ScoreConfig::default()).unwrap_err();
        assert_eq!(err.code(), ResultCode::CorruptData, "{err}");
    }

    #[test]
    fn test_bad_header_is_decode_failed() {
        let mut png = encode(gradient(32, 32), image::ImageFormat::Png);
        png[12..16].copy_from_slice(b"IHDX");
        let err = decode_bytes(&png, &ScoreConfig::default()).unwrap_err();
        assert_eq!(err.code(), ResultCode::DecodeFailed, "{err}");
    }

    #[test]
    fn test_too_small() {
        let png = encode(gradient(7, 16), image::ImageFormat::Png);
        let err = decode_bytes(&png, &ScoreConfig::default()).unwrap_err();
        assert!(matches!(err, Error::TooSmall { width: 7, height: 16, .. }));
    }

    #[test]
    fn test_memory_ceiling() {
        let png = encode(gradient(64, 64), image::ImageFormat::Png);
        let config = ScoreConfig::builder().max_decode_bytes(1024).build();
        let err = decode_bytes(&png, &config).unwrap_err();
        assert_eq!(err.code(), ResultCode::OutOfMemory);
    }

    #[test]
    fn test_default_ceiling_applies_without_config() {
        // 12000x12000 needs 2.3 GB as f32 RGBA
        let mut png = encode(gradient(16, 16), image::ImageFormat::Png);
        png[16..20].copy_from_slice(&12000u32.to_be_bytes());
        png[20..24].copy_from_slice(&12000u32.to_be_bytes());

        let err = decode_bytes(&png, &ScoreConfig::default()).unwrap_err();
        assert_eq!(err.code(), ResultCode::OutOfMemory, "{err}");
        assert!(err.to_string().contains("12000x12000"), "{err}");
    }

    #[test]
    fn test_working_set_check() {
        let limit = DEFAULT_DECODE_CEILING;
        assert!(check_working_set(4096, 4096, ImageFormat::Png, limit).is_ok());
        assert!(check_working_set(8192, 8192, ImageFormat::Png, limit).is_err());
        assert!(check_working_set(u64::MAX, u64::MAX, ImageFormat::Png, limit).is_err());
    }

    #[test]
    fn test_sixteen_bit_and_gray_alpha() {
        let img = image::ImageBuffer::<image::Luma<u16>, _>::from_pixel(8, 8, image::Luma([65535u16]));
        let png = encode(DynamicImage::ImageLuma16(img), image::ImageFormat::Png);
        let decoded = decode_bytes(&png, &ScoreConfig::default()).unwrap();
        assert_eq!(decoded.pixels.buf()[0], RGBA::new(1.0, 1.0, 1.0, 1.0));

        let img = image::GrayAlphaImage::from_pixel(8, 8, image::LumaA([51, 0]));
        let png = encode(DynamicImage::ImageLumaA8(img), image::ImageFormat::Png);
        let decoded = decode_bytes(&png, &ScoreConfig::default()).unwrap();
        assert!(decoded.has_alpha);
        let px = decoded.pixels.buf()[0];
        assert!((px.r - 0.2).abs() < 1e-6);
        assert_eq!(px.a, 0.0);
    }

    #[test]
    fn test_decode_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gradient.png");
        std::fs::write(&path, encode(gradient(12, 10), image::ImageFormat::Png)).unwrap();

        let decoded = decode_file(&path, &ScoreConfig::default()).unwrap();
        assert_eq!(decoded.dimensions(), (12, 10));

        let err = decode_file(&dir.path().join("absent.png"), &ScoreConfig::default()).unwrap_err();
        assert_eq!(err.code(), ResultCode::FileNotFound);
    }

    #[test]
    fn test_missing_file() {
        let err = read_file(Path::new("/definitely/not/here.png")).unwrap_err();
        assert_eq!(err.code(), ResultCode::FileNotFound);
    }
}
