//! SSIMULACRA2 metric calculation.
//!
//! SSIMULACRA2 is a perceptual image quality metric that correlates well with
//! human visual perception. Higher scores indicate better quality; see
//! [`QualityBand`](super::QualityBand) for the interpretation.
//!
//! Transparent images are flattened onto a flat gray background before
//! comparison. Compositing happens on the sRGB-encoded samples, so the
//! background intensity is a display level rather than a linear light level.

use imgref::ImgRef;
use rgb::RGBA;
use ssimulacra2::{ColorPrimaries, Rgb as Ssim2Rgb, TransferCharacteristic, compute_frame_ssimulacra2};

use crate::error::{Error, Result};

/// Calculate SSIMULACRA2 between two RGBA images.
///
/// # Arguments
///
/// * `reference` - Original image, sRGB-encoded samples in 0.0-1.0.
/// * `test` - Distorted image, same layout.
/// * `background` - Gray level used to composite pixels with alpha below 1.
///
/// # Returns
///
/// SSIMULACRA2 score where higher is better (100 = identical).
///
/// # Errors
///
/// Returns an error if the images have different sizes or if calculation fails.
pub fn calculate_ssimulacra2(
    reference: ImgRef<'_, RGBA<f32>>,
    test: ImgRef<'_, RGBA<f32>>,
    background: f32,
) -> Result<f64> {
    let (width, height) = (reference.width(), reference.height());
    if (test.width(), test.height()) != (width, height) {
        return Err(Error::SizeMismatch {
            expected: (width, height),
            actual: (test.width(), test.height()),
        });
    }

    let ref_img = to_frame(reference, background, "reference")?;
    let test_img = to_frame(test, background, "test")?;

    compute_frame_ssimulacra2(ref_img, test_img).map_err(|e| Error::Metric {
        reason: format!("Failed to compute SSIMULACRA2: {e}"),
    })
}

/// Flatten alpha onto `background` and wrap the result as an sRGB frame.
fn to_frame(img: ImgRef<'_, RGBA<f32>>, background: f32, which: &str) -> Result<Ssim2Rgb> {
    let rgb = composite(img, background)?;
    Ssim2Rgb::new(
        rgb,
        img.width(),
        img.height(),
        TransferCharacteristic::SRGB,
        ColorPrimaries::BT709,
    )
    .map_err(|e| Error::Metric {
        reason: format!("Failed to create {which} image: {e}"),
    })
}

/// `c * a + background * (1 - a)` per channel; opaque pixels pass through.
pub fn composite(img: ImgRef<'_, RGBA<f32>>, background: f32) -> Result<Vec<[f32; 3]>> {
    let len = img.width() * img.height();
    let mut out = Vec::new();
    out.try_reserve_exact(len).map_err(|e| Error::OutOfMemory {
        reason: format!("compositing {len} pixels: {e}"),
    })?;

    out.extend(img.pixels().map(|p| {
        if p.a >= 1.0 {
            [p.r, p.g, p.b]
        } else {
            let a = p.a.max(0.0);
            let bg = background * (1.0 - a);
            [p.r * a + bg, p.g * a + bg, p.b * a + bg]
        }
    }));
    Ok(out)
}
