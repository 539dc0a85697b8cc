//! Bitmap re-encoding at a target quality or size budget.
//!
//! Format selection: a source bitmap with meaningful transparency is encoded
//! losslessly as PNG (transparency preserved); everything else is flattened
//! to opaque RGB and encoded as JPEG. Both paths carry the original DPI
//! metadata so pixel density alone never changes the physical print size of
//! the reinserted picture.
//!
//! Two quality models are supported, chosen once per run:
//! - [`QualityModel::Quality`] — direct JPEG quality percentage.
//! - [`QualityModel::SizeBudgetKb`] — iterative quality back-off until the
//!   encoded bytes fit the budget or the quality floor is reached.

use std::io::Cursor;

use image::DynamicImage;

use crate::error::{Result, SlimError};

/// Starting quality for the size-budget back-off.
const BUDGET_START_QUALITY: u8 = 70;
/// Quality decrement per back-off step.
const BUDGET_QUALITY_STEP: u8 = 10;
/// Lowest quality the back-off will accept, even over budget.
const BUDGET_QUALITY_FLOOR: u8 = 10;

/// Caller-selected quality model, fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityModel {
    /// JPEG quality, 1-100. Only affects images without alpha.
    Quality(u8),
    /// Maximum encoded size in kilobytes, reached by lowering quality in
    /// fixed steps from 70 down to a floor of 10.
    SizeBudgetKb(u32),
}

/// Encoder parameters.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub model: QualityModel,
    /// DPI metadata written into the encoded file.
    pub keep_dpi: u16,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            model: QualityModel::Quality(70),
            keep_dpi: 96,
        }
    }
}

/// Container format of an encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedFormat {
    Jpeg,
    Png,
}

impl EncodedFormat {
    pub fn extension(self) -> &'static str {
        match self {
            EncodedFormat::Jpeg => "jpeg",
            EncodedFormat::Png => "png",
        }
    }
}

/// An encoded image ready to be written to a temp file.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: EncodedFormat,
}

/// Check if an image has meaningful alpha.
///
/// Every pixel is inspected (`any` short-circuits on the first translucent
/// one); a fully opaque alpha channel does not force the lossless path.
fn has_alpha(img: &DynamicImage) -> bool {
    match img {
        DynamicImage::ImageRgba8(rgba) => rgba.pixels().any(|p| p.0[3] < 255),
        DynamicImage::ImageLumaA8(la) => la.pixels().any(|p| p.0[1] < 255),
        _ => img.color().has_alpha() && img.to_rgba8().pixels().any(|p| p.0[3] < 255),
    }
}

/// Re-encode a bitmap under the selected quality model.
pub fn encode(img: &DynamicImage, options: &EncodeOptions) -> Result<EncodedImage> {
    if let QualityModel::Quality(q) = options.model {
        if q == 0 || q > 100 {
            return Err(SlimError::InvalidQuality);
        }
    }

    if has_alpha(img) {
        return Ok(EncodedImage {
            bytes: encode_png(img, options.keep_dpi)?,
            format: EncodedFormat::Png,
        });
    }

    let bytes = match options.model {
        QualityModel::Quality(quality) => encode_jpeg(img, quality, options.keep_dpi)?,
        QualityModel::SizeBudgetKb(max_kb) => {
            encode_jpeg_within_budget(img, max_kb, options.keep_dpi)?
        }
    };
    Ok(EncodedImage {
        bytes,
        format: EncodedFormat::Jpeg,
    })
}

/// Encode as JPEG with 4:2:0 chroma subsampling and a JFIF density tag.
fn encode_jpeg(img: &DynamicImage, quality: u8, dpi: u16) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    // JPEG dimensions are 16-bit; a silent truncation would corrupt the file.
    if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
        return Err(SlimError::OversizedBitmap { width, height });
    }

    let mut jpeg_bytes = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, quality);
    encoder.set_density(jpeg_encoder::PixelDensity::dpi(dpi));
    encoder.set_sampling_factor(jpeg_encoder::SamplingFactor::R_4_2_0);
    encoder.encode(
        rgb.as_raw(),
        width as u16,
        height as u16,
        jpeg_encoder::ColorType::Rgb,
    )?;

    Ok(jpeg_bytes)
}

/// Lower quality in fixed steps until the encoded size fits the budget or
/// the quality floor is reached; the floor result is returned even when it
/// is still over budget.
fn encode_jpeg_within_budget(img: &DynamicImage, max_kb: u32, dpi: u16) -> Result<Vec<u8>> {
    let budget = max_kb as usize * 1024;
    let mut quality = BUDGET_START_QUALITY;
    loop {
        let bytes = encode_jpeg(img, quality, dpi)?;
        if bytes.len() <= budget || quality <= BUDGET_QUALITY_FLOOR {
            return Ok(bytes);
        }
        quality -= BUDGET_QUALITY_STEP;
    }
}

/// Encode losslessly as PNG, preserving transparency, with a pHYs chunk for
/// the density tag.
fn encode_png(img: &DynamicImage, dpi: u16) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_bytes), image::ImageFormat::Png)?;
    Ok(with_phys_chunk(png_bytes, dpi))
}

/// Insert a pHYs chunk right after IHDR.
///
/// The PNG encoder in the `image` crate does not emit density metadata, so
/// the chunk is spliced in by hand: 4-byte length, "pHYs" tag, x/y pixels
/// per metre, unit byte, CRC-32 over tag + data.
fn with_phys_chunk(mut png: Vec<u8>, dpi: u16) -> Vec<u8> {
    // 8-byte signature + 25-byte IHDR chunk.
    const IHDR_END: usize = 33;
    if png.len() < IHDR_END || &png[12..16] != *b"IHDR" {
        return png;
    }

    let pixels_per_metre = (f64::from(dpi) / 0.0254).round() as u32;

    let mut chunk = Vec::with_capacity(21);
    chunk.extend_from_slice(&9u32.to_be_bytes());
    chunk.extend_from_slice(b"pHYs");
    chunk.extend_from_slice(&pixels_per_metre.to_be_bytes());
    chunk.extend_from_slice(&pixels_per_metre.to_be_bytes());
    chunk.push(1); // unit: metre

    let mut crc = flate2::Crc::new();
    crc.update(&chunk[4..]);
    chunk.extend_from_slice(&crc.sum().to_be_bytes());

    png.splice(IHDR_END..IHDR_END, chunk);
    png
}
