//! Structured error types for slim-xlsx.
//!
//! Recoverable per-shape conditions (clipboard timeouts, encode failures)
//! are modelled as variants so callers can match on them and skip the item
//! instead of failing the whole pass.

use crate::session::SessionError;

/// All errors that can occur while optimizing a workbook.
#[derive(Debug, thiserror::Error)]
pub enum SlimError {
    /// ZIP archive error while reading a workbook file from disk.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML parsing error from quick-xml.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Image decode/encode error.
    #[error("image: {0}")]
    Image(#[from] image::ImageError),

    /// JPEG encoder error.
    #[error("JPEG encoding: {0}")]
    JpegEncode(#[from] jpeg_encoder::EncodingError),

    /// Quality parameter outside the 1-100 range.
    #[error("quality must be between 1 and 100")]
    InvalidQuality,

    /// Bitmap dimensions exceed what JPEG can encode.
    #[error("bitmap {width}x{height} exceeds the JPEG dimension limit")]
    OversizedBitmap { width: u32, height: u32 },

    /// The clipboard never produced a bitmap within the polling deadline.
    /// Recoverable: the shape is skipped and left untouched.
    #[error("clipboard returned no bitmap for shape '{shape}'")]
    ClipboardTimeout { shape: String },

    /// The live host session refused an operation.
    #[error("host session: {0}")]
    Session(#[from] SessionError),

    /// The workbook archive is structurally malformed.
    #[error("workbook structure: {0}")]
    WorkbookStructure(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SlimError>;
