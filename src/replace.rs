//! The destructive shape-replacement protocol.
//!
//! Sequence: snapshot -> extract -> encode to temp file -> delete original ->
//! insert replacement -> reapply snapshot -> remove temp file. The original
//! shape is never deleted before a valid replacement image exists on disk;
//! extraction and encode failures abort first and leave the shape fully
//! intact.

use std::fs;

use tracing::{debug, warn};

use crate::clipboard::{self, ClipboardOptions};
use crate::encoder::{self, EncodeOptions};
use crate::error::{Result, SlimError};
use crate::scratch::ScratchDir;
use crate::session::WorkbookSession;
use crate::snapshot::{self, RestoreReport};

/// Why a shape was left untouched.
#[derive(Debug, Clone)]
pub enum SkipReason {
    /// The clipboard never produced a bitmap within the deadline.
    ClipboardTimeout,
    /// The bitmap could not be encoded or written to the scratch directory.
    EncodeFailed(String),
    /// The host refused to delete the original shape; inserting anyway
    /// would create a duplicate.
    DeleteRefused(String),
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ClipboardTimeout => "clipboard timeout",
            SkipReason::EncodeFailed(_) => "encode failed",
            SkipReason::DeleteRefused(_) => "delete refused",
        }
    }
}

/// A completed replacement.
#[derive(Debug, Clone)]
pub struct Replacement {
    /// Final name of the new shape; differs from the original when the
    /// rename collided with an existing shape.
    pub new_name: String,
    /// Per-property restoration outcomes.
    pub report: RestoreReport,
}

/// Outcome of one replacement attempt.
#[derive(Debug, Clone)]
pub enum ReplaceOutcome {
    Replaced(Replacement),
    /// The original shape is untouched and keeps its identity and z-order
    /// slot. Counts toward "skipped", not "errored".
    Skipped(SkipReason),
}

/// Replace one picture shape with a recompressed copy of itself.
///
/// `Err` is returned only for failures that are fatal to this shape after
/// the point of no return (insertion refused on an already-deleted original)
/// or for a snapshot capture the host rejects outright; the caller logs and
/// moves on to the next shape.
pub fn replace_picture<S: WorkbookSession + ?Sized>(
    session: &mut S,
    sheet: &str,
    shape: &str,
    encode_options: &EncodeOptions,
    clipboard_options: &ClipboardOptions,
    scratch: &ScratchDir,
) -> Result<ReplaceOutcome> {
    let snap = snapshot::capture(session, sheet, shape)?;

    let bitmap = match clipboard::extract_bitmap(session, sheet, shape, clipboard_options) {
        Ok(bitmap) => bitmap,
        Err(SlimError::ClipboardTimeout { .. }) => {
            warn!(sheet, shape, "clipboard returned no bitmap, skipping");
            return Ok(ReplaceOutcome::Skipped(SkipReason::ClipboardTimeout));
        }
        Err(e) => return Err(e),
    };

    let encoded = match encoder::encode(&bitmap, encode_options) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(sheet, shape, %e, "bitmap could not be re-encoded, skipping");
            return Ok(ReplaceOutcome::Skipped(SkipReason::EncodeFailed(e.to_string())));
        }
    };

    let temp_path = scratch.unique_path(encoded.format.extension());
    if let Err(e) = fs::write(&temp_path, &encoded.bytes) {
        warn!(sheet, shape, %e, "temp image could not be written, skipping");
        return Ok(ReplaceOutcome::Skipped(SkipReason::EncodeFailed(e.to_string())));
    }
    debug!(sheet, shape, path = %temp_path.display(), "encoded replacement written");

    // Point of no return. A refused delete still leaves the original whole.
    if let Err(e) = session.delete_shape(sheet, shape) {
        warn!(sheet, shape, %e, "original shape could not be deleted, skipping");
        let _ = fs::remove_file(&temp_path);
        return Ok(ReplaceOutcome::Skipped(SkipReason::DeleteRefused(e.to_string())));
    }

    let inserted = session.insert_picture(sheet, &temp_path, snap.position)?;
    debug!(sheet, shape, inserted, "replacement picture inserted");

    // Request the snapshot size explicitly: relying on the file's pixel
    // density would silently resize the picture relative to the original.
    if let Err(e) = session.set_shape_size(sheet, &inserted, snap.size) {
        warn!(sheet, shape = %inserted, %e, "initial size not applied");
    }

    let (new_name, report) = snapshot::restore(session, sheet, &inserted, &snap);

    if let Err(e) = fs::remove_file(&temp_path) {
        // Non-fatal leak; the scratch directory teardown collects it.
        warn!(path = %temp_path.display(), %e, "temp image not removed");
    }

    Ok(ReplaceOutcome::Replaced(Replacement { new_name, report }))
}
