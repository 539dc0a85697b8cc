//! Z-order capture and exact restoration.
//!
//! The order is captured for the *full* shape set of a sheet before any
//! shape on it is touched: non-picture shapes are interleaved with pictures
//! and must keep their relative order too. Restoration replays the saved
//! back-to-front sequence with bring-to-front calls, front-most last, so a
//! missing name never shifts the relative order of the remaining shapes.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::session::WorkbookSession;

/// Capture the back-to-front shape name sequence of a sheet.
///
/// Returns `None` when any stacking position is unreadable: replaying a
/// guessed order would actively rewrite the sheet's stacking instead of
/// preserving it, so the caller skips the replay for that sheet entirely.
pub fn capture_order<S: WorkbookSession + ?Sized>(
    session: &S,
    sheet: &str,
) -> Result<Option<Vec<String>>> {
    let names = session.shape_names(sheet)?;

    let mut with_z: Vec<(u32, String)> = Vec::with_capacity(names.len());
    for name in &names {
        match session.shape_z_order(sheet, name) {
            Ok(z) => with_z.push((z, name.clone())),
            Err(e) => {
                warn!(sheet, shape = %name, %e, "stacking unreadable, z-order will not be replayed");
                return Ok(None);
            }
        }
    }

    with_z.sort_by_key(|(z, _)| *z);
    Ok(Some(with_z.into_iter().map(|(_, name)| name).collect()))
}

/// Replay a saved back-to-front order, remapping names through the renames
/// produced by the replacement pass.
///
/// Names that no longer resolve (deleted and never successfully replaced)
/// are skipped silently.
pub fn restore<S: WorkbookSession + ?Sized>(
    session: &mut S,
    sheet: &str,
    saved_order: &[String],
    renames: &HashMap<String, String>,
) {
    for name in saved_order {
        let current = renames.get(name).unwrap_or(name);
        if let Err(e) = session.bring_to_front(sheet, current) {
            debug!(sheet, shape = %current, %e, "shape gone, skipped in z-order replay");
        }
    }
}
