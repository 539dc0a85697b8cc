//! The workbook-level image compression pass.
//!
//! Iterates visible sheets, captures each sheet's full z-order before any
//! mutation, runs the replacement protocol on every picture-type shape, then
//! replays the z-order. Host redraw, alerting, and automatic recalculation
//! are suspended for the duration and restored by a drop guard even when the
//! pass fails partway through.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clipboard::ClipboardOptions;
use crate::encoder::EncodeOptions;
use crate::error::Result;
use crate::replace::{self, ReplaceOutcome};
use crate::scratch::ScratchDir;
use crate::session::{InteractionState, WorkbookSession};
use crate::zorder;

/// Parameters of a compression pass.
#[derive(Debug, Clone, Default)]
pub struct CompressOptions {
    pub encode: EncodeOptions,
    pub clipboard: ClipboardOptions,
    /// Cooperative cancellation, polled once per shape so the worst-case
    /// abort latency is one shape replacement.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl CompressOptions {
    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Aggregate counts of one pass. The difference between found and replaced
/// is the skipped/failed count, which is not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressReport {
    pub pictures_found: usize,
    pub pictures_replaced: usize,
}

/// Suspends host redraw/alerts/recalc and restores the prior state on drop.
struct QuietGuard<'a, S: WorkbookSession + ?Sized> {
    session: &'a mut S,
    prior: Option<InteractionState>,
}

impl<'a, S: WorkbookSession + ?Sized> QuietGuard<'a, S> {
    fn new(session: &'a mut S) -> Self {
        let prior = match session.interaction_state() {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(%e, "interaction state unreadable, nothing to restore later");
                None
            }
        };
        if let Err(e) = session.set_interaction_state(&InteractionState::suspended()) {
            warn!(%e, "host interaction could not be suspended");
        }
        Self { session, prior }
    }

    fn session(&mut self) -> &mut S {
        self.session
    }
}

impl<S: WorkbookSession + ?Sized> Drop for QuietGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(prior) = self.prior.take() {
            if let Err(e) = self.session.set_interaction_state(&prior) {
                warn!(%e, "host interaction state not restored");
            }
        }
    }
}

/// Compress every embedded and linked picture on the visible sheets of an
/// open workbook.
///
/// Groups and all other shape kinds are left untouched; non-visible sheets
/// are skipped entirely. A skipped or failed picture never fails the pass.
pub fn run_image_compression<S: WorkbookSession + ?Sized>(
    session: &mut S,
    scratch: &ScratchDir,
    options: &CompressOptions,
) -> Result<CompressReport> {
    let partition = session.sheet_partition()?;

    let mut guard = QuietGuard::new(session);
    let mut report = CompressReport::default();
    let mut cancelled = false;

    for sheet in &partition.visible {
        let sheet = sheet.as_str();
        let saved_order = zorder::capture_order(guard.session(), sheet)?;
        let names = guard.session().shape_names(sheet)?;
        let mut renames: HashMap<String, String> = HashMap::new();

        for name in &names {
            if options.cancelled() {
                info!(sheet, "compression pass cancelled between shapes");
                cancelled = true;
                break;
            }

            let kind = match guard.session().shape_kind(sheet, name) {
                Ok(kind) => kind,
                // Shape vanished between enumeration and inspection.
                Err(e) => {
                    debug!(sheet, shape = %name, %e, "shape kind unreadable, skipped");
                    continue;
                }
            };
            if !kind.is_picture() {
                debug!(sheet, shape = %name, ?kind, "not a picture, skipped");
                continue;
            }

            report.pictures_found += 1;
            info!(sheet, shape = %name, "compressing picture");
            match replace::replace_picture(
                guard.session(),
                sheet,
                name,
                &options.encode,
                &options.clipboard,
                scratch,
            ) {
                Ok(ReplaceOutcome::Replaced(replacement)) => {
                    report.pictures_replaced += 1;
                    renames.insert(name.clone(), replacement.new_name);
                }
                Ok(ReplaceOutcome::Skipped(reason)) => {
                    warn!(sheet, shape = %name, reason = reason.as_str(), "picture skipped");
                }
                Err(e) => {
                    warn!(sheet, shape = %name, %e, "picture replacement failed");
                }
            }
        }

        // Restoration always runs for a sheet that was touched, even on
        // cancellation, so stacking is never left half-replayed. A sheet
        // whose stacking could not be captured is not replayed at all.
        if let Some(order) = &saved_order {
            zorder::restore(guard.session(), sheet, order, &renames);
        }

        if cancelled {
            break;
        }
    }

    drop(guard);
    info!(
        replaced = report.pictures_replaced,
        found = report.pictures_found,
        "picture compression finished"
    );
    Ok(report)
}
