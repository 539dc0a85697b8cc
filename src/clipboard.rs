//! Clipboard-mediated bitmap extraction with bounded polling.
//!
//! The host renders a shape to the system clipboard asynchronously, so the
//! extractor polls until a bitmap appears or the deadline passes. The host
//! event queue is serviced on every tick, not just once: skipping it stalls
//! the automation layer itself and the copy never completes.

use std::time::{Duration, Instant};

use image::DynamicImage;
use tracing::debug;

use crate::error::{Result, SlimError};
use crate::session::WorkbookSession;

/// Polling parameters for clipboard extraction.
///
/// The 3-second default is conservative; clipboard flakiness is the dominant
/// failure mode of the whole pipeline and a timeout here is expected and
/// tolerated, not an error worth failing a file over.
#[derive(Debug, Clone)]
pub struct ClipboardOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ClipboardOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Copy a shape's rendered bitmap through the host clipboard.
///
/// Returns [`SlimError::ClipboardTimeout`] when the deadline passes without
/// a bitmap; callers skip the shape and continue.
pub fn extract_bitmap<S: WorkbookSession + ?Sized>(
    session: &mut S,
    sheet: &str,
    shape: &str,
    options: &ClipboardOptions,
) -> Result<DynamicImage> {
    session.copy_shape_as_bitmap(sheet, shape)?;
    debug!(sheet, shape, "copy issued, polling clipboard");

    let deadline = Instant::now() + options.timeout;
    loop {
        session.pump_events();
        match session.clipboard_bitmap() {
            Ok(Some(bitmap)) => {
                debug!(sheet, shape, "bitmap retrieved from clipboard");
                return Ok(bitmap);
            }
            Ok(None) => {}
            Err(e) => debug!(sheet, shape, %e, "clipboard busy, retrying"),
        }
        if Instant::now() >= deadline {
            return Err(SlimError::ClipboardTimeout {
                shape: shape.to_string(),
            });
        }
        std::thread::sleep(options.poll_interval);
    }
}
