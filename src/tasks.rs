//! The batch task vocabulary.
//!
//! A caller builds a `Vec<Task>` and runs it against one open workbook
//! session. Tasks run in the order given; each task owns its own scratch
//! resources and reports through the log rather than by failing the batch.

use std::path::Path;

use tracing::{info, warn};

use crate::compress::{self, CompressOptions};
use crate::error::Result;
use crate::hidden;
use crate::scratch::ScratchDir;
use crate::session::{Point, Size, WorkbookSession};

/// Default geometry for the label textbox, in points.
const LABEL_POSITION: Point = Point { left: 10.0, top: 10.0 };
const LABEL_SIZE: Size = Size { width: 220.0, height: 24.0 };

/// One unit of batch work against an open workbook.
#[derive(Debug, Clone)]
pub enum Task {
    /// Recompress every picture on the visible sheets.
    CompressImages(CompressOptions),
    /// Delete all hidden sheets after neutralizing dependent formulas.
    DeleteHiddenSheets,
    /// Break all external workbook links.
    DeleteExternalLinks,
    /// Remove all workbook-level defined names.
    DeleteDefinedNames,
    /// Trim formatting beyond the used range, per visible sheet.
    ClearExcessFormatting,
    /// Reset print setup to the standard layout, per visible sheet.
    NormalizePrintSettings,
    /// Refresh pivot caches and drop their cached source records.
    CleanPivotCaches,
    /// Stamp a textbox label on the first visible sheet.
    SetLabel(String),
}

impl Task {
    /// Stable task name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Task::CompressImages(_) => "compress-images",
            Task::DeleteHiddenSheets => "delete-hidden-sheets",
            Task::DeleteExternalLinks => "delete-external-links",
            Task::DeleteDefinedNames => "delete-defined-names",
            Task::ClearExcessFormatting => "clear-excess-formatting",
            Task::NormalizePrintSettings => "normalize-print-settings",
            Task::CleanPivotCaches => "clean-pivot-caches",
            Task::SetLabel(_) => "set-label",
        }
    }

    /// Run this task against an open workbook.
    ///
    /// `file_path` is the workbook's saved on-disk form, used by tasks that
    /// read the file directly instead of going through the session.
    pub fn run<S: WorkbookSession + ?Sized>(
        &self,
        session: &mut S,
        file_path: &Path,
    ) -> Result<()> {
        info!(task = self.name(), "task started");
        match self {
            Task::CompressImages(options) => {
                let scratch = ScratchDir::create()?;
                let report = compress::run_image_compression(session, &scratch, options)?;
                info!(
                    task = self.name(),
                    replaced = report.pictures_replaced,
                    found = report.pictures_found,
                    "task finished"
                );
                if let Err(e) = scratch.cleanup() {
                    warn!(task = self.name(), %e, "scratch directory not removed");
                }
            }
            Task::DeleteHiddenSheets => {
                let report = hidden::delete_hidden_sheets(session, file_path)?;
                info!(
                    task = self.name(),
                    deleted = report.sheets_deleted,
                    neutralized = report.cells_neutralized,
                    "task finished"
                );
            }
            Task::DeleteExternalLinks => match session.delete_external_links() {
                Ok(count) => info!(task = self.name(), removed = count, "task finished"),
                Err(e) => warn!(task = self.name(), %e, "task not supported by host"),
            },
            Task::DeleteDefinedNames => match session.delete_defined_names() {
                Ok(count) => info!(task = self.name(), removed = count, "task finished"),
                Err(e) => warn!(task = self.name(), %e, "task not supported by host"),
            },
            Task::ClearExcessFormatting => {
                let partition = session.sheet_partition()?;
                for sheet in &partition.visible {
                    let sheet = sheet.as_str();
                    if let Err(e) = session.clear_excess_formatting(sheet) {
                        warn!(task = self.name(), sheet, %e, "sheet formatting not cleared");
                    }
                }
                info!(task = self.name(), sheets = partition.visible.len(), "task finished");
            }
            Task::NormalizePrintSettings => {
                let partition = session.sheet_partition()?;
                for sheet in &partition.visible {
                    let sheet = sheet.as_str();
                    if let Err(e) = session.normalize_print_settings(sheet) {
                        warn!(task = self.name(), sheet, %e, "print settings not normalized");
                    }
                }
                info!(task = self.name(), sheets = partition.visible.len(), "task finished");
            }
            Task::CleanPivotCaches => match session.clean_pivot_caches() {
                Ok(count) => info!(task = self.name(), caches = count, "task finished"),
                Err(e) => warn!(task = self.name(), %e, "task not supported by host"),
            },
            Task::SetLabel(text) => {
                let partition = session.sheet_partition()?;
                let Some(sheet) = partition.visible.first().map(String::as_str) else {
                    warn!(task = self.name(), "no visible sheet to label");
                    return Ok(());
                };
                match session.add_textbox(sheet, text, LABEL_POSITION, LABEL_SIZE) {
                    Ok(name) => {
                        info!(task = self.name(), sheet, textbox = %name, "task finished")
                    }
                    Err(e) => warn!(task = self.name(), %e, "label not added"),
                }
            }
        }
        Ok(())
    }
}

/// Run a sequence of tasks against one workbook.
///
/// A failing task aborts the remainder of the sequence: later tasks may
/// depend on earlier ones having completed (labeling after compression, for
/// example), and a workbook in an unknown state should not be worked on
/// further.
pub fn run_all<S: WorkbookSession + ?Sized>(
    session: &mut S,
    file_path: &Path,
    tasks: &[Task],
) -> Result<()> {
    for task in tasks {
        task.run(session, file_path)?;
    }
    Ok(())
}
