//! Safe hidden-sheet deletion.
//!
//! Deleting a hidden sheet breaks every formula that references it (#REF!).
//! This pass first scans the workbook *file* for such formulas, freezes each
//! dependent cell to its current calculated value through the live session,
//! and only then deletes the hidden sheets. Neutralization strictly precedes
//! deletion so no formula is ever left dangling.

use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::scan::{self, DependencyMap};
use crate::session::WorkbookSession;

/// Counts of one deletion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Hidden sheets found in the workbook.
    pub hidden_sheets: usize,
    /// Visible cells whose formulas referenced a hidden sheet.
    pub dependent_cells: usize,
    /// Dependent cells successfully frozen to their values.
    pub cells_neutralized: usize,
    /// Hidden sheets actually deleted.
    pub sheets_deleted: usize,
}

/// Freeze every dependent cell to its current calculated value.
///
/// Reads the calculated value through the session and writes it back as a
/// literal, which discards the formula. A cell the host refuses to read or
/// write is left alone; its formula breaks when the sheet goes, which is the
/// pre-existing behavior this pass otherwise prevents.
pub fn neutralize<S: WorkbookSession + ?Sized>(session: &mut S, deps: &DependencyMap) -> usize {
    let mut neutralized = 0;
    for (sheet, cells) in deps {
        let sheet = sheet.as_str();
        for address in cells {
            let value = match session.cell_value(sheet, address) {
                Ok(value) => value,
                Err(e) => {
                    warn!(sheet, cell = %address, %e, "cell value unreadable, formula kept");
                    continue;
                }
            };
            if let Err(e) = session.set_cell_value(sheet, address, value) {
                warn!(sheet, cell = %address, %e, "cell not frozen, formula kept");
                continue;
            }
            info!(sheet, cell = %address, "formula replaced with its value");
            neutralized += 1;
        }
    }
    neutralized
}

/// Delete all hidden sheets of an open workbook, neutralizing dependent
/// formulas on the visible sheets first.
///
/// `file_path` must point at the workbook's saved on-disk form; the
/// dependency scan reads it directly. An unreadable file is fatal: deleting
/// without the scan would break formulas silently.
pub fn delete_hidden_sheets<S: WorkbookSession + ?Sized>(
    session: &mut S,
    file_path: &Path,
) -> Result<DeletionReport> {
    let partition = session.sheet_partition()?;
    let mut report = DeletionReport {
        hidden_sheets: partition.hidden.len(),
        ..DeletionReport::default()
    };

    if !partition.has_hidden() {
        info!("no hidden sheets, nothing to delete");
        return Ok(report);
    }
    info!(hidden = report.hidden_sheets, "hidden sheets queued for deletion");

    let deps = scan::scan_hidden_references(file_path, &partition.visible, &partition.hidden)?;
    report.dependent_cells = deps.values().map(Vec::len).sum();

    if report.dependent_cells > 0 {
        report.cells_neutralized = neutralize(session, &deps);
    }

    for sheet in &partition.hidden {
        let sheet = sheet.as_str();
        match session.delete_sheet(sheet) {
            Ok(()) => {
                info!(sheet, "hidden sheet deleted");
                report.sheets_deleted += 1;
            }
            // Protected or sole-remaining sheets stay; the workbook is
            // still consistent because neutralization already ran.
            Err(e) => warn!(sheet, %e, "hidden sheet not deleted"),
        }
    }

    Ok(report)
}
