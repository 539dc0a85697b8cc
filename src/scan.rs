//! Disk-level hidden-sheet dependency scanner.
//!
//! Reads the workbook file directly (zip + XML) in a formula-preserving
//! mode, independent of the live session, so scanning never disturbs the
//! open session's calculation state.
//!
//! The match is a *textual* search for hidden-sheet qualifier tokens in
//! formula text, quoted (`'Hidden Name'!`) and unquoted (`HiddenName!`).
//! It is not a formula parser: a string literal containing the token is a
//! false positive, and a dynamically built reference (INDIRECT) is a false
//! negative. Both are accepted as a known limitation of the heuristic.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{Result, SlimError};
use crate::session::SheetPartition;

/// Visible-sheet name -> cell addresses whose formula references a hidden
/// sheet. Built once per deletion pass and consumed once.
pub type DependencyMap = BTreeMap<String, Vec<String>>;

/// One `<sheet>` entry from `xl/workbook.xml`.
#[derive(Debug, Clone)]
struct SheetEntry {
    name: String,
    /// Worksheet part path inside the archive, e.g. `xl/worksheets/sheet1.xml`.
    part: Option<String>,
    hidden: bool,
}

/// Sheet-qualifier needles for one hidden sheet, quoted and unquoted.
/// Formula syntax requires the quoted form for names containing spaces.
fn needles_for(hidden: &[String]) -> Vec<(String, String)> {
    hidden
        .iter()
        .map(|name| (format!("'{name}'!"), format!("{name}!")))
        .collect()
}

/// One hit is sufficient to mark a cell; further hidden names are not checked.
fn formula_references(formula: &str, needles: &[(String, String)]) -> bool {
    needles
        .iter()
        .any(|(quoted, unquoted)| formula.contains(quoted) || formula.contains(unquoted))
}

/// Scan every visible sheet of the workbook file for formulas referencing
/// any of the hidden sheets.
pub fn scan_hidden_references(
    path: &Path,
    visible: &[String],
    hidden: &[String],
) -> Result<DependencyMap> {
    let mut map = DependencyMap::new();
    if hidden.is_empty() {
        return Ok(map);
    }
    let needles = needles_for(hidden);

    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let sheets = workbook_sheets(&mut archive)?;

    for entry in &sheets {
        if !visible.iter().any(|name| name == &entry.name) {
            continue;
        }
        let Some(part) = &entry.part else {
            warn!(sheet = %entry.name, "no worksheet part resolved, sheet not scanned");
            continue;
        };
        let cells = scan_sheet_formulas(&mut archive, part, &needles)?;
        if !cells.is_empty() {
            debug!(sheet = %entry.name, count = cells.len(), "dependent formulas found");
            map.insert(entry.name.clone(), cells);
        }
    }

    let total: usize = map.values().map(Vec::len).sum();
    if total > 0 {
        info!(cells = total, "formulas depend on hidden sheets");
    } else {
        info!("no formulas depend on hidden sheets");
    }
    Ok(map)
}

/// Read the on-disk visibility partition of a workbook file.
///
/// Both `hidden` and `veryHidden` states count as hidden.
pub fn read_sheet_partition(path: &Path) -> Result<SheetPartition> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let sheets = workbook_sheets(&mut archive)?;

    let mut partition = SheetPartition::default();
    for entry in sheets {
        if entry.hidden {
            partition.hidden.push(entry.name);
        } else {
            partition.visible.push(entry.name);
        }
    }
    Ok(partition)
}

/// Parse `xl/workbook.xml` (plus its rels) into sheet entries.
fn workbook_sheets<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<SheetEntry>> {
    let rels = worksheet_relationships(archive);

    let file = archive
        .by_name("xl/workbook.xml")
        .map_err(|_| SlimError::WorkbookStructure("xl/workbook.xml missing".to_string()))?;
    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);

    let mut sheets = Vec::new();
    let mut buf = Vec::new();
    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e))
                if e.local_name().as_ref() == b"sheet" =>
            {
                let mut name = String::new();
                let mut rel_id = String::new();
                let mut hidden = false;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.local_name().as_ref() {
                        b"name" => name = value,
                        b"id" => rel_id = value,
                        b"state" => hidden = value == "hidden" || value == "veryHidden",
                        _ => {}
                    }
                }
                if !name.is_empty() {
                    sheets.push(SheetEntry {
                        name,
                        part: rels.get(&rel_id).cloned(),
                        hidden,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    if sheets.is_empty() {
        return Err(SlimError::WorkbookStructure(
            "workbook declares no sheets".to_string(),
        ));
    }
    Ok(sheets)
}

/// Parse `xl/_rels/workbook.xml.rels` into rId -> worksheet part path.
fn worksheet_relationships<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> BTreeMap<String, String> {
    let mut rels = BTreeMap::new();

    let Ok(file) = archive.by_name("xl/_rels/workbook.xml.rels") else {
        return rels;
    };
    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);

    let mut buf = Vec::new();
    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = String::new();
                let mut target = String::new();
                let mut rel_type = String::new();
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.as_ref() {
                        b"Id" => id = value,
                        b"Target" => target = value,
                        b"Type" => rel_type = value,
                        _ => {}
                    }
                }
                if rel_type.contains("worksheet") && !id.is_empty() && !target.is_empty() {
                    rels.insert(id, resolve_relationship_path(&target));
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    rels
}

/// Resolve a relationship target to a full archive path.
fn resolve_relationship_path(target: &str) -> String {
    if let Some(stripped) = target.strip_prefix('/') {
        stripped.to_string()
    } else {
        format!("xl/{target}")
    }
}

/// Stream one worksheet part and collect addresses of cells whose formula
/// matches any needle.
fn scan_sheet_formulas<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    part: &str,
    needles: &[(String, String)],
) -> Result<Vec<String>> {
    let file = match archive.by_name(part) {
        Ok(file) => file,
        Err(_) => {
            warn!(part, "worksheet part missing from archive");
            return Ok(Vec::new());
        }
    };
    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);

    let mut cells = Vec::new();
    let mut buf = Vec::new();
    let mut current_cell: Option<String> = None;
    let mut in_formula = false;
    let mut formula = String::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"c" => {
                    current_cell = e.attributes().flatten().find_map(|attr| {
                        (attr.key.as_ref() == b"r")
                            .then(|| String::from_utf8_lossy(&attr.value).into_owned())
                    });
                }
                b"f" => {
                    in_formula = true;
                    formula.clear();
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_formula => {
                if let Ok(text) = e.unescape() {
                    formula.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"f" => {
                    in_formula = false;
                    if let Some(address) = &current_cell {
                        if formula_references(&formula, needles) {
                            cells.push(address.clone());
                        }
                    }
                }
                b"c" => current_cell = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(cells)
}
