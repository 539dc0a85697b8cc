//! Shared test doubles and fixtures.
//!
//! `FakeWorkbook` is a scripted in-memory [`WorkbookSession`] standing in for
//! a live spreadsheet host, and `build_xlsx` produces real xlsx bytes for the
//! disk-level scanner.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::path::Path;

use image::{DynamicImage, RgbImage};
use zip::write::FileOptions;
use zip::ZipWriter;

use slim_xlsx::session::{
    Calculation, CellValue, Hyperlink, InteractionState, Placement, Point, SessionError,
    SessionResult, ShapeKind, SheetPartition, Size, WorkbookSession,
};

// ============================================================================
// Fake host session
// ============================================================================

#[derive(Debug, Clone)]
pub struct FakeShape {
    pub name: String,
    pub kind: ShapeKind,
    pub position: Point,
    pub size: Size,
    pub rotation: f64,
    pub aspect_locked: bool,
    pub placement: Placement,
    pub visible: bool,
    pub alt_text: String,
    pub hyperlink: Option<Hyperlink>,
    /// Bitmap the clipboard yields for this shape; `None` means the copy
    /// never completes and the extractor times out.
    pub bitmap: Option<DynamicImage>,
    /// Byte size of the shape's original embedded image.
    pub source_bytes: u64,
}

impl FakeShape {
    pub fn picture(name: &str, bitmap: DynamicImage) -> Self {
        Self {
            name: name.to_string(),
            kind: ShapeKind::Picture,
            position: Point { left: 30.0, top: 40.0 },
            size: Size { width: 120.0, height: 90.0 },
            rotation: 0.0,
            aspect_locked: true,
            placement: Placement::MoveOnly,
            visible: true,
            alt_text: String::new(),
            hyperlink: None,
            bitmap: Some(bitmap),
            source_bytes: 500_000,
        }
    }

    pub fn textbox(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ShapeKind::Other,
            position: Point { left: 5.0, top: 5.0 },
            size: Size { width: 80.0, height: 20.0 },
            rotation: 0.0,
            aspect_locked: false,
            placement: Placement::MoveAndSize,
            visible: true,
            alt_text: String::new(),
            hyperlink: None,
            bitmap: None,
            source_bytes: 0,
        }
    }

    pub fn group(name: &str) -> Self {
        Self {
            kind: ShapeKind::Group,
            ..Self::textbox(name)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeSheet {
    pub name: String,
    pub visible: bool,
    /// Back-to-front: index 0 is the back-most shape.
    pub shapes: Vec<FakeShape>,
    pub cells: HashMap<String, CellValue>,
    /// Addresses that currently hold a formula.
    pub formulas: HashSet<String>,
}

/// Scripted in-memory workbook host.
pub struct FakeWorkbook {
    pub sheets: Vec<FakeSheet>,
    /// Bitmap staged by the last copy, and polls left before it appears.
    clipboard_pending: Option<(Option<DynamicImage>, u32)>,
    /// Polls a copy takes before the clipboard yields.
    pub clipboard_delay: u32,
    insert_counter: u32,
    /// File size on disk of each inserted picture, keyed by assigned name.
    pub inserted_bytes: HashMap<String, u64>,
    /// Mutating operations in call order, for ordering assertions.
    pub op_log: Vec<String>,
    /// Shapes whose deletion the host refuses.
    pub fail_delete_shapes: HashSet<String>,
    /// Sheet whose deletion the host refuses.
    pub fail_delete_sheet: Option<String>,
    /// Shape property getters the host refuses, by property name.
    pub fail_property_reads: HashSet<&'static str>,
    /// Shape property setters the host refuses, by property name.
    pub fail_property_writes: HashSet<&'static str>,
    pub interaction: InteractionState,
    pub pump_count: u32,
}

impl FakeWorkbook {
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            clipboard_pending: None,
            clipboard_delay: 1,
            insert_counter: 0,
            inserted_bytes: HashMap::new(),
            op_log: Vec::new(),
            fail_delete_shapes: HashSet::new(),
            fail_delete_sheet: None,
            fail_property_reads: HashSet::new(),
            fail_property_writes: HashSet::new(),
            interaction: InteractionState {
                screen_updating: true,
                alerts_enabled: true,
                calculation: Calculation::Automatic,
            },
            pump_count: 0,
        }
    }

    pub fn add_sheet(&mut self, name: &str, visible: bool) -> &mut Self {
        self.sheets.push(FakeSheet {
            name: name.to_string(),
            visible,
            ..FakeSheet::default()
        });
        self
    }

    pub fn add_shape(&mut self, sheet: &str, shape: FakeShape) -> &mut Self {
        self.sheet_mut(sheet).unwrap().shapes.push(shape);
        self
    }

    pub fn set_cell(&mut self, sheet: &str, address: &str, value: CellValue, formula: bool) {
        let s = self.sheet_mut(sheet).unwrap();
        s.cells.insert(address.to_string(), value);
        if formula {
            s.formulas.insert(address.to_string());
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&FakeSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    fn sheet_mut(&mut self, name: &str) -> Option<&mut FakeSheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn get_shape(&self, sheet: &str, shape: &str) -> Option<&FakeShape> {
        self.sheet(sheet)?.shapes.iter().find(|s| s.name == shape)
    }

    fn shape_ref(&self, sheet: &str, shape: &str) -> SessionResult<&FakeShape> {
        self.get_shape(sheet, shape)
            .ok_or_else(|| SessionError::new(format!("no shape {shape} on {sheet}")))
    }

    fn shape_mut(&mut self, sheet: &str, shape: &str) -> SessionResult<&mut FakeShape> {
        self.sheet_mut(sheet)
            .and_then(|s| s.shapes.iter_mut().find(|sh| sh.name == shape))
            .ok_or_else(|| SessionError::new(format!("no shape {shape} on {sheet}")))
    }

    /// Shape names back-to-front, the sheet's current stacking order.
    pub fn stacking(&self, sheet: &str) -> Vec<String> {
        self.sheet(sheet)
            .map(|s| s.shapes.iter().map(|sh| sh.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn cell_value_of(&self, sheet: &str, address: &str) -> CellValue {
        self.sheet(sheet)
            .and_then(|s| s.cells.get(address).cloned())
            .unwrap_or(CellValue::Empty)
    }

    pub fn has_formula(&self, sheet: &str, address: &str) -> bool {
        self.sheet(sheet)
            .is_some_and(|s| s.formulas.contains(address))
    }

    fn refuse_read(&self, property: &'static str) -> SessionResult<()> {
        if self.fail_property_reads.contains(property) {
            return Err(SessionError::new(format!("{property} read refused")));
        }
        Ok(())
    }

    fn refuse_write(&self, property: &'static str) -> SessionResult<()> {
        if self.fail_property_writes.contains(property) {
            return Err(SessionError::new(format!("{property} write refused")));
        }
        Ok(())
    }
}

impl WorkbookSession for FakeWorkbook {
    fn sheet_partition(&self) -> SessionResult<SheetPartition> {
        let mut partition = SheetPartition::default();
        for sheet in &self.sheets {
            if sheet.visible {
                partition.visible.push(sheet.name.clone());
            } else {
                partition.hidden.push(sheet.name.clone());
            }
        }
        Ok(partition)
    }

    fn delete_sheet(&mut self, sheet: &str) -> SessionResult<()> {
        if self.fail_delete_sheet.as_deref() == Some(sheet) {
            return Err(SessionError::new(format!("{sheet} is protected")));
        }
        let before = self.sheets.len();
        self.sheets.retain(|s| s.name != sheet);
        if self.sheets.len() == before {
            return Err(SessionError::new(format!("no sheet {sheet}")));
        }
        self.op_log.push(format!("delete-sheet {sheet}"));
        Ok(())
    }

    fn cell_value(&self, sheet: &str, address: &str) -> SessionResult<CellValue> {
        let s = self
            .sheet(sheet)
            .ok_or_else(|| SessionError::new(format!("no sheet {sheet}")))?;
        Ok(s.cells.get(address).cloned().unwrap_or(CellValue::Empty))
    }

    fn set_cell_value(&mut self, sheet: &str, address: &str, value: CellValue)
        -> SessionResult<()> {
        let s = self
            .sheet_mut(sheet)
            .ok_or_else(|| SessionError::new(format!("no sheet {sheet}")))?;
        s.cells.insert(address.to_string(), value);
        // Writing a literal discards any formula, as the live host does.
        s.formulas.remove(address);
        self.op_log.push(format!("set-cell {sheet}!{address}"));
        Ok(())
    }

    fn shape_names(&self, sheet: &str) -> SessionResult<Vec<String>> {
        self.sheet(sheet)
            .map(|s| s.shapes.iter().map(|sh| sh.name.clone()).collect())
            .ok_or_else(|| SessionError::new(format!("no sheet {sheet}")))
    }

    fn shape_kind(&self, sheet: &str, shape: &str) -> SessionResult<ShapeKind> {
        Ok(self.shape_ref(sheet, shape)?.kind)
    }

    fn shape_position(&self, sheet: &str, shape: &str) -> SessionResult<Point> {
        self.refuse_read("position")?;
        Ok(self.shape_ref(sheet, shape)?.position)
    }

    fn shape_size(&self, sheet: &str, shape: &str) -> SessionResult<Size> {
        self.refuse_read("size")?;
        Ok(self.shape_ref(sheet, shape)?.size)
    }

    fn shape_rotation(&self, sheet: &str, shape: &str) -> SessionResult<f64> {
        self.refuse_read("rotation")?;
        Ok(self.shape_ref(sheet, shape)?.rotation)
    }

    fn shape_aspect_locked(&self, sheet: &str, shape: &str) -> SessionResult<bool> {
        self.refuse_read("aspect-lock")?;
        Ok(self.shape_ref(sheet, shape)?.aspect_locked)
    }

    fn shape_placement(&self, sheet: &str, shape: &str) -> SessionResult<Placement> {
        self.refuse_read("placement")?;
        Ok(self.shape_ref(sheet, shape)?.placement)
    }

    fn shape_visible(&self, sheet: &str, shape: &str) -> SessionResult<bool> {
        self.refuse_read("visibility")?;
        Ok(self.shape_ref(sheet, shape)?.visible)
    }

    fn shape_alt_text(&self, sheet: &str, shape: &str) -> SessionResult<String> {
        self.refuse_read("alt-text")?;
        Ok(self.shape_ref(sheet, shape)?.alt_text.clone())
    }

    fn shape_hyperlink(&self, sheet: &str, shape: &str) -> SessionResult<Option<Hyperlink>> {
        self.refuse_read("hyperlink")?;
        Ok(self.shape_ref(sheet, shape)?.hyperlink.clone())
    }

    fn shape_z_order(&self, sheet: &str, shape: &str) -> SessionResult<u32> {
        self.refuse_read("z-order")?;
        let s = self
            .sheet(sheet)
            .ok_or_else(|| SessionError::new(format!("no sheet {sheet}")))?;
        s.shapes
            .iter()
            .position(|sh| sh.name == shape)
            .map(|i| i as u32 + 1)
            .ok_or_else(|| SessionError::new(format!("no shape {shape} on {sheet}")))
    }

    fn set_shape_position(&mut self, sheet: &str, shape: &str, at: Point) -> SessionResult<()> {
        self.shape_mut(sheet, shape)?.position = at;
        Ok(())
    }

    fn set_shape_size(&mut self, sheet: &str, shape: &str, size: Size) -> SessionResult<()> {
        self.shape_mut(sheet, shape)?.size = size;
        Ok(())
    }

    fn set_shape_rotation(&mut self, sheet: &str, shape: &str, degrees: f64) -> SessionResult<()> {
        self.refuse_write("rotation")?;
        self.shape_mut(sheet, shape)?.rotation = degrees;
        Ok(())
    }

    fn set_shape_aspect_locked(&mut self, sheet: &str, shape: &str, locked: bool)
        -> SessionResult<()> {
        self.refuse_write("aspect-lock")?;
        self.shape_mut(sheet, shape)?.aspect_locked = locked;
        Ok(())
    }

    fn set_shape_placement(&mut self, sheet: &str, shape: &str, placement: Placement)
        -> SessionResult<()> {
        self.refuse_write("placement")?;
        self.shape_mut(sheet, shape)?.placement = placement;
        Ok(())
    }

    fn set_shape_visible(&mut self, sheet: &str, shape: &str, visible: bool) -> SessionResult<()> {
        self.refuse_write("visibility")?;
        self.shape_mut(sheet, shape)?.visible = visible;
        Ok(())
    }

    fn set_shape_alt_text(&mut self, sheet: &str, shape: &str, text: &str) -> SessionResult<()> {
        self.refuse_write("alt-text")?;
        self.shape_mut(sheet, shape)?.alt_text = text.to_string();
        Ok(())
    }

    fn add_shape_hyperlink(&mut self, sheet: &str, shape: &str, link: &Hyperlink)
        -> SessionResult<()> {
        self.refuse_write("hyperlink")?;
        self.shape_mut(sheet, shape)?.hyperlink = Some(link.clone());
        Ok(())
    }

    fn rename_shape(&mut self, sheet: &str, shape: &str, new_name: &str) -> SessionResult<String> {
        let collides = self
            .sheet(sheet)
            .is_some_and(|s| s.shapes.iter().any(|sh| sh.name == new_name));
        if collides {
            return Err(SessionError::new(format!("name {new_name} already in use")));
        }
        self.shape_mut(sheet, shape)?.name = new_name.to_string();
        Ok(new_name.to_string())
    }

    fn delete_shape(&mut self, sheet: &str, shape: &str) -> SessionResult<()> {
        if self.fail_delete_shapes.contains(shape) {
            return Err(SessionError::new(format!("{shape} is locked")));
        }
        let s = self
            .sheet_mut(sheet)
            .ok_or_else(|| SessionError::new(format!("no sheet {sheet}")))?;
        let before = s.shapes.len();
        s.shapes.retain(|sh| sh.name != shape);
        if s.shapes.len() == before {
            return Err(SessionError::new(format!("no shape {shape} on {sheet}")));
        }
        self.op_log.push(format!("delete-shape {sheet}/{shape}"));
        Ok(())
    }

    fn insert_picture(&mut self, sheet: &str, image_path: &Path, at: Point)
        -> SessionResult<String> {
        let bytes = std::fs::metadata(image_path)
            .map_err(|e| SessionError::new(format!("unreadable picture file: {e}")))?
            .len();
        self.insert_counter += 1;
        let name = format!("Picture {}", self.insert_counter);
        self.inserted_bytes.insert(name.clone(), bytes);

        let mut shape = FakeShape::textbox(&name);
        shape.kind = ShapeKind::Picture;
        shape.position = at;
        shape.placement = Placement::MoveAndSize;
        shape.source_bytes = bytes;
        // New shapes land front-most.
        self.sheet_mut(sheet)
            .ok_or_else(|| SessionError::new(format!("no sheet {sheet}")))?
            .shapes
            .push(shape);
        self.op_log.push(format!("insert-picture {sheet}/{name}"));
        Ok(name)
    }

    fn bring_to_front(&mut self, sheet: &str, shape: &str) -> SessionResult<()> {
        let s = self
            .sheet_mut(sheet)
            .ok_or_else(|| SessionError::new(format!("no sheet {sheet}")))?;
        let index = s
            .shapes
            .iter()
            .position(|sh| sh.name == shape)
            .ok_or_else(|| SessionError::new(format!("no shape {shape} on {sheet}")))?;
        let moved = s.shapes.remove(index);
        s.shapes.push(moved);
        Ok(())
    }

    fn copy_shape_as_bitmap(&mut self, sheet: &str, shape: &str) -> SessionResult<()> {
        let bitmap = self.shape_ref(sheet, shape)?.bitmap.clone();
        self.clipboard_pending = Some((bitmap, self.clipboard_delay));
        Ok(())
    }

    fn clipboard_bitmap(&mut self) -> SessionResult<Option<DynamicImage>> {
        match &mut self.clipboard_pending {
            Some((bitmap, polls_left)) => {
                if *polls_left > 0 {
                    *polls_left -= 1;
                    return Ok(None);
                }
                // A shape scripted without a bitmap never completes the copy.
                Ok(bitmap.clone())
            }
            None => Ok(None),
        }
    }

    fn pump_events(&mut self) {
        self.pump_count += 1;
    }

    fn interaction_state(&self) -> SessionResult<InteractionState> {
        Ok(self.interaction)
    }

    fn set_interaction_state(&mut self, state: &InteractionState) -> SessionResult<()> {
        self.interaction = *state;
        self.op_log.push(format!(
            "interaction screen={} alerts={}",
            state.screen_updating, state.alerts_enabled
        ));
        Ok(())
    }
}

// ============================================================================
// Bitmap helpers
// ============================================================================

/// An opaque RGB gradient; compresses to a small JPEG.
pub fn gradient_bitmap(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    DynamicImage::ImageRgb8(img)
}

// ============================================================================
// Xlsx fixture builder
// ============================================================================

/// One sheet of a generated workbook file.
pub struct SheetSpec {
    pub name: String,
    /// `None` = visible, `Some("hidden")` / `Some("veryHidden")` otherwise.
    pub state: Option<String>,
    /// (cell address, optional formula, stored value)
    pub cells: Vec<(String, Option<String>, String)>,
}

impl SheetSpec {
    pub fn visible(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: None,
            cells: Vec::new(),
        }
    }

    pub fn hidden(name: &str) -> Self {
        Self {
            state: Some("hidden".to_string()),
            ..Self::visible(name)
        }
    }

    pub fn very_hidden(name: &str) -> Self {
        Self {
            state: Some("veryHidden".to_string()),
            ..Self::visible(name)
        }
    }

    pub fn cell(mut self, address: &str, formula: Option<&str>, value: &str) -> Self {
        self.cells
            .push((address.to_string(), formula.map(str::to_string), value.to_string()));
        self
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Build a minimal but valid xlsx archive in memory.
pub fn build_xlsx(sheets: &[SheetSpec]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions = FileOptions::default();

    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    for i in 1..=sheets.len() {
        content_types.push_str(&format!(
            "\n<Override PartName=\"/xl/worksheets/sheet{i}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>"
        ));
    }
    content_types.push_str("\n</Types>");

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(content_types.as_bytes()).unwrap();

    zip.start_file("_rels/.rels", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
    )
    .unwrap();

    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>"#,
    );
    for (i, sheet) in sheets.iter().enumerate() {
        let state = sheet
            .state
            .as_ref()
            .map(|s| format!(" state=\"{s}\""))
            .unwrap_or_default();
        workbook.push_str(&format!(
            "\n<sheet name=\"{}\" sheetId=\"{}\"{} r:id=\"rId{}\"/>",
            escape_xml(&sheet.name),
            i + 1,
            state,
            i + 1
        ));
    }
    workbook.push_str("\n</sheets>\n</workbook>");

    zip.start_file("xl/workbook.xml", options).unwrap();
    zip.write_all(workbook.as_bytes()).unwrap();

    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for i in 1..=sheets.len() {
        rels.push_str(&format!(
            "\n<Relationship Id=\"rId{i}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{i}.xml\"/>"
        ));
    }
    rels.push_str("\n</Relationships>");

    zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    zip.write_all(rels.as_bytes()).unwrap();

    for (i, sheet) in sheets.iter().enumerate() {
        let mut ws = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
<row r="1">"#,
        );
        for (address, formula, value) in &sheet.cells {
            ws.push_str(&format!("\n<c r=\"{address}\">"));
            if let Some(f) = formula {
                ws.push_str(&format!("<f>{}</f>", escape_xml(f)));
            }
            ws.push_str(&format!("<v>{}</v></c>", escape_xml(value)));
        }
        ws.push_str("\n</row>\n</sheetData>\n</worksheet>");

        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
            .unwrap();
        zip.write_all(ws.as_bytes()).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

/// Write a generated workbook into a temp directory and return its path.
pub fn write_xlsx(dir: &tempfile::TempDir, name: &str, sheets: &[SheetSpec])
    -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, build_xlsx(sheets)).unwrap();
    path
}
