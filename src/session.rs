//! The boundary to the live spreadsheet host.
//!
//! The automation surface underneath (a desktop spreadsheet application's
//! object model) exposes its workbook as ambient global state. Here it is an
//! explicit [`WorkbookSession`] handle passed by reference to every component;
//! nothing in this crate reaches for an "active application" singleton.
//!
//! All operations are name-addressed (sheet name, shape name, cell address)
//! because shape handles in the host are invalidated by the destructive
//! replace protocol, and names are the only identity that survives it.

use image::DynamicImage;
use std::path::Path;

/// An operation the live host refused or could not complete.
///
/// Hosts wrap their native error (COM HRESULT, RPC failure, ...) into a
/// message; the library only needs to log it and decide whether the
/// surrounding item is skippable.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct SessionError(pub String);

impl SessionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Shape classification as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// Embedded raster picture.
    Picture,
    /// Picture linked to an external file.
    LinkedPicture,
    /// Shape group. Never recompressed: replacing a member would corrupt
    /// the group structure.
    Group,
    /// Textboxes, charts, connectors, and anything else.
    Other,
}

impl ShapeKind {
    /// Whether the compression pass should attempt to replace this shape.
    pub fn is_picture(self) -> bool {
        matches!(self, ShapeKind::Picture | ShapeKind::LinkedPicture)
    }
}

/// How a shape's position and size respond to underlying cell resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    MoveOnly,
    MoveAndSize,
    FreeFloating,
}

/// Position of a shape's top-left corner, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub left: f64,
    pub top: f64,
}

/// Shape extent, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// A hyperlink attached to a shape.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hyperlink {
    pub address: Option<String>,
    pub sub_address: Option<String>,
    pub screen_tip: Option<String>,
    pub display_text: Option<String>,
}

impl Hyperlink {
    /// A hyperlink with neither an address nor a sub-address points nowhere
    /// and is not worth restoring.
    pub fn is_empty(&self) -> bool {
        self.address.is_none() && self.sub_address.is_none()
    }
}

/// A cell's computed value as read through the live session.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

/// Recalculation mode of the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calculation {
    Automatic,
    Manual,
}

/// Host UI/recalc state suspended around a long-running pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionState {
    pub screen_updating: bool,
    pub alerts_enabled: bool,
    pub calculation: Calculation,
}

impl InteractionState {
    /// The state a bulk pass runs under: no redraw, no dialogs, no recalc.
    pub fn suspended() -> Self {
        Self {
            screen_updating: false,
            alerts_enabled: false,
            calculation: Calculation::Manual,
        }
    }
}

/// Sheet names partitioned by visibility.
///
/// The host distinguishes hidden from very-hidden sheets; this crate treats
/// both as hidden (see DESIGN.md).
#[derive(Debug, Clone, Default)]
pub struct SheetPartition {
    pub visible: Vec<String>,
    pub hidden: Vec<String>,
}

impl SheetPartition {
    pub fn has_hidden(&self) -> bool {
        !self.hidden.is_empty()
    }
}

/// One open workbook in a live spreadsheet host.
///
/// The surface is not reentrant: exactly one task touches one session at a
/// time, and implementations may assume single-threaded access.
///
/// Individual getters return `Err` when the host rejects the property read;
/// callers that can substitute a default (snapshot capture) do so instead of
/// failing wholesale.
pub trait WorkbookSession {
    // --- sheets ---

    fn sheet_partition(&self) -> SessionResult<SheetPartition>;
    fn delete_sheet(&mut self, sheet: &str) -> SessionResult<()>;

    // --- cells ---

    fn cell_value(&self, sheet: &str, address: &str) -> SessionResult<CellValue>;
    fn set_cell_value(&mut self, sheet: &str, address: &str, value: CellValue)
        -> SessionResult<()>;

    // --- shape enumeration and properties ---

    /// Shape names in the host's enumeration order.
    fn shape_names(&self, sheet: &str) -> SessionResult<Vec<String>>;
    fn shape_kind(&self, sheet: &str, shape: &str) -> SessionResult<ShapeKind>;
    fn shape_position(&self, sheet: &str, shape: &str) -> SessionResult<Point>;
    fn shape_size(&self, sheet: &str, shape: &str) -> SessionResult<Size>;
    fn shape_rotation(&self, sheet: &str, shape: &str) -> SessionResult<f64>;
    fn shape_aspect_locked(&self, sheet: &str, shape: &str) -> SessionResult<bool>;
    fn shape_placement(&self, sheet: &str, shape: &str) -> SessionResult<Placement>;
    fn shape_visible(&self, sheet: &str, shape: &str) -> SessionResult<bool>;
    fn shape_alt_text(&self, sheet: &str, shape: &str) -> SessionResult<String>;
    fn shape_hyperlink(&self, sheet: &str, shape: &str) -> SessionResult<Option<Hyperlink>>;
    /// Back-to-front stacking position, 1 = back-most.
    fn shape_z_order(&self, sheet: &str, shape: &str) -> SessionResult<u32>;

    fn set_shape_position(&mut self, sheet: &str, shape: &str, at: Point) -> SessionResult<()>;
    fn set_shape_size(&mut self, sheet: &str, shape: &str, size: Size) -> SessionResult<()>;
    fn set_shape_rotation(&mut self, sheet: &str, shape: &str, degrees: f64) -> SessionResult<()>;
    fn set_shape_aspect_locked(&mut self, sheet: &str, shape: &str, locked: bool)
        -> SessionResult<()>;
    fn set_shape_placement(&mut self, sheet: &str, shape: &str, placement: Placement)
        -> SessionResult<()>;
    fn set_shape_visible(&mut self, sheet: &str, shape: &str, visible: bool) -> SessionResult<()>;
    fn set_shape_alt_text(&mut self, sheet: &str, shape: &str, text: &str) -> SessionResult<()>;
    fn add_shape_hyperlink(&mut self, sheet: &str, shape: &str, link: &Hyperlink)
        -> SessionResult<()>;

    /// Rename a shape. Returns the resulting name, which the host may keep
    /// unchanged if the requested name collides with an existing shape.
    fn rename_shape(&mut self, sheet: &str, shape: &str, new_name: &str) -> SessionResult<String>;

    // --- destructive shape operations ---

    fn delete_shape(&mut self, sheet: &str, shape: &str) -> SessionResult<()>;

    /// Insert a picture from a file at the given position and return the
    /// host-assigned shape name (the host picks a fresh name on collision).
    fn insert_picture(&mut self, sheet: &str, image_path: &Path, at: Point)
        -> SessionResult<String>;

    fn bring_to_front(&mut self, sheet: &str, shape: &str) -> SessionResult<()>;

    // --- clipboard extraction ---

    /// Ask the host to render the shape to the system clipboard as a bitmap.
    fn copy_shape_as_bitmap(&mut self, sheet: &str, shape: &str) -> SessionResult<()>;

    /// Read a bitmap from the system clipboard, `None` while it holds no
    /// image yet. An `Err` means the clipboard was busy; the poll loop
    /// retries it like `None`.
    fn clipboard_bitmap(&mut self) -> SessionResult<Option<DynamicImage>>;

    /// Service the host's pending message/event queue. The clipboard copy is
    /// asynchronous in GUI-automation hosts and never completes unless this
    /// runs every poll tick. Hosts without that constraint implement it as a
    /// no-op.
    fn pump_events(&mut self);

    // --- host interaction state ---

    fn interaction_state(&self) -> SessionResult<InteractionState>;
    fn set_interaction_state(&mut self, state: &InteractionState) -> SessionResult<()>;

    // --- thin cleanup surface ---
    //
    // Single forwarded calls with no logic of their own. Defaults let hosts
    // that cannot support them opt out; the tasks log and continue.

    /// Break all external workbook links, returning how many were removed.
    fn delete_external_links(&mut self) -> SessionResult<usize> {
        Err(SessionError::new("external-link removal not supported by this host"))
    }

    /// Remove all workbook-level defined names, returning how many.
    fn delete_defined_names(&mut self) -> SessionResult<usize> {
        Err(SessionError::new("defined-name removal not supported by this host"))
    }

    /// Trim formatting applied beyond the used range of a sheet.
    fn clear_excess_formatting(&mut self, _sheet: &str) -> SessionResult<()> {
        Err(SessionError::new("excess-format clearing not supported by this host"))
    }

    /// Reset a sheet's print setup to the standard layout.
    fn normalize_print_settings(&mut self, _sheet: &str) -> SessionResult<()> {
        Err(SessionError::new("print-setting normalization not supported by this host"))
    }

    /// Refresh pivot caches and drop cached source records, returning how
    /// many caches were touched.
    fn clean_pivot_caches(&mut self) -> SessionResult<usize> {
        Err(SessionError::new("pivot-cache cleanup not supported by this host"))
    }

    /// Add a textbox label and return its host-assigned name.
    fn add_textbox(&mut self, _sheet: &str, _text: &str, _at: Point, _size: Size)
        -> SessionResult<String> {
        Err(SessionError::new("textbox insertion not supported by this host"))
    }
}
