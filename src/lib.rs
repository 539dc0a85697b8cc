//! Spreadsheet Workbook Slimming Library
//!
//! Core logic for shrinking xlsx workbooks: recompressing embedded pictures
//! through a live spreadsheet host session, and deleting hidden sheets after
//! freezing the formulas that depend on them.
//!
//! The live host is abstracted behind [`session::WorkbookSession`]; the
//! hidden-sheet dependency scan reads the workbook file directly and also
//! works without any host at all.

pub mod clipboard;
pub mod compress;
pub mod encoder;
pub mod error;
pub mod hidden;
pub mod replace;
pub mod scan;
pub mod scratch;
pub mod session;
pub mod snapshot;
pub mod tasks;
pub mod zorder;

pub use clipboard::ClipboardOptions;
pub use compress::{run_image_compression, CompressOptions, CompressReport};
pub use encoder::{EncodeOptions, QualityModel};
pub use error::{Result, SlimError};
pub use hidden::{delete_hidden_sheets, DeletionReport};
pub use scan::{read_sheet_partition, scan_hidden_references, DependencyMap};
pub use scratch::ScratchDir;
pub use session::{SessionError, SessionResult, SheetPartition, WorkbookSession};
pub use snapshot::{RestoreReport, ShapeSnapshot};
pub use tasks::Task;
