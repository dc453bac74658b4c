//! Polling list synchronizer shared by every list-backed dashboard screen.

pub mod alerts;
pub mod change;
pub mod cursor;
pub mod export;
pub mod screen;
pub mod screens;
pub mod state;
pub mod synchronizer;

pub use alerts::{exam_overbooking, ExamOverbooking, DEFAULT_EXAM_LIMIT};
pub use change::{changed, diff, positional_changed, CollectionDiff};
pub use cursor::{Filters, SyncCursor};
pub use export::{export_csv, ExportColumn};
pub use screen::{ActionRoute, CompareFields, FieldBody, FieldWrite, ScreenSpec, ScreenSpecBuilder};
pub use state::{ApplyOutcome, CellKey, SyncSnapshot, SyncState, WriteTicket};
pub use synchronizer::{ListSynchronizer, LoadOptions};
