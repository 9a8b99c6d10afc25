//! Typed errors for the workbook data source.
//!
//! Formula ambiguity is never an error (the parser degrades to fewer
//! references). Only faults in reading the workbook itself surface here, and
//! they are always propagated to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// A failure reading from an in-memory workbook snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The requested sheet is not part of the snapshot
    #[error("sheet `{0}` does not exist in the workbook")]
    UnknownSheet(String),

    /// The sheet exists but its cells could not be read.
    ///
    /// The in-memory [`crate::Workbook`] never produces this; it is for
    /// [`crate::WorkbookSnapshot`] implementations backed by lazily read or
    /// remote storage.
    #[error("sheet `{sheet}` could not be read: {reason}")]
    Unreadable { sheet: String, reason: String },
}

/// A failure loading a workbook file from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open workbook {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("failed to read sheet `{sheet}` in {path}: {source}")]
    Sheet {
        path: PathBuf,
        sheet: String,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook {0} contains no sheets")]
    Empty(PathBuf),
}
