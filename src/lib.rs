pub mod analyzer;
pub mod audit;
pub mod cell;
pub mod config;
pub mod dependency_graph;
pub mod discovery;
pub mod error;
pub mod labels;
pub mod loader;
pub mod maps;
pub mod r1c1;
pub mod reference_parser;
pub mod reporter;
pub mod roles;
pub mod workbook;

pub use analyzer::{Analyzer, ModelAnalysis};
pub use cell::CellAddress;
pub use config::Config;
pub use dependency_graph::{build_graph, DependencyGraph, GraphBuilder};
pub use error::{LoadError, SnapshotError};
pub use loader::load_workbook;
pub use reference_parser::{extract_references, ReferenceParser};
pub use reporter::{ReportFormat, Reporter};
pub use workbook::{ScanBounds, Workbook, WorkbookSnapshot};

pub type Result<T> = anyhow::Result<T>;
