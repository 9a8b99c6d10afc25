//! Workbook loading.
//!
//! The file is opened once; the formula view and the value view of every sheet,
//! along with the workbook's defined names, are read from that single handle
//! into a [`Workbook`].

use crate::error::LoadError;
use crate::workbook::{CellValue, Sheet, Workbook};
use calamine::{open_workbook_auto, CellErrorType, Data, Reader, SheetVisible};
use std::path::Path;
use tracing::{debug, info, warn};

pub fn load_workbook(path: &Path) -> Result<Workbook, LoadError> {
    let mut source = open_workbook_auto(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let metadata = source.sheets_metadata().to_vec();
    if metadata.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }

    let mut workbook = Workbook::new();
    for (name, refers_to) in source.defined_names() {
        workbook.add_defined_name(name.as_str(), refers_to.as_str());
    }

    for meta in metadata {
        let mut sheet = Sheet::new(meta.name.clone());
        sheet.set_visible(matches!(meta.visible, SheetVisible::Visible));

        let values = source
            .worksheet_range(&meta.name)
            .map_err(|source| LoadError::Sheet {
                path: path.to_path_buf(),
                sheet: meta.name.clone(),
                source,
            })?;
        let (row0, col0) = values.start().unwrap_or((0, 0));
        for (row, col, data) in values.used_cells() {
            if let Some(value) = convert_value(data) {
                sheet.set_value(row0 + row as u32 + 1, col0 + col as u32 + 1, value);
            }
        }

        // Chartsheets and some legacy formats carry no formula table.
        match source.worksheet_formula(&meta.name) {
            Ok(formulas) => {
                let (row0, col0) = formulas.start().unwrap_or((0, 0));
                for (row, col, formula) in formulas.used_cells() {
                    sheet.set_formula(row0 + row as u32 + 1, col0 + col as u32 + 1, formula);
                }
            }
            Err(err) => warn!(sheet = %meta.name, error = %err, "formulas unavailable for sheet"),
        }

        debug!(sheet = %meta.name, visible = sheet.is_visible(), "loaded sheet");
        workbook.add_sheet(sheet);
    }

    info!(
        path = %path.display(),
        sheets = workbook.sheets().len(),
        formulas = workbook.formula_count(),
        names = workbook.defined_names().len(),
        "workbook loaded"
    );
    Ok(workbook)
}

fn convert_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::Int(v) => Some(CellValue::Number(*v as f64)),
        Data::Float(v) => Some(CellValue::Number(*v)),
        Data::Bool(v) => Some(CellValue::Bool(*v)),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            Some(CellValue::Text(s.clone()))
        }
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::Error(e) => Some(CellValue::Error(error_code(e).to_string())),
    }
}

fn error_code(err: &CellErrorType) -> &'static str {
    match err {
        CellErrorType::Div0 => "#DIV/0!",
        CellErrorType::NA => "#N/A",
        CellErrorType::Name => "#NAME?",
        CellErrorType::Null => "#NULL!",
        CellErrorType::Num => "#NUM!",
        CellErrorType::Ref => "#REF!",
        CellErrorType::Value => "#VALUE!",
        CellErrorType::GettingData => "#GETTING_DATA",
    }
}
