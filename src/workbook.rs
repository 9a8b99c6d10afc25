use crate::cell::{column_index, split_coordinate, CellAddress};
use crate::error::SnapshotError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// 1-based `(row, column)`.
pub type Position = (u32, u32);

/// A cached cell value from the value view of a workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
    /// Error code as displayed by the spreadsheet, e.g. `#REF!`.
    Error(String),
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }
}

/// How much of each sheet the graph builder looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanBounds {
    pub max_rows: u32,
    pub max_cols: u32,
}

impl Default for ScanBounds {
    fn default() -> Self {
        Self {
            max_rows: 300,
            max_cols: 15,
        }
    }
}

impl ScanBounds {
    pub fn unbounded() -> Self {
        Self {
            max_rows: u32::MAX,
            max_cols: u32::MAX,
        }
    }

    pub fn contains(&self, (row, col): Position) -> bool {
        row <= self.max_rows && col <= self.max_cols
    }
}

/// One non-empty cell as seen through a [`WorkbookSnapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaCell<'a> {
    pub address: CellAddress,
    pub formula_text: Option<&'a str>,
}

impl FormulaCell<'_> {
    pub fn is_formula(&self) -> bool {
        self.formula_text.is_some()
    }
}

/// The read-only surface the graph builder needs from a loaded workbook.
pub trait WorkbookSnapshot {
    fn sheet_names(&self) -> Vec<String>;

    /// Non-empty cells of `sheet` inside `bounds`, in row-major order.
    fn formula_cells(&self, sheet: &str, bounds: ScanBounds) -> Result<Vec<FormulaCell<'_>>, SnapshotError>;
}

/// One worksheet with its formula view and value view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    name: String,
    visible: bool,
    formulas: BTreeMap<Position, String>,
    values: BTreeMap<Position, CellValue>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Store a formula. A missing leading `=` is added; blank text is ignored.
    pub fn set_formula(&mut self, row: u32, col: u32, formula: &str) {
        let trimmed = formula.trim();
        if trimmed.is_empty() {
            return;
        }
        let normalized = if trimmed.starts_with('=') {
            trimmed.to_string()
        } else {
            format!("={}", trimmed)
        };
        self.formulas.insert((row, col), normalized);
    }

    pub fn set_value(&mut self, row: u32, col: u32, value: CellValue) {
        self.values.insert((row, col), value);
    }

    pub fn with_formula(mut self, coord: &str, formula: &str) -> Self {
        match parse_position(coord) {
            Some((row, col)) => self.set_formula(row, col, formula),
            None => warn!(sheet = %self.name, coord, "ignoring formula at invalid coordinate"),
        }
        self
    }

    pub fn with_value(mut self, coord: &str, value: CellValue) -> Self {
        match parse_position(coord) {
            Some((row, col)) => self.set_value(row, col, value),
            None => warn!(sheet = %self.name, coord, "ignoring value at invalid coordinate"),
        }
        self
    }

    pub fn formula(&self, row: u32, col: u32) -> Option<&str> {
        self.formulas.get(&(row, col)).map(String::as_str)
    }

    pub fn value(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.values.get(&(row, col))
    }

    pub fn is_formula(&self, row: u32, col: u32) -> bool {
        self.formulas.contains_key(&(row, col))
    }

    /// Non-formula text at a position, trimmed; `None` when blank.
    pub fn label_text(&self, row: u32, col: u32) -> Option<&str> {
        if self.is_formula(row, col) {
            return None;
        }
        self.value(row, col)
            .and_then(CellValue::as_text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn formulas(&self) -> impl Iterator<Item = (Position, &str)> {
        self.formulas.iter().map(|(pos, f)| (*pos, f.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = (Position, &CellValue)> {
        self.values.iter().map(|(pos, v)| (*pos, v))
    }

    /// Formulas of one row, ordered by column.
    pub fn row_formulas(&self, row: u32) -> impl Iterator<Item = (u32, &str)> {
        self.formulas
            .range((row, 0)..=(row, u32::MAX))
            .map(|((_, col), f)| (*col, f.as_str()))
    }

    pub fn row_values(&self, row: u32) -> impl Iterator<Item = (u32, &CellValue)> {
        self.values
            .range((row, 0)..=(row, u32::MAX))
            .map(|((_, col), v)| (*col, v))
    }

    pub fn max_row(&self) -> u32 {
        let f = self.formulas.keys().map(|(r, _)| *r).max().unwrap_or(0);
        let v = self.values.keys().map(|(r, _)| *r).max().unwrap_or(0);
        f.max(v)
    }

    fn used_positions(&self, bounds: ScanBounds) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .formulas
            .keys()
            .chain(self.values.keys())
            .copied()
            .filter(|pos| bounds.contains(*pos))
            .collect();
        positions.sort_unstable();
        positions.dedup();
        positions
    }
}

/// A workbook-level name from the name manager and the text it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinedName {
    pub name: String,
    pub refers_to: String,
}

/// An in-memory workbook: an ordered list of sheets loaded once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    defined_names: Vec<DefinedName>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn with_sheet(mut self, sheet: Sheet) -> Self {
        self.add_sheet(sheet);
        self
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn add_defined_name(&mut self, name: impl Into<String>, refers_to: impl Into<String>) {
        self.defined_names.push(DefinedName {
            name: name.into(),
            refers_to: refers_to.into(),
        });
    }

    pub fn with_defined_name(mut self, name: &str, refers_to: &str) -> Self {
        self.add_defined_name(name, refers_to);
        self
    }

    pub fn defined_names(&self) -> &[DefinedName] {
        &self.defined_names
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_set(&self) -> HashSet<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn is_formula(&self, address: &CellAddress) -> bool {
        match (self.sheet(address.sheet()), address.position()) {
            (Some(sheet), Some((row, col))) => sheet.is_formula(row, col),
            _ => false,
        }
    }

    pub fn formula_count(&self) -> usize {
        self.sheets.iter().map(|s| s.formulas.len()).sum()
    }
}

impl WorkbookSnapshot for Workbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn formula_cells(&self, sheet: &str, bounds: ScanBounds) -> Result<Vec<FormulaCell<'_>>, SnapshotError> {
        let sheet = self
            .sheet(sheet)
            .ok_or_else(|| SnapshotError::UnknownSheet(sheet.to_string()))?;

        Ok(sheet
            .used_positions(bounds)
            .into_iter()
            .map(|(row, col)| FormulaCell {
                address: CellAddress::from_position(sheet.name.as_str(), row, col),
                formula_text: sheet.formula(row, col),
            })
            .collect())
    }
}

fn parse_position(coord: &str) -> Option<Position> {
    let (letters, row) = split_coordinate(coord)?;
    Some((row, column_index(letters)?))
}
