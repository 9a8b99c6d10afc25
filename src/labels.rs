//! Row labels and section headers.
//!
//! Financial models describe each row with text in the leftmost columns
//! ("Revenue", "Net Income"). Reports use those labels instead of bare cell
//! coordinates.

use crate::workbook::{Sheet, Workbook};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Supplies a human-readable label for a `(sheet, row)`.
pub trait RowLabelResolver {
    fn label(&self, sheet: &str, row: u32) -> Option<&str>;

    fn label_or<'a>(&'a self, sheet: &str, row: u32, fallback: &'a str) -> &'a str {
        self.label(sheet, row).unwrap_or(fallback)
    }
}

/// The first non-empty text cell (never a formula) in the leading columns of
/// each row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowLabels {
    labels: BTreeMap<u32, String>,
}

impl RowLabels {
    pub fn from_sheet(sheet: &Sheet, max_row: u32, max_col: u32) -> Self {
        let last_row = sheet.max_row().min(max_row);
        let labels = (1..=last_row)
            .filter_map(|row| {
                (1..=max_col)
                    .find_map(|col| sheet.label_text(row, col))
                    .map(|label| (row, label.to_string()))
            })
            .collect();
        Self { labels }
    }

    pub fn get(&self, row: u32) -> Option<&str> {
        self.labels.get(&row).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.labels.iter().map(|(row, label)| (*row, label.as_str()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub row: u32,
    pub label: String,
}

/// Upper-case labels longer than three characters on rows with no formula
/// in columns B..J are section headers. A sheet without any gets a single
/// `Main` section starting at row 1.
pub fn detect_sections(sheet: &Sheet, labels: &RowLabels) -> Vec<Section> {
    let sections: Vec<Section> = labels
        .iter()
        .filter(|(_, label)| is_header_text(label))
        .filter(|(row, _)| !(2..=10).any(|col| sheet.is_formula(*row, col)))
        .map(|(row, label)| Section {
            row,
            label: label.to_string(),
        })
        .collect();

    if sections.is_empty() {
        vec![Section {
            row: 1,
            label: "Main".to_string(),
        }]
    } else {
        sections
    }
}

fn is_header_text(label: &str) -> bool {
    label.chars().count() > 3
        && label.chars().any(char::is_alphabetic)
        && !label.chars().any(char::is_lowercase)
}

/// Index of the last section starting at or above `row`; rows above the
/// first header fall into section 0.
pub fn section_index(sections: &[Section], row: u32) -> usize {
    sections
        .iter()
        .rposition(|section| row >= section.row)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetLabels {
    pub labels: RowLabels,
    pub sections: Vec<Section>,
}

/// Labels and sections for every sheet of a workbook.
#[derive(Debug, Clone, Default)]
pub struct WorkbookLabels {
    sheets: HashMap<String, SheetLabels>,
}

impl WorkbookLabels {
    pub fn build(workbook: &Workbook, max_row: u32, max_col: u32) -> Self {
        let sheets = workbook
            .sheets()
            .iter()
            .map(|sheet| {
                let labels = RowLabels::from_sheet(sheet, max_row, max_col);
                let sections = detect_sections(sheet, &labels);
                (sheet.name().to_string(), SheetLabels { labels, sections })
            })
            .collect();
        Self { sheets }
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetLabels> {
        self.sheets.get(name)
    }

    pub fn sections(&self, name: &str) -> &[Section] {
        self.sheets
            .get(name)
            .map(|s| s.sections.as_slice())
            .unwrap_or(&[])
    }
}

impl RowLabelResolver for WorkbookLabels {
    fn label(&self, sheet: &str, row: u32) -> Option<&str> {
        self.sheets.get(sheet)?.labels.get(row)
    }
}
