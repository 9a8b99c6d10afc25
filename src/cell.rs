use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// A normalized `(sheet, cell)` pair.
///
/// The cell token is stored without `$` anchors, so `$B$12`, `B$12` and `B12`
/// all identify the same address. Ordering is by sheet name, then column
/// index, then numeric row (`A2` sorts before `A10`, `Z1` before `AA1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAddress {
    sheet: String,
    cell: String,
}

impl CellAddress {
    pub fn new(sheet: impl Into<String>, cell: &str) -> Self {
        Self {
            sheet: sheet.into(),
            cell: strip_anchors(cell),
        }
    }

    /// Build an address from 1-based row/column indices.
    pub fn from_position(sheet: impl Into<String>, row: u32, col: u32) -> Self {
        Self {
            sheet: sheet.into(),
            cell: coordinate(row, col),
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn cell(&self) -> &str {
        &self.cell
    }

    pub fn row(&self) -> Option<u32> {
        split_coordinate(&self.cell).map(|(_, row)| row)
    }

    pub fn column(&self) -> Option<u32> {
        split_coordinate(&self.cell).and_then(|(letters, _)| column_index(letters))
    }

    /// 1-based `(row, column)` if the token is a well-formed coordinate.
    pub fn position(&self) -> Option<(u32, u32)> {
        let (letters, row) = split_coordinate(&self.cell)?;
        Some((row, column_index(letters)?))
    }

    fn sort_key(&self) -> (u32, u32) {
        match self.position() {
            Some((row, col)) => (col, row),
            None => (u32::MAX, u32::MAX),
        }
    }
}

impl Ord for CellAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sheet
            .cmp(&other.sheet)
            .then_with(|| self.sort_key().cmp(&other.sort_key()))
            .then_with(|| self.cell.cmp(&other.cell))
    }
}

impl PartialOrd for CellAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet, self.cell)
    }
}

pub fn strip_anchors(token: &str) -> String {
    token.replace('$', "")
}

/// Convert column letters (`A`, `Z`, `AA`) to a 1-based index.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

/// Convert a 1-based column index back to letters. Index 0 yields an empty string.
pub fn column_letters(mut index: u32) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

pub fn coordinate(row: u32, col: u32) -> String {
    format!("{}{}", column_letters(col), row)
}

/// Split `B12` (or `$B$12`) into `("B", 12)`.
pub fn split_coordinate(token: &str) -> Option<(&str, u32)> {
    let token = token.trim_start_matches('$');
    let split = token.find(|c: char| !c.is_ascii_alphabetic())?;
    if split == 0 {
        return None;
    }
    let (letters, rest) = token.split_at(split);
    let digits = rest.trim_start_matches('$');
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((letters, digits.parse().ok()?))
}

/// Collapse a list of cell tokens into rectangular ranges, e.g.
/// `A1, A2, B1, B2, D5` becomes `A1:B2, D5`.
///
/// Rectangles are grown greedily from the top-left-most remaining cell:
/// first as wide as possible, then as tall as the full width allows.
pub fn group_into_ranges<S: AsRef<str>>(cells: &[S]) -> String {
    let mut remaining: BTreeSet<(u32, u32)> = cells
        .iter()
        .filter_map(|c| {
            let (letters, row) = split_coordinate(c.as_ref().trim())?;
            Some((row, column_index(letters)?))
        })
        .collect();

    let mut ranges = Vec::new();
    while let Some(&(row, col)) = remaining.iter().next() {
        let mut width = 1;
        while remaining.contains(&(row, col + width)) {
            width += 1;
        }
        let mut height = 1;
        while (col..col + width).all(|c| remaining.contains(&(row + height, c))) {
            height += 1;
        }

        let top_left = coordinate(row, col);
        if width == 1 && height == 1 {
            ranges.push(top_left);
        } else {
            let bottom_right = coordinate(row + height - 1, col + width - 1);
            ranges.push(format!("{}:{}", top_left, bottom_right));
        }

        for r in row..row + height {
            for c in col..col + width {
                remaining.remove(&(r, c));
            }
        }
    }

    ranges.join(", ")
}
