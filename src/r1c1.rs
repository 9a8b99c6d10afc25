//! A1 to R1C1 rewriting, used to compare formulas copied along a row.
//!
//! Two cells that hold "the same" formula relative to their own position
//! produce the same R1C1 text: `=C5*2` in D5 and `=D5*2` in E5 both become
//! `=RC[-1]*2`.

use crate::cell::column_index;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static A1_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?[A-Z]+)(\$?[0-9]+)").expect("A1 token pattern compiles"));

/// Rewrite every A1 token in `formula` relative to the 1-based `(row, col)`
/// of the cell that holds it.
///
/// Absolute parts become `R{n}` / `C{n}`, relative parts `R[d]` / `C[d]`,
/// with `R[0]` and `C[0]` shortened to `R` and `C`.
pub fn a1_to_r1c1(formula: &str, row: u32, col: u32) -> String {
    A1_TOKEN
        .replace_all(formula, |caps: &Captures| rewrite(caps, row, col))
        .into_owned()
}

fn rewrite(caps: &Captures, row: u32, col: u32) -> String {
    let col_part = &caps[1];
    let row_part = &caps[2];

    let (Some(col_index), Ok(row_number)) = (
        column_index(col_part.trim_start_matches('$')),
        row_part.trim_start_matches('$').parse::<i64>(),
    ) else {
        return caps[0].to_string();
    };

    let r = if row_part.starts_with('$') {
        format!("R{}", row_number)
    } else {
        relative('R', row_number - i64::from(row))
    };
    let c = if col_part.starts_with('$') {
        format!("C{}", col_index)
    } else {
        relative('C', i64::from(col_index) - i64::from(col))
    };

    format!("{}{}", r, c)
}

fn relative(axis: char, offset: i64) -> String {
    if offset == 0 {
        axis.to_string()
    } else {
        format!("{}[{}]", axis, offset)
    }
}
