//! Formula reference extraction.
//!
//! Extraction runs in two ordered passes over the formula text:
//!
//! 1. cross-sheet references (`'My Sheet'!A1`, `Inputs!$B$4:$B$9`) are matched and
//!    validated against the workbook's sheet names;
//! 2. every cross-sheet match and every double-quoted string literal is blanked
//!    out, and the residue is scanned for bare cell tokens on the formula's own
//!    sheet.
//!
//! Ranges contribute their two boundary cells only. The parser never fails on
//! formula content: anything it cannot make sense of simply yields no reference.

use crate::cell::{strip_anchors, CellAddress};
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

static DEFAULT_PARSER: Lazy<ReferenceParser> =
    Lazy::new(|| ReferenceParser::new().expect("built-in reference patterns compile"));

/// Extract every cell a formula reads from, using the shared parser.
pub fn extract_references(
    formula: &str,
    current_sheet: &str,
    known_sheets: &HashSet<String>,
) -> BTreeSet<CellAddress> {
    DEFAULT_PARSER.extract(formula, current_sheet, known_sheets)
}

pub struct ReferenceParser {
    cross_sheet: Regex,
    string_literal: Regex,
    cell_token: Regex,
}

impl ReferenceParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            cross_sheet: Regex::new(
                r"(?:'([^']+)'|([a-zA-Z0-9_.& ]+))!(\$?[A-Z]+\$?[0-9]+)(?::(\$?[A-Z]+\$?[0-9]+))?",
            )?,
            string_literal: Regex::new(r#""[^"]*""#)?,
            cell_token: Regex::new(r"\$?[A-Z]+\$?[0-9]+")?,
        })
    }

    pub fn extract(
        &self,
        formula: &str,
        current_sheet: &str,
        known_sheets: &HashSet<String>,
    ) -> BTreeSet<CellAddress> {
        if !formula.starts_with('=') {
            return BTreeSet::new();
        }

        let mut refs = self.cross_sheet_pass(formula, known_sheets);
        let residue = self.strip_for_same_sheet(formula);
        refs.extend(self.same_sheet_pass(&residue, current_sheet));
        refs
    }

    /// Pass 1: sheet-qualified references whose sheet is known.
    pub fn cross_sheet_pass(
        &self,
        formula: &str,
        known_sheets: &HashSet<String>,
    ) -> BTreeSet<CellAddress> {
        let mut refs = BTreeSet::new();

        for caps in self.cross_sheet.captures_iter(formula) {
            let raw_name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();

            let Some(sheet) = resolve_sheet(raw_name, caps.get(1).is_some(), known_sheets) else {
                continue;
            };

            if let Some(start) = caps.get(3) {
                refs.insert(CellAddress::new(sheet, start.as_str()));
            }
            if let Some(end) = caps.get(4) {
                refs.insert(CellAddress::new(sheet, end.as_str()));
            }
        }

        refs
    }

    /// Blank out cross-sheet matches, then string literals, leaving only text
    /// that can hold same-sheet references.
    pub fn strip_for_same_sheet(&self, formula: &str) -> String {
        let without_cross = self.cross_sheet.replace_all(formula, " ");
        self.string_literal
            .replace_all(&without_cross, " ")
            .into_owned()
    }

    /// Pass 2: bare cell tokens resolved against `current_sheet`.
    ///
    /// A token only counts when neither neighbour is `[A-Z0-9_.]`, so names such
    /// as `ABC123X` or `RATE_2024` are never split into references.
    pub fn same_sheet_pass(&self, residue: &str, current_sheet: &str) -> BTreeSet<CellAddress> {
        let mut refs = BTreeSet::new();
        let bytes = residue.as_bytes();
        let mut pos = 0;

        while let Some(m) = self.cell_token.find_at(residue, pos) {
            let before_ok = m.start() == 0 || !is_identifier_byte(bytes[m.start() - 1]);
            let after_ok = m.end() == bytes.len() || !is_identifier_byte(bytes[m.end()]);

            if before_ok && after_ok {
                let cell = strip_anchors(m.as_str());
                if !cell.chars().all(|c| c.is_ascii_digit()) {
                    refs.insert(CellAddress::new(current_sheet, &cell));
                }
                pos = m.end();
            } else {
                // Tokens always start with an ASCII byte, so this stays on a char boundary.
                pos = m.start() + 1;
            }
        }

        refs
    }
}

fn resolve_sheet<'a>(
    raw_name: &'a str,
    quoted: bool,
    known_sheets: &HashSet<String>,
) -> Option<&'a str> {
    if known_sheets.contains(raw_name) {
        return Some(raw_name);
    }
    // Unquoted captures swallow the spaces around operators (`A1 + Calc!B2`).
    let trimmed = raw_name.trim();
    if !quoted && known_sheets.contains(trimmed) {
        return Some(trimmed);
    }
    None
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_' || b == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn sheets(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn refs(pairs: &[(&str, &str)]) -> BTreeSet<CellAddress> {
        pairs.iter().map(|(s, c)| CellAddress::new(*s, c)).collect()
    }

    #[rstest]
    #[case("")]
    #[case("B12")]
    #[case("100")]
    #[case("Sheet2!A1")]
    #[case(" =A1")]
    fn non_formulas_have_no_references(#[case] text: &str) {
        assert!(extract_references(text, "Sheet1", &sheets(&["Sheet1", "Sheet2"])).is_empty());
    }

    #[rstest]
    #[case("=SUM(1,2)")]
    #[case("=100")]
    #[case("=TODAY()")]
    #[case("=\"hello\"&\"world\"")]
    fn formulas_without_cell_tokens_are_empty(#[case] formula: &str) {
        assert!(extract_references(formula, "Sheet1", &sheets(&["Sheet1"])).is_empty());
    }

    #[test]
    fn bare_reference_resolves_to_current_sheet() {
        assert_eq!(
            extract_references("=B12", "Sheet1", &sheets(&["Sheet1"])),
            refs(&[("Sheet1", "B12")])
        );
    }

    #[test]
    fn mixes_cross_sheet_and_same_sheet() {
        assert_eq!(
            extract_references("=Sheet2!A1+B2", "Sheet1", &sheets(&["Sheet1", "Sheet2"])),
            refs(&[("Sheet2", "A1"), ("Sheet1", "B2")])
        );
    }

    #[test]
    fn quoted_range_contributes_boundaries_only() {
        assert_eq!(
            extract_references("='My Sheet'!A1:A5", "Sheet1", &sheets(&["Sheet1", "My Sheet"])),
            refs(&[("My Sheet", "A1"), ("My Sheet", "A5")])
        );
    }

    #[test]
    fn string_literals_are_not_references() {
        let found = extract_references(
            "=VLOOKUP(\"A1\",Sheet2!A:B,2)",
            "Sheet1",
            &sheets(&["Sheet1", "Sheet2"]),
        );
        assert!(!found.contains(&CellAddress::new("Sheet1", "A1")));
        assert!(found.is_empty());
    }

    #[test]
    fn unknown_sheets_are_dropped() {
        assert!(extract_references("=UnknownSheet!A1", "Sheet1", &sheets(&["Sheet1"])).is_empty());
    }

    #[test]
    fn unknown_sheet_match_is_still_stripped_before_same_sheet_pass() {
        // `A1` belongs to the unknown sheet, so it must not leak onto Sheet1.
        assert_eq!(
            extract_references("=Other!A1+C3", "Sheet1", &sheets(&["Sheet1"])),
            refs(&[("Sheet1", "C3")])
        );
    }

    #[test]
    fn anchors_are_stripped() {
        let known = sheets(&["Sheet1", "Inputs"]);
        assert_eq!(
            extract_references("=$B$12", "Sheet1", &known),
            extract_references("=B12", "Sheet1", &known)
        );
        assert_eq!(
            extract_references("=Inputs!$C$4:C$9*$D5", "Sheet1", &known),
            refs(&[("Inputs", "C4"), ("Inputs", "C9"), ("Sheet1", "D5")])
        );
    }

    #[test]
    fn repeated_references_are_deduplicated() {
        assert_eq!(
            extract_references("=A1+A1*$A$1+Calc!B2+Calc!$B$2", "Sheet1", &sheets(&["Sheet1", "Calc"])),
            refs(&[("Sheet1", "A1"), ("Calc", "B2")])
        );
    }

    #[test]
    fn cross_sheet_reference_is_counted_once() {
        assert_eq!(
            extract_references("=Sheet1!A1+Sheet1!B1", "Sheet1", &sheets(&["Sheet1"])),
            refs(&[("Sheet1", "A1"), ("Sheet1", "B1")])
        );
    }

    #[test]
    fn identifiers_are_not_split_into_references() {
        let found = extract_references("=ABC123X+RATE_2024+SUM(C2)", "Sheet1", &sheets(&["Sheet1"]));
        assert_eq!(found, refs(&[("Sheet1", "C2")]));
    }

    #[test]
    fn function_names_shaped_like_cells_are_taken_as_references() {
        // LOG10 is also a valid column/row pair; the token grammar cannot tell them apart.
        let found = extract_references("=LOG10(5)", "Sheet1", &sheets(&["Sheet1"]));
        assert_eq!(found, refs(&[("Sheet1", "LOG10")]));
    }

    #[test]
    fn unquoted_names_with_punctuation_and_spaces() {
        let known = sheets(&["Sheet1", "P&L", "Calc_Revenue", "Rev.2"]);
        assert_eq!(
            extract_references("=P&L!B4 + Calc_Revenue!C10-Rev.2!A1", "Sheet1", &known),
            refs(&[("P&L", "B4"), ("Calc_Revenue", "C10"), ("Rev.2", "A1")])
        );
    }

    #[test]
    fn quoted_names_with_punctuation() {
        let known = sheets(&["Sheet1", "Debt (Senior)", "Tax - Calc"]);
        assert_eq!(
            extract_references("=SUM('Debt (Senior)'!E5:E20)-'Tax - Calc'!$F$3", "Sheet1", &known),
            refs(&[
                ("Debt (Senior)", "E5"),
                ("Debt (Senior)", "E20"),
                ("Tax - Calc", "F3"),
            ])
        );
    }

    #[test]
    fn nested_functions_and_same_sheet_ranges() {
        let found = extract_references(
            "=IF(AND($C$2>0,D7<>\"\"),SUM(E7:H7)/COUNT(E7:H7),0)",
            "Calc",
            &sheets(&["Calc"]),
        );
        assert_eq!(
            found,
            refs(&[("Calc", "C2"), ("Calc", "D7"), ("Calc", "E7"), ("Calc", "H7")])
        );
    }

    #[test]
    fn stages_are_individually_observable() {
        let parser = ReferenceParser::new().unwrap();
        let known = sheets(&["Sheet1", "Sheet2"]);
        let formula = "=Sheet2!A1&\"B7\"&C3";

        assert_eq!(parser.cross_sheet_pass(formula, &known), refs(&[("Sheet2", "A1")]));

        let residue = parser.strip_for_same_sheet(formula);
        assert!(!residue.contains("Sheet2"));
        assert!(!residue.contains("B7"));

        assert_eq!(parser.same_sheet_pass(&residue, "Sheet1"), refs(&[("Sheet1", "C3")]));
    }

    proptest! {
        #[test]
        fn extraction_is_idempotent(formula in "=[A-Z0-9$:!+*(),\" ]{0,40}") {
            let known = sheets(&["Sheet1", "A"]);
            let first = extract_references(&formula, "Sheet1", &known);
            let second = extract_references(&formula, "Sheet1", &known);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn anchors_never_change_identity(col in "[A-Z]{1,3}", row in 1u32..1_048_576) {
            let known = sheets(&["Sheet1"]);
            let plain = extract_references(&format!("={col}{row}"), "Sheet1", &known);
            let anchored = extract_references(&format!("=${col}${row}"), "Sheet1", &known);
            prop_assert_eq!(&plain, &anchored);
            prop_assert_eq!(plain.len(), 1);
        }

        #[test]
        fn never_panics_on_arbitrary_text(text in ".{0,64}") {
            let known = sheets(&["Sheet1", "My Sheet"]);
            let _ = extract_references(&format!("={text}"), "Sheet1", &known);
        }
    }
}
