//! Formula-quality checks.
//!
//! Each check family reports as an [`Agent`]:
//!
//! - **Sentry**: calculation errors, broken `#REF!` references and defined
//!   names that point at `#REF!`
//! - **Efficiency**: volatile functions and overlong formulas
//! - **Logic**: hard-coded literals, pattern breaks along a row, and sanity
//!   checks on labelled rows
//! - **Hyperlinks**: `HYPERLINK()` formulas pointing at missing sheets or
//!   placeholder URLs

use crate::cell::{coordinate, group_into_ranges, split_coordinate};
use crate::config::AuditConfig;
use crate::labels::RowLabelResolver;
use crate::r1c1::a1_to_r1c1;
use crate::workbook::{CellValue, DefinedName, Sheet, Workbook};
use anyhow::Result;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Sheet name reported for findings about workbook-level names.
pub const NAME_MANAGER: &str = "Name Manager";

const ERROR_VALUES: &[&str] = &[
    "#REF!", "#VALUE!", "#DIV/0!", "#N/A", "#NAME?", "#NULL!", "#NUM!", "#SPILL!", "#CALC!",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Agent {
    Sentry,
    Efficiency,
    Logic,
    Hyperlinks,
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub sheet: String,
    /// A single cell, or comma-separated ranges once grouped.
    pub cell_reference: String,
    pub description: String,
    pub category: String,
    pub long_description: String,
    pub priority: Priority,
    pub agent: Agent,
}

impl Finding {
    fn new(
        sheet: &str,
        cell_reference: impl Into<String>,
        description: impl Into<String>,
        category: &str,
        long_description: impl Into<String>,
        priority: Priority,
        agent: Agent,
    ) -> Self {
        Self {
            sheet: sheet.to_string(),
            cell_reference: cell_reference.into(),
            description: description.into(),
            category: category.to_string(),
            long_description: long_description.into(),
            priority,
            agent,
        }
    }
}

pub struct Auditor {
    config: AuditConfig,
    string_literal: Regex,
    numeric_literal: Regex,
    hyperlink: Regex,
}

impl Auditor {
    pub fn new(config: AuditConfig) -> Result<Self> {
        Ok(Self {
            config,
            string_literal: Regex::new(r#""[^"]*""#)?,
            numeric_literal: Regex::new(r"\b(?:[0-9]+\.[0-9]+|[2-9][0-9]+|[0-9]{2,})\b")?,
            hyperlink: Regex::new(r#"(?i)HYPERLINK\("([^"]+)""#)?,
        })
    }

    /// Run every check on every sheet. Sheets are audited in parallel; the
    /// result keeps workbook order.
    pub fn audit<L>(&self, workbook: &Workbook, labels: &L) -> Vec<Finding>
    where
        L: RowLabelResolver + Sync,
    {
        let known = workbook.sheet_set();
        let per_sheet: Vec<Vec<Finding>> = workbook
            .sheets()
            .par_iter()
            .map(|sheet| self.audit_sheet(sheet, &known, labels))
            .collect();

        let mut findings: Vec<Finding> = per_sheet.into_iter().flatten().collect();
        findings.extend(self.check_defined_names(workbook.defined_names()));
        findings
    }

    /// Names whose target no longer exists.
    pub fn check_defined_names(&self, names: &[DefinedName]) -> Vec<Finding> {
        names
            .iter()
            .filter(|defined| defined.refers_to.to_uppercase().contains("#REF!"))
            .map(|defined| {
                Finding::new(
                    NAME_MANAGER,
                    "N/A",
                    format!("Named Range: {}", defined.name),
                    "Dead Name",
                    format!("Named range {} points to #REF!: {}", defined.name, defined.refers_to),
                    Priority::High,
                    Agent::Sentry,
                )
            })
            .collect()
    }

    pub fn audit_sheet<L>(&self, sheet: &Sheet, known: &HashSet<String>, labels: &L) -> Vec<Finding>
    where
        L: RowLabelResolver + ?Sized,
    {
        let mut findings = Vec::new();

        self.check_calculation_errors(sheet, &mut findings);
        self.check_formulas(sheet, &mut findings);
        self.check_hyperlinks(sheet, known, &mut findings);

        if self.config.skip_sheets.iter().any(|s| s == sheet.name()) {
            debug!(sheet = sheet.name(), "logic checks skipped");
        } else {
            self.check_hard_codes(sheet, &mut findings);
            self.check_pattern_breaks(sheet, &mut findings);
            self.check_sanity(sheet, labels, &mut findings);
        }

        debug!(sheet = sheet.name(), findings = findings.len(), "audited sheet");
        findings
    }

    fn check_calculation_errors(&self, sheet: &Sheet, findings: &mut Vec<Finding>) {
        for ((row, col), value) in sheet.values() {
            let code = match value {
                CellValue::Error(code) | CellValue::Text(code) => code.as_str(),
                _ => continue,
            };
            if ERROR_VALUES.contains(&code) {
                findings.push(Finding::new(
                    sheet.name(),
                    coordinate(row, col),
                    "Calculation Error",
                    "Calculation Error",
                    format!("Cell contains error {}. Check source data and formula logic to resolve the calculation error.", code),
                    Priority::High,
                    Agent::Sentry,
                ));
            }
        }
    }

    /// Broken references, volatile functions and formula length.
    fn check_formulas(&self, sheet: &Sheet, findings: &mut Vec<Finding>) {
        for ((row, col), formula) in sheet.formulas() {
            let cell = coordinate(row, col);
            let upper = formula.to_uppercase();

            if upper.contains("#REF!") {
                findings.push(Finding::new(
                    sheet.name(),
                    &cell,
                    "Broken Reference",
                    "Broken Reference",
                    "Formula refers to #REF!, usually left behind by a deleted row, column or sheet. Repoint the formula to a valid source.",
                    Priority::High,
                    Agent::Sentry,
                ));
            }

            for function in &self.config.volatile_functions {
                if upper.contains(function.to_uppercase().as_str()) {
                    let name = function.trim_end_matches(|c: char| c == '(' || c == ')');
                    findings.push(Finding::new(
                        sheet.name(),
                        &cell,
                        format!("Volatile Function: {}", name),
                        "Volatile Complexity",
                        format!("Use of volatile function {} detected. Volatile functions recalculate every time any cell in the workbook changes, which can slow down large models. Consider replacing with INDEX/MATCH if possible.", name),
                        Priority::Medium,
                        Agent::Efficiency,
                    ));
                }
            }

            let length = formula.chars().count();
            if length > self.config.mega_formula_length {
                findings.push(Finding::new(
                    sheet.name(),
                    &cell,
                    "Mega-Formula (Bad Practice)",
                    "Mega-Formula",
                    format!("Extremely long formula detected (>{} chars). This is a critical auditability risk. Break the calculation into multiple modular steps using helper rows.", self.config.mega_formula_length),
                    Priority::High,
                    Agent::Efficiency,
                ));
                if !sheet.value(row, col).is_some_and(CellValue::is_error) {
                    findings.push(Finding::new(
                        sheet.name(),
                        &cell,
                        "Deep Logic Check",
                        "Auditability Risk",
                        "Mega-formula is technically functioning (no calculation error detected), but its complexity makes it an extreme auditability risk. It should be broken out for transparency.",
                        Priority::Medium,
                        Agent::Efficiency,
                    ));
                }
            } else if length > self.config.long_formula_length {
                findings.push(Finding::new(
                    sheet.name(),
                    &cell,
                    "Long Formula",
                    "Auditability Risk",
                    format!("Formula exceeds {} characters. While not a mega-formula, it still poses an auditability risk. Consider breaking it down into smaller components.", self.config.long_formula_length),
                    Priority::Medium,
                    Agent::Efficiency,
                ));
            }
        }
    }

    fn check_hard_codes(&self, sheet: &Sheet, findings: &mut Vec<Finding>) {
        for ((row, col), formula) in sheet.formulas() {
            if !self.hard_coded_literals(formula).is_empty() {
                findings.push(Finding::new(
                    sheet.name(),
                    coordinate(row, col),
                    "Hard-coded literal",
                    "Hard-Code in Formula",
                    "Formula contains one or more hard-coded literals. Literals should be moved to an assumptions sheet and referenced by cell to ensure model flexibility and transparency.",
                    Priority::Medium,
                    Agent::Logic,
                ));
            }
        }
    }

    /// Numeric literals outside string literals and cell references that are
    /// not on the allowed list.
    pub fn hard_coded_literals<'f>(&self, formula: &'f str) -> Vec<&'f str> {
        // Blank string literals in place so byte offsets still index `formula`.
        let masked = self
            .string_literal
            .replace_all(formula, |caps: &regex::Captures| " ".repeat(caps[0].len()));
        let bytes = masked.as_bytes();

        let mut literals = Vec::new();
        let mut pos = 0;
        while let Some(m) = self.numeric_literal.find_at(&masked, pos) {
            let anchored = m.start() > 0 && matches!(bytes[m.start() - 1], b'A'..=b'Z' | b'$');
            if anchored {
                pos = m.start() + 1;
                continue;
            }
            let literal = &formula[m.range()];
            if !self.config.allowed_literals.iter().any(|a| a == literal) {
                literals.push(literal);
            }
            pos = m.end();
        }
        literals
    }

    fn check_pattern_breaks(&self, sheet: &Sheet, findings: &mut Vec<Finding>) {
        let rows: HashSet<u32> = sheet.formulas().map(|((row, _), _)| row).collect();
        let mut rows: Vec<u32> = rows.into_iter().collect();
        rows.sort_unstable();

        for row in rows {
            let normalized: Vec<(u32, String)> = sheet
                .row_formulas(row)
                .map(|(col, formula)| (col, a1_to_r1c1(formula, row, col)))
                .collect();
            if normalized.len() <= self.config.pattern_min_formulas {
                continue;
            }

            let Some(dominant) = dominant_pattern(normalized.iter().map(|(_, f)| f.as_str())) else {
                continue;
            };

            for (col, pattern) in &normalized {
                if pattern != dominant && *col >= self.config.pattern_first_column {
                    findings.push(Finding::new(
                        sheet.name(),
                        coordinate(row, *col),
                        "Formula row",
                        "Formula Pattern Break",
                        "Formula differs from the dominant pattern in this row. Inconsistent formulas within a row can lead to calculation errors and make the model harder to audit. Standardize the formula across the row.",
                        Priority::Medium,
                        Agent::Logic,
                    ));
                }
            }
        }
    }

    fn check_sanity<L>(&self, sheet: &Sheet, labels: &L, findings: &mut Vec<Finding>)
    where
        L: RowLabelResolver + ?Sized,
    {
        let rows: HashSet<u32> = sheet.values().map(|((row, _), _)| row).collect();
        let mut rows: Vec<u32> = rows.into_iter().collect();
        rows.sort_unstable();

        for row in rows {
            let Some(label) = labels.label(sheet.name(), row) else {
                continue;
            };
            let lowered = label.to_lowercase();
            let metric = if lowered.contains("dscr") {
                "DSCR"
            } else if lowered.contains("revenue") {
                "Revenue"
            } else {
                continue;
            };

            for (col, value) in sheet.row_values(row) {
                if value.as_number().is_some_and(|n| n < 0.0) {
                    findings.push(Finding::new(
                        sheet.name(),
                        coordinate(row, col),
                        format!("Label: {}", label),
                        "Sanity Check Failure",
                        format!("Negative {} detected. {} values should typically be positive. Review the calculation and source data for logic errors.", metric, metric),
                        Priority::High,
                        Agent::Logic,
                    ));
                }
            }
        }
    }

    fn check_hyperlinks(&self, sheet: &Sheet, known: &HashSet<String>, findings: &mut Vec<Finding>) {
        for ((row, col), formula) in sheet.formulas() {
            let Some(caps) = self.hyperlink.captures(formula) else {
                continue;
            };
            let target = &caps[1];
            let cell = coordinate(row, col);

            if let Some(location) = target.strip_prefix('#') {
                let Some((target_sheet, _)) = location.split_once('!') else {
                    continue;
                };
                let target_sheet = target_sheet.trim_matches('\'');
                if !known.contains(target_sheet) {
                    findings.push(Finding::new(
                        sheet.name(),
                        cell,
                        format!("HYPERLINK formula to {}", target),
                        "Broken Link - Missing Sheet",
                        format!("HYPERLINK formula references sheet '{}' which does not exist. Update the formula to reference a valid sheet.", target_sheet),
                        Priority::High,
                        Agent::Hyperlinks,
                    ));
                }
            } else if self
                .config
                .placeholder_markers
                .iter()
                .any(|marker| target.contains(marker.as_str()))
            {
                findings.push(Finding::new(
                    sheet.name(),
                    cell,
                    format!("HYPERLINK formula to {}", target),
                    "Placeholder URL",
                    "External URL in formula contains obvious placeholder text. Update with the correct destination URL.",
                    Priority::Low,
                    Agent::Hyperlinks,
                ));
            }
        }
    }
}

/// Most frequent pattern; ties go to the one seen first. `None` when every
/// pattern is identical.
fn dominant_pattern<'a>(patterns: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for pattern in patterns {
        match counts.iter_mut().find(|(p, _)| *p == pattern) {
            Some((_, n)) => *n += 1,
            None => counts.push((pattern, 1)),
        }
    }
    if counts.len() < 2 {
        return None;
    }
    let best = counts.iter().map(|(_, n)| *n).max()?;
    counts.into_iter().find(|(_, n)| *n == best).map(|(p, _)| p)
}

/// Merge findings that share sheet, category and long description, collapse
/// their cells into rectangular ranges, and sort by sheet, priority and
/// category.
pub fn group_findings(findings: Vec<Finding>) -> Vec<Finding> {
    let mut order: Vec<(String, String, String)> = Vec::new();
    let mut groups: HashMap<(String, String, String), (Finding, Vec<String>)> = HashMap::new();

    for finding in findings {
        let key = (
            finding.sheet.clone(),
            finding.category.clone(),
            finding.long_description.clone(),
        );
        let cells: Vec<String> = finding
            .cell_reference
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        match groups.get_mut(&key) {
            Some((_, existing)) => existing.extend(cells),
            None => {
                order.push(key.clone());
                groups.insert(key, (finding, cells));
            }
        }
    }

    let mut grouped: Vec<Finding> = order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .map(|(mut finding, cells)| {
            finding.cell_reference = merge_cell_references(&cells);
            finding
        })
        .collect();

    grouped.sort_by(|a, b| {
        a.sheet
            .cmp(&b.sheet)
            .then(a.priority.cmp(&b.priority))
            .then_with(|| a.category.cmp(&b.category))
    });
    grouped
}

/// Cell coordinates collapse into ranges; anything else (such as `N/A` for
/// name-manager findings) is kept once, after the ranges.
fn merge_cell_references(cells: &[String]) -> String {
    let (coords, others): (Vec<&String>, Vec<&String>) =
        cells.iter().partition(|c| split_coordinate(c).is_some());

    let mut parts = Vec::new();
    let ranges = group_into_ranges(&coords);
    if !ranges.is_empty() {
        parts.push(ranges);
    }
    for other in others {
        if !parts.contains(other) {
            parts.push(other.clone());
        }
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::WorkbookLabels;
    use pretty_assertions::assert_eq;

    fn auditor() -> Auditor {
        Auditor::new(AuditConfig::default()).unwrap()
    }

    fn run(workbook: &Workbook) -> Vec<Finding> {
        let labels = WorkbookLabels::build(workbook, 500, 5);
        auditor().audit(workbook, &labels)
    }

    fn categories(findings: &[Finding]) -> Vec<(&str, &str)> {
        findings
            .iter()
            .map(|f| (f.cell_reference.as_str(), f.category.as_str()))
            .collect()
    }

    #[test]
    fn calculation_errors_and_broken_references() {
        let wb = Workbook::new().with_sheet(
            Sheet::new("Calc")
                .with_formula("B2", "=A2/0")
                .with_value("B2", CellValue::Error("#DIV/0!".into()))
                .with_formula("B3", "=#REF!+1"),
        );
        let findings = run(&wb);
        assert_eq!(
            categories(&findings),
            vec![("B2", "Calculation Error"), ("B3", "Broken Reference")]
        );
        assert!(findings.iter().all(|f| f.agent == Agent::Sentry && f.priority == Priority::High));
    }

    #[test]
    fn volatile_functions_are_reported_by_name() {
        let wb = Workbook::new().with_sheet(
            Sheet::new("Calc")
                .with_formula("A1", "=offset(B1,1,0)")
                .with_formula("A2", "=RANDBETWEEN(A1,A3)")
                .with_formula("A3", "=TODAY()"),
        );
        let descriptions: Vec<String> = run(&wb).into_iter().map(|f| f.description).collect();
        assert_eq!(
            descriptions,
            vec![
                "Volatile Function: OFFSET",
                "Volatile Function: RANDBETWEEN",
                "Volatile Function: TODAY",
            ]
        );
    }

    #[test]
    fn formula_length_thresholds() {
        let long = format!("={}", "A1+".repeat(200) + "A1");
        let mega = format!("={}", "A1+".repeat(1400) + "A1");
        let wb = Workbook::new().with_sheet(
            Sheet::new("Calc")
                .with_formula("B1", &long)
                .with_formula("B2", &mega),
        );
        let findings = run(&wb);
        assert_eq!(
            categories(&findings),
            vec![
                ("B1", "Auditability Risk"),
                ("B2", "Mega-Formula"),
                ("B2", "Auditability Risk"),
            ]
        );
        assert_eq!(findings[1].priority, Priority::High);
    }

    #[rstest::rstest]
    #[case("=A1*1.5", vec!["1.5"])]
    #[case("=A1*12+B1*365", vec![])]
    #[case("=A1*250", vec!["250"])]
    #[case("=$A$100+A10", vec![])]
    #[case("=IF(A1=\"2024\",7,0)", vec![])]
    #[case("=ROUND(A1,3)*10", vec!["10"])]
    fn hard_coded_literals(#[case] formula: &str, #[case] expected: Vec<&str>) {
        assert_eq!(auditor().hard_coded_literals(formula), expected);
    }

    #[test]
    fn pattern_breaks_are_reported_from_column_i() {
        let mut sheet = Sheet::new("Calc");
        // D5..K5 copy `=previous column + 1`; J5 breaks the pattern.
        for col in 4..=11 {
            let formula = if col == 10 {
                "=$B$1".to_string()
            } else {
                format!("={}5+1", crate::cell::column_letters(col - 1))
            };
            sheet.set_formula(5, col, &formula);
        }
        // A short row with a different formula is never checked.
        sheet.set_formula(6, 10, "=A6");

        let wb = Workbook::new().with_sheet(sheet);
        let breaks: Vec<Finding> = run(&wb)
            .into_iter()
            .filter(|f| f.category == "Formula Pattern Break")
            .collect();
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].cell_reference, "J5");
    }

    #[test]
    fn negative_values_on_labelled_rows_fail_sanity() {
        let wb = Workbook::new().with_sheet(
            Sheet::new("Debt")
                .with_value("A2", CellValue::Text("Minimum DSCR".into()))
                .with_value("D2", CellValue::Number(-0.4))
                .with_value("E2", CellValue::Number(1.3))
                .with_value("A3", CellValue::Text("Revenue".into()))
                .with_value("D3", CellValue::Number(-10.0))
                .with_value("A4", CellValue::Text("Opex".into()))
                .with_value("D4", CellValue::Number(-10.0)),
        );
        let findings = run(&wb);
        assert_eq!(
            categories(&findings),
            vec![("D2", "Sanity Check Failure"), ("D3", "Sanity Check Failure")]
        );
        assert_eq!(findings[0].description, "Label: Minimum DSCR");
    }

    #[test]
    fn skipped_sheets_get_no_logic_checks() {
        let config = AuditConfig {
            skip_sheets: vec!["Legacy".into()],
            ..AuditConfig::default()
        };
        let wb = Workbook::new().with_sheet(Sheet::new("Legacy").with_formula("A1", "=B1*250"));
        let labels = WorkbookLabels::build(&wb, 500, 5);
        assert!(Auditor::new(config).unwrap().audit(&wb, &labels).is_empty());
    }

    #[test]
    fn hyperlink_targets() {
        let wb = Workbook::new()
            .with_sheet(
                Sheet::new("Cover")
                    .with_formula("B2", "=HYPERLINK(\"#'Old Inputs'!A1\",\"Inputs\")")
                    .with_formula("B3", "=HYPERLINK(\"#Cover!A1\",\"Top\")")
                    .with_formula("B4", "=hyperlink(\"https://example.com/docs\",\"Docs\")"),
            );
        let findings = run(&wb);
        assert_eq!(
            categories(&findings),
            vec![("B2", "Broken Link - Missing Sheet"), ("B4", "Placeholder URL")]
        );
        assert!(findings[0].long_description.contains("'Old Inputs'"));
        assert_eq!(findings[1].priority, Priority::Low);
    }

    #[test]
    fn grouping_merges_cells_into_ranges_and_sorts() {
        let finding = |sheet: &str, cell: &str, category: &str, priority: Priority| {
            Finding::new(sheet, cell, "d", category, "same", priority, Agent::Logic)
        };
        let grouped = group_findings(vec![
            finding("Calc", "A1", "Hard-Code in Formula", Priority::Medium),
            finding("Calc", "B1", "Hard-Code in Formula", Priority::Medium),
            finding("Calc", "A2, B2", "Hard-Code in Formula", Priority::Medium),
            finding("Calc", "D9", "Sanity Check Failure", Priority::High),
            finding("Assumptions", "C3", "Hard-Code in Formula", Priority::Medium),
        ]);

        let rows: Vec<(&str, &str, &str)> = grouped
            .iter()
            .map(|f| (f.sheet.as_str(), f.cell_reference.as_str(), f.category.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Assumptions", "C3", "Hard-Code in Formula"),
                ("Calc", "D9", "Sanity Check Failure"),
                ("Calc", "A1:B2", "Hard-Code in Formula"),
            ]
        );
    }

    #[test]
    fn names_pointing_at_ref_errors_are_dead() {
        let wb = Workbook::new()
            .with_sheet(Sheet::new("Inputs").with_value("B2", CellValue::Number(0.1)))
            .with_defined_name("TaxRate", "Inputs!$B$2")
            .with_defined_name("OldGrowth", "#REF!$C$4")
            .with_defined_name("Lookup", "Inputs!#ref!");

        let findings = run(&wb);
        let rows: Vec<(&str, &str, &str)> = findings
            .iter()
            .map(|f| (f.sheet.as_str(), f.cell_reference.as_str(), f.description.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                (NAME_MANAGER, "N/A", "Named Range: OldGrowth"),
                (NAME_MANAGER, "N/A", "Named Range: Lookup"),
            ]
        );
        assert!(findings.iter().all(|f| f.category == "Dead Name"
            && f.agent == Agent::Sentry
            && f.priority == Priority::High));
        assert_eq!(
            findings[0].long_description,
            "Named range OldGrowth points to #REF!: #REF!$C$4"
        );
    }

    #[test]
    fn grouping_keeps_references_that_are_not_cells() {
        let dead = |name: &str| {
            Finding::new(NAME_MANAGER, "N/A", name, "Dead Name", "same", Priority::High, Agent::Sentry)
        };
        let grouped = group_findings(vec![dead("A"), dead("B")]);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].cell_reference, "N/A");

        assert_eq!(
            merge_cell_references(&["B1".into(), "N/A".into(), "A1".into()]),
            "A1:B1, N/A"
        );
    }

    #[test]
    fn dominant_pattern_prefers_the_first_of_equal_counts() {
        assert_eq!(dominant_pattern(["a", "b", "b", "a"].into_iter()), Some("a"));
        assert_eq!(dominant_pattern(["a", "a"].into_iter()), None);
    }
}
