//! Markdown and Mermaid renderings of the dependency graph.
//!
//! All renderers are pure: they return the document text and leave writing
//! files to the [`crate::reporter::Reporter`].

use crate::cell::CellAddress;
use crate::config::TraceConfig;
use crate::dependency_graph::{DependencyGraph, PrecedentTrace};
use crate::labels::{section_index, RowLabelResolver, WorkbookLabels};
use crate::roles::RolePolicy;
use crate::workbook::Workbook;
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub const MAPS_DIR: &str = "Maps";
pub const REGISTER_FILE: &str = "Flow_Dependency_Register.md";
pub const WORKBOOK_MAP_FILE: &str = "Flow_L1_Workbook.mermaid";
pub const CRITICAL_PATH_FILE: &str = "Flow_L3_Critical_Path.mermaid";
pub const MODEL_SUMMARY_FILE: &str = "01_Model_Summary.md";

/// Mermaid node id for arbitrary sheet or cell text.
pub fn mermaid_id(text: &str) -> String {
    text.replace('&', "and")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// File name of a sheet's L2 map, without extension.
pub fn sheet_map_stem(sheet: &str) -> String {
    format!("Flow_L2_{}", sheet.replace(' ', "_"))
}

/// The first `limit` distinct labels joined by commas, and how many were
/// left out.
fn summarize_labels<'a>(labels: impl IntoIterator<Item = &'a str>, limit: usize) -> (String, usize) {
    let mut seen = Vec::new();
    for label in labels {
        if !seen.contains(&label) {
            seen.push(label);
        }
    }
    let hidden = seen.len().saturating_sub(limit);
    (seen.into_iter().take(limit).collect::<Vec<_>>().join(", "), hidden)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOutput {
    pub cell: CellAddress,
    pub label: String,
}

pub struct ModelMaps<'a> {
    workbook: &'a Workbook,
    graph: &'a DependencyGraph,
    labels: &'a WorkbookLabels,
    roles: &'a dyn RolePolicy,
}

impl<'a> ModelMaps<'a> {
    pub fn new(
        workbook: &'a Workbook,
        graph: &'a DependencyGraph,
        labels: &'a WorkbookLabels,
        roles: &'a dyn RolePolicy,
    ) -> Self {
        Self {
            workbook,
            graph,
            labels,
            roles,
        }
    }

    fn row_label(&self, cell: &CellAddress) -> Option<&'a str> {
        self.labels.label(cell.sheet(), cell.row()?)
    }

    /// Every cross-sheet link, one row per distinct
    /// (source sheet, source label, target sheet, target label).
    pub fn dependency_register(&self) -> String {
        let mut md = String::from("# Flow Dependency Register\n\n");
        md.push_str("| # | Source Sheet | Source Cell | Source Row Label | Target Sheet | Target Cell | Target Row Label | Reference Type |\n");
        md.push_str("|---|---|---|---|---|---|---|---|\n");

        let mut seen = HashSet::new();
        let mut count = 0;

        for (target, sources) in self.graph.iter() {
            if target.row().is_none() {
                continue;
            }
            let t_label = self.row_label(target).unwrap_or("");

            for source in sources.iter().filter(|s| s.sheet() != target.sheet()) {
                if source.row().is_none() {
                    continue;
                }
                let s_label = self.row_label(source).unwrap_or("");
                if !seen.insert((source.sheet(), s_label, target.sheet(), t_label)) {
                    continue;
                }

                let kind = if self.workbook.is_formula(source) { "LINK" } else { "INPUT" };
                count += 1;
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
                    count,
                    source.sheet(),
                    source.cell(),
                    s_label,
                    target.sheet(),
                    target.cell(),
                    t_label,
                    kind
                ));
            }
        }

        md
    }

    /// Sheets grouped by role, linked by the labels of the rows that cross
    /// between them.
    pub fn workbook_map(&self) -> String {
        let mut lines = vec!["flowchart LR".to_string(), String::new()];

        let mut roles: Vec<(&str, Vec<&str>)> = Vec::new();
        for sheet in self.workbook.sheets() {
            let role = self.roles.classify(sheet.name());
            match roles.iter_mut().find(|(r, _)| *r == role) {
                Some((_, sheets)) => sheets.push(sheet.name()),
                None => roles.push((role, vec![sheet.name()])),
            }
        }

        for (role, sheets) in &roles {
            lines.push(format!("    subgraph sg_{}[\"{}\"]", mermaid_id(role), role));
            for name in sheets {
                let hidden = self
                    .workbook
                    .sheet(name)
                    .is_some_and(|s| !s.is_visible());
                let label = if hidden {
                    format!("{} (hidden)", name)
                } else {
                    name.to_string()
                };
                lines.push(format!("        {}[\"{}\"]", mermaid_id(name), label));
            }
            lines.push("    end".to_string());
        }

        for ((src, dst), cells) in self.graph.sheet_links() {
            let labels: BTreeSet<&str> = cells.iter().filter_map(|c| self.row_label(c)).collect();
            if labels.is_empty() {
                continue;
            }
            let (mut text, hidden) = summarize_labels(labels, 3);
            if hidden > 0 {
                text.push_str(&format!(" (+{} more)", hidden));
            }
            lines.push(format!(
                "    {} -- \"{}\" --> {}",
                mermaid_id(&src),
                text,
                mermaid_id(&dst)
            ));
        }

        lines.join("\n")
    }

    /// Sections of one sheet with their inbound and outbound neighbours.
    pub fn sheet_map(&self, sheet: &str) -> String {
        let sections = self.labels.sections(sheet);
        let base = mermaid_id(sheet);
        let section_id = |idx: usize| format!("sect_{}_{}", base, idx);

        let mut lines = vec!["flowchart TD".to_string(), String::new()];
        lines.push(format!("    subgraph sg_{}[\"{}\"]", base, sheet));
        for (i, section) in sections.iter().enumerate() {
            lines.push(format!("        {}[\"{}\"]", section_id(i), section.label));
        }
        lines.push("    end".to_string());

        let mut ext_in: BTreeMap<&str, BTreeSet<(&str, usize)>> = BTreeMap::new();
        let mut ext_out: BTreeMap<&str, BTreeSet<(&str, usize)>> = BTreeMap::new();
        let mut internal: BTreeMap<(usize, usize), BTreeSet<&str>> = BTreeMap::new();

        for (target, sources) in self.graph.iter() {
            let Some(t_row) = target.row() else { continue };
            let t_section = section_index(sections, t_row);

            for source in sources {
                let Some(s_row) = source.row() else { continue };
                let s_label = self.row_label(source).unwrap_or("Data");

                if target.sheet() == sheet {
                    if source.sheet() != sheet {
                        ext_in.entry(source.sheet()).or_default().insert((s_label, t_section));
                    } else {
                        let s_section = section_index(sections, s_row);
                        if s_section != t_section {
                            internal.entry((s_section, t_section)).or_default().insert(s_label);
                        }
                    }
                } else if source.sheet() == sheet {
                    let s_section = section_index(sections, s_row);
                    ext_out.entry(target.sheet()).or_default().insert((s_label, s_section));
                }
            }
        }

        for (ext_sheet, connections) in &ext_in {
            let ext_id = format!("ext_in_{}", mermaid_id(ext_sheet));
            lines.push(format!("    {}([\"{}\"])", ext_id, ext_sheet));
            for (idx, labels) in by_section(connections) {
                lines.push(format!("    {} -- \"{}\" --> {}", ext_id, edge_text(labels), section_id(idx)));
            }
        }

        for ((src, dst), labels) in &internal {
            let text = edge_text(labels.iter().copied().collect());
            lines.push(format!("    {} -- \"{}\" --> {}", section_id(*src), text, section_id(*dst)));
        }

        for (ext_sheet, connections) in &ext_out {
            let ext_id = format!("ext_out_{}", mermaid_id(ext_sheet));
            lines.push(format!("    {}([\"{}\"])", ext_id, ext_sheet));
            for (idx, labels) in by_section(connections) {
                lines.push(format!("    {} -- \"{}\" --> {}", section_id(idx), edge_text(labels), ext_id));
            }
        }

        lines.join("\n")
    }

    /// Rows on the configured output sheets whose label names a headline
    /// metric, anchored on the first formula in the configured columns.
    pub fn key_outputs(&self, trace: &TraceConfig) -> Vec<KeyOutput> {
        let mut outputs = Vec::new();

        for sheet_name in &trace.output_sheets {
            let (Some(sheet), Some(labels)) = (
                self.workbook.sheet(sheet_name),
                self.labels.sheet(sheet_name),
            ) else {
                continue;
            };

            for (row, label) in labels.labels.iter() {
                let upper = label.to_uppercase();
                if !trace.output_labels.iter().any(|k| upper.contains(k.to_uppercase().as_str())) {
                    continue;
                }
                if let Some(&col) = trace.value_columns.iter().find(|&&col| sheet.is_formula(row, col)) {
                    outputs.push(KeyOutput {
                        cell: CellAddress::from_position(sheet_name.as_str(), row, col),
                        label: label.to_string(),
                    });
                }
            }
        }

        outputs.truncate(trace.max_roots);
        outputs
    }

    pub fn trace_key_outputs(&self, trace: &TraceConfig) -> PrecedentTrace {
        let roots: Vec<CellAddress> = self
            .key_outputs(trace)
            .into_iter()
            .map(|output| output.cell)
            .collect();
        self.graph
            .trace_precedents(&roots, trace.max_depth, |cell| self.workbook.is_formula(cell))
    }

    pub fn critical_path(&self, trace: &TraceConfig) -> String {
        let mut lines = vec![
            "flowchart LR".to_string(),
            String::new(),
            "    classDef input fill:#E8F5E9,stroke:#2E7D32".to_string(),
            "    classDef shared fill:#FFD700,stroke:#333".to_string(),
            "    classDef output fill:#E3F2FD,stroke:#1565C0".to_string(),
            String::new(),
        ];

        let traced = self.trace_key_outputs(trace);
        let node_id = |cell: &CellAddress| mermaid_id(&format!("{}_{}", cell.sheet(), cell.cell()));

        let mut nodes: Vec<(String, String, &'static str)> = traced
            .nodes
            .iter()
            .map(|(cell, node)| {
                let label = self
                    .row_label(cell)
                    .map(str::to_string)
                    .unwrap_or_else(|| cell.to_string())
                    .replace('"', "'");
                let style = if node.is_output {
                    ":::output"
                } else if node.is_input {
                    ":::input"
                } else {
                    ""
                };
                (node_id(cell), label, style)
            })
            .collect();
        nodes.sort();

        for (id, label, style) in nodes {
            lines.push(format!("    {}[\"{}\"]{}", id, label, style));
        }

        let edges: BTreeSet<(String, String)> = traced
            .edges
            .iter()
            .map(|(source, target)| (node_id(source), node_id(target)))
            .collect();
        for (source, target) in edges {
            lines.push(format!("    {} --> {}", source, target));
        }

        lines.join("\n")
    }

    pub fn timeline_sheet(&self) -> Option<&'a str> {
        self.workbook
            .sheets()
            .iter()
            .map(|s| s.name())
            .find(|name| {
                let lowered = name.to_lowercase();
                ["time", "date", "timing"].iter().any(|k| lowered.contains(k))
            })
    }

    pub fn model_summary(&self) -> String {
        let mut md = String::from("# 01 Model Summary\n\n");
        md.push_str("## 1. Purpose\n");
        md.push_str("Automated summary of the financial model.\n\n");

        md.push_str("## 2. Model Structure\n");
        md.push_str("| Sheet Name | Role | Visibility | Formulas |\n");
        md.push_str("|---|---|---|---|\n");
        for sheet in self.workbook.sheets() {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                sheet.name(),
                self.roles.classify(sheet.name()),
                if sheet.is_visible() { "Visible" } else { "Hidden" },
                sheet.formulas().count()
            ));
        }
        md.push('\n');

        md.push_str("## 3. Timeline\n");
        match self.timeline_sheet() {
            Some(name) => md.push_str(&format!("Timeline detected in sheet: {}\n", name)),
            None => md.push_str("No explicit timeline sheet detected.\n"),
        }

        md
    }
}

fn by_section<'s>(connections: &BTreeSet<(&'s str, usize)>) -> BTreeMap<usize, Vec<&'s str>> {
    let mut grouped: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for (label, idx) in connections {
        grouped.entry(*idx).or_default().push(*label);
    }
    grouped
}

fn edge_text(labels: Vec<&str>) -> String {
    let (mut text, hidden) = summarize_labels(labels, 2);
    if hidden > 0 {
        text.push_str("...");
    }
    text
}
