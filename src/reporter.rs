use crate::{
    analyzer::ModelAnalysis,
    audit::{Agent, Finding, Priority},
    dependency_graph::DependencyAnalysis,
    discovery::WorkbookFile,
    maps::{self, CRITICAL_PATH_FILE, MAPS_DIR, MODEL_SUMMARY_FILE, REGISTER_FILE, WORKBOOK_MAP_FILE},
    roles::RolePolicy,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

pub const JSON_REPORT_FILE: &str = "analysis_report.json";
pub const AUDIT_REPORT_FILE: &str = "Audit Report.md";

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    Json,
    Markdown,
    #[default]
    All,
}

impl ReportFormat {
    fn json(self) -> bool {
        matches!(self, ReportFormat::Json | ReportFormat::All)
    }

    fn markdown(self) -> bool {
        matches!(self, ReportFormat::Markdown | ReportFormat::All)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub graph_metrics: DependencyAnalysis,
    pub sheets: Vec<SheetSummary>,
    pub key_outputs: Vec<String>,
    pub findings_summary: FindingsSummary,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub workbook: String,
    pub sheet_count: usize,
    pub formula_count: usize,
    pub analysis_duration_ms: u128,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SheetSummary {
    pub name: String,
    pub role: String,
    pub visible: bool,
    pub formulas: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FindingsSummary {
    pub total: usize,
    pub by_priority: BTreeMap<String, usize>,
    pub by_agent: BTreeMap<String, usize>,
}

pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_report(&self, analysis: &ModelAnalysis, duration_ms: u128) -> Report {
        let maps = analysis.maps();

        Report {
            metadata: ReportMetadata {
                generated_at: chrono::Utc::now().to_rfc3339(),
                workbook: analysis.source.display().to_string(),
                sheet_count: analysis.workbook.sheets().len(),
                formula_count: analysis.workbook.formula_count(),
                analysis_duration_ms: duration_ms,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            graph_metrics: analysis.graph_analysis.clone(),
            sheets: analysis
                .workbook
                .sheets()
                .iter()
                .map(|sheet| SheetSummary {
                    name: sheet.name().to_string(),
                    role: analysis.roles.classify(sheet.name()).to_string(),
                    visible: sheet.is_visible(),
                    formulas: sheet.formulas().count(),
                })
                .collect(),
            key_outputs: maps
                .key_outputs(&analysis.trace)
                .into_iter()
                .map(|output| format!("{} ({})", output.cell, output.label))
                .collect(),
            findings_summary: summarize_findings(&analysis.findings),
            findings: analysis.findings.clone(),
        }
    }

    /// Write the requested formats into `output_dir`; maps go to its `Maps/`
    /// sub-directory. Returns every file written.
    pub fn export_report(
        &self,
        report: &Report,
        analysis: &ModelAnalysis,
        output_dir: &Path,
        format: ReportFormat,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("failed to create {}", output_dir.display()))?;
        let mut exported_files = Vec::new();

        if format.json() {
            let json_path = output_dir.join(JSON_REPORT_FILE);
            let json_content = serde_json::to_string_pretty(report)?;
            write_file(&json_path, &json_content)?;
            exported_files.push(json_path);
        }

        if format.markdown() {
            let audit_path = output_dir.join(AUDIT_REPORT_FILE);
            write_file(&audit_path, &self.generate_audit_report(&report.findings))?;
            exported_files.push(audit_path);

            let maps = analysis.maps();

            let summary_path = output_dir.join(MODEL_SUMMARY_FILE);
            write_file(&summary_path, &maps.model_summary())?;
            exported_files.push(summary_path);

            let maps_dir = output_dir.join(MAPS_DIR);
            fs::create_dir_all(&maps_dir)
                .with_context(|| format!("failed to create {}", maps_dir.display()))?;

            let mut documents = vec![
                (REGISTER_FILE.to_string(), maps.dependency_register()),
                (WORKBOOK_MAP_FILE.to_string(), maps.workbook_map()),
            ];
            let sheets = analysis.workbook.sheets();
            let stems = unique_names(sheets.iter().map(|s| maps::sheet_map_stem(s.name())));
            for (sheet, stem) in sheets.iter().zip(stems) {
                documents.push((format!("{}.mermaid", stem), maps.sheet_map(sheet.name())));
            }
            documents.push((CRITICAL_PATH_FILE.to_string(), maps.critical_path(&analysis.trace)));

            for (name, content) in documents {
                let path = maps_dir.join(name);
                write_file(&path, &content)?;
                exported_files.push(path);
            }
        }

        info!(files = exported_files.len(), dir = %output_dir.display(), "reports exported");
        Ok(exported_files)
    }

    /// One table per agent, agents in alphabetical order.
    pub fn generate_audit_report(&self, findings: &[Finding]) -> String {
        let mut by_agent: BTreeMap<String, Vec<&Finding>> = BTreeMap::new();
        for finding in findings {
            by_agent.entry(finding.agent.to_string()).or_default().push(finding);
        }

        let headers = [
            "Sheet Name",
            "Cell Reference",
            "Description of the Location",
            "Priority",
            "Short Error Category",
            "Long Description of Error",
        ];

        let mut md = String::from("# Audit Report 📊\n\n");
        md.push_str("This report is divided into sections based on the check family that identified the findings.\n\n");

        if findings.is_empty() {
            md.push_str("No findings.\n");
            return md;
        }

        for (agent, rows) in by_agent {
            md.push_str(&format!("## {} Report\n\n", agent));
            md.push_str(&format!("| {} |\n", headers.join(" | ")));
            md.push_str(&format!("|{}|\n", vec!["---"; headers.len()].join("|")));

            for finding in rows {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {} |\n",
                    finding.sheet,
                    finding.cell_reference,
                    finding.description,
                    priority_badge(finding.priority),
                    finding.category,
                    finding.long_description
                ));
            }
            md.push('\n');
        }

        md
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Output directory per workbook: `root` itself for a single workbook,
/// otherwise one sub-directory per file stem.
pub fn workbook_output_dirs(files: &[WorkbookFile], root: &Path) -> Vec<PathBuf> {
    if files.len() <= 1 {
        return vec![root.to_path_buf(); files.len()];
    }
    let stems = files.iter().map(|file| {
        file.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workbook".to_string())
    });
    unique_names(stems).into_iter().map(|stem| root.join(stem)).collect()
}

/// Suffix `_2`, `_3`, ... onto repeated names. Comparison ignores case so
/// the results stay distinct on case-insensitive file systems.
pub fn unique_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut used = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut n = 2;
            while !used.insert(candidate.to_lowercase()) {
                candidate = format!("{}_{}", name, n);
                n += 1;
            }
            candidate
        })
        .collect()
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

pub fn priority_badge(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "🔴 HIGH",
        Priority::Medium => "⚠️ MEDIUM",
        Priority::Low => "🟡 LOW",
    }
}

fn summarize_findings(findings: &[Finding]) -> FindingsSummary {
    let mut summary = FindingsSummary {
        total: findings.len(),
        ..Default::default()
    };
    for finding in findings {
        *summary.by_priority.entry(finding.priority.to_string()).or_insert(0) += 1;
        *summary.by_agent.entry(finding.agent.to_string()).or_insert(0) += 1;
    }
    summary
}

impl FindingsSummary {
    pub fn count(&self, agent: Agent) -> usize {
        self.by_agent.get(&agent.to_string()).copied().unwrap_or(0)
    }
}
