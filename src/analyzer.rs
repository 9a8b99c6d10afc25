use crate::{
    audit::{group_findings, Auditor, Finding, Priority},
    config::{Config, TraceConfig},
    dependency_graph::{DependencyAnalysis, DependencyGraph, GraphBuilder},
    discovery::{WorkbookDiscovery, WorkbookFile},
    labels::WorkbookLabels,
    loader::load_workbook,
    maps::ModelMaps,
    roles::KeywordRoles,
    workbook::Workbook,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct Analyzer {
    config: Config,
    discovery: WorkbookDiscovery,
    auditor: Auditor,
    parallel: bool,
}

impl Analyzer {
    pub fn new(config: Config) -> Result<Self> {
        let discovery = WorkbookDiscovery::new(
            config.discovery.file_extensions.clone(),
            config.discovery.max_file_size,
        );
        let auditor = Auditor::new(config.audit.clone())?;

        Ok(Self {
            config,
            discovery,
            auditor,
            parallel: false,
        })
    }

    /// Build the dependency graph with one rayon task per sheet.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn discover(&self, target: &Path) -> Result<Vec<WorkbookFile>> {
        self.discovery.discover(target)
    }

    pub fn analyze_file(&self, path: &Path) -> Result<ModelAnalysis> {
        let workbook = load_workbook(path)
            .with_context(|| format!("failed to load workbook {}", path.display()))?;
        self.analyze_workbook(path.to_path_buf(), workbook)
    }

    /// Graph, labels and audit for an already loaded workbook.
    pub fn analyze_workbook(&self, source: PathBuf, workbook: Workbook) -> Result<ModelAnalysis> {
        let builder = GraphBuilder::new(self.config.scan.bounds());
        let graph = if self.parallel {
            builder.build_graph_parallel(&workbook)?
        } else {
            builder.build_graph(&workbook)?
        };
        let graph_analysis = graph.analyze();

        let labels = WorkbookLabels::build(
            &workbook,
            self.config.scan.label_max_row,
            self.config.scan.label_max_col,
        );

        let findings = group_findings(self.auditor.audit(&workbook, &labels));
        info!(
            workbook = %source.display(),
            targets = graph.len(),
            findings = findings.len(),
            "analysis complete"
        );

        Ok(ModelAnalysis {
            source,
            workbook,
            graph,
            graph_analysis,
            labels,
            roles: self.config.roles.policy(),
            trace: self.config.trace.clone(),
            findings,
        })
    }
}

/// Everything produced for one workbook.
#[derive(Debug)]
pub struct ModelAnalysis {
    pub source: PathBuf,
    pub workbook: Workbook,
    pub graph: DependencyGraph,
    pub graph_analysis: DependencyAnalysis,
    pub labels: WorkbookLabels,
    pub roles: KeywordRoles,
    pub trace: TraceConfig,
    /// Grouped and sorted.
    pub findings: Vec<Finding>,
}

impl ModelAnalysis {
    pub fn maps(&self) -> ModelMaps<'_> {
        ModelMaps::new(&self.workbook, &self.graph, &self.labels, &self.roles)
    }

    pub fn print_summary(&self) {
        println!("\n📋 Workbook Summary:");
        println!("  Workbook: {}", self.source.display());
        println!("  Sheets: {}", self.workbook.sheets().len());
        println!("  Formulas: {}", self.workbook.formula_count());

        let hidden = self.workbook.sheets().iter().filter(|s| !s.is_visible()).count();
        if hidden > 0 {
            println!("  Hidden sheets: {}", hidden);
        }

        println!();
        self.graph_analysis.print_summary();

        let count = |priority: Priority| self.findings.iter().filter(|f| f.priority == priority).count();
        println!("\n🔎 Audit Findings: {}", self.findings.len());
        println!("  High: {}", count(Priority::High));
        println!("  Medium: {}", count(Priority::Medium));
        println!("  Low: {}", count(Priority::Low));
    }
}
