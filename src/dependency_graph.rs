use crate::cell::CellAddress;
use crate::error::SnapshotError;
use crate::reference_parser::extract_references;
use crate::workbook::{ScanBounds, WorkbookSnapshot};
use petgraph::{algo::tarjan_scc, graph::NodeIndex, Directed, Graph};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

static NO_SOURCES: BTreeSet<CellAddress> = BTreeSet::new();

/// Formula cell → the cells it reads from.
///
/// Only cells that held a formula with at least one resolvable reference
/// appear as targets. Iteration is ordered by target (sheet, column, row).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    edges: BTreeMap<CellAddress, BTreeSet<CellAddress>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, target: CellAddress, source: CellAddress) {
        self.edges.entry(target).or_default().insert(source);
    }

    pub fn sources_of(&self, target: &CellAddress) -> &BTreeSet<CellAddress> {
        self.edges.get(target).unwrap_or(&NO_SOURCES)
    }

    /// Formula cells that read `source` directly.
    pub fn dependents_of(&self, source: &CellAddress) -> BTreeSet<&CellAddress> {
        self.edges
            .iter()
            .filter(|(_, sources)| sources.contains(source))
            .map(|(target, _)| target)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellAddress, &BTreeSet<CellAddress>)> {
        self.edges.iter()
    }

    pub fn targets(&self) -> impl Iterator<Item = &CellAddress> {
        self.edges.keys()
    }

    pub fn contains_target(&self, target: &CellAddress) -> bool {
        self.edges.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Set-union merge of another graph into this one.
    pub fn merge(&mut self, other: DependencyGraph) {
        for (target, sources) in other.edges {
            self.edges.entry(target).or_default().extend(sources);
        }
    }

    /// Source cells grouped by `(source sheet, target sheet)` for every edge
    /// that crosses a sheet boundary.
    pub fn sheet_links(&self) -> BTreeMap<(String, String), BTreeSet<CellAddress>> {
        let mut links: BTreeMap<(String, String), BTreeSet<CellAddress>> = BTreeMap::new();
        for (target, sources) in &self.edges {
            for source in sources.iter().filter(|s| s.sheet() != target.sheet()) {
                links
                    .entry((source.sheet().to_string(), target.sheet().to_string()))
                    .or_default()
                    .insert(source.clone());
            }
        }
        links
    }

    /// Groups of cells that reference each other in a cycle, including
    /// cells that reference themselves.
    pub fn circular_references(&self) -> Vec<Vec<CellAddress>> {
        let mut graph: Graph<&CellAddress, (), Directed> = Graph::new();
        let mut node_map: HashMap<&CellAddress, NodeIndex> = HashMap::new();

        for (target, sources) in &self.edges {
            let t = *node_map
                .entry(target)
                .or_insert_with(|| graph.add_node(target));
            for source in sources {
                let s = *node_map
                    .entry(source)
                    .or_insert_with(|| graph.add_node(source));
                graph.add_edge(t, s, ());
            }
        }

        let mut cycles: Vec<Vec<CellAddress>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || graph.contains_edge(component[0], component[0])
            })
            .map(|component| {
                let mut cells: Vec<CellAddress> =
                    component.into_iter().map(|idx| graph[idx].clone()).collect();
                cells.sort();
                cells
            })
            .collect();
        cycles.sort();
        cycles
    }

    pub fn analyze(&self) -> DependencyAnalysis {
        let total_targets = self.len();
        let total_edges = self.edge_count();
        let cross_sheet_edges = self
            .edges
            .iter()
            .map(|(t, sources)| sources.iter().filter(|s| s.sheet() != t.sheet()).count())
            .sum();
        let leaf_inputs = self
            .edges
            .values()
            .flatten()
            .filter(|s| !self.edges.contains_key(*s))
            .collect::<HashSet<_>>()
            .len();

        let mut per_sheet: BTreeMap<String, usize> = BTreeMap::new();
        for target in self.edges.keys() {
            *per_sheet.entry(target.sheet().to_string()).or_insert(0) += 1;
        }

        DependencyAnalysis {
            total_targets,
            total_edges,
            cross_sheet_edges,
            leaf_inputs,
            avg_fan_in: if total_targets > 0 {
                total_edges as f64 / total_targets as f64
            } else {
                0.0
            },
            targets_per_sheet: per_sheet,
            circular_references: self.circular_references(),
        }
    }

    /// Walk precedents backwards from `roots`.
    ///
    /// A cell is an input when it has no recorded sources or `is_formula`
    /// says it holds no formula; inputs are not expanded. Cells deeper than
    /// `max_depth` and cells already visited are not expanded either.
    pub fn trace_precedents<F>(
        &self,
        roots: &[CellAddress],
        max_depth: usize,
        is_formula: F,
    ) -> PrecedentTrace
    where
        F: Fn(&CellAddress) -> bool,
    {
        let mut trace = PrecedentTrace::default();
        let mut visited = HashSet::new();
        for root in roots {
            self.trace_from(root, 0, max_depth, &is_formula, &mut visited, &mut trace);
        }
        trace
    }

    fn trace_from<F>(
        &self,
        target: &CellAddress,
        depth: usize,
        max_depth: usize,
        is_formula: &F,
        visited: &mut HashSet<CellAddress>,
        trace: &mut PrecedentTrace,
    ) where
        F: Fn(&CellAddress) -> bool,
    {
        if depth > max_depth || !visited.insert(target.clone()) {
            return;
        }

        let is_input = |cell: &CellAddress| self.sources_of(cell).is_empty() || !is_formula(cell);

        trace.mark(target, depth == 0, is_input(target));

        for source in self.sources_of(target) {
            let source_is_input = is_input(source);
            trace.mark(source, false, source_is_input);
            trace.edges.insert((source.clone(), target.clone()));
            if !source_is_input {
                self.trace_from(source, depth + 1, max_depth, is_formula, visited, trace);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceNode {
    pub is_output: bool,
    pub is_input: bool,
}

/// Result of [`DependencyGraph::trace_precedents`]. Edges run source → target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecedentTrace {
    pub nodes: BTreeMap<CellAddress, TraceNode>,
    pub edges: BTreeSet<(CellAddress, CellAddress)>,
}

impl PrecedentTrace {
    fn mark(&mut self, cell: &CellAddress, is_output: bool, is_input: bool) {
        let node = self.nodes.entry(cell.clone()).or_default();
        node.is_output |= is_output;
        node.is_input = is_input;
    }
}

/// Scans a snapshot and accumulates the dependency graph.
pub struct GraphBuilder {
    bounds: ScanBounds,
}

impl GraphBuilder {
    pub fn new(bounds: ScanBounds) -> Self {
        Self { bounds }
    }

    /// Rebuild the graph from every formula cell inside the scan window.
    pub fn build_graph<S>(&self, snapshot: &S) -> Result<DependencyGraph, SnapshotError>
    where
        S: WorkbookSnapshot + ?Sized,
    {
        let sheet_names = snapshot.sheet_names();
        let known: HashSet<String> = sheet_names.iter().cloned().collect();

        let mut graph = DependencyGraph::new();
        for sheet in &sheet_names {
            graph.merge(self.scan_sheet(snapshot, sheet, &known)?);
        }

        info!(
            targets = graph.len(),
            edges = graph.edge_count(),
            "dependency graph built"
        );
        Ok(graph)
    }

    /// Same result as [`GraphBuilder::build_graph`], with one rayon task per sheet.
    pub fn build_graph_parallel<S>(&self, snapshot: &S) -> Result<DependencyGraph, SnapshotError>
    where
        S: WorkbookSnapshot + Sync + ?Sized,
    {
        let sheet_names = snapshot.sheet_names();
        let known: HashSet<String> = sheet_names.iter().cloned().collect();

        let partials: Result<Vec<DependencyGraph>, SnapshotError> = sheet_names
            .par_iter()
            .map(|sheet| self.scan_sheet(snapshot, sheet, &known))
            .collect();

        let graph = partials?
            .into_iter()
            .fold(DependencyGraph::new(), |mut acc, partial| {
                acc.merge(partial);
                acc
            });

        info!(
            targets = graph.len(),
            edges = graph.edge_count(),
            "dependency graph built in parallel"
        );
        Ok(graph)
    }

    fn scan_sheet<S>(
        &self,
        snapshot: &S,
        sheet: &str,
        known: &HashSet<String>,
    ) -> Result<DependencyGraph, SnapshotError>
    where
        S: WorkbookSnapshot + ?Sized,
    {
        let mut graph = DependencyGraph::new();
        let mut formulas = 0usize;

        for cell in snapshot.formula_cells(sheet, self.bounds)? {
            let Some(formula) = cell.formula_text else {
                continue;
            };
            formulas += 1;
            for source in extract_references(formula, sheet, known) {
                graph.add_edge(cell.address.clone(), source);
            }
        }

        debug!(sheet, formulas, targets = graph.len(), "scanned sheet");
        Ok(graph)
    }
}

/// Build a dependency graph with the given scan window.
pub fn build_graph<S>(snapshot: &S, bounds: ScanBounds) -> Result<DependencyGraph, SnapshotError>
where
    S: WorkbookSnapshot + ?Sized,
{
    GraphBuilder::new(bounds).build_graph(snapshot)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyAnalysis {
    pub total_targets: usize,
    pub total_edges: usize,
    pub cross_sheet_edges: usize,
    pub leaf_inputs: usize,
    pub avg_fan_in: f64,
    pub targets_per_sheet: BTreeMap<String, usize>,
    pub circular_references: Vec<Vec<CellAddress>>,
}

impl DependencyAnalysis {
    pub fn print_summary(&self) {
        println!("Dependency Graph Analysis:");
        println!("  Formula cells with references: {}", self.total_targets);
        println!("  Total edges: {}", self.total_edges);
        println!("  Cross-sheet edges: {}", self.cross_sheet_edges);
        println!("  Leaf inputs: {}", self.leaf_inputs);
        println!("  Average fan-in: {:.2}", self.avg_fan_in);

        println!("  Formula cells per sheet:");
        for (sheet, count) in &self.targets_per_sheet {
            println!("    {}: {}", sheet, count);
        }

        if !self.circular_references.is_empty() {
            println!("  Circular references: {}", self.circular_references.len());
            for cycle in &self.circular_references {
                let cells: Vec<String> = cycle.iter().map(|c| c.to_string()).collect();
                println!("    {}", cells.join(" -> "));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::{CellValue, FormulaCell, Sheet, Workbook};
    use pretty_assertions::assert_eq;

    fn addr(sheet: &str, cell: &str) -> CellAddress {
        CellAddress::new(sheet, cell)
    }

    fn set(cells: &[(&str, &str)]) -> BTreeSet<CellAddress> {
        cells.iter().map(|(s, c)| addr(s, c)).collect()
    }

    fn model() -> Workbook {
        Workbook::new()
            .with_sheet(
                Sheet::new("Inputs")
                    .with_value("B2", CellValue::Number(100.0))
                    .with_value("B3", CellValue::Number(0.2)),
            )
            .with_sheet(
                Sheet::new("Calc")
                    .with_formula("C2", "=Inputs!B2*(1+Inputs!$B$3)")
                    .with_formula("C3", "=C2*2")
                    .with_formula("C4", "=SUM(C2:C3)")
                    .with_formula("C5", "=100"),
            )
            .with_sheet(Sheet::new("Summary").with_formula("D5", "=Calc!C4"))
    }

    #[test]
    fn snapshot_without_formulas_builds_empty_graph() {
        let wb = Workbook::new().with_sheet(Sheet::new("Sheet1").with_value("A1", CellValue::Number(1.0)));
        let graph = build_graph(&wb, ScanBounds::default()).unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn records_sources_of_a_formula_cell() {
        let wb = Workbook::new().with_sheet(Sheet::new("Sheet1").with_formula("C3", "=Sheet1!A1+Sheet1!B1"));
        let graph = build_graph(&wb, ScanBounds::default()).unwrap();
        assert_eq!(
            graph.sources_of(&addr("Sheet1", "C3")),
            &set(&[("Sheet1", "A1"), ("Sheet1", "B1")])
        );
        assert!(graph.sources_of(&addr("Sheet1", "A1")).is_empty());
    }

    #[test]
    fn only_formula_cells_with_references_become_targets() {
        let graph = build_graph(&model(), ScanBounds::default()).unwrap();
        let targets: Vec<String> = graph.targets().map(|t| t.to_string()).collect();
        assert_eq!(targets, vec!["Calc!C2", "Calc!C3", "Calc!C4", "Summary!D5"]);
        assert_eq!(graph.sources_of(&addr("Calc", "C4")), &set(&[("Calc", "C2"), ("Calc", "C3")]));
    }

    #[test]
    fn scan_window_limits_targets() {
        let wb = Workbook::new().with_sheet(
            Sheet::new("S")
                .with_formula("A1", "=B1")
                .with_formula("A301", "=B1")
                .with_formula("P1", "=B1"),
        );
        let graph = build_graph(&wb, ScanBounds::default()).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.contains_target(&addr("S", "A1")));

        let full = build_graph(&wb, ScanBounds::unbounded()).unwrap();
        assert_eq!(full.len(), 3);
    }

    #[test]
    fn builds_are_deterministic_and_parallel_matches_sequential() {
        let wb = model();
        let builder = GraphBuilder::new(ScanBounds::default());
        let first = builder.build_graph(&wb).unwrap();
        let second = builder.build_graph(&wb).unwrap();
        let parallel = builder.build_graph_parallel(&wb).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, parallel);
    }

    #[test]
    fn building_does_not_mutate_the_snapshot() {
        let wb = model();
        let before = wb.clone();
        let _ = build_graph(&wb, ScanBounds::default()).unwrap();
        assert_eq!(wb, before);
    }

    struct FailingSnapshot;

    impl WorkbookSnapshot for FailingSnapshot {
        fn sheet_names(&self) -> Vec<String> {
            vec!["Broken".to_string()]
        }

        fn formula_cells(&self, sheet: &str, _bounds: ScanBounds) -> Result<Vec<FormulaCell<'_>>, SnapshotError> {
            Err(SnapshotError::Unreadable {
                sheet: sheet.to_string(),
                reason: "corrupt".to_string(),
            })
        }
    }

    #[test]
    fn snapshot_failures_propagate() {
        let err = build_graph(&FailingSnapshot, ScanBounds::default()).unwrap_err();
        assert!(matches!(err, SnapshotError::Unreadable { ref sheet, .. } if sheet == "Broken"));

        let err = GraphBuilder::new(ScanBounds::default())
            .build_graph_parallel(&FailingSnapshot)
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Unreadable { .. }));
    }

    #[test]
    fn dependents_and_sheet_links() {
        let graph = build_graph(&model(), ScanBounds::default()).unwrap();
        let dependents: Vec<String> = graph
            .dependents_of(&addr("Calc", "C2"))
            .into_iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(dependents, vec!["Calc!C3", "Calc!C4"]);

        let links = graph.sheet_links();
        let keys: Vec<(String, String)> = links.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                ("Calc".to_string(), "Summary".to_string()),
                ("Inputs".to_string(), "Calc".to_string()),
            ]
        );
        assert_eq!(
            links[&("Inputs".to_string(), "Calc".to_string())],
            set(&[("Inputs", "B2"), ("Inputs", "B3")])
        );
    }

    #[test]
    fn merge_is_set_union() {
        let mut a = DependencyGraph::new();
        a.add_edge(addr("S", "A1"), addr("S", "B1"));
        let mut b = DependencyGraph::new();
        b.add_edge(addr("S", "A1"), addr("S", "B1"));
        b.add_edge(addr("S", "A1"), addr("S", "C1"));
        b.add_edge(addr("S", "A2"), addr("S", "C1"));
        a.merge(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.edge_count(), 3);
    }

    #[test]
    fn detects_circular_references() {
        let wb = Workbook::new().with_sheet(
            Sheet::new("S")
                .with_formula("A1", "=B1+1")
                .with_formula("B1", "=C1")
                .with_formula("C1", "=A1")
                .with_formula("D1", "=D1")
                .with_formula("E1", "=A1"),
        );
        let graph = build_graph(&wb, ScanBounds::default()).unwrap();
        let cycles = graph.circular_references();
        assert_eq!(
            cycles,
            vec![
                vec![addr("S", "A1"), addr("S", "B1"), addr("S", "C1")],
                vec![addr("S", "D1")],
            ]
        );
    }

    #[test]
    fn analysis_counts() {
        let analysis = build_graph(&model(), ScanBounds::default()).unwrap().analyze();
        assert_eq!(analysis.total_targets, 4);
        assert_eq!(analysis.total_edges, 6);
        assert_eq!(analysis.cross_sheet_edges, 3);
        assert_eq!(analysis.leaf_inputs, 2);
        assert_eq!(analysis.targets_per_sheet["Calc"], 3);
        assert!(analysis.circular_references.is_empty());
        assert!((analysis.avg_fan_in - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn traces_precedents_from_outputs_to_inputs() {
        let wb = model();
        let graph = build_graph(&wb, ScanBounds::default()).unwrap();
        let trace = graph.trace_precedents(&[addr("Summary", "D5")], 3, |c| wb.is_formula(c));

        assert!(trace.nodes[&addr("Summary", "D5")].is_output);
        assert!(trace.nodes[&addr("Inputs", "B2")].is_input);
        assert!(!trace.nodes[&addr("Calc", "C2")].is_input);
        assert!(trace.edges.contains(&(addr("Calc", "C4"), addr("Summary", "D5"))));
        assert!(trace.edges.contains(&(addr("Inputs", "B3"), addr("Calc", "C2"))));
        assert_eq!(trace.nodes.len(), 6);
    }

    #[test]
    fn trace_depth_is_bounded() {
        let wb = model();
        let graph = build_graph(&wb, ScanBounds::default()).unwrap();
        let trace = graph.trace_precedents(&[addr("Summary", "D5")], 0, |c| wb.is_formula(c));
        // Only the root is expanded: its direct source is recorded but not walked.
        assert_eq!(trace.nodes.len(), 2);
        assert_eq!(trace.edges.len(), 1);
    }
}
