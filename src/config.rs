use crate::roles::{default_role_rules, KeywordRoles, RoleRule};
use crate::workbook::ScanBounds;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{env, path::Path, path::PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub scan: ScanConfig,
    pub audit: AuditConfig,
    pub roles: RoleConfig,
    pub trace: TraceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub file_extensions: Vec<String>,
    pub max_file_size: u64,
}

/// Windows scanned for graph edges and for row labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub max_rows: u32,
    pub max_cols: u32,
    pub label_max_row: u32,
    pub label_max_col: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub mega_formula_length: usize,
    pub long_formula_length: usize,
    /// A row is checked for pattern breaks when it has more formulas than this.
    pub pattern_min_formulas: usize,
    pub pattern_first_column: u32,
    pub allowed_literals: Vec<String>,
    pub volatile_functions: Vec<String>,
    /// Sheets excluded from the logic checks.
    pub skip_sheets: Vec<String>,
    pub placeholder_markers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    pub fallback: String,
    pub rules: Vec<RoleRule>,
}

/// Key outputs traced on the critical-path map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub output_sheets: Vec<String>,
    pub output_labels: Vec<String>,
    pub value_columns: Vec<u32>,
    pub max_depth: usize,
    pub max_roots: usize,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            file_extensions: strings(&["xlsx", "xlsm", "xlsb", "xls", "ods"]),
            max_file_size: 200 * 1024 * 1024, // 200MB
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        let bounds = ScanBounds::default();
        Self {
            max_rows: bounds.max_rows,
            max_cols: bounds.max_cols,
            label_max_row: 500,
            label_max_col: 5,
        }
    }
}

impl ScanConfig {
    pub fn bounds(&self) -> ScanBounds {
        ScanBounds {
            max_rows: self.max_rows,
            max_cols: self.max_cols,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            mega_formula_length: 4000,
            long_formula_length: 500,
            pattern_min_formulas: 5,
            pattern_first_column: 9,
            allowed_literals: strings(&["100", "12", "365", "52", "1", "0", "2", "4", "8000", "4000"]),
            volatile_functions: strings(&["OFFSET(", "INDIRECT(", "TODAY()", "NOW(", "RAND(", "RANDBETWEEN("]),
            skip_sheets: Vec::new(),
            placeholder_markers: strings(&["example.com"]),
        }
    }
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            fallback: "Other".to_string(),
            rules: default_role_rules(),
        }
    }
}

impl RoleConfig {
    pub fn policy(&self) -> KeywordRoles {
        KeywordRoles::new(self.rules.clone(), self.fallback.clone())
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            output_sheets: strings(&["KPIs", "Annual_Summary", "Summary"]),
            output_labels: strings(&["NET INCOME", "EBITDA", "IRR", "DSCR", "NPV", "CASH BALANCE"]),
            value_columns: vec![4, 5, 6],
            max_depth: 3,
            max_roots: 5,
        }
    }
}

impl Config {
    /// Get the default config file path (~/.model-cartographer.toml)
    pub fn default_config_path() -> crate::Result<PathBuf> {
        let home_dir = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(PathBuf::from(home_dir).join(".model-cartographer.toml"))
    }

    /// Load config from file, falling back to defaults if file doesn't exist
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            info!(path = %config_path.display(), "loading configuration");
            Self::from_file(&config_path)
        } else {
            info!(path = %config_path.display(), "no config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn to_file(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create a config file with all available options documented
    pub fn create_documented_config() -> String {
        r#"# Model Cartographer Configuration File
# Every key is optional; missing keys take the values shown here.

[discovery]
# Workbook extensions picked up when a directory is analyzed
file_extensions = ["xlsx", "xlsm", "xlsb", "xls", "ods"]

# Larger files are skipped (bytes, default 200MB)
max_file_size = 209715200

[scan]
# Window scanned for formula references on every sheet
max_rows = 300
max_cols = 15

# Window searched for row labels (leftmost text in each row)
label_max_row = 500
label_max_col = 5

[audit]
# Formulas longer than this are mega-formulas (High)
mega_formula_length = 4000

# Formulas longer than this are flagged as an auditability risk (Medium)
long_formula_length = 500

# Rows with more formulas than this are checked for pattern breaks,
# reported from this column onwards (9 = column I)
pattern_min_formulas = 5
pattern_first_column = 9

# Numeric literals that are not reported as hard-codes
allowed_literals = ["100", "12", "365", "52", "1", "0", "2", "4", "8000", "4000"]

volatile_functions = ["OFFSET(", "INDIRECT(", "TODAY()", "NOW(", "RAND(", "RANDBETWEEN("]

# Sheets excluded from the logic checks
skip_sheets = []

# External HYPERLINK targets containing any of these are placeholders
placeholder_markers = ["example.com"]

[roles]
# Sheet roles: the first rule with a keyword contained in the
# lower-cased sheet name wins
fallback = "Other"

[[roles.rules]]
role = "Cover / TOC"
keywords = ["cover", "toc", "index", "navigation"]

[[roles.rules]]
role = "Control / Scenario"
keywords = ["control", "scenario", "switch"]

[[roles.rules]]
role = "Inputs / Assumptions"
keywords = ["assumption", "input", "driver"]

[[roles.rules]]
role = "Timing"
keywords = ["timing", "timeline", "date"]

[[roles.rules]]
role = "Calculations"
keywords = ["calc", "revenue", "opex", "capex", "debt", "tax", "deprn"]

[[roles.rules]]
role = "Financial Statements"
keywords = ["p&l", "bs", "cfs", "is", "statement", "cashflow"]

[[roles.rules]]
role = "Outputs / Dashboard"
keywords = ["summary", "dashboard", "output", "kpi"]

[[roles.rules]]
role = "Checks"
keywords = ["check", "balance", "audit"]

[[roles.rules]]
role = "Data / Lookup"
keywords = ["data", "lookup", "table"]

[trace]
# Key outputs for the critical-path map: rows on these sheets whose label
# contains one of these keywords, first formula in these columns (4 = D)
output_sheets = ["KPIs", "Annual_Summary", "Summary"]
output_labels = ["NET INCOME", "EBITDA", "IRR", "DSCR", "NPV", "CASH BALANCE"]
value_columns = [4, 5, 6]

# Precedents deeper than this are not expanded
max_depth = 3

# At most this many key outputs are traced
max_roots = 5
"#
        .to_string()
    }
}
