use clap::{Parser, Subcommand};
use model_cartographer::reporter::workbook_output_dirs;
use model_cartographer::{extract_references, Analyzer, Config, ReportFormat, Reporter};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "model-cartographer")]
#[command(about = "Maps formula dependencies and audits formula quality in spreadsheet financial models")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a workbook, or every workbook under a directory
    Analyze {
        /// Workbook file or directory to analyze
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for reports
        #[arg(short, long, default_value = "./cartographer-output")]
        output: PathBuf,

        /// Generate only specific report format
        #[arg(long, value_enum)]
        format: Option<ReportFormat>,

        /// Scan sheets in parallel while building the dependency graph
        #[arg(long)]
        parallel: bool,
    },
    /// Print the cells a single formula reads from
    Refs {
        /// Formula text, including the leading '='
        formula: String,

        /// Sheet the formula lives on
        #[arg(short, long, default_value = "Sheet1")]
        sheet: String,

        /// Other sheet names present in the workbook
        #[arg(short, long, num_args = 1..)]
        known: Vec<String>,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the config file (defaults to ~/.model-cartographer.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Analyze {
            path,
            config,
            output,
            format,
            parallel,
        } => {
            analyze_models(&path, config, &output, format.unwrap_or_default(), parallel)?;
        }
        Commands::Refs {
            formula,
            sheet,
            known,
        } => {
            print_references(&formula, &sheet, known);
        }
        Commands::Config { output } => {
            generate_config(output)?;
        }
    }

    Ok(())
}

fn analyze_models(
    target_path: &Path,
    config_path: Option<PathBuf>,
    output_path: &Path,
    format: ReportFormat,
    parallel: bool,
) -> anyhow::Result<()> {
    println!("🚀 Starting Model Cartographer Analysis");
    println!("=======================================");

    let config = match config_path {
        Some(config_path) => Config::from_file(&config_path)?,
        None => Config::load()?,
    };

    println!("🎯 Target: {}", target_path.display());
    println!("📤 Output directory: {}", output_path.display());
    if parallel {
        println!("⚡ Parallel graph build enabled");
    }

    let analyzer = Analyzer::new(config)?.with_parallel(parallel);

    println!("\n🔍 Discovering workbooks...");
    let files = analyzer.discover(target_path)?;
    if files.is_empty() {
        anyhow::bail!("no workbooks found at {}", target_path.display());
    }
    println!("  Found {} workbook(s)", files.len());

    let reporter = Reporter::new();
    let mut exported_files = Vec::new();
    let start_time = Instant::now();

    let output_dirs = workbook_output_dirs(&files, output_path);

    for (file, output_dir) in files.iter().zip(output_dirs) {
        println!("\n📝 Analyzing {}...", file.path.display());
        let file_start = Instant::now();
        let analysis = analyzer.analyze_file(&file.path)?;
        let duration = file_start.elapsed();

        analysis.print_summary();

        println!("\n📊 Generating reports...");
        let report = reporter.generate_report(&analysis, duration.as_millis());
        exported_files.extend(reporter.export_report(&report, &analysis, &output_dir, format)?);
    }

    println!("\n✅ Analysis completed in {:.2}s", start_time.elapsed().as_secs_f64());
    println!("📁 Reports exported to:");
    for file in exported_files {
        println!("   - {}", file.display());
    }

    Ok(())
}

fn print_references(formula: &str, sheet: &str, known: Vec<String>) {
    let mut known: HashSet<String> = known.into_iter().collect();
    known.insert(sheet.to_string());

    let refs = extract_references(formula, sheet, &known);
    if refs.is_empty() {
        println!("No cell references found.");
        return;
    }
    for address in refs {
        println!("{}", address);
    }
}

fn generate_config(output_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = output_path.unwrap_or_else(|| {
        Config::default_config_path().unwrap_or_else(|_| PathBuf::from("model-cartographer.toml"))
    });

    println!("📝 Generating configuration file: {}", config_path.display());
    std::fs::write(&config_path, Config::create_documented_config())?;

    println!("✅ Configuration file created successfully!");
    println!("💡 Edit the file to customize your analysis settings.");
    println!();
    println!("🔧 Key configuration areas:");
    println!("  • Scan windows for formulas and row labels");
    println!("  • Audit thresholds, allowed literals and skipped sheets");
    println!("  • Sheet role keywords");
    println!("  • Key outputs traced on the critical-path map");

    Ok(())
}
