//! indsql CLI - Inline indicator formulas into monitoring SQL
//!
//! Usage:
//!   indsql rewrite --indicators <inds.xml> <input.sql> [-o <output.sql>]
//!   indsql inline <input.sql> [-o <output.sql>]
//!   indsql expand --indicators <inds.xml> <code>...
//!   indsql list --indicators <inds.xml>
//!   indsql check --indicators <inds.xml>
//!
//! Examples:
//!   indsql rewrite --indicators indicators.xml queries.sql -o queries_out.sql
//!   indsql expand --indicators indicators.xml 1017 1020
//!   indsql check --indicators indicators.xml

use clap::{Parser, Subcommand, ValueEnum};
use indsql::batch::{inline_document, rewrite_document, BatchReport};
use indsql::config::Settings;
use indsql::expand::Expander;
use indsql::model::graph::DependencyGraph;
use indsql::model::{load_indicators, IndicatorIndex, IndicatorKind};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "indsql")]
#[command(about = "Inlines monitoring-indicator formulas and aggregation subqueries into SQL text")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite lookup call sites, expanding calculated-indicator formulas
    Rewrite {
        /// Path to the SQL document
        input: PathBuf,

        /// Path to the indicator metadata XML
        #[arg(short, long)]
        indicators: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Optional TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Diagnostics format (printed to stderr)
        #[arg(long, default_value = "text")]
        report: ReportFormat,
    },

    /// Replace direct lookup function calls with aggregation subqueries
    Inline {
        /// Path to the SQL document
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Optional TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Diagnostics format (printed to stderr)
        #[arg(long, default_value = "text")]
        report: ReportFormat,
    },

    /// Expand indicator codes to base-indicator formulas
    Expand {
        /// Indicator codes to expand
        codes: Vec<String>,

        /// Path to the indicator metadata XML
        #[arg(short, long)]
        indicators: PathBuf,

        /// Optional TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List indicators in a metadata file
    List {
        /// Path to the indicator metadata XML
        #[arg(short, long)]
        indicators: PathBuf,
    },

    /// Check the indicator dependency graph for cycles
    Check {
        /// Path to the indicator metadata XML
        #[arg(short, long)]
        indicators: PathBuf,

        /// Optional TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum ReportFormat {
    /// Human-readable diagnostics
    Text,
    /// JSON diagnostics
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Rewrite {
            input,
            indicators,
            output,
            config,
            report,
        } => cmd_rewrite(input, indicators, output, config, report),
        Commands::Inline {
            input,
            output,
            config,
            report,
        } => cmd_inline(input, output, config, report),
        Commands::Expand {
            codes,
            indicators,
            config,
        } => cmd_expand(codes, indicators, config),
        Commands::List { indicators } => cmd_list(indicators),
        Commands::Check { indicators, config } => cmd_check(indicators, config),
    }
}

fn load_settings(config: Option<PathBuf>) -> Result<Settings, ExitCode> {
    match config {
        Some(path) => Settings::load(&path).map_err(|e| {
            eprintln!("Error loading config: {}", e);
            ExitCode::FAILURE
        }),
        None => Ok(Settings::default()),
    }
}

fn load_index(path: &PathBuf) -> Result<IndicatorIndex, ExitCode> {
    load_indicators(path).map_err(|e| {
        eprintln!("Error loading indicators: {}", e);
        ExitCode::FAILURE
    })
}

fn read_sql(path: &PathBuf) -> Result<String, ExitCode> {
    fs::read_to_string(path).map_err(|e| {
        eprintln!("Error reading file '{}': {}", path.display(), e);
        ExitCode::FAILURE
    })
}

fn write_result(output: Option<PathBuf>, sql: &str) -> ExitCode {
    match output {
        Some(path) => match fs::write(&path, sql) {
            Ok(()) => {
                eprintln!("Wrote {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error writing file '{}': {}", path.display(), e);
                ExitCode::FAILURE
            }
        },
        None => {
            println!("{}", sql);
            ExitCode::SUCCESS
        }
    }
}

fn print_report(report: &BatchReport, format: ReportFormat) {
    match format {
        ReportFormat::Text => eprint!("{}", report),
        ReportFormat::Json => match serde_json::to_string_pretty(report) {
            Ok(json) => eprintln!("{}", json),
            Err(e) => eprintln!("Error serializing report: {}", e),
        },
    }
}

fn cmd_rewrite(
    input: PathBuf,
    indicators: PathBuf,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    report: ReportFormat,
) -> ExitCode {
    let settings = match load_settings(config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let index = match load_index(&indicators) {
        Ok(i) => i,
        Err(code) => return code,
    };
    let sql = match read_sql(&input) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let (rewritten, batch_report) = rewrite_document(&index, &settings, &sql);
    print_report(&batch_report, report);
    write_result(output, &rewritten)
}

fn cmd_inline(
    input: PathBuf,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    report: ReportFormat,
) -> ExitCode {
    let settings = match load_settings(config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let sql = match read_sql(&input) {
        Ok(s) => s,
        Err(code) => return code,
    };

    // The direct inliner never consults indicator definitions.
    let index = IndicatorIndex::new();
    let (rewritten, batch_report) = inline_document(&index, &settings, &sql);
    print_report(&batch_report, report);
    write_result(output, &rewritten)
}

fn cmd_expand(codes: Vec<String>, indicators: PathBuf, config: Option<PathBuf>) -> ExitCode {
    if codes.is_empty() {
        eprintln!("No codes given.");
        return ExitCode::FAILURE;
    }
    let settings = match load_settings(config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let index = match load_index(&indicators) {
        Ok(i) => i,
        Err(code) => return code,
    };

    let expander = Expander::new(&index, &settings.rewrite.reference_prefix);
    for code in &codes {
        let expansion = expander.expand(code);
        println!("{}: {}", expansion.code, expansion.expression);
        if expansion.base_codes.is_empty() {
            println!("  base indicators: (none)");
        } else {
            println!("  base indicators: {}", expansion.base_codes.join(", "));
        }
    }
    ExitCode::SUCCESS
}

fn cmd_list(indicators: PathBuf) -> ExitCode {
    let index = match load_index(&indicators) {
        Ok(i) => i,
        Err(code) => return code,
    };

    println!("Indicators: {}", index.len());
    println!();
    for code in index.sorted_codes() {
        let ind = match index.get(code) {
            Some(ind) => ind,
            None => continue,
        };
        let kind = match ind.kind {
            IndicatorKind::Calculated => "calculated",
            IndicatorKind::Progressive => "progressive",
            IndicatorKind::LastDate => "last-date",
        };
        match &ind.expression {
            Some(expr) => println!("  {} ({}) = {}", code, kind, expr),
            None => println!("  {} ({})", code, kind),
        }
    }
    ExitCode::SUCCESS
}

fn cmd_check(indicators: PathBuf, config: Option<PathBuf>) -> ExitCode {
    let settings = match load_settings(config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let index = match load_index(&indicators) {
        Ok(i) => i,
        Err(code) => return code,
    };

    let reference = indsql::expand::reference_regex(&settings.rewrite.reference_prefix);
    let graph = DependencyGraph::build(&index, &reference);
    let cycles = graph.cycles();

    println!(
        "{} indicators, {} references",
        index.len(),
        graph.edge_count()
    );

    if cycles.is_empty() {
        println!("OK: no dependency cycles");
        return ExitCode::SUCCESS;
    }

    println!("Dependency cycles:");
    for cycle in &cycles {
        println!("  {}", cycle.join(" -> "));
    }
    println!();
    println!("Cycles are resolved to placeholders during expansion; fix the definitions.");
    ExitCode::FAILURE
}
