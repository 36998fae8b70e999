use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use taintgraph::config::Config;
use taintgraph::error::AnalysisError;
use taintgraph::ir::Language;
use taintgraph::output::OutputFormat;
use taintgraph::rules::{Dispatcher, FindingId, Severity};
use taintgraph::{Engine, ScanOptions};

#[derive(Parser)]
#[command(
    name = "taintgraph",
    about = "Graph-based taint analysis for JavaScript, TypeScript and Python",
    version,
    author
)]
struct Cli {
    /// Log analysis progress to stderr (repeat for more detail)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a file or directory for vulnerabilities
    Scan {
        /// File or directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Config file path
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output format (console, json, sarif)
        #[arg(long, short = 'f', default_value = "console")]
        format: String,

        /// Comma-separated findings to run (e.g. F001,F004)
        #[arg(long, value_delimiter = ',')]
        findings: Vec<String>,

        /// Minimum severity to fail (info, low, medium, high, critical)
        #[arg(long)]
        fail_on: Option<String>,

        /// Write output to file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Worker threads (default: one per core)
        #[arg(long, short = 'j', env = "TAINTGRAPH_JOBS")]
        jobs: Option<usize>,
    },

    /// List all findings the engine can detect
    ListFindings {
        /// Output format (table, json)
        #[arg(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Dump the graph built for one file
    Graph {
        file: PathBuf,

        /// Graph format (dot, json)
        #[arg(long, short = 'f', default_value = "dot")]
        format: String,

        /// Source language; inferred from the extension when omitted
        #[arg(long, short = 'l')]
        language: Option<String>,
    },

    /// Generate a starter .taintgraph.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Scan {
            path,
            config,
            format,
            findings,
            fail_on,
            output,
            jobs,
        } => cmd_scan(path, config, format, findings, fail_on, output, jobs),
        Commands::ListFindings { format } => cmd_list_findings(format),
        Commands::Graph {
            file,
            format,
            language,
        } => cmd_graph(file, format, language),
        Commands::Init { force } => cmd_init(force),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

/// `RUST_LOG` wins; otherwise `-v` raises the default `warn` level.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "taintgraph=info",
        2 => "taintgraph=debug",
        _ => "taintgraph=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[allow(clippy::too_many_arguments)]
fn cmd_scan(
    path: PathBuf,
    config: Option<PathBuf>,
    format_str: String,
    findings: Vec<String>,
    fail_on_str: Option<String>,
    output_path: Option<PathBuf>,
    jobs: Option<usize>,
) -> Result<i32, AnalysisError> {
    let format = OutputFormat::from_str_lenient(&format_str).unwrap_or_else(|| {
        eprintln!("Warning: unknown format '{}', using console", format_str);
        OutputFormat::Console
    });

    let fail_on = fail_on_str.and_then(|s| {
        let sev = Severity::from_str_lenient(&s);
        if sev.is_none() {
            eprintln!("Warning: unknown severity '{}', using config default", s);
        }
        sev
    });

    let findings = if findings.is_empty() {
        None
    } else {
        let parsed = findings
            .iter()
            .map(|s| {
                FindingId::from_str_lenient(s)
                    .ok_or_else(|| AnalysisError::Config(format!("unknown finding '{s}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Some(parsed)
    };

    let options = ScanOptions {
        config_path: config,
        format,
        fail_on_override: fail_on,
        findings,
        jobs,
    };

    let report = taintgraph::scan(&path, &options)?;
    let rendered = taintgraph::render_report(&report, format)?;

    match output_path {
        Some(out) => std::fs::write(&out, &rendered)?,
        None => print!("{}", rendered),
    }

    // Exit code: 0 = pass, 1 = findings above threshold or failed analyses
    Ok(if report.verdict.pass { 0 } else { 1 })
}

fn cmd_list_findings(format_str: String) -> Result<i32, AnalysisError> {
    let dispatcher = Dispatcher::standard();
    let findings: Vec<_> = FindingId::ALL.iter().map(|id| id.metadata()).collect();

    match format_str.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&findings)?;
            println!("{}", json);
        }
        _ => {
            println!(
                "{:<6} {:<32} {:<10} {:<8} LANGUAGES",
                "ID", "TITLE", "SEVERITY", "CWE"
            );
            println!("{}", "-".repeat(90));
            for meta in &findings {
                let languages: Vec<String> = dispatcher
                    .languages(meta.id)
                    .iter()
                    .map(|l| l.to_string())
                    .collect();
                println!(
                    "{:<6} {:<32} {:<10} {:<8} {}",
                    meta.id,
                    meta.title,
                    meta.default_severity.to_string(),
                    meta.cwe_id,
                    languages.join(", "),
                );
            }
        }
    }

    Ok(0)
}

fn cmd_graph(
    file: PathBuf,
    format_str: String,
    language: Option<String>,
) -> Result<i32, AnalysisError> {
    let language = match language {
        Some(name) => Language::from_str_lenient(&name)
            .ok_or_else(|| AnalysisError::Config(format!("unknown language '{name}'")))?,
        None => Language::from_extension(
            &file
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default(),
        ),
    };

    let source = std::fs::read_to_string(&file)?;
    let graph = Engine::standard().build_graph(&file, language, &source)?;

    match format_str.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&graph.to_json())?),
        "dot" => print!("{}", graph.to_dot()),
        other => {
            return Err(AnalysisError::Config(format!(
                "unknown graph format '{other}' (expected dot or json)"
            )))
        }
    }

    Ok(0)
}

fn cmd_init(force: bool) -> Result<i32, AnalysisError> {
    let path = PathBuf::from(".taintgraph.toml");

    if path.exists() && !force {
        eprintln!(".taintgraph.toml already exists. Use --force to overwrite.");
        return Ok(1);
    }

    std::fs::write(&path, Config::starter_toml())?;
    println!("Created .taintgraph.toml");

    Ok(0)
}
