use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use linkguard_core::{
    report::{render_pages, render_report, OutputFormat},
    BuiltinPatternRepository, EngineSettings, FilePatternRepository, PatternRepository,
    PatternTables, RiskCategory, SignalMode, ThreatEngine, ThreatVerdict,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "linkguard",
    author,
    version,
    about = "Heuristic threat scoring for URLs and documents"
)]
struct Cli {
    /// Optional configuration file (TOML, YAML, or JSON)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory containing pattern tables (threat_domains.txt, patterns.json)
    #[arg(long = "patterns-dir", value_name = "DIR", global = true)]
    patterns_dir: Option<PathBuf>,

    /// Output format for scan verdicts
    #[arg(long, value_enum, default_value_t = Format::Human, global = true)]
    format: Format,

    /// Body lines per page when `--format pages` is selected
    #[arg(long = "lines-per-page", default_value_t = 40, global = true)]
    lines_per_page: usize,

    /// Use the fixed signal profile instead of simulated signals
    #[arg(long, global = true)]
    deterministic: bool,

    /// Seed for the simulated signal provider
    #[arg(long, value_name = "N", global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Human,
    Json,
    Pages,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a single URL
    ScanUrl {
        /// URL to analyse (malformed input is still scored)
        url: String,
    },
    /// Score an HTML, email, or text document
    ScanFile {
        /// Path to the document
        path: PathBuf,
    },
    /// Show the active pattern tables
    ListPatterns {
        /// Emit tables as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let tables = load_tables(&settings).await?;

    match &cli.command {
        Commands::ScanUrl { url } => {
            let verdict = engine(&settings, tables)
                .score_url(url)
                .with_context(|| format!("failed to scan url `{url}`"))?;
            print_verdict(&cli, &verdict)?;
        }
        Commands::ScanFile { path } => {
            let input = settings.input_provider();
            let verdict = engine(&settings, tables)
                .scan_file(&input, path)
                .await
                .with_context(|| format!("failed to scan {}", path.display()))?;
            print_verdict(&cli, &verdict)?;
        }
        Commands::ListPatterns { json } => {
            list_patterns(&tables, settings.patterns_dir.as_deref(), *json)?
        }
    }
    Ok(())
}

/// Layer the optional config file under `LINKGUARD_*` variables, then apply CLI flags.
fn load_settings(cli: &Cli) -> Result<EngineSettings> {
    let mut builder = config::Config::builder();
    if let Some(path) = &cli.config {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    let mut settings: EngineSettings = builder
        .add_source(
            config::Environment::with_prefix("LINKGUARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to load configuration")?
        .try_deserialize()
        .context("configuration does not match the expected settings")?;

    if let Some(dir) = &cli.patterns_dir {
        settings.patterns_dir = Some(dir.clone());
    }
    if cli.deterministic {
        settings.signals.mode = SignalMode::Fixed;
    }
    if let Some(seed) = cli.seed {
        settings.signals.seed = Some(seed);
    }
    settings.validate().context("invalid configuration")?;
    debug!(?settings, "settings resolved");
    Ok(settings)
}

async fn load_tables(settings: &EngineSettings) -> Result<Arc<PatternTables>> {
    match &settings.patterns_dir {
        Some(dir) => FilePatternRepository::new(dir)
            .load_tables()
            .await
            .with_context(|| format!("failed to load patterns from {}", dir.display())),
        None => BuiltinPatternRepository.load_tables().await,
    }
}

fn engine(settings: &EngineSettings, tables: Arc<PatternTables>) -> ThreatEngine {
    ThreatEngine::new(tables).with_signals(settings.signal_provider())
}

fn print_verdict(cli: &Cli, verdict: &ThreatVerdict) -> Result<()> {
    match cli.format {
        Format::Json => println!("{}", render_report(verdict, OutputFormat::Json)?),
        Format::Human => {
            println!("{}", banner(verdict));
            println!();
            print!("{}", render_report(verdict, OutputFormat::Human)?);
        }
        Format::Pages => {
            let pages = render_pages(verdict, cli.lines_per_page)?;
            println!("{}", pages.join("\n"));
        }
    }
    Ok(())
}

fn banner(verdict: &ThreatVerdict) -> String {
    let label = format!("[{}]", verdict.risk_category);
    let label = match verdict.risk_category {
        RiskCategory::Low => label.green(),
        RiskCategory::Medium => label.yellow(),
        RiskCategory::High => label.red(),
        RiskCategory::Critical => label.red().bold(),
    };
    format!(
        "{label} {subject} scored {score}/100",
        subject = verdict.subject,
        score = verdict.threat_score
    )
}

fn list_patterns(tables: &PatternTables, dir: Option<&Path>, json: bool) -> Result<()> {
    let source = tables.source();
    if json {
        println!("{}", serde_json::to_string_pretty(source)?);
        return Ok(());
    }

    match dir {
        Some(dir) => println!("pattern tables loaded from {}", dir.display()),
        None => println!("built-in pattern tables"),
    }
    print_table("threat domains", &source.threat_domains);
    print_table("suspicious url patterns", &source.suspicious_url);
    print_table("suspicious tlds", &source.suspicious_tlds);
    println!("- {:<24} {}", "shortener", source.shortener);
    println!("- {:<24} {}", "phishing language", source.phishing_language);
    println!("- {:<24} {}", "brand impersonation", source.brand_impersonation);
    Ok(())
}

fn print_table(name: &str, entries: &[String]) {
    let noun = if entries.len() == 1 { "entry" } else { "entries" };
    println!("- {name:<24} {} {noun}", entries.len());
    for entry in entries {
        println!("    {entry}");
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
