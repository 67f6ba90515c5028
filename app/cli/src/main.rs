//! FILENAME: app/cli/src/main.rs
// PURPOSE: Command line entry point: load a config bundle, generate one workbook.
// FORMAT: report-gen --config bundle.yaml --templates dir --output dir [--param k=v]...

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use report_engine::{
    load_config_bundle, load_data_sources_bundle, CsvFetcher, GenerationContext, Generator,
    LoadedBundle,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Generate a spreadsheet report from a template and CSV data.
#[derive(Parser, Debug)]
#[command(name = "report-gen")]
#[command(about = "Fill a spreadsheet template with report data")]
struct Cli {
    /// Configuration bundle (workbook, data views, data sources)
    #[arg(long, default_value = "./test/config.yaml")]
    config: PathBuf,

    /// Data source bundle replacing the bundle's data sources
    #[arg(long)]
    datasources: Option<PathBuf>,

    /// Directory holding the template workbooks
    #[arg(long, default_value = "./test/templates")]
    templates: PathBuf,

    /// Root directory for generated files
    #[arg(long, default_value = "./test/output")]
    output: PathBuf,

    /// Directory with one <view>.csv per data view
    #[arg(long, default_value = "./test/data_csv")]
    data_dir: PathBuf,

    /// Run parameter in key=value form (repeatable)
    #[arg(long = "param", value_parser = parse_key_val)]
    params: Vec<(String, String)>,

    /// Log at debug level
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: {}", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_parameters(cli: &Cli) -> HashMap<String, String> {
    let mut params = HashMap::from([("env".to_string(), "dev".to_string())]);
    params.extend(cli.params.iter().cloned());
    params
}

fn run(cli: &Cli) -> Result<PathBuf> {
    info!("Loading configuration bundle {}", cli.config.display());
    let LoadedBundle {
        workbook,
        mut registry,
    } = load_config_bundle(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    if let Some(path) = &cli.datasources {
        info!("Loading data source bundle {}", path.display());
        let sources = load_data_sources_bundle(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        info!("Loaded {} data source(s)", sources.len());
        registry.set_sources(sources);
    }

    info!("Reading CSV data from {}", cli.data_dir.display());
    let fetcher = CsvFetcher::new(&cli.data_dir);

    info!("Processing workbook '{}' ({})", workbook.name, workbook.id);
    let ctx = GenerationContext::new(&workbook, &registry, &fetcher, run_parameters(cli));
    Generator::new(ctx)
        .generate(&cli.templates, &cli.output)
        .with_context(|| format!("generate workbook {}", workbook.name))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(path) => {
            info!("Successfully generated {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Generation failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
