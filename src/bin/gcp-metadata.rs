//! CLI binary for the gcp-metadata crate.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use gcp_metadata::{GcpMetadata, MetadataConfig, MetadataError, MetadataOptions, MetadataType};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gcp-metadata")]
#[command(author, version, about = "Query the GCP compute metadata service")]
struct Cli {
    /// Metadata host (defaults to GCE_METADATA_HOST or 169.254.169.254)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Retries after the first attempt
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Per-attempt timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Log each attempt to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the metadata service is reachable
    Available,

    /// Fetch instance metadata
    Instance(FetchArgs),

    /// Fetch project metadata
    Project(FetchArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// Property path, e.g. `hostname` or `attributes/my-key`
    property: Option<String>,

    /// Query parameter as KEY=VALUE (repeatable)
    #[arg(long = "param", value_parser = parse_pair)]
    params: Vec<(String, String)>,

    /// Extra request header as NAME=VALUE (repeatable)
    #[arg(long = "header", value_parser = parse_pair)]
    headers: Vec<(String, String)>,

    /// Options as a JSON object with `property`, `params` and `headers`
    #[arg(long, conflicts_with_all = ["property", "params", "headers"])]
    options: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "text" => Ok(OutputFormat::Text),
            _ => Err(format!("unknown format: {}", s)),
        }
    }
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got: {}", s)),
    }
}

impl FetchArgs {
    fn to_options(&self) -> Result<MetadataOptions, MetadataError> {
        if let Some(json) = &self.options {
            let value: serde_json::Value = serde_json::from_str(json)?;
            return MetadataOptions::from_json(&value);
        }
        let mut options = MetadataOptions::new();
        if let Some(property) = &self.property {
            options = options.property(property);
        }
        for (k, v) in &self.params {
            options = options.param(k, v);
        }
        for (k, v) in &self.headers {
            options = options.header(k, v);
        }
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), MetadataError> {
    let mut config = MetadataConfig::from_env();
    if let Some(host) = &cli.host {
        config = config.with_host(host);
    }
    if let Some(retries) = cli.retries {
        config = config.with_max_retries(retries);
    }
    if let Some(ms) = cli.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    let metadata = GcpMetadata::with_config(config)?;

    match cli.command {
        Commands::Available => {
            println!("{}", metadata.is_available().await?);
            Ok(())
        }
        Commands::Instance(args) => fetch(&metadata, MetadataType::Instance, &args).await,
        Commands::Project(args) => fetch(&metadata, MetadataType::Project, &args).await,
    }
}

async fn fetch(
    metadata: &GcpMetadata,
    kind: MetadataType,
    args: &FetchArgs,
) -> Result<(), MetadataError> {
    let options = args.to_options()?;
    let value = metadata.fetch(kind, &options).await?;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&value)?),
        OutputFormat::Text => println!("{}", value),
    }
    Ok(())
}
