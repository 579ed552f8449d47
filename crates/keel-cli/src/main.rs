//! keel CLI
//!
//! Usage:
//!   keel serve                              Serve the demo users API
//!   keel serve --host 0.0.0.0 --port 8080
//!   keel serve --config keel.toml --log-format json
//!   keel openapi                            Write openapi.json
//!   keel openapi --format yaml --output openapi.yaml

mod config;
mod demo;
mod logging;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::config::KeelConfig;
use crate::logging::LogFormat;

#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Schema-validated HTTP routes with OpenAPI output", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the demo users API
    Serve(ServeArgs),
    /// Write the OpenAPI document for the demo API
    Openapi(OpenapiArgs),
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Host to bind to (overrides config and KEEL_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config and KEEL_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Config file (default: ./keel.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. "debug", "keel_api=trace")
    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DocFormat {
    Json,
    Yaml,
}

#[derive(Debug, Args)]
struct OpenapiArgs {
    /// Config file (default: ./keel.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file
    #[arg(short, long, default_value = "openapi.json")]
    output: PathBuf,

    /// Output format; inferred from the file extension when omitted
    #[arg(short, long, value_enum)]
    format: Option<DocFormat>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args),
        Commands::Openapi(args) => {
            logging::init("warn", LogFormat::Text);
            write_openapi(args)
        }
    }
}

fn serve(args: ServeArgs) -> Result<()> {
    logging::init(&args.log_level, args.log_format);

    let mut config = KeelConfig::load(args.config.as_deref())?;
    config.apply_flags(args.host, args.port);

    let app = demo::build(&config)?;
    info!(
        routes = app.routes().len(),
        strict = config.app.strict,
        validate_responses = config.app.validate_responses,
        "Starting keel demo API"
    );
    if let Some(path) = &config.openapi.docs_path {
        info!("OpenAPI document at http://{}{}", config.bind_addr(), path);
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime
        .block_on(app.listen(config.server_config()))
        .context("Server error")
}

fn write_openapi(args: OpenapiArgs) -> Result<()> {
    let config = KeelConfig::load(args.config.as_deref())?;
    let app = demo::build(&config)?;
    let spec = app.openapi_with(&config.generator());

    let format = args.format.unwrap_or_else(|| infer_format(&args.output));
    let content = match format {
        DocFormat::Json => spec.to_json()?,
        DocFormat::Yaml => spec.to_yaml()?,
    };

    std::fs::write(&args.output, content)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!(
        "Wrote OpenAPI document ({} paths) to {}",
        spec.paths.len(),
        args.output.display()
    );
    Ok(())
}

fn infer_format(path: &Path) -> DocFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => DocFormat::Yaml,
        _ => DocFormat::Json,
    }
}
