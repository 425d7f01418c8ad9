//! ctxpack - Main Entry Point
//!
//! Builds a context pack for the repository given as the first argument
//! (default: the current directory).

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ctxpack::{ContextPack, PackConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    let json_logs = std::env::var("CTXPACK_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ctxpack=info".into()),
        ))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    let root = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let config_file = std::env::var_os("CTXPACK_CONFIG").map(PathBuf::from);

    info!("Starting ctxpack v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = PackConfig::load(&root, config_file.as_deref())
        .with_context(|| format!("loading configuration for {}", root.display()))?;
    info!(mode = %config.mode, output_dir = %config.output_dir.display(), "Configuration loaded");

    let pack = ContextPack::new(&root, config).context("invalid configuration")?;
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let run = pack
        .generate(Some(timestamp))
        .await
        .with_context(|| format!("building context pack for {}", root.display()))?;

    let summary = &run.artifacts.summary;
    info!(
        mode = %summary.mode,
        commit = ?summary.commit,
        files = summary.filtered_count,
        manifests = summary.manifest_count,
        api_symbols = summary.api_symbol_count,
        tokens = summary.total_tokens,
        warnings = summary.warning_count,
        "Context pack complete"
    );

    match run.written {
        Some(written) => {
            println!("{}", written.text.display());
            println!("{}", written.json.display());
        }
        None => println!("dry run: {} files, nothing written", summary.filtered_count),
    }

    Ok(())
}
