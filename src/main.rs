//! Generation server
//!
//! ```bash
//! GEMINI_API_KEY=... minigame-server --config forge.toml --port 8080
//! ```
//!
//! ## Environment Variables
//!
//! - `GEMINI_API_KEY`: provider credential; without it every level is a local fallback
//! - `LOG_FORMAT=json`: structured JSON output (production)
//! - `RUST_LOG=info`: log level filter

use minigame_orchestrator::config::{self, ForgeConfig};
use minigame_orchestrator::{
    init_tracing, metrics, web_api, GeminiProvider, GenerationOrchestrator, OrchestratorBuilder,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Parsed CLI arguments.
struct Args {
    /// Optional TOML config file.
    config: Option<PathBuf>,
    /// Overrides `server.port`.
    port: Option<u16>,
}

/// Parse command-line arguments manually (no external arg parser dependency).
fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = None;
    let mut port = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    return Err("--config requires a value".to_string());
                }
                config = Some(PathBuf::from(&args[i]));
            }
            "--port" | "-p" => {
                i += 1;
                if i >= args.len() {
                    return Err("--port requires a value".to_string());
                }
                port = Some(
                    args[i]
                        .parse()
                        .map_err(|_| format!("invalid port: {}", args[i]))?,
                );
            }
            "--help" | "-h" => {
                return Err(usage());
            }
            other => {
                return Err(format!("unknown argument: {other}\n{}", usage()));
            }
        }
        i += 1;
    }

    Ok(Args { config, port })
}

fn usage() -> String {
    [
        "Usage: minigame-server [OPTIONS]",
        "",
        "Options:",
        "  --config, -c <FILE>   TOML configuration file (default: built-in defaults)",
        "  --port, -p <PORT>     Listen port (overrides server.port)",
        "  --help, -h            Show this help message",
    ]
    .join("\n")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let _ = init_tracing();
    metrics::init_metrics()?;

    let mut forge = match &args.config {
        Some(path) => config::load_from_file(path)?,
        None => ForgeConfig::default(),
    };
    if let Some(port) = args.port {
        forge.server.port = port;
    }

    let mut builder = OrchestratorBuilder::from_config(&forge);
    match GeminiProvider::from_env() {
        Ok(provider) => {
            let provider = provider
                .with_model(forge.provider.model.clone())
                .with_base_url(forge.provider.base_url.clone())
                .with_timeout(forge.provider.timeout());
            info!(model = provider.model(), "content provider configured");
            builder = builder.provider(Arc::new(provider));
        }
        Err(e) => warn!(error = %e, "no content provider, serving fallback levels only"),
    }
    let orchestrator: Arc<GenerationOrchestrator> = Arc::new(builder.build());

    info!(
        port = forge.server.port,
        max_requests = forge.throttle.max_requests,
        ttl_ms = forge.cache.ttl_ms,
        "starting minigame-server"
    );
    web_api::start_server(forge.server, orchestrator).await
}
