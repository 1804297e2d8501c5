//! confluence-mcp: MCP server for Markdown rendering and Confluence conversion
//!
//! Serves the Markdown tools over streamable HTTP (default) or stdio.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use confluence_mcp::config::{self, Config, TransportKind};
use confluence_mcp::mcp::{HttpTransport, McpServer, StdioTransport};
use confluence_mcp::render::confluence::is_known_theme;
use confluence_mcp::tools::default_registry;

/// MCP server for Markdown rendering and Confluence conversion.
///
/// Provides tools that render Markdown to HTML, convert it to Confluence
/// wiki markup, and serve built-in document templates.
#[derive(Parser, Debug)]
#[command(name = "confluence-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Transport to serve (overrides the configuration file)
    #[arg(short, long, value_enum)]
    transport: Option<TransportKind>,

    /// HTTP listen address (overrides the configuration file)
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<SocketAddr>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Applies CLI overrides on top of the loaded configuration.
fn apply_overrides(cfg: &mut Config, args: &Args) {
    if let Some(transport) = args.transport {
        cfg.server.transport = transport;
    }
    if let Some(bind) = args.bind {
        cfg.server.bind = bind;
    }
}

/// Runs the configured transport until it stops.
async fn serve(cfg: &Config, server: McpServer) -> std::io::Result<()> {
    match cfg.server.transport {
        TransportKind::Stdio => {
            info!("Serving MCP over stdio");
            StdioTransport::new().run(&server).await
        }
        TransportKind::Http => {
            let transport = HttpTransport::bind(cfg.server.bind, server, cfg.http_options()).await?;
            info!(addr = %transport.addr(), "Serving MCP over HTTP at /mcp");
            transport.run().await
        }
    }
}

/// Entry point for the confluence-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if let Some(source) = std::error::Error::source(&e) {
                eprintln!("  caused by: {source}");
            }
            return ExitCode::FAILURE;
        }
    };
    apply_overrides(&mut cfg, &args);

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = %cfg.server.transport,
        "Starting confluence-mcp server"
    );

    if let Some(theme) = cfg.converter.default_theme.as_deref() {
        if !is_known_theme(theme) {
            warn!(theme, "Configured default theme is not a known Confluence theme");
        }
    }

    let registry = match default_registry(&cfg.converter.convert_options()) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "Failed to register tools");
            return ExitCode::FAILURE;
        }
    };
    info!(tools = registry.len(), "Tools registered");

    let server = McpServer::new(registry);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(&cfg, server)) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
