//! careermesh - scatter-gather career advice mesh
//!
//! CLI entry point for asking handlers and inspecting their routing.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use careermesh::cli::{Cli, Command, OutputFormat};
use careermesh::config::Config;
use careermesh::handler::HandlerSpec;
use careermesh::handler::catalog;
use careermesh::llm::create_client;
use careermesh::mesh::Mesh;
use careermesh::router::route;

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing in here can trace
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("careermesh")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let level = match cli_log_level.map(|s| s.to_uppercase()) {
        None => tracing::Level::INFO,
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
    };

    let log_file = fs::File::create(log_dir.join("careermesh.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(model = %config.llm.model, "careermesh loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Ask { handler, query } => cmd_ask(&config, &handler, &query).await,
        Command::Route { handler, query } => cmd_route(&config, &handler, &query),
        Command::Handlers { format } => cmd_handlers(&config, format),
    }
}

fn lookup<'a>(specs: &'a [HandlerSpec], name: &str) -> Result<&'a HandlerSpec> {
    catalog::find_in(specs, name).ok_or_else(|| {
        let known: Vec<&str> = specs.iter().map(|spec| spec.name.as_str()).collect();
        eyre!("Unknown handler '{}'. Available: {}", name, known.join(", "))
    })
}

/// Spawn the whole mesh, ask one handler and print the reply
async fn cmd_ask(config: &Config, handler: &str, query: &str) -> Result<()> {
    debug!(%handler, "cmd_ask: called");
    lookup(&catalog::configured(config), handler)?;
    config.validate()?;

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let mesh = Mesh::spawn(config, llm).await?;
    let address = mesh
        .address_of(handler)
        .cloned()
        .ok_or_else(|| eyre!("Handler '{}' is not running", handler))?;

    let mut requester = mesh.requester().await?;
    let reply = requester.ask(&address, query, config.mesh.reply_timeout()).await;
    mesh.shutdown().await?;

    println!("{}", reply?);
    Ok(())
}

/// Print the collaborators a handler would consult, without any network
fn cmd_route(config: &Config, handler: &str, query: &str) -> Result<()> {
    debug!(%handler, "cmd_route: called");
    let specs = catalog::configured(config);
    let spec = lookup(&specs, handler)?;

    let targets = route(query, &spec.keywords, &spec.registry);
    if targets.is_empty() {
        println!("No collaborators would be consulted.");
        return Ok(());
    }
    for target in &targets {
        let name = spec.registry.name_of(target).unwrap_or("unknown");
        println!("{}\t{}", name, target);
    }
    Ok(())
}

/// List handlers with their address, strategy, policy and registry size
fn cmd_handlers(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_handlers: called");
    let specs = catalog::configured(config);

    match format {
        OutputFormat::Json => {
            let list: Vec<serde_json::Value> = specs
                .iter()
                .map(|spec| {
                    serde_json::json!({
                        "name": spec.name,
                        "display-name": spec.display_name,
                        "address": spec.address.as_str(),
                        "strategy": spec.keywords.strategy().to_string(),
                        "policy": spec.policy.to_string(),
                        "auxiliary": spec.auxiliary.label(),
                        "collaborators": spec.registry.len(),
                        "peers": spec
                            .registry
                            .iter()
                            .map(|(address, name)| serde_json::json!({"name": name, "address": address.as_str()}))
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        OutputFormat::Text => {
            println!(
                "{:<18} {:<10} {:<13} {:<14} {:>6}  ADDRESS",
                "NAME", "STRATEGY", "POLICY", "AUXILIARY", "PEERS"
            );
            for spec in &specs {
                println!(
                    "{:<18} {:<10} {:<13} {:<14} {:>6}  {}",
                    spec.name,
                    spec.keywords.strategy().to_string(),
                    spec.policy.to_string(),
                    spec.auxiliary.label(),
                    spec.registry.len(),
                    spec.address
                );
            }
        }
    }
    Ok(())
}
