//! CLI (K, ambient): argument parsing, command dispatch, human-readable
//! progress/output. A thin front end over the orchestrator, store, and
//! export — no discovery logic lives here.

pub mod tracing_init;

use crate::config::{AuthType, ConfigManager, ProbeConfig};
use crate::error::{Error, Result};
use crate::orchestrator::Orchestrator;
use crate::store::Store;
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Passive API-discovery engine", long_about = None)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ExportFormat {
    Md,
    Json,
    Pdf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe a base URL and map its API surface.
    Probe {
        url: String,
        #[arg(long)]
        depth: Option<u32>,
        #[arg(long = "delay-ms")]
        delay_ms: Option<u64>,
        #[arg(long = "max-requests")]
        max_requests: Option<u32>,
        #[arg(long = "auth-type")]
        auth_type: Option<String>,
        #[arg(long = "auth-value")]
        auth_value: Option<String>,
        #[arg(long = "test-all-methods")]
        test_all_methods: bool,
    },
    /// List known services.
    List,
    /// Show detail for one service.
    Status { name: String },
    /// Continue the last run for a service.
    Resume { name: String },
    /// Render a report for a service.
    Export {
        name: String,
        #[arg(long, value_enum, default_value = "md")]
        format: ExportFormat,
    },
    /// Print or mutate the on-disk config.
    Config {
        #[arg(long)]
        show: bool,
        #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"])]
        set: Option<Vec<String>>,
    },
}

/// Runs the parsed CLI to completion, returning the process exit code.
///
/// # Errors
/// Returns an error for infrastructure failures (store connect, config I/O)
/// that make the requested command impossible to run at all.
pub async fn run(cli: Cli) -> Result<i32> {
    tracing_init::init_tracing(cli.verbosity);

    let manager = std::env::var("APIPROBER_CONFIG_DIR").map_or_else(
        |_| ConfigManager::new(),
        |dir| Ok(ConfigManager::with_dir(dir.into())),
    )?;

    match cli.command {
        Commands::Probe {
            url,
            depth,
            delay_ms,
            max_requests,
            auth_type,
            auth_value,
            test_all_methods,
        } => {
            let overrides = build_probe_overrides(&ProbeArgs {
                depth,
                delay_ms,
                max_requests,
                auth_type,
                auth_value,
                test_all_methods,
            })?;
            let (orchestrator, base_config) = build_orchestrator(&manager).await?;
            let summary = orchestrator.probe(&url, &base_config, &overrides).await?;
            print_summary(&summary);
            Ok(exit_code_for(&summary.status))
        }
        Commands::List => {
            let store = connect_store(&manager).await?;
            let services = store.list_services().await?;
            if services.is_empty() {
                println!("No services probed yet.");
            } else {
                println!("{:<24} {:<40} {:<10} last probed", "NAME", "BASE URL", "ENDPOINTS");
                for service in services {
                    let stats = store.get_service_stats(service.id).await?;
                    let last_probed = service
                        .last_probed
                        .map_or_else(|| "never".to_string(), |ts| ts.to_rfc3339());
                    println!(
                        "{:<24} {:<40} {:<10} {last_probed}",
                        service.name, service.base_url, stats.endpoints
                    );
                }
            }
            Ok(0)
        }
        Commands::Status { name } => {
            let store = connect_store(&manager).await?;
            let service = store
                .get_service(&name)
                .await?
                .ok_or_else(|| Error::service_not_found(&name))?;
            let stats = store.get_service_stats(service.id).await?;
            let endpoints = store.get_endpoints(service.id).await?;
            println!("Service: {}", service.name);
            println!("Base URL: {}", service.base_url);
            if !service.server_header.is_empty() {
                println!("Server: {}", service.server_header);
            }
            println!("Discovered: {}", service.discovered_at);
            if let Some(last) = service.last_probed {
                println!("Last probed: {last}");
            }
            println!(
                "Endpoints: {} · Responses: {} · Parameters: {}",
                stats.endpoints, stats.responses, stats.parameters
            );
            for endpoint in endpoints {
                let methods = endpoint.methods.iter().cloned().collect::<Vec<_>>().join(",");
                let auth = if endpoint.auth_required { "auth" } else { "-" };
                println!("  {:<32} [{methods}] {auth}", endpoint.path);
            }
            Ok(0)
        }
        Commands::Resume { name } => {
            let (orchestrator, base_config) = build_orchestrator(&manager).await?;
            let summary = orchestrator.resume(&name, &base_config).await?;
            print_summary(&summary);
            Ok(exit_code_for(&summary.status))
        }
        Commands::Export { name, format } => {
            let store = connect_store(&manager).await?;
            let config = manager.load()?;
            let export_dir = manager.export_dir(&config);
            std::fs::create_dir_all(&export_dir)?;
            let (contents, extension) = match format {
                ExportFormat::Json => (serde_json::to_string_pretty(&crate::export::json(&store, &name).await?)?, "json"),
                ExportFormat::Md => (crate::export::markdown(&store, &name).await?, "md"),
                ExportFormat::Pdf => {
                    println!("PDF rendering is an external tool in this engine; writing the Markdown report instead.");
                    (crate::export::pdf_fallback(&store, &name).await?, "md")
                }
            };
            let out_path = export_dir.join(format!("{name}.{extension}"));
            std::fs::write(&out_path, contents)?;
            println!("Wrote {}", out_path.display());
            Ok(0)
        }
        Commands::Config { show, set } => {
            if let Some(pair) = set {
                let [key, value] = [pair[0].clone(), pair[1].clone()];
                let applied = manager.set(&key, &value)?;
                println!("{key} = {applied}");
            } else if show {
                let raw = manager.load_raw()?;
                println!("{}", serde_json::to_string_pretty(&raw)?);
            } else {
                let config = manager.load()?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            Ok(0)
        }
    }
}

async fn connect_store(manager: &ConfigManager) -> Result<Store> {
    let config = manager.load()?;
    Store::connect(&manager.db_path(&config)).await
}

async fn build_orchestrator(manager: &ConfigManager) -> Result<(Orchestrator, ProbeConfig)> {
    let config = manager.load()?;
    let store = Arc::new(Store::connect(&manager.db_path(&config)).await?);
    let cancelled = Arc::new(AtomicBool::new(false));
    install_ctrl_c_handler(cancelled.clone());
    let stop = crate::budget::StopSignal::new(manager.stop_sentinel_path(), cancelled);
    Ok((Orchestrator::new(store, manager.wordlists_dir(), stop), config))
}

fn install_ctrl_c_handler(cancelled: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancelled.store(true, Ordering::Relaxed);
        }
    });
}

struct ProbeArgs {
    depth: Option<u32>,
    delay_ms: Option<u64>,
    max_requests: Option<u32>,
    auth_type: Option<String>,
    auth_value: Option<String>,
    test_all_methods: bool,
}

fn build_probe_overrides(args: &ProbeArgs) -> Result<serde_json::Value> {
    let mut overrides = serde_json::Map::new();
    if let Some(depth) = args.depth {
        overrides.insert("max_depth".to_string(), serde_json::json!(depth));
    }
    if let Some(delay_ms) = args.delay_ms {
        overrides.insert("delay_ms".to_string(), serde_json::json!(delay_ms));
    }
    if let Some(max_requests) = args.max_requests {
        overrides.insert("max_requests".to_string(), serde_json::json!(max_requests));
    }
    if args.test_all_methods {
        overrides.insert("skip_destructive".to_string(), serde_json::json!(false));
    }
    if args.auth_type.is_some() || args.auth_value.is_some() {
        let auth_type = match args.auth_type.as_deref() {
            Some("bearer") | None => AuthType::Bearer,
            Some("api_key") => AuthType::ApiKey,
            Some("basic") => AuthType::Basic,
            Some(other) => return Err(Error::config(format!("unknown auth type '{other}'"))),
        };
        overrides.insert(
            "auth".to_string(),
            serde_json::json!({"type": auth_type, "value": args.auth_value.clone().unwrap_or_default()}),
        );
    }
    Ok(serde_json::Value::Object(overrides))
}

fn print_summary(summary: &crate::orchestrator::ProbeSummary) {
    println!(
        "service={} base_url={} endpoints_found={} total_requests={} status={}",
        summary.service, summary.base_url, summary.endpoints_found, summary.total_requests, summary.status
    );
    if let Some(error) = &summary.error {
        println!("error: {error}");
    }
}

fn exit_code_for(status: &str) -> i32 {
    i32::from(status == "error")
}
