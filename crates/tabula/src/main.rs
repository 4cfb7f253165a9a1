//! Tabula - fetch a remote record set, cache it, and serve it as tables

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::Config;
use tabula_api::{AdminCredentials, AppState, create_router};
use tabula_auth::{JwtManager, NonceManager, hash_password};
use tabula_core::{CachedFetcher, CachedRecordSet, Column, FetcherConfig, spawn_purge_task};
use tabula_source::{HttpSource, HttpSourceConfig};
use tabula_storage::{MemoryStore, SqliteStore, TransientStore};

/// Tabula - cached remote record set with admin page, JSON endpoint and embeddable table
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    config: String,

    /// Bind address (overrides `server.bind_address`)
    #[arg(long, env = "TABULA_BIND", global = true)]
    bind: Option<String>,

    /// Port (overrides `server.port`)
    #[arg(short, long, env = "TABULA_PORT", global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Args {
    /// Apply the command-line server overrides on top of the loaded configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.server.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Drop the cached record set so the next read fetches fresh data
    Refresh,
    /// Print the record set
    Show {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print an argon2 hash for `auth.admin.password_hash`
    HashPassword {
        password: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();
    let command = args.command.take().unwrap_or(Command::Serve);

    // Needs neither configuration nor logging
    if let Command::HashPassword { password } = &command {
        println!("{}", hash_password(password)?);
        return Ok(());
    }

    let mut config = Config::load(&args.config)?;
    args.apply_overrides(&mut config);
    init_logging(&config.logging.level, &config.logging.format);

    match command {
        Command::Serve => serve(config).await,
        Command::Refresh => {
            let fetcher = build_fetcher(&config).await?;
            fetcher
                .invalidate()
                .await
                .context("Failed to refresh data")?;
            println!("Success: Data has been refreshed.");
            Ok(())
        }
        Command::Show { json } => {
            let fetcher = build_fetcher(&config).await?;
            let record_set = fetcher.get().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&record_set)?);
            } else {
                print!("{}", format_text_table(&record_set));
            }
            Ok(())
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Command::HashPassword { .. } => Ok(()),
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Tabula v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(Arc::new(handle))
    } else {
        None
    };

    let store = build_store(&config).await?;
    spawn_purge_task(store.clone(), config.cache.purge_interval_secs);

    let fetcher = Arc::new(fetcher_with_store(&config, store)?);

    let password_hash = match &config.auth.admin.password_hash {
        Some(hash) => hash.clone(),
        None => {
            if config.auth.enabled {
                warn!(
                    "No admin password hash configured; using default credentials ({} / admin)",
                    config.auth.admin.username
                );
            }
            hash_password("admin")?
        }
    };

    let state = AppState::new(
        fetcher,
        Arc::new(JwtManager::new(&config.auth.secret, config.auth.session_hours)),
        Arc::new(NonceManager::new(
            &config.auth.secret,
            config.auth.nonce_lifetime_secs,
        )?),
        AdminCredentials {
            username: config.auth.admin.username.clone(),
            password_hash,
        },
        config.auth.enabled,
    );

    let app = create_router(state, metrics_handle).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid bind address: {}:{}",
                config.server.bind_address, config.server.port
            )
        })?;

    info!("Listening on {}", addr);
    info!("Upstream: {}", config.upstream.url);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Open the configured transient store
async fn build_store(config: &Config) -> Result<Arc<dyn TransientStore>> {
    match config.cache.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "sqlite" => {
            let path = &config.cache.sqlite.path;
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let store = SqliteStore::open(path)
                .await
                .with_context(|| format!("Failed to open SQLite store at {}", path))?;
            Ok(Arc::new(store))
        }
        other => bail!("Unknown cache backend: {} (expected sqlite or memory)", other),
    }
}

async fn build_fetcher(config: &Config) -> Result<CachedFetcher> {
    let store = build_store(config).await?;
    fetcher_with_store(config, store)
}

fn fetcher_with_store(config: &Config, store: Arc<dyn TransientStore>) -> Result<CachedFetcher> {
    let source = HttpSource::new(HttpSourceConfig {
        url: config.upstream.url.clone(),
        timeout: Duration::from_secs(config.upstream.timeout_secs),
        user_agent: config.upstream.user_agent.clone(),
        skip_tls_verify: config.upstream.skip_tls_verify,
    })
    .context("Failed to build HTTP client")?;

    Ok(CachedFetcher::new(
        store,
        Arc::new(source),
        FetcherConfig {
            cache_key: config.cache.key.clone(),
            ttl: Duration::from_secs(config.cache.ttl_secs),
        },
    ))
}

/// Render the record set as an aligned plain-text table
fn format_text_table(record_set: &CachedRecordSet) -> String {
    if record_set.is_empty() {
        return "No data available.\n".to_string();
    }

    let columns = record_set.columns();
    let rows: Vec<Vec<String>> = record_set
        .rows
        .iter()
        .map(|(_, row)| columns.iter().map(|c| row.cell(*c)).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            rows.iter()
                .map(|cells| cells[i].chars().count())
                .chain(std::iter::once(c.label().len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = String::new();
    if !record_set.title.is_empty() {
        out.push_str(&record_set.title);
        out.push_str("\n\n");
    }
    out.push_str(&format_line(columns.iter().map(Column::label).collect()));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format_line(rule.iter().map(String::as_str).collect()));
    for cells in &rows {
        out.push_str(&format_line(cells.iter().map(String::as_str).collect()));
    }
    out
}

/// Initialize logging; output goes to stderr so command output stays clean
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
