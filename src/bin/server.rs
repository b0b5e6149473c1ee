//! coderun HTTP server
//!
//! Accepts Python snippets over HTTP and runs them under resource limits.

use clap::Parser;
use coderun::config::{Config, LogConfig};
use coderun::pipeline::CodeRunner;
use coderun::server::{build_router, AppState};
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coderun-server", about = "Run Python snippets as a service", version)]
struct Args {
    /// Bind address
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    bind: String,

    /// Port
    #[arg(long, short, env = "PORT", default_value = "8000")]
    port: u16,
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_new(&log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if log.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let args = Args::parse();

    init_tracing(&config.log);
    info!("Starting coderun v{}", coderun::VERSION);

    let interpreter = which::which(&config.runtime.python_bin).map_err(|e| {
        anyhow::anyhow!(
            "Python interpreter '{}' not found: {}",
            config.runtime.python_bin,
            e
        )
    })?;
    info!("Using interpreter {}", interpreter.display());

    match &config.runtime.installer_bin {
        Some(installer) => match which::which(installer) {
            Ok(path) => info!("Using package manager {}", path.display()),
            Err(e) => warn!(
                "Package manager '{}' not found ({}); installs will fail",
                installer, e
            ),
        },
        None => info!("Installing packages via {} -m pip", interpreter.display()),
    }

    if config.auth.is_none() {
        warn!("BASIC_AUTH_USER/BASIC_AUTH_PASS not set; /run is unauthenticated");
    }
    info!(
        "Install policy: {}, up to {} concurrent executions",
        config.install.mode(),
        config.runtime.max_concurrent_executions
    );

    let runner = CodeRunner::from_config(&config);
    info!(
        "Executor '{}' with timeout {:?}",
        runner.executor_name(),
        runner.limits().wall_clock_timeout()
    );

    let app = build_router(AppState::new(runner, config.auth.clone()));

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
