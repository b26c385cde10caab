use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use basecamp_backend_lib::{
    audit::{AuditLog, JsonFileSink},
    auth::{seed_admin, InMemoryDirectory},
    config::{LogFormat, Settings, DEFAULT_CONFIG_PATH},
    router::create_router,
    AppState,
};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Bullet Basecamp back office server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file
    #[arg(long, env = "BASECAMP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the bind address from the config file
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load_from(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }

    init_tracing(&settings);

    let sink = JsonFileSink::new(&settings.audit_log_path);
    info!(path = %sink.path().display(), "security events persisted to file");
    let (audit, _writer) = AuditLog::spawn(Arc::new(sink), settings.audit_log_capacity);

    let users = InMemoryDirectory::new();
    seed_admin(&settings, &users).await?;

    let addr = settings.bind_addr;
    let state = Arc::new(AppState::new(settings, Arc::new(users), audit.clone()));
    spawn_cleanup(state.clone());

    let app = create_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "back office listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("shutting down");
    audit.flush().await;
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match settings.log_format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Periodically drop expired sessions, lapsed blocks and idle limiter entries
fn spawn_cleanup(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let sessions = state.sessions.cleanup_expired().await;
            let addresses = state.tracker.cleanup();
            state.login_limiter.cleanup();
            if sessions > 0 || addresses > 0 {
                info!(sessions, addresses, "expired security state removed");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}
