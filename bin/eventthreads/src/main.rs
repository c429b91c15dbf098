//! # EventThreads Binary
//!
//! The entry point that assembles the application from its plugins.

use std::sync::Arc;

use et_api::handlers::AppState;
use et_api::metrics::{spawn_event_recorder, Metrics};
use et_api::middleware::{cors_policy, standard_middleware};
use et_auth_simple::{AdminAccount, SimpleAuthProvider};
use et_config::{LogFormat, LogSettings, Settings};
use et_core::admin::AdminProjection;
use et_core::engine::MembershipEngine;
use et_core::registry::ThreadRegistry;
use et_core::traits::{Clock, SystemClock, UserRepo};
use et_store_memory::{MemoryThreadRepo, MemoryUserRepo};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log);
    let addr = settings.bind_addr();

    // 1. Stores and clock
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let users: Arc<dyn UserRepo> = Arc::new(MemoryUserRepo::new(clock.clone()));
    let registry = Arc::new(ThreadRegistry::new(Arc::new(MemoryThreadRepo::new()), clock));

    // 2. Identity
    let admin = match (settings.admin.username, settings.admin.password_hash) {
        (Some(username), Some(password_hash)) => Some(AdminAccount {
            username,
            password_hash,
        }),
        _ => {
            warn!("no admin account configured; the admin dashboard is unreachable");
            None
        }
    };
    let auth = Arc::new(SimpleAuthProvider::new(users.clone(), admin));
    if let Some(user) = auth.ensure_admin().await? {
        info!(user_id = %user.id, username = %user.username, "admin account ready");
    }

    // 3. Core services and metrics
    let metrics = Arc::new(Metrics::new());
    spawn_event_recorder(metrics.clone(), registry.events().subscribe());

    let state = Arc::new(AppState {
        auth,
        engine: Arc::new(MembershipEngine::new(registry.clone(), users.clone())),
        admin: Arc::new(AdminProjection::new(registry.clone(), users)),
        registry,
        metrics,
    });

    let app = et_api::configure_routes(state)
        .layer(cors_policy(settings.server.cors_allow_any_origin))
        .layer(standard_middleware());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "🚀 EventThreads listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("shut down cleanly");
    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    match log.format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
