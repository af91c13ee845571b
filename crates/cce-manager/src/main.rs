mod auth;
mod config;
mod dto;
mod error;
mod reconciler;
mod routes;
mod state;

use std::sync::Arc;

use cce_actuator::{ClusterActuator, MachineActuator};
use cce_db::PgResourceStore;
use cce_infra::bcc::BccComputeService;
use cce_infra::ssh::SshPassShell;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::reconciler::spawn_reconciler;
use crate::routes::api_router;
use crate::state::{AppState, MachineLocks};

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    // Database
    let db = cce_db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");

    cce_db::run_migrations(&db)
        .await
        .expect("failed to run migrations");

    let store = PgResourceStore::new(db);

    // Cloud + remote execution
    let compute = Arc::new(BccComputeService::from_env().expect("failed to configure BCC compute"));
    let shell = Arc::new(SshPassShell::default());

    let machines = MachineActuator::new(
        compute,
        shell,
        Arc::new(store.clone()),
        config.actuator_config(),
    )
    .expect("invalid actuator configuration");

    let state = AppState {
        store,
        machines: Arc::new(machines),
        clusters: ClusterActuator::new(),
        machine_locks: MachineLocks::default(),
        config: config.clone(),
    };

    spawn_reconciler(state.clone(), config.reconcile_interval_secs);

    let app = api_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("failed to bind listener");

    tracing::info!(addr = %config.listen_addr, "starting machine manager");

    axum::serve(listener, app).await.expect("server error");
}
