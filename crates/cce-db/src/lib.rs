pub mod models;
pub mod status;
pub mod store;

pub use models::{Cluster, Machine, MachineKey};
pub use status::{BootstrapPhase, BootstrapState, ClusterStatus, MachineRole, MachineStatus};
pub use store::{PgResourceStore, ResourceClient};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("invalid status: {0}")]
    Status(#[from] status::StatusError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Create a connection pool to PostgreSQL.
pub async fn create_pool(database_url: &str) -> std::result::Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
