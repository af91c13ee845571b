use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use cce_actuator::{ActuatorConfig, BootstrapConfig};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub manager_api_key: String,
    pub ssh_user: String,
    pub bootstrap_poll_interval_secs: u64,
    pub bootstrap_max_attempts: u32,
    pub delete_settle_secs: u64,
    pub reconcile_interval_secs: u64,
    pub cluster_bootstrap_token: Option<String>,
}

impl AppConfig {
    /// BCC credentials (`BCC_ENDPOINT`, `BCC_AUTHORIZATION`) are read by
    /// `BccComputeService::from_env`.
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            listen_addr: env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".into())
                .parse()
                .expect("LISTEN_ADDR must be a valid socket address"),
            manager_api_key: env::var("MANAGER_API_KEY").expect("MANAGER_API_KEY must be set"),
            ssh_user: env::var("SSH_USER").unwrap_or_else(|_| "root".into()),
            bootstrap_poll_interval_secs: env::var("BOOTSTRAP_POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .expect("BOOTSTRAP_POLL_INTERVAL_SECS must be a valid u64"),
            bootstrap_max_attempts: env::var("BOOTSTRAP_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .expect("BOOTSTRAP_MAX_ATTEMPTS must be a valid u32"),
            delete_settle_secs: env::var("DELETE_SETTLE_SECS")
                .unwrap_or_else(|_| "3".into())
                .parse()
                .expect("DELETE_SETTLE_SECS must be a valid u64"),
            reconcile_interval_secs: env::var("RECONCILE_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .expect("RECONCILE_INTERVAL_SECS must be a valid u64"),
            cluster_bootstrap_token: env::var("CLUSTER_BOOTSTRAP_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
        }
    }

    pub fn actuator_config(&self) -> ActuatorConfig {
        ActuatorConfig {
            bootstrap: BootstrapConfig {
                poll_interval: Duration::from_secs(self.bootstrap_poll_interval_secs),
                max_attempts: self.bootstrap_max_attempts,
                ssh_user: self.ssh_user.clone(),
            },
            delete_settle: Duration::from_secs(self.delete_settle_secs),
            bootstrap_token: self.cluster_bootstrap_token.clone(),
            ..ActuatorConfig::default()
        }
    }
}
