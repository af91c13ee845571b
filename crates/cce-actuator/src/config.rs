use std::time::Duration;

/// Post-create bootstrap tuning.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Pause before each readiness check.
    pub poll_interval: Duration,
    pub max_attempts: u32,
    /// Remote user the startup script runs as.
    pub ssh_user: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            max_attempts: 10,
            ssh_user: "root".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActuatorConfig {
    pub bootstrap: BootstrapConfig,
    /// Pause after a delete call so the provider converges before the
    /// caller observes the machine again.
    pub delete_settle: Duration,
    /// Fixed cluster token instead of a generated one.
    pub bootstrap_token: Option<String>,
    /// Public bandwidth for new instances when the machine does not set one.
    pub network_capacity_in_mbps: u32,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            bootstrap: BootstrapConfig::default(),
            delete_settle: Duration::from_secs(3),
            bootstrap_token: None,
            network_capacity_in_mbps: 1,
        }
    }
}
