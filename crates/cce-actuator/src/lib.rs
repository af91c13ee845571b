//! Machine actuator for CCE clusters on Baidu Cloud Compute.
//!
//! Turns Cluster/Machine resources into BCC instances and joins them to the
//! cluster by running a role-specific startup script over SSH once the
//! instance is up.

pub mod actuator;
pub mod bootstrap;
pub mod cluster;
pub mod config;
pub mod provider_config;
pub mod resolver;
pub mod scripts;
pub mod token;

#[cfg(test)]
mod testing;

pub use actuator::MachineActuator;
pub use bootstrap::Bootstrapper;
pub use cluster::ClusterActuator;
pub use config::{ActuatorConfig, BootstrapConfig};
pub use resolver::InstanceResolver;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("compute error: {0}")]
    Compute(#[from] cce_infra::Error),

    #[error("resource store error: {0}")]
    Store(#[from] cce_db::Error),

    #[error("invalid provider config: {0}")]
    ProviderConfig(String),

    #[error("create returned {0} instance ids, expected exactly one")]
    InstanceCount(usize),

    #[error("startup script: {0}")]
    Script(#[from] scripts::ScriptError),

    #[error("cluster {0} has no master instance")]
    NoMaster(String),

    #[error("instance {0} has no {1} address")]
    NoAddress(String, &'static str),

    #[error("machine {0} has no admin password")]
    NoAdminPass(String),

    #[error("bootstrap input missing: {0}")]
    MissingInput(&'static str),

    #[error("configured bootstrap token is malformed")]
    InvalidToken,
}

pub type Result<T> = std::result::Result<T, Error>;
