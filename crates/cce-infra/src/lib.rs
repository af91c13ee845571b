pub mod bcc;
pub mod ssh;
pub mod types;

use async_trait::async_trait;
use types::{Instance, InstanceId, InstanceSpec, SshTarget};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bcc provider error: {0}")]
    Bcc(#[from] bcc_api::Error),

    #[error("instance not found: {0}")]
    NotFound(String),

    #[error("remote command on {host} failed (exit {exit_code}): {output}")]
    Remote {
        host: String,
        exit_code: i32,
        output: String,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing env var: {0}")]
    MissingEnv(String),
}

impl Error {
    /// True for the provider's "no such instance" answer.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Bcc(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Cloud compute facade used by the machine actuator.
#[async_trait]
pub trait ComputeService: Send + Sync + 'static {
    /// Request `spec.purchase_count` new instances; returns their ids.
    async fn create_instances(&self, spec: &InstanceSpec) -> Result<Vec<InstanceId>>;

    /// Describe one instance. A missing instance must satisfy
    /// [`Error::is_not_found`].
    async fn describe_instance(&self, id: &InstanceId) -> Result<Instance>;

    /// Release an instance.
    async fn delete_instance(&self, id: &InstanceId) -> Result<()>;
}

/// Runs commands on a remote host with password credentials.
#[async_trait]
pub trait RemoteShell: Send + Sync + 'static {
    /// Run `script` through `bash -c`; returns combined stdout and stderr.
    async fn run_script(&self, target: &SshTarget, script: &str) -> Result<String>;

    /// Run a single command line; returns combined stdout and stderr.
    async fn run_command(&self, target: &SshTarget, command: &str) -> Result<String>;
}
