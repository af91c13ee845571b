//! Typed status persisted on Cluster and Machine resources.
//!
//! Serialized field names are the annotation keys the provider has always
//! used (`instanceID`, `kubelet-version`, `masterInstanceID`, ...), so stored
//! resources stay readable by existing tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version written into every status this build produces.
pub const STATUS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("unsupported status schema version {0}")]
    UnsupportedVersion(u32),

    #[error("{0} is set but instanceID is missing")]
    MissingInstanceId(&'static str),

    #[error("{0} is present but empty")]
    EmptyField(&'static str),

    #[error("clusterToken is not a bootstrap token")]
    MalformedToken,
}

fn current_version() -> u32 {
    STATUS_SCHEMA_VERSION
}

/// Role a machine plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineRole {
    Master,
    Node,
}

impl MachineRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Node => "node",
        }
    }
}

impl std::fmt::Display for MachineRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle marker written once the cloud accepted the create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceLifecycle {
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BootstrapPhase {
    Pending,
    Running,
    Succeeded,
    TimedOut,
    Failed,
    RemoteFailed,
}

impl BootstrapPhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Terminal phases a reconciler should retry.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::TimedOut | Self::Failed | Self::RemoteFailed)
    }
}

/// Outcome of the post-create bootstrap of one machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapState {
    pub phase: BootstrapPhase,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl BootstrapState {
    pub fn new(phase: BootstrapPhase, attempts: u32, message: Option<String>) -> Self {
        Self {
            phase,
            attempts,
            message,
            updated_at: Utc::now(),
        }
    }

    pub fn pending() -> Self {
        Self::new(BootstrapPhase::Pending, 0, None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineStatus {
    #[serde(rename = "schemaVersion", default = "current_version")]
    pub schema_version: u32,

    #[serde(rename = "instanceID", default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    #[serde(rename = "instanceStatus", default, skip_serializing_if = "Option::is_none")]
    pub instance_status: Option<InstanceLifecycle>,

    #[serde(rename = "instanceAdminPass", default, skip_serializing_if = "Option::is_none")]
    pub admin_pass: Option<String>,

    #[serde(rename = "kubelet-version", default, skip_serializing_if = "Option::is_none")]
    pub kubelet_version: Option<String>,

    #[serde(rename = "instanceRole", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MachineRole>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapState>,
}

impl Default for MachineStatus {
    fn default() -> Self {
        Self {
            schema_version: STATUS_SCHEMA_VERSION,
            instance_id: None,
            instance_status: None,
            admin_pass: None,
            kubelet_version: None,
            role: None,
            bootstrap: None,
        }
    }
}

impl MachineStatus {
    pub fn validate(&self) -> Result<(), StatusError> {
        if self.schema_version != STATUS_SCHEMA_VERSION {
            return Err(StatusError::UnsupportedVersion(self.schema_version));
        }
        non_empty("instanceID", self.instance_id.as_deref())?;
        non_empty("kubelet-version", self.kubelet_version.as_deref())?;
        if self.instance_id.is_none() {
            if self.instance_status.is_some() {
                return Err(StatusError::MissingInstanceId("instanceStatus"));
            }
            if self.role.is_some() {
                return Err(StatusError::MissingInstanceId("instanceRole"));
            }
        }
        Ok(())
    }

    pub fn bootstrap_phase(&self) -> Option<BootstrapPhase> {
        self.bootstrap.as_ref().map(|b| b.phase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    #[serde(rename = "schemaVersion", default = "current_version")]
    pub schema_version: u32,

    #[serde(rename = "masterInstanceID", default, skip_serializing_if = "Option::is_none")]
    pub master_instance_id: Option<String>,

    #[serde(rename = "clusterToken", default, skip_serializing_if = "Option::is_none")]
    pub cluster_token: Option<String>,
}

impl Default for ClusterStatus {
    fn default() -> Self {
        Self {
            schema_version: STATUS_SCHEMA_VERSION,
            master_instance_id: None,
            cluster_token: None,
        }
    }
}

impl ClusterStatus {
    pub fn validate(&self) -> Result<(), StatusError> {
        if self.schema_version != STATUS_SCHEMA_VERSION {
            return Err(StatusError::UnsupportedVersion(self.schema_version));
        }
        non_empty("masterInstanceID", self.master_instance_id.as_deref())?;
        if let Some(token) = &self.cluster_token
            && !is_valid_bootstrap_token(token)
        {
            return Err(StatusError::MalformedToken);
        }
        Ok(())
    }
}

fn non_empty(field: &'static str, value: Option<&str>) -> Result<(), StatusError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(StatusError::EmptyField(field)),
        _ => Ok(()),
    }
}

/// Bootstrap tokens look like `abcdef.0123456789abcdef`: six and sixteen
/// characters from `[a-z0-9]`.
pub fn is_valid_bootstrap_token(token: &str) -> bool {
    let valid = |part: &str, len: usize| {
        part.len() == len
            && part
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    };
    match token.split_once('.') {
        Some((id, secret)) => valid(id, 6) && valid(secret, 16),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_status_uses_annotation_keys() {
        let status = MachineStatus {
            instance_id: Some("i-abc".into()),
            instance_status: Some(InstanceLifecycle::Created),
            admin_pass: Some("pw".into()),
            kubelet_version: Some("1.16.3".into()),
            role: Some(MachineRole::Master),
            ..Default::default()
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["instanceID"], "i-abc");
        assert_eq!(json["instanceStatus"], "Created");
        assert_eq!(json["instanceAdminPass"], "pw");
        assert_eq!(json["kubelet-version"], "1.16.3");
        assert_eq!(json["instanceRole"], "master");
        assert_eq!(json["schemaVersion"], 1);
        assert!(json.get("bootstrap").is_none());
    }

    #[test]
    fn cluster_status_uses_annotation_keys() {
        let status = ClusterStatus {
            master_instance_id: Some("i-master".into()),
            cluster_token: Some("abcdef.0123456789abcdef".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["masterInstanceID"], "i-master");
        assert_eq!(json["clusterToken"], "abcdef.0123456789abcdef");
    }

    #[test]
    fn missing_schema_version_reads_as_current() {
        let status: MachineStatus = serde_json::from_str(r#"{"instanceID":"i-1"}"#).unwrap();
        assert_eq!(status.schema_version, STATUS_SCHEMA_VERSION);
        assert!(status.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inconsistent_machine_status() {
        let status = MachineStatus {
            role: Some(MachineRole::Node),
            ..Default::default()
        };
        assert_eq!(
            status.validate(),
            Err(StatusError::MissingInstanceId("instanceRole"))
        );

        let status = MachineStatus {
            instance_id: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(status.validate(), Err(StatusError::EmptyField("instanceID")));

        let status = MachineStatus {
            schema_version: 7,
            ..Default::default()
        };
        assert_eq!(status.validate(), Err(StatusError::UnsupportedVersion(7)));
    }

    #[test]
    fn validate_rejects_malformed_cluster_token() {
        let status = ClusterStatus {
            cluster_token: Some("not-a-token".into()),
            ..Default::default()
        };
        assert_eq!(status.validate(), Err(StatusError::MalformedToken));
    }

    #[test]
    fn bootstrap_token_format() {
        assert!(is_valid_bootstrap_token("abcdef.0123456789abcdef"));
        assert!(!is_valid_bootstrap_token("ABCDEF.0123456789abcdef"));
        assert!(!is_valid_bootstrap_token("abcdef0123456789abcdef"));
        assert!(!is_valid_bootstrap_token("abcde.0123456789abcdef"));
        assert!(!is_valid_bootstrap_token(""));
    }

    #[test]
    fn bootstrap_phases() {
        assert!(!BootstrapPhase::Running.is_terminal());
        assert!(BootstrapPhase::Succeeded.is_terminal());
        assert!(!BootstrapPhase::Succeeded.is_failure());
        assert!(BootstrapPhase::TimedOut.is_failure());
        assert_eq!(
            serde_json::to_value(BootstrapPhase::RemoteFailed).unwrap(),
            "remoteFailed"
        );
    }
}
