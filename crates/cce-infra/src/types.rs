use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque provider-side instance identifier (e.g. a BCC `i-xxxxxxxx` id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How the provider bills the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentTiming {
    #[default]
    Postpaid,
    Prepaid,
}

impl PaymentTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postpaid => "Postpaid",
            Self::Prepaid => "Prepaid",
        }
    }
}

/// Specification for creating instances.
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub name: String,
    pub image_id: String,
    pub cpu_count: u32,
    pub memory_capacity_in_gb: u32,
    pub admin_pass: Option<String>,
    pub root_disk_size_in_gb: Option<u32>,
    pub root_disk_storage_type: Option<String>,
    /// Public (EIP) bandwidth.
    pub network_capacity_in_mbps: u32,
    pub zone_name: Option<String>,
    pub subnet_id: Option<String>,
    pub security_group_id: Option<String>,
    pub purchase_count: u32,
    pub payment_timing: PaymentTiming,
}

/// Provider-reported instance lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Running,
    Starting,
    Stopping,
    Stopped,
    Recharging,
    Deleted,
    Expired,
    Error,
    Unknown(String),
}

impl InstanceStatus {
    pub fn from_label(label: &str) -> Self {
        match label {
            "Running" => Self::Running,
            "Starting" => Self::Starting,
            "Stopping" => Self::Stopping,
            "Stopped" => Self::Stopped,
            "Recharging" => Self::Recharging,
            "Deleted" => Self::Deleted,
            "Expired" => Self::Expired,
            "Error" => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "Running",
            Self::Starting => "Starting",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Recharging => "Recharging",
            Self::Deleted => "Deleted",
            Self::Expired => "Expired",
            Self::Error => "Error",
            Self::Unknown(label) => label,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instance status and addressing returned from the provider.
#[derive(Debug, Clone)]
pub struct Instance {
    pub id: InstanceId,
    pub name: String,
    pub status: InstanceStatus,
    pub public_ip: Option<String>,
    pub internal_ip: Option<String>,
    /// `None` for placeholders; the provider always reports it otherwise.
    pub creation_time: Option<String>,
}

impl Instance {
    /// An instance known only by its id: the provider could not describe it.
    pub fn placeholder(id: InstanceId) -> Self {
        Self {
            id,
            name: String::new(),
            status: InstanceStatus::Unknown(String::new()),
            public_ip: None,
            internal_ip: None,
            creation_time: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.creation_time.as_deref().is_none_or(str::is_empty)
    }
}

/// Where and as whom to run a remote command.
#[derive(Clone)]
pub struct SshTarget {
    pub user: String,
    pub host: String,
    pub password: String,
}

impl fmt::Debug for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshTarget")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_labels_round_trip() {
        assert_eq!(InstanceStatus::from_label("Running"), InstanceStatus::Running);
        let odd = InstanceStatus::from_label("SnapshotProcessing");
        assert_eq!(odd.as_str(), "SnapshotProcessing");
        assert!(!odd.is_running());
    }

    #[test]
    fn placeholder_has_no_creation_time() {
        let inst = Instance::placeholder(InstanceId::from("i-gone"));
        assert!(inst.is_placeholder());
        assert_eq!(inst.id.as_str(), "i-gone");
        assert!(inst.public_ip.is_none());
    }

    #[test]
    fn ssh_target_debug_hides_password() {
        let target = SshTarget {
            user: "root".into(),
            host: "10.0.0.1".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{target:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("10.0.0.1"));
    }
}
