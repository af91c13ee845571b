use cce_db::MachineRole;
use cce_db::models::ProviderSpec;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Sizing, image and role of a machine, carried in its provider spec.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineProviderConfig {
    pub role: MachineRole,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub cluster_name: String,

    pub image_id: String,
    pub cpu_count: u32,
    #[serde(rename = "memoryCapacityInGB")]
    pub memory_capacity_in_gb: u32,
    #[serde(default)]
    pub root_disk_size_in_gb: Option<u32>,
    #[serde(default)]
    pub root_disk_storage_type: Option<String>,
    #[serde(default)]
    pub network_capacity_in_mbps: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub admin_pass: Option<String>,
    #[serde(default)]
    pub zone_name: Option<String>,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub security_group_id: Option<String>,
}

impl MachineProviderConfig {
    pub fn from_provider_spec(spec: &ProviderSpec) -> Result<Self> {
        let config: Self = decode(spec)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.image_id.trim().is_empty() {
            return Err(Error::ProviderConfig("imageId is empty".into()));
        }
        if self.cpu_count == 0 || self.memory_capacity_in_gb == 0 {
            return Err(Error::ProviderConfig(
                "cpuCount and memoryCapacityInGB must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Cluster-wide provider settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProviderConfig {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(rename = "clusterCIDR", default)]
    pub cluster_cidr: String,
    #[serde(default)]
    pub cluster_version: String,
    #[serde(default)]
    pub vpc_id: String,
    #[serde(default)]
    pub region: String,
}

impl ClusterProviderConfig {
    pub fn from_provider_spec(spec: &ProviderSpec) -> Result<Self> {
        decode(spec)
    }
}

/// A provider spec is either a JSON document or a string holding YAML.
fn decode<T: DeserializeOwned>(spec: &ProviderSpec) -> Result<T> {
    match &spec.value {
        None => Err(Error::ProviderConfig("provider spec is empty".into())),
        Some(serde_json::Value::String(raw)) => {
            serde_yaml::from_str(raw).map_err(|e| Error::ProviderConfig(e.to_string()))
        }
        Some(value) => {
            T::deserialize(value).map_err(|e| Error::ProviderConfig(e.to_string()))
        }
    }
}
