use serde::{Deserialize, Serialize};

// ── Instance types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    pub image_id: String,
    pub billing: Billing,
    pub instance_type: String,
    pub cpu_count: u32,
    #[serde(rename = "memoryCapacityInGB")]
    pub memory_capacity_in_gb: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_disk_size_in_gb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_disk_storage_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_capacity_in_mbps: Option<u32>,
    pub purchase_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_pass: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Billing {
    pub payment_timing: String,
}

impl Billing {
    pub fn postpaid() -> Self {
        Self {
            payment_timing: "Postpaid".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceResponse {
    #[serde(default)]
    pub instance_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetInstanceResponse {
    pub instance: Instance,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub internal_ip: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub zone_name: Option<String>,
}
