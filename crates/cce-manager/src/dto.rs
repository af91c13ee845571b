use serde::{Deserialize, Serialize};

use cce_db::models::{ClusterSpec, MachineSpec};

#[derive(Debug, Deserialize)]
pub struct PutClusterRequest {
    #[serde(default)]
    pub spec: ClusterSpec,
}

#[derive(Debug, Deserialize)]
pub struct PutMachineRequest {
    #[serde(default)]
    pub spec: MachineSpec,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[derive(Debug, Serialize)]
pub struct IpResponse {
    pub ip: String,
}
