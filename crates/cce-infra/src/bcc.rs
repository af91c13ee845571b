use async_trait::async_trait;
use tracing::{debug, info};

use crate::types::{Instance, InstanceId, InstanceSpec, InstanceStatus};
use crate::{ComputeService, Error, Result};

const DEFAULT_ENDPOINT: &str = "https://bcc.bj.baidubce.com";
const DEFAULT_INSTANCE_TYPE: &str = "N3";

/// Baidu Cloud Compute provider.
///
/// Delegates to `bcc_api::BccClient` for all HTTP calls.
pub struct BccComputeService {
    client: bcc_api::BccClient,
    instance_type: String,
}

impl BccComputeService {
    pub fn new(client: bcc_api::BccClient, instance_type: impl Into<String>) -> Self {
        Self {
            client,
            instance_type: instance_type.into(),
        }
    }

    /// Create from env vars:
    ///
    /// - `BCC_AUTHORIZATION` (required)
    /// - `BCC_ENDPOINT` (default: `"https://bcc.bj.baidubce.com"`)
    /// - `BCC_INSTANCE_TYPE` (default: `"N3"`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let authorization = std::env::var("BCC_AUTHORIZATION")
            .map_err(|_| Error::MissingEnv("BCC_AUTHORIZATION".into()))?;
        let endpoint = std::env::var("BCC_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.into());
        let instance_type =
            std::env::var("BCC_INSTANCE_TYPE").unwrap_or_else(|_| DEFAULT_INSTANCE_TYPE.into());

        Ok(Self::new(
            bcc_api::BccClient::new(endpoint, authorization),
            instance_type,
        ))
    }

    fn create_request(&self, spec: &InstanceSpec) -> bcc_api::CreateInstanceRequest {
        bcc_api::CreateInstanceRequest {
            image_id: spec.image_id.clone(),
            billing: bcc_api::Billing {
                payment_timing: spec.payment_timing.as_str().into(),
            },
            instance_type: self.instance_type.clone(),
            cpu_count: spec.cpu_count,
            memory_capacity_in_gb: spec.memory_capacity_in_gb,
            root_disk_size_in_gb: spec.root_disk_size_in_gb,
            root_disk_storage_type: spec.root_disk_storage_type.clone(),
            network_capacity_in_mbps: Some(spec.network_capacity_in_mbps),
            purchase_count: spec.purchase_count,
            name: Some(spec.name.clone()),
            admin_pass: spec.admin_pass.clone(),
            zone_name: spec.zone_name.clone(),
            subnet_id: spec.subnet_id.clone(),
            security_group_id: spec.security_group_id.clone(),
        }
    }

    fn to_instance(raw: bcc_api::Instance) -> Instance {
        Instance {
            id: InstanceId(raw.id),
            name: raw.name,
            status: InstanceStatus::from_label(&raw.status),
            public_ip: raw.public_ip.filter(|ip| !ip.is_empty()),
            internal_ip: raw.internal_ip.filter(|ip| !ip.is_empty()),
            creation_time: raw.create_time,
        }
    }
}

#[async_trait]
impl ComputeService for BccComputeService {
    async fn create_instances(&self, spec: &InstanceSpec) -> Result<Vec<InstanceId>> {
        let ids = self
            .client
            .create_instances(&self.create_request(spec))
            .await?;

        info!(name = %spec.name, count = ids.len(), "bcc: instances created");
        Ok(ids.into_iter().map(InstanceId).collect())
    }

    async fn describe_instance(&self, id: &InstanceId) -> Result<Instance> {
        let raw = self.client.get_instance(id.as_str()).await?;
        debug!(instance_id = %id, status = %raw.status, "bcc: instance described");
        Ok(Self::to_instance(raw))
    }

    async fn delete_instance(&self, id: &InstanceId) -> Result<()> {
        self.client.delete_instance(id.as_str()).await?;
        info!(instance_id = %id, "bcc: instance deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentTiming;

    fn spec() -> InstanceSpec {
        InstanceSpec {
            name: "master-0".into(),
            image_id: "m-ubuntu".into(),
            cpu_count: 4,
            memory_capacity_in_gb: 8,
            admin_pass: Some("pw".into()),
            root_disk_size_in_gb: None,
            root_disk_storage_type: None,
            network_capacity_in_mbps: 1,
            zone_name: Some("zoneA".into()),
            subnet_id: None,
            security_group_id: None,
            purchase_count: 1,
            payment_timing: PaymentTiming::Postpaid,
        }
    }

    #[test]
    fn create_request_carries_sizing_and_billing() {
        let service = BccComputeService::new(bcc_api::BccClient::new("http://bcc", "auth"), "N3");
        let req = service.create_request(&spec());
        assert_eq!(req.instance_type, "N3");
        assert_eq!(req.cpu_count, 4);
        assert_eq!(req.memory_capacity_in_gb, 8);
        assert_eq!(req.purchase_count, 1);
        assert_eq!(req.billing.payment_timing, "Postpaid");
        assert_eq!(req.name.as_deref(), Some("master-0"));
        assert_eq!(req.zone_name.as_deref(), Some("zoneA"));
    }

    #[test]
    fn empty_addresses_become_none() {
        let inst = BccComputeService::to_instance(bcc_api::Instance {
            id: "i-1".into(),
            name: "n".into(),
            status: "Running".into(),
            create_time: Some("2019-01-01T00:00:00Z".into()),
            internal_ip: Some("192.168.0.2".into()),
            public_ip: Some(String::new()),
            image_id: None,
            zone_name: None,
        });
        assert!(inst.status.is_running());
        assert!(inst.public_ip.is_none());
        assert_eq!(inst.internal_ip.as_deref(), Some("192.168.0.2"));
        assert!(!inst.is_placeholder());
    }
}
