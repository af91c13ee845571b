use cce_db::Cluster;
use tracing::{error, info};

use crate::Result;
use crate::provider_config::ClusterProviderConfig;

/// Cluster-level hooks. BCC clusters need no shared infrastructure, so
/// both operations only report what they were asked to do.
#[derive(Debug, Default, Clone)]
pub struct ClusterActuator;

impl ClusterActuator {
    pub fn new() -> Self {
        Self
    }

    pub async fn reconcile(&self, cluster: &Cluster) -> Result<()> {
        if cluster.spec.provider_spec.value.is_some() {
            match ClusterProviderConfig::from_provider_spec(&cluster.spec.provider_spec) {
                Ok(config) => info!(
                    cluster = %cluster.name(),
                    region = %config.region,
                    version = %config.cluster_version,
                    "reconciling cluster"
                ),
                Err(e) => error!(cluster = %cluster.name(), error = %e, "cannot decode cluster provider config"),
            }
        } else {
            info!(cluster = %cluster.name(), "reconciling cluster");
        }
        Ok(())
    }

    pub async fn delete(&self, cluster: &Cluster) -> Result<()> {
        info!(cluster = %cluster.name(), "deleting cluster");
        Ok(())
    }
}
