use std::sync::Arc;

use cce_db::Machine;
use cce_infra::ComputeService;
use cce_infra::types::{Instance, InstanceId};
use tracing::{debug, warn};

/// Maps a machine's stored instance id to the live instance.
#[derive(Clone)]
pub struct InstanceResolver {
    compute: Arc<dyn ComputeService>,
}

impl InstanceResolver {
    pub fn new(compute: Arc<dyn ComputeService>) -> Self {
        Self { compute }
    }

    /// - no stored id: `None`
    /// - provider knows the instance: `Some(instance)`
    /// - provider answers not-found: `Some(placeholder)` carrying only the
    ///   id, so a lagging provider is never read as "deleted"
    ///
    /// Any other provider error is returned unchanged.
    pub async fn instance_if_exists(&self, machine: &Machine) -> cce_infra::Result<Option<Instance>> {
        let Some(raw_id) = machine.status.instance_id.as_deref() else {
            return Ok(None);
        };
        let id = InstanceId::from(raw_id);

        debug!(machine = %machine.key(), instance_id = %id, "checking instance existence");
        match self.compute.describe_instance(&id).await {
            Ok(instance) => Ok(Some(instance)),
            Err(e) if e.is_not_found() => {
                warn!(machine = %machine.key(), instance_id = %id, "instance not found at provider");
                Ok(Some(Instance::placeholder(id)))
            }
            Err(e) => Err(e),
        }
    }
}
