use std::sync::Arc;

use cce_db::status::InstanceLifecycle;
use cce_db::{BootstrapPhase, BootstrapState, Cluster, Machine, MachineRole, ResourceClient};
use cce_infra::types::{InstanceId, InstanceSpec, PaymentTiming, SshTarget};
use cce_infra::{ComputeService, RemoteShell};
use tracing::{debug, info, warn};

use crate::bootstrap::Bootstrapper;
use crate::config::ActuatorConfig;
use crate::provider_config::MachineProviderConfig;
use crate::resolver::InstanceResolver;
use crate::token::{generate_bootstrap_token, is_valid_bootstrap_token};
use crate::{Error, Result};

const KUBECONFIG_PATH: &str = "/root/.kube/config";

/// Creates, deletes and inspects the BCC instance behind each machine.
pub struct MachineActuator {
    compute: Arc<dyn ComputeService>,
    shell: Arc<dyn RemoteShell>,
    resources: Arc<dyn ResourceClient>,
    resolver: InstanceResolver,
    bootstrapper: Bootstrapper,
    config: ActuatorConfig,
}

impl MachineActuator {
    pub fn new(
        compute: Arc<dyn ComputeService>,
        shell: Arc<dyn RemoteShell>,
        resources: Arc<dyn ResourceClient>,
        config: ActuatorConfig,
    ) -> Result<Self> {
        if let Some(token) = &config.bootstrap_token
            && !is_valid_bootstrap_token(token)
        {
            return Err(Error::InvalidToken);
        }

        let bootstrapper = Bootstrapper::new(
            compute.clone(),
            shell.clone(),
            resources.clone(),
            config.bootstrap.clone(),
        );
        Ok(Self {
            resolver: InstanceResolver::new(compute.clone()),
            compute,
            shell,
            resources,
            bootstrapper,
            config,
        })
    }

    pub fn bootstrapper(&self) -> &Bootstrapper {
        &self.bootstrapper
    }

    pub fn resolver(&self) -> &InstanceResolver {
        &self.resolver
    }

    /// Provision the machine's instance and start bootstrapping it.
    ///
    /// Returns once the new state is persisted; the bootstrap outcome lands
    /// in the machine's `status.bootstrap` later.
    pub async fn create(&self, cluster: &mut Cluster, machine: &mut Machine) -> Result<()> {
        let key = machine.key();

        if let Some(instance) = self.resolver.instance_if_exists(machine).await? {
            info!(machine = %key, instance_id = %instance.id, "instance already exists, skipping create");
            let done = machine.status.bootstrap_phase() == Some(BootstrapPhase::Succeeded);
            if !done && !self.bootstrapper.is_running(&key).await {
                info!(machine = %key, "relaunching bootstrap");
                self.bootstrapper.launch(cluster.clone(), machine.clone()).await;
            }
            return Ok(());
        }

        let provider = MachineProviderConfig::from_provider_spec(&machine.spec.provider_spec)?;
        let spec = self.instance_spec(machine, &provider);
        info!(
            machine = %key,
            role = %provider.role,
            image_id = %spec.image_id,
            cpu = spec.cpu_count,
            memory_gb = spec.memory_capacity_in_gb,
            "creating instance"
        );

        let ids = self.compute.create_instances(&spec).await?;
        let [id] = ids.as_slice() else {
            return Err(Error::InstanceCount(ids.len()));
        };
        info!(machine = %key, instance_id = %id, "instance created");

        let status = &mut machine.status;
        status.instance_id = Some(id.to_string());
        status.instance_status = Some(InstanceLifecycle::Created);
        status.admin_pass = provider.admin_pass.clone().filter(|p| !p.is_empty());
        status.kubelet_version =
            Some(machine.spec.versions.kubelet.clone()).filter(|v| !v.is_empty());
        status.bootstrap = Some(BootstrapState::pending());
        status.role = Some(provider.role);

        if provider.role == MachineRole::Master {
            let token = self.bootstrap_token(cluster);
            cluster.status.master_instance_id = Some(id.to_string());
            cluster.status.cluster_token = Some(token);
        }

        self.resources.update_cluster(cluster).await?;
        self.resources.update_machine(machine).await?;

        self.bootstrapper.launch(cluster.clone(), machine.clone()).await;
        Ok(())
    }

    /// Remove the machine's node from the cluster, then release its
    /// instance. Missing or not-yet-visible instances are left alone.
    pub async fn delete(&self, cluster: &Cluster, machine: &Machine) -> Result<()> {
        let key = machine.key();
        if self.bootstrapper.cancel(&key).await {
            info!(machine = %key, "cancelled in-flight bootstrap");
        }

        if machine.status.instance_id.is_some() {
            self.remove_node(cluster, machine).await;
        }

        let Some(instance) = self.resolver.instance_if_exists(machine).await? else {
            info!(machine = %key, cluster = %cluster.name(), "no instance recorded, nothing to delete");
            return Ok(());
        };
        if instance.is_placeholder() {
            warn!(machine = %key, instance_id = %instance.id, "instance not visible at provider, skipping delete");
            return Ok(());
        }

        self.compute.delete_instance(&instance.id).await?;
        info!(machine = %key, instance_id = %instance.id, "instance deleted");

        tokio::time::sleep(self.config.delete_settle).await;
        Ok(())
    }

    pub async fn exists(&self, _cluster: &Cluster, machine: &Machine) -> Result<bool> {
        Ok(self.resolver.instance_if_exists(machine).await?.is_some())
    }

    pub async fn update(&self, cluster: &Cluster, machine: &Machine) -> Result<()> {
        info!(machine = %machine.key(), cluster = %cluster.name(), "update requested, nothing to do");
        Ok(())
    }

    /// Public address of the machine's instance, or an empty string.
    pub async fn get_ip(&self, _cluster: &Cluster, machine: &Machine) -> Result<String> {
        let instance = self.resolver.instance_if_exists(machine).await?;
        Ok(instance.and_then(|i| i.public_ip).unwrap_or_default())
    }

    /// Admin kubeconfig read from the cluster's master.
    pub async fn get_kube_config(&self, cluster: &Cluster, master: &Machine) -> Result<String> {
        let target = self.master_target(cluster, master).await?;
        let command = format!("cat {KUBECONFIG_PATH}");
        Ok(self.shell.run_command(&target, &command).await?)
    }

    /// Delete the machine's Node object through kubectl on the master.
    /// Failures are logged; they never block releasing the instance.
    async fn remove_node(&self, cluster: &Cluster, machine: &Machine) {
        let key = machine.key();
        let node = machine.name();
        if !is_node_name(node) {
            warn!(machine = %key, node, "not a valid node name, skipping node removal");
            return;
        }

        let master = match self.resources.master_machine(cluster).await {
            Ok(Some(master)) => master,
            Ok(None) => {
                debug!(machine = %key, "cluster has no master machine, skipping node removal");
                return;
            }
            Err(e) => {
                warn!(machine = %key, error = %e, "cannot look up master, skipping node removal");
                return;
            }
        };

        let command =
            format!("kubectl --kubeconfig {KUBECONFIG_PATH} delete node {node} --ignore-not-found");
        let removed = async {
            let target = self.master_target(cluster, &master).await?;
            Ok::<_, Error>(self.shell.run_command(&target, &command).await?)
        };
        match removed.await {
            Ok(_) => info!(machine = %key, node, "node removed from cluster"),
            Err(e) => warn!(machine = %key, node, error = %e, "failed to remove node, releasing instance anyway"),
        }
    }

    async fn master_target(&self, cluster: &Cluster, master: &Machine) -> Result<SshTarget> {
        let id = cluster
            .status
            .master_instance_id
            .as_deref()
            .ok_or_else(|| Error::NoMaster(cluster.name().to_string()))?;
        let instance = self.compute.describe_instance(&InstanceId::from(id)).await?;

        let target = SshTarget {
            user: self.config.bootstrap.ssh_user.clone(),
            host: instance
                .public_ip
                .ok_or_else(|| Error::NoAddress(id.to_string(), "public"))?,
            password: master
                .status
                .admin_pass
                .clone()
                .ok_or_else(|| Error::NoAdminPass(master.name().to_string()))?,
        };
        Ok(target)
    }

    fn bootstrap_token(&self, cluster: &Cluster) -> String {
        cluster
            .status
            .cluster_token
            .clone()
            .or_else(|| self.config.bootstrap_token.clone())
            .unwrap_or_else(generate_bootstrap_token)
    }

    fn instance_spec(&self, machine: &Machine, provider: &MachineProviderConfig) -> InstanceSpec {
        InstanceSpec {
            name: provider
                .name
                .clone()
                .unwrap_or_else(|| machine.name().to_string()),
            image_id: provider.image_id.clone(),
            cpu_count: provider.cpu_count,
            memory_capacity_in_gb: provider.memory_capacity_in_gb,
            admin_pass: provider.admin_pass.clone(),
            root_disk_size_in_gb: provider.root_disk_size_in_gb,
            root_disk_storage_type: provider.root_disk_storage_type.clone(),
            network_capacity_in_mbps: provider
                .network_capacity_in_mbps
                .unwrap_or(self.config.network_capacity_in_mbps),
            zone_name: provider.zone_name.clone(),
            subnet_id: provider.subnet_id.clone(),
            security_group_id: provider.security_group_id.clone(),
            purchase_count: 1,
            payment_timing: PaymentTiming::Postpaid,
        }
    }
}

/// RFC 1123 subdomain, the form Kubernetes requires of node names.
fn is_node_name(name: &str) -> bool {
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    !name.is_empty()
        && name.len() <= 253
        && name.starts_with(alnum)
        && name.ends_with(alnum)
        && name.chars().all(|c| alnum(c) || c == '-' || c == '.')
}
