//! Background bootstrap of freshly created instances.
//!
//! Once an instance reports `Running`, the role-specific startup script is
//! rendered and executed over SSH. One task runs per machine; launching a
//! new one for the same machine cancels the old.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cce_db::{BootstrapPhase, BootstrapState, Cluster, Machine, MachineKey, MachineRole, ResourceClient};
use cce_infra::types::{Instance, InstanceId, SshTarget};
use cce_infra::{ComputeService, RemoteShell};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BootstrapConfig;
use crate::resolver::InstanceResolver;
use crate::scripts::{self, ScriptParams};
use crate::{Error, Result};

struct Task {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct Bootstrapper {
    resolver: InstanceResolver,
    compute: Arc<dyn ComputeService>,
    shell: Arc<dyn RemoteShell>,
    resources: Arc<dyn ResourceClient>,
    config: BootstrapConfig,
    tasks: Arc<Mutex<HashMap<MachineKey, Task>>>,
    next_generation: Arc<AtomicU64>,
}

impl Bootstrapper {
    pub fn new(
        compute: Arc<dyn ComputeService>,
        shell: Arc<dyn RemoteShell>,
        resources: Arc<dyn ResourceClient>,
        config: BootstrapConfig,
    ) -> Self {
        Self {
            resolver: InstanceResolver::new(compute.clone()),
            compute,
            shell,
            resources,
            config,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start bootstrapping `machine` in the background.
    ///
    /// `cluster` and `machine` are snapshots taken after the create was
    /// persisted. A task already running for the same machine is cancelled.
    pub async fn launch(&self, cluster: Cluster, machine: Machine) -> JoinHandle<()> {
        let key = machine.key();
        let cancel = CancellationToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let previous = self.tasks.lock().await.insert(
            key.clone(),
            Task {
                generation,
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            info!(machine = %key, "superseding in-flight bootstrap");
            previous.cancel.cancel();
        }

        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(machine = %key, "bootstrap cancelled");
                }
                outcome = this.run(&cluster, &machine) => {
                    if !cancel.is_cancelled() {
                        this.record(&key, &outcome).await;
                    }
                }
            }
            this.forget(&key, generation).await;
        })
    }

    /// Cancel the task for `key`. Returns whether one was running.
    pub async fn cancel(&self, key: &MachineKey) -> bool {
        match self.tasks.lock().await.remove(key) {
            Some(task) => {
                task.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self, key: &MachineKey) -> bool {
        self.tasks.lock().await.contains_key(key)
    }

    async fn forget(&self, key: &MachineKey, generation: u64) {
        let mut tasks = self.tasks.lock().await;
        if tasks.get(key).is_some_and(|t| t.generation == generation) {
            tasks.remove(key);
        }
    }

    async fn record(&self, key: &MachineKey, state: &BootstrapState) {
        match state.phase {
            BootstrapPhase::Succeeded => info!(machine = %key, attempts = state.attempts, "bootstrap succeeded"),
            phase => warn!(
                machine = %key,
                ?phase,
                attempts = state.attempts,
                message = state.message.as_deref().unwrap_or(""),
                "bootstrap did not succeed"
            ),
        }
        if let Err(e) = self.resources.record_bootstrap(key, state).await {
            error!(machine = %key, error = %e, "failed to record bootstrap outcome");
        }
    }

    /// Drive one bootstrap to a terminal state.
    async fn run(&self, cluster: &Cluster, machine: &Machine) -> BootstrapState {
        let key = machine.key();
        let running = BootstrapState::new(BootstrapPhase::Running, 0, None);
        if let Err(e) = self.resources.record_bootstrap(&key, &running).await {
            warn!(machine = %key, error = %e, "failed to record bootstrap start");
        }

        let (instance, attempts) = match self.wait_until_running(machine).await {
            Ok(ready) => ready,
            Err(state) => return state,
        };

        let prepared = async {
            let script = self.render_script(cluster, machine, &instance).await?;
            let target = self.target(machine, &instance)?;
            Ok::<_, Error>((script, target))
        };
        let (script, target) = match prepared.await {
            Ok(prepared) => prepared,
            Err(e) => {
                return BootstrapState::new(BootstrapPhase::Failed, attempts, Some(e.to_string()));
            }
        };

        info!(machine = %key, instance_id = %instance.id, host = %target.host, "running startup script");
        match self.shell.run_script(&target, &script).await {
            Ok(output) => {
                debug!(machine = %key, %output, "startup script finished");
                BootstrapState::new(BootstrapPhase::Succeeded, attempts, None)
            }
            Err(e) => BootstrapState::new(BootstrapPhase::RemoteFailed, attempts, Some(e.to_string())),
        }
    }

    /// Poll until the instance is `Running`. Returns it with the attempt
    /// count, or the terminal state to record.
    async fn wait_until_running(
        &self,
        machine: &Machine,
    ) -> std::result::Result<(Instance, u32), BootstrapState> {
        let key = machine.key();
        let mut last = String::from("instance not checked yet");

        for attempt in 1..=self.config.max_attempts {
            tokio::time::sleep(self.config.poll_interval).await;

            match self.resolver.instance_if_exists(machine).await {
                Ok(Some(instance)) if instance.status.is_running() => {
                    debug!(machine = %key, attempt, "instance is running");
                    return Ok((instance, attempt));
                }
                Ok(Some(instance)) if instance.is_placeholder() => {
                    last = format!("instance {} not yet visible at provider", instance.id);
                }
                Ok(Some(instance)) => {
                    last = format!("instance {} is {}", instance.id, instance.status);
                }
                Ok(None) => {
                    let message = Error::MissingInput("instanceID").to_string();
                    return Err(BootstrapState::new(BootstrapPhase::Failed, attempt, Some(message)));
                }
                Err(e) => last = e.to_string(),
            }
            debug!(machine = %key, attempt, status = %last, "instance not ready");
        }

        Err(BootstrapState::new(
            BootstrapPhase::TimedOut,
            self.config.max_attempts,
            Some(last),
        ))
    }

    async fn render_script(
        &self,
        cluster: &Cluster,
        machine: &Machine,
        instance: &Instance,
    ) -> Result<String> {
        let role = machine.status.role.ok_or(Error::MissingInput("instanceRole"))?;
        let version = machine
            .status
            .kubelet_version
            .as_deref()
            .ok_or(Error::MissingInput("kubelet-version"))?;
        let network = &cluster.spec.cluster_network;
        let service_cidr = network
            .services
            .first()
            .ok_or(Error::MissingInput("service CIDR"))?;
        let pod_cidr = network.pods.first().ok_or(Error::MissingInput("pod CIDR"))?;
        let public_ip = instance
            .public_ip
            .as_deref()
            .ok_or_else(|| Error::NoAddress(instance.id.to_string(), "public"))?;
        let token = cluster
            .status
            .cluster_token
            .as_deref()
            .ok_or(Error::MissingInput("clusterToken"))?;

        let master = match role {
            MachineRole::Master => None,
            MachineRole::Node => Some(self.master_address(cluster).await?),
        };

        let params = ScriptParams {
            version,
            service_cidr,
            pod_cidr,
            public_ip,
            machine: instance.id.as_str(),
            token,
            master: master.as_deref(),
        };
        Ok(scripts::render(role, &params)?)
    }

    /// Internal address of the cluster's master instance.
    async fn master_address(&self, cluster: &Cluster) -> Result<String> {
        let id = cluster
            .status
            .master_instance_id
            .as_deref()
            .ok_or_else(|| Error::NoMaster(cluster.name().to_string()))?;
        let master = self.compute.describe_instance(&InstanceId::from(id)).await?;
        master
            .internal_ip
            .ok_or_else(|| Error::NoAddress(id.to_string(), "internal"))
    }

    fn target(&self, machine: &Machine, instance: &Instance) -> Result<SshTarget> {
        let host = instance
            .public_ip
            .clone()
            .ok_or_else(|| Error::NoAddress(instance.id.to_string(), "public"))?;
        let password = machine
            .status
            .admin_pass
            .clone()
            .ok_or_else(|| Error::NoAdminPass(machine.name().to_string()))?;
        Ok(SshTarget {
            user: self.config.ssh_user.clone(),
            host,
            password,
        })
    }
}
