//! In-memory fakes of the actuator's collaborators.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cce_db::models::{ClusterNetwork, ClusterSpec, MachineSpec, MachineVersions, NetworkRanges, ObjectMeta, ProviderSpec};
use cce_db::{BootstrapState, Cluster, Machine, MachineKey, MachineRole, ResourceClient};
use cce_infra::types::{Instance, InstanceId, InstanceSpec, InstanceStatus, SshTarget};
use cce_infra::{ComputeService, RemoteShell};

use crate::config::{ActuatorConfig, BootstrapConfig};

pub const TOKEN: &str = "abcdef.0123456789abcdef";

pub fn cluster() -> Cluster {
    Cluster {
        metadata: ObjectMeta::named("demo"),
        spec: ClusterSpec {
            cluster_network: ClusterNetwork {
                services: NetworkRanges {
                    cidr_blocks: vec!["10.96.0.0/12".into()],
                },
                pods: NetworkRanges {
                    cidr_blocks: vec!["192.168.0.0/16".into()],
                },
                service_domain: "cluster.local".into(),
            },
            provider_spec: ProviderSpec::default(),
        },
        status: Default::default(),
    }
}

/// A cluster whose master already exists.
pub fn cluster_with_master(master_id: &str) -> Cluster {
    let mut c = cluster();
    c.status.master_instance_id = Some(master_id.into());
    c.status.cluster_token = Some(TOKEN.into());
    c
}

pub fn machine(name: &str, role: MachineRole) -> Machine {
    Machine {
        metadata: ObjectMeta::named(name),
        cluster_name: "demo".into(),
        spec: MachineSpec {
            versions: MachineVersions {
                kubelet: "1.16.3".into(),
                control_plane: None,
            },
            provider_spec: ProviderSpec {
                value: Some(serde_json::json!({
                    "role": role.as_str(),
                    "clusterName": "demo",
                    "imageId": "m-ubuntu1604",
                    "cpuCount": 2,
                    "memoryCapacityInGB": 4,
                    "adminPass": "Passw0rd!"
                })),
            },
        },
        status: Default::default(),
    }
}

pub fn fast_config() -> ActuatorConfig {
    ActuatorConfig {
        bootstrap: BootstrapConfig {
            poll_interval: Duration::from_millis(1),
            max_attempts: 3,
            ssh_user: "root".into(),
        },
        delete_settle: Duration::ZERO,
        bootstrap_token: None,
        network_capacity_in_mbps: 1,
    }
}

// ── Compute ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeCompute {
    inner: Mutex<ComputeState>,
}

#[derive(Default)]
struct ComputeState {
    instances: HashMap<String, Instance>,
    next_id: u32,
    ids_to_return: Option<Vec<String>>,
    boot_status: Option<InstanceStatus>,
    describe_failure: Option<u16>,
    creates: Vec<InstanceSpec>,
    deletes: Vec<InstanceId>,
    describes: usize,
}

impl FakeCompute {
    pub fn insert_instance(&self, id: &str, status: InstanceStatus) {
        let mut state = self.inner.lock().unwrap();
        state.next_id += 1;
        let n = state.next_id;
        state.instances.insert(id.to_string(), fake_instance(id, n, status));
    }

    pub fn set_status(&self, id: &str, status: InstanceStatus) {
        if let Some(instance) = self.inner.lock().unwrap().instances.get_mut(id) {
            instance.status = status;
        }
    }

    pub fn internal_ip(&self, id: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .instances
            .get(id)
            .and_then(|i| i.internal_ip.clone())
    }

    pub fn public_ip(&self, id: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .instances
            .get(id)
            .and_then(|i| i.public_ip.clone())
    }

    /// Ids the next create call answers with, regardless of purchase count.
    pub fn return_ids(&self, ids: &[&str]) {
        self.inner.lock().unwrap().ids_to_return =
            Some(ids.iter().map(|s| s.to_string()).collect());
    }

    /// Status new instances report. Defaults to `Running`.
    pub fn boot_as(&self, status: InstanceStatus) {
        self.inner.lock().unwrap().boot_status = Some(status);
    }

    pub fn fail_describe_with(&self, status: u16) {
        self.inner.lock().unwrap().describe_failure = Some(status);
    }

    pub fn create_count(&self) -> usize {
        self.inner.lock().unwrap().creates.len()
    }

    pub fn created_specs(&self) -> Vec<InstanceSpec> {
        self.inner.lock().unwrap().creates.clone()
    }

    pub fn delete_count(&self) -> usize {
        self.inner.lock().unwrap().deletes.len()
    }

    pub fn describe_count(&self) -> usize {
        self.inner.lock().unwrap().describes
    }
}

fn fake_instance(id: &str, n: u32, status: InstanceStatus) -> Instance {
    Instance {
        id: InstanceId::from(id),
        name: format!("instance-{n}"),
        status,
        public_ip: Some(format!("180.76.0.{n}")),
        internal_ip: Some(format!("192.168.0.{n}")),
        creation_time: Some("2019-03-01T08:00:00Z".into()),
    }
}

#[async_trait]
impl ComputeService for FakeCompute {
    async fn create_instances(&self, spec: &InstanceSpec) -> cce_infra::Result<Vec<InstanceId>> {
        let mut state = self.inner.lock().unwrap();
        state.creates.push(spec.clone());

        let ids = match state.ids_to_return.take() {
            Some(ids) => ids,
            None => (0..spec.purchase_count)
                .map(|i| format!("i-{:08}", state.next_id + i + 1))
                .collect(),
        };
        let status = state.boot_status.clone().unwrap_or(InstanceStatus::Running);
        for id in &ids {
            state.next_id += 1;
            let n = state.next_id;
            state
                .instances
                .insert(id.clone(), fake_instance(id, n, status.clone()));
        }
        Ok(ids.into_iter().map(InstanceId).collect())
    }

    async fn describe_instance(&self, id: &InstanceId) -> cce_infra::Result<Instance> {
        let mut state = self.inner.lock().unwrap();
        state.describes += 1;
        if let Some(code) = state.describe_failure {
            return Err(cce_infra::Error::Bcc(bcc_api::Error::Api {
                endpoint: "get instance",
                status: reqwest::StatusCode::from_u16(code).unwrap(),
                body: String::new(),
            }));
        }
        state
            .instances
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| cce_infra::Error::NotFound(id.to_string()))
    }

    async fn delete_instance(&self, id: &InstanceId) -> cce_infra::Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.deletes.push(id.clone());
        state.instances.remove(id.as_str());
        Ok(())
    }
}

// ── Remote shell ────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeShell {
    inner: Mutex<ShellState>,
}

#[derive(Default)]
struct ShellState {
    scripts: Vec<(SshTarget, String)>,
    commands: Vec<(SshTarget, String)>,
    fail: bool,
    delay: Duration,
    output: String,
}

impl FakeShell {
    pub fn fail(&self) {
        self.inner.lock().unwrap().fail = true;
    }

    pub fn delay(&self, delay: Duration) {
        self.inner.lock().unwrap().delay = delay;
    }

    pub fn respond_with(&self, output: &str) {
        self.inner.lock().unwrap().output = output.to_string();
    }

    pub fn scripts(&self) -> Vec<(SshTarget, String)> {
        self.inner.lock().unwrap().scripts.clone()
    }

    pub fn commands(&self) -> Vec<(SshTarget, String)> {
        self.inner.lock().unwrap().commands.clone()
    }

    fn answer(&self, target: &SshTarget) -> cce_infra::Result<String> {
        let state = self.inner.lock().unwrap();
        if state.fail {
            return Err(cce_infra::Error::Remote {
                host: target.host.clone(),
                exit_code: 1,
                output: "kubeadm: command not found".into(),
            });
        }
        Ok(state.output.clone())
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn run_script(&self, target: &SshTarget, script: &str) -> cce_infra::Result<String> {
        let delay = self.inner.lock().unwrap().delay;
        tokio::time::sleep(delay).await;
        self.inner
            .lock()
            .unwrap()
            .scripts
            .push((target.clone(), script.to_string()));
        self.answer(target)
    }

    async fn run_command(&self, target: &SshTarget, command: &str) -> cce_infra::Result<String> {
        self.inner
            .lock()
            .unwrap()
            .commands
            .push((target.clone(), command.to_string()));
        self.answer(target)
    }
}

// ── Resources ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeResources {
    inner: Mutex<ResourceState>,
}

#[derive(Default)]
struct ResourceState {
    clusters: HashMap<String, Cluster>,
    machines: HashMap<MachineKey, Machine>,
    cluster_updates: usize,
    machine_updates: usize,
    bootstrap: HashMap<MachineKey, Vec<BootstrapState>>,
}

impl FakeResources {
    /// (cluster updates, machine updates)
    pub fn update_counts(&self) -> (usize, usize) {
        let state = self.inner.lock().unwrap();
        (state.cluster_updates, state.machine_updates)
    }

    pub fn stored_cluster(&self, name: &str) -> Option<Cluster> {
        self.inner.lock().unwrap().clusters.get(name).cloned()
    }

    pub fn stored_machine(&self, key: &MachineKey) -> Option<Machine> {
        self.inner.lock().unwrap().machines.get(key).cloned()
    }

    pub fn bootstrap_history(&self, key: &MachineKey) -> Vec<BootstrapState> {
        self.inner
            .lock()
            .unwrap()
            .bootstrap
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Wait until a terminal bootstrap phase is recorded for `key`.
    pub async fn wait_for_terminal(&self, key: &MachineKey) -> BootstrapState {
        let wait = async {
            loop {
                if let Some(state) = self
                    .bootstrap_history(key)
                    .into_iter()
                    .rev()
                    .find(|s| s.phase.is_terminal())
                {
                    return state;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("bootstrap did not finish")
    }
}

#[async_trait]
impl ResourceClient for FakeResources {
    async fn update_cluster(&self, cluster: &Cluster) -> cce_db::Result<()> {
        cluster.status.validate()?;
        let mut state = self.inner.lock().unwrap();
        state.cluster_updates += 1;
        state
            .clusters
            .insert(cluster.name().to_string(), cluster.clone());
        Ok(())
    }

    async fn update_machine(&self, machine: &Machine) -> cce_db::Result<()> {
        machine.status.validate()?;
        let mut state = self.inner.lock().unwrap();
        state.machine_updates += 1;
        state.machines.insert(machine.key(), machine.clone());
        Ok(())
    }

    async fn record_bootstrap(
        &self,
        key: &MachineKey,
        bootstrap: &BootstrapState,
    ) -> cce_db::Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(machine) = state.machines.get_mut(key) {
            machine.status.bootstrap = Some(bootstrap.clone());
        }
        state
            .bootstrap
            .entry(key.clone())
            .or_default()
            .push(bootstrap.clone());
        Ok(())
    }

    async fn master_machine(&self, cluster: &Cluster) -> cce_db::Result<Option<Machine>> {
        let Some(master_id) = cluster.status.master_instance_id.as_deref() else {
            return Ok(None);
        };
        let state = self.inner.lock().unwrap();
        Ok(state
            .machines
            .values()
            .find(|m| {
                m.cluster_name == cluster.name()
                    && m.status.instance_id.as_deref() == Some(master_id)
            })
            .cloned())
    }
}
