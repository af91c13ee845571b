use std::time::Duration;

use cce_db::{BootstrapPhase, Machine, MachineKey};
use tokio::task::JoinHandle;

use crate::state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Spawn the background loop that drives every machine toward its
/// desired state.
pub fn spawn_reconciler(state: AppState, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            if let Err(e) = reconcile_machines(&state).await {
                tracing::error!(error = %e, "machine reconcile pass failed");
            }
        }
    })
}

async fn reconcile_machines(state: &AppState) -> Result<(), BoxError> {
    let machines = state.store.list_machines().await?;
    for machine in machines {
        let key = machine.key();
        if let Err(e) = reconcile_machine(state, &key).await {
            tracing::error!(machine = %key, error = %e, "machine reconcile failed");
        }
    }
    Ok(())
}

async fn reconcile_machine(state: &AppState, key: &MachineKey) -> Result<(), BoxError> {
    let _guard = state.machine_locks.lock(key).await;

    // The API may have acted on the machine since it was listed.
    let mut machine = match state.store.get_machine(key).await {
        Ok(m) => m,
        Err(cce_db::Error::NotFound { .. }) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let mut cluster = state.store.get_cluster(&machine.cluster_name).await?;

    if machine.metadata.deletion_requested {
        state.machines.delete(&cluster, &machine).await?;
        state.store.remove_machine(key).await?;
        state.machine_locks.forget(key).await;
        tracing::info!(machine = %key, "machine removed");
        return Ok(());
    }

    let instance = state.machines.resolver().instance_if_exists(&machine).await?;
    let exists = instance.is_some();
    let placeholder = instance.as_ref().is_some_and(|i| i.is_placeholder());
    let in_flight = state.machines.bootstrapper().is_running(key).await;

    if placeholder {
        tracing::warn!(machine = %key, "instance not visible at the provider");
    }
    if needs_create(&machine, exists, placeholder, in_flight) {
        tracing::info!(machine = %key, exists, phase = ?machine.status.bootstrap_phase(), "actuating machine");
        state.machines.create(&mut cluster, &mut machine).await?;
    }
    Ok(())
}

/// Whether `create` has work to do: provision a missing instance, retry a
/// failed bootstrap, or resume one whose task was lost (e.g. on restart).
/// An instance the provider does not report cannot be bootstrapped, so a
/// placeholder is left alone until it shows up or the machine is deleted.
fn needs_create(machine: &Machine, exists: bool, placeholder: bool, bootstrap_in_flight: bool) -> bool {
    if !exists {
        return true;
    }
    if placeholder {
        return false;
    }
    match machine.status.bootstrap_phase() {
        Some(phase) if phase.is_failure() => true,
        Some(BootstrapPhase::Pending | BootstrapPhase::Running) => !bootstrap_in_flight,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cce_db::BootstrapState;
    use cce_db::models::ObjectMeta;

    fn machine(phase: Option<BootstrapPhase>) -> Machine {
        let mut m = Machine {
            metadata: ObjectMeta::named("worker-0"),
            cluster_name: "demo".into(),
            spec: Default::default(),
            status: Default::default(),
        };
        m.status.bootstrap = phase.map(|p| BootstrapState::new(p, 1, None));
        m
    }

    #[test]
    fn missing_instance_is_created() {
        assert!(needs_create(&machine(None), false, false, false));
    }

    #[test]
    fn failed_bootstrap_is_retried() {
        for phase in [
            BootstrapPhase::TimedOut,
            BootstrapPhase::Failed,
            BootstrapPhase::RemoteFailed,
        ] {
            assert!(needs_create(&machine(Some(phase)), true, false, false), "{phase:?}");
        }
    }

    #[test]
    fn healthy_machines_are_left_alone() {
        assert!(!needs_create(&machine(Some(BootstrapPhase::Succeeded)), true, false, false));
        assert!(!needs_create(&machine(Some(BootstrapPhase::Running)), true, false, true));
        assert!(!needs_create(&machine(None), true, false, false));
    }

    #[test]
    fn orphaned_bootstrap_is_resumed() {
        assert!(needs_create(&machine(Some(BootstrapPhase::Pending)), true, false, false));
        assert!(needs_create(&machine(Some(BootstrapPhase::Running)), true, false, false));
    }

    #[test]
    fn placeholder_instances_are_not_bootstrapped_again() {
        for phase in [
            None,
            Some(BootstrapPhase::Pending),
            Some(BootstrapPhase::Running),
            Some(BootstrapPhase::Failed),
            Some(BootstrapPhase::TimedOut),
        ] {
            assert!(!needs_create(&machine(phase), true, true, false), "{phase:?}");
        }
    }
}
