use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use cce_db::models::ObjectMeta;
use cce_db::{Cluster, Machine, MachineKey};

use crate::dto::{ExistsResponse, IpResponse, PutMachineRequest};
use crate::error::ApiError;
use crate::state::AppState;

async fn load(state: &AppState, cluster: &str, machine: &str) -> Result<(Cluster, Machine), ApiError> {
    let c = state.store.get_cluster(cluster).await?;
    let m = state.store.get_machine(&MachineKey::new(cluster, machine)).await?;
    Ok((c, m))
}

pub async fn put_machine(
    State(state): State<AppState>,
    Path((cluster, name)): Path<(String, String)>,
    Json(req): Json<PutMachineRequest>,
) -> Result<Json<Machine>, ApiError> {
    // Machines cannot outlive their cluster.
    state.store.get_cluster(&cluster).await?;

    let machine = Machine {
        metadata: ObjectMeta::named(name),
        cluster_name: cluster,
        spec: req.spec,
        status: Default::default(),
    };
    Ok(Json(state.store.upsert_machine(&machine).await?))
}

pub async fn get_machine(
    State(state): State<AppState>,
    Path((cluster, name)): Path<(String, String)>,
) -> Result<Json<Machine>, ApiError> {
    let machine = state.store.get_machine(&MachineKey::new(cluster, name)).await?;
    Ok(Json(machine))
}

/// Mark the machine for deletion; the reconciler releases the instance
/// and removes the resource.
pub async fn request_deletion(
    State(state): State<AppState>,
    Path((cluster, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .request_machine_deletion(&MachineKey::new(cluster, name))
        .await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn create(
    State(state): State<AppState>,
    Path((cluster, name)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Machine>), ApiError> {
    let _guard = state.machine_locks.lock(&MachineKey::new(&cluster, &name)).await;
    let (mut cluster, mut machine) = load(&state, &cluster, &name).await?;
    state.machines.create(&mut cluster, &mut machine).await?;
    Ok((StatusCode::ACCEPTED, Json(machine)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((cluster, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let _guard = state.machine_locks.lock(&MachineKey::new(&cluster, &name)).await;
    let (cluster, machine) = load(&state, &cluster, &name).await?;
    state.machines.delete(&cluster, &machine).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn exists(
    State(state): State<AppState>,
    Path((cluster, name)): Path<(String, String)>,
) -> Result<Json<ExistsResponse>, ApiError> {
    let (cluster, machine) = load(&state, &cluster, &name).await?;
    let exists = state.machines.exists(&cluster, &machine).await?;
    Ok(Json(ExistsResponse { exists }))
}

pub async fn update(
    State(state): State<AppState>,
    Path((cluster, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let (cluster, machine) = load(&state, &cluster, &name).await?;
    state.machines.update(&cluster, &machine).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_ip(
    State(state): State<AppState>,
    Path((cluster, name)): Path<(String, String)>,
) -> Result<Json<IpResponse>, ApiError> {
    let (cluster, machine) = load(&state, &cluster, &name).await?;
    let ip = state.machines.get_ip(&cluster, &machine).await?;
    Ok(Json(IpResponse { ip }))
}
