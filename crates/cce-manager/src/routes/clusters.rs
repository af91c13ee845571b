use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use cce_db::{Cluster, ResourceClient};
use cce_db::models::ObjectMeta;

use crate::dto::PutClusterRequest;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn put_cluster(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<PutClusterRequest>,
) -> Result<Json<Cluster>, ApiError> {
    let cluster = Cluster {
        metadata: ObjectMeta::named(name),
        spec: req.spec,
        status: Default::default(),
    };
    let stored = state.store.upsert_cluster(&cluster).await?;
    Ok(Json(stored))
}

pub async fn get_cluster(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Cluster>, ApiError> {
    Ok(Json(state.store.get_cluster(&name).await?))
}

pub async fn reconcile_cluster(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let cluster = state.store.get_cluster(&name).await?;
    state.clusters.reconcile(&cluster).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Machines must be deleted first; their instances would otherwise leak.
pub async fn delete_cluster(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let cluster = state.store.get_cluster(&name).await?;

    let remaining = state
        .store
        .list_machines()
        .await?
        .into_iter()
        .filter(|m| m.cluster_name == name)
        .count();
    if remaining > 0 {
        return Err(ApiError::Conflict(format!(
            "cluster {name} still has {remaining} machines"
        )));
    }

    state.clusters.delete(&cluster).await?;
    state.store.delete_cluster(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_kube_config(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<String, ApiError> {
    let cluster = state.store.get_cluster(&name).await?;
    let master = state
        .store
        .master_machine(&cluster)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("master of cluster {name}")))?;

    Ok(state.machines.get_kube_config(&cluster, &master).await?)
}
