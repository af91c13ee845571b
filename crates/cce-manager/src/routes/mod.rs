pub mod clusters;
pub mod machines;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post, put};

use crate::auth::auth_middleware;
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Clusters
        .route(
            "/clusters/{cluster}",
            put(clusters::put_cluster)
                .get(clusters::get_cluster)
                .delete(clusters::delete_cluster),
        )
        .route("/clusters/{cluster}/reconcile", post(clusters::reconcile_cluster))
        .route("/clusters/{cluster}/kubeconfig", get(clusters::get_kube_config))
        // Machine resources
        .route(
            "/clusters/{cluster}/machines/{machine}",
            put(machines::put_machine)
                .get(machines::get_machine)
                .delete(machines::request_deletion),
        )
        // Machine actuation
        .route("/clusters/{cluster}/machines/{machine}/create", post(machines::create))
        .route("/clusters/{cluster}/machines/{machine}/delete", post(machines::delete))
        .route("/clusters/{cluster}/machines/{machine}/exists", get(machines::exists))
        .route("/clusters/{cluster}/machines/{machine}/update", post(machines::update))
        .route("/clusters/{cluster}/machines/{machine}/ip", get(machines::get_ip))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
