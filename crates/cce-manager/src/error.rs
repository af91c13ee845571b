use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] cce_db::Error),

    #[error(transparent)]
    Actuator(#[from] cce_actuator::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Store(e) => store_status(e),
            ApiError::Actuator(e) => actuator_status(e),
        }
    }
}

fn store_status(e: &cce_db::Error) -> StatusCode {
    match e {
        cce_db::Error::NotFound { .. } => StatusCode::NOT_FOUND,
        cce_db::Error::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
        cce_db::Error::Status(_) => StatusCode::UNPROCESSABLE_ENTITY,
        cce_db::Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn actuator_status(e: &cce_actuator::Error) -> StatusCode {
    use cce_actuator::Error;

    match e {
        Error::ProviderConfig(_) => StatusCode::BAD_REQUEST,
        Error::Store(inner) => store_status(inner),
        Error::Compute(inner) if inner.is_not_found() => StatusCode::NOT_FOUND,
        Error::Compute(_) | Error::InstanceCount(_) => StatusCode::BAD_GATEWAY,
        Error::NoMaster(_) | Error::NoAddress(..) | Error::NoAdminPass(_) | Error::MissingInput(_) => {
            StatusCode::CONFLICT
        }
        Error::Script(_) | Error::InvalidToken => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
