// HTTP response utilities - maps builder errors to JSON error bodies
use crate::application::builder_session::BuilderError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub struct ApiError(pub BuilderError);

impl From<BuilderError> for ApiError {
    fn from(e: BuilderError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BuilderError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BuilderError::NoDashboard => StatusCode::CONFLICT,
            BuilderError::NotFound(_) => StatusCode::NOT_FOUND,
            BuilderError::Persistence(_) | BuilderError::Repository(_) => StatusCode::BAD_GATEWAY,
            BuilderError::SessionClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_repository::RepositoryError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError(BuilderError::Validation("name required".into())).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError(BuilderError::NoDashboard).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError(BuilderError::Repository(RepositoryError::Unreachable("down".into()))).status(),
            StatusCode::BAD_GATEWAY
        );

        let response = ApiError(BuilderError::NotFound("d1".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
