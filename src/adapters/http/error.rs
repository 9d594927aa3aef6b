//! `DomainError` as an HTTP response: status by variant, body `{ "error": message }`.

use crate::domain::DomainError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

pub fn status_of(err: &DomainError) -> StatusCode {
    match err {
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::BadRequest(_) => StatusCode::BAD_REQUEST,
        DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Gateway(_) | DomainError::Forward(_) => StatusCode::BAD_GATEWAY,
        DomainError::Repo(_) | DomainError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let status = status_of(&self);
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_map_to_statuses() {
        assert_eq!(status_of(&DomainError::not_found("Tag")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(&DomainError::bad_request("x")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(&DomainError::Unauthorized("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(&DomainError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(&DomainError::Gateway("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(&DomainError::Repo("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn body_carries_the_message() {
        let res = DomainError::not_found("Contact").into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Contact not found");
    }
}
