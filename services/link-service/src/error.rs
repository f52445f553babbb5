//! Wire mapping for the error taxonomy
//!
//! The one place taxonomy kinds become HTTP. JSON API legs answer with
//! `{"error": {"code", "message"}}` and a matching status; the browser
//! redirect legs never see these bodies and instead redirect to the UI
//! error page (see `api::ui_error_redirect`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Wrapper giving the core error taxonomy an HTTP rendering.
#[derive(Debug)]
pub struct ApiError(pub orcid_link::Error);

impl From<orcid_link::Error> for ApiError {
    fn from(err: orcid_link::Error) -> Self {
        ApiError(err)
    }
}

impl From<platform_auth::AuthError> for ApiError {
    fn from(err: platform_auth::AuthError) -> Self {
        ApiError(err.into())
    }
}

/// HTTP status for each taxonomy kind.
pub fn status_for(err: &orcid_link::Error) -> StatusCode {
    match err {
        orcid_link::Error::AlreadyLinked(_) => StatusCode::BAD_REQUEST,
        orcid_link::Error::AuthorizationRequired => StatusCode::UNAUTHORIZED,
        orcid_link::Error::NotAuthorized => StatusCode::FORBIDDEN,
        orcid_link::Error::NotFound => StatusCode::NOT_FOUND,
        orcid_link::Error::Upstream(_)
        | orcid_link::Error::UpstreamContentType(_)
        | orcid_link::Error::UpstreamDecode(_) => StatusCode::BAD_GATEWAY,
        orcid_link::Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = serde_json::json!({
            "error": {
                "code": self.0.code(),
                "message": self.0.to_string(),
            }
        });
        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
