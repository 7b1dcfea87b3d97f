use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use advisory_types::api::CallableErrorResponse;
use advisory_types::error::CallableError;

/// HTTP-facing wrapper that renders a [`CallableError`] as the callable
/// error envelope with the status its kind maps to.
#[derive(Debug)]
pub struct ApiError(pub CallableError);

impl From<CallableError> for ApiError {
    fn from(err: CallableError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(CallableErrorResponse::from(&self.0))).into_response()
    }
}
