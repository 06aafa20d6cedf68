use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::bridge::{CorrelationRecord, DEFAULT_FAILURE_STATUS};
use crate::error::ApiError;

/// Successful API response; the data is the body
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
        }
    }

    /// Create an API response with custom status code
    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    /// Create a 202 Accepted response
    pub fn accepted(data: T) -> Self {
        Self::with_status(data, StatusCode::ACCEPTED)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        match serde_json::to_value(&self.data) {
            Ok(value) => (status, Json(value)).into_response(),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to serialize response data" })),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Map the outcome of a correlated exchange onto the HTTP response.
///
/// `Completed` becomes `status` with the data as body; `Failed` carries the
/// worker's message and status code (400 when it gave none).
pub fn respond_with<T: Serialize>(record: CorrelationRecord<T>, status: StatusCode) -> ApiResult<T> {
    match record {
        CorrelationRecord::Completed { data } => Ok(ApiResponse::with_status(data, status)),
        CorrelationRecord::Failed { error, status_code } => Err(ApiError::from_status(
            status_code.unwrap_or(DEFAULT_FAILURE_STATUS),
            error,
        )),
        CorrelationRecord::Pending => {
            tracing::error!("Handler received a pending record as a final result");
            Err(ApiError::internal_server_error("Request did not complete"))
        }
    }
}

pub fn respond<T: Serialize>(record: CorrelationRecord<T>) -> ApiResult<T> {
    respond_with(record, StatusCode::OK)
}
