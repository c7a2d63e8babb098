use serde::{Deserialize, Serialize};
use axum::Json;
use axum::http::StatusCode;
use chrono::Utc;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub status: String,
    pub status_code: u16,
    pub timestamp: String,
    pub message: Option<String>,
}

pub fn success<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    with_status(StatusCode::OK, data, None)
}

pub fn with_status<T: Serialize>(
    status: StatusCode,
    data: T,
    message: Option<String>,
) -> (StatusCode, Json<ApiResponse<T>>) {
    let label = if status.is_success() { "success" } else { "error" };
    let meta = ResponseMeta {
        status: label.to_string(),
        status_code: status.as_u16(),
        timestamp: Utc::now().to_rfc3339(),
        message,
    };

    (
        status,
        Json(ApiResponse {
            data: Some(data),
            meta,
        }),
    )
}

pub fn error<T>(status: StatusCode, message: String) -> (StatusCode, Json<ApiResponse<T>>) {
    let meta = ResponseMeta {
        status: "error".to_string(),
        status_code: status.as_u16(),
        timestamp: Utc::now().to_rfc3339(),
        message: Some(message),
    };

    (
        status,
        Json(ApiResponse {
            data: None,
            meta,
        }),
    )
}
