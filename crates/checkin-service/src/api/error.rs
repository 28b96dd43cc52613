//! HTTP 错误映射
//!
//! 将打卡引擎的错误分类映射为 HTTP 状态码和统一的错误响应体

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::CheckinError;

/// HTTP 层错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未授权: {0}")]
    Unauthorized(String),

    #[error("资源不存在: {0}")]
    NotFound(String),

    #[error(transparent)]
    Checkin(#[from] CheckinError),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Checkin(e) => match e {
                CheckinError::PlaceNotFound(_) | CheckinError::UserNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                CheckinError::DuplicateCheckin { .. } => StatusCode::CONFLICT,
                CheckinError::Validation(_) => StatusCode::BAD_REQUEST,
                CheckinError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                CheckinError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
                CheckinError::Database(_) | CheckinError::InvariantViolation(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Checkin(e) => e.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Checkin(CheckinError::Database(e)) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Checkin(CheckinError::InvariantViolation(e)) => {
                tracing::error!(error = %e, "账本状态不一致");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Checkin(CheckinError::Timeout(ms)) => {
                tracing::warn!(timeout_ms = ms, "打卡事务超时");
                "服务繁忙，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::BadRequest(errors.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
