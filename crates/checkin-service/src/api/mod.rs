//! HTTP 接口层
//!
//! 所有业务路由都要求 Bearer Token，成功响应直接返回业务 JSON，
//! 失败响应使用统一的 `{success, code, message, data}` 结构

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::{AuthUser, JwtTokenVerifier, TokenVerifier};
pub use error::{ApiError, ApiResult};
pub use routes::build_router;
pub use state::AppState;
