//! 身份令牌校验与认证中间件
//!
//! 令牌由外部身份提供方签发，这里只校验签名和声明并取出外部用户标识

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use seichi_shared::config::AuthConfig;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::state::AppState;
use crate::error::{CheckinError, Result};

/// 已认证的调用方
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// 外部身份提供方的用户标识
    pub external_id: String,
}

/// 身份令牌校验
#[cfg_attr(test, mockall::automock)]
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AuthUser>;
}

/// 令牌声明
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// 外部用户标识
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// 基于 HS256 JWT 的令牌校验
pub struct JwtTokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }
}

impl TokenVerifier for JwtTokenVerifier {
    fn verify(&self, token: &str) -> Result<AuthUser> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => CheckinError::Unauthorized("Token 已过期".into()),
                ErrorKind::InvalidToken => CheckinError::Unauthorized("无效的 Token".into()),
                _ => CheckinError::Unauthorized(format!("Token 验证失败: {}", e)),
            }
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(CheckinError::Unauthorized("Token 缺少用户标识".into()));
        }

        Ok(AuthUser {
            external_id: data.claims.sub,
        })
    }
}

/// 认证中间件
///
/// 从 Authorization header 中提取 Bearer Token，校验后将 [`AuthUser`] 注入请求扩展。
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: std::result::Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut request: Request,
    next: Next,
) -> Response {
    let Ok(TypedHeader(Authorization(bearer))) = bearer else {
        return ApiError::Unauthorized("缺少认证 Token".into()).into_response();
    };

    match state.token_verifier.verify(bearer.token()) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
