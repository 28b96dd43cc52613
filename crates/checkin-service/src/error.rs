//! 打卡服务错误类型
//!
//! 定义打卡引擎的业务错误和系统错误

use thiserror::Error;

/// 打卡服务错误类型
#[derive(Debug, Error)]
pub enum CheckinError {
    // === 引用不存在 ===
    #[error("地点不存在: {0}")]
    PlaceNotFound(i64),

    #[error("用户不存在: {0}")]
    UserNotFound(String),

    // === 业务冲突 ===
    #[error("24 小时内已在该地点打卡: user_id={user_id}, place_id={place_id}")]
    DuplicateCheckin { user_id: i64, place_id: i64 },

    // === 请求错误 ===
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("未授权: {0}")]
    Unauthorized(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("打卡事务超时: {0}ms")]
    Timeout(u64),

    #[error("账本状态不一致: {0}")]
    InvariantViolation(String),
}

/// 打卡服务 Result 类型别名
pub type Result<T> = std::result::Result<T, CheckinError>;

impl CheckinError {
    /// 检查是否为可重试的错误
    ///
    /// 事务未提交即整体回滚，调用方可以安全地重试整个操作
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Timeout(_))
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_) | Self::Timeout(_) | Self::InvariantViolation(_)
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::PlaceNotFound(_) => "PLACE_NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::DuplicateCheckin { .. } => "DUPLICATE_CHECKIN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
        }
    }

    /// 指标标签中使用的结果分类
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::PlaceNotFound(_) => "place_not_found",
            Self::UserNotFound(_) => "user_not_found",
            Self::DuplicateCheckin { .. } => "duplicate",
            Self::Validation(_) => "invalid",
            Self::Unauthorized(_) => "unauthorized",
            Self::Database(_) => "storage_error",
            Self::Timeout(_) => "timeout",
            Self::InvariantViolation(_) => "invariant_violation",
        }
    }
}
