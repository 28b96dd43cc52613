//! 用户实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 内部用户身份
///
/// 每个外部身份标识对应唯一一条记录，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    /// 外部身份提供方的用户标识
    pub external_id: String,
    pub created_at: DateTime<Utc>,
}
