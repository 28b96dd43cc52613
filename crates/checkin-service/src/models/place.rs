//! 地点与作品目录实体
//!
//! 目录数据由外部登记，打卡引擎只读引用

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 与作品关联的现实地点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Place {
    pub id: i64,
    /// 所属作品
    pub content_id: i64,
    pub name: String,
    /// 地理编码后的地址
    #[sqlx(default)]
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 用户在某部作品下的打卡次数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentCheckinCount {
    pub content_id: i64,
    pub content_name: String,
    pub checkin_count: i64,
}
