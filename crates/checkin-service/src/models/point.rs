//! 积分余额与积分流水实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 打卡入账的流水原因
pub const CHECKIN_REASON: &str = "checkin";

/// 用户积分余额
///
/// 每个用户一行，余额恒等于该用户全部流水 delta 之和
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PointBalance {
    pub user_id: i64,
    pub current_point: i64,
    pub updated_at: DateTime<Utc>,
}

/// 积分流水
///
/// 只追加的账本行，记录一次积分变动及其原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PointHistoryEntry {
    pub id: i64,
    pub user_id: i64,
    pub delta: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// 待写入的积分流水
#[derive(Debug, Clone)]
pub struct NewPointHistory {
    pub user_id: i64,
    pub delta: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
