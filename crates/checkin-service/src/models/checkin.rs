//! 打卡记录实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::Stamp;

/// 打卡记录
///
/// 只追加，创建后不修改也不删除。积分和印章写在记录上便于审计
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CheckinRecord {
    pub id: i64,
    pub user_id: i64,
    pub place_id: i64,
    /// 本次打卡获得的积分
    pub points: i64,
    /// 本次打卡获得的印章
    pub stamp_id: Option<Stamp>,
    pub created_at: DateTime<Utc>,
}

/// 待写入的打卡记录
#[derive(Debug, Clone)]
pub struct NewCheckin {
    pub user_id: i64,
    pub place_id: i64,
    pub points: i64,
    pub stamp: Option<Stamp>,
    pub checked_in_at: DateTime<Utc>,
}
