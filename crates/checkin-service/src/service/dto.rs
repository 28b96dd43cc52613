//! 服务层数据传输对象

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{PointHistoryEntry, Stamp};

/// 打卡请求
#[derive(Debug, Clone)]
pub struct CheckinCommand {
    /// 内部用户 ID
    pub user_id: i64,
    pub place_id: i64,
    /// 打卡时间，同时作为记录的创建时间
    pub checked_in_at: DateTime<Utc>,
}

impl CheckinCommand {
    pub fn new(user_id: i64, place_id: i64) -> Self {
        Self {
            user_id,
            place_id,
            checked_in_at: Utc::now(),
        }
    }

    pub fn at(mut self, checked_in_at: DateTime<Utc>) -> Self {
        self.checked_in_at = checked_in_at;
        self
    }
}

/// 打卡结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinResult {
    pub checkin_id: i64,
    pub points_awarded: i64,
    pub stamp_awarded: Option<Stamp>,
    /// 入账后的积分余额
    pub total_points_after: i64,
}

/// 积分概览
#[derive(Debug, Clone, Serialize)]
pub struct PointSummary {
    pub current_point: i64,
    /// 最近的积分流水，按时间倒序
    pub history: Vec<PointHistoryEntry>,
}

/// 余额对账结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub user_id: i64,
    /// 余额行上的积分，无余额行时为 0
    pub balance: i64,
    /// 全部流水 delta 之和
    pub history_sum: i64,
    pub consistent: bool,
}
