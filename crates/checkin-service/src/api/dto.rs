//! HTTP 请求与响应结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{CheckinRecord, User};
use crate::service::CheckinResult;

/// 打卡请求
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCheckinRequest {
    #[validate(range(min = 1, message = "place_id 必须为正整数"))]
    pub place_id: i64,
}

/// 打卡响应
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateCheckinResponse {
    pub checkin_id: i64,
    pub points_earned: i64,
    /// 未获得印章时为 null
    pub stamp_id: Option<i32>,
    pub total_points: i64,
}

impl From<CheckinResult> for CreateCheckinResponse {
    fn from(result: CheckinResult) -> Self {
        Self {
            checkin_id: result.checkin_id,
            points_earned: result.points_awarded,
            stamp_id: result.stamp_awarded.map(|s| s.id()),
            total_points: result.total_points_after,
        }
    }
}

/// 列表查询参数
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// 打卡历史条目
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckinView {
    pub id: i64,
    pub place_id: i64,
    pub points: i64,
    pub stamp_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<CheckinRecord> for CheckinView {
    fn from(record: CheckinRecord) -> Self {
        Self {
            id: record.id,
            place_id: record.place_id,
            points: record.points,
            stamp_id: record.stamp_id.map(|s| s.id()),
            created_at: record.created_at,
        }
    }
}

/// 登录响应
#[derive(Debug, Serialize, Deserialize)]
pub struct SignInResponse {
    pub user: User,
    /// 本次请求是否新建了用户
    pub created: bool,
}
