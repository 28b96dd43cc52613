//! 打卡资格与积分计算
//!
//! 纯函数：只依据事务内读取的到访快照决定本次打卡的积分和印章。
//!
//! 规则按顺序评估：
//! 1. 基础积分总是发放
//! 2. 该地点首次到访：首访奖励 + 首访印章
//! 3. 上一次打卡（任意地点）在窗口内：连续打卡奖励，不发印章，与其他奖励叠加
//! 4. 恰好第 5 / 第 10 次到访该地点：里程碑奖励 + 对应印章
//!
//! 每次打卡最多一个印章。

use chrono::{DateTime, Duration, Utc};
use seichi_shared::config::CheckinPolicyConfig;

use crate::models::Stamp;

/// 积分策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointPolicy {
    pub base_points: i64,
    pub first_visit_bonus: i64,
    pub consecutive_bonus: i64,
    pub five_visits_bonus: i64,
    pub ten_visits_bonus: i64,
    /// 同一地点重复打卡的拦截窗口
    pub duplicate_window: Duration,
    /// 连续打卡奖励的判定窗口
    pub consecutive_window: Duration,
}

impl Default for PointPolicy {
    fn default() -> Self {
        Self::from(&CheckinPolicyConfig::default())
    }
}

impl From<&CheckinPolicyConfig> for PointPolicy {
    fn from(config: &CheckinPolicyConfig) -> Self {
        Self {
            base_points: config.base_points,
            first_visit_bonus: config.first_visit_bonus,
            consecutive_bonus: config.consecutive_bonus,
            five_visits_bonus: config.five_visits_bonus,
            ten_visits_bonus: config.ten_visits_bonus,
            duplicate_window: Duration::hours(config.duplicate_window_hours),
            consecutive_window: Duration::hours(config.consecutive_window_hours),
        }
    }
}

/// 事务内读取的到访快照
///
/// 打卡时间由调用方给出，可能早于已提交的打卡，因此时间相关的字段都相对本次打卡时间读取。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitHistory {
    /// 该用户此前在该地点的打卡次数（不含本次）
    pub prior_visits_at_place: i64,
    /// 该用户在该地点时间上离本次打卡最近的一次打卡，前后均可
    pub nearest_visit_at_place: Option<DateTime<Utc>>,
    /// 该用户在任意地点、不晚于本次打卡时间的最近一次打卡
    pub last_checkin_before: Option<DateTime<Utc>>,
}

impl VisitHistory {
    /// 含本次打卡在内的到访序号
    pub fn visit_number(&self) -> i64 {
        self.prior_visits_at_place + 1
    }
}

/// 一次打卡的奖励
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Award {
    pub points: i64,
    pub stamp: Option<Stamp>,
    /// 是否获得了连续打卡奖励
    pub consecutive: bool,
}

impl PointPolicy {
    /// 窗口内是否已在该地点打过卡
    ///
    /// 同一地点任意两次打卡至少相隔一个窗口，补录的较早打卡同样受限；
    /// 恰好相隔一个窗口不算重复
    pub fn is_duplicate(&self, history: &VisitHistory, at: DateTime<Utc>) -> bool {
        history
            .nearest_visit_at_place
            .is_some_and(|visit| (at - visit).abs() < self.duplicate_window)
    }

    /// 计算本次打卡的积分和印章
    pub fn evaluate(&self, history: &VisitHistory, at: DateTime<Utc>) -> Award {
        let mut points = self.base_points;
        let mut stamp = None;

        if history.prior_visits_at_place == 0 {
            points += self.first_visit_bonus;
            stamp = Some(Stamp::FirstVisit);
        }

        let consecutive = history
            .last_checkin_before
            .is_some_and(|last| last <= at && at - last <= self.consecutive_window);
        if consecutive {
            points += self.consecutive_bonus;
        }

        if stamp.is_none() {
            match history.visit_number() {
                5 => {
                    points += self.five_visits_bonus;
                    stamp = Some(Stamp::FiveVisits);
                }
                10 => {
                    points += self.ten_visits_bonus;
                    stamp = Some(Stamp::TenVisits);
                }
                _ => {}
            }
        }

        Award {
            points,
            stamp,
            consecutive,
        }
    }
}
