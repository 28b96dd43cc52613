//! 账本查询服务（只读操作）

use std::sync::Arc;

use tracing::{instrument, warn};

use super::dto::{PointSummary, ReconciliationReport};
use crate::error::Result;
use crate::models::{CheckinRecord, ContentCheckinCount};
use crate::repository::LedgerStore;

/// 积分概览默认返回的流水条数
pub const DEFAULT_SUMMARY_HISTORY: i64 = 10;

pub struct LedgerQueryService {
    ledger: Arc<dyn LedgerStore>,
    /// 列表查询的条数上限
    max_limit: i64,
}

impl LedgerQueryService {
    pub fn new(ledger: Arc<dyn LedgerStore>, max_limit: i64) -> Self {
        Self {
            ledger,
            max_limit: max_limit.max(1),
        }
    }

    /// 将调用方传入的条数限制在 [1, max_limit]
    fn clamp_limit(&self, limit: Option<i64>) -> i64 {
        limit.unwrap_or(self.max_limit).clamp(1, self.max_limit)
    }

    /// 用户的打卡历史，最近的在前
    #[instrument(skip(self))]
    pub async fn list_checkins(&self, user_id: i64, limit: Option<i64>) -> Result<Vec<CheckinRecord>> {
        self.ledger
            .list_checkins(user_id, self.clamp_limit(limit))
            .await
    }

    /// 每部作品下用户的打卡次数
    #[instrument(skip(self))]
    pub async fn content_checkin_counts(&self, user_id: i64) -> Result<Vec<ContentCheckinCount>> {
        self.ledger.content_checkin_counts(user_id).await
    }

    /// 当前积分和最近的流水
    #[instrument(skip(self))]
    pub async fn point_summary(&self, user_id: i64, history_limit: Option<i64>) -> Result<PointSummary> {
        let current_point = self
            .ledger
            .get_balance(user_id)
            .await?
            .map(|b| b.current_point)
            .unwrap_or(0);
        let limit = self.clamp_limit(history_limit.or(Some(DEFAULT_SUMMARY_HISTORY)));
        let history = self.ledger.list_point_history(user_id, limit).await?;

        Ok(PointSummary {
            current_point,
            history,
        })
    }

    /// 核对余额与流水之和
    #[instrument(skip(self))]
    pub async fn reconcile(&self, user_id: i64) -> Result<ReconciliationReport> {
        let balance = self
            .ledger
            .get_balance(user_id)
            .await?
            .map(|b| b.current_point)
            .unwrap_or(0);
        let history_sum = self.ledger.sum_point_history(user_id).await?;
        let consistent = balance == history_sum;

        if !consistent {
            warn!(user_id, balance, history_sum, "积分余额与流水不一致");
        }

        Ok(ReconciliationReport {
            user_id,
            balance,
            history_sum,
            consistent,
        })
    }
}
