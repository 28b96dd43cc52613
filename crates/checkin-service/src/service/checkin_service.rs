//! 打卡编排服务
//!
//! 打卡引擎的唯一写入口。前置校验、资格计算和账本写入在同一个事务内完成，
//! 任一步失败或超时都整体回滚。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use seichi_shared::config::CheckinPolicyConfig;
use seichi_shared::observability::metrics;
use tracing::{error, info, instrument, warn};

use super::dto::{CheckinCommand, CheckinResult};
use super::eligibility::{PointPolicy, VisitHistory};
use crate::error::{CheckinError, Result};
use crate::models::{CHECKIN_REASON, NewCheckin, NewPointHistory};
use crate::repository::{LedgerStore, LedgerTransaction, PlaceCatalog};

/// 打卡编排服务
///
/// 同一用户的打卡通过事务内锁定用户行串行化，避免并发请求同时读到
/// "尚未到访" 而重复发放首访或里程碑奖励。
pub struct CheckinService {
    ledger: Arc<dyn LedgerStore>,
    catalog: Arc<dyn PlaceCatalog>,
    policy: PointPolicy,
    transaction_timeout: Duration,
}

impl CheckinService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        catalog: Arc<dyn PlaceCatalog>,
        policy: PointPolicy,
        transaction_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            catalog,
            policy,
            transaction_timeout,
        }
    }

    /// 按配置创建
    pub fn from_config(
        ledger: Arc<dyn LedgerStore>,
        catalog: Arc<dyn PlaceCatalog>,
        config: &CheckinPolicyConfig,
    ) -> Self {
        Self::new(
            ledger,
            catalog,
            PointPolicy::from(config),
            Duration::from_millis(config.transaction_timeout_ms),
        )
    }

    pub fn policy(&self) -> &PointPolicy {
        &self.policy
    }

    /// 记录一次打卡
    ///
    /// 校验顺序：
    /// 1. 地点存在，否则 `PlaceNotFound`
    /// 2. 用户存在，否则 `UserNotFound`
    /// 3. 窗口内未在该地点打卡，否则 `DuplicateCheckin`
    ///
    /// 之后在同一事务内计算奖励、写入打卡记录、更新余额并写入流水。
    #[instrument(skip(self), fields(user_id = command.user_id, place_id = command.place_id))]
    pub async fn record_checkin(&self, command: CheckinCommand) -> Result<CheckinResult> {
        let start = Instant::now();
        let outcome = self.record_checkin_inner(&command).await;
        let elapsed = start.elapsed().as_secs_f64();

        match &outcome {
            Ok(result) => {
                metrics::record_checkin("success", elapsed);
                metrics::record_points_awarded(result.points_awarded);
                if let Some(stamp) = result.stamp_awarded {
                    metrics::record_stamp_awarded(stamp.as_str());
                }
                info!(
                    checkin_id = result.checkin_id,
                    points = result.points_awarded,
                    stamp = result.stamp_awarded.map(|s| s.as_str()),
                    total_points = result.total_points_after,
                    "打卡成功"
                );
            }
            Err(e) => {
                metrics::record_checkin(e.outcome(), elapsed);
                match e {
                    CheckinError::InvariantViolation(detail) => {
                        error!(
                            user_id = command.user_id,
                            place_id = command.place_id,
                            checked_in_at = %command.checked_in_at,
                            detail = %detail,
                            "账本状态不一致，打卡已回滚"
                        );
                    }
                    e if e.is_retryable() => warn!(error = %e, "打卡失败，事务已回滚"),
                    e => info!(code = e.error_code(), "打卡被拒绝"),
                }
            }
        }

        outcome
    }

    async fn record_checkin_inner(&self, command: &CheckinCommand) -> Result<CheckinResult> {
        if !self.catalog.place_exists(command.place_id).await? {
            return Err(CheckinError::PlaceNotFound(command.place_id));
        }

        // 超时只覆盖提交前的步骤，被 drop 的未提交事务由存储层回滚。
        // 已发出的 COMMIT 不被打断，超时错误总是意味着没有写入。
        let staged = tokio::time::timeout(self.transaction_timeout, self.stage_checkin(command))
            .await
            .map_err(|_| CheckinError::Timeout(timeout_millis(self.transaction_timeout)))?;
        let (tx, result) = staged?;

        tx.commit().await?;
        Ok(result)
    }

    /// 在事务内完成全部校验和写入，返回尚未提交的事务
    async fn stage_checkin(
        &self,
        command: &CheckinCommand,
    ) -> Result<(Box<dyn LedgerTransaction>, CheckinResult)> {
        let user_id = command.user_id;
        let place_id = command.place_id;
        let at = command.checked_in_at;

        let mut tx = self.ledger.begin().await?;

        if !tx.lock_user(user_id).await? {
            return Err(CheckinError::UserNotFound(user_id.to_string()));
        }

        let history = load_visit_history(tx.as_mut(), user_id, place_id, at).await?;

        if self.policy.is_duplicate(&history, at) {
            return Err(CheckinError::DuplicateCheckin { user_id, place_id });
        }

        let award = self.policy.evaluate(&history, at);

        let record = tx
            .insert_checkin(&NewCheckin {
                user_id,
                place_id,
                points: award.points,
                stamp: award.stamp,
                checked_in_at: at,
            })
            .await?;

        let total_points_after = match tx.get_balance_for_update(user_id).await? {
            None => tx.insert_balance(user_id, award.points, at).await?,
            Some(_) => tx
                .add_to_balance(user_id, award.points, at)
                .await?
                .ok_or_else(|| {
                    CheckinError::InvariantViolation(format!(
                        "余额行在锁定后消失: user_id={}",
                        user_id
                    ))
                })?,
        };

        tx.insert_history(&NewPointHistory {
            user_id,
            delta: award.points,
            reason: CHECKIN_REASON.to_string(),
            created_at: at,
        })
        .await?;

        let result = CheckinResult {
            checkin_id: record.id,
            points_awarded: award.points,
            stamp_awarded: award.stamp,
            total_points_after,
        };
        Ok((tx, result))
    }
}

/// 超时时长的毫秒数，超出 u64 时取上限
fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

/// 在事务内读取资格计算所需的到访快照
///
/// 到访次数不按时间截断：里程碑按被接受的先后计数，每个印章在同一地点只发一次
async fn load_visit_history(
    tx: &mut dyn LedgerTransaction,
    user_id: i64,
    place_id: i64,
    at: DateTime<Utc>,
) -> Result<VisitHistory> {
    let prior_visits_at_place = tx.count_checkins_at_place(user_id, place_id).await?;
    let nearest_visit_at_place = tx.nearest_checkin_at_place(user_id, place_id, at).await?;
    let last_checkin_before = tx.latest_checkin_until(user_id, at).await?;

    Ok(VisitHistory {
        prior_visits_at_place,
        nearest_visit_at_place,
        last_checkin_before,
    })
}
