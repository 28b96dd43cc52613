//! PostgreSQL 账本存储
//!
//! 组合打卡仓储和积分仓储，事务基于 `sqlx::Transaction`，drop 时自动回滚

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::checkin_repo::CheckinRepository;
use super::point_repo::PointRepository;
use super::traits::{LedgerStore, LedgerTransaction};
use crate::error::Result;
use crate::models::{
    CheckinRecord, ContentCheckinCount, NewCheckin, NewPointHistory, PointBalance,
    PointHistoryEntry,
};

pub struct PgLedgerStore {
    pool: PgPool,
    checkins: CheckinRepository,
    points: PointRepository,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            checkins: CheckinRepository::new(pool.clone()),
            points: PointRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTransaction { tx }))
    }

    async fn list_checkins(&self, user_id: i64, limit: i64) -> Result<Vec<CheckinRecord>> {
        self.checkins.list_by_user(user_id, limit).await
    }

    async fn get_balance(&self, user_id: i64) -> Result<Option<PointBalance>> {
        self.points.get_balance(user_id).await
    }

    async fn list_point_history(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<PointHistoryEntry>> {
        self.points.list_history(user_id, limit).await
    }

    async fn sum_point_history(&self, user_id: i64) -> Result<i64> {
        self.points.sum_history(user_id).await
    }

    async fn content_checkin_counts(&self, user_id: i64) -> Result<Vec<ContentCheckinCount>> {
        self.checkins.count_by_content(user_id).await
    }
}

/// PostgreSQL 账本事务
pub struct PgLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn lock_user(&mut self, user_id: i64) -> Result<bool> {
        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(locked.is_some())
    }

    async fn nearest_checkin_at_place(
        &mut self,
        user_id: i64,
        place_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        CheckinRepository::nearest_at_place_in_tx(&mut self.tx, user_id, place_id, at).await
    }

    async fn count_checkins_at_place(&mut self, user_id: i64, place_id: i64) -> Result<i64> {
        CheckinRepository::count_at_place_in_tx(&mut self.tx, user_id, place_id).await
    }

    async fn latest_checkin_until(
        &mut self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        CheckinRepository::latest_until_in_tx(&mut self.tx, user_id, at).await
    }

    async fn insert_checkin(&mut self, checkin: &NewCheckin) -> Result<CheckinRecord> {
        CheckinRepository::create_in_tx(&mut self.tx, checkin).await
    }

    async fn get_balance_for_update(&mut self, user_id: i64) -> Result<Option<i64>> {
        PointRepository::get_balance_for_update(&mut self.tx, user_id).await
    }

    async fn insert_balance(
        &mut self,
        user_id: i64,
        amount: i64,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        PointRepository::create_balance_in_tx(&mut self.tx, user_id, amount, at).await
    }

    async fn add_to_balance(
        &mut self,
        user_id: i64,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        PointRepository::add_to_balance_in_tx(&mut self.tx, user_id, delta, at).await
    }

    async fn insert_history(&mut self, entry: &NewPointHistory) -> Result<i64> {
        PointRepository::create_history_in_tx(&mut self.tx, entry).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
