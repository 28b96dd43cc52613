//! 积分仓储
//!
//! 余额行是唯一可变的聚合，只能在打卡事务内修改；流水只追加

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row};

use crate::error::Result;
use crate::models::{NewPointHistory, PointBalance, PointHistoryEntry};

pub struct PointRepository {
    pool: PgPool,
}

impl PointRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_balance(&self, user_id: i64) -> Result<Option<PointBalance>> {
        let balance = sqlx::query_as::<_, PointBalance>(
            "SELECT user_id, current_point, updated_at FROM point_balances WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance)
    }

    /// 列出用户的积分流水
    ///
    /// 按时间倒序排列，返回最近的 limit 条记录
    pub async fn list_history(&self, user_id: i64, limit: i64) -> Result<Vec<PointHistoryEntry>> {
        let entries = sqlx::query_as::<_, PointHistoryEntry>(
            r#"
            SELECT id, user_id, delta, reason, created_at
            FROM point_history
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// 用户全部流水的 delta 之和
    pub async fn sum_history(&self, user_id: i64) -> Result<i64> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delta), 0)::BIGINT FROM point_history WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum)
    }

    /// 在事务中读取并锁定余额行
    pub async fn get_balance_for_update(tx: &mut PgConnection, user_id: i64) -> Result<Option<i64>> {
        let current: Option<i64> = sqlx::query_scalar(
            "SELECT current_point FROM point_balances WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(tx)
        .await?;

        Ok(current)
    }

    /// 在事务中创建余额行
    pub async fn create_balance_in_tx(
        tx: &mut PgConnection,
        user_id: i64,
        amount: i64,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO point_balances (user_id, current_point, updated_at)
            VALUES ($1, $2, $3)
            RETURNING current_point
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(at)
        .fetch_one(tx)
        .await?;

        Ok(row.get("current_point"))
    }

    /// 在事务中累加余额
    ///
    /// 余额行不存在时返回 None，由调用方判定为账本不一致
    pub async fn add_to_balance_in_tx(
        tx: &mut PgConnection,
        user_id: i64,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let current: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE point_balances
            SET current_point = current_point + $2, updated_at = $3
            WHERE user_id = $1
            RETURNING current_point
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .bind(at)
        .fetch_optional(tx)
        .await?;

        Ok(current)
    }

    /// 在事务中写入积分流水
    pub async fn create_history_in_tx(tx: &mut PgConnection, entry: &NewPointHistory) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO point_history (user_id, delta, reason, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.delta)
        .bind(&entry.reason)
        .bind(entry.created_at)
        .fetch_one(tx)
        .await?;

        Ok(row.get("id"))
    }
}
