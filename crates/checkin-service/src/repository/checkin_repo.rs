//! 打卡记录仓储
//!
//! 打卡记录只追加，不提供更新和删除

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::error::Result;
use crate::models::{CheckinRecord, ContentCheckinCount, NewCheckin};

pub struct CheckinRepository {
    pool: PgPool,
}

impl CheckinRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 列出用户的打卡记录
    ///
    /// 按时间倒序排列，返回最近的 limit 条记录
    pub async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<CheckinRecord>> {
        let records = sqlx::query_as::<_, CheckinRecord>(
            r#"
            SELECT id, user_id, place_id, points, stamp_id, created_at
            FROM checkins
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// 按作品统计用户打卡次数
    ///
    /// 没有打卡的作品计数为 0
    pub async fn count_by_content(&self, user_id: i64) -> Result<Vec<ContentCheckinCount>> {
        let counts = sqlx::query_as::<_, ContentCheckinCount>(
            r#"
            SELECT c.id AS content_id,
                   c.name AS content_name,
                   COUNT(ch.id) AS checkin_count
            FROM contents c
            LEFT JOIN places p ON p.content_id = c.id
            LEFT JOIN checkins ch ON ch.place_id = p.id AND ch.user_id = $1
            GROUP BY c.id, c.name
            ORDER BY c.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }

    /// 在事务中写入打卡记录
    pub async fn create_in_tx(tx: &mut PgConnection, checkin: &NewCheckin) -> Result<CheckinRecord> {
        let record = sqlx::query_as::<_, CheckinRecord>(
            r#"
            INSERT INTO checkins (user_id, place_id, points, stamp_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, place_id, points, stamp_id, created_at
            "#,
        )
        .bind(checkin.user_id)
        .bind(checkin.place_id)
        .bind(checkin.points)
        .bind(checkin.stamp)
        .bind(checkin.checked_in_at)
        .fetch_one(tx)
        .await?;

        Ok(record)
    }

    /// 在事务中查询用户在某地点时间上离 `at` 最近的一次打卡
    pub async fn nearest_at_place_in_tx(
        tx: &mut PgConnection,
        user_id: i64,
        place_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let nearest: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT created_at FROM checkins
            WHERE user_id = $1 AND place_id = $2
            ORDER BY ABS(EXTRACT(EPOCH FROM (created_at - $3::timestamptz)))
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(place_id)
        .bind(at)
        .fetch_optional(tx)
        .await?;

        Ok(nearest)
    }

    /// 在事务中统计用户在某地点的打卡次数
    pub async fn count_at_place_in_tx(
        tx: &mut PgConnection,
        user_id: i64,
        place_id: i64,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM checkins WHERE user_id = $1 AND place_id = $2",
        )
        .bind(user_id)
        .bind(place_id)
        .fetch_one(tx)
        .await?;

        Ok(count)
    }

    /// 在事务中查询用户在任意地点不晚于 `at` 的最近一次打卡时间
    pub async fn latest_until_in_tx(
        tx: &mut PgConnection,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT MAX(created_at) FROM checkins WHERE user_id = $1 AND created_at <= $2",
        )
        .bind(user_id)
        .bind(at)
        .fetch_one(tx)
        .await?;

        Ok(latest)
    }
}
