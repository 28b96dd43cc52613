//! 仓储 Trait 定义
//!
//! 服务层依赖这些抽象而非具体实现，便于替换存储和 mock 测试

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    CheckinRecord, ContentCheckinCount, NewCheckin, NewPointHistory, Place, PointBalance,
    PointHistoryEntry, User,
};

/// 账本存储
///
/// 读接口直接查询已提交数据，写入必须通过 [`LedgerTransaction`] 完成
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 开启一个账本事务
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>>;

    /// 用户的打卡记录，按时间倒序
    async fn list_checkins(&self, user_id: i64, limit: i64) -> Result<Vec<CheckinRecord>>;

    async fn get_balance(&self, user_id: i64) -> Result<Option<PointBalance>>;

    /// 用户的积分流水，按时间倒序
    async fn list_point_history(&self, user_id: i64, limit: i64)
    -> Result<Vec<PointHistoryEntry>>;

    async fn sum_point_history(&self, user_id: i64) -> Result<i64>;

    /// 每部作品下用户的打卡次数，包含次数为 0 的作品
    async fn content_checkin_counts(&self, user_id: i64) -> Result<Vec<ContentCheckinCount>>;
}

/// 账本事务
///
/// 未调用 `commit` 就被 drop 的事务整体回滚，没有任何写入对外可见
#[async_trait]
pub trait LedgerTransaction: Send {
    /// 锁定用户行，串行化同一用户的打卡。用户不存在时返回 false
    async fn lock_user(&mut self, user_id: i64) -> Result<bool>;

    /// 用户在该地点时间上离 `at` 最近的一次打卡，早于或晚于 `at` 均可
    async fn nearest_checkin_at_place(
        &mut self,
        user_id: i64,
        place_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>>;

    /// 用户在该地点已有的打卡次数
    async fn count_checkins_at_place(&mut self, user_id: i64, place_id: i64) -> Result<i64>;

    /// 用户在任意地点不晚于 `at` 的最近一次打卡时间
    async fn latest_checkin_until(
        &mut self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>>;

    async fn insert_checkin(&mut self, checkin: &NewCheckin) -> Result<CheckinRecord>;

    /// 读取并锁定余额行
    async fn get_balance_for_update(&mut self, user_id: i64) -> Result<Option<i64>>;

    /// 创建余额行，返回新余额
    async fn insert_balance(&mut self, user_id: i64, amount: i64, at: DateTime<Utc>)
    -> Result<i64>;

    /// 余额累加，返回新余额；余额行不存在时返回 None
    async fn add_to_balance(
        &mut self,
        user_id: i64,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<i64>>;

    async fn insert_history(&mut self, entry: &NewPointHistory) -> Result<i64>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// 身份解析
///
/// 将外部身份标识映射为内部用户
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// 外部标识对应的内部用户 ID，不存在时返回 `UserNotFound`
    async fn resolve_user(&self, external_id: &str) -> Result<i64>;

    /// 查找或创建用户，返回用户及是否为新建
    async fn sign_in(&self, external_id: &str) -> Result<(User, bool)>;

    async fn get_user(&self, external_id: &str) -> Result<Option<User>>;
}

/// 地点目录
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaceCatalog: Send + Sync {
    async fn place_exists(&self, place_id: i64) -> Result<bool>;

    async fn get_place(&self, place_id: i64) -> Result<Option<Place>>;
}
