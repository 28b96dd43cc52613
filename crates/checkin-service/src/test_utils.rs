//! 测试工具
//!
//! 提供内存版账本存储和目录，供单元测试和集成测试在无数据库环境下运行。
//!
//! [`InMemoryLedger`] 同时实现 [`LedgerStore`]、[`IdentityResolver`] 和 [`PlaceCatalog`]：
//! - 事务持有用户级锁，语义等同于 `SELECT ... FOR UPDATE`
//! - 写入先暂存在事务内，`commit` 时一次性生效，drop 即回滚
//! - 支持在指定步骤注入失败或挂起，用于验证回滚和超时

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

use crate::error::{CheckinError, Result};
use crate::models::{
    CheckinRecord, ContentCheckinCount, NewCheckin, NewPointHistory, Place, PointBalance,
    PointHistoryEntry, User,
};
use crate::repository::{IdentityResolver, LedgerStore, LedgerTransaction, PlaceCatalog};

/// 可注入故障的事务步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    InsertCheckin,
    UpdateBalance,
    InsertHistory,
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    /// 返回存储错误
    Fail,
    /// 挂起指定时长后继续
    Stall(Duration),
}

#[derive(Default)]
struct LedgerData {
    users: BTreeMap<i64, User>,
    contents: BTreeMap<i64, String>,
    places: BTreeMap<i64, Place>,
    checkins: Vec<CheckinRecord>,
    balances: HashMap<i64, PointBalance>,
    history: Vec<PointHistoryEntry>,
}

struct Inner {
    data: Mutex<LedgerData>,
    user_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    faults: Mutex<HashMap<FailPoint, Fault>>,
    vanish_balance: AtomicBool,
    next_id: AtomicI64,
}

/// 内存账本
#[derive(Clone)]
pub struct InMemoryLedger {
    inner: Arc<Inner>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                data: Mutex::new(LedgerData::default()),
                user_locks: Mutex::new(HashMap::new()),
                faults: Mutex::new(HashMap::new()),
                vanish_balance: AtomicBool::new(false),
                next_id: AtomicI64::new(1),
            }),
        }
    }

    fn next_id(&self) -> i64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst)
    }

    // ==================== 数据准备 ====================

    /// 登记用户，返回内部 ID
    pub fn add_user(&self, external_id: &str) -> i64 {
        let id = self.next_id();
        self.inner.data.lock().users.insert(
            id,
            User {
                id,
                external_id: external_id.to_string(),
                created_at: Utc::now(),
            },
        );
        id
    }

    /// 登记作品，返回作品 ID
    pub fn add_content(&self, name: &str) -> i64 {
        let id = self.next_id();
        self.inner.data.lock().contents.insert(id, name.to_string());
        id
    }

    /// 登记地点到指定作品下
    pub fn add_place_to_content(&self, content_id: i64, name: &str) -> i64 {
        let id = self.next_id();
        self.inner.data.lock().places.insert(
            id,
            Place {
                id,
                content_id,
                name: name.to_string(),
                address: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// 登记地点，自动创建同名作品
    pub fn add_place(&self, name: &str) -> i64 {
        let content_id = self.add_content(name);
        self.add_place_to_content(content_id, name)
    }

    // ==================== 故障注入 ====================

    /// 在指定步骤返回存储错误
    pub fn inject_failure(&self, point: FailPoint) {
        self.inner.faults.lock().insert(point, Fault::Fail);
    }

    /// 在指定步骤挂起，直到调用方超时放弃
    pub fn inject_stall(&self, point: FailPoint) {
        self.inject_delay(point, Duration::from_secs(3600));
    }

    /// 在指定步骤延迟一段时间后继续
    pub fn inject_delay(&self, point: FailPoint, delay: Duration) {
        self.inner.faults.lock().insert(point, Fault::Stall(delay));
    }

    /// 余额累加时表现为余额行不存在
    pub fn vanish_balance_on_update(&self) {
        self.inner.vanish_balance.store(true, Ordering::SeqCst);
    }

    pub fn clear_faults(&self) {
        self.inner.faults.lock().clear();
        self.inner.vanish_balance.store(false, Ordering::SeqCst);
    }

    // ==================== 已提交数据查询 ====================

    pub fn balance_of(&self, user_id: i64) -> Option<i64> {
        self.inner
            .data
            .lock()
            .balances
            .get(&user_id)
            .map(|b| b.current_point)
    }

    pub fn checkin_count(&self, user_id: i64) -> usize {
        self.inner
            .data
            .lock()
            .checkins
            .iter()
            .filter(|c| c.user_id == user_id)
            .count()
    }

    pub fn history_count(&self, user_id: i64) -> usize {
        self.inner
            .data
            .lock()
            .history
            .iter()
            .filter(|h| h.user_id == user_id)
            .count()
    }

    /// 按故障配置执行：返回错误、挂起或直接通过
    async fn trip(&self, point: FailPoint) -> Result<()> {
        let fault = self.inner.faults.lock().get(&point).copied();
        match fault {
            Some(Fault::Fail) => Err(CheckinError::Database(sqlx::Error::Protocol(format!(
                "injected failure at {:?}",
                point
            )))),
            Some(Fault::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>> {
        self.trip(FailPoint::Begin).await?;
        Ok(Box::new(InMemoryTransaction {
            ledger: self.clone(),
            _user_guard: None,
            checkins: Vec::new(),
            balance: None,
            history: Vec::new(),
        }))
    }

    async fn list_checkins(&self, user_id: i64, limit: i64) -> Result<Vec<CheckinRecord>> {
        let data = self.inner.data.lock();
        let mut records: Vec<_> = data
            .checkins
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn get_balance(&self, user_id: i64) -> Result<Option<PointBalance>> {
        Ok(self.inner.data.lock().balances.get(&user_id).cloned())
    }

    async fn list_point_history(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<PointHistoryEntry>> {
        let data = self.inner.data.lock();
        let mut entries: Vec<_> = data
            .history
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }

    async fn sum_point_history(&self, user_id: i64) -> Result<i64> {
        Ok(self
            .inner
            .data
            .lock()
            .history
            .iter()
            .filter(|h| h.user_id == user_id)
            .map(|h| h.delta)
            .sum())
    }

    async fn content_checkin_counts(&self, user_id: i64) -> Result<Vec<ContentCheckinCount>> {
        let data = self.inner.data.lock();
        let counts = data
            .contents
            .iter()
            .map(|(&content_id, name)| {
                let checkin_count = data
                    .checkins
                    .iter()
                    .filter(|c| c.user_id == user_id)
                    .filter(|c| {
                        data.places
                            .get(&c.place_id)
                            .is_some_and(|p| p.content_id == content_id)
                    })
                    .count() as i64;
                ContentCheckinCount {
                    content_id,
                    content_name: name.clone(),
                    checkin_count,
                }
            })
            .collect();
        Ok(counts)
    }
}

/// 内存账本事务
///
/// 读取时合并已提交数据和本事务暂存的写入
struct InMemoryTransaction {
    ledger: InMemoryLedger,
    _user_guard: Option<OwnedMutexGuard<()>>,
    checkins: Vec<CheckinRecord>,
    balance: Option<PointBalance>,
    history: Vec<PointHistoryEntry>,
}

impl InMemoryTransaction {
    fn visits_at_place(&self, user_id: i64, place_id: i64) -> Vec<DateTime<Utc>> {
        let data = self.ledger.inner.data.lock();
        data.checkins
            .iter()
            .chain(self.checkins.iter())
            .filter(|c| c.user_id == user_id && c.place_id == place_id)
            .map(|c| c.created_at)
            .collect()
    }

    fn current_balance(&self, user_id: i64) -> Option<i64> {
        self.balance
            .as_ref()
            .filter(|b| b.user_id == user_id)
            .map(|b| b.current_point)
            .or_else(|| {
                self.ledger
                    .inner
                    .data
                    .lock()
                    .balances
                    .get(&user_id)
                    .map(|b| b.current_point)
            })
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn lock_user(&mut self, user_id: i64) -> Result<bool> {
        let known = self.ledger.inner.data.lock().users.contains_key(&user_id);
        if !known {
            return Ok(false);
        }

        let lock = self
            .ledger
            .inner
            .user_locks
            .lock()
            .entry(user_id)
            .or_default()
            .clone();
        self._user_guard = Some(lock.lock_owned().await);
        Ok(true)
    }

    async fn nearest_checkin_at_place(
        &mut self,
        user_id: i64,
        place_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .visits_at_place(user_id, place_id)
            .into_iter()
            .min_by_key(|visit| (at - *visit).abs()))
    }

    async fn count_checkins_at_place(&mut self, user_id: i64, place_id: i64) -> Result<i64> {
        Ok(self.visits_at_place(user_id, place_id).len() as i64)
    }

    async fn latest_checkin_until(
        &mut self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let data = self.ledger.inner.data.lock();
        Ok(data
            .checkins
            .iter()
            .chain(self.checkins.iter())
            .filter(|c| c.user_id == user_id && c.created_at <= at)
            .map(|c| c.created_at)
            .max())
    }

    async fn insert_checkin(&mut self, checkin: &NewCheckin) -> Result<CheckinRecord> {
        self.ledger.trip(FailPoint::InsertCheckin).await?;
        let record = CheckinRecord {
            id: self.ledger.next_id(),
            user_id: checkin.user_id,
            place_id: checkin.place_id,
            points: checkin.points,
            stamp_id: checkin.stamp,
            created_at: checkin.checked_in_at,
        };
        self.checkins.push(record.clone());
        Ok(record)
    }

    async fn get_balance_for_update(&mut self, user_id: i64) -> Result<Option<i64>> {
        Ok(self.current_balance(user_id))
    }

    async fn insert_balance(
        &mut self,
        user_id: i64,
        amount: i64,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        self.ledger.trip(FailPoint::UpdateBalance).await?;
        self.balance = Some(PointBalance {
            user_id,
            current_point: amount,
            updated_at: at,
        });
        Ok(amount)
    }

    async fn add_to_balance(
        &mut self,
        user_id: i64,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        self.ledger.trip(FailPoint::UpdateBalance).await?;
        if self.ledger.inner.vanish_balance.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let Some(current) = self.current_balance(user_id) else {
            return Ok(None);
        };
        let updated = current + delta;
        self.balance = Some(PointBalance {
            user_id,
            current_point: updated,
            updated_at: at,
        });
        Ok(Some(updated))
    }

    async fn insert_history(&mut self, entry: &NewPointHistory) -> Result<i64> {
        self.ledger.trip(FailPoint::InsertHistory).await?;
        let id = self.ledger.next_id();
        self.history.push(PointHistoryEntry {
            id,
            user_id: entry.user_id,
            delta: entry.delta,
            reason: entry.reason.clone(),
            created_at: entry.created_at,
        });
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.ledger.trip(FailPoint::Commit).await?;

        let this = *self;
        let mut data = this.ledger.inner.data.lock();
        data.checkins.extend(this.checkins);
        if let Some(balance) = this.balance {
            data.balances.insert(balance.user_id, balance);
        }
        data.history.extend(this.history);
        Ok(())
    }
}

#[async_trait]
impl IdentityResolver for InMemoryLedger {
    async fn resolve_user(&self, external_id: &str) -> Result<i64> {
        self.get_user(external_id)
            .await?
            .map(|u| u.id)
            .ok_or_else(|| CheckinError::UserNotFound(external_id.to_string()))
    }

    async fn sign_in(&self, external_id: &str) -> Result<(User, bool)> {
        if external_id.trim().is_empty() {
            return Err(CheckinError::Validation("外部身份标识不能为空".to_string()));
        }
        if let Some(user) = self.get_user(external_id).await? {
            return Ok((user, false));
        }
        let id = self.add_user(external_id);
        let user = self
            .inner
            .data
            .lock()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| CheckinError::InvariantViolation(format!("用户写入后丢失: {}", id)))?;
        Ok((user, true))
    }

    async fn get_user(&self, external_id: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .data
            .lock()
            .users
            .values()
            .find(|u| u.external_id == external_id)
            .cloned())
    }
}

#[async_trait]
impl PlaceCatalog for InMemoryLedger {
    async fn place_exists(&self, place_id: i64) -> Result<bool> {
        Ok(self.inner.data.lock().places.contains_key(&place_id))
    }

    async fn get_place(&self, place_id: i64) -> Result<Option<Place>> {
        Ok(self.inner.data.lock().places.get(&place_id).cloned())
    }
}
