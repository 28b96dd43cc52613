//! 打卡账本流程测试
//!
//! 使用内存账本覆盖对账、重复打卡、首访与里程碑奖励、失败回滚和并发打卡，无需外部依赖。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use checkin_service::error::CheckinError;
use checkin_service::models::Stamp;
use checkin_service::repository::LedgerStore;
use checkin_service::service::{CheckinCommand, CheckinService, LedgerQueryService, PointPolicy};
use checkin_service::test_utils::{FailPoint, InMemoryLedger};
use fake::Fake;
use fake::faker::internet::en::Username;
use tokio_test::{assert_err, assert_ok};

// ==================== 辅助函数 ====================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
}

fn service(ledger: &InMemoryLedger) -> CheckinService {
    let ledger = Arc::new(ledger.clone());
    CheckinService::new(
        ledger.clone(),
        ledger,
        PointPolicy::default(),
        Duration::from_secs(5),
    )
}

fn new_user(ledger: &InMemoryLedger) -> i64 {
    let external_id: String = Username().fake();
    ledger.add_user(&external_id)
}

async fn assert_reconciled(ledger: &InMemoryLedger, user_id: i64) {
    let query = LedgerQueryService::new(Arc::new(ledger.clone()), 100);
    let report = query.reconcile(user_id).await.unwrap();
    assert!(
        report.consistent,
        "balance={} history_sum={}",
        report.balance, report.history_sum
    );
}

// ==================== 示例场景 ====================

#[tokio::test]
async fn test_first_visit_duplicate_then_consecutive() {
    let ledger = InMemoryLedger::new();
    let svc = service(&ledger);
    let user = new_user(&ledger);
    let p = ledger.add_place("江ノ島");
    let q = ledger.add_place("七里ヶ浜");

    let first = svc
        .record_checkin(CheckinCommand::new(user, p).at(t0()))
        .await
        .unwrap();
    assert_eq!(first.points_awarded, 600);
    assert_eq!(first.stamp_awarded, Some(Stamp::FirstVisit));
    assert_eq!(first.total_points_after, 600);

    let duplicate = svc
        .record_checkin(CheckinCommand::new(user, p).at(t0() + ChronoDuration::hours(1)))
        .await
        .unwrap_err();
    assert!(matches!(duplicate, CheckinError::DuplicateCheckin { .. }));

    // 新地点首访 + 24 小时内连续打卡
    let other = svc
        .record_checkin(CheckinCommand::new(user, q).at(t0() + ChronoDuration::hours(2)))
        .await
        .unwrap();
    assert_eq!(other.points_awarded, 800);
    assert_eq!(other.stamp_awarded, Some(Stamp::FirstVisit));
    assert_eq!(other.total_points_after, 1400);

    assert_eq!(ledger.checkin_count(user), 2);
    assert_reconciled(&ledger, user).await;
}

#[tokio::test]
async fn test_repeat_visit_with_consecutive_bonus() {
    let ledger = InMemoryLedger::new();
    let svc = service(&ledger);
    let user = new_user(&ledger);
    let p = ledger.add_place("江ノ島");
    let q = ledger.add_place("七里ヶ浜");

    // Q 的首访放在 T0 之前足够久，不影响 T0 之后的窗口
    svc.record_checkin(CheckinCommand::new(user, q).at(t0() - ChronoDuration::days(3)))
        .await
        .unwrap();
    let first = svc
        .record_checkin(CheckinCommand::new(user, p).at(t0()))
        .await
        .unwrap();
    assert_eq!(first.points_awarded, 600);

    // Q 的第二次到访：不是首访，距上一次打卡 2 小时
    let second = svc
        .record_checkin(CheckinCommand::new(user, q).at(t0() + ChronoDuration::hours(2)))
        .await
        .unwrap();
    assert_eq!(second.points_awarded, 300);
    assert_eq!(second.stamp_awarded, None);
    assert_eq!(second.total_points_after, 600 + 600 + 300);

    assert_reconciled(&ledger, user).await;
}

// ==================== 重复打卡 ====================

#[tokio::test]
async fn test_duplicate_within_window_keeps_single_record() {
    let ledger = InMemoryLedger::new();
    let svc = service(&ledger);
    let user = new_user(&ledger);
    let p = ledger.add_place("鎌倉高校前");

    svc.record_checkin(CheckinCommand::new(user, p).at(t0()))
        .await
        .unwrap();
    let err = svc
        .record_checkin(
            CheckinCommand::new(user, p).at(t0() + ChronoDuration::hours(23) + ChronoDuration::minutes(59)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CheckinError::DuplicateCheckin { user_id, place_id } if user_id == user && place_id == p));
    assert!(err.is_business_error());
    assert!(!err.is_retryable());
    assert_eq!(ledger.checkin_count(user), 1);
    assert_eq!(ledger.history_count(user), 1);
    assert_eq!(ledger.balance_of(user), Some(600));
}

#[tokio::test]
async fn test_checkin_allowed_after_window() {
    let ledger = InMemoryLedger::new();
    let svc = service(&ledger);
    let user = new_user(&ledger);
    let p = ledger.add_place("鎌倉高校前");

    svc.record_checkin(CheckinCommand::new(user, p).at(t0()))
        .await
        .unwrap();
    let again = svc
        .record_checkin(CheckinCommand::new(user, p).at(t0() + ChronoDuration::hours(24)))
        .await
        .unwrap();

    // 恰好 24 小时：不再是重复打卡，同时满足连续打卡
    assert_eq!(again.points_awarded, 300);
    assert_eq!(again.stamp_awarded, None);
    assert_eq!(ledger.checkin_count(user), 2);
}

#[tokio::test]
async fn test_backdated_checkin_is_judged_against_earlier_history() {
    let ledger = InMemoryLedger::new();
    let svc = service(&ledger);
    let user = new_user(&ledger);
    let p = ledger.add_place("七里ヶ浜");
    let q = ledger.add_place("稲村ヶ崎");

    let later = svc
        .record_checkin(CheckinCommand::new(user, q).at(t0() + ChronoDuration::days(3)))
        .await
        .unwrap();
    assert_eq!(later.points_awarded, 600);

    // 之后的打卡不构成连续打卡
    let backdated = svc
        .record_checkin(CheckinCommand::new(user, p).at(t0()))
        .await
        .unwrap();
    assert_eq!(backdated.points_awarded, 600);
    assert_eq!(backdated.stamp_awarded, Some(Stamp::FirstVisit));

    // Q 的已有打卡在三天后，不在窗口内；P 在一小时前，构成连续打卡
    let revisit = assert_ok!(
        svc.record_checkin(CheckinCommand::new(user, q).at(t0() + ChronoDuration::hours(1)))
            .await
    );
    assert_eq!(revisit.points_awarded, 100 + 200);
    assert_eq!(revisit.stamp_awarded, None);

    // 晚于本次且不足一个窗口的打卡同样拦截
    let err = assert_err!(
        svc.record_checkin(CheckinCommand::new(user, q).at(t0() + ChronoDuration::days(3) - ChronoDuration::hours(2)))
            .await
    );
    assert!(matches!(err, CheckinError::DuplicateCheckin { .. }));

    assert_eq!(ledger.checkin_count(user), 3);
    assert_eq!(ledger.balance_of(user), Some(600 + 600 + 300));
    assert_reconciled(&ledger, user).await;
}

// ==================== 首访与里程碑 ====================

#[tokio::test]
async fn test_first_visit_is_independent_of_other_users() {
    let ledger = InMemoryLedger::new();
    let svc = service(&ledger);
    let p = ledger.add_place("須賀神社");

    for _ in 0..3 {
        let user = new_user(&ledger);
        let result = svc
            .record_checkin(CheckinCommand::new(user, p).at(t0()))
            .await
            .unwrap();
        assert_eq!(result.points_awarded, 600);
        assert_eq!(result.stamp_awarded, Some(Stamp::FirstVisit));
        assert_eq!(result.total_points_after, 600);
    }
}

#[tokio::test]
async fn test_milestones_over_ten_visits() {
    let ledger = InMemoryLedger::new();
    let svc = service(&ledger);
    let user = new_user(&ledger);
    let p = ledger.add_place("豊郷小学校旧校舎群");

    let mut total = 0;
    for visit in 1..=10 {
        // 间隔 25 小时，既不重复也不连续
        let at = t0() + ChronoDuration::hours(25 * (visit - 1));
        let result = svc
            .record_checkin(CheckinCommand::new(user, p).at(at))
            .await
            .unwrap();

        let (points, stamp) = match visit {
            1 => (600, Some(Stamp::FirstVisit)),
            5 => (300, Some(Stamp::FiveVisits)),
            10 => (1100, Some(Stamp::TenVisits)),
            _ => (100, None),
        };
        total += points;

        assert_eq!(result.points_awarded, points, "visit {visit}");
        assert_eq!(result.stamp_awarded, stamp, "visit {visit}");
        assert_eq!(result.total_points_after, total, "visit {visit}");
    }

    assert_eq!(total, 2700);
    assert_eq!(ledger.checkin_count(user), 10);
    assert_reconciled(&ledger, user).await;
}

// ==================== 前置条件 ====================

#[tokio::test]
async fn test_place_checked_before_user() {
    let ledger = InMemoryLedger::new();
    let svc = service(&ledger);

    let err = svc
        .record_checkin(CheckinCommand::new(424242, 999).at(t0()))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckinError::PlaceNotFound(999)));

    let p = ledger.add_place("大洗");
    let err = svc
        .record_checkin(CheckinCommand::new(424242, p).at(t0()))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckinError::UserNotFound(_)));
}

// ==================== 失败回滚 ====================

#[tokio::test]
async fn test_rollback_at_every_fail_point() {
    for point in [
        FailPoint::Begin,
        FailPoint::InsertCheckin,
        FailPoint::UpdateBalance,
        FailPoint::InsertHistory,
        FailPoint::Commit,
    ] {
        let ledger = InMemoryLedger::new();
        let svc = service(&ledger);
        let user = new_user(&ledger);
        let p = ledger.add_place("沼津");
        let q = ledger.add_place("内浦");

        // 先有一次成功打卡，确保余额行已存在
        svc.record_checkin(CheckinCommand::new(user, p).at(t0()))
            .await
            .unwrap();

        ledger.inject_failure(point);
        let err = svc
            .record_checkin(CheckinCommand::new(user, q).at(t0() + ChronoDuration::hours(30)))
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "{point:?}");

        assert_eq!(ledger.checkin_count(user), 1, "{point:?}");
        assert_eq!(ledger.history_count(user), 1, "{point:?}");
        assert_eq!(ledger.balance_of(user), Some(600), "{point:?}");
        assert_reconciled(&ledger, user).await;

        // 故障清除后重试成功
        ledger.clear_faults();
        let retried = svc
            .record_checkin(CheckinCommand::new(user, q).at(t0() + ChronoDuration::hours(30)))
            .await
            .unwrap();
        assert_eq!(retried.total_points_after, 1200, "{point:?}");
    }
}

#[tokio::test]
async fn test_failed_first_checkin_creates_no_balance() {
    let ledger = InMemoryLedger::new();
    let svc = service(&ledger);
    let user = new_user(&ledger);
    let p = ledger.add_place("沼津");

    ledger.inject_failure(FailPoint::InsertHistory);
    assert_err!(svc.record_checkin(CheckinCommand::new(user, p).at(t0())).await);

    assert_eq!(ledger.balance_of(user), None);
    assert_eq!(ledger.checkin_count(user), 0);
}

#[tokio::test]
async fn test_timeout_rolls_back() {
    let ledger = InMemoryLedger::new();
    let arc = Arc::new(ledger.clone());
    let svc = CheckinService::new(
        arc.clone(),
        arc,
        PointPolicy::default(),
        Duration::from_millis(50),
    );
    let user = new_user(&ledger);
    let p = ledger.add_place("秩父");

    ledger.inject_stall(FailPoint::InsertHistory);
    let err = svc
        .record_checkin(CheckinCommand::new(user, p).at(t0()))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckinError::Timeout(50)));
    assert_eq!(ledger.checkin_count(user), 0);
    assert_eq!(ledger.balance_of(user), None);

    // 超时的事务已释放用户锁
    ledger.clear_faults();
    assert_ok!(svc.record_checkin(CheckinCommand::new(user, p).at(t0())).await);
    assert_eq!(ledger.balance_of(user), Some(600));
}

// ==================== 并发 ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_checkins_credit_once() {
    const N: usize = 16;

    let ledger = InMemoryLedger::new();
    let svc = Arc::new(service(&ledger));
    let user = new_user(&ledger);
    let p = ledger.add_place("白川郷");

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.record_checkin(CheckinCommand::new(user, p).at(t0())).await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let accepted: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(CheckinError::DuplicateCheckin { .. })))
        .count();

    assert_eq!(accepted.len(), 1);
    assert_eq!(conflicts, N - 1);
    assert_eq!(accepted[0].stamp_awarded, Some(Stamp::FirstVisit));
    assert_eq!(ledger.checkin_count(user), 1);
    assert_eq!(ledger.balance_of(user), Some(600));
    assert_reconciled(&ledger, user).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_users_are_independent() {
    let ledger = InMemoryLedger::new();
    let svc = Arc::new(service(&ledger));
    let p = ledger.add_place("白川郷");
    let users: Vec<i64> = (0..8).map(|_| new_user(&ledger)).collect();

    let handles: Vec<_> = users
        .iter()
        .map(|&user| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.record_checkin(CheckinCommand::new(user, p).at(t0())).await })
        })
        .collect();

    for joined in futures::future::join_all(handles).await {
        assert_eq!(joined.unwrap().unwrap().points_awarded, 600);
    }
    for user in users {
        assert_eq!(ledger.balance_of(user), Some(600));
    }
}

// ==================== 只读查询 ====================

#[tokio::test]
async fn test_history_and_content_counts() {
    let ledger = InMemoryLedger::new();
    let svc = service(&ledger);
    let user = new_user(&ledger);
    let content = ledger.add_content("響け！ユーフォニアム");
    let p1 = ledger.add_place_to_content(content, "宇治橋");
    let p2 = ledger.add_place_to_content(content, "大吉山展望台");
    let untouched = ledger.add_content("たまこまーけっと");

    svc.record_checkin(CheckinCommand::new(user, p1).at(t0()))
        .await
        .unwrap();
    svc.record_checkin(CheckinCommand::new(user, p2).at(t0() + ChronoDuration::hours(3)))
        .await
        .unwrap();

    let query = LedgerQueryService::new(Arc::new(ledger.clone()), 100);

    let history = query.list_checkins(user, None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].place_id, p2);
    assert_eq!(history[1].place_id, p1);

    let counts = query.content_checkin_counts(user).await.unwrap();
    let count_of = |id: i64| {
        counts
            .iter()
            .find(|c| c.content_id == id)
            .map(|c| c.checkin_count)
    };
    assert_eq!(count_of(content), Some(2));
    assert_eq!(count_of(untouched), Some(0));

    let summary = query.point_summary(user, Some(1)).await.unwrap();
    assert_eq!(summary.current_point, 600 + 800);
    assert_eq!(summary.history.len(), 1);
    assert_eq!(summary.history[0].delta, 800);
    assert_eq!(summary.history[0].reason, "checkin");

    assert_eq!(ledger.sum_point_history(user).await.unwrap(), 1400);
}
