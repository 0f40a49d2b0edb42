use chrono::{DateTime, TimeZone, Utc};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use solveit_core::models::{Task, TaskId, TaskStatus, UserId};
use solveit_core::repository::{MemoryStore, TaskStore};
use solveit_hub::relay::NotificationRelay;
use solveit_hub::{Frame, Topic, TopicHub};
use solveit_worker::{DeadlineEnforcer, DeadlineReport};

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn assigned(title: &str, deadline: &str, assigned_at: DateTime<Utc>) -> Task {
    Task {
        id: TaskId::new(),
        title: title.to_string(),
        solver_id: Some(UserId::new()),
        deadline: deadline.to_string(),
        assigned_at: Some(assigned_at),
        status: TaskStatus::Assigned,
    }
}

struct Fixture {
    store: MemoryStore,
    relay: Arc<NotificationRelay>,
    enforcer: DeadlineEnforcer,
}

fn fixture(batch_size: u32) -> Fixture {
    let store = MemoryStore::new();
    let relay = Arc::new(NotificationRelay::new(TopicHub::default(), 8));
    let enforcer = DeadlineEnforcer::new(Arc::new(store.clone()), Arc::clone(&relay), batch_size);
    Fixture {
        store,
        relay,
        enforcer,
    }
}

/// A live notification subscriber for one user
async fn subscribe(
    relay: &Arc<NotificationRelay>,
    user: UserId,
    shutdown: &CancellationToken,
) -> (UnboundedSender<Result<Frame, Infallible>>, UnboundedReceiver<Frame>) {
    let (tx, inbound) = unbounded();
    let (outbound, rx) = unbounded();
    let topic = Topic::notification(user);

    tokio::spawn({
        let relay = Arc::clone(relay);
        let topic = topic.clone();
        let shutdown = shutdown.clone();
        async move { relay.subscribe(topic, inbound, outbound, shutdown).await }
    });
    tokio::time::timeout(Duration::from_secs(5), async {
        while relay.hub().connection_count(&topic).await == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();

    (tx, rx)
}

#[tokio::test]
async fn test_missed_deadline_blocks_resets_and_notifies() {
    let f = fixture(10);
    let task = assigned("Fix the parser", "24h", at(2024, 1, 1, 0));
    let solver = task.solver_id.unwrap();
    f.store.insert_task(task.clone());

    let shutdown = CancellationToken::new();
    let (_tx, mut rx) = subscribe(&f.relay, solver, &shutdown).await;

    let report = f.enforcer.run_at(at(2024, 1, 2, 1)).await.unwrap();
    assert_eq!(
        report,
        DeadlineReport {
            checked: 1,
            expired: 1,
            blocked: 1,
            skipped: 0,
            failed: 0,
        }
    );

    let block_list = f.store.block_list();
    assert_eq!(block_list.len(), 1);
    assert_eq!(block_list[0].user_id, solver);
    assert_eq!(block_list[0].task_id, task.id);
    assert_eq!(block_list[0].reason.as_deref(), Some("Missed Deadline"));

    let reset = f.store.task(task.id).unwrap();
    assert_eq!(reset.status, TaskStatus::Open);
    assert!(reset.solver_id.is_none());
    assert!(reset.assigned_at.is_none());

    let notifications = f.store.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].receiver_id, solver.to_string());
    assert_eq!(f.store.commit_count(), 1);

    let frame = tokio::time::timeout(Duration::from_secs(1), rx.next())
        .await
        .unwrap()
        .unwrap();
    let Frame::Text(text) = frame else {
        panic!("expected a text frame, got {frame:?}");
    };
    let pushed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(pushed["subject"], "Blocked From A Task");
    assert_eq!(pushed["senderId"], "solveit@org.com");
    assert_eq!(pushed["receiverId"], solver.to_string());
    assert_eq!(pushed["method"], "SYSTEM");
    assert_eq!(pushed["id"], notifications[0].id.to_string());

    // The reopened task is no longer a candidate.
    let again = f.enforcer.run_at(at(2024, 1, 3, 0)).await.unwrap();
    assert_eq!(again.checked, 0);
    assert_eq!(f.store.notifications().len(), 1);

    shutdown.cancel();
}

#[tokio::test]
async fn test_task_within_deadline_is_untouched() {
    let f = fixture(10);
    let task = assigned("t", "24h", at(2024, 1, 1, 0));
    f.store.insert_task(task.clone());

    let report = f.enforcer.run_at(at(2024, 1, 1, 23)).await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.expired, 0);
    assert!(f.store.block_list().is_empty());
    assert_eq!(f.store.task(task.id).unwrap().status, TaskStatus::Assigned);
}

#[tokio::test]
async fn test_already_blocked_pair_is_a_noop() {
    let f = fixture(10);
    let task = assigned("t", "3d", at(2024, 1, 1, 0));
    let solver = task.solver_id.unwrap();
    f.store.insert_task(task.clone());
    f.store
        .block_solver(solver, task.id, "Missed Deadline")
        .await
        .unwrap()
        .unwrap();

    let report = f.enforcer.run_at(at(2024, 2, 1, 0)).await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.blocked, 0);

    assert_eq!(f.store.block_list().len(), 1);
    assert!(f.store.notifications().is_empty());
    assert_eq!(f.store.commit_count(), 0);
    assert_eq!(f.store.task(task.id).unwrap().status, TaskStatus::Assigned);
}

#[tokio::test]
async fn test_failed_reset_rolls_back_and_retries_next_run() {
    let f = fixture(10);
    let task = assigned("t", "2w", at(2024, 1, 1, 0));
    f.store.insert_task(task.clone());
    f.store.fail_reset_task(true);

    let report = f.enforcer.run_at(at(2024, 1, 20, 0)).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.blocked, 0);
    assert!(f.store.notifications().is_empty());
    assert_eq!(f.store.rollback_count(), 1);
    assert_eq!(f.store.commit_count(), 0);
    assert_eq!(f.store.task(task.id).unwrap().status, TaskStatus::Assigned);
    assert!(f.store.block_list().is_empty());

    f.store.fail_reset_task(false);
    let report = f.enforcer.run_at(at(2024, 1, 20, 0)).await.unwrap();
    assert_eq!(report.blocked, 1);
    assert_eq!(f.store.notifications().len(), 1);
    assert_eq!(f.store.block_list().len(), 1);
}

#[tokio::test]
async fn test_failed_notification_leaves_task_assigned() {
    let f = fixture(10);
    let task = assigned("t", "1m", at(2024, 1, 31, 0));
    f.store.insert_task(task.clone());
    f.store.fail_create_notification(true);

    let report = f.enforcer.run_at(at(2024, 3, 1, 0)).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(f.store.rollback_count(), 1);
    assert_eq!(f.store.task(task.id).unwrap().status, TaskStatus::Assigned);
}

#[tokio::test]
async fn test_block_insert_error_skips_task() {
    let f = fixture(10);
    let task = assigned("t", "24h", at(2024, 1, 1, 0));
    f.store.insert_task(task.clone());
    f.store.fail_block_solver(true);

    let report = f.enforcer.run_at(at(2024, 1, 5, 0)).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(f.store.commit_count(), 0);
    assert_eq!(f.store.rollback_count(), 0);
    assert_eq!(f.store.task(task.id).unwrap().status, TaskStatus::Assigned);
}

#[tokio::test]
async fn test_invalid_deadline_is_skipped() {
    let f = fixture(10);
    f.store.insert_task(assigned("bad", "5x", at(2024, 1, 1, 0)));
    f.store.insert_task(assigned("good", "24h", at(2024, 1, 1, 0)));

    let report = f.enforcer.run_at(at(2024, 6, 1, 0)).await.unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.blocked, 1);
}

#[tokio::test]
async fn test_batch_is_bounded_by_concurrency() {
    let f = fixture(2);
    for day in 1..=3 {
        f.store.insert_task(assigned("t", "24h", at(2024, 1, day, 0)));
    }

    let report = f.enforcer.run_at(at(2024, 2, 1, 0)).await.unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.blocked, 2);

    let report = f.enforcer.run_at(at(2024, 2, 1, 0)).await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.blocked, 1);
}
