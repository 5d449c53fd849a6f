//! Result store behaviour through the `TaskStore` trait object.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use faceapi_tasks::store::memory::{InMemoryBackend, InMemoryTaskStore};
use faceapi_tasks::store::{StoreConfig, TaskStore};
use faceapi_tasks::{
    FaceBestMatchResult, FaceQualityResult, FaceRegisterResult, Task, TaskId, TaskStatus,
};

fn store(ttl: Duration) -> Arc<dyn TaskStore> {
    Arc::new(
        InMemoryTaskStore::new(InMemoryBackend::new())
            .with_config(StoreConfig::default().with_task_ttl(ttl)),
    )
}

// ─── Lifecycle Tests ────────────────────────────────────────────────────────

#[tokio::test]
async fn full_lifecycle_overwrites_one_record() {
    let store = store(Duration::from_secs(60));
    let id = TaskId::new();

    store.put(&id, &Task::queued()).await.unwrap();
    assert_eq!(
        store.get(&id).await.unwrap().map(|t| t.status()),
        Some(TaskStatus::Queued)
    );

    store.put(&id, &Task::started()).await.unwrap();
    assert_eq!(
        store.get(&id).await.unwrap().map(|t| t.status()),
        Some(TaskStatus::Started)
    );

    let terminal = Task::finished(FaceRegisterResult::new("0b8e"));
    store.put(&id, &terminal).await.unwrap();
    assert_eq!(store.get(&id).await.unwrap(), Some(terminal));
}

#[tokio::test]
async fn repeated_reads_of_terminal_record_are_identical() {
    let store = store(Duration::from_secs(60));
    let id = TaskId::new();
    store
        .put(&id, &Task::finished(FaceBestMatchResult::new("face", 0.93)))
        .await
        .unwrap();

    let first = store.get(&id).await.unwrap();
    for _ in 0..5 {
        assert_eq!(store.get(&id).await.unwrap(), first);
    }
}

#[tokio::test]
async fn tasks_are_isolated_by_id() {
    let store = store(Duration::from_secs(60));
    let a = TaskId::new();
    let b = TaskId::new();
    store
        .put(&a, &Task::finished(FaceQualityResult::new(0.1)))
        .await
        .unwrap();
    store.put(&b, &Task::failed("no faces in db")).await.unwrap();

    assert_eq!(
        store.get(&a).await.unwrap().unwrap().status(),
        TaskStatus::Finished
    );
    assert_eq!(
        store.get(&b).await.unwrap().unwrap().failure_message(),
        Some("no faces in db")
    );
}

// ─── Expiry Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn expired_task_is_indistinguishable_from_unknown() {
    let store = store(Duration::from_millis(25));
    let id = TaskId::new();
    store.put(&id, &Task::queued()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(store.get(&id).await.unwrap(), None);
    assert_eq!(store.get(&TaskId::new()).await.unwrap(), None);
}

#[tokio::test]
async fn each_write_restarts_expiry() {
    let store = store(Duration::from_millis(80));
    let id = TaskId::new();
    store.put(&id, &Task::queued()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.put(&id, &Task::started()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(store.get(&id).await.unwrap(), Some(Task::started()));
}

#[tokio::test]
async fn cleanup_reports_removed_records() {
    let store = store(Duration::from_millis(10));
    for _ in 0..3 {
        store.put(&TaskId::new(), &Task::queued()).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(store.cleanup_expired().await.unwrap(), 3);
    assert_eq!(store.cleanup_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn writes_reclaim_records_nobody_reads_again() {
    let store = InMemoryTaskStore::new(InMemoryBackend::new().with_sweep_interval(Duration::ZERO))
        .with_config(StoreConfig::default().with_task_ttl(Duration::from_millis(10)));
    for _ in 0..5 {
        store.put(&TaskId::new(), &Task::failed("gone")).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(40)).await;

    let fresh = TaskId::new();
    store.put(&fresh, &Task::queued()).await.unwrap();

    assert_eq!(store.backend().len(), 1);
    assert_eq!(store.get(&fresh).await.unwrap(), Some(Task::queued()));
}

// ─── Concurrency Tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_writers_on_distinct_keys() {
    let store = store(Duration::from_secs(60));
    let ids: Vec<TaskId> = (0..32).map(|_| TaskId::new()).collect();

    let writes = ids.iter().map(|id| {
        let store = Arc::clone(&store);
        let id = *id;
        tokio::spawn(async move {
            store.put(&id, &Task::started()).await.unwrap();
            store
                .put(&id, &Task::finished(FaceQualityResult::new(0.5)))
                .await
                .unwrap();
        })
    });
    for result in futures::future::join_all(writes).await {
        result.unwrap();
    }

    for id in &ids {
        assert!(store.get(id).await.unwrap().unwrap().is_terminal());
    }
}
