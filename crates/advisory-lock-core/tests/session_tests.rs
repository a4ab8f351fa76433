//! Lock session semantics, exercised against the in-memory backend.

use std::time::{Duration, Instant};

use advisory_lock_core::memory::{MemoryLockSession, MemoryLockTable, MemorySessionSource};
use advisory_lock_core::prelude::*;

fn source_with_capacity(capacity: usize) -> MemorySessionSource {
    MemorySessionSource::new(MemoryLockTable::new(), capacity)
}

async fn session(source: &MemorySessionSource, key: i64) -> LockSession<MemoryLockSession> {
    LockSession::bind(source, key, None).await.unwrap()
}

#[tokio::test]
async fn exclusive_lock_is_mutually_exclusive() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 1).await;
    let mut b = session(&source, 1).await;

    assert!(a.try_exclusive().await.unwrap());
    // Contention is Ok(false), never an error.
    assert!(!b.try_exclusive().await.unwrap());
    assert!(!b.try_shared().await.unwrap());
}

#[tokio::test]
async fn released_lock_is_handed_over() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 1).await;
    let mut b = session(&source, 1).await;

    assert!(a.try_exclusive().await.unwrap());
    assert!(!b.try_exclusive().await.unwrap());
    a.release_exclusive().await.unwrap();
    assert!(b.try_exclusive().await.unwrap());
}

#[tokio::test]
async fn shared_locks_are_compatible() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 7).await;
    let mut b = session(&source, 7).await;
    let mut c = session(&source, 7).await;

    assert!(a.try_shared().await.unwrap());
    assert!(b.try_shared().await.unwrap());
    assert!(!b.try_exclusive().await.unwrap());
    assert!(c.try_shared().await.unwrap());
}

#[tokio::test]
async fn exclusive_waits_for_every_shared_holder() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 7).await;
    let mut b = session(&source, 7).await;
    let mut c = session(&source, 7).await;

    assert!(a.try_shared().await.unwrap());
    assert!(b.try_shared().await.unwrap());

    a.release_shared().await.unwrap();
    assert!(!c.try_exclusive().await.unwrap());

    b.release_shared().await.unwrap();
    assert!(c.try_exclusive().await.unwrap());
}

#[tokio::test]
async fn sessions_reenter_their_own_locks() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 3).await;
    let mut b = session(&source, 3).await;

    assert!(a.try_exclusive().await.unwrap());
    // Re-acquiring never blocks on the session's own hold, even via wait.
    assert!(a.try_exclusive().await.unwrap());
    a.wait_exclusive(Some(Duration::from_millis(50))).await.unwrap();

    // Other sessions' view is unchanged by the re-acquisitions.
    assert!(!b.try_exclusive().await.unwrap());
}

#[tokio::test]
async fn stacked_acquires_need_matched_releases() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 9).await;
    let mut b = session(&source, 9).await;

    for _ in 0..3 {
        assert!(a.try_exclusive().await.unwrap());
    }
    for _ in 0..2 {
        a.release_exclusive().await.unwrap();
        assert!(!b.try_exclusive().await.unwrap());
    }
    a.release_exclusive().await.unwrap();
    assert!(b.try_exclusive().await.unwrap());
}

#[tokio::test]
async fn close_releases_all_counts_at_once() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 5).await;
    let mut b = session(&source, 5).await;

    assert!(a.try_exclusive().await.unwrap());
    assert!(a.try_exclusive().await.unwrap());
    a.close().await.unwrap();

    assert!(b.try_exclusive().await.unwrap());
}

#[tokio::test]
async fn drop_releases_all_counts_at_once() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 5).await;
    let mut b = session(&source, 5).await;

    assert!(a.try_exclusive().await.unwrap());
    drop(a);

    assert!(b.try_exclusive().await.unwrap());
}

#[tokio::test]
async fn timed_out_wait_leaves_nothing_held() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 11).await;
    let mut b = session(&source, 11).await;

    assert!(a.try_exclusive().await.unwrap());

    let start = Instant::now();
    let err = b
        .wait_exclusive(Some(Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Timeout(_)));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(400), "took {elapsed:?}");

    // B never silently acquired: it still sees A's hold...
    assert!(!b.try_exclusive().await.unwrap());
    // ...and once A lets go, a third session is not blocked by B.
    a.release_exclusive().await.unwrap();
    let mut c = session(&source, 11).await;
    assert!(c.try_exclusive().await.unwrap());
}

#[tokio::test]
async fn wait_wakes_when_holder_releases() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 13).await;
    let mut b = session(&source, 13).await;

    assert!(a.try_exclusive().await.unwrap());

    let waiter = tokio::spawn(async move {
        b.wait_exclusive(Some(Duration::from_secs(5))).await.unwrap();
        b
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    a.release_exclusive().await.unwrap();

    let mut b = waiter.await.unwrap();
    // B now holds exclusive; A cannot get it back.
    assert!(!a.try_exclusive().await.unwrap());
    b.release_exclusive().await.unwrap();
}

#[tokio::test]
async fn wait_shared_blocks_only_on_exclusive() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 17).await;
    let mut b = session(&source, 17).await;

    assert!(a.try_shared().await.unwrap());
    // Another shared waiter is granted immediately.
    b.wait_shared(Some(Duration::from_millis(100))).await.unwrap();
    b.release_shared().await.unwrap();

    a.release_shared().await.unwrap();
    assert!(a.try_exclusive().await.unwrap());
    let err = b
        .wait_shared(Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Timeout(_)));
}

#[tokio::test]
async fn release_without_hold_is_a_silent_noop() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 19).await;
    let mut b = session(&source, 19).await;

    a.release_exclusive().await.unwrap();
    a.release_shared().await.unwrap();

    // The no-ops did not create or disturb any hold.
    assert!(b.try_exclusive().await.unwrap());
    assert!(!a.try_exclusive().await.unwrap());
}

#[tokio::test]
async fn closed_session_rejects_every_operation() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 23).await;

    a.close().await.unwrap();
    assert!(a.is_closed());

    assert!(matches!(a.try_exclusive().await, Err(LockError::SessionClosed)));
    assert!(matches!(a.try_shared().await, Err(LockError::SessionClosed)));
    assert!(matches!(a.wait_exclusive(None).await, Err(LockError::SessionClosed)));
    assert!(matches!(a.wait_shared(None).await, Err(LockError::SessionClosed)));
    assert!(matches!(a.release_exclusive().await, Err(LockError::SessionClosed)));
    assert!(matches!(a.release_shared().await, Err(LockError::SessionClosed)));
    assert!(matches!(a.close().await, Err(LockError::SessionClosed)));
}

#[tokio::test]
async fn exhausted_source_reports_unavailable() {
    let source = source_with_capacity(1);
    let held = session(&source, 29).await;

    let err = LockSession::bind(&source, 29, Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Unavailable));

    // Ending the session frees its slot.
    drop(held);
    let mut again = LockSession::bind(&source, 29, Some(Duration::from_millis(50)))
        .await
        .unwrap();
    assert!(again.try_exclusive().await.unwrap());
}

#[tokio::test]
async fn session_debug_reports_key_and_state() {
    let source = source_with_capacity(1);
    let mut a = session(&source, 31).await;

    // Sessions show up in assertion output (unwrap/unwrap_err on results
    // carrying them), so the rendering must work without a Debug backend.
    let rendered = format!("{a:?}");
    assert!(rendered.contains("31"), "got {rendered}");
    assert!(rendered.contains("closed: false"), "got {rendered}");

    a.close().await.unwrap();
    assert!(format!("{a:?}").contains("closed: true"));
}

#[tokio::test]
async fn distinct_keys_do_not_contend() {
    let source = source_with_capacity(4);
    let mut a = session(&source, 1).await;
    let mut b = session(&source, 2).await;

    assert!(a.try_exclusive().await.unwrap());
    assert!(b.try_exclusive().await.unwrap());
}
