//! Tests for the adopt engine and reference counting.
//!
//! The invariant under test: a content's ref_count equals the number of
//! principals holding a live (not yet purged) claim — incremented only on
//! the none→active transition, untouched by soft-delete and restore,
//! decremented when a hard delete leaves a principal with no active claim.

use depot_db::test_fixtures::{claim_content, create_test_content, create_test_principal, test_pool};
use depot_db::{ClaimState, FileRole, PgContentRepository, PgUserFileRepository};
use sqlx::PgPool;
use uuid::Uuid;

async fn refcount(pool: &PgPool, content_id: Uuid) -> i32 {
    PgContentRepository::new(pool.clone())
        .ref_count(content_id)
        .await
        .expect("refcount query")
        .expect("content row exists")
}

#[tokio::test]
async fn test_first_adopt_increments_refcount() {
    let pool = test_pool().await;
    let principal = create_test_principal(&pool, "adopt-first").await;
    let content = create_test_content(&pool, 1024).await;

    claim_content(&pool, principal, content).await;

    assert_eq!(refcount(&pool, content).await, 1);
}

#[tokio::test]
async fn test_repeat_adopt_returns_same_claim_without_increment() {
    let pool = test_pool().await;
    let principal = create_test_principal(&pool, "adopt-repeat").await;
    let content = create_test_content(&pool, 1024).await;

    let first = claim_content(&pool, principal, content).await;
    let second = claim_content(&pool, principal, content).await;

    assert_eq!(first, second, "second adopt must reuse the active claim");
    assert_eq!(refcount(&pool, content).await, 1);
}

#[tokio::test]
async fn test_two_principals_count_twice() {
    let pool = test_pool().await;
    let a = create_test_principal(&pool, "adopt-a").await;
    let b = create_test_principal(&pool, "adopt-b").await;
    let content = create_test_content(&pool, 2048).await;

    claim_content(&pool, a, content).await;
    claim_content(&pool, b, content).await;

    assert_eq!(refcount(&pool, content).await, 2);
}

#[tokio::test]
async fn test_adopt_restores_newest_trashed_claim() {
    let pool = test_pool().await;
    let principal = create_test_principal(&pool, "adopt-restore").await;
    let content = create_test_content(&pool, 512).await;
    let user_files = PgUserFileRepository::new(pool.clone());

    let claim = claim_content(&pool, principal, content).await;
    user_files
        .soft_delete_newest(principal, content)
        .await
        .expect("soft delete")
        .expect("claim existed");

    // Re-adopt: the trashed claim comes back instead of a new row.
    let restored = claim_content(&pool, principal, content).await;
    assert_eq!(restored, claim);
    assert_eq!(refcount(&pool, content).await, 1);

    let entry = user_files.get(claim).await.expect("get").expect("row");
    assert!(entry.is_active(), "restored claim must be active");
}

#[tokio::test]
async fn test_claim_state_transitions() {
    let pool = test_pool().await;
    let principal = create_test_principal(&pool, "claim-state").await;
    let content = create_test_content(&pool, 256).await;
    let user_files = PgUserFileRepository::new(pool.clone());

    let mut tx = pool.begin().await.expect("begin");
    let state = user_files
        .claim_state_tx(&mut tx, principal, content)
        .await
        .expect("state");
    tx.commit().await.expect("commit");
    assert_eq!(state, ClaimState::None);

    claim_content(&pool, principal, content).await;
    let mut tx = pool.begin().await.expect("begin");
    let state = user_files
        .claim_state_tx(&mut tx, principal, content)
        .await
        .expect("state");
    tx.commit().await.expect("commit");
    assert_eq!(state, ClaimState::Active);

    user_files
        .soft_delete_newest(principal, content)
        .await
        .expect("soft delete");
    let mut tx = pool.begin().await.expect("begin");
    let state = user_files
        .claim_state_tx(&mut tx, principal, content)
        .await
        .expect("state");
    tx.commit().await.expect("commit");
    assert_eq!(state, ClaimState::Deleted);
}

#[tokio::test]
async fn test_soft_delete_keeps_refcount() {
    let pool = test_pool().await;
    let principal = create_test_principal(&pool, "softdel").await;
    let content = create_test_content(&pool, 4096).await;
    let user_files = PgUserFileRepository::new(pool.clone());

    claim_content(&pool, principal, content).await;
    user_files
        .soft_delete_newest(principal, content)
        .await
        .expect("soft delete")
        .expect("claim existed");

    // The trash still pins the reference.
    assert_eq!(refcount(&pool, content).await, 1);
    assert_eq!(
        user_files.logical_usage(principal).await.expect("usage"),
        0,
        "trashed bytes leave logical usage"
    );
}

#[tokio::test]
async fn test_recover_keeps_refcount_and_restores_usage() {
    let pool = test_pool().await;
    let principal = create_test_principal(&pool, "recover").await;
    let content = create_test_content(&pool, 4096).await;
    let user_files = PgUserFileRepository::new(pool.clone());

    claim_content(&pool, principal, content).await;
    user_files
        .soft_delete_newest(principal, content)
        .await
        .expect("soft delete");
    user_files
        .recover_newest(principal, content)
        .await
        .expect("recover")
        .expect("trashed claim existed");

    assert_eq!(refcount(&pool, content).await, 1);
    assert_eq!(
        user_files.logical_usage(principal).await.expect("usage"),
        4096
    );
}

#[tokio::test]
async fn test_hard_delete_of_last_active_claim_decrements() {
    let pool = test_pool().await;
    let principal = create_test_principal(&pool, "harddel").await;
    let content = create_test_content(&pool, 128).await;
    let contents = PgContentRepository::new(pool.clone());
    let user_files = PgUserFileRepository::new(pool.clone());

    claim_content(&pool, principal, content).await;

    let mut tx = pool.begin().await.expect("begin");
    contents
        .lock_tx(&mut tx, content)
        .await
        .expect("lock")
        .expect("row");
    let removed = user_files
        .delete_newest_tx(&mut tx, principal, content)
        .await
        .expect("delete")
        .expect("claim existed");
    assert_eq!(removed.content_id, content);
    let remaining = user_files
        .active_count_tx(&mut tx, principal, content)
        .await
        .expect("count");
    assert_eq!(remaining, 0);
    contents
        .decrement_ref_tx(&mut tx, content)
        .await
        .expect("decrement");
    tx.commit().await.expect("commit");

    assert_eq!(refcount(&pool, content).await, 0);
}

#[tokio::test]
async fn test_duplicate_claims_share_one_reference() {
    let pool = test_pool().await;
    let principal = create_test_principal(&pool, "duplicate").await;
    let content = create_test_content(&pool, 64).await;
    let user_files = PgUserFileRepository::new(pool.clone());

    claim_content(&pool, principal, content).await;

    // Explicit duplicate copy: a second row, same reference.
    let mut tx = pool.begin().await.expect("begin");
    let dup = user_files
        .insert_tx(&mut tx, principal, content, FileRole::Owner, None)
        .await
        .expect("insert duplicate");
    tx.commit().await.expect("commit");

    assert_eq!(refcount(&pool, content).await, 1);

    // Logical usage counts distinct contents once; attributed counts each
    // claim's share.
    assert_eq!(
        user_files.logical_usage(principal).await.expect("usage"),
        64
    );
    assert_eq!(
        user_files
            .attributed_usage(principal)
            .await
            .expect("attributed"),
        128
    );

    let active = user_files.list_active(principal).await.expect("list");
    assert!(active.iter().any(|e| e.id == dup));
    assert_eq!(active.len(), 2);
}

#[tokio::test]
async fn test_newest_selection_prefers_latest_upload() {
    let pool = test_pool().await;
    let principal = create_test_principal(&pool, "newest").await;
    let content = create_test_content(&pool, 32).await;
    let user_files = PgUserFileRepository::new(pool.clone());

    claim_content(&pool, principal, content).await;
    let mut tx = pool.begin().await.expect("begin");
    let second = user_files
        .insert_tx(&mut tx, principal, content, FileRole::Owner, None)
        .await
        .expect("insert");
    tx.commit().await.expect("commit");

    // Soft-delete picks the newest active claim: the second row.
    let trashed = user_files
        .soft_delete_newest(principal, content)
        .await
        .expect("soft delete")
        .expect("claim existed");
    assert_eq!(trashed, second);
}
