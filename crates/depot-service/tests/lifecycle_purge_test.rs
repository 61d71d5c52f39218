//! Lifecycle tests: trash, restore, purge, and the blob/row destroy when
//! the last reference disappears.

mod common;

use common::{auth, payload, test_depot};
use depot_core::{Error, UploadRequest};
use depot_store::ObjectStore;

fn req(filename: &str) -> UploadRequest {
    UploadRequest {
        filename: filename.to_string(),
        declared_mime: None,
        folder_id: None,
        allow_duplicate: false,
    }
}

#[tokio::test]
async fn test_full_lifecycle_upload_trash_restore_purge() {
    let (depot, store, pool) = test_depot().await;
    let a = auth(&pool, "lifecycle").await;

    let bytes = payload("lifecycle", 4096);
    let outcome = depot
        .uploads
        .upload_bytes(&a, req("cycle.bin"), &bytes)
        .await
        .expect("upload");
    let content_id = outcome.content.id;
    let locator = outcome.content.blob_locator.clone();

    // Trash: refcount holds, logical usage drops.
    depot.lifecycle.soft_delete(&a, content_id).await.expect("trash");
    let content = depot.contents.get(content_id).await.unwrap().unwrap();
    assert_eq!(content.ref_count, 1);
    assert_eq!(depot.quota.usage(&a).await.unwrap().used_bytes, 0);
    assert_eq!(depot.user_files.list_trashed(a.id).await.unwrap().len(), 1);

    // Restore: usage returns, refcount still untouched.
    depot.lifecycle.recover(&a, content_id).await.expect("restore");
    let content = depot.contents.get(content_id).await.unwrap().unwrap();
    assert_eq!(content.ref_count, 1);
    assert_eq!(depot.quota.usage(&a).await.unwrap().used_bytes, 4096);

    // Purge: row and blob are gone.
    depot.lifecycle.purge(&a, content_id).await.expect("purge");
    assert!(depot.contents.get(content_id).await.unwrap().is_none());
    assert!(!store.exists(&locator).await.unwrap());
    assert!(depot.user_files.list_active(a.id).await.unwrap().is_empty());
    assert!(depot.user_files.list_trashed(a.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_purge_of_trashed_claim_also_destroys() {
    let (depot, store, pool) = test_depot().await;
    let a = auth(&pool, "purge-trash").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req("trashed.bin"), &payload("purge-trash", 512))
        .await
        .expect("upload");

    depot
        .lifecycle
        .soft_delete(&a, outcome.content.id)
        .await
        .expect("trash");
    depot
        .lifecycle
        .purge(&a, outcome.content.id)
        .await
        .expect("purge from trash");

    assert!(depot.contents.get(outcome.content.id).await.unwrap().is_none());
    assert!(!store.exists(&outcome.content.blob_locator).await.unwrap());
}

#[tokio::test]
async fn test_purge_spares_blob_while_other_references_remain() {
    let (depot, store, pool) = test_depot().await;
    let a = auth(&pool, "purge-shared-a").await;
    let b = auth(&pool, "purge-shared-b").await;

    let bytes = payload("purge-shared", 2048);
    let a_outcome = depot
        .uploads
        .upload_bytes(&a, req("a.bin"), &bytes)
        .await
        .expect("a uploads");
    depot
        .uploads
        .upload_bytes(&b, req("b.bin"), &bytes)
        .await
        .expect("b adopts");

    depot
        .lifecycle
        .purge(&a, a_outcome.content.id)
        .await
        .expect("a purges");

    // B's reference keeps everything alive.
    let content = depot
        .contents
        .get(a_outcome.content.id)
        .await
        .unwrap()
        .expect("content survives");
    assert_eq!(content.ref_count, 1);
    assert!(store.exists(&content.blob_locator).await.unwrap());

    // B purging too destroys it.
    depot
        .lifecycle
        .purge(&b, content.id)
        .await
        .expect("b purges");
    assert!(depot.contents.get(content.id).await.unwrap().is_none());
    assert!(!store.exists(&content.blob_locator).await.unwrap());
}

#[tokio::test]
async fn test_purge_by_id_targets_one_of_several_claims() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "purge-by-id").await;

    let bytes = payload("purge-by-id", 256);
    let first = depot
        .uploads
        .upload_bytes(&a, req("one.bin"), &bytes)
        .await
        .expect("first");

    let mut dup = req("two.bin");
    dup.allow_duplicate = true;
    let second = depot
        .uploads
        .upload_bytes(&a, dup, &bytes)
        .await
        .expect("duplicate");

    depot
        .lifecycle
        .purge_by_id(&a, second.user_file.id)
        .await
        .expect("purge the duplicate");

    // The original claim still pins the content.
    let content = depot
        .contents
        .get(first.content.id)
        .await
        .unwrap()
        .expect("content survives");
    assert_eq!(content.ref_count, 1);
    assert_eq!(depot.user_files.list_active(a.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_recover_without_trash_is_not_found() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "recover-none").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req("active.bin"), &payload("recover-none", 128))
        .await
        .expect("upload");

    let err = depot
        .lifecycle
        .recover(&a, outcome.content.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_soft_delete_twice_is_not_found() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "trash-twice").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req("once.bin"), &payload("trash-twice", 128))
        .await
        .expect("upload");

    depot
        .lifecycle
        .soft_delete(&a, outcome.content.id)
        .await
        .expect("first trash");
    let err = depot
        .lifecycle
        .soft_delete(&a, outcome.content.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_foreign_principal_cannot_purge() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "owner").await;
    let stranger = auth(&pool, "stranger").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req("mine.bin"), &payload("foreign-purge", 128))
        .await
        .expect("upload");

    // The stranger holds no claim, so there is nothing to purge.
    let err = depot
        .lifecycle
        .purge(&stranger, outcome.content.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // A's claim is intact.
    assert_eq!(depot.user_files.list_active(a.id).await.unwrap().len(), 1);
}
