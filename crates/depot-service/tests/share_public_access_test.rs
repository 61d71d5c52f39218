//! Sharing and public-link access tests: inherited folder shares, the
//! anonymous token path, expiry and revocation.

mod common;

use chrono::{Duration, Utc};
use common::{auth, payload, test_depot, MIB};
use depot_core::{AccessRole, Error, FileRole, RequestContext, ShareRequest, UploadRequest};
use depot_service::{ResolvedSubject, Subject};

fn req_in(filename: &str, folder: Option<uuid::Uuid>) -> UploadRequest {
    UploadRequest {
        filename: filename.to_string(),
        declared_mime: None,
        folder_id: folder,
        allow_duplicate: false,
    }
}

fn to(emails: &[&str]) -> ShareRequest {
    ShareRequest {
        emails: emails.iter().map(|e| e.to_string()).collect(),
        expires_at: None,
    }
}

#[tokio::test]
async fn test_folder_share_reaches_files_and_descendants() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "inherit-owner").await;
    let b = auth(&pool, "inherit-reader").await;

    let top = depot.folders.create(&a, "top", None).await.expect("top");
    let nested = depot
        .folders
        .create(&a, "nested", Some(top.id))
        .await
        .expect("nested");

    let direct = depot
        .uploads
        .upload_bytes(&a, req_in("direct.bin", Some(top.id)), &payload("inherit-1", 128))
        .await
        .expect("upload direct");
    let deep = depot
        .uploads
        .upload_bytes(&a, req_in("deep.bin", Some(nested.id)), &payload("inherit-2", 128))
        .await
        .expect("upload deep");

    depot
        .sharing
        .share_folder(&a, top.id, to(&[&b.email]))
        .await
        .expect("share folder");

    // B reads the folder, the file in it, and the file below it.
    for subject in [
        Subject::Folder(top.id),
        Subject::File(direct.content.id),
        Subject::File(deep.content.id),
    ] {
        let role = depot
            .permissions
            .resolve(b.id, &b.email, subject)
            .await
            .expect("resolve");
        assert_eq!(role, Some(AccessRole::Viewer));
    }

    // The owner stays owner after sharing.
    let role = depot
        .permissions
        .resolve(a.id, &a.email, Subject::File(direct.content.id))
        .await
        .expect("resolve");
    assert_eq!(role, Some(AccessRole::Owner));

    // A stranger sees nothing.
    let stranger = auth(&pool, "inherit-stranger").await;
    let role = depot
        .permissions
        .resolve(stranger.id, &stranger.email, Subject::File(direct.content.id))
        .await
        .expect("resolve");
    assert_eq!(role, None);
}

#[tokio::test]
async fn test_share_recipient_download_lands_in_ledger() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "ledger-owner").await;
    let b = auth(&pool, "ledger-reader").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req_in("shared.bin", None), &payload("ledger", 128))
        .await
        .expect("upload");

    depot
        .sharing
        .share_file(&a, outcome.content.id, to(&[&b.email]))
        .await
        .expect("share");

    let url = depot
        .downloads
        .presign(
            &b,
            outcome.content.id,
            false,
            &RequestContext {
                ip: Some("203.0.113.7".to_string()),
                user_agent: Some("test-agent".to_string()),
            },
        )
        .await
        .expect("presign");
    assert!(url.contains("attachment"));
    assert!(url.contains("shared.bin"));
}

#[tokio::test]
async fn test_self_share_refused() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "self-share").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req_in("own.bin", None), &payload("self-share", 64))
        .await
        .expect("upload");

    let err = depot
        .sharing
        .share_file(&a, outcome.content.id, to(&[&a.email.to_uppercase()]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn test_only_owner_can_share() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "share-owner").await;
    let b = auth(&pool, "share-not-owner").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req_in("locked.bin", None), &payload("only-owner", 64))
        .await
        .expect("upload");

    let err = depot
        .sharing
        .share_file(&b, outcome.content.id, to(&["x@example.com"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_public_file_link_lifecycle() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "link-cycle").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req_in("public.bin", None), &payload("link-cycle", 64))
        .await
        .expect("upload");

    let link = depot
        .links
        .create_file_link(&a, outcome.content.id, Some(Utc::now() + Duration::hours(1)))
        .await
        .expect("mint");

    // Anonymous resolve within the hour.
    let resolved = depot.links.resolve(&link.token).await.expect("resolve");
    match resolved.subject {
        ResolvedSubject::File(content) => assert_eq!(content.id, outcome.content.id),
        ResolvedSubject::Folder(_) => panic!("expected a file subject"),
    }

    // After revocation the same token is dead.
    depot
        .links
        .revoke_file_link(&a, outcome.content.id)
        .await
        .expect("revoke");
    let err = depot.links.resolve(&link.token).await.unwrap_err();
    assert!(matches!(err, Error::RevokedOrExpired(_)));

    // Revoking again finds nothing active.
    let err = depot
        .links
        .revoke_file_link(&a, outcome.content.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_expired_link_is_dead() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "link-expired").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req_in("stale.bin", None), &payload("link-expired", 64))
        .await
        .expect("upload");

    let link = depot
        .links
        .create_file_link(&a, outcome.content.id, Some(Utc::now() - Duration::seconds(1)))
        .await
        .expect("mint expired");

    let err = depot.links.resolve(&link.token).await.unwrap_err();
    assert!(matches!(err, Error::RevokedOrExpired(_)));
}

#[tokio::test]
async fn test_anonymous_download_through_file_link() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "anon-file").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req_in("grab.bin", None), &payload("anon-file", 64))
        .await
        .expect("upload");
    let link = depot
        .links
        .create_file_link(&a, outcome.content.id, None)
        .await
        .expect("mint");

    let url = depot
        .downloads
        .presign_public(&link.token, None, false, &RequestContext::default())
        .await
        .expect("anonymous presign");
    assert!(url.contains("grab.bin"));

    // The traversal counter moved.
    let resolved = depot.links.resolve(&link.token).await.expect("resolve");
    assert_eq!(resolved.link.access_count, 1);
}

#[tokio::test]
async fn test_folder_link_covers_subtree_only() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "anon-folder").await;

    let folder = depot.folders.create(&a, "open", None).await.expect("folder");
    let inside = depot
        .uploads
        .upload_bytes(&a, req_in("in.bin", Some(folder.id)), &payload("anon-in", 64))
        .await
        .expect("upload inside");
    let outside = depot
        .uploads
        .upload_bytes(&a, req_in("out.bin", None), &payload("anon-out", 64))
        .await
        .expect("upload outside");

    let link = depot
        .links
        .create_folder_link(&a, folder.id, None)
        .await
        .expect("mint");

    depot
        .downloads
        .presign_public(
            &link.token,
            Some(inside.content.id),
            false,
            &RequestContext::default(),
        )
        .await
        .expect("covered file downloads");

    let err = depot
        .downloads
        .presign_public(
            &link.token,
            Some(outside.content.id),
            false,
            &RequestContext::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
}

#[tokio::test]
async fn test_save_from_link_grants_a_viewer_claim() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "save-owner").await;
    let b = auth(&pool, "save-reader").await;

    let bytes = payload("save-link", 2048);
    let outcome = depot
        .uploads
        .upload_bytes(&a, req_in("saved.bin", None), &bytes)
        .await
        .expect("upload");
    let link = depot
        .links
        .create_file_link(&a, outcome.content.id, None)
        .await
        .expect("mint");

    let saved = depot
        .uploads
        .save_from_link(&b, &link.token, None)
        .await
        .expect("save");
    assert!(saved.deduplicated, "no bytes move on a save");
    assert_eq!(saved.user_file.role, FileRole::Viewer);
    assert_eq!(saved.content.id, outcome.content.id);

    // B now holds a live reference and pays for it.
    let content = depot.contents.get(outcome.content.id).await.unwrap().unwrap();
    assert_eq!(content.ref_count, 2);
    assert_eq!(depot.quota.usage(&b).await.unwrap().used_bytes, 2048);
    assert_eq!(depot.user_files.list_active(b.id).await.unwrap().len(), 1);

    // The viewer claim reads, and the owner stays owner.
    let role = depot
        .permissions
        .resolve(b.id, &b.email, Subject::File(outcome.content.id))
        .await
        .expect("resolve");
    assert_eq!(role, Some(AccessRole::Viewer));
    let role = depot
        .permissions
        .resolve(a.id, &a.email, Subject::File(outcome.content.id))
        .await
        .expect("resolve");
    assert_eq!(role, Some(AccessRole::Owner));

    // Reading is as far as it goes: a viewer claim cannot manage shares.
    let err = depot
        .sharing
        .share_file(&b, outcome.content.id, to(&["x@example.com"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    // Saving counts as a traversal.
    let resolved = depot.links.resolve(&link.token).await.expect("resolve");
    assert_eq!(resolved.link.access_count, 1);
}

#[tokio::test]
async fn test_save_from_link_is_idempotent() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "save-idem-owner").await;
    let b = auth(&pool, "save-idem-reader").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req_in("again.bin", None), &payload("save-idem", 256))
        .await
        .expect("upload");
    let link = depot
        .links
        .create_file_link(&a, outcome.content.id, None)
        .await
        .expect("mint");

    let first = depot
        .uploads
        .save_from_link(&b, &link.token, None)
        .await
        .expect("first save");
    let second = depot
        .uploads
        .save_from_link(&b, &link.token, None)
        .await
        .expect("second save");

    assert_eq!(first.user_file.id, second.user_file.id, "one claim");
    let content = depot.contents.get(outcome.content.id).await.unwrap().unwrap();
    assert_eq!(content.ref_count, 2, "one increment for B");
}

#[tokio::test]
async fn test_save_from_link_respects_quota() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "save-quota-owner").await;
    let b = auth(&pool, "save-quota-reader").await;

    // B has no headroom left.
    depot
        .uploads
        .upload_bytes(&b, req_in("full.bin", None), &payload("save-quota-fill", 20 * MIB))
        .await
        .expect("b fills their budget");

    let outcome = depot
        .uploads
        .upload_bytes(&a, req_in("tiny.bin", None), &payload("save-quota-tiny", 1))
        .await
        .expect("a uploads");
    let link = depot
        .links
        .create_file_link(&a, outcome.content.id, None)
        .await
        .expect("mint");

    let err = depot
        .uploads
        .save_from_link(&b, &link.token, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QuotaExceeded(_)));
}

#[tokio::test]
async fn test_save_from_folder_link_rejected() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "save-folder-owner").await;
    let b = auth(&pool, "save-folder-reader").await;

    let folder = depot.folders.create(&a, "linked", None).await.expect("folder");
    let link = depot
        .links
        .create_folder_link(&a, folder.id, None)
        .await
        .expect("mint");

    let err = depot
        .uploads
        .save_from_link(&b, &link.token, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn test_link_creation_requires_ownership() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "link-own-a").await;
    let b = auth(&pool, "link-own-b").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req_in("mine.bin", None), &payload("link-own", 64))
        .await
        .expect("upload");

    let err = depot
        .links
        .create_file_link(&b, outcome.content.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_share_never_removes_existing_access() {
    let (depot, _store, pool) = test_depot().await;
    let a = auth(&pool, "monotone-owner").await;
    let b = auth(&pool, "monotone-b").await;
    let c = auth(&pool, "monotone-c").await;

    let outcome = depot
        .uploads
        .upload_bytes(&a, req_in("mono.bin", None), &payload("monotone", 64))
        .await
        .expect("upload");

    depot
        .sharing
        .share_file(&a, outcome.content.id, to(&[&b.email]))
        .await
        .expect("share b");
    depot
        .sharing
        .share_file(&a, outcome.content.id, to(&[&c.email]))
        .await
        .expect("share c");

    // Adding C left B's grant intact.
    for reader in [&b, &c] {
        let role = depot
            .permissions
            .resolve(reader.id, &reader.email, Subject::File(outcome.content.id))
            .await
            .expect("resolve");
        assert_eq!(role, Some(AccessRole::Viewer));
    }
}
