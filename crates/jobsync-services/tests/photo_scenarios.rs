mod common;

use common::*;
use jobsync_core::models::UploadKind;
use jobsync_core::SyncError;
use jobsync_db::{DocumentPatch, DocumentStore};
use jobsync_services::NotificationLevel;
use std::collections::HashSet;
use std::time::Duration;

const TEN_MB: usize = 10 * 1024 * 1024;

#[tokio::test(start_paused = true)]
async fn oversized_file_is_rejected_and_the_rest_upload() {
    let f = fixture().await;
    let session_id = f.open_session("Installation").await;
    f.notifier.take();

    let report = f
        .engine
        .select_photos(
            vec![
                jpeg("panel.jpg", 2048),
                jpeg("huge.jpg", TEN_MB + 1),
                jpeg("meter.jpg", 4096),
            ],
            UploadKind::After,
        )
        .unwrap();
    assert_eq!(report.accepted.len(), 2);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(f.engine.photos().pending(UploadKind::After).len(), 2);
    assert_eq!(
        f.notifier.take()[0].message,
        "huge.jpg is too large. Max 10MB."
    );
    assert_eq!(f.engine.context().previews.live_count(), 2);

    let summary = f.engine.upload_photos(UploadKind::After).await.unwrap();
    assert_eq!(summary.uploaded.len(), 2);
    assert!(summary.failed.is_empty());
    assert!(f.engine.photos().pending(UploadKind::After).is_empty());
    assert_eq!(f.engine.context().previews.live_count(), 0);
    assert_eq!(f.notifier.messages(), vec!["Uploaded 2 photos!"]);

    let active = f
        .engine
        .sessions()
        .watch()
        .wait_for(|s| s.active.as_ref().is_some_and(|a| a.photos.after.len() == 2))
        .await
        .unwrap()
        .clone();
    assert_eq!(active.active.unwrap().photos.total(), 2);

    let doc = f.store.get(&session_id).unwrap();
    let photos = doc.data["photos"].as_array().unwrap();
    assert_eq!(photos.len(), 2);
    assert!(photos.iter().all(|p| p["kind"] == "after"));
    assert!(f
        .blobs
        .keys()
        .iter()
        .all(|k| k.starts_with(&format!("job-photos/{}/after/", session_id))));
    f.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_files_are_skipped_and_every_success_is_recorded_once() {
    let f = fixture().await;
    let session_id = f.open_session("Service Call").await;
    f.notifier.take();
    f.blobs.fail_uploads_named("blurry.jpg");

    f.engine
        .select_photos(
            vec![
                jpeg("same.jpg", 100),
                jpeg("blurry.jpg", 100),
                jpeg("same.jpg", 100),
                jpeg("wide.jpg", 100),
            ],
            UploadKind::Before,
        )
        .unwrap();
    let summary = f.engine.upload_photos(UploadKind::Before).await.unwrap();

    assert_eq!(summary.uploaded.len(), 3);
    assert_eq!(summary.failed, vec!["blurry.jpg"]);
    assert!(f.engine.photos().pending(UploadKind::Before).is_empty());
    assert_eq!(
        f.notifier.messages(),
        vec!["Upload failed for blurry.jpg.", "Uploaded 3 photos!"]
    );

    let doc = f.store.get(&session_id).unwrap();
    let photos = doc.data["photos"].as_array().unwrap();
    let urls: HashSet<&str> = photos.iter().map(|p| p["url"].as_str().unwrap()).collect();
    assert_eq!(photos.len(), 3);
    assert_eq!(urls.len(), 3);
    assert!(photos.iter().all(|p| p["kind"] == "before"));
    f.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn progress_is_monotonic_and_uploads_run_one_at_a_time() {
    let f = fixture().await;
    f.open_session("Service Call").await;
    f.blobs.set_step_delay(Some(Duration::from_millis(50)));
    f.engine
        .select_photos(
            vec![jpeg("a.jpg", 100), jpeg("b.jpg", 100)],
            UploadKind::After,
        )
        .unwrap();

    let mut progress = f.engine.photos().watch_progress();
    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while progress.changed().await.is_ok() {
            let p = progress.borrow_and_update().clone();
            if p.total == 0 {
                break;
            }
            seen.push(p.fraction);
        }
        seen
    });

    let (first, second) = tokio::join!(
        f.engine.upload_photos(UploadKind::After),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            f.engine.upload_photos(UploadKind::After).await
        }
    );
    assert_eq!(first.unwrap().uploaded.len(), 2);
    assert!(matches!(second, Err(SyncError::UploadInFlight)));

    let seen = watcher.await.unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert!(seen.iter().all(|x| (0.0..=1.0).contains(x)));
    f.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn selection_needs_an_active_session() {
    let f = fixture().await;
    let err = f
        .engine
        .select_photos(vec![jpeg("a.jpg", 10)], UploadKind::Before)
        .unwrap_err();
    assert!(matches!(err, SyncError::NoActiveSession));
    assert_eq!(f.engine.context().previews.live_count(), 0);
    f.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn non_images_are_rejected_per_file() {
    let f = fixture().await;
    f.open_session("Service Call").await;
    f.notifier.take();

    let pdf = jobsync_services::PhotoFile::new(
        "invoice.pdf",
        "application/pdf",
        bytes::Bytes::from_static(b"%PDF"),
    );
    let report = f
        .engine
        .select_photos(vec![pdf, jpeg("ok.jpg", 10)], UploadKind::Before)
        .unwrap();
    assert_eq!(report.accepted.len(), 1);
    assert_eq!(
        f.notifier.messages(),
        vec!["invoice.pdf is an invalid file type. Images only."]
    );
    assert_eq!(f.notifier.count(NotificationLevel::Error), 1);
    f.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn ending_the_session_discards_pending_photos() {
    let f = fixture().await;
    f.open_session("Service Call").await;
    f.engine
        .select_photos(vec![jpeg("a.jpg", 10), jpeg("b.jpg", 10)], UploadKind::Before)
        .unwrap();
    assert_eq!(f.engine.context().previews.live_count(), 2);

    f.engine.clock_out().await.unwrap();
    f.engine.clock().settled().await;
    assert!(f.engine.photos().pending(UploadKind::Before).is_empty());
    assert_eq!(f.engine.context().previews.live_count(), 0);

    let err = f.engine.upload_photos(UploadKind::Before).await.unwrap_err();
    assert!(matches!(err, SyncError::NoActiveSession));
    f.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unusable_session_id_fails_each_file_with_a_toast() {
    let f = fixture().await;
    f.store.insert_raw(
        "site/7",
        serde_json::json!({
            "userId": USER,
            "status": "in_progress",
            "startTime": "2024-05-01T08:00:00Z",
        }),
    );
    f.engine
        .sessions()
        .watch()
        .wait_for(|s| s.active_id() == Some("site/7"))
        .await
        .unwrap();

    f.engine
        .select_photos(vec![jpeg("gate.jpg", 10)], UploadKind::Before)
        .unwrap();
    let summary = f.engine.upload_photos(UploadKind::Before).await.unwrap();

    assert_eq!(summary.failed, vec!["gate.jpg"]);
    assert!(f.blobs.keys().is_empty());
    assert_eq!(f.notifier.messages(), vec!["Upload failed for gate.jpg."]);
    f.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn photo_finishing_after_clock_out_is_not_recorded() {
    let f = fixture().await;
    let session_id = f.open_session("Service Call").await;
    f.notifier.take();
    f.blobs.set_step_delay(Some(Duration::from_millis(100)));
    f.engine
        .select_photos(vec![jpeg("late.jpg", 10)], UploadKind::After)
        .unwrap();

    let (summary, ()) = tokio::join!(f.engine.upload_photos(UploadKind::After), async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        f.store
            .update(
                &session_id,
                DocumentPatch::new().set("status", serde_json::json!("completed")),
            )
            .await
            .unwrap();
    });

    let summary = summary.unwrap();
    assert!(summary.uploaded.is_empty());
    assert_eq!(summary.failed, vec!["late.jpg"]);
    assert_eq!(f.blobs.keys().len(), 1);
    let doc = f.store.get(&session_id).unwrap();
    assert_eq!(doc.data["photos"].as_array().map_or(0, Vec::len), 0);
    assert_eq!(f.notifier.messages(), vec!["Failed to save link for late.jpg."]);
    f.engine.shutdown().await;
}
