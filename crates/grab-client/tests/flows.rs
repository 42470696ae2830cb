//! Full download flows: driver + real runners + mock backend.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use grab_client::controller::Timings;
use futures_util::stream::{self, StreamExt};
use grab_client::deliver::{ArtifactSink, DirSink};
use grab_client::quota::HttpQuota;
use grab_client::{
    Controller, DirectRunner, DriverUpdate, JobRunner, Notice, PollingRunner, ProgressDriver,
    ProgressView,
};
use grab_proto::media::{AudioFormat, DownloadJob, JobKind, Quality, TrackInfo};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use common::{collect_until, fast_timings, is_hidden, serve};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone, Default)]
struct Backend {
    polls: Arc<AtomicU32>,
    starts: Arc<AtomicU32>,
}

fn video_job() -> DownloadJob {
    DownloadJob {
        id: "video-1".into(),
        source_url: "https://www.youtube.com/watch?v=abc".into(),
        kind: JobKind::Video,
        format: None,
        quality: Some(Quality::Best),
        track: None,
    }
}

fn music_job() -> DownloadJob {
    DownloadJob {
        id: "music-1".into(),
        source_url: "https://open.spotify.com/track/xyz".into(),
        kind: JobKind::Music,
        format: Some(AudioFormat::Mp3),
        quality: None,
        track: Some(TrackInfo {
            title: "A/B: Song?".into(),
            artist: "X*Y".into(),
            duration_ms: 125000,
        }),
    }
}

fn with_quota(router: Router<Backend>) -> Router<Backend> {
    router.route(
        "/downloads_remaining",
        get(|| async { Json(json!({ "remaining": 12 })) }),
    )
}

struct Rig {
    _dir: TempDir,
    dir: std::path::PathBuf,
    handle: grab_client::ProgressHandle,
    updates: tokio::sync::mpsc::Receiver<DriverUpdate>,
}

fn rig(base: &str, runner: Arc<dyn JobRunner>, timings: Timings) -> Rig {
    let dir = TempDir::new().unwrap();
    let client = Client::new();
    let (handle, updates, _task) = ProgressDriver::spawn(
        Controller::new(timings, Some(11)),
        runner,
        Arc::new(DirSink::new(client.clone(), base, dir.path().to_path_buf())),
        Arc::new(HttpQuota::new(client, base)),
    );
    Rig {
        dir: dir.path().to_path_buf(),
        _dir: dir,
        handle,
        updates,
    }
}

fn views(updates: &[DriverUpdate]) -> Vec<&ProgressView> {
    updates
        .iter()
        .filter_map(|u| match u {
            DriverUpdate::Progress(v) if v.visible => Some(v),
            _ => None,
        })
        .collect()
}

fn saved_path(updates: &[DriverUpdate]) -> Option<std::path::PathBuf> {
    updates.iter().find_map(|u| match u {
        DriverUpdate::Notice(Notice::Saved(p)) => Some(p.clone()),
        _ => None,
    })
}

#[tokio::test]
async fn test_polling_flow_delivers_task_file() {
    let app = with_quota(
        Router::new()
            .route(
                "/download_start",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["type"], "video");
                    assert_eq!(body["quality"], "best");
                    Json(json!({ "task_id": "t1" }))
                }),
            )
            .route(
                "/download_progress/:id",
                get(|State(b): State<Backend>, Path(id): Path<String>| async move {
                    assert_eq!(id, "t1");
                    match b.polls.fetch_add(1, Ordering::SeqCst) {
                        0 => Json(json!({ "status": "downloading", "progress": 30, "message": "Downloading…" })),
                        1 => Json(json!({ "status": "merging", "progress": 80, "message": "Merging…" })),
                        _ => Json(json!({ "status": "done", "progress": 100 })),
                    }
                }),
            )
            .route(
                "/download_file/:id",
                get(|| async {
                    (
                        [(CONTENT_DISPOSITION, "attachment; filename=\"My: Clip.mp4\"")],
                        b"video-bytes".to_vec(),
                    )
                }),
            ),
    )
    .with_state(Backend::default());
    let base = serve(app).await;
    let client = Client::new();
    let mut rig = rig(&base, Arc::new(PollingRunner::new(client, base.clone())), fast_timings());

    rig.handle.start(video_job()).await.unwrap();
    let updates = collect_until(&mut rig.updates, WAIT, is_hidden).await;

    let percents: Vec<u8> = views(&updates).iter().map(|v| v.percent).collect();
    assert_eq!(percents, vec![0, 30, 80, 100]);
    assert_eq!(views(&updates).last().unwrap().message, "Ready!");

    let path = saved_path(&updates).expect("file saved");
    assert_eq!(path, rig.dir.join("My Clip.mp4"));
    assert_eq!(std::fs::read(&path).unwrap(), b"video-bytes");
    assert!(updates.contains(&DriverUpdate::Quota(12)));
    assert!(is_hidden(updates.last().unwrap()));
}

#[tokio::test]
async fn test_polled_error_without_message() {
    let app = Router::new()
        .route(
            "/download_start",
            post(|| async { Json(json!({ "task_id": "t9" })) }),
        )
        .route(
            "/download_progress/:id",
            get(|| async { Json(json!({ "status": "error", "progress": 10 })) }),
        );
    let base = serve(app).await;
    let mut rig = rig(
        &base,
        Arc::new(PollingRunner::new(Client::new(), base.clone())),
        fast_timings(),
    );

    rig.handle.start(video_job()).await.unwrap();
    let updates = collect_until(&mut rig.updates, WAIT, is_hidden).await;

    let last = views(&updates).last().cloned().cloned().unwrap();
    assert!(last.is_error);
    assert_eq!(last.message, "Download failed.");
    assert!(saved_path(&updates).is_none());
}

#[tokio::test]
async fn test_start_error_text_is_shown() {
    let app = Router::new().route(
        "/download_start",
        post(|| async { Json(json!({ "error": "Daily limit reached" })) }),
    );
    let base = serve(app).await;
    let mut rig = rig(
        &base,
        Arc::new(PollingRunner::new(Client::new(), base.clone())),
        fast_timings(),
    );

    rig.handle.start(video_job()).await.unwrap();
    let updates = collect_until(&mut rig.updates, WAIT, is_hidden).await;

    let last = views(&updates).last().cloned().cloned().unwrap();
    assert!(last.is_error);
    assert_eq!(last.message, "Daily limit reached");
}

#[tokio::test]
async fn test_unreachable_poll_endpoint_escalates() {
    let app = Router::new()
        .route(
            "/download_start",
            post(|| async { Json(json!({ "task_id": "t2" })) }),
        )
        .route(
            "/download_progress/:id",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
    let base = serve(app).await;
    let timings = Timings {
        max_poll_failures: 3,
        ..fast_timings()
    };
    let mut rig = rig(
        &base,
        Arc::new(PollingRunner::new(Client::new(), base.clone())),
        timings,
    );

    rig.handle.start(video_job()).await.unwrap();
    let updates = collect_until(&mut rig.updates, WAIT, is_hidden).await;

    let last = views(&updates).last().cloned().cloned().unwrap();
    assert_eq!(last.message, "Lost contact with the download server.");
}

#[tokio::test]
async fn test_direct_flow_saves_sanitized_track() {
    let app = with_quota(Router::new().route(
        "/api/download",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["trackName"], "A/B: Song?");
            assert_eq!(body["artistName"], "X*Y");
            assert_eq!(body["durationMs"], 125000);
            assert_eq!(body["format"], "mp3");
            tokio::time::sleep(Duration::from_millis(80)).await;
            b"mp3-bytes".to_vec()
        }),
    ))
    .with_state(Backend::default());
    let base = serve(app).await;
    let runner = DirectRunner::new(PollingRunner::new(Client::new(), base.clone()));
    let mut rig = rig(&base, Arc::new(runner), fast_timings());

    rig.handle.start(music_job()).await.unwrap();
    let updates = collect_until(&mut rig.updates, WAIT, is_hidden).await;

    let percents: Vec<u8> = views(&updates).iter().map(|v| v.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);
    let before_fetch: Vec<u8> = percents.iter().copied().filter(|p| *p < 95).collect();
    assert!(before_fetch.iter().all(|p| *p <= 92));
    assert!(before_fetch.len() > 1, "simulation never ticked");
    assert!(percents.ends_with(&[95, 98, 100]), "{:?}", percents);

    let path = saved_path(&updates).expect("track saved");
    assert_eq!(path, rig.dir.join("AB Song - XY.mp3"));
    assert_eq!(std::fs::read(&path).unwrap(), b"mp3-bytes");
    assert!(updates.contains(&DriverUpdate::Quota(12)));
}

#[tokio::test]
async fn test_direct_fetch_error_shows_upstream_text() {
    let app = Router::new().route(
        "/api/download",
        post(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Track not found" })),
            )
        }),
    );
    let base = serve(app).await;
    let runner = DirectRunner::new(PollingRunner::new(Client::new(), base.clone()));
    let mut rig = rig(&base, Arc::new(runner), fast_timings());

    rig.handle.start(music_job()).await.unwrap();
    let updates = collect_until(&mut rig.updates, WAIT, is_hidden).await;

    let last = views(&updates).last().cloned().cloned().unwrap();
    assert!(last.is_error);
    assert_eq!(last.message, "Track not found");
    assert!(saved_path(&updates).is_none());
}

#[tokio::test]
async fn test_aborted_transfer_leaves_no_file() {
    let app = Router::new().route(
        "/download_file/:id",
        get(|| async {
            // 4 KiB, then the connection stalls.
            let body = stream::once(async { Ok::<_, std::io::Error>(vec![7u8; 4096]) })
                .chain(stream::pending());
            (
                [(CONTENT_DISPOSITION, "attachment; filename=\"video.mp4\"")],
                Body::from_stream(body),
            )
        }),
    );
    let base = serve(app).await;
    let dir = TempDir::new().unwrap();
    let sink = DirSink::new(Client::new(), base, dir.path().to_path_buf());

    let transfer = tokio::spawn(async move { sink.save_task_file("t1").await });
    let part = dir.path().join("video.mp4.part");
    let deadline = tokio::time::Instant::now() + WAIT;
    while std::fs::metadata(&part).map(|m| m.len()).unwrap_or(0) < 4096 {
        assert!(tokio::time::Instant::now() < deadline, "transfer never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!dir.path().join("video.mp4").exists());

    transfer.abort();
    assert!(transfer.await.unwrap_err().is_cancelled());

    let left: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(left.is_empty(), "partial artifact left behind: {:?}", left);
}

#[tokio::test]
async fn test_finished_job_is_saved_after_new_start() {
    let app = Router::new()
        .route(
            "/download_start",
            post(|State(b): State<Backend>| async move {
                let n = b.starts.fetch_add(1, Ordering::SeqCst) + 1;
                Json(json!({ "task_id": format!("t{}", n) }))
            }),
        )
        .route(
            "/download_progress/:id",
            get(|Path(id): Path<String>| async move {
                if id == "t1" {
                    Json(json!({ "status": "done", "progress": 100 }))
                } else {
                    Json(json!({ "status": "downloading", "progress": 10 }))
                }
            }),
        )
        .route(
            "/download_file/:id",
            get(|Path(id): Path<String>| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                (
                    [(CONTENT_DISPOSITION, format!("attachment; filename=\"{}.mp4\"", id))],
                    format!("{}-bytes", id).into_bytes(),
                )
            }),
        )
        .with_state(Backend::default());
    let base = serve(app).await;
    let client = Client::new();
    let mut rig = rig(&base, Arc::new(PollingRunner::new(client, base.clone())), fast_timings());

    rig.handle.start(video_job()).await.unwrap();
    let ready = collect_until(&mut rig.updates, WAIT, |u| {
        matches!(u, DriverUpdate::Progress(v) if v.message == "Ready!")
    })
    .await;
    assert!(saved_path(&ready).is_none());

    rig.handle.start(video_job()).await.unwrap();
    let updates = collect_until(&mut rig.updates, WAIT, |u| {
        matches!(u, DriverUpdate::Notice(Notice::Saved(_)))
    })
    .await;

    let path = saved_path(&updates).expect("first job saved");
    assert_eq!(path, rig.dir.join("t1.mp4"));
    assert_eq!(std::fs::read(&path).unwrap(), b"t1-bytes");
    assert!(!rig.dir.join("t1.mp4.part").exists());
}
