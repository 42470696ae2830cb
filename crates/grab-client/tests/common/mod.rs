#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use grab_client::controller::Timings;
use grab_client::DriverUpdate;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock backend");
    });
    format!("http://{}", addr)
}

/// A base URL nothing is listening on.
pub async fn dead_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}", addr)
}

/// Same shape as the defaults, scaled down so flows finish in well under a
/// second.
pub fn fast_timings() -> Timings {
    Timings {
        poll_interval: Duration::from_millis(20),
        sim_tick: Duration::from_millis(5),
        finish_step: Duration::from_millis(5),
        deliver_delay: Duration::from_millis(5),
        done_dismiss: Duration::from_millis(20),
        error_dismiss: Duration::from_millis(20),
        start_error_dismiss: Duration::from_millis(20),
        max_poll_failures: 20,
    }
}

/// Drain updates until `done` matches one (inclusive) or `limit` passes.
pub async fn collect_until<F>(
    rx: &mut mpsc::Receiver<DriverUpdate>,
    limit: Duration,
    mut done: F,
) -> Vec<DriverUpdate>
where
    F: FnMut(&DriverUpdate) -> bool,
{
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(update)) => {
                let stop = done(&update);
                seen.push(update);
                if stop {
                    return seen;
                }
            }
            Ok(None) | Err(_) => return seen,
        }
    }
}

/// True for the final "overlay hidden" render.
pub fn is_hidden(update: &DriverUpdate) -> bool {
    matches!(update, DriverUpdate::Progress(v) if !v.visible)
}
