mod app;
mod theme;
mod ui;
mod widgets;

use std::sync::Arc;

use clap::Parser;
use grab_client::controller::Timings;
use grab_client::deliver::DirSink;
use grab_client::http::build_client;
use grab_client::quota::HttpQuota;
use grab_client::{runner_from_config, Controller, HttpResolver, ProgressDriver};
use grab_proto::config::Config;

#[derive(Parser)]
#[command(name = "mediagrab")]
#[command(about = "Resolve a media link and download it from the terminal")]
struct Cli {
    /// Link to resolve on start
    url: Option<String>,

    /// Backend base URL, overriding the config file
    #[arg(long)]
    api: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = grab_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("mediagrab.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG overrides; HTTP client internals stay at warn by default.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("mediagrab log: {}", log_path.display());
    tracing::info!("mediagrab starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("config: {}; using defaults", e);
        Config::default()
    });
    if let Some(api) = cli.api {
        config.api.base_url = api.trim_end_matches('/').to_string();
    }
    tracing::info!(
        "backend {} (music progress polling: {})",
        config.api.base_url,
        config.runner.music_progress_polling
    );

    // ── Backend clients ──────────────────────────────────────────────────────
    let client = build_client(&config.api)?;
    let base_url = config.api.base_url.clone();
    let resolver = Arc::new(HttpResolver::from_config(client.clone(), &config));
    let runner = runner_from_config(client.clone(), &config);
    let sink = Arc::new(DirSink::new(
        client.clone(),
        base_url.clone(),
        config.paths.downloads_dir.clone(),
    ));
    let quota = Arc::new(HttpQuota::new(client, base_url));

    // ── Progress driver ──────────────────────────────────────────────────────
    let controller = Controller::new(
        Timings::from(&config.progress),
        config.progress.simulation_seed,
    );
    let (progress, updates, driver_task) = ProgressDriver::spawn(controller, runner, sink, quota);

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(resolver, progress.clone());
    let result = app.run(updates, cli.url).await;

    let _ = progress.shutdown().await;
    let _ = driver_task.await;
    tracing::info!("mediagrab stopped");
    result
}
