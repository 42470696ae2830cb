//! App: event loop and key handling.
//!
//! - Terminal input is read on a blocking task and forwarded as
//!   [`AppMessage::Event`].
//! - Resolutions run on spawned tasks; each carries the submission number it
//!   was started for, and only the latest submission is applied.
//! - Progress updates come from the driver and are forwarded unchanged.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use grab_client::controller::Notice;
use grab_client::{DriverUpdate, ProgressHandle, ProgressView, ResolveError, Resolver};
use grab_proto::media::ResolvedMetadata;
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ui;
use crate::widgets::toast::ToastManager;
use crate::widgets::url_input::{UrlAction, UrlInput};

pub enum AppMessage {
    Event(Event),
    Resolved {
        submission: u64,
        result: Result<ResolvedMetadata, ResolveError>,
    },
    Driver(DriverUpdate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Card,
}

pub struct App {
    resolver: Arc<dyn Resolver>,
    progress: ProgressHandle,
    pub input: UrlInput,
    pub focus: Focus,
    /// Bumped on every submit; older resolutions are ignored.
    submission: u64,
    pub resolving: bool,
    pub result: Option<ResolvedMetadata>,
    pub resolve_error: Option<String>,
    pub overlay: ProgressView,
    pub quota: Option<i64>,
    pub toast: ToastManager,
    next_job: u64,
    should_quit: bool,
    tx: Option<mpsc::Sender<AppMessage>>,
}

impl App {
    pub fn new(resolver: Arc<dyn Resolver>, progress: ProgressHandle) -> Self {
        Self {
            resolver,
            progress,
            input: UrlInput::new("Paste a video or track link and press Enter"),
            focus: Focus::Input,
            submission: 0,
            resolving: false,
            result: None,
            resolve_error: None,
            overlay: ProgressView::hidden(),
            quota: None,
            toast: ToastManager::default(),
            next_job: 0,
            should_quit: false,
            tx: None,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(
        mut self,
        mut updates: mpsc::Receiver<DriverUpdate>,
        initial_url: Option<String>,
    ) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let (tx, mut rx) = mpsc::channel::<AppMessage>(256);
        self.tx = Some(tx.clone());

        // ── Background task: keyboard events ──────────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: driver updates ───────────────────────────────────
        let driver_tx = tx.clone();
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                if driver_tx.send(AppMessage::Driver(update)).await.is_err() {
                    break;
                }
            }
        });

        if self.progress.refresh_quota().await.is_err() {
            warn!("progress driver is not running");
        }
        if let Some(url) = initial_url {
            self.input.set_value(&url);
            self.submit(url);
        }

        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| ui::draw(f, &self))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    self.handle_message(msg).await;
                    while let Ok(next) = rx.try_recv() {
                        self.handle_message(next).await;
                    }
                    needs_redraw = true;
                }
                _ = ui_tick.tick() => {
                    needs_redraw = self.toast.tick();
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        Ok(())
    }

    async fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Event(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.handle_key(key).await;
            }
            AppMessage::Event(_) => {}
            AppMessage::Resolved { submission, result } => self.on_resolved(submission, result),
            AppMessage::Driver(update) => self.on_driver_update(update),
        }
    }

    // ── Keys ──────────────────────────────────────────────────────────────────

    async fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => {
                    self.should_quit = true;
                    return;
                }
                KeyCode::Char('v') => {
                    self.paste_clipboard();
                    return;
                }
                _ => {}
            }
        }

        match self.focus {
            Focus::Input => self.handle_input_key(key),
            Focus::Card => self.handle_card_key(key).await,
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Tab {
            if self.result.is_some() {
                self.focus = Focus::Card;
            }
            return;
        }
        match self.input.handle_key(key) {
            UrlAction::Submit(url) => self.submit(url),
            UrlAction::Cleared => self.resolve_error = None,
            UrlAction::Edited | UrlAction::None => {}
        }
    }

    async fn handle_card_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab | KeyCode::Esc => self.focus = Focus::Input,
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                self.pick_option(index).await;
            }
            _ => {}
        }
    }

    fn paste_clipboard(&mut self) {
        match arboard::Clipboard::new().and_then(|mut cb| cb.get_text()) {
            Ok(text) => {
                self.focus = Focus::Input;
                self.input.paste(text.trim());
            }
            Err(e) => {
                warn!("clipboard error: {}", e);
                self.toast.error(format!("clipboard error: {}", e));
            }
        }
    }

    // ── Resolution ────────────────────────────────────────────────────────────

    fn submit(&mut self, url: String) {
        self.submission += 1;
        let submission = self.submission;
        self.resolve_error = None;

        if url.trim().is_empty() {
            self.resolving = false;
            self.toast.stop_spinner();
            self.resolve_error = Some(ResolveError::EmptyUrl.to_string());
            return;
        }

        let Some(tx) = self.tx.clone() else {
            return;
        };
        info!("submit #{}: {}", submission, url);
        self.resolving = true;
        self.toast.spinner("Resolving…");

        let resolver = Arc::clone(&self.resolver);
        tokio::spawn(async move {
            let result = resolver.resolve(&url).await;
            let _ = tx.send(AppMessage::Resolved { submission, result }).await;
        });
    }

    fn on_resolved(&mut self, submission: u64, result: Result<ResolvedMetadata, ResolveError>) {
        if submission != self.submission {
            debug!("dropping resolution #{} (latest is #{})", submission, self.submission);
            return;
        }
        self.resolving = false;
        self.toast.stop_spinner();
        match result {
            Ok(meta) => {
                info!("resolved '{}' ({})", meta.title, meta.platform_id);
                self.result = Some(meta);
                self.focus = Focus::Card;
                ring_bell();
            }
            Err(e) => {
                self.result = None;
                self.focus = Focus::Input;
                self.resolve_error = Some(e.to_string());
            }
        }
    }

    async fn pick_option(&mut self, index: usize) {
        let Some(meta) = self.result.as_ref() else {
            return;
        };
        let Some(option) = meta.download_options().get(index).copied() else {
            return;
        };
        self.next_job += 1;
        let job = meta.job_for(format!("job-{}", self.next_job), option);
        info!("picked {:?} for {}", option, meta.source_url);
        if self.progress.start(job).await.is_err() {
            self.toast.error("Download service stopped.");
        }
    }

    // ── Driver updates ────────────────────────────────────────────────────────

    fn on_driver_update(&mut self, update: DriverUpdate) {
        match update {
            DriverUpdate::Progress(view) => self.overlay = view,
            DriverUpdate::Quota(n) => self.quota = Some(n),
            DriverUpdate::Notice(Notice::Saved(path)) => {
                self.toast.success(format!("Saved {}", path.display()));
            }
            DriverUpdate::Notice(Notice::Rejected(msg)) => self.toast.error(msg),
            DriverUpdate::Notice(Notice::SaveFailed(msg)) => {
                self.toast.error(format!("Save failed: {}", msg));
            }
        }
    }
}

/// Audible cue on a successful lookup.
fn ring_bell() {
    let mut out = io::stdout();
    let _ = out.write_all(b"\x07").and_then(|_| out.flush());
}
