//! Job progress controller.
//!
//! A plain state machine: every network reply and timer firing comes in as an
//! [`Input`], and the controller answers with the [`Effect`]s to carry out.
//! It performs no I/O itself, so the whole lifecycle can be driven by hand in
//! tests. [`crate::driver`] executes the effects on tokio.
//!
//! ```text
//!   Idle ──Start──▶ Starting ──Started(Ok)──▶ Observing(polling) ──done──▶ Done ──▶ Idle
//!    ▲                 │                                  │
//!    │                 └──Started(Err)──▶ Error ◀─────────┘ error / lost contact
//!    │
//!    └── Start(simulated) ──▶ Observing(simulated) ──Fetched(Ok)──▶ 95 → 98 → 100 ──▶ Done
//! ```
//!
//! At most one session exists. Starting a new job supersedes the old one;
//! every input carries the [`SessionToken`] it was issued for, and inputs for
//! any other token are dropped.

pub mod simulate;
pub mod view;

use std::path::PathBuf;
use std::time::Duration;

use grab_proto::config::ProgressConfig;
use grab_proto::media::{
    track_filename, DownloadJob, JobKind, JobState, JobStatus, UNKNOWN_ARTIST, UNKNOWN_TRACK,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

pub use simulate::{SimPhase, SimulatedProgress, SIMULATION_CEILING};
pub use view::{ProgressView, StepState};

use view::{sim_phase_message, DOWNLOAD_FAILED, LOST_CONTACT, NO_TRACK_INFO};

/// Names one session. Issued in increasing order, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Starting,
    Observing,
    Done,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationMode {
    Polling,
    Simulated,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub job: DownloadJob,
    pub mode: ObservationMode,
    pub stage: Stage,
    pub task_id: Option<String>,
    pub poll_failures: u32,
    pub sim: Option<SimulatedProgress>,
    /// Bytes of a finished direct fetch, held until they are saved.
    pub artifact: Option<Vec<u8>>,
    /// Set once the single delivery effect has been emitted.
    pub delivered: bool,
    pub view: ProgressView,
}

/// Delays the controller schedules, resolved from config once.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub poll_interval: Duration,
    pub sim_tick: Duration,
    pub finish_step: Duration,
    pub deliver_delay: Duration,
    pub done_dismiss: Duration,
    pub error_dismiss: Duration,
    pub start_error_dismiss: Duration,
    pub max_poll_failures: u32,
}

impl From<&ProgressConfig> for Timings {
    fn from(c: &ProgressConfig) -> Self {
        Self {
            poll_interval: c.poll_interval(),
            sim_tick: c.sim_tick(),
            finish_step: c.finish_step(),
            deliver_delay: c.deliver_delay(),
            done_dismiss: c.done_dismiss(),
            error_dismiss: c.error_dismiss(),
            start_error_dismiss: c.start_error_dismiss(),
            max_poll_failures: c.max_poll_failures,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self::from(&ProgressConfig::default())
    }
}

// ── Input / Effect ────────────────────────────────────────────────────────────

/// Everything that can happen to a session. Results carry user-facing text
/// on the error side.
#[derive(Debug, Clone)]
pub enum Input {
    /// User picked a download option. `polling` is the runner's answer to
    /// `supports_progress_polling(job.kind)`.
    Start { job: DownloadJob, polling: bool },
    Started {
        token: SessionToken,
        result: Result<String, String>,
    },
    Polled {
        token: SessionToken,
        result: Result<JobStatus, String>,
    },
    SimTick { token: SessionToken },
    Fetched {
        token: SessionToken,
        result: Result<Vec<u8>, String>,
    },
    FinishStep { token: SessionToken },
    Delivered {
        token: SessionToken,
        result: Result<PathBuf, String>,
    },
    Dismiss { token: SessionToken },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Saved(PathBuf),
    Rejected(String),
    /// Delivery of a superseded session failed; its overlay is already gone.
    SaveFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Render(ProgressView),
    StartJob {
        token: SessionToken,
        job: DownloadJob,
    },
    FetchArtifact {
        token: SessionToken,
        job: DownloadJob,
    },
    PollAfter {
        token: SessionToken,
        task_id: String,
        delay: Duration,
    },
    TickAfter {
        token: SessionToken,
        delay: Duration,
    },
    FinishStepAfter {
        token: SessionToken,
        delay: Duration,
    },
    DeliverTaskFile {
        token: SessionToken,
        task_id: String,
        after: Duration,
    },
    SaveBlob {
        token: SessionToken,
        filename: String,
        bytes: Vec<u8>,
    },
    DismissAfter {
        token: SessionToken,
        delay: Duration,
    },
    RefreshQuota,
    /// Abort everything still running for a superseded session.
    Cancel(SessionToken),
    /// The session ended normally; its bookkeeping can go.
    Release(SessionToken),
    Notice(Notice),
}

// ── Controller ────────────────────────────────────────────────────────────────

pub struct Controller {
    timings: Timings,
    session: Option<Session>,
    next_token: u64,
    /// Seeds each session's simulation.
    seeder: StdRng,
}

impl Controller {
    /// `seed` fixes the simulated progress sequence; `None` draws from OS entropy.
    pub fn new(timings: Timings, seed: Option<u64>) -> Self {
        Self {
            timings,
            session: None,
            next_token: 1,
            seeder: seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
        }
    }

    pub fn stage(&self) -> Stage {
        self.session.as_ref().map_or(Stage::Idle, |s| s.stage)
    }

    pub fn current_token(&self) -> Option<SessionToken> {
        self.session.as_ref().map(|s| s.token)
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Start { job, polling } => self.on_start(job, polling),
            Input::Started { token, result } => self.on_started(token, result),
            Input::Polled { token, result } => self.on_polled(token, result),
            Input::SimTick { token } => self.on_sim_tick(token),
            Input::Fetched { token, result } => self.on_fetched(token, result),
            Input::FinishStep { token } => self.on_finish_step(token),
            Input::Delivered { token, result } => self.on_delivered(token, result),
            Input::Dismiss { token } => self.on_dismiss(token),
        }
    }

    /// The live session if `token` names it.
    fn current(&mut self, token: SessionToken) -> Option<&mut Session> {
        match self.session.as_mut() {
            Some(s) if s.token == token => Some(s),
            _ => {
                debug!("controller: dropping input for stale session {:?}", token);
                None
            }
        }
    }

    fn on_start(&mut self, job: DownloadJob, polling: bool) -> Vec<Effect> {
        if job.kind == JobKind::Music && !job.track.as_ref().is_some_and(|t| t.is_complete()) {
            warn!("controller: job {} has no usable track info", job.id);
            return vec![Effect::Notice(Notice::Rejected(NO_TRACK_INFO.to_string()))];
        }

        let mut effects = Vec::new();
        if let Some(old) = self.session.take() {
            info!("controller: session {:?} superseded", old.token);
            effects.push(Effect::Cancel(old.token));
        }

        let token = SessionToken(self.next_token);
        self.next_token += 1;

        let view = ProgressView::preparing(&job);
        effects.push(Effect::Render(view.clone()));

        let (mode, stage, sim) = if polling {
            effects.push(Effect::StartJob {
                token,
                job: job.clone(),
            });
            (ObservationMode::Polling, Stage::Starting, None)
        } else {
            effects.push(Effect::FetchArtifact {
                token,
                job: job.clone(),
            });
            effects.push(Effect::TickAfter {
                token,
                delay: Duration::ZERO,
            });
            let seed = self.seeder.gen();
            (
                ObservationMode::Simulated,
                Stage::Observing,
                Some(SimulatedProgress::new(seed)),
            )
        };
        info!(
            "controller: session {:?} job={} mode={:?}",
            token, job.id, mode
        );

        self.session = Some(Session {
            token,
            job,
            mode,
            stage,
            task_id: None,
            poll_failures: 0,
            sim,
            artifact: None,
            delivered: false,
            view,
        });
        effects
    }

    fn on_started(&mut self, token: SessionToken, result: Result<String, String>) -> Vec<Effect> {
        let timings = self.timings;
        let Some(s) = self.current(token) else {
            return vec![];
        };
        if s.stage != Stage::Starting {
            return vec![];
        }

        let mut effects = vec![Effect::RefreshQuota];
        match result {
            Ok(task_id) => {
                s.stage = Stage::Observing;
                s.task_id = Some(task_id.clone());
                effects.push(Effect::PollAfter {
                    token,
                    task_id,
                    delay: timings.poll_interval,
                });
            }
            Err(message) => {
                warn!("controller: job start failed: {}", message);
                s.stage = Stage::Error;
                s.view.set_error(message);
                effects.push(Effect::Render(s.view.clone()));
                effects.push(Effect::DismissAfter {
                    token,
                    delay: timings.start_error_dismiss,
                });
            }
        }
        effects
    }

    fn on_polled(&mut self, token: SessionToken, result: Result<JobStatus, String>) -> Vec<Effect> {
        let timings = self.timings;
        let Some(s) = self.current(token) else {
            return vec![];
        };
        if s.stage != Stage::Observing || s.mode != ObservationMode::Polling {
            return vec![];
        }
        let Some(task_id) = s.task_id.clone() else {
            return vec![];
        };

        let status = match result {
            Ok(status) => status,
            Err(e) => {
                s.poll_failures += 1;
                debug!(
                    "controller: poll {} failed ({} in a row): {}",
                    task_id, s.poll_failures, e
                );
                if timings.max_poll_failures > 0 && s.poll_failures >= timings.max_poll_failures {
                    warn!("controller: giving up on task {}", task_id);
                    s.stage = Stage::Error;
                    s.view.set_error(LOST_CONTACT);
                    return vec![
                        Effect::Render(s.view.clone()),
                        Effect::DismissAfter {
                            token,
                            delay: timings.error_dismiss,
                        },
                    ];
                }
                return vec![Effect::PollAfter {
                    token,
                    task_id,
                    delay: timings.poll_interval,
                }];
            }
        };

        s.poll_failures = 0;
        s.view.percent = status.progress_percent;
        s.view.message = status.message.clone();

        match status.state {
            JobState::Queued | JobState::Downloading | JobState::Merging => {
                match status.state {
                    JobState::Downloading => s.view.set_downloading(),
                    JobState::Merging => s.view.set_merging(),
                    _ => {}
                }
                vec![
                    Effect::Render(s.view.clone()),
                    Effect::PollAfter {
                        token,
                        task_id,
                        delay: timings.poll_interval,
                    },
                ]
            }
            JobState::Done | JobState::Served => {
                s.stage = Stage::Done;
                s.view.set_ready();
                let mut effects = vec![Effect::Render(s.view.clone())];
                if !s.delivered {
                    s.delivered = true;
                    effects.push(Effect::DeliverTaskFile {
                        token,
                        task_id,
                        after: timings.deliver_delay,
                    });
                }
                effects
            }
            JobState::Error => {
                s.stage = Stage::Error;
                let message = if status.message.is_empty() {
                    DOWNLOAD_FAILED.to_string()
                } else {
                    status.message
                };
                s.view.set_error(message);
                vec![
                    Effect::Render(s.view.clone()),
                    Effect::DismissAfter {
                        token,
                        delay: timings.error_dismiss,
                    },
                ]
            }
        }
    }

    fn on_sim_tick(&mut self, token: SessionToken) -> Vec<Effect> {
        let timings = self.timings;
        let Some(s) = self.current(token) else {
            return vec![];
        };
        // The timer stops for good once the fetch has resolved.
        if s.stage != Stage::Observing || s.artifact.is_some() {
            return vec![];
        }
        let format = s.job.format_or_default();
        let Some(sim) = s.sim.as_mut() else {
            return vec![];
        };

        sim.tick();
        let phase = sim.phase();
        s.view.percent = sim.display_percent();
        s.view.message = sim_phase_message(phase, format);
        match phase {
            SimPhase::Connect | SimPhase::Transfer => s.view.set_downloading(),
            SimPhase::Convert | SimPhase::Finalize => s.view.set_merging(),
        }

        vec![
            Effect::Render(s.view.clone()),
            Effect::TickAfter {
                token,
                delay: timings.sim_tick,
            },
        ]
    }

    fn on_fetched(&mut self, token: SessionToken, result: Result<Vec<u8>, String>) -> Vec<Effect> {
        let timings = self.timings;
        let Some(s) = self.current(token) else {
            return vec![];
        };
        if s.stage != Stage::Observing
            || s.mode != ObservationMode::Simulated
            || s.artifact.is_some()
        {
            return vec![];
        }

        let mut effects = vec![Effect::RefreshQuota];
        match result {
            Ok(bytes) => {
                info!("controller: fetched {} bytes for job {}", bytes.len(), s.job.id);
                s.artifact = Some(bytes);
                s.view.percent = s.view.percent.max(95);
                s.view.set_merging();
                effects.push(Effect::Render(s.view.clone()));
                effects.push(Effect::FinishStepAfter {
                    token,
                    delay: timings.finish_step,
                });
            }
            Err(message) => {
                warn!("controller: fetch failed for job {}: {}", s.job.id, message);
                s.stage = Stage::Error;
                s.view.set_error(message);
                effects.push(Effect::Render(s.view.clone()));
                effects.push(Effect::DismissAfter {
                    token,
                    delay: timings.error_dismiss,
                });
            }
        }
        effects
    }

    fn on_finish_step(&mut self, token: SessionToken) -> Vec<Effect> {
        let timings = self.timings;
        let Some(s) = self.current(token) else {
            return vec![];
        };
        if s.stage != Stage::Observing || s.artifact.is_none() {
            return vec![];
        }

        if s.view.percent < 98 {
            s.view.percent = 98;
            return vec![
                Effect::Render(s.view.clone()),
                Effect::FinishStepAfter {
                    token,
                    delay: timings.finish_step,
                },
            ];
        }

        s.stage = Stage::Done;
        s.view.set_ready();
        let mut effects = vec![Effect::Render(s.view.clone())];
        if let (false, Some(bytes)) = (s.delivered, s.artifact.take()) {
            s.delivered = true;
            let (title, artist) = match &s.job.track {
                Some(t) => (t.title.as_str(), t.artist.as_str()),
                None => (UNKNOWN_TRACK, UNKNOWN_ARTIST),
            };
            effects.push(Effect::SaveBlob {
                token,
                filename: track_filename(title, artist, s.job.format_or_default()),
                bytes,
            });
        }
        effects
    }

    fn on_delivered(&mut self, token: SessionToken, result: Result<PathBuf, String>) -> Vec<Effect> {
        let timings = self.timings;
        if self.current_token() != Some(token) {
            // Deliveries outlive supersession; only the outcome is reported.
            return match result {
                Ok(path) => {
                    info!("controller: superseded session {:?} saved {}", token, path.display());
                    vec![Effect::Notice(Notice::Saved(path))]
                }
                Err(message) => vec![Effect::Notice(Notice::SaveFailed(message))],
            };
        }
        let Some(s) = self.current(token) else {
            return vec![];
        };
        if s.stage != Stage::Done {
            return vec![];
        }

        match result {
            Ok(path) => {
                info!("controller: job {} saved to {}", s.job.id, path.display());
                vec![
                    Effect::Notice(Notice::Saved(path)),
                    Effect::DismissAfter {
                        token,
                        delay: timings.done_dismiss,
                    },
                ]
            }
            Err(message) => {
                warn!("controller: delivery failed for job {}: {}", s.job.id, message);
                s.stage = Stage::Error;
                s.view.set_error(message);
                vec![
                    Effect::Render(s.view.clone()),
                    Effect::DismissAfter {
                        token,
                        delay: timings.error_dismiss,
                    },
                ]
            }
        }
    }

    fn on_dismiss(&mut self, token: SessionToken) -> Vec<Effect> {
        if self.current(token).is_none() {
            return vec![];
        }
        self.session = None;
        vec![Effect::Render(ProgressView::hidden()), Effect::Release(token)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grab_proto::media::{AudioFormat, TrackInfo};

    fn video_job() -> DownloadJob {
        DownloadJob {
            id: "v1".into(),
            source_url: "https://www.youtube.com/watch?v=abc".into(),
            kind: JobKind::Video,
            format: None,
            quality: None,
            track: None,
        }
    }

    fn music_job(title: &str, artist: &str) -> DownloadJob {
        DownloadJob {
            id: "m1".into(),
            source_url: "https://open.spotify.com/track/x".into(),
            kind: JobKind::Music,
            format: Some(AudioFormat::Mp3),
            quality: None,
            track: Some(TrackInfo {
                title: title.into(),
                artist: artist.into(),
                duration_ms: 1000,
            }),
        }
    }

    fn status(state: JobState, pct: u8, msg: &str) -> JobStatus {
        JobStatus {
            state,
            progress_percent: pct,
            message: msg.into(),
        }
    }

    fn started(c: &mut Controller) -> SessionToken {
        c.handle(Input::Start {
            job: video_job(),
            polling: true,
        });
        let token = c.current_token().unwrap();
        c.handle(Input::Started {
            token,
            result: Ok("t1".into()),
        });
        token
    }

    fn last_view(effects: &[Effect]) -> Option<&ProgressView> {
        effects.iter().rev().find_map(|e| match e {
            Effect::Render(v) => Some(v),
            _ => None,
        })
    }

    #[test]
    fn test_start_emits_preparing_and_start_request() {
        let mut c = Controller::new(Timings::default(), Some(1));
        let effects = c.handle(Input::Start {
            job: video_job(),
            polling: true,
        });
        assert_eq!(c.stage(), Stage::Starting);
        assert_eq!(last_view(&effects).unwrap().message, "Preparing…");
        assert!(effects.iter().any(|e| matches!(e, Effect::StartJob { .. })));
    }

    #[test]
    fn test_started_schedules_first_poll_and_quota() {
        let mut c = Controller::new(Timings::default(), Some(1));
        c.handle(Input::Start {
            job: video_job(),
            polling: true,
        });
        let token = c.current_token().unwrap();
        let effects = c.handle(Input::Started {
            token,
            result: Ok("t1".into()),
        });
        assert_eq!(effects[0], Effect::RefreshQuota);
        assert_eq!(
            effects[1],
            Effect::PollAfter {
                token,
                task_id: "t1".into(),
                delay: Duration::from_millis(600)
            }
        );
        assert_eq!(c.stage(), Stage::Observing);
    }

    #[test]
    fn test_start_error_shows_text_and_dismisses() {
        let mut c = Controller::new(Timings::default(), Some(1));
        c.handle(Input::Start {
            job: video_job(),
            polling: true,
        });
        let token = c.current_token().unwrap();
        let effects = c.handle(Input::Started {
            token,
            result: Err("Daily limit reached".into()),
        });
        let view = last_view(&effects).unwrap();
        assert!(view.is_error);
        assert_eq!(view.message, "Daily limit reached");
        assert!(effects.contains(&Effect::DismissAfter {
            token,
            delay: Duration::from_millis(3000)
        }));
        assert!(effects.contains(&Effect::RefreshQuota));
    }

    #[test]
    fn test_merging_marks_download_completed() {
        let mut c = Controller::new(Timings::default(), Some(1));
        let token = started(&mut c);
        let effects = c.handle(Input::Polled {
            token,
            result: Ok(status(JobState::Merging, 71, "Merging…")),
        });
        let view = last_view(&effects).unwrap();
        assert_eq!(view.steps, [StepState::Completed, StepState::Active, StepState::Pending]);
        assert_eq!(view.percent, 71);
        assert_eq!(view.message, "Merging…");
    }

    #[test]
    fn test_error_without_message_shows_download_failed() {
        let mut c = Controller::new(Timings::default(), Some(1));
        let token = started(&mut c);
        let effects = c.handle(Input::Polled {
            token,
            result: Ok(status(JobState::Error, 40, "")),
        });
        let view = last_view(&effects).unwrap();
        assert_eq!(view.message, "Download failed.");
        assert!(view.is_error);
        assert_eq!(c.stage(), Stage::Error);
        assert!(!effects.iter().any(|e| matches!(e, Effect::PollAfter { .. })));
    }

    #[test]
    fn test_done_delivers_exactly_once() {
        let mut c = Controller::new(Timings::default(), Some(1));
        let token = started(&mut c);
        let effects = c.handle(Input::Polled {
            token,
            result: Ok(status(JobState::Done, 100, "")),
        });
        assert_eq!(last_view(&effects).unwrap().message, "Ready!");
        assert!(effects.contains(&Effect::DeliverTaskFile {
            token,
            task_id: "t1".into(),
            after: Duration::from_millis(800)
        }));
        // A late duplicate reply is ignored.
        let again = c.handle(Input::Polled {
            token,
            result: Ok(status(JobState::Served, 100, "")),
        });
        assert!(again.is_empty());
    }

    #[test]
    fn test_poll_failures_escalate() {
        let timings = Timings {
            max_poll_failures: 3,
            ..Timings::default()
        };
        let mut c = Controller::new(timings, Some(1));
        let token = started(&mut c);
        for _ in 0..2 {
            let effects = c.handle(Input::Polled {
                token,
                result: Err("connection reset".into()),
            });
            assert!(matches!(effects[..], [Effect::PollAfter { .. }]));
        }
        let effects = c.handle(Input::Polled {
            token,
            result: Err("connection reset".into()),
        });
        assert_eq!(last_view(&effects).unwrap().message, LOST_CONTACT);
        assert_eq!(c.stage(), Stage::Error);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let timings = Timings {
            max_poll_failures: 2,
            ..Timings::default()
        };
        let mut c = Controller::new(timings, Some(1));
        let token = started(&mut c);
        c.handle(Input::Polled {
            token,
            result: Err("x".into()),
        });
        c.handle(Input::Polled {
            token,
            result: Ok(status(JobState::Downloading, 5, "")),
        });
        let effects = c.handle(Input::Polled {
            token,
            result: Err("x".into()),
        });
        assert!(matches!(effects[..], [Effect::PollAfter { .. }]));
    }

    #[test]
    fn test_music_without_track_is_refused() {
        let mut c = Controller::new(Timings::default(), Some(1));
        let token = started(&mut c);
        let effects = c.handle(Input::Start {
            job: music_job("", "Artist"),
            polling: false,
        });
        assert_eq!(
            effects,
            vec![Effect::Notice(Notice::Rejected(NO_TRACK_INFO.into()))]
        );
        assert_eq!(c.current_token(), Some(token));
    }

    #[test]
    fn test_new_start_supersedes_and_drops_stale_inputs() {
        let mut c = Controller::new(Timings::default(), Some(1));
        let old = started(&mut c);
        let effects = c.handle(Input::Start {
            job: video_job(),
            polling: true,
        });
        assert_eq!(effects[0], Effect::Cancel(old));
        let new = c.current_token().unwrap();
        assert_ne!(old, new);

        let stale = c.handle(Input::Polled {
            token: old,
            result: Ok(status(JobState::Done, 100, "")),
        });
        assert!(stale.is_empty());
        assert!(c.handle(Input::Dismiss { token: old }).is_empty());
        assert_eq!(c.stage(), Stage::Starting);
    }

    #[test]
    fn test_simulated_flow_saves_named_blob() {
        let mut c = Controller::new(Timings::default(), Some(9));
        let effects = c.handle(Input::Start {
            job: music_job("A/B: Song?", "X*Y"),
            polling: false,
        });
        assert_eq!(last_view(&effects).unwrap().message, "Starting download…");
        assert!(effects.iter().any(|e| matches!(e, Effect::FetchArtifact { .. })));
        let token = c.current_token().unwrap();

        for _ in 0..10 {
            c.handle(Input::SimTick { token });
        }
        let effects = c.handle(Input::Fetched {
            token,
            result: Ok(vec![1, 2, 3]),
        });
        assert_eq!(last_view(&effects).unwrap().percent, 95);
        // Ticks after the fetch landed are ignored.
        assert!(c.handle(Input::SimTick { token }).is_empty());

        let effects = c.handle(Input::FinishStep { token });
        assert_eq!(last_view(&effects).unwrap().percent, 98);
        let effects = c.handle(Input::FinishStep { token });
        assert_eq!(last_view(&effects).unwrap().percent, 100);
        assert!(effects.contains(&Effect::SaveBlob {
            token,
            filename: "AB Song - XY.mp3".into(),
            bytes: vec![1, 2, 3],
        }));
        assert_eq!(c.stage(), Stage::Done);
    }

    #[test]
    fn test_simulated_fetch_error_stops_ticking() {
        let mut c = Controller::new(Timings::default(), Some(9));
        c.handle(Input::Start {
            job: music_job("T", "A"),
            polling: false,
        });
        let token = c.current_token().unwrap();
        c.handle(Input::SimTick { token });
        let effects = c.handle(Input::Fetched {
            token,
            result: Err("Track not found".into()),
        });
        assert_eq!(last_view(&effects).unwrap().message, "Track not found");
        assert!(c.handle(Input::SimTick { token }).is_empty());
    }

    #[test]
    fn test_second_simulated_start_drops_old_ticks_and_fetch() {
        let mut c = Controller::new(Timings::default(), Some(3));
        c.handle(Input::Start {
            job: music_job("First", "A"),
            polling: false,
        });
        let old = c.current_token().unwrap();
        c.handle(Input::SimTick { token: old });

        let effects = c.handle(Input::Start {
            job: music_job("Second", "B"),
            polling: false,
        });
        assert_eq!(effects[0], Effect::Cancel(old));
        let new = c.current_token().unwrap();

        assert!(c.handle(Input::SimTick { token: old }).is_empty());
        assert!(c
            .handle(Input::Fetched {
                token: old,
                result: Ok(vec![9; 4]),
            })
            .is_empty());
        assert!(c.handle(Input::FinishStep { token: old }).is_empty());

        // The new session still ticks from its own start.
        let effects = c.handle(Input::SimTick { token: new });
        assert!(last_view(&effects).unwrap().percent <= 15);
        assert!(effects.contains(&Effect::TickAfter {
            token: new,
            delay: Duration::from_millis(300)
        }));
        assert_eq!(c.stage(), Stage::Observing);
    }

    #[test]
    fn test_delivery_of_superseded_session_is_reported_only() {
        let mut c = Controller::new(Timings::default(), Some(1));
        let old = started(&mut c);
        c.handle(Input::Polled {
            token: old,
            result: Ok(status(JobState::Done, 100, "")),
        });
        c.handle(Input::Start {
            job: video_job(),
            polling: true,
        });

        let effects = c.handle(Input::Delivered {
            token: old,
            result: Ok(PathBuf::from("/tmp/old.mp4")),
        });
        assert_eq!(
            effects,
            vec![Effect::Notice(Notice::Saved(PathBuf::from("/tmp/old.mp4")))]
        );
        let effects = c.handle(Input::Delivered {
            token: old,
            result: Err("Download interrupted.".into()),
        });
        assert_eq!(
            effects,
            vec![Effect::Notice(Notice::SaveFailed("Download interrupted.".into()))]
        );
        assert_eq!(c.stage(), Stage::Starting);
    }

    #[test]
    fn test_dismiss_returns_to_idle() {
        let mut c = Controller::new(Timings::default(), Some(1));
        let token = started(&mut c);
        c.handle(Input::Polled {
            token,
            result: Ok(status(JobState::Done, 100, "")),
        });
        let effects = c.handle(Input::Delivered {
            token,
            result: Ok(PathBuf::from("/tmp/x.mp4")),
        });
        assert!(effects.contains(&Effect::Notice(Notice::Saved(PathBuf::from("/tmp/x.mp4")))));
        let effects = c.handle(Input::Dismiss { token });
        assert_eq!(effects, vec![Effect::Render(ProgressView::hidden()), Effect::Release(token)]);
        assert_eq!(c.stage(), Stage::Idle);
    }
}
