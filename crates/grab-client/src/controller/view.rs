//! What the progress overlay shows. Built by the controller, drawn by the TUI.

use grab_proto::media::{AudioFormat, DownloadJob, JobKind};

use super::simulate::SimPhase;

pub const READY_MESSAGE: &str = "Ready!";
pub const DOWNLOAD_FAILED: &str = "Download failed.";
pub const LOST_CONTACT: &str = "Lost contact with the download server.";
pub const NO_TRACK_INFO: &str = "No track info available for download.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    #[default]
    Pending,
    Active,
    Completed,
}

/// Index into [`ProgressView::steps`].
pub const STEP_DOWNLOAD: usize = 0;
pub const STEP_MERGE: usize = 1;
pub const STEP_DONE: usize = 2;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressView {
    pub visible: bool,
    pub title: String,
    pub download_sub: String,
    /// Label of the middle step: merging for video, converting otherwise.
    pub merge_label: String,
    pub merge_sub: String,
    pub steps: [StepState; 3],
    pub percent: u8,
    pub message: String,
    pub is_error: bool,
}

impl ProgressView {
    pub fn hidden() -> Self {
        Self::default()
    }

    /// Fresh overlay for `job`, before any request has returned.
    pub fn preparing(job: &DownloadJob) -> Self {
        let fmt = job.format_or_default();
        let (title, download_sub, merge_label, merge_sub, message) = match job.kind {
            JobKind::Video => (
                "Processing your request",
                "Fetching video from server…",
                "Merging Audio & Video",
                "Combining streams into .mp4".to_string(),
                "Preparing…",
            ),
            JobKind::Audio => (
                "Downloading Audio",
                "Fetching audio from server…",
                "Converting Format",
                format!("Converting to .{}", fmt.extension()),
                "Preparing…",
            ),
            JobKind::Music => (
                "Downloading track",
                "Downloading audio…",
                "Converting Format",
                format!("Converting to .{}", fmt.extension()),
                "Starting download…",
            ),
        };
        Self {
            visible: true,
            title: title.to_string(),
            download_sub: download_sub.to_string(),
            merge_label: merge_label.to_string(),
            merge_sub,
            steps: [StepState::Active, StepState::Pending, StepState::Pending],
            percent: 0,
            message: message.to_string(),
            is_error: false,
        }
    }

    pub fn set_downloading(&mut self) {
        self.steps = [StepState::Active, StepState::Pending, StepState::Pending];
    }

    pub fn set_merging(&mut self) {
        self.steps = [StepState::Completed, StepState::Active, StepState::Pending];
    }

    pub fn set_ready(&mut self) {
        self.steps = [StepState::Completed, StepState::Completed, StepState::Active];
        self.percent = 100;
        self.message = READY_MESSAGE.to_string();
    }

    /// Error styling; step states are left where they were.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.is_error = true;
    }
}

/// Status line for a simulated phase.
pub fn sim_phase_message(phase: SimPhase, format: AudioFormat) -> String {
    match phase {
        SimPhase::Connect => "Connecting to server…".to_string(),
        SimPhase::Transfer => "Downloading audio…".to_string(),
        SimPhase::Convert => format!("Converting to .{}…", format.extension()),
        SimPhase::Finalize => "Finalizing…".to_string(),
    }
}

/// Shown when a job could not be started and the failure carried no text
/// of its own.
pub fn start_error_fallback(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Music => "Failed to start track download.",
        _ => "Failed to start download.",
    }
}
