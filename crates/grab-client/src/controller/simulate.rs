//! Simulated progress for jobs the backend cannot report on.
//!
//! The percentage walks through four ordered bands while the real fetch is
//! in flight:
//!
//! ```text
//!  connect   0 ─ 15
//!  transfer 15 ─ 70
//!  convert  70 ─ 88
//!  finalize 88 ─ 92   (ceiling; held until the fetch resolves)
//! ```
//!
//! Each tick adds a random increment drawn from the current band's range.
//! The lower bound of the range guarantees forward progress; the result is
//! capped at the band's upper edge, so the next tick starts in the next band.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Highest value the simulation may report while the fetch is unresolved.
pub const SIMULATION_CEILING: f64 = 92.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPhase {
    Connect,
    Transfer,
    Convert,
    Finalize,
}

struct Band {
    phase: SimPhase,
    upper: f64,
    min_step: f64,
    max_step: f64,
}

const BANDS: [Band; 4] = [
    Band {
        phase: SimPhase::Connect,
        upper: 15.0,
        min_step: 1.5,
        max_step: 4.0,
    },
    Band {
        phase: SimPhase::Transfer,
        upper: 70.0,
        min_step: 0.8,
        max_step: 3.5,
    },
    Band {
        phase: SimPhase::Convert,
        upper: 88.0,
        min_step: 0.4,
        max_step: 1.6,
    },
    Band {
        phase: SimPhase::Finalize,
        upper: SIMULATION_CEILING,
        min_step: 0.05,
        max_step: 0.3,
    },
];

fn band_of(percent: f64) -> &'static Band {
    BANDS
        .iter()
        .find(|b| percent < b.upper)
        .unwrap_or(&BANDS[BANDS.len() - 1])
}

impl SimPhase {
    pub fn of(percent: f64) -> Self {
        band_of(percent).phase
    }
}

/// One tick: the next percentage after `percent`. Pure apart from `rng`.
pub fn advance<R: Rng>(percent: f64, rng: &mut R) -> f64 {
    let band = band_of(percent);
    let step = rng.gen_range(band.min_step..=band.max_step);
    (percent.max(0.0) + step).min(band.upper)
}

#[derive(Debug, Clone)]
pub struct SimulatedProgress {
    percent: f64,
    rng: StdRng,
}

impl SimulatedProgress {
    pub fn new(seed: u64) -> Self {
        Self {
            percent: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn tick(&mut self) -> f64 {
        self.percent = advance(self.percent, &mut self.rng);
        self.percent
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Whole percent for display.
    pub fn display_percent(&self) -> u8 {
        self.percent.floor().clamp(0.0, 100.0) as u8
    }

    pub fn phase(&self) -> SimPhase {
        SimPhase::of(self.percent)
    }
}
