use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::capture::CaptureWindow;
use crate::rom::RomTrack;
use crate::sample::TaggedSample;
use crate::step::SessionMode;
use crate::util::{max, mean, RoundTo};

/// Peak and mean force over the capture window, in pounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StrengthSummary {
    pub max: f64,
    pub avg: f64,
}

impl StrengthSummary {
    /// Both values rounded to two decimals. An empty slice gives zeros.
    pub fn from_values(values: &[f64]) -> Self {
        match (max(values), mean(values)) {
            (Some(peak), Some(avg)) => Self {
                max: peak.round_to(2),
                avg: avg.round_to(2),
            },
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Range of motion in degrees.
    pub rom: f64,
    pub strength: StrengthSummary,
    pub samples: Vec<TaggedSample>,
}

/// A finished session as handed to the results store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub mode: SessionMode,
    pub recorded_at: DateTime<Utc>,
    pub result: SessionResult,
}

/// Reduce the session's accumulated state to a result.
///
/// ROM is the tracked maximum, else the latest live angle, else `fallback_rom`.
pub fn aggregate(
    track: &RomTrack,
    live_rom: Option<f64>,
    window: &CaptureWindow,
    fallback_rom: f64,
) -> SessionResult {
    let rom = match (track.max, live_rom) {
        (Some(max), _) => max,
        (None, Some(live)) => live,
        (None, None) => {
            warn!(fallback_rom, "no angle data recorded, using fallback ROM");
            fallback_rom
        }
    };

    let samples: Vec<TaggedSample> = window
        .samples()
        .iter()
        .map(|&sample| TaggedSample {
            sample,
            relevant: window.contains(sample.timestamp),
        })
        .collect();

    let values: Vec<f64> = samples
        .iter()
        .filter(|t| t.relevant)
        .map(|t| t.sample.value)
        .collect();

    SessionResult {
        rom,
        strength: StrengthSummary::from_values(&values),
        samples,
    }
}

/// Change of a measurement relative to the stored baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub rom_delta: f64,
    pub max_force_delta: f64,
    pub avg_force_delta: f64,
}

impl Progress {
    pub fn against(baseline: &SessionResult, latest: &SessionResult) -> Self {
        Self {
            rom_delta: (latest.rom - baseline.rom).round_to(2),
            max_force_delta: (latest.strength.max - baseline.strength.max).round_to(2),
            avg_force_delta: (latest.strength.avg - baseline.strength.avg).round_to(2),
        }
    }
}
