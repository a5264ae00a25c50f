//! Stand-ins for the brace driver: a simulated device and a CSV replay.
//!
//! Both produce [`SessionEvent::Angle`] and [`SessionEvent::Force`] events
//! when polled, and forget everything they produced when restarted.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::sample::Sample;
use crate::session::{SessionEvent, SessionView};
use crate::step::SessionStep;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("could not read replay: {0}")]
    Csv(#[from] csv::Error),

    #[error("replay contains no samples")]
    Empty,
}

pub trait SampleFeed {
    /// Drop any history and start producing from `now_ms`.
    fn restart(&mut self, now_ms: i64);

    /// Readings available by `now_ms`. `view` lets a feed follow the operator.
    fn poll(&mut self, now_ms: i64, view: &SessionView) -> Vec<SessionEvent>;
}

/// Synthetic brace that follows the current step: the arm starts extended,
/// bends towards a maximum angle, and returns. Force ramps up while a
/// capture is running.
#[derive(Debug)]
pub struct SimulatedDevice<R: Rng = StdRng> {
    rng: R,
    period_ms: i64,
    last_emit: Option<i64>,
    angle: f64,
    max_angle: f64,
}

impl SimulatedDevice<StdRng> {
    pub fn new(period_ms: i64) -> Self {
        Self::with_rng(StdRng::from_entropy(), period_ms)
    }

    pub fn seeded(seed: u64, period_ms: i64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), period_ms)
    }
}

impl<R: Rng> SimulatedDevice<R> {
    const REST_ANGLE: f64 = 5.0;

    pub fn with_rng(mut rng: R, period_ms: i64) -> Self {
        let max_angle = rng.gen_range(110.0..140.0);
        Self {
            rng,
            period_ms: period_ms.max(1),
            last_emit: None,
            angle: Self::REST_ANGLE,
            max_angle,
        }
    }

    fn target_angle(&self, step: SessionStep) -> f64 {
        match step {
            SessionStep::Preparation | SessionStep::Finalize => Self::REST_ANGLE,
            SessionStep::BendToMax | SessionStep::StrengthSetup => self.max_angle,
            SessionStep::CompleteRom => Self::REST_ANGLE + 10.0,
        }
    }

    fn force(&mut self, view: &SessionView) -> f64 {
        let noise = self.rng.gen_range(-0.4..0.4);
        match view.countdown {
            Some(remaining) if view.capturing => {
                let effort = match remaining {
                    3 => 12.0,
                    2 => 24.0,
                    _ => 19.0,
                };
                effort + noise * 5.0
            }
            _ => (0.5 + noise).max(0.0),
        }
    }
}

impl<R: Rng> SampleFeed for SimulatedDevice<R> {
    fn restart(&mut self, _now_ms: i64) {
        self.last_emit = None;
        self.angle = Self::REST_ANGLE;
        self.max_angle = self.rng.gen_range(110.0..140.0);
    }

    fn poll(&mut self, now_ms: i64, view: &SessionView) -> Vec<SessionEvent> {
        if let Some(last) = self.last_emit {
            if now_ms - last < self.period_ms {
                return Vec::new();
            }
        }
        self.last_emit = Some(now_ms);

        let target = self.target_angle(view.step);
        self.angle += (target - self.angle) * 0.15 + self.rng.gen_range(-0.3..0.3);
        let force = self.force(view);

        vec![
            SessionEvent::Angle(Sample::new(now_ms, self.angle)),
            SessionEvent::Force(Sample::new(now_ms, force)),
        ]
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Channel {
    Angle,
    Force,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ReplayRow {
    kind: Channel,
    offset_ms: i64,
    value: f64,
}

/// Recorded stream replayed in real time. CSV columns: `kind,offset_ms,value`
/// where `kind` is `angle` or `force`. Timestamps are re-based on the time of
/// the last restart.
#[derive(Debug, Clone)]
pub struct ReplayFeed {
    rows: Vec<ReplayRow>,
    cursor: usize,
    started_at: Option<i64>,
}

impl ReplayFeed {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, FeedError> {
        let reader = csv::Reader::from_path(path)?;
        Self::from_csv(reader)
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, FeedError> {
        Self::from_csv(csv::Reader::from_reader(rdr))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, FeedError> {
        let mut rows = reader
            .deserialize()
            .collect::<Result<Vec<ReplayRow>, csv::Error>>()?;
        if rows.is_empty() {
            return Err(FeedError::Empty);
        }
        rows.sort_by_key(|r| r.offset_ms);
        Ok(Self {
            rows,
            cursor: 0,
            started_at: None,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.rows.len()
    }
}

impl SampleFeed for ReplayFeed {
    fn restart(&mut self, now_ms: i64) {
        self.cursor = 0;
        self.started_at = Some(now_ms);
    }

    fn poll(&mut self, now_ms: i64, _view: &SessionView) -> Vec<SessionEvent> {
        let Some(start) = self.started_at else {
            return Vec::new();
        };

        let mut events = Vec::new();
        while let Some(row) = self.rows.get(self.cursor) {
            let timestamp = start + row.offset_ms;
            if timestamp > now_ms {
                break;
            }
            let sample = Sample::new(timestamp, row.value);
            events.push(match row.kind {
                Channel::Angle => SessionEvent::Angle(sample),
                Channel::Force => SessionEvent::Force(sample),
            });
            self.cursor += 1;
        }
        events
    }
}
