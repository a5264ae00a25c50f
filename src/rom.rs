use serde::{Deserialize, Serialize};

use crate::step::SessionStep;

/// Range-of-motion slots derived from the angle stream. No history is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RomTrack {
    pub initial: Option<f64>,
    pub max: Option<f64>,
    pub r#final: Option<f64>,
}

impl RomTrack {
    /// Fold one angle reading into the track, gated by the step it arrived in.
    ///
    /// - `Preparation`: the first reading becomes `initial`, later ones are ignored.
    /// - `BendToMax`, `StrengthSetup`, `CompleteRom`: raise `max`.
    /// - `Finalize`: `final` is overwritten by every reading.
    pub fn track(mut self, step: SessionStep, angle: f64) -> Self {
        if step.tracks_max() {
            self.max = Some(self.max.map_or(angle, |m| m.max(angle)));
        } else if step == SessionStep::Preparation {
            self.initial.get_or_insert(angle);
        } else {
            self.r#final = Some(angle);
        }
        self
    }
}
