use chrono::{TimeZone, Utc};
use tracing::{debug, info};

use crate::aggregate::{aggregate, SessionRecord, SessionResult};
use crate::capture::{CaptureWindow, Offer};
use crate::clock::Clock;
use crate::notify::{Notification, Notifier};
use crate::rom::RomTrack;
use crate::sample::Sample;
use crate::step::{SessionMode, SessionStep};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub mode: SessionMode,
    pub fallback_rom_deg: f64,
    pub capture_duration_ms: i64,
    pub countdown_secs: u32,
    /// Clamp the capture end to its scheduled time when the countdown fires late.
    pub strict_window: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Regular,
            fallback_rom_deg: 90.0,
            capture_duration_ms: 3000,
            countdown_secs: 3,
            strict_window: false,
        }
    }
}

/// Operator actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Trigger {
    Advance,
    StartCapture,
    EndSession,
}

/// Everything the session reacts to. All of it goes through
/// [`MeasurementSession::handle`], one event at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    Angle(Sample),
    Force(Sample),
    Tick,
    Trigger(Trigger),
}

/// Read-only snapshot for a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub mode: SessionMode,
    pub step: SessionStep,
    pub live_rom: Option<f64>,
    pub rom: RomTrack,
    pub countdown: Option<u32>,
    pub capturing: bool,
    pub capture_available: bool,
    pub primary_action: Option<Trigger>,
    pub capture_samples: Vec<Sample>,
}

impl SessionView {
    pub fn step_index(&self) -> u8 {
        self.step.index()
    }
}

/// The measurement session controller.
///
/// Owns the step, the ROM track and the capture window; nothing else mutates
/// them. A finished session is returned from [`handle`](Self::handle) and the
/// controller is immediately back in `Preparation`.
pub struct MeasurementSession<C: Clock> {
    config: SessionConfig,
    clock: C,
    notifier: Box<dyn Notifier>,
    step: SessionStep,
    rom: RomTrack,
    live_rom: Option<f64>,
    capture: CaptureWindow,
    generation: u64,
}

impl<C: Clock> MeasurementSession<C> {
    pub fn new(config: SessionConfig, clock: C, notifier: Box<dyn Notifier>) -> Self {
        let mut session = Self {
            config,
            clock,
            notifier,
            step: SessionStep::Preparation,
            rom: RomTrack::default(),
            live_rom: None,
            capture: CaptureWindow::default(),
            generation: 0,
        };
        session.restart();
        session
    }

    /// Back to `Preparation` with empty state. Any running countdown and
    /// capture window are dropped. Bumps [`generation`](Self::generation) so
    /// feeds know to restart from empty history.
    pub fn restart(&mut self) {
        self.step = SessionStep::Preparation;
        self.rom = RomTrack::default();
        self.live_rom = None;
        self.capture = CaptureWindow::default();
        self.generation += 1;
        info!(
            mode = %self.config.mode,
            generation = self.generation,
            "measurement session started"
        );
    }

    pub fn handle(&mut self, event: SessionEvent) -> Option<SessionRecord> {
        match event {
            SessionEvent::Angle(sample) => {
                self.on_angle(sample);
                None
            }
            SessionEvent::Force(sample) => {
                self.on_force(sample);
                None
            }
            SessionEvent::Tick => {
                self.on_tick();
                None
            }
            SessionEvent::Trigger(trigger) => {
                // An expired countdown wins; the pressed trigger is dropped.
                let before = self.step;
                self.on_tick();
                if self.step != before {
                    debug!(
                        %trigger,
                        from = %before,
                        to = %self.step,
                        "trigger superseded by countdown expiry"
                    );
                    return None;
                }
                self.on_trigger(trigger)
            }
        }
    }

    fn on_angle(&mut self, sample: Sample) {
        self.live_rom = Some(sample.value);
        self.rom = self.rom.track(self.step, sample.value);
    }

    fn on_force(&mut self, sample: Sample) {
        match self.capture.offer(sample) {
            Offer::Accepted | Offer::Inactive => {}
            rejected => debug!(
                timestamp = sample.timestamp,
                value = sample.value,
                ?rejected,
                "force sample not captured"
            ),
        }
    }

    fn on_tick(&mut self) {
        if self.step != SessionStep::StrengthSetup {
            return;
        }
        let now = self.clock.now_ms();
        if self.capture.tick(now, self.config.strict_window) {
            self.step = SessionStep::CompleteRom;
            info!(
                captured = self.capture.samples().len(),
                end_time = ?self.capture.end_time(),
                "strength capture complete"
            );
            self.notifier.notify(&Notification::success(
                "Strength Test Complete",
                "Data captured. Continue ROM measurement.",
            ));
        }
    }

    fn on_trigger(&mut self, trigger: Trigger) -> Option<SessionRecord> {
        let capturing = self.capture.is_active();
        match (self.step, trigger) {
            (SessionStep::Preparation, Trigger::Advance) => {
                self.enter(SessionStep::BendToMax);
                self.notifier.notify(&Notification::info(
                    "Step 2",
                    "Continue bending your arm to maximum comfortable angle.",
                ));
            }
            (SessionStep::BendToMax, Trigger::Advance) => {
                self.enter(SessionStep::StrengthSetup);
                self.notifier.notify(&Notification::info(
                    "Step 3",
                    "Lock the brace at your maximum angle and prepare for strength test.",
                ));
            }
            (SessionStep::StrengthSetup, Trigger::StartCapture) => {
                let now = self.clock.now_ms();
                if capturing {
                    info!("strength capture restarted, previous window discarded");
                }
                self.capture.start(
                    now,
                    self.config.capture_duration_ms,
                    self.config.countdown_secs,
                );
                info!(start_time = now, "strength capture started");
                self.notifier.notify(&Notification::info(
                    "Strength Test Started!",
                    format!(
                        "Push against the brace with maximum force for {} seconds.",
                        self.config.countdown_secs
                    ),
                ));
            }
            (SessionStep::CompleteRom, Trigger::Advance) => {
                self.enter(SessionStep::Finalize);
                self.notifier.notify(&Notification::info(
                    "Final Step",
                    "Complete the ROM measurement and finalize.",
                ));
            }
            (SessionStep::Finalize, Trigger::EndSession) => return Some(self.finish()),
            (step, trigger) => {
                debug!(%step, %trigger, capturing, "ignoring trigger not valid in this step");
            }
        }
        None
    }

    fn enter(&mut self, step: SessionStep) {
        info!(from = %self.step, to = %step, "step transition");
        self.step = step;
    }

    fn finish(&mut self) -> SessionRecord {
        let now = self.clock.now_ms();
        let result = aggregate(
            &self.rom,
            self.live_rom,
            &self.capture,
            self.config.fallback_rom_deg,
        );
        let mode = self.config.mode;
        info!(
            %mode,
            rom = result.rom,
            max = result.strength.max,
            avg = result.strength.avg,
            samples = result.samples.len(),
            "measurement session ended"
        );
        self.notifier.notify(&end_notification(mode, &result));

        let recorded_at = Utc
            .timestamp_millis_opt(now)
            .single()
            .unwrap_or_else(Utc::now);
        self.restart();

        SessionRecord {
            mode,
            recorded_at,
            result,
        }
    }

    /// The one trigger the current step accepts, if any.
    pub fn primary_action(&self) -> Option<Trigger> {
        match self.step {
            SessionStep::Preparation | SessionStep::BendToMax | SessionStep::CompleteRom => {
                Some(Trigger::Advance)
            }
            SessionStep::StrengthSetup if !self.capture.is_active() => Some(Trigger::StartCapture),
            SessionStep::StrengthSetup => None,
            SessionStep::Finalize => Some(Trigger::EndSession),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            mode: self.config.mode,
            step: self.step,
            live_rom: self.live_rom,
            rom: self.rom,
            countdown: self.capture.remaining_secs(),
            capturing: self.capture.is_active(),
            capture_available: self.primary_action() == Some(Trigger::StartCapture),
            primary_action: self.primary_action(),
            capture_samples: self.capture.samples().to_vec(),
        }
    }

    pub fn step(&self) -> SessionStep {
        self.step
    }

    pub fn rom(&self) -> &RomTrack {
        &self.rom
    }

    pub fn capture(&self) -> &CaptureWindow {
        &self.capture
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Incremented on every restart.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}

fn end_notification(mode: SessionMode, result: &SessionResult) -> Notification {
    let rom = result.rom;
    let avg = result.strength.avg;
    match mode {
        SessionMode::Baseline => Notification::success(
            "Baseline Saved!",
            format!("Baseline ROM: {rom}°, Avg Force: {avg} lbs. Saved."),
        ),
        SessionMode::Regular => Notification::success(
            "Test Ended!",
            format!("Test Ended! ROM: {rom}°, Avg Strength: {avg} lbs. Results saved."),
        ),
    }
}
