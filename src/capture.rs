use std::collections::HashSet;

use crate::sample::Sample;

const COUNTDOWN_STEP_MS: i64 = 1000;

/// What happened to a force sample offered to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    Inactive,
    OutOfWindow,
    Duplicate,
}

/// Whole-second countdown driving the automatic end of a capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Countdown {
    remaining: u32,
    next_step_at: i64,
}

impl Countdown {
    fn start(now: i64, secs: u32) -> Self {
        Self {
            remaining: secs,
            next_step_at: now + COUNTDOWN_STEP_MS,
        }
    }

    /// Consume every whole second that has elapsed by `now`.
    fn advance(&mut self, now: i64) {
        while self.remaining > 0 && now >= self.next_step_at {
            self.remaining -= 1;
            self.next_step_at += COUNTDOWN_STEP_MS;
        }
    }
}

/// Time-boxed buffer of force samples for the strength test.
///
/// Only one window exists per session; starting it again throws away the
/// previous interval and buffer.
#[derive(Debug, Clone, Default)]
pub struct CaptureWindow {
    active: bool,
    start_time: Option<i64>,
    end_time: Option<i64>,
    buffer: Vec<Sample>,
    seen: HashSet<i64>,
    countdown: Countdown,
}

impl CaptureWindow {
    /// Open a fresh window `[now, now + duration_ms]` and arm the countdown.
    pub fn start(&mut self, now: i64, duration_ms: i64, countdown_secs: u32) {
        self.buffer.clear();
        self.seen.clear();
        self.start_time = Some(now);
        self.end_time = Some(now + duration_ms);
        self.active = true;
        self.countdown = Countdown::start(now, countdown_secs);
    }

    /// Buffer a force sample if the window is open, the timestamp lies inside
    /// the interval, and no sample with that timestamp is buffered yet.
    pub fn offer(&mut self, sample: Sample) -> Offer {
        if !self.active {
            return Offer::Inactive;
        }
        if !self.contains(sample.timestamp) {
            return Offer::OutOfWindow;
        }
        if !self.seen.insert(sample.timestamp) {
            return Offer::Duplicate;
        }
        self.buffer.push(sample);
        Offer::Accepted
    }

    /// Advance the countdown. Returns true exactly once per capture: on the
    /// call that sees it reach zero and closes the window.
    ///
    /// On expiry the interval end moves to `now`, so a late timer stretches
    /// the window past its nominal length. With `strict` set the end is
    /// clamped to the scheduled end instead.
    pub fn tick(&mut self, now: i64, strict: bool) -> bool {
        if !self.active {
            return false;
        }
        self.countdown.advance(now);
        if self.countdown.remaining > 0 {
            return false;
        }
        self.close(now, strict);
        true
    }

    /// Close the window without waiting for the countdown.
    pub fn close(&mut self, now: i64, strict: bool) {
        self.end_time = match (self.end_time, strict) {
            (Some(end), true) => Some(end.min(now)),
            _ => Some(now),
        };
        self.countdown.remaining = 0;
        self.active = false;
    }

    /// Whether `timestamp` lies in the closed interval `[start, end]`.
    pub fn contains(&self, timestamp: i64) -> bool {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => start <= timestamp && timestamp <= end,
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<i64> {
        self.end_time
    }

    /// Seconds left on the countdown while a capture is running.
    pub fn remaining_secs(&self) -> Option<u32> {
        self.active.then_some(self.countdown.remaining)
    }

    /// Buffered samples in order of first observation.
    pub fn samples(&self) -> &[Sample] {
        &self.buffer
    }
}
