use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};
use tracing::debug;

use crate::aggregate::SessionRecord;
use crate::clock::Clock;
use crate::feed::SampleFeed;
use crate::session::{MeasurementSession, SessionEvent};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    Session(SessionEvent),
}

/// Source of application events (keyboard, resize, pushed samples)
pub trait AppEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if tx.send(AppEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(AppEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AppEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Event source fed through a channel; used by headless drivers and tests,
/// and by anything that pushes samples from another thread.
pub struct ChannelEventSource {
    rx: Receiver<AppEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }

    pub fn pair() -> (Sender<AppEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl AppEventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// What a call to [`Runner::pump`] produced for the caller.
#[derive(Debug)]
pub enum Pumped {
    /// A key the session does not interpret; the caller maps it.
    Key(KeyEvent),
    Resize,
    /// The event was applied to the session.
    Handled,
    Finished(SessionRecord),
}

/// Runner that advances the application one event/tick at a time.
///
/// It is the only caller of [`MeasurementSession::handle`], through
/// [`pump`](Self::pump) and [`dispatch`](Self::dispatch), so samples, ticks
/// and triggers reach the session strictly one after another.
pub struct Runner<E: AppEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    feeds: Vec<Box<dyn SampleFeed>>,
    feed_generation: Option<u64>,
}

impl<E: AppEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
            feeds: Vec::new(),
            feed_generation: None,
        }
    }

    pub fn with_feed(mut self, feed: Box<dyn SampleFeed>) -> Self {
        self.feeds.push(feed);
        self
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> AppEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => AppEvent::Tick,
        }
    }

    /// Restart every feed if the session started over since we last looked.
    pub fn sync_feeds<C: Clock>(&mut self, session: &MeasurementSession<C>) {
        let generation = session.generation();
        if self.feed_generation == Some(generation) {
            return;
        }
        let now = session.now_ms();
        for feed in &mut self.feeds {
            feed.restart(now);
        }
        debug!(generation, feeds = self.feeds.len(), "feeds restarted");
        self.feed_generation = Some(generation);
    }

    /// Apply an event that did not come from the event source, such as a
    /// trigger mapped from a key the caller received from [`pump`](Self::pump).
    pub fn dispatch<C: Clock>(
        &mut self,
        session: &mut MeasurementSession<C>,
        event: SessionEvent,
    ) -> Option<SessionRecord> {
        let finished = session.handle(event);
        self.sync_feeds(session);
        finished
    }

    /// Take one event from the source and apply it. On a tick, the attached
    /// feeds are polled first and their samples applied before the tick itself.
    pub fn pump<C: Clock>(&mut self, session: &mut MeasurementSession<C>) -> Pumped {
        self.sync_feeds(session);

        let finished = match self.step() {
            AppEvent::Key(key) => return Pumped::Key(key),
            AppEvent::Resize => return Pumped::Resize,
            AppEvent::Session(event) => session.handle(event),
            AppEvent::Tick => {
                let now = session.now_ms();
                let view = session.view();
                let mut finished = None;
                for feed in &mut self.feeds {
                    for event in feed.poll(now, &view) {
                        finished = finished.or(session.handle(event));
                    }
                }
                finished.or(session.handle(SessionEvent::Tick))
            }
        };

        self.sync_feeds(session);
        match finished {
            Some(record) => Pumped::Finished(record),
            None => Pumped::Handled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::LogNotifier;
    use crate::sample::Sample;
    use crate::session::{SessionConfig, Trigger};
    use crate::step::SessionStep;
    use assert_matches::assert_matches;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, es) = ChannelEventSource::pair();
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let runner = Runner::new(es, ticker);

        // With no events available, step should yield Tick
        assert_matches!(runner.step(), AppEvent::Tick);
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, es) = ChannelEventSource::pair();
        tx.send(AppEvent::Resize).unwrap();
        let ticker = FixedTicker::new(Duration::from_millis(10));
        let runner = Runner::new(es, ticker);

        assert_matches!(runner.step(), AppEvent::Resize);
    }

    #[test]
    fn pump_applies_session_events() {
        let (tx, es) = ChannelEventSource::pair();
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(5)));
        let mut session = MeasurementSession::new(
            SessionConfig::default(),
            ManualClock::new(0),
            Box::new(LogNotifier),
        );

        tx.send(AppEvent::Session(SessionEvent::Angle(Sample::new(0, 7.0))))
            .unwrap();
        tx.send(AppEvent::Session(SessionEvent::Trigger(Trigger::Advance)))
            .unwrap();

        assert_matches!(runner.pump(&mut session), Pumped::Handled);
        assert_matches!(runner.pump(&mut session), Pumped::Handled);
        assert_eq!(session.rom().initial, Some(7.0));
        assert_eq!(session.step(), SessionStep::BendToMax);
    }

    #[test]
    fn dispatch_restarts_feeds_after_session_ends() {
        let (_tx, es) = ChannelEventSource::pair();
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(1)));
        let mut session = MeasurementSession::new(
            SessionConfig::default(),
            ManualClock::new(0),
            Box::new(LogNotifier),
        );
        runner.sync_feeds(&session);
        assert_eq!(runner.feed_generation, Some(session.generation()));

        let advance = SessionEvent::Trigger(Trigger::Advance);
        assert!(runner.dispatch(&mut session, advance).is_none());
        assert_eq!(session.step(), SessionStep::BendToMax);

        session.restart();
        runner.dispatch(&mut session, SessionEvent::Tick);
        assert_eq!(runner.feed_generation, Some(session.generation()));
    }
}
