mod ui;

use std::{
    collections::VecDeque,
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant},
};

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use itertools::Itertools;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rightangle::{
    aggregate::Progress,
    app_dirs::AppDirs,
    clock::SystemClock,
    config::{Config, ConfigStore, FileConfigStore},
    feed::{ReplayFeed, SampleFeed, SimulatedDevice},
    notify::{Notification, QueueNotifier},
    runtime::{AppEventSource, CrosstermEventSource, FixedTicker, Pumped, Runner, Ticker},
    store::{ResultsStore, SqliteResultsStore},
    MeasurementSession, SessionConfig, SessionEvent, SessionMode, SessionRecord,
};

const TOAST_TTL: Duration = Duration::from_secs(4);

/// guided range-of-motion and strength measurement for a wearable brace
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Walks you through a five-step range-of-motion and strength measurement \
                  with a wearable joint brace, then stores the result as a new measurement \
                  or as your baseline."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,

    /// record this session as the new baseline instead of a regular measurement
    #[clap(short = 'b', long)]
    baseline: bool,

    /// replay a recorded `kind,offset_ms,value` CSV instead of the simulated brace
    #[clap(short = 'r', long)]
    replay: Option<PathBuf>,

    /// results database to use
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// ROM in degrees reported when a session saw no angle data
    #[clap(long)]
    fallback_rom: Option<f64>,

    /// clamp the capture window to its nominal length when the countdown fires late
    #[clap(long)]
    strict_window: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// print the stored baseline and recent measurements
    History {
        /// number of measurements to show
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
}

impl Cli {
    fn mode(&self) -> SessionMode {
        if self.baseline {
            SessionMode::Baseline
        } else {
            SessionMode::Regular
        }
    }

    /// File config with command line overrides applied
    fn resolve_config(&self, store: &impl ConfigStore) -> Config {
        let mut config = store.load();
        if let Some(rom) = self.fallback_rom {
            config.fallback_rom_deg = rom;
        }
        if self.strict_window {
            config.strict_window = true;
        }
        config
    }

    fn open_store(&self) -> Result<SqliteResultsStore, Box<dyn Error>> {
        let store = match &self.db {
            Some(path) => SqliteResultsStore::open(path)?,
            None => SqliteResultsStore::open_default()?,
        };
        Ok(store)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Measuring,
    Results,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub notification: Notification,
    pub shown_at: Instant,
}

pub struct App {
    pub session: MeasurementSession<SystemClock>,
    pub state: AppState,
    pub toasts: VecDeque<Toast>,
    pub last_record: Option<SessionRecord>,
    pub baseline: Option<SessionRecord>,
    pub store_error: Option<String>,
    notifier: QueueNotifier,
}

impl App {
    pub fn new(config: SessionConfig, baseline: Option<SessionRecord>) -> Self {
        let notifier = QueueNotifier::new();
        Self {
            session: MeasurementSession::new(
                config,
                SystemClock,
                Box::new(notifier.clone()),
            ),
            state: AppState::Measuring,
            toasts: VecDeque::new(),
            last_record: None,
            baseline,
            store_error: None,
            notifier,
        }
    }

    /// Move fresh notifications into the toast queue and expire old ones.
    pub fn collect_toasts(&mut self) {
        let now = Instant::now();
        for notification in self.notifier.drain() {
            self.toasts.push_back(Toast {
                notification,
                shown_at: now,
            });
        }
        self.toasts
            .retain(|t| now.duration_since(t.shown_at) < TOAST_TTL);
    }

    pub fn progress(&self) -> Option<Progress> {
        match (&self.baseline, &self.last_record) {
            (Some(baseline), Some(latest)) if latest.mode == SessionMode::Regular => {
                Some(Progress::against(&baseline.result, &latest.result))
            }
            _ => None,
        }
    }

    fn finish(&mut self, record: SessionRecord, store: &mut impl ResultsStore) {
        match store.record(&record) {
            Ok(_) => self.store_error = None,
            Err(e) => {
                error!(error = %e, "could not store session result");
                self.store_error = Some(e.to_string());
            }
        }
        if record.mode == SessionMode::Baseline {
            self.baseline = Some(record.clone());
        }
        self.last_record = Some(record);
        self.state = AppState::Results;
    }

    pub fn new_session(&mut self) {
        self.session.restart();
        self.state = AppState::Measuring;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RIGHTANGLE_LOG")
        .unwrap_or_else(|_| "rightangle=info".into());

    let file = AppDirs::log_path().and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    // The terminal belongs to the TUI; without a log file, stay silent.
    if let Some(file) = file {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    if let Some(Command::History { limit }) = cli.command {
        return print_history(&cli.open_store()?, limit);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config_store = FileConfigStore::new();
    if !config_store.path().exists() {
        if let Err(e) = config_store.save(&Config::default()) {
            warn!(
                path = %config_store.path().display(),
                error = %e,
                "could not write default config"
            );
        }
    }
    let config = cli.resolve_config(&config_store);
    let mut store = cli.open_store()?;
    let baseline = store.latest_baseline()?;

    let feed: Box<dyn SampleFeed> = match &cli.replay {
        Some(path) => Box::new(ReplayFeed::from_path(path)?),
        None => Box::new(SimulatedDevice::new(config.simulated_sample_ms)),
    };
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(config.tick_interval()),
    )
    .with_feed(feed);

    let mut app = App::new(config.session_config(cli.mode())?, baseline);
    info!(mode = %cli.mode(), replay = ?cli.replay, "starting measurement");

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut app, runner, &mut store);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    outcome
}

#[derive(Debug, PartialEq)]
enum KeyOutcome {
    Continue,
    Finished(SessionRecord),
    Quit,
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut runner: Runner<CrosstermEventSource, FixedTicker>,
    store: &mut SqliteResultsStore,
) -> Result<(), Box<dyn Error>> {
    loop {
        app.collect_toasts();
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.pump(&mut app.session) {
            Pumped::Key(key) => match on_key(app, &mut runner, key) {
                KeyOutcome::Continue => {}
                KeyOutcome::Finished(record) => app.finish(record, store),
                KeyOutcome::Quit => break,
            },
            Pumped::Finished(record) => app.finish(record, store),
            Pumped::Resize | Pumped::Handled => {}
        }
    }

    info!("exiting");
    Ok(())
}

/// Map a key press to the session. While measuring, only the current
/// step's action key does anything.
fn on_key<E: AppEventSource, T: Ticker>(
    app: &mut App,
    runner: &mut Runner<E, T>,
    key: KeyEvent,
) -> KeyOutcome {
    if key.code == KeyCode::Esc
        || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
    {
        return KeyOutcome::Quit;
    }

    match (&app.state, key.code) {
        (AppState::Measuring, KeyCode::Enter | KeyCode::Char(' ')) => {
            let finished = app.session.primary_action().and_then(|trigger| {
                runner.dispatch(&mut app.session, SessionEvent::Trigger(trigger))
            });
            match finished {
                Some(record) => KeyOutcome::Finished(record),
                None => KeyOutcome::Continue,
            }
        }
        (AppState::Results, KeyCode::Char('n')) => {
            app.new_session();
            KeyOutcome::Continue
        }
        (AppState::Results, KeyCode::Char('q')) => KeyOutcome::Quit,
        _ => KeyOutcome::Continue,
    }
}

fn print_history(store: &SqliteResultsStore, limit: usize) -> Result<(), Box<dyn Error>> {
    let baseline = store.latest_baseline()?;
    match &baseline {
        Some(b) => println!(
            "Baseline ({}): {}",
            b.recorded_at.format("%Y-%m-%d %H:%M"),
            summary(b)
        ),
        None => println!("No baseline recorded."),
    }

    let recent = store.recent_measurements(limit)?;
    if recent.is_empty() {
        println!("No measurements recorded.");
        return Ok(());
    }

    println!("Recent measurements:");
    for record in &recent {
        let mut line = format!(
            "  {}  {}",
            record.recorded_at.format("%Y-%m-%d %H:%M"),
            summary(record)
        );
        if let Some(b) = &baseline {
            let p = Progress::against(&b.result, &record.result);
            let deltas = [
                format!("ROM {:+}°", p.rom_delta),
                format!("max {:+} lbs", p.max_force_delta),
                format!("avg {:+} lbs", p.avg_force_delta),
            ];
            line.push_str(&format!("  (vs baseline: {})", deltas.iter().join(", ")));
        }
        println!("{line}");
    }
    Ok(())
}

fn summary(record: &SessionRecord) -> String {
    let r = &record.result;
    [
        format!("ROM {}°", r.rom),
        format!("max {} lbs", r.strength.max),
        format!("avg {} lbs", r.strength.avg),
        format!("{} samples", r.samples.len()),
    ]
    .iter()
    .join(" | ")
}
