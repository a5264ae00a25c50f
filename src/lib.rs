// Library surface for the binary and for headless integration tests.
// Types that only the TUI needs stay in main.rs.
pub mod aggregate;
pub mod app_dirs;
pub mod capture;
pub mod clock;
pub mod config;
pub mod feed;
pub mod notify;
pub mod rom;
pub mod runtime;
pub mod sample;
pub mod session;
pub mod step;
pub mod store;
pub mod util;

pub use aggregate::{SessionRecord, SessionResult, StrengthSummary};
pub use session::{MeasurementSession, SessionConfig, SessionEvent, SessionView, Trigger};
pub use step::{SessionMode, SessionStep};
