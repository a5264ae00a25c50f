use ratatui::Frame;

use crate::{ui::render_results, App, AppState};

/// A UI Screen boundary
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Measurement screen - renders the step UI using the App widget
pub struct MeasuringScreen;

impl Screen for MeasuringScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(app, f.area());
    }
}

/// Results screen - summary of the finished session
pub struct ResultsScreen;

impl Screen for ResultsScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_results(app, f.area(), f.buffer_mut());
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Measuring => Box::new(MeasuringScreen),
        AppState::Results => Box::new(ResultsScreen),
    }
}
