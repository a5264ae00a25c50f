pub mod charting;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph, Widget, Wrap},
    Frame,
};
use rightangle::{notify::Severity, SessionStep};

use crate::App;
use charting::{compute_chart_params, force_coords, format_delta, format_label};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

pub fn draw(app: &App, f: &mut Frame) {
    screen::current_screen(&app.state).render(app, f);
}

fn angle_label(angle: Option<f64>) -> String {
    match angle {
        Some(a) => format!("{a:.1}°"),
        None => "--".to_string(),
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let view = self.session.view();
        let instruction = view
            .step
            .instruction(view.mode, self.session.config().countdown_secs);

        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
        let yellow_bold_style = Style::default().patch(bold_style).fg(Color::Yellow);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints(
                [
                    Constraint::Length(1), // progress
                    Constraint::Length(2), // title
                    Constraint::Length(4), // instruction text
                    Constraint::Length(2), // readings
                    Constraint::Min(6),    // chart / countdown
                    Constraint::Length(2), // action
                    Constraint::Length(self.toasts.len().min(3) as u16 * 2), // toasts
                ]
                .as_ref(),
            )
            .split(area);

        Gauge::default()
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(view.step_index() as f64 / SessionStep::ALL.len() as f64)
            .label(format!("Step {} of {}", view.step_index(), SessionStep::ALL.len()))
            .render(chunks[0], buf);

        Paragraph::new(Span::styled(instruction.title, bold_style))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        Paragraph::new(instruction.text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[2], buf);

        let readings = Line::from(vec![
            Span::raw("Current angle: "),
            Span::styled(angle_label(view.live_rom), bold_style),
            Span::raw("   Max: "),
            Span::styled(angle_label(view.rom.max), bold_style),
        ]);
        Paragraph::new(readings)
            .alignment(Alignment::Center)
            .render(chunks[3], buf);

        if view.step == SessionStep::StrengthSetup {
            let coords = force_coords(&view.capture_samples, self.session.capture().start_time());
            let window_secs = self.session.config().capture_duration_ms as f64 / 1000.0;
            let (x_max, y_max) = compute_chart_params(&coords, window_secs);

            let datasets = vec![Dataset::default()
                .marker(symbols::Marker::Braille)
                .style(Style::default().fg(Color::Magenta))
                .graph_type(GraphType::Line)
                .data(&coords)];

            let title = match view.countdown {
                Some(secs) => format!(" PUSH! {secs} "),
                None => " Force (lbs) ".to_string(),
            };

            Chart::new(datasets)
                .block(Block::default().borders(Borders::ALL).title(title))
                .x_axis(
                    Axis::default()
                        .title("seconds")
                        .bounds([0.0, x_max])
                        .labels(vec![
                            Span::styled("0", dim_style),
                            Span::styled(format_label(x_max), dim_style),
                        ]),
                )
                .y_axis(
                    Axis::default()
                        .title("lbs")
                        .bounds([0.0, y_max])
                        .labels(vec![
                            Span::styled("0", dim_style),
                            Span::styled(format_label(y_max), dim_style),
                        ]),
                )
                .render(chunks[4], buf);
        }

        let action = match (view.primary_action, view.countdown) {
            (None, Some(secs)) => Span::styled(format!("Hold... ({secs}s)"), yellow_bold_style),
            (None, None) => Span::styled("...", dim_style),
            (Some(_), _) => Span::styled(
                format!("[Enter] {}    [Esc] quit", instruction.action),
                green_bold_style,
            ),
        };
        Paragraph::new(action)
            .alignment(Alignment::Center)
            .render(chunks[5], buf);

        render_toasts(self, chunks[6], buf);
    }
}

fn render_toasts(app: &App, area: Rect, buf: &mut Buffer) {
    if area.height == 0 {
        return;
    }
    let lines: Vec<Line> = app
        .toasts
        .iter()
        .rev()
        .take(3)
        .flat_map(|t| {
            let color = match t.notification.severity {
                Severity::Info => Color::Blue,
                Severity::Success => Color::Green,
            };
            [
                Line::from(Span::styled(
                    t.notification.title.clone(),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::raw(t.notification.message.clone())),
            ]
        })
        .collect();

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

pub fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);
    let green_style = Style::default().fg(Color::Green);
    let red_style = Style::default().fg(Color::Red);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([Constraint::Min(1), Constraint::Length(2)].as_ref())
        .split(area);

    let mut lines = Vec::new();
    match &app.last_record {
        Some(record) => {
            let result = &record.result;
            let heading = if record.mode.is_baseline() {
                "Baseline saved"
            } else {
                "Test complete"
            };
            lines.push(Line::from(Span::styled(heading, bold_style)));
            lines.push(Line::default());
            lines.push(Line::from(format!("Range of motion: {}°", format_label(result.rom))));
            lines.push(Line::from(format!(
                "Max force: {} lbs",
                format_label(result.strength.max)
            )));
            lines.push(Line::from(format!(
                "Avg force: {} lbs",
                format_label(result.strength.avg)
            )));
            lines.push(Line::from(format!(
                "Samples: {} ({} in window)",
                result.samples.len(),
                result.samples.iter().filter(|s| s.relevant).count()
            )));
        }
        None => lines.push(Line::from("No result")),
    }

    if let Some(progress) = app.progress() {
        let styled = |delta: f64, unit: &str| {
            let style = if delta < 0.0 { red_style } else { green_style };
            Span::styled(format_delta(delta, unit), style)
        };
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Compared to baseline", bold_style)));
        lines.push(Line::from(vec![
            Span::raw("ROM "),
            styled(progress.rom_delta, "°"),
            Span::raw("   Max "),
            styled(progress.max_force_delta, " lbs"),
            Span::raw("   Avg "),
            styled(progress.avg_force_delta, " lbs"),
        ]));
    }

    if let Some(err) = &app.store_error {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Result not saved: {err}"),
            red_style,
        )));
    }

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[0], buf);

    Paragraph::new(Span::styled("(n)ew session / (q)uit", italic_style))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);
}
