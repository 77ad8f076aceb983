//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from application state ([`App`])
//! and input handling ([`crate::input`]).  Effects never touch the terminal:
//! they record into a [`DisplayList`](crate::gfx::DisplayList) and this
//! module shows it.
//!
//! ## For contributors
//!
//! * The layout is a two-row split: the matrix panel on top and a one-line
//!   status bar at the bottom.
//! * The matrix is centred inside its bordered block and clipped when the
//!   terminal is smaller than the panel.

use ratatui::{
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;
use crate::gfx::MatrixWidget;

/// Draw the complete UI for one frame.
pub fn draw(app: &App, frame: &mut Frame) {
    let [main_area, status_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_matrix(app, frame, main_area);
    draw_status_bar(app, frame, status_area);
}

/// Render the emulated panel.
fn draw_matrix(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(format!(" {} ", app.effect_name()))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (width, height) = MatrixWidget::size(app.frame());
    let [column] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(inner);
    let [panel] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(column);
    frame.render_widget(MatrixWidget::new(app.frame()), panel);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let (network, network_color) = if app.online() {
        ("online", Color::Green)
    } else {
        ("offline", Color::Red)
    };
    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(network, Style::default().fg(network_color)),
        Span::raw("  "),
        Span::styled(app.status(), Style::default().fg(Color::Yellow)),
        Span::raw("  q: quit  \u{2190}/\u{2192}: effect"),
    ]));
    frame.render_widget(status, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::Solid;
    use crate::config::DeviceConfig;
    use crate::connectivity::Connectivity;
    use arc_swap::ArcSwap;
    use chrono::Local;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use std::sync::Arc;
    use std::time::Instant;

    fn app(online: bool) -> App {
        let mut app = App::new(
            vec![Solid::boxed("clock", 60)],
            0,
            Arc::new(ArcSwap::from_pointee(DeviceConfig::default())),
            Connectivity::new(online),
        );
        app.tick(Instant::now(), Local::now());
        app
    }

    fn screen(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| draw(app, f)).unwrap();
        let buf = terminal.backend().buffer().clone();
        buf.content().iter().map(|c| c.symbol().chars().next().unwrap_or(' ')).collect()
    }

    #[test]
    fn draw_does_not_panic_on_a_tiny_terminal() {
        screen(&app(true), 10, 3);
    }

    #[test]
    fn draw_shows_effect_title_and_status() {
        let text = screen(&app(false), 80, 24);
        assert!(text.contains(" clock "), "block title names the effect");
        assert!(text.contains("offline"));
        assert!(text.contains("clock ok"));
    }

    #[test]
    fn matrix_is_centred_in_the_panel() {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let app = app(true);
        terminal.draw(|f| draw(&app, f)).unwrap();
        let buf = terminal.backend().buffer();

        // 78 columns inside the border leave 7 on either side of the matrix.
        let green = Color::Rgb(0, 255, 0);
        let (x, y) = (0..24u16)
            .flat_map(|y| (0..80u16).map(move |x| (x, y)))
            .find(|&p| buf[p].bg == green)
            .unwrap();
        assert_eq!(x, 8);
        assert!((3..=4).contains(&y));
        assert_eq!(buf[(x, y + 1)].symbol(), "c", "effect name on the second cell row");
        assert_eq!(buf[(x + 63, y + 15)].bg, green);
        assert_ne!(buf[(x + 64, y)].bg, green);
    }
}
