//! Terminal UI module using ratatui.
//!
//! - `render`: session panel and overlays
//! - `input`: keyboard and mouse handling, activity forwarding
//! - `styles`: color scheme and text styling

pub mod input;
pub mod render;
pub mod styles;

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::app::App;

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

pub async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        app.sync();
        if app.should_quit() {
            return Ok(());
        }

        terminal.draw(|f| render::render(f, app))?;

        // Poll for events with timeout so session updates keep flowing
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            let event = event::read()?;
            if let Some(signal) = input::activity_signal(&event) {
                app.record(signal);
            }

            if let Event::Key(key) = event {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }
                input::handle_input(app, key).await;
            }
        }
    }
}
