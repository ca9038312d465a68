//! Core event/render loop for the chat TUI.

use anyhow::Result;
use crossterm::event::{self, Event};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;

use crate::app::App;
use crate::ui::draw;

const IDLE_POLL: Duration = Duration::from_millis(100);
const BUSY_POLL: Duration = Duration::from_millis(50);

pub(crate) fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    // Initial render so the welcome screen shows immediately.
    terminal.draw(|frame| draw(frame, app))?;

    loop {
        let mut should_draw = app.poll();
        let busy = app.session.is_loading() || app.recorder.is_recording();
        if busy {
            // Streams and live capture animate the transcript and title.
            should_draw = true;
        }

        let poll_duration = if busy { BUSY_POLL } else { IDLE_POLL };
        let mut should_quit = false;
        if event::poll(poll_duration)? {
            match event::read()? {
                Event::Key(key) => {
                    should_quit = app.handle_key(key);
                    should_draw = true;
                }
                Event::Resize(_, _) => should_draw = true,
                _ => {}
            }
        }

        if should_draw {
            terminal.draw(|frame| draw(frame, app))?;
        }
        if should_quit {
            break;
        }
    }
    Ok(())
}
