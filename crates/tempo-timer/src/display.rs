use std::io::stdout;

use crossterm::execute;
use crossterm::terminal::SetTitle;
use tracing::debug;

/// Static label shown while no task is counting down.
pub const IDLE_TITLE: &str = "Tempo";

/// Ambient status display updated on every state change.
pub trait StatusDisplay: Send {
    fn update(&mut self, formatted: &str, idle: bool);
}

/// Writes the countdown into the terminal window title.
#[derive(Debug, Default)]
pub struct TerminalTitle;

impl StatusDisplay for TerminalTitle {
    fn update(&mut self, formatted: &str, idle: bool) {
        let title = if idle {
            IDLE_TITLE.to_string()
        } else {
            format!("{formatted} - {IDLE_TITLE}")
        };

        if let Err(err) = execute!(stdout(), SetTitle(title.as_str())) {
            debug!("set terminal title failed: {err}");
        }
    }
}
