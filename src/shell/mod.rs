//! Presentation shells
//!
//! Shells collect input, render output, and call into the
//! [`SessionManager`](crate::session::SessionManager). Nothing else.
//!
//! - [`run_console`]: sequential prompt loop, optionally voice-enabled
//! - [`run_events`]: event loop that keeps collaborator calls off the input path

mod console;
mod events;

pub use console::run_console;
pub use events::{POLL_INTERVAL, run_events};

/// Words that end an interactive session
const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", "q"];

/// Whether `input` asks to leave (case-insensitive, surrounding whitespace ignored)
#[must_use]
pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim();
    EXIT_COMMANDS.iter().any(|c| input.eq_ignore_ascii_case(c))
}
