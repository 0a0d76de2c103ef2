//! Sequential console loop
//!
//! Each turn blocks until the reply (and any speech playback) has finished.
//! With voice enabled, an empty line records a clip instead of sending text.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::is_exit_command;
use crate::session::SessionManager;
use crate::{Error, Result};

/// Run the console until an exit command or end of input
///
/// # Errors
///
/// Returns error if the session cannot be started, the history log cannot be
/// written, or input/output fails. Chat, transcription and validation
/// failures are reported inline and the loop continues.
pub async fn run_console<R, W>(
    manager: &mut SessionManager,
    input: R,
    out: &mut W,
    voice: bool,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut session = manager.start_default_session()?;
    let mut lines = input.lines();

    writeln!(out, "John is ready (model: {}). Type 'exit' to quit.", manager.model())?;
    if voice {
        writeln!(
            out,
            "Press Enter on an empty line to speak for {} seconds.",
            manager.config().voice.record_secs
        )?;
    }

    loop {
        write!(out, "You: ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        let text = line.trim();

        if is_exit_command(text) {
            break;
        }

        let outcome = if text.is_empty() {
            if !voice {
                continue;
            }
            writeln!(out, "[Recording for {} seconds...]", manager.config().voice.record_secs)?;
            manager.submit_voice(&mut session).await.map(|turn| {
                (Some(turn.user), turn.reply)
            })
        } else {
            manager.submit_text(&mut session, text).await.map(|reply| (None, reply))
        };

        match outcome {
            Ok((heard, reply)) => {
                if let Some(heard) = heard {
                    writeln!(out, "You (voice): {heard}")?;
                }
                writeln!(out, "John: {reply}")?;
            }
            Err(e @ (Error::Validation(_) | Error::Chat(_) | Error::Transcription(_) | Error::Audio(_))) => {
                tracing::warn!(error = %e, "turn failed");
                writeln!(out, "[Error] {e}")?;
            }
            Err(e) => return Err(e),
        }
    }

    manager.end_session(&mut session)?;
    writeln!(out, "Goodbye.")?;
    Ok(())
}
