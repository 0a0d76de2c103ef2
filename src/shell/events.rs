//! Event-loop shell
//!
//! Input lines arrive on a channel from a reader task. Collaborator work runs
//! in a [`TaskSlot`] and its results are collected on a fixed tick, so the loop
//! never waits on the network or the microphone. While a task is in flight,
//! new messages and voice requests are dropped.
//!
//! Commands: `/voice`, `/speak`, `/reload`, `/clear`, `/status`.

use std::io::Write;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::is_exit_command;
use crate::config::MAX_COMPLETION_TOKENS;
use crate::session::{Session, SessionManager, capture_utterance, speak_best_effort};
use crate::worker::{Completion, TaskSlot};
use crate::{Error, Result};

/// How often finished background work is collected
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Work handed to the background slot
enum Job {
    /// Assistant reply to the submitted history
    Reply(Result<String>),
    /// Transcript of a recorded clip
    Heard(Result<String>),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

struct EventShell<'a, W> {
    manager: &'a mut SessionManager,
    session: Session,
    slot: TaskSlot<Job>,
    speech: JoinSet<()>,
    out: &'a mut W,
}

/// Run the event-loop shell until an exit command or end of input
///
/// Any in-flight task is allowed to finish before the session ends.
///
/// # Errors
///
/// Returns error if the session cannot be started, the history log cannot be
/// written, or output fails
pub async fn run_events<R, W>(manager: &mut SessionManager, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: Write,
{
    let session = manager.start_default_session()?;
    let mut shell = EventShell {
        manager,
        session,
        slot: TaskSlot::new(),
        speech: JoinSet::new(),
        out,
    };

    let (line_tx, mut line_rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn(async move {
        let mut lines = input.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    writeln!(
        shell.out,
        "John is ready (model: {}). Commands: /voice /speak /reload /clear /status, 'exit' to quit.",
        shell.manager.model()
    )?;

    let mut tick = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            line = line_rx.recv() => {
                let Some(line) = line else { break };
                if shell.handle_input(&line)? == Flow::Exit {
                    break;
                }
            }
            _ = tick.tick() => {
                while let Some(completion) = shell.slot.poll() {
                    shell.complete(completion)?;
                }
            }
        }
    }

    reader.abort();
    shell.finish().await
}

impl<W: Write> EventShell<'_, W> {
    fn handle_input(&mut self, line: &str) -> Result<Flow> {
        let text = line.trim();
        if is_exit_command(text) {
            return Ok(Flow::Exit);
        }

        match text {
            "" => {}
            "/voice" => self.start_listening()?,
            "/speak" => {
                let speak = !self.manager.speak();
                self.manager.set_speak(speak);
                writeln!(self.out, "[Speech: {}]", on_off(speak))?;
            }
            "/reload" => self.reload()?,
            "/clear" => {
                if self.slot.is_busy() {
                    writeln!(self.out, "[Busy, try again when the reply arrives]")?;
                } else {
                    self.manager.clear(&mut self.session)?;
                    writeln!(self.out, "[Chat history cleared]")?;
                }
            }
            "/status" => writeln!(
                self.out,
                "[Model: {} | Speech: {} | Messages: {} | {}]",
                self.manager.model(),
                on_off(self.manager.speak()),
                self.session.len(),
                if self.slot.is_busy() { "Thinking..." } else { "Ready" }
            )?,
            _ => self.send(text)?,
        }

        Ok(Flow::Continue)
    }

    /// Append a user turn and hand the reply request to the slot
    fn send(&mut self, text: &str) -> Result<()> {
        if self.slot.is_busy() {
            writeln!(self.out, "[Busy, message dropped]")?;
            return Ok(());
        }

        match self.manager.append_user_turn(&mut self.session, text) {
            Ok(()) => {}
            Err(e @ Error::Validation(_)) => {
                writeln!(self.out, "[Error] {e}")?;
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        self.manager.trim(&mut self.session);

        let (chat, model) = self.manager.chat_handle();
        let snapshot = self.session.messages().to_vec();
        self.slot.submit(async move {
            Job::Reply(chat.complete(&snapshot, &model, MAX_COMPLETION_TOKENS).await)
        });
        Ok(())
    }

    fn start_listening(&mut self) -> Result<()> {
        if self.slot.is_busy() {
            writeln!(self.out, "[Busy, voice request dropped]")?;
            return Ok(());
        }

        let (recorder, transcriber, duration) = self.manager.voice_handles();
        writeln!(self.out, "[Recording for {} seconds...]", duration.as_secs())?;
        self.slot.submit(async move {
            Job::Heard(capture_utterance(recorder.as_ref(), transcriber.as_ref(), duration).await)
        });
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        if self.slot.is_busy() {
            writeln!(self.out, "[Busy, try again when the reply arrives]")?;
            return Ok(());
        }

        match self.manager.reload(&self.session) {
            Ok(settings) => writeln!(
                self.out,
                "[Config reloaded | Model: {} | Speech: {}]",
                settings.model,
                on_off(settings.speak)
            )?,
            Err(e) => {
                tracing::warn!(error = %e, "reload failed, keeping previous configuration");
                writeln!(self.out, "[Failed to reload config: {e}]")?;
            }
        }
        Ok(())
    }

    fn complete(&mut self, completion: Completion<Job>) -> Result<()> {
        match completion {
            Completion::Done(Job::Reply(Ok(reply))) => {
                self.manager
                    .append_assistant_turn(&mut self.session, &reply)?;
                writeln!(self.out, "John: {reply}")?;

                if let Some(speech) = self.manager.speech_handle() {
                    self.speech.spawn(async move {
                        speak_best_effort(speech.as_ref(), &reply).await;
                    });
                }
            }
            Completion::Done(Job::Heard(Ok(heard))) => {
                writeln!(self.out, "You (voice): {heard}")?;
                self.send(&heard)?;
            }
            Completion::Done(Job::Reply(Err(e)) | Job::Heard(Err(e))) => {
                tracing::warn!(error = %e, "background task failed");
                writeln!(self.out, "[Error] {e}")?;
            }
            Completion::Failed(reason) => {
                tracing::error!(reason = %reason, "background task aborted");
                writeln!(self.out, "[Error] {reason}")?;
            }
        }
        Ok(())
    }

    /// Let in-flight work land, wait for speech, then end the session
    async fn finish(mut self) -> Result<()> {
        while let Some(completion) = self.slot.wait().await {
            self.complete(completion)?;
        }
        while self.speech.join_next().await.is_some() {}

        self.manager.end_session(&mut self.session)?;
        writeln!(self.out, "Goodbye.")?;
        Ok(())
    }
}

const fn on_off(flag: bool) -> &'static str {
    if flag { "ON" } else { "OFF" }
}
