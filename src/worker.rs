//! Single-slot background task runner
//!
//! The event-loop shell hands long-running collaborator calls (chat replies,
//! recording, transcription) to a [`TaskSlot`]. At most one task is in flight;
//! a submission while busy is dropped, not queued. Results come back over a
//! queue that the loop drains on its own schedule, so all session state is
//! mutated from the loop alone.

use std::future::Future;

use tokio::sync::mpsc;

/// How a submitted task ended
#[derive(Debug, PartialEq, Eq)]
pub enum Completion<T> {
    /// The task ran to completion
    Done(T),
    /// The task panicked or was aborted
    Failed(String),
}

/// One in-flight task plus the queue its result is delivered on
#[derive(Debug)]
pub struct TaskSlot<T> {
    busy: bool,
    tx: mpsc::UnboundedSender<Completion<T>>,
    rx: mpsc::UnboundedReceiver<Completion<T>>,
}

impl<T: Send + 'static> TaskSlot<T> {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { busy: false, tx, rx }
    }

    /// Whether a task is outstanding
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Spawn `task` unless one is already running
    ///
    /// Returns `false` (and drops `task` unstarted) when busy.
    pub fn submit<F>(&mut self, task: F) -> bool
    where
        F: Future<Output = T> + Send + 'static,
    {
        if self.busy {
            tracing::debug!("task slot busy, submission dropped");
            return false;
        }

        self.busy = true;
        let tx = self.tx.clone();
        let handle = tokio::spawn(task);
        tokio::spawn(async move {
            let completion = match handle.await {
                Ok(value) => Completion::Done(value),
                Err(e) => Completion::Failed(e.to_string()),
            };
            // Receiver lives as long as the slot; a closed queue means nobody is listening
            let _ = tx.send(completion);
        });
        true
    }

    /// Take the finished task's result without waiting, freeing the slot
    pub fn poll(&mut self) -> Option<Completion<T>> {
        let completion = self.rx.try_recv().ok()?;
        self.busy = false;
        Some(completion)
    }

    /// Wait for the in-flight task to finish, freeing the slot
    ///
    /// Returns `None` immediately when idle.
    pub async fn wait(&mut self) -> Option<Completion<T>> {
        if !self.busy {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.busy = false;
        Some(completion)
    }
}

impl<T: Send + 'static> Default for TaskSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
