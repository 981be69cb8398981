//! Single-shot, cancellable timer.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// A single-shot timer owned by exactly one object.
///
/// [`arm`](Self::arm) schedules a future to run once after a delay.
/// Arming again before it fires aborts the previous schedule
/// (last-writer-wins, no stacking). [`cancel`](Self::cancel) is
/// idempotent, and dropping the `Deadline` cancels it, so a timer can
/// never outlive its owner.
///
/// Must be armed from inside a Tokio runtime.
#[derive(Debug)]
pub struct Deadline {
    name: &'static str,
    task: Option<JoinHandle<()>>,
    due_at: Option<Instant>,
}

impl Deadline {
    /// `name` only labels log lines.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            task: None,
            due_at: None,
        }
    }

    /// Runs `fire` once, `after` from now, replacing any prior schedule.
    pub fn arm<F>(&mut self, after: Duration, fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        // Absolute deadline computed here, not when the task first runs.
        let due = Instant::now() + after;
        self.due_at = Some(due);
        self.task = Some(tokio::spawn(async move {
            time::sleep_until(due).await;
            fire.await;
        }));

        tracing::debug!(
            deadline = self.name,
            after_secs = after.as_secs(),
            "deadline armed"
        );
    }

    /// Aborts the pending schedule, if any. Safe to call when nothing is armed.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                tracing::debug!(deadline = self.name, "deadline cancelled");
            }
            task.abort();
        }
        self.due_at = None;
    }

    /// `true` while a schedule is pending and hasn't fired yet.
    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// When the pending schedule fires.
    pub fn due_at(&self) -> Option<Instant> {
        if self.is_armed() { self.due_at } else { None }
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.cancel();
    }
}
