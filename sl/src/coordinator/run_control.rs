//! RunControl - process-wide run state

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

/// State of the whole line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// Stages are cycling
    Running,
    /// Every color quota was reached
    Completed,
    /// An operator interrupt stopped the line
    Interrupted,
}

impl fmt::Display for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineState::Running => "running",
            LineState::Completed => "completed",
            LineState::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

/// Shared run flag, stopped once and never restarted
///
/// Cheap to clone. External watchers use [`RunControl::subscribe`] to learn
/// when and why the line stopped.
#[derive(Clone)]
pub struct RunControl {
    tx: Arc<watch::Sender<LineState>>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LineState::Running);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_running(&self) -> bool {
        *self.tx.borrow() == LineState::Running
    }

    pub fn state(&self) -> LineState {
        *self.tx.borrow()
    }

    /// Stop the line; only the first stop takes effect
    ///
    /// Returns true when this call performed the transition.
    pub fn stop(&self, reason: LineState) -> bool {
        if reason == LineState::Running {
            return false;
        }
        let changed = self.tx.send_if_modified(|state| {
            if *state == LineState::Running {
                *state = reason;
                true
            } else {
                false
            }
        });
        if changed {
            info!(state = %reason, "Line stopping");
        } else {
            debug!(state = %reason, current = %self.state(), "RunControl::stop: already stopped");
        }
        changed
    }

    /// Receiver that observes the stop transition
    pub fn subscribe(&self) -> watch::Receiver<LineState> {
        self.tx.subscribe()
    }

    /// Resolve once the line is no longer running
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|state| *state != LineState::Running).await.map(|_| ());
    }

    /// Sleep unless the line stops first
    ///
    /// Returns true when the full delay elapsed with the line still running.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_running(),
            _ = self.stopped() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_stop_wins() {
        let run = RunControl::new();
        assert!(run.is_running());

        assert!(run.stop(LineState::Completed));
        assert!(!run.stop(LineState::Interrupted));
        assert_eq!(run.state(), LineState::Completed);
        assert!(!run.is_running());
    }

    #[test]
    fn test_stop_with_running_is_ignored() {
        let run = RunControl::new();
        assert!(!run.stop(LineState::Running));
        assert!(run.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_cut_short_by_stop() {
        let run = RunControl::new();
        let stopper = run.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stopper.stop(LineState::Interrupted);
        });

        let start = tokio::time::Instant::now();
        assert!(!run.sleep(Duration::from_secs(30)).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_while_running() {
        let run = RunControl::new();
        assert!(run.sleep(Duration::from_millis(250)).await);
    }

    #[tokio::test]
    async fn test_subscriber_sees_completion() {
        let run = RunControl::new();
        let mut rx = run.subscribe();

        run.stop(LineState::Completed);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LineState::Completed);

        // Already stopped: resolves immediately
        run.stopped().await;
    }
}
