use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// The two deadlines of a probe session.
///
/// The session deadline is fixed when the timers are armed. The path
/// deadline is re-armed for every attempt.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTimers {
    session_deadline: Instant,
    path_timeout: Option<Duration>,
}

impl ProbeTimers {
    /// Arm the session timer now.
    pub fn start(probe_timeout: Duration, path_timeout: Option<Duration>) -> Self {
        Self {
            session_deadline: Instant::now() + probe_timeout,
            path_timeout,
        }
    }

    pub fn session_deadline(&self) -> Instant {
        self.session_deadline
    }

    pub fn session_expired(&self) -> bool {
        Instant::now() >= self.session_deadline
    }

    /// Time left before the session deadline.
    pub fn remaining(&self) -> Duration {
        self.session_deadline.saturating_duration_since(Instant::now())
    }

    /// Resolves when the session deadline passes.
    pub async fn session_elapsed(&self) {
        tokio::time::sleep_until(self.session_deadline).await
    }

    /// Run `attempt` under the path deadline. Returns `None` if the deadline
    /// passed first, in which case `attempt` is dropped.
    pub async fn within_path<F: Future>(&self, attempt: F) -> Option<F::Output> {
        match self.path_timeout {
            Some(limit) => tokio::time::timeout(limit, attempt).await.ok(),
            None => Some(attempt.await),
        }
    }
}
