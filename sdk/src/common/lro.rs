use super::errors::{AzureError, AzureResult};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default delay between status probes.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);

/// Terminal and non-terminal states of a long-running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LroStatus {
    InProgress,
    Succeeded,
    Failed,
}

impl LroStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LroStatus::Succeeded | LroStatus::Failed)
    }
}

/// Probes the service for the current state of one long-running operation.
///
/// Implementations decide how service responses map onto [`LroStatus`];
/// the poller only schedules probes and reports the outcome.
#[async_trait]
pub trait StatusMonitor: Send + Sync {
    async fn update_status(&self) -> AzureResult<LroStatus>;
}

/// Drives a [`StatusMonitor`] until the operation reaches a terminal state.
///
/// The first probe fires immediately; subsequent probes are spaced by the
/// configured interval. Cancelling the token aborts the wait without
/// affecting the remote operation.
pub struct Poller {
    monitor: Box<dyn StatusMonitor>,
    interval: Duration,
    cancel: CancellationToken,
    status: LroStatus,
    operation: String,
}

impl Poller {
    pub fn new(monitor: Box<dyn StatusMonitor>, operation: impl Into<String>) -> Self {
        Self {
            monitor,
            interval: DEFAULT_POLLING_INTERVAL,
            cancel: CancellationToken::new(),
            status: LroStatus::InProgress,
            operation: operation.into(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Token to abort [`Poller::wait`] from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Status observed by the most recent probe.
    pub fn status(&self) -> LroStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Run a single probe and record the observed status.
    pub async fn poll_once(&mut self) -> AzureResult<LroStatus> {
        if !self.status.is_terminal() {
            self.status = self.monitor.update_status().await?;
        }
        Ok(self.status)
    }

    /// Poll until the operation succeeds, fails, or the token is cancelled.
    pub async fn wait(&mut self) -> AzureResult<()> {
        loop {
            match self.poll_once().await? {
                LroStatus::Succeeded => return Ok(()),
                LroStatus::Failed => {
                    return Err(AzureError::PollingFailed(format!(
                        "{} reached a failed state",
                        self.operation
                    )));
                }
                LroStatus::InProgress => {}
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(AzureError::PollingFailed(format!(
                        "{} polling was cancelled",
                        self.operation
                    )));
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("operation", &self.operation)
            .field("status", &self.status)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl std::future::IntoFuture for Poller {
    type Output = AzureResult<()>;
    type IntoFuture = BoxFuture<'static, AzureResult<()>>;

    fn into_future(self) -> Self::IntoFuture {
        let mut poller = self;
        Box::pin(async move { poller.wait().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedMonitor {
        states: Mutex<VecDeque<LroStatus>>,
    }

    impl ScriptedMonitor {
        fn new(states: Vec<LroStatus>) -> Self {
            Self {
                states: Mutex::new(states.into()),
            }
        }
    }

    #[async_trait]
    impl StatusMonitor for ScriptedMonitor {
        async fn update_status(&self) -> AzureResult<LroStatus> {
            let mut states = self.states.lock().unwrap();
            Ok(states.pop_front().unwrap_or(LroStatus::Succeeded))
        }
    }

    #[tokio::test]
    async fn waits_through_in_progress_states() {
        let monitor = ScriptedMonitor::new(vec![
            LroStatus::InProgress,
            LroStatus::InProgress,
            LroStatus::Succeeded,
        ]);
        let mut poller = Poller::new(Box::new(monitor), "test operation")
            .with_interval(Duration::from_millis(1));

        assert!(poller.wait().await.is_ok());
        assert_eq!(poller.status(), LroStatus::Succeeded);
    }

    #[tokio::test]
    async fn failed_state_surfaces_as_error() {
        let monitor = ScriptedMonitor::new(vec![LroStatus::InProgress, LroStatus::Failed]);
        let mut poller =
            Poller::new(Box::new(monitor), "delete job").with_interval(Duration::from_millis(1));

        let err = poller.wait().await.unwrap_err();
        assert!(err.to_string().contains("delete job"));
        assert!(poller.is_finished());
    }

    #[tokio::test]
    async fn terminal_status_is_sticky() {
        let monitor = ScriptedMonitor::new(vec![LroStatus::Succeeded, LroStatus::Failed]);
        let mut poller = Poller::new(Box::new(monitor), "resize pool");

        assert_eq!(poller.poll_once().await.unwrap(), LroStatus::Succeeded);
        // A finished poller never probes again.
        assert_eq!(poller.poll_once().await.unwrap(), LroStatus::Succeeded);
    }

    #[tokio::test]
    async fn cancellation_aborts_wait() {
        let monitor = ScriptedMonitor::new(vec![LroStatus::InProgress; 100]);
        let mut poller =
            Poller::new(Box::new(monitor), "reboot node").with_interval(Duration::from_secs(30));
        let token = poller.cancellation_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let err = poller.wait().await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn into_future_awaits_completion() {
        let monitor = ScriptedMonitor::new(vec![LroStatus::InProgress, LroStatus::Succeeded]);
        let poller = Poller::new(Box::new(monitor), "enable job")
            .with_interval(Duration::from_millis(1));

        assert!(poller.await.is_ok());
    }
}
