use crate::error::{Result, ShellError};
use std::time::Duration;
use tokio::sync::watch;

/// Publishing side of the host-ready signal. Published once, never reset.
#[derive(Debug)]
pub struct ReadyPublisher {
    tx: watch::Sender<bool>,
}

/// Subscriber side of the host-ready signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    rx: watch::Receiver<bool>,
}

pub fn ready_channel() -> (ReadyPublisher, ReadySignal) {
    let (tx, rx) = watch::channel(false);
    (ReadyPublisher { tx }, ReadySignal { rx })
}

impl ReadyPublisher {
    /// Returns `true` only for the call that actually flipped the signal.
    pub fn publish(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_published(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> ReadySignal {
        ReadySignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl ReadySignal {
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the signal is published. `None` waits forever.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        let mut rx = self.rx.clone();
        let waited = match timeout {
            Some(limit) => tokio::time::timeout(limit, rx.wait_for(|ready| *ready))
                .await
                .map_err(|_| {
                    ShellError::TargetNotReady(format!("host not ready after {:?}", limit))
                })?
                .map(|_| ()),
            None => rx.wait_for(|ready| *ready).await.map(|_| ()),
        };

        waited.map_err(|_| ShellError::TargetNotReady("host shut down before ready".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_wakes_waiters_once() {
        let (publisher, signal) = ready_channel();
        assert!(!signal.is_ready());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait(None).await })
        };

        assert!(publisher.publish());
        assert!(!publisher.publish());
        assert!(waiter.await.unwrap().is_ok());
        assert!(signal.is_ready());
    }

    #[tokio::test]
    async fn already_ready_returns_immediately() {
        let (publisher, signal) = ready_channel();
        publisher.publish();
        assert!(signal.wait(Some(Duration::from_millis(1))).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_not_ready() {
        let (_publisher, signal) = ready_channel();
        let err = signal.wait(Some(Duration::from_secs(5))).await.unwrap_err();
        assert!(matches!(err, ShellError::TargetNotReady(_)));
    }

    #[tokio::test]
    async fn dropped_publisher_reports_not_ready() {
        let (publisher, signal) = ready_channel();
        drop(publisher);
        assert!(signal.wait(None).await.is_err());
    }
}
