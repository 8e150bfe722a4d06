// Shutdown Token for background loops

use tokio::sync::watch;

/// Shutdown signal observed by schedulers and the worker pool
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is requested (returns immediately if it already was)
    pub async fn wait(&mut self) {
        // a dropped sender counts as shutdown
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to every token
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }

    /// Another token for the same signal
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_tokens_observe_shutdown() {
        let (sender, mut token) = shutdown_channel();
        let mut second = sender.token();
        assert!(!token.is_shutdown());

        sender.shutdown();
        token.wait().await;
        second.wait().await;
        assert!(token.is_shutdown());
        assert!(second.is_shutdown());
    }
}
