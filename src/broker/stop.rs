//! Stop signal for consumption loops.
//!
//! A consumer runs until its token fires; the owning process holds the
//! handle and triggers it on shutdown. Dropping the handle also stops every
//! token holder, so a consumer can never outlive its owner by accident.

use tokio::sync::watch;

/// Create a connected stop handle/token pair.
pub fn stop_channel() -> (StopHandle, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopToken { rx })
}

/// Owner side: signals every cloned [`StopToken`] to stop.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Signal stop. Idempotent.
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Consumer side: observed between deliveries and awaited while idle.
#[derive(Clone, Debug)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    /// Whether stop has been signalled (or the handle dropped).
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until stop is signalled or the handle is dropped.
    pub async fn stopped(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_is_observed_by_all_tokens() {
        let (handle, token) = stop_channel();
        let mut second = token.clone();

        assert!(!token.is_stopped());
        handle.stop();
        assert!(token.is_stopped());
        second.stopped().await;
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_tokens() {
        let (handle, mut token) = stop_channel();
        drop(handle);
        token.stopped().await;
        assert!(token.is_stopped());
    }
}
