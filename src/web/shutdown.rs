use tokio::sync::mpsc;

/// Requests an orderly shutdown of the API server.
///
/// Only the first reason is delivered; later signals are dropped while the
/// first is still pending.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: mpsc::Sender<String>,
}

impl Shutdown {
    pub fn channel() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    pub fn signal(&self, reason: impl Into<String>) {
        if self.tx.try_send(reason.into()).is_err() {
            tracing::debug!("shutdown already signalled");
        }
    }
}
