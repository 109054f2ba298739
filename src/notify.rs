//! Fire-and-forget change notifications for log consumers.

use tokio::sync::mpsc;

/// Signals an external consumer that observable state changed.
///
/// Sends never block: when the channel is full the ping is dropped, since
/// any ping already queued marks the state dirty.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: mpsc::Sender<()>,
}

impl ChangeNotifier {
    /// Creates a notifier and the receiving end the consumer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// A notifier whose pings go nowhere, for one-shot tool runs.
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }

    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}
