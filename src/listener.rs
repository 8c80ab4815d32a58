//! Scoped, time-bounded, cancelable message listener.
//! The registry holds the `ListenerHandle` (sender + token); the session task
//! owns the `Listener` and drives it with a per-message callback until the
//! callback stops it, the deadline passes, or the token is cancelled.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Owned copy of the parts of a chat event the session needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub sender_id: String,
    pub text: String,
}

/// Sending side, kept in the session registry.
#[derive(Clone)]
pub struct ListenerHandle {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    token: CancellationToken,
}

impl ListenerHandle {
    /// Queue a message. Returns false if the listener is gone.
    pub fn deliver(&self, message: IncomingMessage) -> bool {
        !self.token.is_cancelled() && self.tx.send(message).is_ok()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct Listener {
    rx: mpsc::UnboundedReceiver<IncomingMessage>,
    token: CancellationToken,
    deadline: Instant,
}

/// What the callback wants after handling one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// How a listener finished.
#[derive(Debug)]
pub enum ListenOutcome<E> {
    Stopped,
    TimedOut,
    Cancelled,
    Failed(E),
}

/// Deadline used when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Create a listener that expires `timeout` from now.
pub fn scoped(timeout: Duration) -> (ListenerHandle, Listener) {
    let (tx, rx) = mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let handle = ListenerHandle {
        tx,
        token: token.clone(),
    };
    let listener = Listener {
        rx,
        token,
        deadline: deadline_after(timeout),
    };
    (handle, listener)
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

impl Listener {
    /// Run `on_message` for every delivered message, in arrival order.
    pub async fn listen<F, E>(mut self, mut on_message: F) -> ListenOutcome<E>
    where
        F: FnMut(IncomingMessage) -> Result<Flow, E>,
    {
        loop {
            let message = tokio::select! {
                biased;
                _ = self.token.cancelled() => return ListenOutcome::Cancelled,
                _ = tokio::time::sleep_until(self.deadline) => return ListenOutcome::TimedOut,
                msg = self.rx.recv() => match msg {
                    Some(m) => m,
                    None => return ListenOutcome::Cancelled,
                },
            };

            match on_message(message) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => {
                    self.token.cancel();
                    return ListenOutcome::Stopped;
                }
                Err(e) => {
                    self.token.cancel();
                    return ListenOutcome::Failed(e);
                }
            }
        }
    }
}
