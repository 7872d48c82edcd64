//! # Dispatch
//!
//! The message queue in front of an actuator. Every producer (callers,
//! settled effects, subscriptions) holds a cloned [`Dispatcher`]; the actuator
//! owns the single [`MessageQueue`] and drains it one message at a time.
//!
//! ```text
//! dispatch() ─┐
//! effect ─────┼──► unbounded FIFO ──► Actuator::next_model() ──► update()
//! subscription┘
//! ```
//!
//! The channel is unbounded so `dispatch` never blocks or awaits. Once the
//! actuator stops, the queue is closed and further sends are discarded.

use std::fmt;

use log::debug;
use tokio::sync::mpsc;

/// Creates a connected dispatcher/queue pair.
pub(crate) fn channel<M>() -> (Dispatcher<M>, MessageQueue<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Dispatcher { tx }, MessageQueue { rx })
}

/// Fire-and-forget handle for enqueueing messages.
pub struct Dispatcher<M> {
    tx: mpsc::UnboundedSender<M>,
}

impl<M> Dispatcher<M> {
    /// Enqueue a message. Returns immediately; a message sent after the
    /// actuator stopped is dropped.
    pub fn dispatch(&self, message: M) {
        if self.tx.send(message).is_err() {
            debug!("Dispatch after actuator stopped, message discarded");
        }
    }

    /// True once the actuator has stopped accepting messages.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<M> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<M> fmt::Debug for Dispatcher<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub(crate) struct MessageQueue<M> {
    rx: mpsc::UnboundedReceiver<M>,
}

impl<M> MessageQueue<M> {
    /// Wait for the next message. `None` once closed and drained.
    pub(crate) async fn next(&mut self) -> Option<M> {
        self.rx.recv().await
    }

    /// Messages waiting to be processed.
    pub(crate) fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Stop accepting messages and discard whatever is still queued.
    pub(crate) fn close(&mut self) {
        self.rx.close();
        let mut discarded = 0usize;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("Queue closed with {} unprocessed messages", discarded);
        }
    }
}
