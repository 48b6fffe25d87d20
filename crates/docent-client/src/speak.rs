//! FIFO queue of completed units with a single consumer.
//!
//! Decouples arrival order from playback timing: the assembler enqueues
//! units as frames arrive, and one consumer task hands them to the sink
//! (speech synthesis, rendering) strictly in order.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Downstream consumer of completed units.
pub trait UnitSink: Send + 'static {
    fn deliver(&mut self, unit: &str);
}

impl<F: FnMut(&str) + Send + 'static> UnitSink for F {
    fn deliver(&mut self, unit: &str) {
        self(unit)
    }
}

/// Ordered queue with a single consumer task.
pub struct SpeakQueue {
    tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl SpeakQueue {
    /// Spawn the consumer task around the given sink.
    pub fn spawn(mut sink: impl UnitSink) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let task = tokio::spawn(async move {
            while let Some(unit) = rx.recv().await {
                sink.deliver(&unit);
            }
        });
        Self { tx, task }
    }

    /// Enqueue a unit for consumption. Ordering follows enqueue order.
    pub fn enqueue(&self, unit: impl Into<String>) {
        // A closed queue means the session is gone; late units are dropped.
        let _ = self.tx.send(unit.into());
    }

    /// Close the queue and wait for the consumer to drain it.
    pub async fn close(self) {
        drop(self.tx);
        let _ = self.task.await;
    }
}
