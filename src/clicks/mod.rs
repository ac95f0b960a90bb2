//! Click recording
//!
//! Redirect handlers hand clicks to a [`ClickRecorder`] and move on. The
//! buffered implementation batches events on a background actor and writes
//! them to a [`ClickLog`] off the hot path.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ClickConfig;
use crate::models::{ClickEvent, ClickProperties};
use crate::storage::ClickLog;

/// Fire-and-forget sink for clicks. Must never block or fail the caller.
pub trait ClickRecorder: Send + Sync {
    fn record(&self, short_code: &str, properties: ClickProperties);
}

enum ActorMessage {
    Record(ClickEvent),
    /// Flush everything buffered, then acknowledge
    Flush(oneshot::Sender<()>),
    /// Stop accepting clicks, drain the queue and exit
    Shutdown,
}

struct ClickActor {
    receiver: mpsc::Receiver<ActorMessage>,
    buffer: Vec<ClickEvent>,
    batch_size: usize,
    flush_interval: Duration,
    click_log: Arc<dyn ClickLog>,
}

impl ClickActor {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                msg = self.receiver.recv() => match msg {
                    Some(ActorMessage::Record(event)) => {
                        self.buffer.push(event);
                        if self.buffer.len() >= self.batch_size {
                            self.flush().await;
                        }
                    }
                    Some(ActorMessage::Flush(ack)) => {
                        self.flush().await;
                        let _ = ack.send(());
                    }
                    Some(ActorMessage::Shutdown) => {
                        // Queued messages are still delivered, then recv yields None
                        self.receiver.close();
                    }
                    None => {
                        self.flush().await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }

        debug!("Click actor stopped");
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.buffer);
        match self.click_log.append(&batch).await {
            Ok(()) => debug!(count = batch.len(), "Flushed click events"),
            Err(e) => error!(count = batch.len(), error = %e, "Failed to flush click events"),
        }
    }
}

/// Channel-backed recorder; drops clicks instead of blocking when the buffer is full
pub struct BufferedClickRecorder {
    sender: mpsc::Sender<ActorMessage>,
    actor: Mutex<Option<JoinHandle<()>>>,
}

impl BufferedClickRecorder {
    pub fn new(
        click_log: Arc<dyn ClickLog>,
        buffer_size: usize,
        batch_size: usize,
        flush_interval_ms: u64,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let actor = ClickActor {
            receiver,
            buffer: Vec::with_capacity(batch_size),
            batch_size: batch_size.max(1),
            flush_interval: Duration::from_millis(flush_interval_ms.max(1)),
            click_log,
        };
        let handle = tokio::spawn(actor.run());

        Self {
            sender,
            actor: Mutex::new(Some(handle)),
        }
    }

    pub fn from_config(click_log: Arc<dyn ClickLog>, config: &ClickConfig) -> Self {
        Self::new(
            click_log,
            config.buffer_size,
            config.batch_size,
            config.flush_interval_ms,
        )
    }

    /// Write out everything recorded so far
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(ActorMessage::Flush(ack)).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Stop the actor once every click queued so far is written. Later clicks are dropped.
    pub async fn shutdown(&self) {
        info!("Flushing click buffer before shutdown...");
        let _ = self.sender.send(ActorMessage::Shutdown).await;
        if let Some(handle) = self.actor.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Click actor did not stop cleanly");
            }
        }
    }
}

impl ClickRecorder for BufferedClickRecorder {
    fn record(&self, short_code: &str, properties: ClickProperties) {
        let event = ClickEvent::now(short_code, properties);
        if let Err(e) = self.sender.try_send(ActorMessage::Record(event)) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!(short_code, "Click buffer full, dropping click")
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!(short_code, "Click recorder stopped, dropping click")
                }
            }
        }
    }
}
