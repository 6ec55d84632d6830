use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use brainwave_driver::CompletedEpoch;

use crate::control::{Broadcaster, OutEnvelope};
use crate::csv_sink::CsvSink;
use crate::lsl::LslSink;
use crate::tsdb::TsdbSink;

/// A fan-out destination for completed epochs. Submissions are fire-and-forget
/// from the scheduler's point of view: a sink's own errors never propagate
/// back and never block the acquisition loop.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn submit(&self, epoch: &CompletedEpoch);
}

/// Broadcasts the epoch to every connected control-channel client as an
/// `eeg` envelope.
pub struct BroadcastSink {
    broadcaster: Broadcaster,
}

impl BroadcastSink {
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self { broadcaster }
    }
}

#[async_trait]
impl Sink for BroadcastSink {
    async fn submit(&self, epoch: &CompletedEpoch) {
        self.broadcaster.send(&OutEnvelope::Eeg {
            data: epoch.channels.clone(),
        });
    }
}

/// Fan-out coordinator: holds every configured sink and a bounded queue per
/// sink so that a slow sink drops the newest epoch (with a warning) instead
/// of backing up the scheduler.
pub struct FanOut {
    senders: Vec<mpsc::Sender<std::sync::Arc<CompletedEpoch>>>,
}

impl FanOut {
    pub fn new(sinks: Vec<std::sync::Arc<dyn Sink>>, queue_depth: usize) -> Self {
        let mut senders = Vec::with_capacity(sinks.len());
        for sink in sinks {
            let (tx, mut rx) = mpsc::channel::<std::sync::Arc<CompletedEpoch>>(queue_depth);
            tokio::spawn(async move {
                while let Some(epoch) = rx.recv().await {
                    sink.submit(&epoch).await;
                }
            });
            senders.push(tx);
        }
        Self { senders }
    }

    /// Enqueues one completed epoch to every sink. Never awaits a slow sink:
    /// `try_send` drop-newest-with-warning on a full queue.
    pub fn dispatch(&self, epoch: CompletedEpoch) {
        let epoch = std::sync::Arc::new(epoch);
        for sender in &self.senders {
            if let Err(mpsc::error::TrySendError::Full(_)) = sender.try_send(epoch.clone()) {
                warn!("sink queue full, dropping newest epoch for this sink");
            }
        }
    }
}

/// Builds the configured sink list: broadcast is always present; TSDB, CSV,
/// and LSL sideband sinks are added when configured.
pub fn build_sinks(
    broadcaster: Broadcaster,
    tsdb: Option<TsdbSink>,
    csv: Option<CsvSink>,
    lsl: Option<LslSink>,
) -> Vec<std::sync::Arc<dyn Sink>> {
    let mut sinks: Vec<std::sync::Arc<dyn Sink>> = vec![std::sync::Arc::new(BroadcastSink::new(broadcaster))];
    if let Some(tsdb) = tsdb {
        sinks.push(std::sync::Arc::new(tsdb));
    }
    if let Some(csv) = csv {
        sinks.push(std::sync::Arc::new(csv));
    }
    if let Some(lsl) = lsl {
        sinks.push(std::sync::Arc::new(lsl));
    }
    sinks
}
