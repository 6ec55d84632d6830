use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::board::DriverEvent;
use crate::dsp::process_channel;
use crate::ring::SampleRing;
use crate::types::{ChannelSpec, EpochConfig, PerChannel};

/// Cooperative grace period given to in-flight fan-out submissions once
/// cancellation is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// A completed epoch, ready for fan-out: one feature record per channel plus
/// the wall-clock timestamp (ms since epoch) marking the epoch's end.
pub struct CompletedEpoch {
    pub epoch_end_ms: u64,
    pub channels: Vec<PerChannel>,
}

/// Runs the single-task cooperative acquisition loop: sleeps `N/F` seconds,
/// drains the driver non-blocking, routes samples into the ring, and emits
/// a `CompletedEpoch` through `out_tx` whenever the ring becomes ready.
///
/// Exits when `done` is set, checked at the head of each loop iteration.
pub async fn run(
    mut driver_rx: mpsc::Receiver<DriverEvent>,
    channels: Vec<ChannelSpec>,
    epoch: EpochConfig,
    out_tx: mpsc::Sender<CompletedEpoch>,
    done: Arc<AtomicBool>,
) {
    let channel_indices: Vec<usize> = channels.iter().map(|c| c.index).collect();
    let mut ring = SampleRing::new(epoch.samples_per_epoch, &channel_indices);
    let sleep_duration = Duration::from_secs_f64(epoch.epoch_duration_secs());
    let mut epoch_start_ms: Option<u64> = None;

    loop {
        if done.load(Ordering::SeqCst) {
            break;
        }
        sleep(sleep_duration).await;
        if done.load(Ordering::SeqCst) {
            break;
        }

        // Drain everything currently available without blocking.
        while let Ok(event) = driver_rx.try_recv() {
            match event {
                DriverEvent::Data(burst) => {
                    if epoch_start_ms.is_none() {
                        epoch_start_ms = Some(burst.timestamp_ms);
                    }
                    for (channel_idx, samples) in burst.channels {
                        ring.push(channel_idx, &samples);
                    }
                }
                DriverEvent::StatusChange(status) => {
                    trace!(?status, "driver status changed");
                }
            }
        }

        if ring.ready() {
            let epoch_samples = match ring.take() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let epoch_end_ms = epoch_start_ms.take().unwrap_or(0)
                + (epoch.epoch_duration_secs() * 1000.0) as u64;

            let mut records = Vec::with_capacity(channels.len());
            for ch in &channels {
                if let Some(raw) = epoch_samples.get(&ch.index) {
                    records.push(process_channel(ch, raw.clone(), epoch.sample_rate_hz));
                }
            }

            if out_tx
                .send(CompletedEpoch {
                    epoch_end_ms,
                    channels: records,
                })
                .await
                .is_err()
            {
                break;
            }
        } else {
            debug!(fill_levels = ?ring.fill_levels(), "epoch not ready, continuing to buffer");
        }
    }
}
