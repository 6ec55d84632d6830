use std::net::SocketAddr;

use async_trait::async_trait;
use serde::Serialize;
use tokio::net::UdpSocket;
use tracing::warn;

use brainwave_driver::CompletedEpoch;

use crate::fanout::Sink;

/// Inter-application signal bus sink, enabled by `--lsl`. The upstream
/// implementation pushed per-sample vectors to an LSL outlet via `pylsl`;
/// no Rust binding for the liblsl C library is available anywhere in this
/// dependency stack, so this sink pushes the same per-sample values as
/// newline-free JSON datagrams over UDP instead, which other local
/// processes can subscribe to in place of an LSL inlet. This substitution
/// is recorded as a deliberate dependency decision.
pub struct LslSink {
    socket: UdpSocket,
    target: SocketAddr,
}

#[derive(Serialize)]
struct LslSample<'a> {
    epoch_end_ms: u64,
    channel: &'a str,
    sample_index: usize,
    value: f64,
}

impl LslSink {
    pub fn new(target: SocketAddr) -> std::io::Result<Self> {
        let std_socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
        std_socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(std_socket)?;
        Ok(Self { socket, target })
    }
}

#[async_trait]
impl Sink for LslSink {
    async fn submit(&self, epoch: &CompletedEpoch) {
        for channel in &epoch.channels {
            for (sample_index, &value) in channel.raw.iter().enumerate() {
                let sample = LslSample {
                    epoch_end_ms: epoch.epoch_end_ms,
                    channel: &channel.channel_name,
                    sample_index,
                    value,
                };
                match serde_json::to_vec(&sample) {
                    Ok(bytes) => {
                        if let Err(e) = self.socket.send_to(&bytes, self.target).await {
                            warn!(error = %e, "lsl sink datagram send failed");
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to serialize lsl sample"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainwave_driver::{BandPowers, PerChannel, Psd};

    fn epoch_with_two_samples() -> CompletedEpoch {
        CompletedEpoch {
            epoch_end_ms: 42,
            channels: vec![PerChannel {
                channel_idx: 0,
                channel_name: "Fp1".into(),
                raw: vec![1.5, 2.5],
                filtered: vec![0.0, 0.0],
                fft_raw: Psd::default(),
                fft_filtered: Psd::default(),
                band_powers: BandPowers::default(),
                over_threshold_indices: vec![],
                complexity: None,
            }],
        }
    }

    #[tokio::test]
    async fn submit_sends_one_datagram_per_sample() {
        let listener = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let listener = UdpSocket::from_std(listener).unwrap();
        let target = listener.local_addr().unwrap();

        let sink = LslSink::new(target).unwrap();
        sink.submit(&epoch_with_two_samples()).await;

        let mut buf = [0u8; 256];
        let mut received = 0;
        for _ in 0..2 {
            let (n, _) = tokio::time::timeout(std::time::Duration::from_secs(2), listener.recv_from(&mut buf))
                .await
                .expect("timed out waiting for datagram")
                .unwrap();
            let payload: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
            assert_eq!(payload["channel"], "Fp1");
            received += 1;
        }
        assert_eq!(received, 2);
    }
}
