use async_trait::async_trait;
use hyper::{Body, Client, Method, Request};
use tracing::warn;

use brainwave_driver::{CompletedEpoch, PerChannel};

use crate::config::InfluxConfig;
use crate::fanout::Sink;

/// Minimal InfluxDB line-protocol writer over HTTP. The concrete time-series
/// database client is out of scope for this crate; this is the thinnest
/// interface-level implementation of it, reusing `hyper` which is already a
/// transitive dependency of the control channel's `warp` server.
pub struct TsdbSink {
    client: Client<hyper::client::HttpConnector>,
    write_url: String,
    raw_samples: bool,
    sample_rate_hz: f64,
}

impl TsdbSink {
    pub fn new(config: &InfluxConfig, sample_rate_hz: f64) -> Self {
        let write_url = format!(
            "{}/write?db={}&u={}&p={}&precision=ms",
            config.url.trim_end_matches('/'),
            config.database,
            config.username,
            config.password
        );
        Self {
            client: Client::new(),
            write_url,
            raw_samples: config.raw_samples,
            sample_rate_hz,
        }
    }

    fn line_for_channel(channel: &PerChannel, epoch_end_ms: u64) -> String {
        let bp = &channel.band_powers;
        let mut fields = format!(
            "sdelta={},fdelta={},theta={},alpha={},sigma={},beta={},over_threshold={}i",
            bp.sdelta,
            bp.fdelta,
            bp.theta,
            bp.alpha,
            bp.sigma,
            bp.beta,
            channel.over_threshold_indices.len()
        );
        if let Some(c) = &channel.complexity {
            fields.push_str(&format!(
                ",permutation_entropy={},spectral_entropy={},svd_entropy={},approximate_entropy={},sample_entropy={},hjorth_mobility={},hjorth_complexity={},num_zero_crossings={},petrosian_fd={},katz_fd={},higuchi_fd={},detrended_fluctuation_analysis={}",
                c.permutation_entropy,
                c.spectral_entropy,
                c.svd_entropy,
                c.approximate_entropy,
                c.sample_entropy,
                c.hjorth_mobility,
                c.hjorth_complexity,
                c.num_zero_crossings,
                c.petrosian_fd,
                c.katz_fd,
                c.higuchi_fd,
                c.detrended_fluctuation_analysis
            ));
        }
        format!(
            "brainwave_epoch,channel={} {} {}",
            escape_tag_value(&channel.channel_name),
            fields,
            epoch_end_ms
        )
    }

    fn raw_sample_lines(channel: &PerChannel, epoch_end_ms: u64, sample_rate_hz: f64) -> String {
        let n = channel.filtered.len();
        let mut lines = String::new();
        for (i, &v) in channel.filtered.iter().enumerate() {
            let offset_ms = ((n - i) as f64 * 1000.0 / sample_rate_hz) as u64;
            let ts = epoch_end_ms.saturating_sub(offset_ms);
            lines.push_str(&format!(
                "brainwave_raw,channel={} value={} {}\n",
                escape_tag_value(&channel.channel_name),
                v,
                ts
            ));
        }
        lines
    }

    async fn post(&self, body: String) {
        if body.is_empty() {
            return;
        }
        let request = match Request::builder()
            .method(Method::POST)
            .uri(&self.write_url)
            .body(Body::from(body))
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "failed to build tsdb request");
                return;
            }
        };
        if let Err(e) = self.client.request(request).await {
            warn!(error = %e, "tsdb write failed");
        }
    }
}

fn escape_tag_value(value: &str) -> String {
    value.replace(' ', "\\ ").replace(',', "\\,")
}

#[async_trait]
impl Sink for TsdbSink {
    async fn submit(&self, epoch: &CompletedEpoch) {
        let mut body = String::new();
        for channel in &epoch.channels {
            body.push_str(&Self::line_for_channel(channel, epoch.epoch_end_ms));
            body.push('\n');
            if self.raw_samples {
                body.push_str(&Self::raw_sample_lines(channel, epoch.epoch_end_ms, self.sample_rate_hz));
            }
        }
        self.post(body).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainwave_driver::{BandPowers, Psd};

    fn sample_channel() -> PerChannel {
        PerChannel {
            channel_idx: 0,
            channel_name: "Fp1".into(),
            raw: vec![0.0; 4],
            filtered: vec![0.0; 4],
            fft_raw: Psd::default(),
            fft_filtered: Psd::default(),
            band_powers: BandPowers::default(),
            over_threshold_indices: vec![1],
            complexity: None,
        }
    }

    #[test]
    fn line_protocol_includes_measurement_tag_and_timestamp() {
        let line = TsdbSink::line_for_channel(&sample_channel(), 1_700_000_000_000);
        assert!(line.starts_with("brainwave_epoch,channel=Fp1 "));
        assert!(line.ends_with(" 1700000000000"));
        assert!(line.contains("over_threshold=1i"));
    }

    #[test]
    fn tag_values_with_spaces_are_escaped() {
        let mut channel = sample_channel();
        channel.channel_name = "left temporal".into();
        let line = TsdbSink::line_for_channel(&channel, 0);
        assert!(line.contains("channel=left\\ temporal"));
    }

    #[test]
    fn complexity_fields_use_snake_case_keys() {
        let mut channel = sample_channel();
        channel.complexity = Some(brainwave_driver::ComplexityMetrics {
            permutation_entropy: 0.5,
            ..Default::default()
        });
        let line = TsdbSink::line_for_channel(&channel, 0);
        assert!(line.contains("permutation_entropy=0.5"));
        assert!(!line.contains("permutationEntropy"));
    }
}
