use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Local;
use csv::Writer;
use tracing::warn;

use brainwave_driver::CompletedEpoch;

use crate::fanout::Sink;

/// Appends each epoch's filtered samples to a timestamped CSV file under the
/// configured output directory, mirroring the driver-owned raw-sample file
/// streamer described in the control-channel design.
pub struct CsvSink {
    writer: Mutex<Writer<File>>,
}

impl CsvSink {
    pub fn new(output_dir: &str) -> std::io::Result<Self> {
        let filename = format!("{}.brainwave.csv", Local::now().format("%Y-%m-%d-%H-%M-%S"));
        let path: PathBuf = PathBuf::from(output_dir).join(filename);
        let file = File::create(path)?;
        let mut writer = Writer::from_writer(file);
        writer
            .write_record(["epoch_end_ms", "channel", "sample_index", "filtered_uv"])
            .ok();
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }
}

#[async_trait]
impl Sink for CsvSink {
    async fn submit(&self, epoch: &CompletedEpoch) {
        let mut writer = match self.writer.lock() {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "csv sink mutex poisoned");
                return;
            }
        };
        for channel in &epoch.channels {
            for (i, value) in channel.filtered.iter().enumerate() {
                let record = [
                    epoch.epoch_end_ms.to_string(),
                    channel.channel_name.clone(),
                    i.to_string(),
                    value.to_string(),
                ];
                if let Err(e) = writer.write_record(&record) {
                    warn!(error = %e, "csv write failed");
                    return;
                }
            }
        }
        if let Err(e) = writer.flush() {
            warn!(error = %e, "csv flush failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainwave_driver::{BandPowers, PerChannel, Psd};
    use tempfile::tempdir;

    fn epoch_with_one_channel() -> CompletedEpoch {
        CompletedEpoch {
            epoch_end_ms: 1_000,
            channels: vec![PerChannel {
                channel_idx: 0,
                channel_name: "Fp1".into(),
                raw: vec![0.0, 1.0],
                filtered: vec![0.1, 0.2],
                fft_raw: Psd::default(),
                fft_filtered: Psd::default(),
                band_powers: BandPowers::default(),
                over_threshold_indices: vec![],
                complexity: None,
            }],
        }
    }

    #[tokio::test]
    async fn submit_writes_one_row_per_sample() {
        let dir = tempdir().unwrap();
        let sink = CsvSink::new(dir.path().to_str().unwrap()).unwrap();
        sink.submit(&epoch_with_one_channel()).await;

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let contents = std::fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        let data_lines = contents.lines().count() - 1; // minus header
        assert_eq!(data_lines, 2);
    }
}
