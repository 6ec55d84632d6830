use std::collections::{HashMap, VecDeque};

use tracing::warn;

use crate::error::RingError;

/// Per-channel FIFO that absorbs bursty driver deliveries and yields aligned
/// epoch slices once every enabled channel has buffered at least `N` samples.
///
/// Capacity is capped at `20 * N` per channel; on overflow the oldest samples
/// are dropped with a logged warning rather than growing without bound.
pub struct SampleRing {
    samples_per_epoch: usize,
    channels: HashMap<usize, VecDeque<f64>>,
}

impl SampleRing {
    pub fn new(samples_per_epoch: usize, channel_indices: &[usize]) -> Self {
        let mut channels = HashMap::new();
        for &idx in channel_indices {
            channels.insert(idx, VecDeque::with_capacity(samples_per_epoch * 2));
        }
        Self {
            samples_per_epoch,
            channels,
        }
    }

    fn capacity(&self) -> usize {
        self.samples_per_epoch * 20
    }

    /// Appends samples to a channel's tail, dropping the oldest on overflow.
    pub fn push(&mut self, channel: usize, samples: &[f64]) {
        let cap = self.capacity();
        let Some(buf) = self.channels.get_mut(&channel) else {
            return;
        };
        buf.extend(samples.iter().copied());
        let overflow = buf.len().saturating_sub(cap);
        if overflow > 0 {
            warn!(channel, overflow, "sample ring overflow, dropping oldest samples");
            for _ in 0..overflow {
                buf.pop_front();
            }
        }
    }

    /// True iff every enabled channel has at least `N` buffered samples.
    pub fn ready(&self) -> bool {
        if self.channels.is_empty() {
            return false;
        }
        self.channels
            .values()
            .all(|buf| buf.len() >= self.samples_per_epoch)
    }

    /// Removes exactly `N` samples from the front of every channel, atomically.
    /// Fails without mutating any channel if not every channel is ready.
    pub fn take(&mut self) -> Result<HashMap<usize, Vec<f64>>, RingError> {
        if !self.ready() {
            return Err(RingError::NotReady);
        }
        let n = self.samples_per_epoch;
        let mut out = HashMap::with_capacity(self.channels.len());
        for (&idx, buf) in self.channels.iter_mut() {
            let epoch: Vec<f64> = buf.drain(..n).collect();
            out.insert(idx, epoch);
        }
        Ok(out)
    }

    /// Current buffered length per channel, for debug-level fill-level logging.
    pub fn fill_levels(&self) -> HashMap<usize, usize> {
        self.channels.iter().map(|(&k, v)| (k, v.len())).collect()
    }

    /// Drops all buffered samples, used when starting a fresh session.
    pub fn clear(&mut self) {
        for buf in self.channels.values_mut() {
            buf.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_until_every_channel_has_n_samples() {
        let mut ring = SampleRing::new(4, &[0, 1]);
        ring.push(0, &[1.0, 2.0, 3.0, 4.0]);
        assert!(!ring.ready());
        ring.push(1, &[5.0, 6.0, 7.0, 8.0]);
        assert!(ring.ready());
    }

    #[test]
    fn take_removes_exactly_n_atomically() {
        let mut ring = SampleRing::new(2, &[0, 1]);
        ring.push(0, &[1.0, 2.0, 3.0]);
        ring.push(1, &[4.0, 5.0, 6.0]);
        let epoch = ring.take().unwrap();
        assert_eq!(epoch[&0], vec![1.0, 2.0]);
        assert_eq!(epoch[&1], vec![4.0, 5.0]);
        assert_eq!(ring.fill_levels()[&0], 1);
        assert_eq!(ring.fill_levels()[&1], 1);
    }

    #[test]
    fn take_fails_when_not_ready() {
        let mut ring = SampleRing::new(4, &[0]);
        ring.push(0, &[1.0]);
        assert!(matches!(ring.take(), Err(RingError::NotReady)));
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut ring = SampleRing::new(2, &[0]);
        let samples: Vec<f64> = (0..50).map(|i| i as f64).collect();
        ring.push(0, &samples);
        assert_eq!(ring.fill_levels()[&0], 40); // capacity = 20*N = 40
        let epoch = ring.take().unwrap();
        // oldest 10 values (0..10) were dropped, so the epoch starts at 10
        assert_eq!(epoch[&0], vec![10.0, 11.0]);
    }

    #[test]
    fn burst_absorption_emits_one_epoch_after_enough_samples() {
        let mut ring = SampleRing::new(250, &[0]);
        let bursts = [0, 0, 120, 0, 0, 120, 0, 0, 121];
        let mut emitted = 0;
        for &burst in &bursts {
            if burst > 0 {
                ring.push(0, &vec![0.0; burst]);
            }
            if ring.ready() {
                ring.take().unwrap();
                emitted += 1;
            }
        }
        assert_eq!(emitted, 1);
    }
}
