//! History ring — the broker's bounded record of internal-state samples
//!
//! In memory it is a capacity-bounded ring; on a cadence the most recent
//! samples are flushed to a JSON file via tmp+rename. The in-memory ring
//! stays authoritative: a failed flush logs and moves on, and a corrupt
//! file on load means starting empty, not crashing.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use hearth_core::config::HistoryConfig;
use hearth_core::{HistorySample, InternalState, Result};
use tracing::{debug, warn};

pub struct HistoryRing {
    samples: VecDeque<HistorySample>,
    capacity: usize,
    flush_keep: usize,
    flush_interval_secs: f64,
    path: PathBuf,
    last_flush: Option<DateTime<Utc>>,
}

impl HistoryRing {
    pub fn new(data_dir: &std::path::Path, cfg: &HistoryConfig) -> Self {
        Self {
            samples: VecDeque::with_capacity(cfg.ring_capacity.min(4096)),
            capacity: cfg.ring_capacity.max(1),
            flush_keep: cfg.flush_keep,
            flush_interval_secs: cfg.flush_interval_secs,
            path: data_dir.join(&cfg.history_file),
            last_flush: None,
        }
    }

    /// Load persisted samples into a fresh ring. Absent or corrupt files
    /// start the ring empty.
    pub fn load(data_dir: &std::path::Path, cfg: &HistoryConfig) -> Self {
        let mut ring = Self::new(data_dir, cfg);
        match std::fs::read_to_string(&ring.path) {
            Ok(content) => match serde_json::from_str::<Vec<HistorySample>>(&content) {
                Ok(samples) => {
                    debug!(count = samples.len(), "loaded history");
                    for s in samples {
                        ring.push_sample(s);
                    }
                }
                Err(e) => {
                    warn!(path = %ring.path.display(), "corrupt history file, starting empty: {e}");
                }
            },
            Err(_) => {}
        }
        ring
    }

    pub fn push(&mut self, at: DateTime<Utc>, state: InternalState) {
        self.push_sample(HistorySample { at, state });
    }

    fn push_sample(&mut self, sample: HistorySample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// All samples, oldest first.
    pub fn samples(&self) -> Vec<HistorySample> {
        self.samples.iter().copied().collect()
    }

    /// The most recent `n` samples, oldest first.
    pub fn window(&self, n: usize) -> Vec<HistorySample> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).copied().collect()
    }

    pub fn flush_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_flush {
            Some(t) => (now - t).num_milliseconds() as f64 / 1000.0 >= self.flush_interval_secs,
            None => !self.samples.is_empty(),
        }
    }

    /// Persist the last `flush_keep` samples. Disk growth stays bounded by
    /// the cap; the ring keeps everything it holds regardless.
    pub fn flush(&mut self, now: DateTime<Utc>) -> Result<()> {
        let skip = self.samples.len().saturating_sub(self.flush_keep);
        let keep: Vec<&HistorySample> = self.samples.iter().skip(skip).collect();
        let json = serde_json::to_vec(&keep)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path)?;
        self.last_flush = Some(now);
        debug!(count = keep.len(), "flushed history");
        Ok(())
    }
}
