//! Activity-routed summary computation
//!
//! The processor answers "give me the current summary" as cheaply as the
//! stream allows: serve the cache when it is valid, recompute synchronously
//! when arrivals are brisk enough to pay for it, and push the work to a
//! single background task when the stream has gone quiet. A background
//! result is only published if nothing superseded it while it ran.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use vigil_core::Note;
use vigil_temporal::{
    prune_by_attention, ActivityConfig, ActivityDetector, ActivityLevel, AdaptiveWindowSizer,
    MultiScaleAggregator, MultiScaleConfig, WindowedAggregator, WindowedConfig,
};

use crate::cache::{CacheConfig, CacheEntry};

/// Where a summary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Source {
    /// Served from the valid cache
    Cache,
    /// Computed synchronously on this call
    Computed,
    /// Best-effort partial result; a background recompute is in flight
    BackgroundPending,
}

/// A summary handed back to the caller.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StreamSummary {
    pub aggregated: vigil_core::WindowSummary,
    pub multi_scale: Option<vigil_core::MultiScaleResult>,
    pub activity: ActivityLevel,
    pub source: Source,
}

/// Processor configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub cache: CacheConfig,
    pub windowed: WindowedConfig,
    pub multiscale: MultiScaleConfig,
    pub activity: ActivityConfig,
    /// Let the window sizer pick the window from the stream pattern
    pub adaptive_sizing: bool,
    /// Retained raw notes, pruned to this many by attention weight
    pub max_retained_notes: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            windowed: WindowedConfig::default(),
            multiscale: MultiScaleConfig::default(),
            activity: ActivityConfig::default(),
            adaptive_sizing: true,
            max_retained_notes: 64,
        }
    }
}

/// Per-stream router between cache, fast path, and background computation.
///
/// One instance per stream. The cache entry is owned here and shared only
/// with this processor's own background task.
pub struct AdaptiveProcessor {
    config: ProcessorConfig,
    notes: Vec<Note>,
    cache: Arc<Mutex<CacheEntry>>,
    /// Current retained-note count, read by the background task at publish
    /// time to re-check validity.
    note_count: Arc<AtomicUsize>,
    background: Option<JoinHandle<()>>,
}

impl AdaptiveProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            notes: Vec::new(),
            cache: Arc::new(Mutex::new(CacheEntry::empty())),
            note_count: Arc::new(AtomicUsize::new(0)),
            background: None,
        }
    }

    /// Ingest one note. Malformed notes are dropped with a warning and
    /// `false` is returned; ingestion itself never fails.
    pub fn ingest(&mut self, note: Note) -> bool {
        if let Err(e) = note.validate() {
            warn!(note_id = %note.id, error = %e, "Dropping malformed note at ingest");
            return false;
        }
        self.notes.push(note);
        prune_by_attention(
            &mut self.notes,
            self.config.max_retained_notes,
            self.config.windowed.window_size_ms,
            self.config.windowed.decay_factor,
        );
        self.note_count.store(self.notes.len(), Ordering::SeqCst);
        true
    }

    /// Retained notes (post-pruning), timestamp order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Most recently ingested note, by timestamp.
    pub fn newest(&self) -> Option<&Note> {
        self.notes.iter().max_by_key(|n| n.timestamp_ms)
    }

    /// Snapshot of the cache entry, for inspection.
    pub fn cache_entry(&self) -> CacheEntry {
        self.cache.lock().expect("cache mutex poisoned").clone()
    }

    /// Whether a background recompute is currently in flight.
    pub fn background_in_flight(&self) -> bool {
        self.background.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for any in-flight background recompute to publish or discard.
    pub async fn finish_background(&mut self) {
        if let Some(handle) = self.background.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background aggregation task failed; cache left untouched");
            }
        }
    }

    /// The current summary, as cheaply as activity allows.
    ///
    /// High and medium activity serve the valid cache or recompute inline;
    /// low activity serves the valid cache, otherwise starts (at most one)
    /// background recompute and returns a best-effort partial result.
    pub fn summary(&mut self, now_ms: i64) -> StreamSummary {
        let activity = ActivityDetector::new(self.config.activity).classify(&self.notes, now_ms);
        let note_count = self.notes.len();

        if self.notes.is_empty() {
            return StreamSummary {
                aggregated: vigil_core::WindowSummary::empty(),
                multi_scale: None,
                activity,
                source: Source::Computed,
            };
        }

        {
            let entry = self.cache.lock().expect("cache mutex poisoned");
            if entry.is_valid(&self.config.cache, note_count, now_ms) {
                debug!(?activity, "Serving cached summary");
                return Self::from_entry(&entry, activity, Source::Cache);
            }
        }

        match activity {
            ActivityLevel::High | ActivityLevel::Medium => self.compute_sync(activity, now_ms),
            ActivityLevel::Low => self.compute_background(now_ms),
        }
    }

    fn from_entry(entry: &CacheEntry, activity: ActivityLevel, source: Source) -> StreamSummary {
        StreamSummary {
            aggregated: entry
                .aggregated
                .clone()
                .unwrap_or_else(vigil_core::WindowSummary::empty),
            multi_scale: entry.multi_scale.clone(),
            activity,
            source,
        }
    }

    fn window_config(&self) -> WindowedConfig {
        if self.config.adaptive_sizing {
            WindowedConfig {
                window_size_ms: AdaptiveWindowSizer::default().window_size_ms(&self.notes),
                decay_factor: self.config.windowed.decay_factor,
            }
        } else {
            self.config.windowed
        }
    }

    fn compute_sync(&mut self, activity: ActivityLevel, now_ms: i64) -> StreamSummary {
        debug!(?activity, notes = self.notes.len(), "Synchronous recompute");
        let aggregated = WindowedAggregator::new(self.window_config()).aggregate(&self.notes);
        let multi_scale =
            MultiScaleAggregator::new(self.config.multiscale.clone()).aggregate(&self.notes);

        let mut entry = self.cache.lock().expect("cache mutex poisoned");
        entry.store(
            aggregated.clone(),
            Some(multi_scale.clone()),
            self.notes.len(),
            now_ms,
        );
        StreamSummary {
            aggregated,
            multi_scale: Some(multi_scale),
            activity,
            source: Source::Computed,
        }
    }

    fn compute_background(&mut self, now_ms: i64) -> StreamSummary {
        if !self.background_in_flight() {
            // Outside an async runtime there is nowhere to push the work;
            // recompute inline rather than panic.
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                debug!("No async runtime available, recomputing inline");
                return self.compute_sync(ActivityLevel::Low, now_ms);
            };
            self.spawn_background(&runtime, now_ms);
        } else {
            debug!("Background recompute already in flight, serving partial result");
        }

        // Best effort while the job runs: a partially-valid stale entry
        // beats recomputing, and the newest note alone beats nothing.
        let entry = self.cache.lock().expect("cache mutex poisoned");
        if entry.is_partially_valid(&self.config.cache, self.notes.len(), now_ms) {
            return Self::from_entry(&entry, ActivityLevel::Low, Source::BackgroundPending);
        }
        drop(entry);

        let partial = match self.newest() {
            Some(newest) => WindowedAggregator::new(self.config.windowed)
                .aggregate(std::slice::from_ref(newest)),
            None => vigil_core::WindowSummary::empty(),
        };
        StreamSummary {
            aggregated: partial,
            multi_scale: None,
            activity: ActivityLevel::Low,
            source: Source::BackgroundPending,
        }
    }

    fn spawn_background(&mut self, runtime: &tokio::runtime::Handle, now_ms: i64) {
        let snapshot = self.notes.clone();
        let cache = Arc::clone(&self.cache);
        let note_count = Arc::clone(&self.note_count);
        let cache_config = self.config.cache;
        let windowed_config = self.window_config();
        let multiscale_config = self.config.multiscale.clone();
        let captured_generation = self
            .cache
            .lock()
            .expect("cache mutex poisoned")
            .generation;

        debug!(notes = snapshot.len(), "Starting background recompute");
        self.background = Some(runtime.spawn(async move {
            let aggregated = WindowedAggregator::new(windowed_config).aggregate(&snapshot);
            let multi_scale = MultiScaleAggregator::new(multiscale_config).aggregate(&snapshot);

            // Publish only if nothing superseded this job while it ran: the
            // stream may have drifted past the validity bound, or a
            // synchronous recompute may have stored a newer result.
            let current_count = note_count.load(Ordering::SeqCst);
            let drift = current_count.abs_diff(snapshot.len());
            if drift > 0 && drift as f64 >= cache_config.drift_fraction * current_count as f64 {
                warn!(
                    computed_over = snapshot.len(),
                    current = current_count,
                    "Discarding stale background result (note count drifted)"
                );
                return;
            }

            let mut entry = cache.lock().expect("cache mutex poisoned");
            if entry.generation != captured_generation {
                warn!(
                    captured = captured_generation,
                    current = entry.generation,
                    "Discarding superseded background result"
                );
                return;
            }
            entry.store(aggregated, Some(multi_scale), snapshot.len(), now_ms);
        }));
    }
}

impl Default for AdaptiveProcessor {
    fn default() -> Self {
        Self::new(ProcessorConfig::default())
    }
}
