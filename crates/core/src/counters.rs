use std::sync::atomic::{AtomicU64, Ordering};

/// Lightweight per-stream counters for decode and cache behavior.
///
/// # Example
/// ```rust
/// use scrub_core::counters::Counters;
///
/// let counters = Counters::default();
/// counters.decode();
/// assert_eq!(counters.decode_calls(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Counters {
    decode_calls: AtomicU64,
    cache_hits: AtomicU64,
    reseeks: AtomicU64,
    dropped_frames: AtomicU64,
}

impl Counters {
    /// Record one decode attempt handed to the engine.
    pub fn decode(&self) {
        self.decode_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request served from the cached frame pair.
    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a backtracking reseek to an earlier keyframe.
    pub fn reseek(&self) {
        self.reseeks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a zero-byte coded unit.
    pub fn dropped(&self) {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of decode attempts.
    pub fn decode_calls(&self) -> u64 {
        self.decode_calls.load(Ordering::Relaxed)
    }

    /// Snapshot of cache hits.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Snapshot of keyframe reseeks.
    pub fn reseeks(&self) -> u64 {
        self.reseeks.load(Ordering::Relaxed)
    }

    /// Snapshot of dropped coded units.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

impl Clone for Counters {
    fn clone(&self) -> Self {
        let cloned = Counters::default();
        cloned
            .decode_calls
            .store(self.decode_calls(), Ordering::Relaxed);
        cloned
            .cache_hits
            .store(self.cache_hits(), Ordering::Relaxed);
        cloned.reseeks.store(self.reseeks(), Ordering::Relaxed);
        cloned
            .dropped_frames
            .store(self.dropped_frames(), Ordering::Relaxed);
        cloned
    }
}
