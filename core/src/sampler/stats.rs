use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
    Arc,
};

/// Shared counters the engine updates after every block, readable from any
/// thread without touching the engine itself.
#[derive(Debug, Clone)]
pub struct SamplerStats {
    pub(super) voice_counter: Arc<AtomicU64>,
    pub(super) sample_loaded: Arc<AtomicBool>,
    pub(super) base_key: Arc<AtomicU8>,
}

impl SamplerStats {
    pub(super) fn new() -> Self {
        Self {
            voice_counter: Arc::new(AtomicU64::new(0)),
            sample_loaded: Arc::new(AtomicBool::new(false)),
            base_key: Arc::new(AtomicU8::new(crate::sample::DEFAULT_BASE_KEY)),
        }
    }
}

/// Read-only view of the sampler state for UI display.
#[derive(Debug, Clone)]
pub struct SamplerStatsReader {
    stats: SamplerStats,
}

impl SamplerStatsReader {
    pub(super) fn new(stats: SamplerStats) -> Self {
        Self { stats }
    }

    /// The number of currently sounding voices.
    pub fn voice_count(&self) -> u64 {
        self.stats.voice_counter.load(Ordering::Relaxed)
    }

    /// Whether a sample is currently loaded.
    pub fn is_sample_loaded(&self) -> bool {
        self.stats.sample_loaded.load(Ordering::Relaxed)
    }

    /// The base key of the loaded sample, or the default when none is loaded.
    pub fn base_key(&self) -> u8 {
        self.stats.base_key.load(Ordering::Relaxed)
    }
}
