use spherest_core::sampler::SamplerInitOptions;

/// Configuration for the realtime sampler.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RealtimeSamplerConfig {
    /// The length of the buffered render window, in milliseconds.
    pub render_window_ms: f64,

    /// Options to initialize the sampler engine with.
    pub init_options: SamplerInitOptions,
}

impl Default for RealtimeSamplerConfig {
    fn default() -> Self {
        Self {
            render_window_ms: 10.0,
            init_options: Default::default(),
        }
    }
}
