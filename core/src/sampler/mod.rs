use std::sync::{atomic::Ordering, Arc};

use crate::{
    sample::{Interpolator, SampleData},
    voice::{EnvelopeDescriptor, EnvelopeParameters, SamplerVoice},
    AudioPipe, AudioStreamParams,
};

mod gain;
use gain::SmoothedGain;
pub use gain::GAIN_RAMP_SECONDS;

mod voice_pool;
use voice_pool::VoicePool;

mod stats;
pub use stats::*;

mod event;
pub use event::*;

/// Options for initializing a new sampler engine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SamplerInitOptions {
    /// The maximum number of voices that can sound at once.
    ///
    /// Default: `16`
    pub max_voices: usize,

    /// The type of interpolator used when reading the sample at fractional
    /// positions. See the `Interpolator` enum for the options.
    ///
    /// Default: `Linear`
    pub interpolator: Interpolator,
}

impl Default for SamplerInitOptions {
    fn default() -> Self {
        Self {
            max_voices: 16,
            interpolator: Interpolator::Linear,
        }
    }
}

/// The sampler engine: one loaded sample mapped across the MIDI keyboard,
/// played through a fixed voice pool with ADSR shaping and a smoothed
/// output gain.
///
/// The engine is single owner: it is driven entirely through
/// `process_event`/`push_events_iter` and `AudioPipe::read_samples` from
/// whichever thread owns it. Events are applied at block boundaries, before
/// the samples of the next block are rendered.
///
/// The render path never allocates, blocks, or fails; without a loaded
/// sample (or with all voices busy) it degrades to dropping note events and
/// rendering silence.
pub struct SamplerEngine {
    pool: VoicePool,
    sample: Option<Arc<SampleData>>,
    envelope: EnvelopeParameters,
    gain: SmoothedGain,
    stats: SamplerStats,
    options: SamplerInitOptions,
    stream_params: AudioStreamParams,
}

impl SamplerEngine {
    pub fn new(options: SamplerInitOptions, stream_params: AudioStreamParams) -> Self {
        let envelope = EnvelopeDescriptor::default()
            .to_envelope_params(stream_params.sample_rate)
            .expect("default envelope is valid");

        SamplerEngine {
            pool: VoicePool::new(options.max_voices),
            sample: None,
            envelope,
            gain: SmoothedGain::new(stream_params.sample_rate),
            stats: SamplerStats::new(),
            options,
            stream_params,
        }
    }

    pub fn process_event(&mut self, event: SamplerEvent) {
        self.push_events_iter(std::iter::once(event));
    }

    pub fn push_events_iter<T: Iterator<Item = SamplerEvent>>(&mut self, iter: T) {
        for event in iter {
            match event {
                SamplerEvent::Audio(audio) => match audio {
                    SamplerAudioEvent::NoteOn { key, vel } => self.note_on(key, vel),
                    SamplerAudioEvent::NoteOff { key } => self.pool.release_key(key),
                    SamplerAudioEvent::AllNotesOff => self.pool.release_all(),
                    SamplerAudioEvent::AllNotesKilled => self.pool.kill_all(),
                },
                SamplerEvent::Config(config) => match config {
                    SamplerConfigEvent::SetSample(sample) => self.set_sample(sample),
                    SamplerConfigEvent::SetEnvelope(descriptor) => self.set_envelope(descriptor),
                    SamplerConfigEvent::SetGainDb(db) => self.gain.set_target_db(db),
                },
            }
        }
    }

    fn note_on(&mut self, key: u8, vel: u8) {
        if key > 127 || vel == 0 {
            return;
        }

        // Without a loaded sample the note is dropped, not an error
        let sample = match &self.sample {
            Some(sample) => sample.clone(),
            None => return,
        };

        let voice = SamplerVoice::spawn(
            key,
            vel,
            sample,
            self.envelope,
            self.options.interpolator,
        );

        // When every slot is busy with a non-releasing voice the note is
        // dropped.
        self.pool.push_voice(voice);
    }

    fn set_sample(&mut self, sample: Option<Arc<SampleData>>) {
        // All voices referencing the previous sample are cut before the swap
        // becomes observable.
        self.pool.kill_all();

        match &sample {
            Some(sample) => {
                self.stats.base_key.store(sample.base_key(), Ordering::Relaxed);
                self.stats.sample_loaded.store(true, Ordering::Relaxed);
            }
            None => {
                self.stats
                    .base_key
                    .store(crate::sample::DEFAULT_BASE_KEY, Ordering::Relaxed);
                self.stats.sample_loaded.store(false, Ordering::Relaxed);
            }
        }

        self.sample = sample;
    }

    fn set_envelope(&mut self, descriptor: EnvelopeDescriptor) {
        // Malformed descriptors are rejected at the sender boundary; a bad
        // one arriving here is ignored rather than disturbing playback.
        if let Ok(envelope) = descriptor.to_envelope_params(self.stream_params.sample_rate) {
            self.envelope = envelope;
            self.pool.process_params(envelope);
        }
    }

    pub fn get_stats(&self) -> SamplerStatsReader {
        SamplerStatsReader::new(self.stats.clone())
    }

    pub fn voice_count(&self) -> usize {
        self.pool.voice_count()
    }

    fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);

        let channels = self.stream_params.channels.count();
        self.pool.render_to(out, channels);
        self.gain.apply_to(out, channels);

        self.stats
            .voice_counter
            .store(self.pool.voice_count() as u64, Ordering::Relaxed);
    }
}

impl AudioPipe for SamplerEngine {
    fn stream_params(&self) -> &AudioStreamParams {
        &self.stream_params
    }

    fn read_samples_unchecked(&mut self, out: &mut [f32]) {
        self.render(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelCount;

    const RATE: u32 = 1000;

    fn engine() -> SamplerEngine {
        SamplerEngine::new(
            SamplerInitOptions {
                max_voices: 4,
                ..Default::default()
            },
            AudioStreamParams::new(RATE, ChannelCount::Stereo),
        )
    }

    fn load_test_sample(engine: &mut SamplerEngine, frames: usize) {
        let data: Arc<[f32]> = Arc::from(vec![0.5f32; frames].into_boxed_slice());
        let channels: Arc<[Arc<[f32]>]> = vec![data.clone(), data].into_iter().collect();
        let sample = Arc::new(SampleData::new(channels, RATE, 60));
        engine.process_event(SamplerEvent::Config(SamplerConfigEvent::SetSample(Some(
            sample,
        ))));
    }

    fn note_on(engine: &mut SamplerEngine, key: u8) {
        engine.process_event(SamplerEvent::Audio(SamplerAudioEvent::NoteOn {
            key,
            vel: 127,
        }));
    }

    fn note_off(engine: &mut SamplerEngine, key: u8) {
        engine.process_event(SamplerEvent::Audio(SamplerAudioEvent::NoteOff { key }));
    }

    #[test]
    fn test_no_sample_renders_silence() {
        let mut engine = engine();
        note_on(&mut engine, 60);
        assert_eq!(engine.voice_count(), 0);

        let mut out = vec![1.0f32; 64];
        engine.read_samples(&mut out);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_note_lifecycle_returns_free_slots() {
        let mut engine = engine();
        load_test_sample(&mut engine, 100_000);

        note_on(&mut engine, 60);
        assert_eq!(engine.voice_count(), 1);

        let mut out = vec![0.0f32; 64];
        engine.read_samples(&mut out);
        assert!(out.iter().any(|&v| v != 0.0));

        note_off(&mut engine, 60);
        // Default release is 0.1s = 100 samples at the test rate
        let mut out = vec![0.0f32; 512];
        engine.read_samples(&mut out);
        assert_eq!(engine.voice_count(), 0);
    }

    #[test]
    fn test_polyphony_bound_drops_extra_notes() {
        let mut engine = engine();
        load_test_sample(&mut engine, 100_000);

        for key in 0..5 {
            note_on(&mut engine, key);
        }
        assert_eq!(engine.voice_count(), 4);
    }

    #[test]
    fn test_sample_hot_swap_invalidates_voices() {
        let mut engine = engine();
        load_test_sample(&mut engine, 100_000);

        note_on(&mut engine, 60);
        note_on(&mut engine, 64);
        assert_eq!(engine.voice_count(), 2);

        load_test_sample(&mut engine, 50_000);
        assert_eq!(engine.voice_count(), 0);
        assert!(engine.get_stats().is_sample_loaded());

        // The engine keeps rendering cleanly after the swap
        note_on(&mut engine, 60);
        let mut out = vec![0.0f32; 64];
        engine.read_samples(&mut out);
        assert!(out.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_unload_silences_and_clears_status() {
        let mut engine = engine();
        load_test_sample(&mut engine, 1000);
        note_on(&mut engine, 60);

        engine.process_event(SamplerEvent::Config(SamplerConfigEvent::SetSample(None)));
        assert_eq!(engine.voice_count(), 0);
        assert!(!engine.get_stats().is_sample_loaded());

        note_on(&mut engine, 60);
        assert_eq!(engine.voice_count(), 0);
    }

    #[test]
    fn test_gain_event_scales_output() {
        let mut engine = engine();
        load_test_sample(&mut engine, 100_000);

        // Silence the output entirely (-inf dB is not representable on the
        // dial; -120 dB is close enough to measure against)
        engine.process_event(SamplerEvent::Config(SamplerConfigEvent::SetGainDb(-120.0)));

        note_on(&mut engine, 60);
        // Let the 20ms ramp settle first
        let mut out = vec![0.0f32; 128];
        engine.read_samples(&mut out);

        out.fill(0.0);
        engine.read_samples(&mut out);
        assert!(out.iter().all(|&v| v.abs() < 1e-5));
    }

    #[test]
    fn test_envelope_event_applies_to_new_notes() {
        let mut engine = engine();
        load_test_sample(&mut engine, 100_000);

        engine.process_event(SamplerEvent::Config(SamplerConfigEvent::SetEnvelope(
            EnvelopeDescriptor {
                attack: 1.0,
                decay: 0.1,
                sustain: 1.0,
                release: 0.1,
            },
        )));

        note_on(&mut engine, 60);
        let mut out = vec![0.0f32; 64];
        engine.read_samples(&mut out);

        // A 1 second attack at 1kHz has barely opened after 32 frames
        assert!(out.iter().all(|&v| v.abs() < 0.05));
    }

    #[test]
    fn test_stats_reader_tracks_engine() {
        let mut engine = engine();
        let stats = engine.get_stats();
        assert!(!stats.is_sample_loaded());
        assert_eq!(stats.base_key(), 60);

        load_test_sample(&mut engine, 1000);
        note_on(&mut engine, 72);

        let mut out = vec![0.0f32; 32];
        engine.read_samples(&mut out);
        assert_eq!(stats.voice_count(), 1);
        assert!(stats.is_sample_loaded());
    }
}
