use std::sync::Arc;

use crate::sample::{Interpolator, SampleData};

mod envelope;
pub use envelope::*;

/// One sounding instance of the loaded sample, pinned to a single MIDI key.
///
/// The voice owns its playback cursor and envelope. It holds a non-owning
/// (reference counted) handle to the sample data, so a sample hot-swap can
/// never invalidate the buffer under a running voice.
pub struct SamplerVoice {
    key: u8,
    velocity: u8,
    vel_amp: f32,
    pitch_ratio: f64,
    cursor: f64,
    sample: Arc<SampleData>,
    interpolator: Interpolator,
    envelope: VoiceEnvelope,
    releasing: bool,
}

impl SamplerVoice {
    pub fn spawn(
        key: u8,
        velocity: u8,
        sample: Arc<SampleData>,
        envelope: EnvelopeParameters,
        interpolator: Interpolator,
    ) -> Self {
        let semitones = key as f64 - sample.base_key() as f64;
        SamplerVoice {
            key,
            velocity,
            vel_amp: velocity as f32 / 127.0,
            pitch_ratio: 2.0f64.powf(semitones / 12.0),
            cursor: 0.0,
            sample,
            interpolator,
            envelope: VoiceEnvelope::new(envelope),
            releasing: false,
        }
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn pitch_ratio(&self) -> f64 {
        self.pitch_ratio
    }

    pub fn is_releasing(&self) -> bool {
        self.releasing
    }

    /// Moves the voice's envelope to the release stage from its current
    /// level. No-op if already releasing.
    pub fn signal_release(&mut self) {
        if self.releasing {
            return;
        }
        self.releasing = true;
        self.envelope.signal_release();
    }

    /// Applies a new envelope snapshot to the running voice.
    pub fn process_params(&mut self, envelope: EnvelopeParameters) {
        self.envelope.update_params(envelope);
    }

    /// The voice is done once its envelope finished, or once the cursor has
    /// played past the end of the sample (one shot, no looping).
    #[inline(always)]
    pub fn ended(&self) -> bool {
        self.envelope.ended() || self.cursor >= self.sample.length() as f64
    }

    /// Renders the voice additively into an interleaved output buffer.
    ///
    /// Each output frame reads the sample at the fractional cursor, scales it
    /// by the envelope gain and the note velocity, then advances the cursor
    /// by the pitch ratio.
    pub fn render_to(&mut self, out: &mut [f32], channels: u16) {
        let channels = channels as usize;
        let last_sample_channel = self.sample.channel_count() - 1;

        for frame in out.chunks_exact_mut(channels) {
            if self.ended() {
                break;
            }

            let gain = self.envelope.next_sample() * self.vel_amp;
            for (c, value) in frame.iter_mut().enumerate() {
                let chan = c.min(last_sample_channel);
                *value += self.sample.read(chan, self.cursor, self.interpolator) * gain;
            }

            self.cursor += self.pitch_ratio;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sample(frames: Vec<f32>, base_key: u8) -> Arc<SampleData> {
        let channels: Arc<[Arc<[f32]>]> = vec![Arc::from(frames.into_boxed_slice())]
            .into_iter()
            .collect();
        Arc::new(SampleData::new(channels, 44100, base_key))
    }

    fn flat_envelope() -> EnvelopeParameters {
        // Attack short enough to be inaudible in the assertions below
        EnvelopeDescriptor {
            attack: 0.0001,
            decay: 0.0001,
            sustain: 1.0,
            release: 0.0001,
        }
        .to_envelope_params(44100)
        .unwrap()
    }

    #[test]
    fn test_pitch_ratio_law() {
        let sample = test_sample(vec![0.0; 64], 60);
        let env = flat_envelope();

        let unison = SamplerVoice::spawn(60, 127, sample.clone(), env, Interpolator::Linear);
        assert_eq!(unison.pitch_ratio(), 1.0);

        let octave_up = SamplerVoice::spawn(72, 127, sample.clone(), env, Interpolator::Linear);
        assert_eq!(octave_up.pitch_ratio(), 2.0);

        let octave_down = SamplerVoice::spawn(48, 127, sample, env, Interpolator::Linear);
        assert_eq!(octave_down.pitch_ratio(), 0.5);
    }

    #[test]
    fn test_voice_plays_through_once() {
        let sample = test_sample(vec![1.0; 100], 60);
        let mut voice = SamplerVoice::spawn(60, 127, sample, flat_envelope(), Interpolator::Linear);

        let mut out = vec![0.0f32; 256];
        voice.render_to(&mut out, 2);
        assert!(voice.ended());

        // Playback stops at the sample end instead of wrapping
        assert_eq!(out[200..], vec![0.0; 56]);
        // The bulk of the buffer carries the sample through the envelope
        assert!(out[64] > 0.9);
    }

    #[test]
    fn test_velocity_scales_output() {
        let sample = test_sample(vec![1.0; 1000], 60);

        let mut loud = SamplerVoice::spawn(
            60,
            127,
            sample.clone(),
            flat_envelope(),
            Interpolator::Linear,
        );
        let mut soft = SamplerVoice::spawn(60, 64, sample, flat_envelope(), Interpolator::Linear);

        let mut out_loud = vec![0.0f32; 128];
        let mut out_soft = vec![0.0f32; 128];
        loud.render_to(&mut out_loud, 2);
        soft.render_to(&mut out_soft, 2);

        let expected = 64.0 / 127.0;
        assert!((out_soft[100] / out_loud[100] - expected).abs() < 1e-4);
    }

    #[test]
    fn test_release_finishes_voice_before_sample_end() {
        let sample = test_sample(vec![1.0; 100_000], 60);
        let mut voice = SamplerVoice::spawn(60, 127, sample, flat_envelope(), Interpolator::Linear);

        let mut out = vec![0.0f32; 64];
        voice.render_to(&mut out, 2);
        assert!(!voice.ended());

        voice.signal_release();
        assert!(voice.is_releasing());

        // The release is 0.0001s, so a couple more blocks drain it fully
        let mut out = vec![0.0f32; 256];
        voice.render_to(&mut out, 2);
        assert!(voice.ended());
    }
}
