use std::sync::Arc;

pub mod audio;

/// The default base key when a sample carries no pitch tag: middle C.
pub const DEFAULT_BASE_KEY: u8 = 60;

/// Type of the audio sample interpolation algorithm.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Interpolator {
    /// Nearest neighbor interpolation
    Nearest,

    /// Linear interpolation
    Linear,
}

/// The current loaded sample: per-channel PCM, its native sample rate and
/// the MIDI key at which it plays back at its recorded speed.
///
/// A `SampleData` is immutable once built. Loading a new file builds a new
/// instance and swaps the `Arc` handle; voices spawned from the old sample
/// keep their own handle, so the audio buffer can never be freed while a
/// voice is reading it.
#[derive(Debug)]
pub struct SampleData {
    channels: Arc<[Arc<[f32]>]>,
    sample_rate: u32,
    base_key: u8,
    length: usize,
}

impl SampleData {
    /// Builds a sample from per-channel PCM data.
    ///
    /// Panics if `channels` is empty or `base_key` is out of MIDI range;
    /// both are enforced by the loading path.
    pub fn new(channels: Arc<[Arc<[f32]>]>, sample_rate: u32, base_key: u8) -> Self {
        assert!(!channels.is_empty());
        assert!(base_key <= 127);
        let length = channels[0].len();
        SampleData {
            channels,
            sample_rate,
            base_key,
            length,
        }
    }

    pub fn base_key(&self) -> u8 {
        self.base_key
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Valid length in frames.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline(always)]
    fn get(&self, channel: usize, pos: usize) -> f32 {
        match self.channels[channel].get(pos) {
            Some(v) => *v,
            None => 0.0,
        }
    }

    /// Reads one channel at a fractional frame position.
    #[inline(always)]
    pub fn read(&self, channel: usize, cursor: f64, interpolator: Interpolator) -> f32 {
        match interpolator {
            Interpolator::Nearest => self.get(channel, (cursor + 0.5) as usize),
            Interpolator::Linear => {
                let index = cursor as usize;
                let fractional = (cursor - index as f64) as f32;
                let first = self.get(channel, index);
                let second = self.get(channel, index + 1);
                first * (1.0 - fractional) + second * fractional
            }
        }
    }
}
