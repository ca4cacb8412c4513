use std::sync::Arc;

use crate::sample::SampleData;
use crate::voice::EnvelopeDescriptor;

/// Note and control events for the sampler.
#[derive(Debug, Clone)]
pub enum SamplerAudioEvent {
    /// Starts a new note voice with a velocity
    NoteOn { key: u8, vel: u8 },
    /// Signals off to a note voice
    NoteOff { key: u8 },
    /// Signals off to all note voices
    AllNotesOff,
    /// Kills all note voices without decay
    AllNotesKilled,
}

/// Configuration events for the sampler.
#[derive(Debug, Clone)]
pub enum SamplerConfigEvent {
    /// Replaces the loaded sample. `None` unloads it, silencing all voices.
    SetSample(Option<Arc<SampleData>>),
    /// Replaces the envelope as one whole snapshot, so a render block can
    /// never observe a torn mix of old and new fields.
    SetEnvelope(EnvelopeDescriptor),
    /// Sets the output gain target, in decibels.
    SetGainDb(f32),
}

#[derive(Debug, Clone)]
pub enum SamplerEvent {
    /// Audio event for the sampler
    Audio(SamplerAudioEvent),

    /// Config event for the sampler
    Config(SamplerConfigEvent),
}
