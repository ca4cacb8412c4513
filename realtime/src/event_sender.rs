use std::{
    path::Path,
    sync::{Arc, RwLock},
};

use crossbeam_channel::Sender;

use spherest_core::{
    sample::{
        audio::{base_key_from_path, load_audio_file, AudioLoadError},
        SampleData,
    },
    sampler::{SamplerAudioEvent, SamplerConfigEvent, SamplerEvent},
    voice::{EnvelopeDescriptor, EnvelopeError},
    AudioStreamParams,
};

/// The decibel range the output gain control accepts.
pub const GAIN_DB_RANGE: (f32, f32) = (-20.0, 20.0);

/// The last control values pushed to the engine, readable by the UI thread.
struct ControlState {
    envelope: EnvelopeDescriptor,
    gain_db: f32,
}

/// A helper object to send events to the realtime sampler.
///
/// Cloning the sender is cheap; all clones share the same control state
/// and feed the same engine.
#[derive(Clone)]
pub struct SamplerEventSender {
    sender: Sender<SamplerEvent>,
    control: Arc<RwLock<ControlState>>,
    stream_params: AudioStreamParams,
}

impl SamplerEventSender {
    pub(super) fn new(
        sender: Sender<SamplerEvent>,
        stream_params: AudioStreamParams,
    ) -> SamplerEventSender {
        SamplerEventSender {
            sender,
            control: Arc::new(RwLock::new(ControlState {
                envelope: Default::default(),
                gain_db: 0.0,
            })),
            stream_params,
        }
    }

    /// Sends a SamplerEvent to the realtime sampler.
    pub fn send_event(&self, event: SamplerEvent) {
        self.sender.send(event).ok();
    }

    pub fn note_on(&self, key: u8, vel: u8) {
        if key > 127 {
            return;
        }
        self.send_event(SamplerEvent::Audio(SamplerAudioEvent::NoteOn { key, vel }));
    }

    pub fn note_off(&self, key: u8) {
        if key > 127 {
            return;
        }
        self.send_event(SamplerEvent::Audio(SamplerAudioEvent::NoteOff { key }));
    }

    /// Releases every sounding note, letting their release phases play out.
    pub fn all_notes_off(&self) {
        self.send_event(SamplerEvent::Audio(SamplerAudioEvent::AllNotesOff));
    }

    /// Kills every voice immediately, without release.
    pub fn reset(&self) {
        self.send_event(SamplerEvent::Audio(SamplerAudioEvent::AllNotesKilled));
    }

    /// Sends a MIDI event as raw bytes.
    pub fn send_event_u32(&self, event: u32) {
        let head = event & 0xFF;
        let code = head >> 4;

        let val1 = (event >> 8) as u8;
        let val2 = (event >> 16) as u8;

        match code {
            0x8 => self.note_off(val1),
            0x9 => {
                // A note on with zero velocity is a note off.
                if val2 == 0 {
                    self.note_off(val1);
                } else {
                    self.note_on(val1, val2);
                }
            }
            _ => {}
        }
    }

    /// Decodes the audio file at `path`, resamples it to the stream's sample
    /// rate and swaps it into the sampler. Returns the base key parsed from
    /// the file name.
    pub fn load_sample(&self, path: impl AsRef<Path>) -> Result<u8, AudioLoadError> {
        let path = path.as_ref();
        let decoded = load_audio_file(path, self.stream_params.sample_rate as f32)?;
        let base_key = base_key_from_path(path);

        let sample = Arc::new(SampleData::new(
            decoded.channels,
            self.stream_params.sample_rate,
            base_key,
        ));

        self.send_event(SamplerEvent::Config(SamplerConfigEvent::SetSample(Some(
            sample,
        ))));

        Ok(base_key)
    }

    /// Unloads the current sample. Sounding voices are killed.
    pub fn clear_sample(&self) {
        self.send_event(SamplerEvent::Config(SamplerConfigEvent::SetSample(None)));
    }

    /// Replaces the whole envelope at once. Fails without sending anything
    /// if the descriptor is invalid.
    pub fn set_envelope(&self, envelope: EnvelopeDescriptor) -> Result<(), EnvelopeError> {
        envelope.validate()?;
        self.control.write().unwrap().envelope = envelope;
        self.send_event(SamplerEvent::Config(SamplerConfigEvent::SetEnvelope(
            envelope,
        )));
        Ok(())
    }

    pub fn set_attack(&self, seconds: f32) -> Result<(), EnvelopeError> {
        let mut envelope = self.envelope();
        envelope.attack = seconds;
        self.set_envelope(envelope)
    }

    pub fn set_decay(&self, seconds: f32) -> Result<(), EnvelopeError> {
        let mut envelope = self.envelope();
        envelope.decay = seconds;
        self.set_envelope(envelope)
    }

    pub fn set_sustain(&self, level: f32) -> Result<(), EnvelopeError> {
        let mut envelope = self.envelope();
        envelope.sustain = level;
        self.set_envelope(envelope)
    }

    pub fn set_release(&self, seconds: f32) -> Result<(), EnvelopeError> {
        let mut envelope = self.envelope();
        envelope.release = seconds;
        self.set_envelope(envelope)
    }

    /// Sets the output gain in decibels, clamped to [`GAIN_DB_RANGE`].
    pub fn set_gain_db(&self, db: f32) {
        let db = db.clamp(GAIN_DB_RANGE.0, GAIN_DB_RANGE.1);
        self.control.write().unwrap().gain_db = db;
        self.send_event(SamplerEvent::Config(SamplerConfigEvent::SetGainDb(db)));
    }

    pub fn envelope(&self) -> EnvelopeDescriptor {
        self.control.read().unwrap().envelope
    }

    pub fn attack(&self) -> f32 {
        self.envelope().attack
    }

    pub fn decay(&self) -> f32 {
        self.envelope().decay
    }

    pub fn sustain(&self) -> f32 {
        self.envelope().sustain
    }

    pub fn release(&self) -> f32 {
        self.envelope().release
    }

    pub fn gain_db(&self) -> f32 {
        self.control.read().unwrap().gain_db
    }

    pub fn stream_params(&self) -> &AudioStreamParams {
        &self.stream_params
    }
}
