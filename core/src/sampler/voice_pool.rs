use crate::voice::{EnvelopeParameters, SamplerVoice};

struct PooledVoice {
    /// Monotonic trigger id, used as the age ordering for stealing.
    id: u64,
    voice: SamplerVoice,
}

/// A fixed capacity pool of sounding voices.
///
/// Allocation policy: a note on takes a free slot when one exists. When the
/// pool is full, the oldest-triggered *releasing* voice is stolen; a voice
/// that is still attacking or sustaining is never stolen, and the note on is
/// dropped instead.
pub struct VoicePool {
    capacity: usize,
    id_counter: u64,
    voices: Vec<PooledVoice>,
}

impl VoicePool {
    pub fn new(capacity: usize) -> Self {
        VoicePool {
            capacity,
            id_counter: 0,
            voices: Vec::with_capacity(capacity),
        }
    }

    fn next_id(&mut self) -> u64 {
        self.id_counter += 1;
        self.id_counter
    }

    /// Adds a new voice to the pool. Returns false if the note had to be
    /// dropped because every slot holds a non-releasing voice.
    pub fn push_voice(&mut self, voice: SamplerVoice) -> bool {
        let id = self.next_id();

        if self.voices.len() < self.capacity {
            self.voices.push(PooledVoice { id, voice });
            return true;
        }

        let oldest_releasing = self
            .voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.voice.is_releasing())
            .min_by_key(|(_, v)| v.id)
            .map(|(i, _)| i);

        match oldest_releasing {
            Some(index) => {
                self.voices[index] = PooledVoice { id, voice };
                true
            }
            None => false,
        }
    }

    /// Releases every voice currently assigned to the key.
    pub fn release_key(&mut self, key: u8) {
        for pooled in self.voices.iter_mut() {
            if pooled.voice.key() == key {
                pooled.voice.signal_release();
            }
        }
    }

    /// Releases all voices, letting them decay naturally.
    pub fn release_all(&mut self) {
        for pooled in self.voices.iter_mut() {
            pooled.voice.signal_release();
        }
    }

    /// Drops all voices without decay. Used when the sample is hot-swapped,
    /// so no voice ever reads a stale sample generation.
    pub fn kill_all(&mut self) {
        self.voices.clear();
        self.id_counter = 0;
    }

    /// Propagates a new envelope snapshot to every running voice.
    pub fn process_params(&mut self, envelope: EnvelopeParameters) {
        for pooled in self.voices.iter_mut() {
            pooled.voice.process_params(envelope);
        }
    }

    /// Renders every voice additively into the output, then retires the
    /// voices that finished during this block.
    pub fn render_to(&mut self, out: &mut [f32], channels: u16) {
        for pooled in self.voices.iter_mut() {
            pooled.voice.render_to(out, channels);
        }
        self.voices.retain(|pooled| !pooled.voice.ended());
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_slots(&self) -> usize {
        self.capacity - self.voices.len()
    }

    pub fn has_voices(&self) -> bool {
        !self.voices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Interpolator, SampleData};
    use crate::voice::EnvelopeDescriptor;
    use std::sync::Arc;

    const RATE: u32 = 1000;

    fn test_sample() -> Arc<SampleData> {
        let frames: Arc<[f32]> = Arc::from(vec![1.0f32; 1_000_000].into_boxed_slice());
        let channels: Arc<[Arc<[f32]>]> = vec![frames].into_iter().collect();
        Arc::new(SampleData::new(channels, RATE, 60))
    }

    fn spawn(key: u8) -> SamplerVoice {
        let envelope = EnvelopeDescriptor {
            attack: 0.01,
            decay: 0.01,
            sustain: 0.5,
            release: 0.05,
        }
        .to_envelope_params(RATE)
        .unwrap();
        SamplerVoice::spawn(key, 127, test_sample(), envelope, Interpolator::Linear)
    }

    #[test]
    fn test_polyphony_bound() {
        let mut pool = VoicePool::new(4);
        for key in 0..4 {
            assert!(pool.push_voice(spawn(key)));
        }
        // Every slot holds an active voice, so the extra note is dropped
        assert!(!pool.push_voice(spawn(4)));
        assert_eq!(pool.voice_count(), 4);

        let keys: Vec<u8> = (0..4).collect();
        for key in keys {
            pool.release_key(key);
        }
    }

    #[test]
    fn test_steals_oldest_releasing_voice() {
        let mut pool = VoicePool::new(3);
        pool.push_voice(spawn(10));
        pool.push_voice(spawn(11));
        pool.push_voice(spawn(12));

        pool.release_key(11);
        pool.release_key(10);

        // Key 11 released first but key 10 was *triggered* first; age is
        // trigger order, so key 10 is the steal target.
        assert!(pool.push_voice(spawn(13)));
        assert_eq!(pool.voice_count(), 3);

        let mut out = vec![0.0f32; 8];
        pool.render_to(&mut out, 2);
        let keys: Vec<u8> = {
            let mut k: Vec<u8> = pool.voices.iter().map(|p| p.voice.key()).collect();
            k.sort();
            k
        };
        assert_eq!(keys, vec![11, 12, 13]);
    }

    #[test]
    fn test_note_off_frees_slot_after_release() {
        let mut pool = VoicePool::new(2);
        pool.push_voice(spawn(60));
        assert_eq!(pool.free_slots(), 1);

        pool.release_key(60);
        assert_eq!(pool.voice_count(), 1);

        // 0.05s of release at 1kHz is 50 samples; a few stereo blocks are
        // plenty to drain it.
        let mut out = vec![0.0f32; 64];
        for _ in 0..4 {
            out.fill(0.0);
            pool.render_to(&mut out, 2);
        }
        assert_eq!(pool.free_slots(), 2);
        assert!(!pool.has_voices());
    }

    #[test]
    fn test_kill_all_clears_immediately() {
        let mut pool = VoicePool::new(8);
        for key in 0..5 {
            pool.push_voice(spawn(key));
        }
        pool.kill_all();
        assert_eq!(pool.voice_count(), 0);
        assert_eq!(pool.free_slots(), 8);
    }
}
