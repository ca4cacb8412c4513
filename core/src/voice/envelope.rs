use thiserror::Error;

/// The stages in the amplitude envelope as a numbered enum.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnvelopeStage {
    Attack = 0,
    Decay = 1,
    Sustain = 2,
    Release = 3, // Goes to this stage as soon as the voice is released
    Finished = 4,
}

impl EnvelopeStage {
    pub fn as_usize(&self) -> usize {
        *self as usize
    }

    pub fn next_stage(&self) -> EnvelopeStage {
        match self {
            EnvelopeStage::Attack => EnvelopeStage::Decay,
            EnvelopeStage::Decay => EnvelopeStage::Sustain,
            EnvelopeStage::Sustain => EnvelopeStage::Release,
            EnvelopeStage::Release => EnvelopeStage::Finished,
            EnvelopeStage::Finished => EnvelopeStage::Finished,
        }
    }
}

/// Errors returned when an envelope descriptor fails validation.
///
/// Validation happens when a descriptor is converted to parameters, so the
/// render path never has to check for malformed values.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum EnvelopeError {
    #[error("envelope {name} time must be positive, got {value}")]
    NonPositiveTime { name: &'static str, value: f32 },

    #[error("envelope sustain level must be within (0, 1], got {value}")]
    SustainOutOfRange { value: f32 },
}

/// The user-facing envelope descriptor, with times in seconds and the
/// sustain level as a 0-1 amplitude fraction.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EnvelopeDescriptor {
    pub attack: f32,  // Seconds
    pub decay: f32,   // Seconds
    pub sustain: f32, // Level (0-1)
    pub release: f32, // Seconds
}

impl Default for EnvelopeDescriptor {
    fn default() -> Self {
        Self {
            attack: 0.1,
            decay: 0.1,
            sustain: 1.0,
            release: 0.1,
        }
    }
}

impl EnvelopeDescriptor {
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        for (name, value) in [
            ("attack", self.attack),
            ("decay", self.decay),
            ("release", self.release),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(EnvelopeError::NonPositiveTime { name, value });
            }
        }
        if !(self.sustain > 0.0 && self.sustain <= 1.0) {
            return Err(EnvelopeError::SustainOutOfRange {
                value: self.sustain,
            });
        }
        Ok(())
    }

    /// Converts the descriptor into sample-count parameters for the given
    /// stream sample rate.
    #[allow(clippy::wrong_self_convention)]
    pub fn to_envelope_params(
        &self,
        sample_rate: u32,
    ) -> Result<EnvelopeParameters, EnvelopeError> {
        self.validate()?;
        let sample_rate = sample_rate as f32;

        Ok(EnvelopeParameters {
            parts: [
                // Attack
                EnvelopePart::lerp(1.0, (self.attack * sample_rate) as u32),
                // Decay
                EnvelopePart::lerp(self.sustain, (self.decay * sample_rate) as u32),
                // Sustain
                EnvelopePart::hold(self.sustain),
                // Release
                EnvelopePart::lerp(0.0, (self.release * sample_rate) as u32),
                // Finished
                EnvelopePart::hold(0.0),
            ],
        })
    }
}

/// A single segment of the envelope. All ramps are linear.
#[derive(Debug, Clone, Copy)]
pub enum EnvelopePart {
    Lerp {
        target: f32,   // Target value by the end of the envelope part
        duration: u32, // Duration in samples
    },
    Hold(f32),
}

impl EnvelopePart {
    pub fn lerp(target: f32, duration: u32) -> EnvelopePart {
        EnvelopePart::Lerp { target, duration }
    }

    pub fn hold(value: f32) -> EnvelopePart {
        EnvelopePart::Hold(value)
    }
}

/// The raw envelope parameters used to generate the envelope, with stage
/// durations pre-converted to sample counts. Use `EnvelopeDescriptor` to
/// build this struct.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeParameters {
    parts: [EnvelopePart; 5],
}

impl EnvelopeParameters {
    fn get_stage_data(&self, stage: EnvelopeStage, start_amp: f32) -> VoiceEnvelopeState {
        let stage_info = &self.parts[stage.as_usize()];
        match stage_info {
            EnvelopePart::Lerp { target, duration } => {
                if *duration == 0 {
                    // Zero length stages are skipped entirely
                    self.get_stage_data(stage.next_stage(), *target)
                } else {
                    VoiceEnvelopeState {
                        current_stage: stage,
                        stage_data: StageData::Lerp(
                            Lerper::new(start_amp, *target),
                            StageTime::new(*duration),
                        ),
                    }
                }
            }
            EnvelopePart::Hold(value) => VoiceEnvelopeState {
                current_stage: stage,
                stage_data: StageData::Constant(*value),
            },
        }
    }

    pub fn get_stage_duration(&self, stage: EnvelopeStage) -> u32 {
        match &self.parts[stage.as_usize()] {
            EnvelopePart::Lerp { duration, .. } => *duration,
            EnvelopePart::Hold(_) => 0,
        }
    }
}

// The lerp equation is `start + (end - start) * factor`
// We store: start, length (= end - start)
struct Lerper {
    start: f32,
    length: f32,
}

impl Lerper {
    fn new(start: f32, end: f32) -> Self {
        Lerper {
            start,
            length: end - start,
        }
    }

    #[inline(always)]
    fn lerp(&self, factor: f32) -> f32 {
        self.start + self.length * factor
    }
}

struct StageTime {
    time: u32,
    end: u32,
}

impl StageTime {
    fn new(end: u32) -> Self {
        StageTime { time: 0, end }
    }

    #[inline(always)]
    fn progress(&self) -> f32 {
        self.time as f32 / self.end as f32
    }

    #[inline(always)]
    fn is_ending(&self) -> bool {
        self.time >= self.end
    }
}

enum StageData {
    Lerp(Lerper, StageTime),
    Constant(f32),
}

struct VoiceEnvelopeState {
    current_stage: EnvelopeStage,
    stage_data: StageData,
}

/// The per-voice envelope state machine. Produces one gain multiplier per
/// output sample, allocation free.
pub struct VoiceEnvelope {
    params: EnvelopeParameters,
    state: VoiceEnvelopeState,
}

impl VoiceEnvelope {
    /// A fresh envelope always starts at zero gain in the attack stage.
    pub fn new(params: EnvelopeParameters) -> Self {
        let state = params.get_stage_data(EnvelopeStage::Attack, 0.0);
        VoiceEnvelope { params, state }
    }

    pub fn current_stage(&self) -> EnvelopeStage {
        self.state.current_stage
    }

    pub fn value_at_current_time(&self) -> f32 {
        match &self.state.stage_data {
            StageData::Lerp(lerper, stage_time) => lerper.lerp(stage_time.progress()),
            StageData::Constant(constant) => *constant,
        }
    }

    fn switch_to_next_stage(&mut self) {
        let amp = self.value_at_current_time();
        self.state = self
            .params
            .get_stage_data(self.state.current_stage.next_stage(), amp);
    }

    /// Produces the next gain value and advances the envelope by one sample.
    #[inline(always)]
    pub fn next_sample(&mut self) -> f32 {
        match &mut self.state.stage_data {
            StageData::Lerp(lerper, stage_time) => {
                if stage_time.is_ending() {
                    self.switch_to_next_stage();
                    self.next_sample()
                } else {
                    let value = lerper.lerp(stage_time.progress());
                    stage_time.time += 1;
                    value
                }
            }
            StageData::Constant(constant) => *constant,
        }
    }

    /// Moves the envelope into the release stage, ramping from whatever level
    /// is currently active. May interrupt attack or decay. No-op if the
    /// envelope is already releasing or finished.
    pub fn signal_release(&mut self) {
        if self.state.current_stage >= EnvelopeStage::Release {
            return;
        }
        let amp = self.value_at_current_time();
        self.state = self.params.get_stage_data(EnvelopeStage::Release, amp);
    }

    /// Applies new envelope parameters to a running envelope. The current
    /// stage is rebuilt from the current level over the stage's new duration,
    /// so already elapsed progress is not replayed and the output gain stays
    /// continuous. Hold stages keep their current level until the next
    /// stage transition.
    pub fn update_params(&mut self, params: EnvelopeParameters) {
        self.params = params;
        if let StageData::Lerp(..) = self.state.stage_data {
            let amp = self.value_at_current_time();
            self.state = self.params.get_stage_data(self.state.current_stage, amp);
        }
    }

    #[inline(always)]
    pub fn ended(&self) -> bool {
        self.state.current_stage == EnvelopeStage::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lerp(from: f32, to: f32, fac: f32) -> f32 {
        from + (to - from) * fac
    }

    fn round4(v: f32) -> f32 {
        (v * 10000.0).round() / 10000.0
    }

    #[test]
    fn test_envelope_trajectory() {
        // Sample rate of 1 makes the stage durations equal the descriptor
        // times, so the expected values can be written out by hand.
        let descriptor = EnvelopeDescriptor {
            attack: 15.0,
            decay: 17.0,
            sustain: 0.4,
            release: 16.0,
        };
        let params = descriptor.to_envelope_params(1).unwrap();
        let mut env = VoiceEnvelope::new(params);

        let mut vec = Vec::new();
        for _ in 0..48 {
            vec.push(env.next_sample());
        }
        env.signal_release();
        assert_eq!(env.current_stage(), EnvelopeStage::Release);
        for _ in 0..32 {
            vec.push(env.next_sample());
        }

        let mut expected = Vec::new();
        for i in 0..15 {
            expected.push(lerp(0.0, 1.0, i as f32 / 15.0));
        }
        for i in 0..17 {
            expected.push(lerp(1.0, 0.4, i as f32 / 17.0));
        }
        for _ in 0..16 {
            expected.push(0.4);
        }
        for i in 0..16 {
            expected.push(lerp(0.4, 0.0, i as f32 / 16.0));
        }
        for _ in 0..16 {
            expected.push(0.0);
        }

        let vec: Vec<f32> = vec.into_iter().map(round4).collect();
        let expected: Vec<f32> = expected.into_iter().map(round4).collect();
        assert_eq!(vec, expected);
        assert!(env.ended());
    }

    #[test]
    fn test_continuity_across_transitions() {
        let descriptor = EnvelopeDescriptor {
            attack: 0.01,
            decay: 0.05,
            sustain: 0.5,
            release: 0.02,
        };
        let params = descriptor.to_envelope_params(44100).unwrap();
        let mut env = VoiceEnvelope::new(params);

        // The largest per-sample ramp of any stage
        let max_step = 1.0 / (0.01 * 44100.0);

        let mut last = env.next_sample();
        for i in 0..44100 {
            if i == 20000 {
                env.signal_release();
            }
            let value = env.next_sample();
            assert!(
                (value - last).abs() <= max_step + 1e-6,
                "gain jumped from {last} to {value} at sample {i}"
            );
            last = value;
        }
        assert!(env.ended());
    }

    #[test]
    fn test_release_interrupts_attack() {
        let descriptor = EnvelopeDescriptor {
            attack: 1.0,
            decay: 1.0,
            sustain: 0.8,
            release: 0.5,
        };
        let params = descriptor.to_envelope_params(100).unwrap();
        let mut env = VoiceEnvelope::new(params);

        // Halfway through the attack
        for _ in 0..50 {
            env.next_sample();
        }
        let level = env.value_at_current_time();
        assert!(level > 0.4 && level < 0.6);

        env.signal_release();
        assert_eq!(env.current_stage(), EnvelopeStage::Release);
        let first = env.next_sample();
        assert!((first - level).abs() < 0.02);
    }

    #[test]
    fn test_sustain_holds_indefinitely() {
        let descriptor = EnvelopeDescriptor {
            attack: 0.1,
            decay: 0.1,
            sustain: 0.7,
            release: 0.1,
        };
        let params = descriptor.to_envelope_params(100).unwrap();
        let mut env = VoiceEnvelope::new(params);

        for _ in 0..1_000_000 {
            env.next_sample();
        }
        assert_eq!(env.current_stage(), EnvelopeStage::Sustain);
        assert_eq!(env.next_sample(), 0.7);
    }

    #[test]
    fn test_param_change_mid_note_is_continuous() {
        let slow = EnvelopeDescriptor {
            attack: 1.0,
            decay: 0.5,
            sustain: 0.5,
            release: 0.5,
        };
        let fast = EnvelopeDescriptor {
            attack: 0.1,
            ..slow
        };
        let mut env = VoiceEnvelope::new(slow.to_envelope_params(1000).unwrap());

        for _ in 0..300 {
            env.next_sample();
        }
        let before = env.value_at_current_time();

        env.update_params(fast.to_envelope_params(1000).unwrap());
        let after = env.next_sample();
        assert_eq!(env.current_stage(), EnvelopeStage::Attack);
        assert!((after - before).abs() < 0.02);

        // The remaining attack now takes the new (shorter) duration
        for _ in 0..100 {
            env.next_sample();
        }
        assert_ne!(env.current_stage(), EnvelopeStage::Attack);
    }

    #[test]
    fn test_validation_rejects_bad_params() {
        let bad_time = EnvelopeDescriptor {
            attack: -1.0,
            ..Default::default()
        };
        assert_eq!(
            bad_time.validate(),
            Err(EnvelopeError::NonPositiveTime {
                name: "attack",
                value: -1.0
            })
        );

        let bad_sustain = EnvelopeDescriptor {
            sustain: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            bad_sustain.validate(),
            Err(EnvelopeError::SustainOutOfRange { .. })
        ));

        assert!(EnvelopeDescriptor::default().validate().is_ok());
    }
}
