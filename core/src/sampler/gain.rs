use crate::helpers::db_to_amp;

/// Ramp length for gain changes, in seconds. Long enough to avoid audible
/// clicks, short enough to feel immediate on a volume knob.
pub const GAIN_RAMP_SECONDS: f32 = 0.02;

/// A click-free output gain: the applied multiplier moves linearly from its
/// current value to the target over a fixed ramp time.
pub struct SmoothedGain {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_samples: u32,
}

impl SmoothedGain {
    pub fn new(sample_rate: u32) -> Self {
        SmoothedGain {
            current: 1.0,
            target: 1.0,
            step: 0.0,
            remaining: 0,
            ramp_samples: (GAIN_RAMP_SECONDS * sample_rate as f32) as u32,
        }
    }

    /// Sets a new target from a decibel value.
    pub fn set_target_db(&mut self, db: f32) {
        self.set_target(db_to_amp(db));
    }

    /// Sets a new target linear amplitude, restarting the ramp from the
    /// currently applied value.
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
        if self.ramp_samples == 0 {
            self.current = target;
            self.remaining = 0;
            return;
        }
        self.remaining = self.ramp_samples;
        self.step = (target - self.current) / self.ramp_samples as f32;
    }

    #[inline(always)]
    fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.current += self.step;
            self.remaining -= 1;
            if self.remaining == 0 {
                // Snap to the exact target so rounding never overshoots
                self.current = self.target;
            }
        }
        self.current
    }

    /// Multiplies every frame of the interleaved buffer by the gain,
    /// advancing the ramp once per frame.
    pub fn apply_to(&mut self, out: &mut [f32], channels: u16) {
        for frame in out.chunks_exact_mut(channels as usize) {
            let gain = self.next();
            for value in frame.iter_mut() {
                *value *= gain;
            }
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}
