/// Convert a decibel value to a linear amplitude multiplier.
///
/// The render path only works in linear amplitude, so any UI-facing decibel
/// value goes through this at the configuration boundary.
#[inline]
pub fn db_to_amp(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}
