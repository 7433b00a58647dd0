//! Synthetic signal shown while the agent speaks without observable audio.

use std::time::Duration;

use rehab_core::MagnitudeFrame;

const BASE: f32 = 0.12;
const SLOW_DEPTH: f32 = 0.08;
const FAST_DEPTH: f32 = 0.05;

/// Low-amplitude oscillating pattern seeded by elapsed time and bin index.
///
/// Values stay well below full scale so a live signal is never mistaken
/// for this one.
#[must_use]
pub fn speaking_frame(bins: usize, elapsed: Duration) -> MagnitudeFrame {
    let t = elapsed.as_secs_f32();
    MagnitudeFrame::from_values((0..bins).map(|i| {
        #[allow(clippy::cast_precision_loss)]
        let i = i as f32;
        FAST_DEPTH.mul_add(
            t.mul_add(9.0, i * 0.9).sin(),
            SLOW_DEPTH.mul_add(t.mul_add(5.0, i * 0.35).sin(), BASE),
        )
    }))
}
