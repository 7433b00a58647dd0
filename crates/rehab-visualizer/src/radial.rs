//! Radial ray geometry for a visual frame.

use std::f64::consts::TAU;

use crate::VisualFrame;

/// One ray of the radial pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Angle in radians, counter-clockwise from the positive x axis.
    pub angle: f64,
    /// Point on the ring.
    pub start: (f64, f64),
    /// Tip of the ray.
    pub end: (f64, f64),
    pub magnitude: f32,
    /// Brightness in `[0, 1]`, raised while the agent speaks.
    pub intensity: f32,
}

/// Ring placement and ray scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialLayout {
    pub center: (f64, f64),
    pub ring_radius: f64,
    /// Ray length at magnitude 1.0.
    pub max_ray_length: f64,
}

impl Default for RadialLayout {
    fn default() -> Self {
        Self {
            center: (0.0, 0.0),
            ring_radius: 40.0,
            max_ray_length: 50.0,
        }
    }
}

impl RadialLayout {
    /// Outer radius reached by a full-scale ray.
    #[must_use]
    pub fn extent(&self) -> f64 {
        self.ring_radius + self.max_ray_length
    }

    /// N evenly spaced rays, one per magnitude bin.
    #[must_use]
    pub fn rays(&self, frame: &VisualFrame) -> Vec<Ray> {
        let values = frame.magnitudes.as_slice();
        #[allow(clippy::cast_precision_loss)]
        let step = TAU / values.len().max(1) as f64;
        let (cx, cy) = self.center;

        values
            .iter()
            .enumerate()
            .map(|(i, &magnitude)| {
                #[allow(clippy::cast_precision_loss)]
                let angle = step * i as f64;
                let (sin, cos) = angle.sin_cos();
                let length = self.max_ray_length * f64::from(magnitude);
                let inner = self.ring_radius;
                let outer = self.ring_radius + length;
                Ray {
                    angle,
                    start: (inner.mul_add(cos, cx), inner.mul_add(sin, cy)),
                    end: (outer.mul_add(cos, cx), outer.mul_add(sin, cy)),
                    magnitude,
                    intensity: intensity(magnitude, frame.speaking),
                }
            })
            .collect()
    }
}

fn intensity(magnitude: f32, speaking: bool) -> f32 {
    let (floor, gain): (f32, f32) = if speaking { (0.6, 0.4) } else { (0.3, 0.5) };
    gain.mul_add(magnitude, floor).clamp(0.0, 1.0)
}
