//! Visualization tuning.

use std::time::Duration;

use thiserror::Error;

/// Analysis and render cadence parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizerConfig {
    /// Magnitudes per frame (rays in the radial pattern).
    pub bins: usize,
    /// Samples per analysis window. Must be a power of two.
    pub fft_size: usize,
    /// Delay between the end of one tick and the start of the next.
    pub tick_interval: Duration,
    /// Temporal smoothing between analysis windows, in `[0, 1)`.
    pub smoothing: f32,
    /// Magnitude mapped to the bottom of the 8-bit scale.
    pub min_decibels: f32,
    /// Magnitude mapped to the top of the 8-bit scale.
    pub max_decibels: f32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            bins: 128,
            fft_size: 256,
            tick_interval: Duration::from_millis(16),
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Rejected visualizer configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("bins must be greater than zero")]
    NoBins,
    #[error("fft_size must be a power of two >= 32, got {0}")]
    FftSize(usize),
    #[error("smoothing must be in [0, 1), got {0}")]
    Smoothing(f32),
    #[error("min_decibels ({min}) must be below max_decibels ({max})")]
    DecibelRange { min: f32, max: f32 },
    #[error("tick_interval must be non-zero")]
    ZeroTick,
}

impl VisualizerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bins == 0 {
            return Err(ConfigError::NoBins);
        }
        if !self.fft_size.is_power_of_two() || self.fft_size < 32 {
            return Err(ConfigError::FftSize(self.fft_size));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(ConfigError::Smoothing(self.smoothing));
        }
        if self.min_decibels.is_nan()
            || self.max_decibels.is_nan()
            || self.min_decibels >= self.max_decibels
        {
            return Err(ConfigError::DecibelRange {
                min: self.min_decibels,
                max: self.max_decibels,
            });
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        Ok(())
    }

    /// Frequency bins produced by one analysis window.
    #[must_use]
    pub const fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }
}
