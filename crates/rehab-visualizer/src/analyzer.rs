//! FFT magnitude analysis over a live capture stream.

use std::{f32::consts::PI, sync::Arc};

use rehab_core::MagnitudeFrame;
use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::{CaptureStream, VisualizerConfig};

/// Frequency analyzer owning one capture context.
///
/// Each call to [`Self::magnitudes`] analyses the latest window of captured
/// samples. Magnitudes go through an 8-bit decibel scale and are then
/// normalized by its maximum, so every value lands in `[0, 1]`.
pub struct FrequencyAnalyzer {
    stream: Box<dyn CaptureStream>,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    samples: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    levels: Vec<u8>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
}

impl FrequencyAnalyzer {
    /// Wrap an open capture stream.
    #[must_use]
    pub fn new(stream: Box<dyn CaptureStream>, config: &VisualizerConfig) -> Self {
        let size = config.fft_size;
        let fft = FftPlanner::new().plan_fft_forward(size);
        Self {
            stream,
            fft,
            window: (0..size).map(|i| hann_window(i, size)).collect(),
            samples: vec![0.0; size],
            buffer: vec![Complex::new(0.0, 0.0); size],
            smoothed: vec![0.0; size / 2],
            levels: vec![0; size / 2],
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
        }
    }

    /// Analyse the latest window and return its 8-bit levels, one per
    /// frequency bin.
    pub fn byte_frequency_data(&mut self) -> &[u8] {
        self.samples.fill(0.0);
        let filled = self.stream.read_latest(&mut self.samples);
        // Right-align a short read so the newest samples sit at the end.
        let shift = self.samples.len().saturating_sub(filled);
        if shift > 0 {
            self.samples.rotate_right(shift);
        }

        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(&self.samples).zip(&self.window) {
            let sample = if sample.is_finite() { sample } else { 0.0 };
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.buffer);

        #[allow(clippy::cast_precision_loss)]
        let norm = 1.0 / self.buffer.len() as f32;
        let range = self.max_decibels - self.min_decibels;
        for (k, (smoothed, level)) in self.smoothed.iter_mut().zip(&mut self.levels).enumerate() {
            let magnitude = self.buffer[k].norm() * norm;
            *smoothed = self.smoothing.mul_add(*smoothed, (1.0 - self.smoothing) * magnitude);
            *level = to_level(*smoothed, self.min_decibels, range);
        }
        &self.levels
    }

    /// Analyse the latest window and bucket it into `bins` normalized values.
    pub fn magnitudes(&mut self, bins: usize) -> MagnitudeFrame {
        let levels = self.byte_frequency_data();
        let scale = f32::from(u8::MAX);
        MagnitudeFrame::from_values(
            bucket_nearest(levels, bins)
                .into_iter()
                .map(|level| f32::from(level) / scale),
        )
    }
}

/// Map a linear magnitude onto the 8-bit decibel scale.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_level(magnitude: f32, min_decibels: f32, range: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (f32::from(u8::MAX) * (db - min_decibels) / range).clamp(0.0, f32::from(u8::MAX));
    scaled as u8
}

/// Resample `src` to `bins` entries by nearest-index mapping.
#[must_use]
pub fn bucket_nearest<T: Copy + Default>(src: &[T], bins: usize) -> Vec<T> {
    if src.is_empty() {
        return vec![T::default(); bins];
    }
    (0..bins).map(|i| src[i * src.len() / bins]).collect()
}

/// Hann window function for FFT analysis
#[allow(clippy::cast_precision_loss)]
fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}
