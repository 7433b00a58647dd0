//! Audio-reactive radial visualization.
//!
//! Provides:
//! - `FrequencyAnalyzer` - FFT magnitudes from a live capture stream
//! - `VisualizationLoop` - Self-rescheduling render tick with scoped `Activation`s
//! - `RadialLayout` - Frame to ray geometry for renderers
//! - `MicrophoneCapture` - Platform microphone capture (feature: device)

pub mod analyzer;
pub mod capture;
pub mod config;
pub mod radial;
pub mod synthetic;
pub mod visualizer;

#[cfg(feature = "device")]
pub mod microphone;

pub use analyzer::FrequencyAnalyzer;
pub use capture::{CaptureError, CaptureSource, CaptureStream, NoCapture};
pub use config::{ConfigError, VisualizerConfig};
pub use radial::{RadialLayout, Ray};
pub use visualizer::{Activation, FrameSource, VisualFrame, VisualizationLoop};

#[cfg(feature = "device")]
pub use microphone::MicrophoneCapture;
