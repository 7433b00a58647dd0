//! Audio capture abstraction.

use async_trait::async_trait;
use thiserror::Error;

/// Capture error.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture permission denied")]
    Denied,
    #[error("No capture device available: {0}")]
    Unavailable(String),
    #[error("Unsupported capture format: {0}")]
    Unsupported(String),
    #[error("Capture device error: {0}")]
    Device(String),
}

/// An open capture context.
///
/// Dropping it releases the underlying device.
pub trait CaptureStream: Send {
    /// Copy the most recent time-domain samples into `out`, oldest first.
    ///
    /// Returns the number of samples written; the rest of `out` is untouched.
    fn read_latest(&mut self, out: &mut [f32]) -> usize;
}

/// Opens capture contexts.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Acquire a capture context. May wait on device permission.
    async fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// Capture source for hosts without an input device.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapture;

#[async_trait]
impl CaptureSource for NoCapture {
    async fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
        Err(CaptureError::Unavailable("capture disabled".into()))
    }
}
