//! Microphone capture through the default `cpal` input device.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError, mpsc},
    thread,
};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::oneshot;

use crate::{CaptureError, CaptureSource, CaptureStream};

type Ring = Arc<Mutex<VecDeque<f32>>>;

/// Default microphone as a [`CaptureSource`].
///
/// The `cpal` stream lives on a dedicated thread for its whole life. The
/// returned [`CaptureStream`] stops that thread and joins it on drop.
#[derive(Debug, Clone)]
pub struct MicrophoneCapture {
    ring_len: usize,
}

impl Default for MicrophoneCapture {
    fn default() -> Self {
        Self { ring_len: 4096 }
    }
}

impl MicrophoneCapture {
    /// Keep at most `ring_len` recent samples.
    #[must_use]
    pub fn new(ring_len: usize) -> Self {
        Self {
            ring_len: ring_len.max(1),
        }
    }
}

#[async_trait]
impl CaptureSource for MicrophoneCapture {
    async fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let ring: Ring = Arc::new(Mutex::new(VecDeque::with_capacity(self.ring_len)));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread_ring = Arc::clone(&ring);
        let ring_len = self.ring_len;
        let thread = thread::Builder::new()
            .name("rehab-capture".into())
            .spawn(move || match build_stream(thread_ring, ring_len) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Returns once the sender side is dropped.
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        // Built before awaiting so a cancelled open still joins the thread.
        let stream = MicrophoneStream {
            ring,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        };

        match ready_rx.await {
            Ok(Ok(())) => Ok(Box::new(stream)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::Device("capture thread exited".into())),
        }
    }
}

fn build_stream(ring: Ring, ring_len: usize) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| CaptureError::Unavailable("no input device".into()))?;

    let config = device
        .default_input_config()
        .map_err(|e| CaptureError::Device(e.to_string()))?;
    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(CaptureError::Unsupported(format!(
            "{:?} samples",
            config.sample_format()
        )));
    }
    let channels = usize::from(config.channels()).max(1);

    tracing::info!(
        device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
        sample_rate = config.sample_rate().0,
        "opening microphone"
    );

    let stream = device
        .build_input_stream(
            &config.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mut ring = ring.lock().unwrap_or_else(PoisonError::into_inner);
                for frame in data.chunks(channels) {
                    ring.push_back(frame[0]);
                    if ring.len() > ring_len {
                        ring.pop_front();
                    }
                }
            },
            |err| tracing::warn!("capture stream error: {err}"),
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::Unavailable("input device disappeared".into())
            }
            other => CaptureError::Device(other.to_string()),
        })?;

    stream
        .play()
        .map_err(|e| CaptureError::Device(e.to_string()))?;
    Ok(stream)
}

struct MicrophoneStream {
    ring: Ring,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl CaptureStream for MicrophoneStream {
    fn read_latest(&mut self, out: &mut [f32]) -> usize {
        let ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        let n = out.len().min(ring.len());
        for (slot, sample) in out.iter_mut().zip(ring.iter().skip(ring.len() - n)) {
            *slot = *sample;
        }
        n
    }
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("capture thread panicked");
            }
        }
    }
}
