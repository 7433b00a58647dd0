//! Lifecycle tests for the visualization loop.

use std::{
    f32::consts::PI,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use rehab_core::SpeakingState;
use rehab_visualizer::{
    CaptureError, CaptureSource, CaptureStream, ConfigError, FrameSource, NoCapture, VisualFrame,
    VisualizationLoop, VisualizerConfig,
};
use tokio::sync::{Notify, broadcast};

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    released: AtomicUsize,
}

struct ToneStream {
    counters: Arc<Counters>,
}

impl CaptureStream for ToneStream {
    #[allow(clippy::cast_precision_loss)]
    fn read_latest(&mut self, out: &mut [f32]) -> usize {
        let n = out.len() as f32;
        for (i, s) in out.iter_mut().enumerate() {
            *s = 0.5 * (2.0 * PI * 12.0 * i as f32 / n).sin();
        }
        out.len()
    }
}

impl Drop for ToneStream {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Capture that opens once `gate` is notified (immediately if `gate` is None).
struct FakeCapture {
    counters: Arc<Counters>,
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl CaptureSource for FakeCapture {
    async fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ToneStream {
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct DeniedCapture;

#[async_trait]
impl CaptureSource for DeniedCapture {
    async fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
        Err(CaptureError::Denied)
    }
}

async fn next_frame(rx: &mut broadcast::Receiver<VisualFrame>) -> VisualFrame {
    loop {
        match rx.recv().await {
            Ok(frame) => return frame,
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => panic!("frame channel closed"),
        }
    }
}

fn new_loop(capture: Arc<dyn CaptureSource>, speaking: SpeakingState) -> VisualizationLoop {
    VisualizationLoop::new(capture, speaking, VisualizerConfig::default()).unwrap()
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = VisualizationLoop::new(
        Arc::new(NoCapture),
        SpeakingState::new(),
        VisualizerConfig {
            bins: 0,
            ..VisualizerConfig::default()
        },
    );
    assert!(matches!(result, Err(ConfigError::NoBins)));

    let result = VisualizationLoop::new(
        Arc::new(NoCapture),
        SpeakingState::new(),
        VisualizerConfig {
            fft_size: 1,
            ..VisualizerConfig::default()
        },
    );
    assert!(matches!(result, Err(ConfigError::FftSize(1))));
}

#[tokio::test(start_paused = true)]
async fn test_denied_capture_still_yields_full_frames() {
    let speaking = SpeakingState::new();
    let viz = new_loop(Arc::new(DeniedCapture), speaking.clone());
    let mut rx = viz.subscribe();

    let activation = viz.activate();
    for _ in 0..10 {
        let frame = next_frame(&mut rx).await;
        assert_eq!(frame.magnitudes.len(), 128);
        assert!(frame.magnitudes.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(frame.source, FrameSource::Silent);
    }

    speaking.mark(Duration::from_secs(3));
    let frame = next_frame(&mut rx).await;
    assert_eq!(frame.source, FrameSource::Synthetic);
    assert!(frame.speaking);
    assert!(frame.magnitudes.peak() > 0.0);
    assert!(frame.magnitudes.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));

    activation.deactivate();
    assert!(!viz.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_live_capture_used_then_released() {
    let counters = Arc::new(Counters::default());
    let viz = new_loop(
        Arc::new(FakeCapture {
            counters: Arc::clone(&counters),
            gate: None,
        }),
        SpeakingState::new(),
    );
    let mut rx = viz.subscribe();

    let activation = viz.activate();
    let mut saw_live = false;
    for _ in 0..20 {
        if next_frame(&mut rx).await.source == FrameSource::Live {
            saw_live = true;
            break;
        }
    }
    assert!(saw_live);
    assert!(viz.has_live_capture());

    activation.deactivate();
    assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    assert!(!viz.has_live_capture());
}

#[tokio::test(start_paused = true)]
async fn test_no_frames_after_deactivation() {
    let viz = new_loop(Arc::new(NoCapture), SpeakingState::new());
    let activation = viz.activate();
    let mut rx = viz.subscribe();
    next_frame(&mut rx).await;

    activation.deactivate();
    let mut after = viz.subscribe();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(matches!(
        after.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reactivation_starts_clean_cycle() {
    let viz = new_loop(Arc::new(NoCapture), SpeakingState::new());

    let first = viz.activate();
    let first_generation = first.generation();
    let mut rx = viz.subscribe();
    next_frame(&mut rx).await;

    first.deactivate();
    let mut rx = viz.subscribe();
    let second = viz.activate();
    assert_ne!(second.generation(), first_generation);

    let mut sequences = Vec::new();
    for _ in 0..30 {
        let frame = next_frame(&mut rx).await;
        assert_eq!(frame.generation, second.generation());
        sequences.push(frame.sequence);
    }
    // One tick chain: sequences strictly increase from zero without repeats.
    assert_eq!(sequences, (0..30).collect::<Vec<_>>());
    second.deactivate();
}

#[tokio::test(start_paused = true)]
async fn test_late_capture_is_inert() {
    let counters = Arc::new(Counters::default());
    let gate = Arc::new(Notify::new());
    let viz = new_loop(
        Arc::new(FakeCapture {
            counters: Arc::clone(&counters),
            gate: Some(Arc::clone(&gate)),
        }),
        SpeakingState::new(),
    );

    let activation = viz.activate();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!viz.has_live_capture());
    activation.deactivate();

    gate.notify_waiters();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!viz.has_live_capture());
    assert!(!viz.is_active());
    assert_eq!(
        counters.opened.load(Ordering::SeqCst),
        counters.released.load(Ordering::SeqCst)
    );
}

#[tokio::test(start_paused = true)]
async fn test_dropping_activation_releases_capture() {
    let counters = Arc::new(Counters::default());
    let viz = new_loop(
        Arc::new(FakeCapture {
            counters: Arc::clone(&counters),
            gate: None,
        }),
        SpeakingState::new(),
    );

    {
        let _activation = viz.activate();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(viz.has_live_capture());
    }

    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    assert!(!viz.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_superseding_activation_keeps_single_capture() {
    let counters = Arc::new(Counters::default());
    let viz = new_loop(
        Arc::new(FakeCapture {
            counters: Arc::clone(&counters),
            gate: None,
        }),
        SpeakingState::new(),
    );

    let first = viz.activate();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = viz.activate();
    assert!(!first.is_current());
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);

    // Dropping the stale activation must not tear down the new cycle.
    drop(first);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(viz.is_active());
    assert!(viz.has_live_capture());

    second.deactivate();
    assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
    assert_eq!(counters.released.load(Ordering::SeqCst), 2);
}
