//! Client state and command handling.

use std::sync::Arc;

use rehab_core::{ExerciseProtocol, SessionPhase, TranscriptMessage, catalog};
use rehab_session::SessionController;
use rehab_transport::tui::Command;
use rehab_visualizer::VisualFrame;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Transcript lines kept on screen.
const TRANSCRIPT_LINES: usize = 200;

pub struct App {
    pub controller: Arc<SessionController>,
    /// Highlighted row of the protocol picker.
    pub cursor: usize,
    pub frame: Option<VisualFrame>,
    pub transcript: Vec<TranscriptMessage>,
    frames: broadcast::Receiver<VisualFrame>,
    messages: broadcast::Receiver<TranscriptMessage>,
    pub quit: bool,
}

impl App {
    pub fn new(
        controller: Arc<SessionController>,
        frames: broadcast::Receiver<VisualFrame>,
    ) -> Self {
        let messages = controller.transcript().subscribe();
        Self {
            controller,
            cursor: 0,
            frame: None,
            transcript: Vec::new(),
            frames,
            messages,
            quit: false,
        }
    }

    pub fn protocols() -> &'static [ExerciseProtocol] {
        catalog::protocols()
    }

    /// Pull the newest frame and any new transcript lines.
    pub fn drain(&mut self) {
        loop {
            match self.frames.try_recv() {
                Ok(frame) => self.frame = Some(frame),
                Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        loop {
            match self.messages.try_recv() {
                Ok(message) => self.transcript.push(message),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "transcript display lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        if self.transcript.len() > TRANSCRIPT_LINES {
            let excess = self.transcript.len() - TRANSCRIPT_LINES;
            self.transcript.drain(..excess);
        }
        if self.controller.phase() != SessionPhase::Active {
            self.frame = None;
        }
    }

    pub fn handle(&mut self, command: Command) {
        let phase = self.controller.phase();
        match command {
            Command::Setup => {
                self.controller.begin_setup();
            }
            Command::Up if phase.is_selecting() => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            Command::Down if phase.is_selecting() => {
                self.cursor = (self.cursor + 1).min(Self::protocols().len().saturating_sub(1));
            }
            Command::Confirm => {
                if let Some(protocol) = Self::protocols().get(self.cursor) {
                    self.controller.select_protocol(protocol.clone());
                }
            }
            Command::Start => {
                let controller = Arc::clone(&self.controller);
                tokio::spawn(async move {
                    controller.start().await;
                });
            }
            Command::End => {
                self.controller.end();
            }
            Command::Reset => {
                self.controller.reset();
            }
            Command::Quit => {
                self.quit = true;
            }
            Command::Up | Command::Down => {}
        }
    }
}
