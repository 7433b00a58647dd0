//! Terminal rendering of the radial visualizer, and key bindings.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Color,
    symbols::Marker,
    widgets::{
        Block, Widget,
        canvas::{Canvas, Circle, Line},
    },
};
use rehab_visualizer::{RadialLayout, Ray, VisualFrame};

/// User intent decoded from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Open the protocol picker.
    Setup,
    Up,
    Down,
    /// Choose the highlighted protocol.
    Confirm,
    Start,
    End,
    Reset,
    Quit,
}

impl Command {
    /// Map a key press to a command.
    #[must_use]
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return matches!(key.code, KeyCode::Char('c')).then_some(Self::Quit);
        }
        match key.code {
            KeyCode::Char('p') => Some(Self::Setup),
            KeyCode::Up | KeyCode::Char('k') => Some(Self::Up),
            KeyCode::Down | KeyCode::Char('j') => Some(Self::Down),
            KeyCode::Enter => Some(Self::Confirm),
            KeyCode::Char('s') => Some(Self::Start),
            KeyCode::Char('e') => Some(Self::End),
            KeyCode::Char('r') => Some(Self::Reset),
            KeyCode::Char('q') | KeyCode::Esc => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Radial visualizer widget.
///
/// Draws the ring and one ray per magnitude bin of the latest frame. With
/// no frame only the ring is drawn.
pub struct RadialView<'a> {
    frame: Option<&'a VisualFrame>,
    layout: RadialLayout,
    block: Option<Block<'a>>,
}

impl<'a> RadialView<'a> {
    #[must_use]
    pub fn new(frame: Option<&'a VisualFrame>) -> Self {
        Self {
            frame,
            layout: RadialLayout::default(),
            block: None,
        }
    }

    #[must_use]
    pub const fn layout(mut self, layout: RadialLayout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl Widget for RadialView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (cx, cy) = self.layout.center;
        let extent = self.layout.extent();
        let rays = self.frame.map(|f| self.layout.rays(f)).unwrap_or_default();
        let speaking = self.frame.is_some_and(|f| f.speaking);
        let ring = self.layout.ring_radius;

        let mut canvas = Canvas::default()
            .marker(Marker::Braille)
            .x_bounds([cx - extent, cx + extent])
            .y_bounds([cy - extent, cy + extent])
            .paint(move |ctx| {
                ctx.draw(&Circle {
                    x: cx,
                    y: cy,
                    radius: ring,
                    color: if speaking { Color::Cyan } else { Color::DarkGray },
                });
                for ray in &rays {
                    ctx.draw(&Line::new(
                        ray.start.0,
                        ray.start.1,
                        ray.end.0,
                        ray.end.1,
                        ray_color(ray, speaking),
                    ));
                }
            });
        if let Some(block) = self.block {
            canvas = canvas.block(block);
        }
        canvas.render(area, buf);
    }
}

/// Color of a ray: teal while the agent speaks, blue otherwise, scaled by intensity.
#[must_use]
pub fn ray_color(ray: &Ray, speaking: bool) -> Color {
    let (r, g, b) = if speaking {
        (64.0, 224.0, 208.0)
    } else {
        (70.0, 130.0, 230.0)
    };
    let k = ray.intensity.clamp(0.0, 1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scale = |c: f32| (c * k).round() as u8;
    Color::Rgb(scale(r), scale(g), scale(b))
}
