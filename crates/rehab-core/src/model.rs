//! Session data model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level position of a session in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session running. A protocol may or may not be chosen.
    #[default]
    Idle,
    /// Protocol picker is open.
    Setup,
    /// Session started; visualization and ticker running.
    Active,
    /// Session ended; summary shown until reset.
    Summary,
}

impl SessionPhase {
    /// Phases from which a protocol can be chosen and a session started.
    #[must_use]
    pub const fn is_selecting(self) -> bool {
        matches!(self, Self::Idle | Self::Setup)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Setup => "setup",
            Self::Active => "active",
            Self::Summary => "summary",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rehabilitation exercise with target rep/set counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseProtocol {
    /// Stable identifier, sent to the agent activation endpoint.
    pub id: String,
    pub display_name: String,
    pub target_area: String,
    pub rep_count: u32,
    pub set_count: u32,
    pub icon: String,
}

impl ExerciseProtocol {
    /// Create a protocol. Rep and set counts are raised to at least one.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        target_area: impl Into<String>,
        rep_count: u32,
        set_count: u32,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            target_area: target_area.into(),
            rep_count: rep_count.max(1),
            set_count: set_count.max(1),
            icon: icon.into(),
        }
    }
}

/// Coaching status shown alongside the stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsStatus {
    #[default]
    Idle,
    Active,
    /// Form is within tolerance.
    Good,
    /// Agent is correcting form.
    Correct,
}

/// Session biometrics.
///
/// Only [`crate::StatsAggregator`] mutates these; everyone else sees snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Form score in `[0, 100]`.
    pub form_score: f32,
    pub current_rep: u32,
    pub total_reps: u32,
    pub sets_completed: u32,
    pub total_sets: u32,
    pub joint_angle_degrees: f32,
    pub elapsed_seconds: u64,
    pub status: StatsStatus,
}

/// Partial stats update. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_rep: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets_completed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint_angle_degrees: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatsStatus>,
}

/// Who produced a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Agent,
    User,
}

/// One entry of the session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    /// Insertion order, starting at zero. Never reused.
    pub index: u64,
    pub role: Role,
    pub text: String,
    /// Wall-clock time of the append (Unix epoch seconds).
    pub timestamp: i64,
}

/// Normalized frequency-bin magnitudes for one visualization tick.
///
/// Every value is within `[0, 1]`; construction clamps out-of-range input
/// and maps NaN to zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MagnitudeFrame(Vec<f32>);

impl MagnitudeFrame {
    /// Frame of `len` zeros.
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    /// Build a frame from arbitrary values, clamping each into `[0, 1]`.
    pub fn from_values<I: IntoIterator<Item = f32>>(values: I) -> Self {
        Self(values.into_iter().map(clamp_unit).collect())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Largest magnitude, or zero for an empty frame.
    #[must_use]
    pub fn peak(&self) -> f32 {
        self.0.iter().copied().fold(0.0, f32::max)
    }

    /// Mean magnitude, or zero for an empty frame.
    #[must_use]
    pub fn mean(&self) -> f32 {
        if self.0.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let len = self.0.len() as f32;
        self.0.iter().sum::<f32>() / len
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitude_frame_clamps() {
        let frame = MagnitudeFrame::from_values([-0.5, 0.25, 1.5, f32::NAN]);
        assert_eq!(frame.as_slice(), &[0.0, 0.25, 1.0, 0.0]);
        assert!((frame.peak() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_protocol_counts_at_least_one() {
        let p = ExerciseProtocol::new("x", "X", "knee", 0, 0, "*");
        assert_eq!(p.rep_count, 1);
        assert_eq!(p.set_count, 1);
    }

    #[test]
    fn test_stats_update_serialization_skips_unset() {
        let update = StatsUpdate {
            current_rep: Some(3),
            ..StatsUpdate::default()
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"current_rep":3}"#);

        let parsed: StatsUpdate = serde_json::from_str(r#"{"status":"good"}"#).unwrap();
        assert_eq!(parsed.status, Some(StatsStatus::Good));
        assert!(parsed.form_score.is_none());
    }
}
