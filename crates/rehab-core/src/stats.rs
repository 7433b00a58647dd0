//! Bounded session biometrics.

use crate::{ExerciseProtocol, SessionStats, StatsStatus, StatsUpdate};

/// Holds [`SessionStats`] and enforces their bounds on every mutation.
///
/// `current_rep` never exceeds `total_reps`, `sets_completed` never exceeds
/// `total_sets`, and `form_score` stays within `[0, 100]`.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    stats: SessionStats,
}

impl StatsAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load targets from a protocol and mark the session active.
    ///
    /// Counters already recorded are re-clamped against the new targets.
    pub fn seed(&mut self, protocol: &ExerciseProtocol) {
        self.stats.total_reps = protocol.rep_count;
        self.stats.total_sets = protocol.set_count;
        self.stats.current_rep = self.stats.current_rep.min(self.stats.total_reps);
        self.stats.sets_completed = self.stats.sets_completed.min(self.stats.total_sets);
        self.stats.status = StatsStatus::Active;
    }

    /// Apply a partial update, clamping every field into bounds.
    pub fn update(&mut self, update: StatsUpdate) {
        if let Some(score) = update.form_score {
            self.stats.form_score = if score.is_nan() {
                self.stats.form_score
            } else {
                score.clamp(0.0, 100.0)
            };
        }
        if let Some(rep) = update.current_rep {
            self.stats.current_rep = rep.min(self.stats.total_reps);
        }
        if let Some(sets) = update.sets_completed {
            self.stats.sets_completed = sets.min(self.stats.total_sets);
        }
        if let Some(angle) = update.joint_angle_degrees {
            if angle.is_finite() {
                self.stats.joint_angle_degrees = angle;
            }
        }
        if let Some(status) = update.status {
            self.stats.status = status;
        }
    }

    /// Advance the elapsed-time counter by one second.
    pub fn tick(&mut self) {
        self.stats.elapsed_seconds = self.stats.elapsed_seconds.saturating_add(1);
    }

    /// Return to the zero state with status idle.
    pub fn reset(&mut self) {
        self.stats = SessionStats::default();
    }

    #[must_use]
    pub const fn snapshot(&self) -> SessionStats {
        self.stats
    }
}
