//! Built-in exercise protocols supported by the coaching agent.

use std::sync::LazyLock;

use crate::ExerciseProtocol;

static PROTOCOLS: LazyLock<Vec<ExerciseProtocol>> = LazyLock::new(|| {
    vec![
        ExerciseProtocol::new("knee_bend", "Knee Bend", "Knee", 10, 3, "🦵"),
        ExerciseProtocol::new("shoulder_rotation", "Shoulder Rotation", "Shoulder", 12, 3, "💪"),
        ExerciseProtocol::new("hip_abduction", "Hip Abduction", "Hip", 10, 3, "🦴"),
        ExerciseProtocol::new("ankle_pump", "Ankle Pump", "Ankle", 20, 2, "🦶"),
        ExerciseProtocol::new("quad_set", "Quad Set", "Quadriceps", 10, 3, "🏋"),
        ExerciseProtocol::new("slr", "Straight Leg Raise", "Hip / Quadriceps", 10, 3, "📐"),
    ]
});

/// All built-in protocols, in display order.
#[must_use]
pub fn protocols() -> &'static [ExerciseProtocol] {
    &PROTOCOLS
}

/// Look up a protocol by id.
#[must_use]
pub fn find(id: &str) -> Option<&'static ExerciseProtocol> {
    PROTOCOLS.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knee_bend_targets() {
        let knee = find("knee_bend").unwrap();
        assert_eq!(knee.display_name, "Knee Bend");
        assert_eq!(knee.rep_count, 10);
        assert_eq!(knee.set_count, 3);
    }

    #[test]
    fn test_ids_unique() {
        let mut ids: Vec<_> = protocols().iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), protocols().len());
        assert!(find("unknown").is_none());
    }
}
