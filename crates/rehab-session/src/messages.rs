//! Agent transcript lines produced by the controller itself.

use rehab_core::{ExerciseProtocol, SessionStats};

pub fn protocol_started(protocol: &ExerciseProtocol) -> String {
    format!(
        "REHAB AI online. {} protocol loaded. Initiating analysis. Assume starting position when ready.",
        protocol.display_name
    )
}

pub fn demo_mode(protocol: &ExerciseProtocol) -> String {
    format!(
        "Live coaching channel unavailable, running in demo mode. {} protocol loaded: {} reps x {} sets.",
        protocol.display_name, protocol.rep_count, protocol.set_count
    )
}

pub fn summary(protocol: Option<&ExerciseProtocol>, stats: &SessionStats) -> String {
    let name = protocol.map_or("Exercise", |p| p.display_name.as_str());
    format!(
        "Session complete. {name}: {}/{} sets completed, form score {:.0}%.",
        stats.sets_completed, stats.total_sets, stats.form_score
    )
}
