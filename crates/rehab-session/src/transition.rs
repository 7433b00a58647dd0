//! Legal phase transitions.

use rehab_core::SessionPhase;
use serde::Serialize;

/// A requested change of [`SessionPhase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Open the protocol picker.
    BeginSetup,
    /// Choose a protocol. Never changes the phase.
    SelectProtocol,
    Start,
    End,
    Reset,
}

impl Transition {
    /// Phase reached by applying `self` in `from`, or `None` if not allowed.
    #[must_use]
    pub const fn target(self, from: SessionPhase) -> Option<SessionPhase> {
        use SessionPhase::{Active, Idle, Setup, Summary};

        match (self, from) {
            (Self::BeginSetup, Idle) => Some(Setup),
            (Self::SelectProtocol, Idle | Setup) => Some(from),
            (Self::Start, Idle | Setup) => Some(Active),
            (Self::End, Active) => Some(Summary),
            (Self::Reset, Summary) => Some(Idle),
            _ => None,
        }
    }
}

/// Result of a controller operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied {
        from: SessionPhase,
        to: SessionPhase,
    },
    /// Not allowed in the current phase; nothing changed.
    Ignored { phase: SessionPhase },
}

impl TransitionOutcome {
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PHASES: [SessionPhase; 4] = [
        SessionPhase::Idle,
        SessionPhase::Setup,
        SessionPhase::Active,
        SessionPhase::Summary,
    ];

    const ALL_TRANSITIONS: [Transition; 5] = [
        Transition::BeginSetup,
        Transition::SelectProtocol,
        Transition::Start,
        Transition::End,
        Transition::Reset,
    ];

    fn allowed_edge(from: SessionPhase, to: SessionPhase) -> bool {
        use SessionPhase::{Active, Idle, Setup, Summary};
        from == to
            || matches!(
                (from, to),
                (Idle, Setup) | (Idle | Setup, Active) | (Active, Summary) | (Summary, Idle)
            )
    }

    #[test]
    fn test_every_edge_follows_the_cycle() {
        for from in ALL_PHASES {
            for transition in ALL_TRANSITIONS {
                if let Some(to) = transition.target(from) {
                    assert!(allowed_edge(from, to), "{transition:?}: {from} -> {to}");
                }
            }
        }
    }

    #[test]
    fn test_guards() {
        assert_eq!(Transition::Start.target(SessionPhase::Active), None);
        assert_eq!(Transition::Start.target(SessionPhase::Summary), None);
        assert_eq!(Transition::End.target(SessionPhase::Idle), None);
        assert_eq!(Transition::End.target(SessionPhase::Summary), None);
        assert_eq!(Transition::Reset.target(SessionPhase::Active), None);
        assert_eq!(Transition::SelectProtocol.target(SessionPhase::Active), None);
        assert_eq!(Transition::BeginSetup.target(SessionPhase::Setup), None);
    }
}
