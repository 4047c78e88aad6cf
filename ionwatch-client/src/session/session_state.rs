use std::fmt;

/// Lifecycle of a publishing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Joining,
    Joined,
    Publishing,
    Published,
    Closed,
}

impl SessionState {
    /// Whether `self -> next` is a legal transition.
    ///
    /// `Closed` is reachable from everywhere and left never. A rejected join
    /// falls back from `Joining` to `Disconnected`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Disconnected, Joining)
            | (Joining, Joined)
            | (Joining, Disconnected)
            | (Joined, Publishing)
            | (Publishing, Published) => true,
            _ => false,
        }
    }

    /// True once the room has accepted the join.
    pub fn has_joined(self) -> bool {
        matches!(
            self,
            SessionState::Joined | SessionState::Publishing | SessionState::Published
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
