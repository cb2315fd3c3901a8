//! Connection lifecycle.
//!
//! ```text
//! Connecting -> Open -> Closing -> Closed
//!      \          \        \
//!       +----------+--------+----> Errored
//! ```
//!
//! `Closed` and `Errored` are terminal. Any non-terminal state may jump
//! straight to `Closed` (terminate) or `Errored` (fatal failure).

use std::fmt;

/// State of a duplex connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Handshake in progress; no tasks running yet.
    #[default]
    Connecting,
    /// Reader and writer are running; data flows both ways.
    Open,
    /// A Close frame was sent or received; waiting for the other side.
    Closing,
    /// Shut down cleanly, by close handshake or terminate.
    Closed,
    /// Failed with an error that every waiter receives.
    Errored,
}

impl ConnectionState {
    /// Returns `true` for `Closed` and `Errored`.
    #[must_use]
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Errored)
    }

    /// Returns `true` if new items may be enqueued for sending.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Returns `true` while the reader may still produce messages.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Closing)
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    #[must_use]
    pub const fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (*self, next) {
            (Closed | Errored, _) => false,
            (Connecting, Open) | (Open, Closing) => true,
            (_, Closed | Errored) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Open",
            ConnectionState::Closing => "Closing",
            ConnectionState::Closed => "Closed",
            ConnectionState::Errored => "Errored",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(ConnectionState::default(), Connecting);
    }

    #[test]
    fn test_forward_transitions() {
        assert!(Connecting.can_transition_to(Open));
        assert!(Open.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!Open.can_transition_to(Connecting));
        assert!(!Closing.can_transition_to(Open));
        assert!(!Connecting.can_transition_to(Closing));
        assert!(!Open.can_transition_to(Open));
    }

    #[test]
    fn test_errored_and_closed_reachable_from_non_terminal() {
        for state in [Connecting, Open, Closing] {
            assert!(state.can_transition_to(Errored), "{state} -> Errored");
            assert!(state.can_transition_to(Closed), "{state} -> Closed");
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [Closed, Errored] {
            assert!(terminal.is_terminal());
            for next in [Connecting, Open, Closing, Closed, Errored] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_capabilities() {
        assert!(Open.can_send());
        assert!(!Closing.can_send());
        assert!(Closing.can_receive());
        assert!(!Errored.can_receive());
        assert!(!Connecting.is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(Errored.to_string(), "Errored");
        assert_eq!(Closing.to_string(), "Closing");
    }
}
