//! Event lifetime scopes and the lifecycle transitions that clear them.

use serde::{Deserialize, Serialize};

/// How long an event value lives before it is reset to its initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventScope {
    /// Reset when the application moves to the background.
    Instance,
    /// Reset when the process is killed or restarted.
    Session,
    /// Reset only on logout (or an uninstall-equivalent wipe).
    App,
}

impl EventScope {
    /// Every scope, narrowest first.
    pub const ALL: [Self; 3] = [Self::Instance, Self::Session, Self::App];
}

/// Host lifecycle changes that clear scoped event values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleTransition {
    /// The application was backgrounded.
    Background,
    /// The process was killed and started again.
    ProcessRestart,
    /// The user logged out; everything returns to a fresh-install baseline.
    Logout,
}

impl LifecycleTransition {
    /// Scopes whose values are reset by this transition.
    #[must_use]
    pub const fn scopes(self) -> &'static [EventScope] {
        match self {
            Self::Background => &[EventScope::Instance],
            Self::ProcessRestart => &[EventScope::Instance, EventScope::Session],
            Self::Logout => &EventScope::ALL,
        }
    }

    /// Whether this transition resets events of `scope`.
    #[must_use]
    pub fn resets(self, scope: EventScope) -> bool {
        self.scopes().contains(&scope)
    }
}
