//! Guard State Machine
//!
//! ```text
//! Idle
//!   ↓ leaving an edit page        ↓ otherwise
//! ConfirmingLeave ──cancel──→ Denied
//!   ↓ proceed
//! CheckingAuth ──no token / token on login──→ Denied
//!   ↓ token, no profile         ↓ otherwise
//! FetchingProfile ──failure──→ Denied
//!   ↓
//! CheckingPermission ──superuser required──→ Denied
//!   ↓
//! Allowed
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    Idle,
    /// Waiting on the unsaved-changes prompt
    ConfirmingLeave,
    CheckingAuth,
    /// Profile request in flight; runs to completion once started
    FetchingProfile,
    CheckingPermission,
    Allowed,
    Denied,
}

impl GuardState {
    /// Check if transition to another state is valid
    pub fn can_transition_to(&self, target: GuardState) -> bool {
        use GuardState::*;

        matches!(
            (self, target),
            (Idle, ConfirmingLeave)
                | (Idle, CheckingAuth)
                | (ConfirmingLeave, CheckingAuth)
                | (ConfirmingLeave, Denied)
                | (CheckingAuth, FetchingProfile)
                | (CheckingAuth, CheckingPermission)
                | (CheckingAuth, Denied)
                | (FetchingProfile, CheckingPermission)
                | (FetchingProfile, Denied)
                | (CheckingPermission, Allowed)
                | (CheckingPermission, Denied)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GuardState::Allowed | GuardState::Denied)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GuardState::Idle => "idle",
            GuardState::ConfirmingLeave => "confirming_leave",
            GuardState::CheckingAuth => "checking_auth",
            GuardState::FetchingProfile => "fetching_profile",
            GuardState::CheckingPermission => "checking_permission",
            GuardState::Allowed => "allowed",
            GuardState::Denied => "denied",
        }
    }
}

impl std::fmt::Display for GuardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GuardState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(GuardState::Idle),
            "confirming_leave" => Ok(GuardState::ConfirmingLeave),
            "checking_auth" => Ok(GuardState::CheckingAuth),
            "fetching_profile" => Ok(GuardState::FetchingProfile),
            "checking_permission" => Ok(GuardState::CheckingPermission),
            "allowed" => Ok(GuardState::Allowed),
            "denied" => Ok(GuardState::Denied),
            _ => Err(format!("Unknown guard state: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(GuardState::Idle.can_transition_to(GuardState::ConfirmingLeave));
        assert!(GuardState::Idle.can_transition_to(GuardState::CheckingAuth));
        assert!(GuardState::ConfirmingLeave.can_transition_to(GuardState::Denied));
        assert!(GuardState::CheckingAuth.can_transition_to(GuardState::FetchingProfile));
        assert!(GuardState::FetchingProfile.can_transition_to(GuardState::CheckingPermission));
        assert!(GuardState::CheckingPermission.can_transition_to(GuardState::Allowed));
    }

    #[test]
    fn test_invalid_transitions() {
        // No network call may start before the leave prompt is answered
        assert!(!GuardState::ConfirmingLeave.can_transition_to(GuardState::FetchingProfile));
        // Permission is never granted without the auth check
        assert!(!GuardState::Idle.can_transition_to(GuardState::Allowed));
        assert!(!GuardState::CheckingAuth.can_transition_to(GuardState::Allowed));
        // Terminal states stay terminal
        assert!(!GuardState::Allowed.can_transition_to(GuardState::Denied));
        assert!(!GuardState::Denied.can_transition_to(GuardState::CheckingAuth));
    }

    #[test]
    fn test_roundtrip_names() {
        for state in [
            GuardState::Idle,
            GuardState::ConfirmingLeave,
            GuardState::CheckingAuth,
            GuardState::FetchingProfile,
            GuardState::CheckingPermission,
            GuardState::Allowed,
            GuardState::Denied,
        ] {
            assert_eq!(state.as_str().parse::<GuardState>(), Ok(state));
        }
    }
}
