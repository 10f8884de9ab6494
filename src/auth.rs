//! Authentication snapshot consumed at session start
//!
//! Login state is an input to the engine, not something it decides. The
//! snapshot is consulted exactly once when a session starts; mode is fixed
//! for the session's lifetime.

use serde::{Deserialize, Serialize};

/// Authentication state at session start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthState {
    user_id: Option<String>,
}

impl AuthState {
    /// A logged-in user with the given id
    pub fn logged_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    /// An anonymous visitor
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    /// Whether a user is logged in
    pub fn is_logged_in(&self) -> bool {
        self.user_id.is_some()
    }

    /// The current user id, if logged in
    pub fn current_user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logged_in_state() {
        let auth = AuthState::logged_in("u-1");
        assert!(auth.is_logged_in());
        assert_eq!(auth.current_user_id(), Some("u-1"));
    }

    #[test]
    fn test_anonymous_state() {
        let auth = AuthState::anonymous();
        assert!(!auth.is_logged_in());
        assert_eq!(auth.current_user_id(), None);
    }
}
