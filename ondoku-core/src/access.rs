//! Passcode gate in front of the whole application.
//!
//! The gate is the only thing that can mint an [`AccessGrant`], and the
//! sync engine refuses to start a session without one.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::AuthError;
use crate::identity::Identity;

/// Key of the unlocked flag in the session store.
pub const SESSION_KEY: &str = "ondoku_auth";
const SESSION_VALUE: &str = "true";

/// Storage scoped to one browser-tab-like session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Session storage that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.remove(key);
        }
    }
}

/// Derived view state. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessState {
    pub is_authenticated: bool,
    pub is_admin: bool,
}

/// Proof that the passcode was entered in this session.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    _private: (),
}

pub struct AccessGate<S: SessionStore> {
    passcode: String,
    admin_email: Option<String>,
    session: S,
}

impl<S: SessionStore> AccessGate<S> {
    pub fn new(passcode: impl Into<String>, admin_email: Option<String>, session: S) -> Self {
        Self {
            passcode: passcode.into(),
            admin_email,
            session,
        }
    }

    /// Checks `input` against the class passcode. Exact match only; an
    /// empty class passcode never matches.
    pub fn submit(&self, input: &str) -> Result<(), AuthError> {
        if self.passcode.is_empty() || input != self.passcode {
            tracing::info!("Rejected passcode attempt");
            return Err(AuthError::WrongPasscode);
        }
        self.session.set(SESSION_KEY, SESSION_VALUE);
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.get(SESSION_KEY).as_deref() == Some(SESSION_VALUE)
    }

    pub fn lock(&self) {
        self.session.remove(SESSION_KEY);
    }

    pub fn grant(&self) -> Result<AccessGrant, AuthError> {
        if self.is_authenticated() {
            Ok(AccessGrant { _private: () })
        } else {
            Err(AuthError::Locked)
        }
    }

    /// Admin status only changes what is shown; it unlocks no operation.
    pub fn is_admin(&self, identity: Option<&Identity>) -> bool {
        match (&self.admin_email, identity) {
            (Some(admin), Some(identity)) => admin == &identity.email,
            _ => false,
        }
    }

    pub fn access_state(&self, identity: Option<&Identity>) -> AccessState {
        AccessState {
            is_authenticated: self.is_authenticated(),
            is_admin: self.is_admin(identity),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_grant() -> AccessGrant {
    AccessGrant { _private: () }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> AccessGate<MemorySessionStore> {
        AccessGate::new(
            "1234",
            Some("teacher@school.example".to_string()),
            MemorySessionStore::new(),
        )
    }

    #[test]
    fn test_correct_passcode_unlocks() {
        let gate = gate();
        assert!(!gate.is_authenticated());
        assert!(gate.grant().is_err());

        gate.submit("1234").unwrap();

        assert!(gate.is_authenticated());
        assert!(gate.grant().is_ok());
    }

    #[test]
    fn test_wrong_passcode_rejected() {
        let gate = gate();
        assert!(matches!(gate.submit("0000"), Err(AuthError::WrongPasscode)));
        assert!(matches!(gate.submit("1234 "), Err(AuthError::WrongPasscode)));
        assert!(!gate.is_authenticated());
    }

    #[test]
    fn test_empty_class_passcode_never_unlocks() {
        let gate = AccessGate::new("", None, MemorySessionStore::new());
        assert!(matches!(gate.submit(""), Err(AuthError::WrongPasscode)));
        assert!(!gate.is_authenticated());
        assert!(gate.grant().is_err());
    }

    #[test]
    fn test_no_lockout_after_failures() {
        let gate = gate();
        for _ in 0..10 {
            let _ = gate.submit("nope");
        }
        assert!(gate.submit("1234").is_ok());
    }

    #[test]
    fn test_lock_clears_flag() {
        let gate = gate();
        gate.submit("1234").unwrap();
        gate.lock();
        assert!(!gate.is_authenticated());
        assert!(matches!(gate.grant(), Err(AuthError::Locked)));
    }

    #[test]
    fn test_flag_shared_through_session_store() {
        let gate = gate();
        gate.submit("1234").unwrap();
        assert_eq!(gate.session.get(SESSION_KEY).as_deref(), Some("true"));
    }

    #[test]
    fn test_admin_is_exact_email_match() {
        let gate = gate();
        let teacher = Identity::new("t", "teacher@school.example");
        let parent = Identity::new("p", "parent@home.example");

        assert!(gate.is_admin(Some(&teacher)));
        assert!(!gate.is_admin(Some(&parent)));
        assert!(!gate.is_admin(None));

        let state = gate.access_state(Some(&teacher));
        assert!(state.is_admin);
        assert!(!state.is_authenticated);
    }

    #[test]
    fn test_no_admin_configured() {
        let gate = AccessGate::new("1", None, MemorySessionStore::new());
        assert!(!gate.is_admin(Some(&Identity::new("t", "teacher@school.example"))));
    }
}
