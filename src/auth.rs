//! Login gate guarding the contact tab.
//!
//! This is a demo-grade gate: any non-blank credential pair is accepted and
//! nothing is persisted. It exists so the gated tab exercises the same flow a
//! real identity backend would plug into.

/// Result type for login attempts.
pub type AuthResult = std::result::Result<(), String>;

/// Tracks whether the current user has passed the login form.
#[derive(Debug, Default)]
pub struct LoginGate {
    username: Option<String>,
}

impl LoginGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    /// Signed-in username, once authenticated.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Accept any non-blank credential pair.
    ///
    /// # Errors
    ///
    /// Returns an error when either field is empty after trimming; the gate
    /// state is unchanged on failure.
    pub fn login(&mut self, username: &str, password: &str) -> AuthResult {
        let username = username.trim();
        if username.is_empty() {
            return Err("username is required".to_string());
        }
        if password.trim().is_empty() {
            return Err("password is required".to_string());
        }
        self.username = Some(username.to_string());
        Ok(())
    }

    pub fn logout(&mut self) {
        self.username = None;
    }
}
