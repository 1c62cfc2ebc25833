//! Session context: identity passed explicitly into every persistence and
//! finalize call.

use secrecy::SecretString;
use uuid::Uuid;

/// Who the session belongs to and how to authenticate as them.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session id (one per app launch / device session).
    pub session_id: Uuid,
    /// User id that owns the onboarding progress.
    pub user_id: String,
    /// Bearer token for the profile service.
    pub token: SecretString,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.into(),
            token: SecretString::from(token.into()),
        }
    }

    pub fn with_secret(user_id: impl Into<String>, token: SecretString) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.into(),
            token,
        }
    }
}
