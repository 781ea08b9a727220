use crate::types::{Role, User};

/// The authenticated caller of an action, as resolved by the host
/// application's sign-in layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn for_user(user: &User) -> Self {
        Self::new(user.id.clone(), user.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    /// No session.
    Unauthenticated,
    /// Signed in, but not an administrator.
    NotAdmin,
}

/// Precondition for every mutating action.
pub fn require_admin(session: Option<&Session>) -> Result<&Session, AccessDenied> {
    match session {
        None => Err(AccessDenied::Unauthenticated),
        Some(s) if !s.is_admin() => Err(AccessDenied::NotAdmin),
        Some(s) => Ok(s),
    }
}
