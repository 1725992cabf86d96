use crate::state::matches::Match;

/// Capabilities attached to a connection, resolved from an opaque access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Full control over every match and the admin endpoints.
    Admin,
    /// Match operator identified by its referee id.
    Referee(String),
    /// Read-only dashboard or bracket viewer.
    Viewer,
}

impl Role {
    /// Whether this role may issue control commands at all.
    pub fn can_control(&self) -> bool {
        !matches!(self, Role::Viewer)
    }

    /// Whether this role may control the given match.
    ///
    /// When `enforce_assignment` is off any referee may drive any match, which is how
    /// tournaments with a shared referee console operate.
    pub fn may_control(&self, target: &Match, enforce_assignment: bool) -> bool {
        match self {
            Role::Admin => true,
            Role::Referee(referee_id) => {
                !enforce_assignment || target.referee_id.as_deref() == Some(referee_id.as_str())
            }
            Role::Viewer => false,
        }
    }
}
