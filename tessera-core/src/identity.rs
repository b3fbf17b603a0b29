//! Identity types for TESSERA

use crate::{ActiveStatus, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Signed-in principal as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-issued user id.
    pub uid: String,
    pub role: Role,
    pub status: ActiveStatus,
}

impl Identity {
    pub fn new(uid: impl Into<String>, role: Role, status: ActiveStatus) -> Self {
        Self {
            uid: uid.into(),
            role,
            status,
        }
    }

    /// Shorthand for an `Active` identity.
    pub fn active(uid: impl Into<String>, role: Role) -> Self {
        Self::new(uid, role, ActiveStatus::Active)
    }
}

/// What the identity provider currently knows about the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityState {
    /// Sign-in state or profile lookup still in flight.
    #[default]
    Loading,
    SignedOut,
    SignedIn(Identity),
}

impl IdentityState {
    pub fn is_loading(&self) -> bool {
        matches!(self, IdentityState::Loading)
    }

    /// The identity if signed in.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            IdentityState::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }
}

impl From<Option<Identity>> for IdentityState {
    fn from(identity: Option<Identity>) -> Self {
        match identity {
            Some(identity) => IdentityState::SignedIn(identity),
            None => IdentityState::SignedOut,
        }
    }
}
