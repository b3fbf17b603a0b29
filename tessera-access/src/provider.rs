//! Identity source.

use std::sync::{Arc, RwLock};

use tessera_core::{Identity, IdentityState};
use tracing::{debug, error};

/// Yields the caller's current identity.
///
/// Implemented over whatever authentication SDK the host uses. Must be cheap;
/// guards call it on every render.
pub trait IdentityProvider: Send + Sync {
    fn identity_state(&self) -> IdentityState;
}

/// Identity provider whose state is set by hand.
///
/// Starts in [`IdentityState::Loading`]. Cloning yields another handle to the
/// same state.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    state: Arc<RwLock<IdentityState>>,
}

impl StaticIdentity {
    pub fn new(state: IdentityState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self::new(IdentityState::SignedIn(identity))
    }

    pub fn signed_out() -> Self {
        Self::new(IdentityState::SignedOut)
    }

    pub fn set(&self, state: IdentityState) {
        debug!(state = ?state, "Identity state changed");
        match self.state.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => {
                error!("Identity lock poisoned; overwriting");
                *poisoned.into_inner() = state;
            }
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn identity_state(&self) -> IdentityState {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::Role;

    #[test]
    fn test_default_is_loading() {
        assert!(StaticIdentity::default().identity_state().is_loading());
    }

    #[test]
    fn test_set_is_visible_through_clones() {
        let provider = StaticIdentity::signed_out();
        let other = provider.clone();
        provider.set(IdentityState::SignedIn(Identity::active("u1", Role::User)));
        assert_eq!(
            other.identity_state().identity().map(|i| i.uid.as_str()),
            Some("u1")
        );
    }
}
