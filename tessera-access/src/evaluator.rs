//! Authorization decisions.

use tessera_core::{AccessDecision, AccessError, ActiveStatus, Identity, Role, TesseraResult};
use tracing::debug;

use crate::hierarchy::satisfies;

/// Whether `identity`'s role satisfies `required`. Ignores account status.
pub fn has_role(identity: &Identity, required: Role) -> bool {
    satisfies(identity.role, required)
}

/// Whether the account is active.
pub fn is_active(identity: &Identity) -> bool {
    identity.status == ActiveStatus::Active
}

/// Decide whether `identity` may access something that requires `required`.
///
/// Checks run in a fixed order and the first failure wins: missing identity,
/// then role, then account status.
pub fn authorize(identity: Option<&Identity>, required: Role) -> AccessDecision {
    let decision = match identity {
        None => AccessDecision::Unauthenticated,
        Some(identity) if !has_role(identity, required) => AccessDecision::InsufficientRole,
        Some(identity) if !is_active(identity) => AccessDecision::InactiveAccount,
        Some(_) => AccessDecision::Allowed,
    };
    debug!(
        uid = ?identity.map(|i| i.uid.as_str()),
        required = %required,
        decision = %decision,
        "Access evaluated"
    );
    decision
}

/// Gate a write. Same checks as [`authorize`], but a denial is an error so it
/// can be `?`-propagated out of the write path.
///
/// # Errors
/// [`AccessError::Denied`] carrying the decision that blocked the write.
pub fn authorize_mutation(identity: Option<&Identity>, required: Role) -> TesseraResult<()> {
    match authorize(identity, required) {
        AccessDecision::Allowed => Ok(()),
        decision => Err(AccessError::Denied { decision, required }.into()),
    }
}
