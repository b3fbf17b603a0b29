//! TESSERA Access - Role-Based Authorization
//!
//! Decides whether an identity may see a view or perform a write:
//!
//! - [`hierarchy`]: the fixed role table.
//! - [`evaluator`]: `has_role`, `is_active`, `authorize`, `authorize_mutation`.
//! - [`guard`]: wraps a view so it renders only for authorized callers.
//! - [`provider`]: where the current identity comes from.

pub mod evaluator;
pub mod guard;
pub mod hierarchy;
pub mod provider;

pub use evaluator::{authorize, authorize_mutation, has_role, is_active};
pub use guard::{guard, Guard, GuardOutcome};
pub use hierarchy::{roles_satisfied_by, satisfies};
pub use provider::{IdentityProvider, StaticIdentity};
