//! View guards.
//!
//! A guard sits in front of a protected view. While the identity provider is
//! still resolving it produces [`GuardOutcome::Loading`] so the host can show
//! something neutral; once resolved it either renders the view or names the
//! page to redirect to.

use tessera_core::{AccessDecision, Identity, IdentityState, Redirect, Role};
use tracing::debug;

use crate::evaluator::authorize;
use crate::provider::IdentityProvider;

/// What a guarded view resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome<T> {
    /// Identity not known yet.
    Loading,
    /// Access allowed; the view's output.
    Render(T),
    /// Access denied; send the caller here.
    Redirect(Redirect),
}

impl<T> GuardOutcome<T> {
    pub fn is_render(&self) -> bool {
        matches!(self, GuardOutcome::Render(_))
    }

    pub fn redirect(&self) -> Option<Redirect> {
        match self {
            GuardOutcome::Redirect(target) => Some(*target),
            _ => None,
        }
    }

    pub fn map<U, F>(self, f: F) -> GuardOutcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            GuardOutcome::Loading => GuardOutcome::Loading,
            GuardOutcome::Render(view) => GuardOutcome::Render(f(view)),
            GuardOutcome::Redirect(target) => GuardOutcome::Redirect(target),
        }
    }
}

/// Run `view` only if `state` is authorized for `required`.
///
/// The view receives the authorized identity and is not called at all for
/// loading or denied states.
pub fn guard<T, F>(state: &IdentityState, required: Role, view: F) -> GuardOutcome<T>
where
    F: FnOnce(&Identity) -> T,
{
    if state.is_loading() {
        return GuardOutcome::Loading;
    }
    let identity = state.identity();
    match (authorize(identity, required), identity) {
        (AccessDecision::Allowed, Some(identity)) => GuardOutcome::Render(view(identity)),
        (decision, _) => {
            let target = decision.redirect().unwrap_or(Redirect::SignIn);
            debug!(required = %required, decision = %decision, target = target.path(), "View guarded");
            GuardOutcome::Redirect(target)
        }
    }
}

/// Reusable guard bound to an identity provider and a required role.
pub struct Guard<'a> {
    provider: &'a dyn IdentityProvider,
    required: Role,
}

impl<'a> Guard<'a> {
    pub fn new(provider: &'a dyn IdentityProvider, required: Role) -> Self {
        Self { provider, required }
    }

    pub fn required(&self) -> Role {
        self.required
    }

    /// Resolve the view against the provider's current state.
    pub fn render<T, F>(&self, view: F) -> GuardOutcome<T>
    where
        F: FnOnce(&Identity) -> T,
    {
        guard(&self.provider.identity_state(), self.required, view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticIdentity;
    use tessera_core::ActiveStatus;

    fn dashboard(identity: &Identity) -> String {
        format!("dashboard for {}", identity.uid)
    }

    #[test]
    fn test_loading_does_not_render() {
        let mut called = false;
        let outcome = guard(&IdentityState::Loading, Role::User, |_| {
            called = true;
        });
        assert_eq!(outcome, GuardOutcome::Loading);
        assert!(!called);
    }

    #[test]
    fn test_signed_out_redirects_to_sign_in() {
        let outcome = guard(&IdentityState::SignedOut, Role::Guest, dashboard);
        assert_eq!(outcome.redirect(), Some(Redirect::SignIn));
    }

    #[test]
    fn test_insufficient_role_redirects_to_unauthorized() {
        let state = IdentityState::SignedIn(Identity::active("u1", Role::User));
        let outcome = guard(&state, Role::Editor, dashboard);
        assert_eq!(outcome, GuardOutcome::Redirect(Redirect::Unauthorized));
    }

    #[test]
    fn test_pending_account_redirects_to_pending() {
        let state = IdentityState::SignedIn(Identity::new("u1", Role::Admin, ActiveStatus::Pending));
        let outcome = guard(&state, Role::User, dashboard);
        assert_eq!(outcome.redirect().map(Redirect::path), Some("/pending"));
    }

    #[test]
    fn test_allowed_renders_view() {
        let state = IdentityState::SignedIn(Identity::active("u1", Role::Editor));
        let outcome = guard(&state, Role::Author, dashboard);
        assert_eq!(outcome, GuardOutcome::Render("dashboard for u1".to_string()));
    }

    #[test]
    fn test_guard_follows_provider_state() {
        let provider = StaticIdentity::default();
        let admin_page = Guard::new(&provider, Role::Admin);
        assert_eq!(admin_page.render(dashboard), GuardOutcome::Loading);

        provider.set(IdentityState::SignedIn(Identity::active("root", Role::SuperAdmin)));
        assert!(admin_page.render(dashboard).is_render());

        provider.set(IdentityState::SignedOut);
        assert_eq!(
            admin_page.render(dashboard).map(|s| s.len()),
            GuardOutcome::Redirect(Redirect::SignIn)
        );
    }
}
