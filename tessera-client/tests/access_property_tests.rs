//! Property-Based Tests for Access Control
//!
//! For any identity state and required role, guarded views and write gates
//! on a wired `AppState` agree with the evaluator, and the role hierarchy is
//! monotone in the declared role order.

use std::sync::Arc;

use proptest::prelude::*;
use tessera_access::{authorize, has_role, satisfies};
use tessera_client::{AppState, Collaborators, GuardOutcome, StaticIdentity};
use tessera_core::{AccessDecision, ActiveStatus, Identity, IdentityState, Redirect, Role, SyncConfig};
use tessera_sync::{InMemoryTransport, ManualConnectivity};
use tessera_test_utils::assertions::assert_denied;
use tessera_test_utils::generators::{arb_identity_state, arb_role};

fn app_with(identity: StaticIdentity) -> AppState {
    AppState::new(
        SyncConfig::default(),
        Collaborators {
            transport: Arc::new(InMemoryTransport::new()),
            connectivity: Arc::new(ManualConnectivity::default()),
            identity: Arc::new(identity),
        },
    )
    .expect("default config is valid")
}

#[test]
fn inactive_admin_needs_approval_for_user_content() {
    let identity = Identity::new("u1", Role::Admin, ActiveStatus::Pending);
    let app = app_with(StaticIdentity::signed_in(identity));

    assert_eq!(app.authorize(Role::User), AccessDecision::InactiveAccount);
    assert_denied(&app.authorize_mutation(Role::User), AccessDecision::InactiveAccount);
    assert_eq!(
        app.guard(Role::User).render(|_| ()),
        GuardOutcome::Redirect(Redirect::PendingApproval)
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_hierarchy_is_monotone(r1 in arb_role(), r2 in arb_role()) {
        let holder = Identity::active("u", r1);
        if r1.ranks_above(r2) || r1 == r2 {
            prop_assert!(has_role(&holder, r2));
        } else {
            prop_assert!(!satisfies(r1, r2));
        }
    }

    #[test]
    fn prop_guard_agrees_with_evaluator(state in arb_identity_state(), required in arb_role()) {
        let app = app_with(StaticIdentity::new(state.clone()));
        let outcome = app.guard(required).render(|identity| identity.uid.clone());

        match &state {
            IdentityState::Loading => prop_assert_eq!(outcome, GuardOutcome::Loading),
            _ => {
                let decision = authorize(state.identity(), required);
                match decision.redirect() {
                    None => prop_assert!(outcome.is_render()),
                    Some(target) => prop_assert_eq!(outcome, GuardOutcome::Redirect(target)),
                }
            }
        }
    }

    #[test]
    fn prop_writes_denied_unless_allowed(state in arb_identity_state(), required in arb_role()) {
        let app = app_with(StaticIdentity::new(state));
        let allowed = app.authorize(required).is_allowed();
        prop_assert_eq!(app.authorize_mutation(required).is_ok(), allowed);
    }
}
