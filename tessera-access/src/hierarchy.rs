//! Role hierarchy.
//!
//! Each role satisfies itself and every role below it. The table is written
//! out by hand rather than derived from [`Role::rank`], so changing the
//! policy means editing one row here.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use tessera_core::Role;

const SUPER_ADMIN: &[Role] = &[
    Role::SuperAdmin,
    Role::Admin,
    Role::Editor,
    Role::Author,
    Role::User,
    Role::Guest,
];
const ADMIN: &[Role] = &[Role::Admin, Role::Editor, Role::Author, Role::User, Role::Guest];
const EDITOR: &[Role] = &[Role::Editor, Role::Author, Role::User, Role::Guest];
const AUTHOR: &[Role] = &[Role::Author, Role::User, Role::Guest];
const USER: &[Role] = &[Role::User, Role::Guest];
const GUEST: &[Role] = &[Role::Guest];

/// Role → roles it satisfies. Built on first use.
static HIERARCHY: Lazy<HashMap<Role, HashSet<Role>>> = Lazy::new(|| {
    [
        (Role::SuperAdmin, SUPER_ADMIN),
        (Role::Admin, ADMIN),
        (Role::Editor, EDITOR),
        (Role::Author, AUTHOR),
        (Role::User, USER),
        (Role::Guest, GUEST),
    ]
    .into_iter()
    .map(|(role, satisfied)| (role, satisfied.iter().copied().collect()))
    .collect()
});

/// Every role that `held` satisfies, itself included.
pub fn roles_satisfied_by(held: Role) -> &'static HashSet<Role> {
    static EMPTY: Lazy<HashSet<Role>> = Lazy::new(HashSet::new);
    HIERARCHY.get(&held).unwrap_or(&EMPTY)
}

/// Whether holding `held` satisfies a requirement of `required`.
pub fn satisfies(held: Role, required: Role) -> bool {
    roles_satisfied_by(held).contains(&required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tessera_test_utils::generators::arb_role;

    #[test]
    fn test_every_role_has_a_row() {
        for role in Role::ALL {
            assert!(!roles_satisfied_by(role).is_empty(), "{} has no row", role);
        }
    }

    #[test]
    fn test_rows_are_strictly_nested() {
        for pair in Role::ALL.windows(2) {
            let upper = roles_satisfied_by(pair[0]);
            let lower = roles_satisfied_by(pair[1]);
            assert!(lower.is_subset(upper));
            assert_eq!(upper.len(), lower.len() + 1);
        }
    }

    #[test]
    fn test_guest_satisfies_only_guest() {
        assert!(satisfies(Role::Guest, Role::Guest));
        assert!(!satisfies(Role::Guest, Role::User));
    }

    #[test]
    fn test_super_admin_satisfies_everything() {
        assert!(Role::ALL.iter().all(|&r| satisfies(Role::SuperAdmin, r)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_higher_rank_satisfies_lower(held in arb_role(), required in arb_role()) {
            if held.ranks_above(required) {
                prop_assert!(satisfies(held, required));
                prop_assert!(!satisfies(required, held));
            }
        }

        #[test]
        fn prop_satisfaction_is_reflexive(role in arb_role()) {
            prop_assert!(satisfies(role, role));
        }

        #[test]
        fn prop_satisfaction_is_transitive(a in arb_role(), b in arb_role(), c in arb_role()) {
            if satisfies(a, b) && satisfies(b, c) {
                prop_assert!(satisfies(a, c));
            }
        }
    }
}
