//! Enum types for TESSERA

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ROLES AND ACCOUNT STATUS
// ============================================================================

/// Permission level of an authenticated identity.
///
/// Declared from highest to lowest privilege. Which roles a role satisfies is
/// decided by the hierarchy table in `tessera-access`, not by this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Editor,
    Author,
    User,
    Guest,
}

impl Role {
    /// All roles, highest privilege first.
    pub const ALL: [Role; 6] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Editor,
        Role::Author,
        Role::User,
        Role::Guest,
    ];

    /// Position in [`Role::ALL`]; 0 is the most privileged.
    pub fn rank(self) -> usize {
        match self {
            Role::SuperAdmin => 0,
            Role::Admin => 1,
            Role::Editor => 2,
            Role::Author => 3,
            Role::User => 4,
            Role::Guest => 5,
        }
    }

    /// True if `self` sits strictly above `other` in the declared order.
    pub fn ranks_above(self, other: Role) -> bool {
        self.rank() < other.rank()
    }
}

/// Lifecycle status of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActiveStatus {
    Active,
    #[default]
    Pending,
    Blocked,
    Invited,
}

// ============================================================================
// NETWORK
// ============================================================================

/// Observed network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkMode {
    Online,
    Offline,
}

impl NetworkMode {
    pub fn from_online(online: bool) -> Self {
        if online {
            NetworkMode::Online
        } else {
            NetworkMode::Offline
        }
    }

    pub fn is_online(self) -> bool {
        matches!(self, NetworkMode::Online)
    }

    /// The transport call that brings the network path into this mode.
    pub fn toggle(self) -> NetworkToggle {
        match self {
            NetworkMode::Online => NetworkToggle::Enable,
            NetworkMode::Offline => NetworkToggle::Disable,
        }
    }
}

/// Direction of a transport network toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkToggle {
    Enable,
    Disable,
}

// ============================================================================
// ACCESS DECISIONS
// ============================================================================

/// Outcome of an authorization check.
///
/// These are decisions, not errors: view entry points branch on them to pick
/// between rendering and redirecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessDecision {
    Allowed,
    Unauthenticated,
    InsufficientRole,
    InactiveAccount,
}

impl AccessDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }

    /// Where a denied caller should be sent. `None` for `Allowed`.
    pub fn redirect(self) -> Option<Redirect> {
        match self {
            AccessDecision::Allowed => None,
            AccessDecision::Unauthenticated => Some(Redirect::SignIn),
            AccessDecision::InsufficientRole => Some(Redirect::Unauthorized),
            AccessDecision::InactiveAccount => Some(Redirect::PendingApproval),
        }
    }
}

/// Navigation target for a denied view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Redirect {
    SignIn,
    Unauthorized,
    PendingApproval,
}

impl Redirect {
    /// Route path of the target page.
    pub fn path(self) -> &'static str {
        match self {
            Redirect::SignIn => "/sign-in",
            Redirect::Unauthorized => "/unauthorized",
            Redirect::PendingApproval => "/pending",
        }
    }
}

// ============================================================================
// DISPLAY / FROMSTR
// ============================================================================

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Role::SuperAdmin => "SuperAdmin",
            Role::Admin => "Admin",
            Role::Editor => "Editor",
            Role::Author => "Author",
            Role::User => "User",
            Role::Guest => "Guest",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "superadmin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "author" => Ok(Role::Author),
            "user" => Ok(Role::User),
            "guest" => Ok(Role::Guest),
            _ => Err(format!("Invalid Role: {}", s)),
        }
    }
}

impl fmt::Display for ActiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ActiveStatus::Active => "Active",
            ActiveStatus::Pending => "Pending",
            ActiveStatus::Blocked => "Blocked",
            ActiveStatus::Invited => "Invited",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for ActiveStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "active" => Ok(ActiveStatus::Active),
            "pending" => Ok(ActiveStatus::Pending),
            "blocked" => Ok(ActiveStatus::Blocked),
            "invited" => Ok(ActiveStatus::Invited),
            _ => Err(format!("Invalid ActiveStatus: {}", s)),
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            NetworkMode::Online => "online",
            NetworkMode::Offline => "offline",
        };
        write!(f, "{}", value)
    }
}

impl fmt::Display for NetworkToggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            NetworkToggle::Enable => "enable",
            NetworkToggle::Disable => "disable",
        };
        write!(f, "{}", value)
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AccessDecision::Allowed => "Allowed",
            AccessDecision::Unauthenticated => "Unauthenticated",
            AccessDecision::InsufficientRole => "InsufficientRole",
            AccessDecision::InactiveAccount => "InactiveAccount",
        };
        write!(f, "{}", value)
    }
}
