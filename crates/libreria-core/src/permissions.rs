//! # Permissions
//!
//! Permission names and the single authorization rule every endpoint uses.
//!
//! ## Authorization Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  authenticated?  ── no ──► DENY (401)                                   │
//! │       │                                                                 │
//! │      yes                                                                │
//! │       │                                                                 │
//! │  action names a permission? ── no ──► ALLOW                             │
//! │       │                                                                 │
//! │      yes                                                                │
//! │       │                                                                 │
//! │  role's permission set contains it? ── yes ──► ALLOW                    │
//! │       │                                                                 │
//! │       no ──► DENY (403)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Names follow `{operation}_{resource}`, e.g. `edit_products`.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::CatalogKind;

/// Role whose members see every order, not just their own.
pub const ADMIN_ROLE: &str = "admin";

/// Role given to self-registered customers.
pub const CUSTOMER_ROLE: &str = "customer";

// =============================================================================
// Names
// =============================================================================

/// What is being done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    View,
    Create,
    Edit,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::View,
        Operation::Create,
        Operation::Edit,
        Operation::Delete,
    ];

    const fn as_str(&self) -> &'static str {
        match self {
            Operation::View => "view",
            Operation::Create => "create",
            Operation::Edit => "edit",
            Operation::Delete => "delete",
        }
    }
}

/// What it is being done to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Products,
    Categories,
    Genres,
    Authors,
    Publishers,
    Offers,
    Users,
    Roles,
    Permissions,
    Reports,
}

impl Resource {
    pub const ALL: [Resource; 10] = [
        Resource::Products,
        Resource::Categories,
        Resource::Genres,
        Resource::Authors,
        Resource::Publishers,
        Resource::Offers,
        Resource::Users,
        Resource::Roles,
        Resource::Permissions,
        Resource::Reports,
    ];

    const fn as_str(&self) -> &'static str {
        match self {
            Resource::Products => "products",
            Resource::Categories => "categories",
            Resource::Genres => "genres",
            Resource::Authors => "authors",
            Resource::Publishers => "publishers",
            Resource::Offers => "offers",
            Resource::Users => "users",
            Resource::Roles => "roles",
            Resource::Permissions => "permissions",
            Resource::Reports => "reports",
        }
    }
}

impl From<CatalogKind> for Resource {
    fn from(kind: CatalogKind) -> Self {
        match kind {
            CatalogKind::Category => Resource::Categories,
            CatalogKind::Genre => Resource::Genres,
            CatalogKind::Author => Resource::Authors,
            CatalogKind::Publisher => Resource::Publishers,
        }
    }
}

/// A named permission required by an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Requirement {
    pub operation: Operation,
    pub resource: Resource,
}

impl Requirement {
    pub const fn new(operation: Operation, resource: Resource) -> Self {
        Requirement {
            operation,
            resource,
        }
    }

    pub fn name(&self) -> String {
        format!("{}_{}", self.operation.as_str(), self.resource.as_str())
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.operation.as_str(), self.resource.as_str())
    }
}

/// Every permission name the application checks, for seeding.
///
/// Reports only have a `view` permission.
pub fn all_permission_names() -> Vec<String> {
    Resource::ALL
        .iter()
        .flat_map(|resource| {
            let ops: &[Operation] = if *resource == Resource::Reports {
                &[Operation::View]
            } else {
                &Operation::ALL
            };
            ops.iter().map(move |op| Requirement::new(*op, *resource).name())
        })
        .collect()
}

// =============================================================================
// Principal
// =============================================================================

/// The authenticated caller, with the active permissions of their role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub role: Option<String>,
    pub permissions: HashSet<String>,
}

impl Principal {
    pub fn has_permission(&self, name: &str) -> bool {
        self.role.is_some() && self.permissions.contains(name)
    }

    pub fn is_admin(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(ADMIN_ROLE))
    }

    /// Owners may act on their own records; admins on anyone's.
    pub fn can_access_owned_by(&self, owner_id: &str) -> bool {
        self.user_id == owner_id || self.is_admin()
    }
}

/// Returns true iff `principal` is authenticated and either `required` is
/// `None` or the principal's role grants it.
pub fn is_authorized(principal: Option<&Principal>, required: Option<Requirement>) -> bool {
    match (principal, required) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(p), Some(req)) => p.has_permission(&req.name()),
    }
}

/// [`is_authorized`] for an authenticated principal, as a `Result`.
pub fn authorize(principal: &Principal, required: Option<Requirement>) -> CoreResult<()> {
    if is_authorized(Some(principal), required) {
        Ok(())
    } else {
        Err(CoreError::Forbidden)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
