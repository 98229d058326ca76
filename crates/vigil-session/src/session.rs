//! Session data structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Role of the user inside a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantRole {
    Viewer,
    Maintainer,
    Admin,
    /// Any role this console does not know; grants nothing
    #[serde(other)]
    Other,
}

impl TenantRole {
    fn rank(&self) -> u8 {
        match self {
            TenantRole::Other => 0,
            TenantRole::Viewer => 1,
            TenantRole::Maintainer => 2,
            TenantRole::Admin => 3,
        }
    }

    pub fn at_least(&self, required: TenantRole) -> bool {
        self.rank() >= required.rank() && self.rank() > 0
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TenantRole::Viewer => "viewer",
            TenantRole::Maintainer => "maintainer",
            TenantRole::Admin => "admin",
            TenantRole::Other => "other",
        }
    }
}

impl std::fmt::Display for TenantRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tenant ("project") the user belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub user_role: Option<TenantRole>,
}

impl Tenant {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_default: false,
            user_role: None,
        }
    }

    pub fn with_role(mut self, role: TenantRole) -> Self {
        self.user_role = Some(role);
        self
    }
}

/// Profile of the signed-in user. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub is_superuser: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token; empty while unauthenticated
    pub token: String,
    pub profile: Option<Profile>,
    pub current_tenant: Option<Tenant>,
    pub tenants: Vec<Tenant>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }

    pub fn is_superuser(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.is_superuser)
    }

    pub fn permissions(&self) -> BTreeSet<String> {
        self.profile
            .as_ref()
            .map(|p| p.permissions.clone())
            .unwrap_or_default()
    }

    pub fn has_permission(&self, name: &str) -> bool {
        match &self.profile {
            Some(profile) => profile.is_superuser || profile.permissions.contains(name),
            None => false,
        }
    }

    /// False for an empty list unless superuser
    pub fn has_any<S: AsRef<str>>(&self, names: &[S]) -> bool {
        match &self.profile {
            Some(profile) => {
                profile.is_superuser
                    || names
                        .iter()
                        .any(|n| profile.permissions.contains(n.as_ref()))
            }
            None => false,
        }
    }

    /// True for an empty list once a profile is loaded
    pub fn has_all<S: AsRef<str>>(&self, names: &[S]) -> bool {
        match &self.profile {
            Some(profile) => {
                profile.is_superuser
                    || names
                        .iter()
                        .all(|n| profile.permissions.contains(n.as_ref()))
            }
            None => false,
        }
    }

    pub fn current_role(&self) -> Option<TenantRole> {
        self.current_tenant.as_ref().and_then(|t| t.user_role)
    }

    fn has_role(&self, required: TenantRole) -> bool {
        self.is_superuser()
            || self
                .current_role()
                .is_some_and(|role| role.at_least(required))
    }

    pub fn can_read(&self) -> bool {
        self.has_role(TenantRole::Viewer)
    }

    pub fn can_create(&self) -> bool {
        self.has_role(TenantRole::Maintainer)
    }

    pub fn can_update(&self) -> bool {
        self.has_role(TenantRole::Maintainer)
    }

    pub fn can_delete(&self) -> bool {
        self.has_role(TenantRole::Admin)
    }

    pub fn can_manage_members(&self) -> bool {
        self.has_role(TenantRole::Admin)
    }

    /// Tenant to select when none is: the default-flagged one, else the first
    pub fn preferred_tenant(tenants: &[Tenant]) -> Option<&Tenant> {
        tenants
            .iter()
            .find(|t| t.is_default)
            .or_else(|| tenants.first())
    }
}
