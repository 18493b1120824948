//! Role-based access control.
//!
//! # Roles
//!
//! | Role | Description | Key Permissions |
//! |------|-------------|-----------------|
//! | `Reader` | Read-only access | `read:*` |
//! | `Writer` | Ingestion and mutation | `read:*`, `write:*` |
//! | `Admin` | Full access | everything, including `admin:*` |
//!
//! Permissions are `operation:resource` pairs drawn from a closed set.
//! Extending either enum is a schema migration.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// System roles with predefined permission sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access to the graph and search.
    Reader,
    /// Reader plus ingestion and mutation.
    Writer,
    /// Full system access.
    Admin,
}

impl Role {
    /// Returns all roles.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Reader, Self::Writer, Self::Admin]
    }

    /// Returns the role as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
            Self::Admin => "admin",
        }
    }

    /// Parses a role from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reader" | "read" => Some(Self::Reader),
            "writer" | "write" => Some(Self::Writer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Fine-grained permissions as `operation:resource` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read entities.
    ReadEntities,
    /// Read relations.
    ReadRelations,
    /// Read communities and summaries.
    ReadCommunities,
    /// Run searches (local/global/hybrid/path/lazy).
    ReadSearch,
    /// Create or update entities.
    WriteEntities,
    /// Create or update relations.
    WriteRelations,
    /// Run ingestion.
    WriteIngest,
    /// Run community detection and summarisation.
    WriteCommunities,
    /// Create and restore backups.
    AdminBackup,
    /// Manage API keys.
    AdminKeys,
    /// Delete entities (cascading).
    AdminDelete,
}

impl Permission {
    /// Returns all permissions.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ReadEntities,
            Self::ReadRelations,
            Self::ReadCommunities,
            Self::ReadSearch,
            Self::WriteEntities,
            Self::WriteRelations,
            Self::WriteIngest,
            Self::WriteCommunities,
            Self::AdminBackup,
            Self::AdminKeys,
            Self::AdminDelete,
        ]
    }

    /// Returns the permission as its `operation:resource` string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReadEntities => "read:entities",
            Self::ReadRelations => "read:relations",
            Self::ReadCommunities => "read:communities",
            Self::ReadSearch => "read:search",
            Self::WriteEntities => "write:entities",
            Self::WriteRelations => "write:relations",
            Self::WriteIngest => "write:ingest",
            Self::WriteCommunities => "write:communities",
            Self::AdminBackup => "admin:backup",
            Self::AdminKeys => "admin:keys",
            Self::AdminDelete => "admin:delete",
        }
    }

    /// Parses a permission from its `operation:resource` string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().find(|p| p.as_str() == s).copied()
    }

    /// Builds a permission from separate operation and resource parts.
    #[must_use]
    pub fn from_parts(operation: &str, resource: &str) -> Option<Self> {
        Self::parse(&format!("{operation}:{resource}"))
    }

    /// Whether this is an `admin:*` permission.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::AdminBackup | Self::AdminKeys | Self::AdminDelete
        )
    }
}

/// Permission checker mapping roles to their permission sets.
#[derive(Debug, Clone)]
pub struct AccessControl {
    role_permissions: HashMap<Role, HashSet<Permission>>,
}

impl AccessControl {
    /// Creates the default role → permission mapping.
    #[must_use]
    pub fn new() -> Self {
        let reader: HashSet<Permission> = [
            Permission::ReadEntities,
            Permission::ReadRelations,
            Permission::ReadCommunities,
            Permission::ReadSearch,
        ]
        .into_iter()
        .collect();

        let mut writer = reader.clone();
        writer.extend([
            Permission::WriteEntities,
            Permission::WriteRelations,
            Permission::WriteIngest,
            Permission::WriteCommunities,
        ]);

        let admin: HashSet<Permission> = Permission::all().iter().copied().collect();

        let mut role_permissions = HashMap::new();
        role_permissions.insert(Role::Reader, reader);
        role_permissions.insert(Role::Writer, writer);
        role_permissions.insert(Role::Admin, admin);
        Self { role_permissions }
    }

    /// Whether a role carries a permission. Admin passes any permission.
    #[must_use]
    pub fn has_permission(&self, role: Role, permission: Permission) -> bool {
        if role == Role::Admin {
            return true;
        }
        self.role_permissions
            .get(&role)
            .is_some_and(|perms| perms.contains(&permission))
    }

    /// The default permission set for a role.
    #[must_use]
    pub fn permissions_for(&self, role: Role) -> HashSet<Permission> {
        self.role_permissions.get(&role).cloned().unwrap_or_default()
    }
}

impl Default for AccessControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Request-level RBAC gate.
///
/// Maps `operation:resource` pairs to required permissions. Operations
/// listed in `public_operations` bypass the check, and the global `enabled`
/// switch turns the gate off entirely for deployments without auth.
#[derive(Debug, Clone)]
pub struct RbacMiddleware {
    enabled: bool,
    public_operations: HashSet<String>,
}

impl RbacMiddleware {
    /// Creates an enabled middleware with no public operations.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            public_operations: HashSet::new(),
        }
    }

    /// Creates a disabled middleware; every request is allowed.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            public_operations: HashSet::new(),
        }
    }

    /// Marks an operation as public (no key required).
    #[must_use]
    pub fn with_public_operation(mut self, operation: impl Into<String>) -> Self {
        self.public_operations.insert(operation.into());
        self
    }

    /// Whether the gate is active.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Authorizes an operation on a resource for an authenticated key.
    ///
    /// `key` is `None` for unauthenticated requests; those only pass when
    /// the gate is disabled or the operation is public.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PermissionDenied`] when the request lacks a
    /// key or the key lacks the mapped permission.
    pub fn authorize(
        &self,
        key: Option<&crate::security::api_key::ApiKey>,
        operation: &str,
        resource: &str,
    ) -> crate::Result<()> {
        if !self.enabled || self.public_operations.contains(operation) {
            return Ok(());
        }
        let Some(key) = key else {
            return Err(crate::Error::PermissionDenied {
                reason: "no authenticated key".to_string(),
            });
        };
        let required =
            Permission::from_parts(operation, resource).ok_or_else(|| {
                crate::Error::PermissionDenied {
                    reason: format!("no permission mapping for {operation}:{resource}"),
                }
            })?;
        if key.grants(required) {
            Ok(())
        } else {
            Err(crate::Error::PermissionDenied {
                reason: format!("missing permission {}", required.as_str()),
            })
        }
    }
}

impl Default for RbacMiddleware {
    fn default() -> Self {
        Self::new()
    }
}
