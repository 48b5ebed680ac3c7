use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{SessionUser, UserRole};

/// Ordered-irrelevant set of permission strings such as `product.read`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    /// Creates an empty permission set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the set holds no permissions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of permissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the permission is a member.
    #[must_use]
    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    /// Returns whether at least one of the given permissions is a member.
    #[must_use]
    pub fn contains_any<S: AsRef<str>>(&self, permissions: &[S]) -> bool {
        permissions
            .iter()
            .any(|permission| self.contains(permission.as_ref()))
    }

    /// Iterates the permissions in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(Into::into)
                .filter(|permission: &String| !permission.trim().is_empty())
                .collect(),
        )
    }
}

/// Descriptive metadata for one permission. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionDefinition {
    /// Grouping label, e.g. `product`.
    pub category: String,
    /// Human-readable description.
    pub description: String,
}

/// Role to permission catalogue served by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionManifest {
    /// Metadata keyed by permission string.
    pub permissions: BTreeMap<String, PermissionDefinition>,
    /// Ordered permission lists keyed by role name.
    pub roles: BTreeMap<String, Vec<String>>,
}

/// Read-only role to permissions mapping derived from a manifest.
///
/// Each role's list is copied into its own shared slice, so a manifest
/// mutated after derivation never leaks into an existing map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePermissionsMap(Arc<BTreeMap<String, Arc<[String]>>>);

impl RolePermissionsMap {
    /// Derives the mapping from a manifest, preserving each role's order.
    #[must_use]
    pub fn from_manifest(manifest: &PermissionManifest) -> Self {
        Self(Arc::new(
            manifest
                .roles
                .iter()
                .map(|(role, permissions)| (role.clone(), Arc::from(permissions.as_slice())))
                .collect(),
        ))
    }

    /// Returns the permission list for a role name, empty when unknown.
    #[must_use]
    pub fn permissions_for(&self, role: &str) -> &[String] {
        self.0
            .get(role)
            .map(|permissions| &permissions[..])
            .unwrap_or_default()
    }

    /// Returns the role names present in the mapping.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns whether no roles are mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Stateless permission queries over one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionEvaluator {
    permissions: PermissionSet,
    role: Option<UserRole>,
}

impl PermissionEvaluator {
    /// Creates an evaluator from explicit inputs.
    #[must_use]
    pub fn new(permissions: PermissionSet, role: Option<UserRole>) -> Self {
        Self { permissions, role }
    }

    /// Creates an evaluator for the current user; anonymous when `None`.
    #[must_use]
    pub fn for_user(user: Option<&SessionUser>) -> Self {
        user.map_or_else(Self::default, |user| {
            Self::new(user.permissions().clone(), Some(user.role()))
        })
    }

    /// Returns the evaluated permission set.
    #[must_use]
    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// Returns the evaluated role.
    #[must_use]
    pub fn role(&self) -> Option<UserRole> {
        self.role
    }

    /// Returns whether the permission is held. Empty input is never held.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        !permission.is_empty() && self.permissions.contains(permission)
    }

    /// Returns whether any required permission is held; true when none are required.
    #[must_use]
    pub fn has_any_permission<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.is_empty()
            || required
                .iter()
                .any(|permission| self.has_permission(permission.as_ref()))
    }

    /// Returns whether every required permission is held; true when none are required.
    #[must_use]
    pub fn has_all_permissions<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required
            .iter()
            .all(|permission| self.has_permission(permission.as_ref()))
    }

    /// Returns whether the role equals `role`.
    #[must_use]
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == Some(role)
    }

    /// Returns whether the identity is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(UserRole::Admin)
    }

    /// Returns whether the identity is a reviewer.
    #[must_use]
    pub fn is_reviewer(&self) -> bool {
        self.has_role(UserRole::Reviewer)
    }

    /// Returns whether the identity is an operator.
    #[must_use]
    pub fn is_operator(&self) -> bool {
        self.has_role(UserRole::Operator)
    }

    /// Returns whether the identity is a viewer.
    #[must_use]
    pub fn is_viewer(&self) -> bool {
        self.has_role(UserRole::Viewer)
    }
}
