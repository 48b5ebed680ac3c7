//! Navigation manifest and route-guard policy.
//!
//! Guards are matched by raw string prefix in list order. The first guard
//! whose path prefixes the location decides access; later guards are never
//! consulted for that location.

use matchdesk_core::{AppError, AppResult};
use serde::Serialize;

use crate::{PermissionEvaluator, PermissionSet, UserRole};

/// Console route paths.
pub mod routes {
    /// Landing page that redirects into the workspace.
    pub const HOME: &str = "/";
    /// Sign-in page.
    pub const LOGIN: &str = "/auth/login";
    /// Product catalogue.
    pub const PRODUCTS: &str = "/dashboard/products";
    /// Matching templates.
    pub const TEMPLATES: &str = "/dashboard/templates";
    /// Matching workbench.
    pub const MATCHING: &str = "/dashboard/matching";
    /// Matching memory library.
    pub const MEMORY: &str = "/dashboard/memory";
    /// User management.
    pub const SETTINGS: &str = "/dashboard/settings";
    /// Match review queue.
    pub const REVIEW: &str = "/dashboard/review";
    /// Price lists.
    pub const PRICES: &str = "/dashboard/prices";
    /// Reports.
    pub const REPORTS: &str = "/dashboard/reports";
}

/// Sidebar entry with optional access restrictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationItem {
    key: String,
    label: String,
    href: Option<String>,
    required_permissions: Option<Vec<String>>,
    required_roles: Option<Vec<UserRole>>,
}

impl NavigationItem {
    /// Creates an unrestricted navigation item.
    #[must_use]
    pub fn new(key: impl Into<String>, label: impl Into<String>, href: Option<&str>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            href: href.map(ToOwned::to_owned),
            required_permissions: None,
            required_roles: None,
        }
    }

    /// Restricts the item to holders of at least one permission.
    #[must_use]
    pub fn with_required_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_permissions = non_empty(permissions.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts the item to the given roles.
    #[must_use]
    pub fn with_required_roles(mut self, roles: impl IntoIterator<Item = UserRole>) -> Self {
        self.required_roles = non_empty(roles.into_iter().collect());
        self
    }

    /// Returns the stable item key.
    #[must_use]
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Returns the display label.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    /// Returns the target path, if the item links anywhere.
    #[must_use]
    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    /// Returns the permission restriction, if any.
    #[must_use]
    pub fn required_permissions(&self) -> Option<&[String]> {
        self.required_permissions.as_deref()
    }

    /// Returns the role restriction, if any.
    #[must_use]
    pub fn required_roles(&self) -> Option<&[UserRole]> {
        self.required_roles.as_deref()
    }

    /// Returns whether the role and permission restrictions both pass.
    ///
    /// No administrator override applies here; it is a route-guard rule.
    #[must_use]
    pub fn is_accessible(&self, permissions: &PermissionSet, role: Option<UserRole>) -> bool {
        let role_allowed = self
            .required_roles
            .as_ref()
            .is_none_or(|roles| role.is_some_and(|role| roles.contains(&role)));
        let permission_allowed = self
            .required_permissions
            .as_ref()
            .is_none_or(|required| permissions.contains_any(required));

        role_allowed && permission_allowed
    }
}

/// One entry of the route-guard policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteGuard {
    path: String,
    permissions: Option<Vec<String>>,
    roles: Option<Vec<UserRole>>,
}

impl RouteGuard {
    /// Creates an unrestricted guard for a path prefix.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            permissions: None,
            roles: None,
        }
    }

    /// Requires at least one of the permissions.
    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = non_empty(permissions.into_iter().map(Into::into).collect());
        self
    }

    /// Requires one of the roles.
    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = UserRole>) -> Self {
        self.roles = non_empty(roles.into_iter().collect());
        self
    }

    /// Builds a guard from a navigation item; `None` for items without a target.
    #[must_use]
    pub fn from_navigation_item(item: &NavigationItem) -> Option<Self> {
        item.href().map(|href| Self {
            path: href.to_owned(),
            permissions: item.required_permissions.clone(),
            roles: item.required_roles.clone(),
        })
    }

    /// Returns the guarded path prefix.
    #[must_use]
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// Returns the permission restriction, if any.
    #[must_use]
    pub fn permissions(&self) -> Option<&[String]> {
        self.permissions.as_deref()
    }

    /// Returns the role restriction, if any.
    #[must_use]
    pub fn roles(&self) -> Option<&[UserRole]> {
        self.roles.as_deref()
    }

    /// Returns whether this guard covers the location.
    #[must_use]
    pub fn matches(&self, location: &str) -> bool {
        location.starts_with(self.path.as_str())
    }

    fn admits(&self, evaluator: &PermissionEvaluator) -> bool {
        let permissions_allowed = self
            .permissions
            .as_ref()
            .is_none_or(|required| evaluator.has_any_permission(required));
        let role_allowed = self
            .roles
            .as_ref()
            .is_none_or(|roles| evaluator.role().is_some_and(|role| roles.contains(&role)));

        permissions_allowed && role_allowed
    }
}

/// Outcome of evaluating a location against the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAccess {
    /// No guard covers the location.
    Unguarded,
    /// The governing guard's restrictions pass.
    Granted,
    /// The administrator role bypassed the governing guard.
    AdminOverride,
    /// The governing guard's restrictions fail.
    Denied,
}

impl RouteAccess {
    /// Returns whether the location may be shown.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied)
    }
}

/// Ordered route-guard table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuardPolicy {
    guards: Vec<RouteGuard>,
}

impl RouteGuardPolicy {
    /// Creates a validated policy.
    ///
    /// Rejects empty paths and any guard an earlier guard would always
    /// shadow (including exact duplicates).
    pub fn new(guards: Vec<RouteGuard>) -> AppResult<Self> {
        for (index, guard) in guards.iter().enumerate() {
            if guard.path.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "route guard at position {index} has an empty path"
                )));
            }

            if let Some(earlier) = guards[..index]
                .iter()
                .find(|earlier| guard.path.starts_with(earlier.path.as_str()))
            {
                return Err(AppError::Validation(format!(
                    "route guard '{}' is unreachable because '{}' precedes it",
                    guard.path, earlier.path
                )));
            }
        }

        Ok(Self { guards })
    }

    /// Creates a policy from navigation items followed by supplementary guards.
    pub fn from_navigation(
        items: &[NavigationItem],
        supplementary: Vec<RouteGuard>,
    ) -> AppResult<Self> {
        let guards = items
            .iter()
            .filter_map(RouteGuard::from_navigation_item)
            .chain(supplementary)
            .collect();

        Self::new(guards)
    }

    /// Creates the console's standard policy.
    pub fn console_default() -> AppResult<Self> {
        Self::from_navigation(&default_navigation_items(), default_supplementary_guards())
    }

    /// Returns the guards in priority order.
    #[must_use]
    pub fn guards(&self) -> &[RouteGuard] {
        &self.guards
    }

    /// Returns the governing guard for a location.
    #[must_use]
    pub fn matching_guard(&self, location: &str) -> Option<&RouteGuard> {
        self.guards.iter().find(|guard| guard.matches(location))
    }

    /// Evaluates a location for an already authenticated identity.
    #[must_use]
    pub fn evaluate(&self, location: &str, evaluator: &PermissionEvaluator) -> RouteAccess {
        let Some(guard) = self.matching_guard(location) else {
            return RouteAccess::Unguarded;
        };

        if evaluator.is_admin() {
            return RouteAccess::AdminOverride;
        }

        if guard.admits(evaluator) {
            RouteAccess::Granted
        } else {
            RouteAccess::Denied
        }
    }
}

/// Destination used when the requested page is not accessible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceFallback {
    /// First accessible navigation target, or the login route.
    pub route: String,
    /// Whether any navigation item is accessible.
    pub has_accessible_menu: bool,
}

/// Picks the first accessible navigation item in declaration order.
#[must_use]
pub fn resolve_workspace_fallback(
    items: &[NavigationItem],
    permissions: &PermissionSet,
    role: Option<UserRole>,
) -> WorkspaceFallback {
    let accessible = items
        .iter()
        .filter(|item| item.href().is_some())
        .find(|item| item.is_accessible(permissions, role))
        .and_then(NavigationItem::href);

    match accessible {
        Some(route) => WorkspaceFallback {
            route: route.to_owned(),
            has_accessible_menu: true,
        },
        None => WorkspaceFallback {
            route: routes::LOGIN.to_owned(),
            has_accessible_menu: false,
        },
    }
}

/// Items to render in the sidebar.
///
/// Everything is shown until an identity with permissions is known.
#[must_use]
pub fn visible_navigation_items<'a>(
    items: &'a [NavigationItem],
    evaluator: &PermissionEvaluator,
) -> Vec<&'a NavigationItem> {
    if evaluator.role().is_none() || evaluator.permissions().is_empty() {
        return items.iter().collect();
    }

    items
        .iter()
        .filter(|item| item.is_accessible(evaluator.permissions(), evaluator.role()))
        .collect()
}

/// Sidebar entries of the console, in display order.
#[must_use]
pub fn default_navigation_items() -> Vec<NavigationItem> {
    vec![
        NavigationItem::new("products", "Products", Some(routes::PRODUCTS))
            .with_required_permissions(["product.read"]),
        NavigationItem::new("templates", "Templates", Some(routes::TEMPLATES))
            .with_required_permissions(["template.view"]),
        NavigationItem::new("matching", "Matching", Some(routes::MATCHING))
            .with_required_permissions(["matching.create", "matching.review"]),
        NavigationItem::new("memory", "Memory", Some(routes::MEMORY))
            .with_required_permissions(["matching.review", "matching.create"]),
        NavigationItem::new("settings", "User management", Some(routes::SETTINGS))
            .with_required_permissions(["system.config"]),
    ]
}

/// Guards for pages reachable outside the sidebar.
#[must_use]
pub fn default_supplementary_guards() -> Vec<RouteGuard> {
    vec![
        RouteGuard::new(routes::REVIEW).with_permissions(["matching.review"]),
        RouteGuard::new(routes::PRICES).with_permissions(["price.read"]),
        RouteGuard::new(routes::REPORTS).with_permissions(["report.read"]),
    ]
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{
        NavigationItem, RouteAccess, RouteGuard, RouteGuardPolicy, default_navigation_items,
        resolve_workspace_fallback, routes, visible_navigation_items,
    };
    use crate::{PermissionEvaluator, PermissionSet, UserRole};

    fn evaluator(permissions: &[&str], role: UserRole) -> PermissionEvaluator {
        PermissionEvaluator::new(permissions.iter().copied().collect(), Some(role))
    }

    fn policy(guards: Vec<RouteGuard>) -> RouteGuardPolicy {
        RouteGuardPolicy::new(guards).unwrap_or_else(|error| panic!("policy: {error}"))
    }

    #[test]
    fn first_matching_prefix_governs() {
        let policy = policy(vec![
            RouteGuard::new("/dashboard/settings").with_permissions(["system.config"]),
            RouteGuard::new("/dashboard").with_permissions(["product.read"]),
        ]);
        let reader = evaluator(&["product.read"], UserRole::Operator);

        assert_eq!(
            policy
                .matching_guard("/dashboard/settings/users")
                .map(RouteGuard::path),
            Some("/dashboard/settings")
        );
        assert_eq!(
            policy.evaluate("/dashboard/settings/users", &reader),
            RouteAccess::Denied
        );
        assert_eq!(
            policy.evaluate("/dashboard/products", &reader),
            RouteAccess::Granted
        );
    }

    #[test]
    fn admin_without_permissions_passes_every_guard() {
        let policy = RouteGuardPolicy::console_default()
            .unwrap_or_else(|error| panic!("default policy: {error}"));
        let admin = evaluator(&[], UserRole::Admin);

        for guard in policy.guards() {
            assert_eq!(
                policy.evaluate(guard.path(), &admin),
                RouteAccess::AdminOverride
            );
        }
    }

    #[test]
    fn unmatched_location_is_unguarded() {
        let policy = policy(vec![RouteGuard::new("/dashboard/prices")]);
        let viewer = evaluator(&[], UserRole::Viewer);
        assert_eq!(policy.evaluate("/profile", &viewer), RouteAccess::Unguarded);
        assert!(RouteAccess::Unguarded.is_allowed());
    }

    #[test]
    fn role_restriction_requires_membership() {
        let policy = policy(vec![
            RouteGuard::new("/dashboard/audit").with_roles([UserRole::Reviewer]),
        ]);
        assert_eq!(
            policy.evaluate("/dashboard/audit", &evaluator(&[], UserRole::Reviewer)),
            RouteAccess::Granted
        );
        assert_eq!(
            policy.evaluate("/dashboard/audit", &evaluator(&[], UserRole::Viewer)),
            RouteAccess::Denied
        );
        assert_eq!(
            policy.evaluate("/dashboard/audit", &PermissionEvaluator::for_user(None)),
            RouteAccess::Denied
        );
    }

    #[test]
    fn shadowed_and_duplicate_guards_are_rejected() {
        let shadowed = RouteGuardPolicy::new(vec![
            RouteGuard::new("/dashboard"),
            RouteGuard::new("/dashboard/settings"),
        ]);
        assert!(shadowed.is_err());

        let duplicate = RouteGuardPolicy::new(vec![
            RouteGuard::new("/dashboard/prices"),
            RouteGuard::new("/dashboard/prices"),
        ]);
        assert!(duplicate.is_err());

        let empty = RouteGuardPolicy::new(vec![RouteGuard::new(" ")]);
        assert!(empty.is_err());
    }

    #[test]
    fn empty_restriction_lists_mean_unrestricted() {
        let guard = RouteGuard::new("/x").with_permissions(Vec::<String>::new());
        assert_eq!(guard.permissions(), None);
    }

    #[test]
    fn fallback_skips_inaccessible_items() {
        let items = vec![
            NavigationItem::new("products", "Products", Some(routes::PRODUCTS))
                .with_required_permissions(["product.read"]),
            NavigationItem::new("matching", "Matching", Some(routes::MATCHING))
                .with_required_permissions(["matching.review", "matching.create"]),
        ];
        let permissions: PermissionSet = ["matching.review"].into_iter().collect();

        let fallback = resolve_workspace_fallback(&items, &permissions, Some(UserRole::Reviewer));
        assert_eq!(fallback.route, routes::MATCHING);
        assert!(fallback.has_accessible_menu);
    }

    #[test]
    fn fallback_without_accessible_item_points_to_login() {
        let fallback = resolve_workspace_fallback(
            &default_navigation_items(),
            &PermissionSet::new(),
            Some(UserRole::Viewer),
        );
        assert_eq!(fallback.route, routes::LOGIN);
        assert!(!fallback.has_accessible_menu);
    }

    #[test]
    fn fallback_ignores_items_without_target() {
        let items = vec![
            NavigationItem::new("divider", "Divider", None),
            NavigationItem::new("prices", "Prices", Some(routes::PRICES)),
        ];
        let fallback = resolve_workspace_fallback(&items, &PermissionSet::new(), None);
        assert_eq!(fallback.route, routes::PRICES);
    }

    #[test]
    fn fallback_role_restriction_needs_a_role() {
        let items = vec![
            NavigationItem::new("settings", "Settings", Some(routes::SETTINGS))
                .with_required_roles([UserRole::Admin]),
        ];
        let fallback = resolve_workspace_fallback(&items, &PermissionSet::new(), None);
        assert!(!fallback.has_accessible_menu);
    }

    #[test]
    fn sidebar_shows_everything_until_permissions_are_known() {
        let items = default_navigation_items();
        let anonymous = PermissionEvaluator::for_user(None);
        assert_eq!(visible_navigation_items(&items, &anonymous).len(), items.len());

        let reviewer = evaluator(&["matching.review"], UserRole::Reviewer);
        let keys: Vec<&str> = visible_navigation_items(&items, &reviewer)
            .into_iter()
            .map(NavigationItem::key)
            .collect();
        assert_eq!(keys, ["matching", "memory"]);
    }

    proptest! {
        #[test]
        fn fallback_is_deterministic(
            held in proptest::collection::vec(
                prop_oneof![
                    Just("product.read"),
                    Just("template.view"),
                    Just("matching.review"),
                    Just("system.config"),
                ],
                0..4,
            ),
        ) {
            let items = default_navigation_items();
            let permissions: PermissionSet = held.iter().copied().collect();
            let first = resolve_workspace_fallback(&items, &permissions, Some(UserRole::Operator));
            let second = resolve_workspace_fallback(&items, &permissions, Some(UserRole::Operator));
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.has_accessible_menu, !permissions.is_empty());
        }
    }
}
