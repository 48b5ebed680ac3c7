//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod navigation;
mod permission;
mod token;
mod user;

pub use navigation::{
    NavigationItem, RouteAccess, RouteGuard, RouteGuardPolicy, WorkspaceFallback,
    default_navigation_items, default_supplementary_guards, resolve_workspace_fallback, routes,
    visible_navigation_items,
};
pub use permission::{
    PermissionDefinition, PermissionEvaluator, PermissionManifest, PermissionSet,
    RolePermissionsMap,
};
pub use token::{TokenPair, UnverifiedAccessClaims};
pub use user::{SessionUser, UserRole};
