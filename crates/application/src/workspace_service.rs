//! Dashboard shell decisions: route gating, sidebar and workspace landing.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use matchdesk_core::AppResult;
use matchdesk_domain::{
    NavigationItem, RouteAccess, RouteGuardPolicy, WorkspaceFallback, default_navigation_items,
    default_supplementary_guards, resolve_workspace_fallback, routes, visible_navigation_items,
};

use crate::SessionService;

/// Gate decision for a dashboard location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RouteDecision {
    /// Session initialization has not finished; render nothing yet.
    Pending,
    /// No identity is held.
    RedirectToLogin,
    /// The location may be shown.
    Allowed {
        /// How access was obtained.
        access: RouteAccess,
    },
    /// The governing guard refused; send the user to the fallback.
    Denied {
        /// First accessible workspace page.
        fallback: WorkspaceFallback,
    },
}

/// Application service for the dashboard shell.
#[derive(Clone)]
pub struct WorkspaceService {
    session: SessionService,
    navigation: Arc<[NavigationItem]>,
    policy: Arc<RouteGuardPolicy>,
}

impl WorkspaceService {
    /// Creates a workspace service over an explicit navigation manifest and policy.
    #[must_use]
    pub fn new(
        session: SessionService,
        navigation: Vec<NavigationItem>,
        policy: RouteGuardPolicy,
    ) -> Self {
        Self {
            session,
            navigation: navigation.into(),
            policy: Arc::new(policy),
        }
    }

    /// Creates a workspace service with the console's standard manifest.
    pub fn console_default(session: SessionService) -> AppResult<Self> {
        let navigation = default_navigation_items();
        let policy =
            RouteGuardPolicy::from_navigation(&navigation, default_supplementary_guards())?;
        Ok(Self::new(session, navigation, policy))
    }

    /// Returns the navigation manifest in display order.
    #[must_use]
    pub fn navigation(&self) -> &[NavigationItem] {
        &self.navigation
    }

    /// Returns the route-guard policy.
    #[must_use]
    pub fn policy(&self) -> &RouteGuardPolicy {
        &self.policy
    }

    /// Decides whether a dashboard location may be rendered.
    pub async fn check_route(&self, location: &str) -> RouteDecision {
        let snapshot = self.session.snapshot().await;
        if !snapshot.is_initialized() {
            return RouteDecision::Pending;
        }

        let Some(user) = snapshot.user() else {
            return RouteDecision::RedirectToLogin;
        };

        let evaluator = snapshot.evaluator();
        let access = self.policy.evaluate(location, &evaluator);
        if access.is_allowed() {
            return RouteDecision::Allowed { access };
        }

        let fallback = resolve_workspace_fallback(
            &self.navigation,
            user.permissions(),
            Some(user.role()),
        );
        info!(location, fallback = %fallback.route, "route denied");
        RouteDecision::Denied { fallback }
    }

    /// Resolves the first accessible workspace page for the current user.
    pub async fn workspace_fallback(&self) -> WorkspaceFallback {
        let evaluator = self.session.permissions().await;
        resolve_workspace_fallback(&self.navigation, evaluator.permissions(), evaluator.role())
    }

    /// Returns where "back to workspace" leads from `current`.
    ///
    /// Without an accessible menu the session is logged out and the login
    /// route is returned.
    pub async fn back_to_workspace(&self, current: &str) -> String {
        let fallback = self.workspace_fallback().await;
        if !fallback.has_accessible_menu {
            self.session.logout().await;
            return routes::LOGIN.to_owned();
        }

        if current == fallback.route {
            routes::HOME.to_owned()
        } else {
            fallback.route
        }
    }

    /// Returns where the landing page sends the user.
    ///
    /// An authenticated user without any accessible page is logged out.
    pub async fn entry_route(&self) -> String {
        if !self.session.snapshot().await.is_authenticated() {
            return routes::LOGIN.to_owned();
        }

        let fallback = self.workspace_fallback().await;
        if fallback.has_accessible_menu {
            return fallback.route;
        }

        self.session.logout().await;
        routes::LOGIN.to_owned()
    }

    /// Returns the sidebar entries for the current user.
    pub async fn visible_navigation(&self) -> Vec<NavigationItem> {
        let evaluator = self.session.permissions().await;
        visible_navigation_items(&self.navigation, &evaluator)
            .into_iter()
            .cloned()
            .collect()
    }
}
