//! Role to permission manifest loading.
//!
//! The manifest is fetched at most once per process lifetime unless a caller
//! forces a reload. Failures are soft: the previous mapping stays in place
//! and the caller gets `None`.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use matchdesk_domain::{PermissionManifest, RolePermissionsMap};

use crate::{AuthApi, CallOutcome};

#[derive(Default)]
struct ManifestCache {
    manifest: Option<Arc<PermissionManifest>>,
    role_permissions: RolePermissionsMap,
    epoch: u64,
}

/// Application service that memoizes the permission manifest.
pub struct PermissionManifestService {
    auth_api: Arc<dyn AuthApi>,
    cache: RwLock<ManifestCache>,
    fetch_lock: Mutex<()>,
}

impl PermissionManifestService {
    /// Creates a loader with an empty cache.
    #[must_use]
    pub fn new(auth_api: Arc<dyn AuthApi>) -> Self {
        Self {
            auth_api,
            cache: RwLock::new(ManifestCache::default()),
            fetch_lock: Mutex::new(()),
        }
    }

    /// Returns the role mapping, fetching the manifest when needed.
    ///
    /// Without an access token no request is made and the last known
    /// mapping is returned. `None` means the fetch failed.
    pub async fn load(&self, access_token: Option<&str>, force: bool) -> Option<RolePermissionsMap> {
        if !force && let Some(cached) = self.cached_role_permissions().await {
            return Some(cached);
        }

        let Some(access_token) = access_token.filter(|token| !token.trim().is_empty()) else {
            return Some(self.role_permissions().await);
        };

        let _fetch_guard = self.fetch_lock.lock().await;
        if !force && let Some(cached) = self.cached_role_permissions().await {
            return Some(cached);
        }

        let epoch = self.cache.read().await.epoch;
        let result = self.auth_api.fetch_permission_manifest(access_token).await;

        match CallOutcome::tolerant(result) {
            CallOutcome::Completed(manifest) => {
                let role_permissions = RolePermissionsMap::from_manifest(&manifest);
                let mut cache = self.cache.write().await;
                if cache.epoch != epoch {
                    debug!("discarding permission manifest fetched before a reset");
                    return None;
                }

                cache.manifest = Some(Arc::new(manifest));
                cache.role_permissions = role_permissions.clone();
                Some(role_permissions)
            }
            CallOutcome::Degraded(error) | CallOutcome::Invalidated(error) => {
                warn!(error = %error, "failed to load permission manifest");
                None
            }
        }
    }

    /// Returns the last derived mapping, empty before the first load.
    pub async fn role_permissions(&self) -> RolePermissionsMap {
        self.cache.read().await.role_permissions.clone()
    }

    /// Returns the cached manifest, if one was loaded.
    pub async fn manifest(&self) -> Option<Arc<PermissionManifest>> {
        self.cache.read().await.manifest.clone()
    }

    /// Drops the cached manifest and mapping.
    ///
    /// Fetches still in flight when this is called are discarded.
    pub async fn reset(&self) {
        let mut cache = self.cache.write().await;
        cache.manifest = None;
        cache.role_permissions = RolePermissionsMap::default();
        cache.epoch = cache.epoch.wrapping_add(1);
    }

    async fn cached_role_permissions(&self) -> Option<RolePermissionsMap> {
        let cache = self.cache.read().await;
        cache
            .manifest
            .is_some()
            .then(|| cache.role_permissions.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use matchdesk_core::{AppError, AppResult};
    use matchdesk_domain::{PermissionManifest, SessionUser, TokenPair};
    use tokio::sync::Mutex;

    use crate::{AuthApi, AuthSession, LoginCredentials, RegisterPayload};

    use super::PermissionManifestService;

    struct FakeManifestApi {
        fetches: AtomicUsize,
        responses: Mutex<Vec<AppResult<PermissionManifest>>>,
    }

    impl FakeManifestApi {
        fn new(responses: Vec<AppResult<PermissionManifest>>) -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl AuthApi for FakeManifestApi {
        async fn login(&self, _credentials: &LoginCredentials) -> AppResult<AuthSession> {
            Err(AppError::Internal("not used".to_owned()))
        }

        async fn register(&self, _payload: &RegisterPayload) -> AppResult<AuthSession> {
            Err(AppError::Internal("not used".to_owned()))
        }

        async fn refresh(&self, _refresh_token: &str) -> AppResult<TokenPair> {
            Err(AppError::Internal("not used".to_owned()))
        }

        async fn request_password_reset(&self, _email: &str) -> AppResult<Option<String>> {
            Err(AppError::Internal("not used".to_owned()))
        }

        async fn fetch_current_user(&self, _access_token: &str) -> AppResult<Option<SessionUser>> {
            Err(AppError::Internal("not used".to_owned()))
        }

        async fn fetch_permission_manifest(
            &self,
            _access_token: &str,
        ) -> AppResult<PermissionManifest> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().await;
            if responses.is_empty() {
                return Ok(manifest(&["product.read"]));
            }
            responses.remove(0)
        }
    }

    fn manifest(operator_permissions: &[&str]) -> PermissionManifest {
        PermissionManifest {
            permissions: BTreeMap::new(),
            roles: BTreeMap::from([(
                "operator".to_owned(),
                operator_permissions.iter().map(|value| (*value).to_owned()).collect(),
            )]),
        }
    }

    #[tokio::test]
    async fn sequential_unforced_loads_fetch_once() {
        let api = Arc::new(FakeManifestApi::new(Vec::new()));
        let service = PermissionManifestService::new(api.clone());

        let first = service.load(Some("token"), false).await;
        let second = service.load(Some("token"), false).await;

        assert_eq!(api.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert!(service.manifest().await.is_some());
    }

    #[tokio::test]
    async fn forced_load_always_fetches() {
        let api = Arc::new(FakeManifestApi::new(Vec::new()));
        let service = PermissionManifestService::new(api.clone());

        service.load(Some("token"), true).await;
        service.load(Some("token"), true).await;

        assert_eq!(api.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_token_skips_the_request() {
        let api = Arc::new(FakeManifestApi::new(Vec::new()));
        let service = PermissionManifestService::new(api.clone());

        let mapping = service.load(None, false).await;
        let blank = service.load(Some("  "), true).await;

        assert_eq!(api.fetches.load(Ordering::SeqCst), 0);
        assert!(mapping.is_some_and(|mapping| mapping.is_empty()));
        assert!(blank.is_some());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_mapping() {
        let api = Arc::new(FakeManifestApi::new(vec![
            Ok(manifest(&["product.read"])),
            Err(AppError::Unavailable("connection refused".to_owned())),
        ]));
        let service = PermissionManifestService::new(api);

        assert!(service.load(Some("token"), false).await.is_some());
        assert!(service.load(Some("token"), true).await.is_none());

        let mapping = service.role_permissions().await;
        assert_eq!(mapping.permissions_for("operator"), ["product.read".to_owned()]);
    }

    #[tokio::test]
    async fn reset_clears_the_cache() {
        let api = Arc::new(FakeManifestApi::new(Vec::new()));
        let service = PermissionManifestService::new(api.clone());

        service.load(Some("token"), false).await;
        service.reset().await;
        assert!(service.manifest().await.is_none());
        assert!(service.role_permissions().await.is_empty());

        service.load(Some("token"), false).await;
        assert_eq!(api.fetches.load(Ordering::SeqCst), 2);
    }
}
