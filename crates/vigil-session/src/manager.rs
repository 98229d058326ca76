//! Session Manager
//!
//! Drives the session lifecycle through the request pipeline: login,
//! profile and tenant loading, tenant selection, logout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use vigil_api::{ApiClient, ApiRequest};

use crate::error::SessionError;
use crate::session::{Profile, Session, Tenant};
use crate::state::SessionHandle;
use crate::Result;

/// Paths of the endpoints the session talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEndpoints {
    pub login: String,
    pub profile: String,
    pub tenants: String,
}

impl Default for SessionEndpoints {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            profile: "/user-management/me".to_string(),
            tenants: "/tenant-management".to_string(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct SessionManager {
    handle: SessionHandle,
    client: ApiClient,
    endpoints: SessionEndpoints,
}

impl SessionManager {
    /// `client` must read its session through `handle`
    pub fn new(handle: SessionHandle, client: ApiClient, endpoints: SessionEndpoints) -> Self {
        Self {
            handle,
            client,
            endpoints,
        }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn hydrate(&self) -> Result<()> {
        self.handle.hydrate()
    }

    /// Exchange credentials for a token, persist it, then load the profile
    pub async fn login(&self, credentials: &Credentials) -> Result<Profile> {
        tracing::info!(username = %credentials.username, "Logging in");

        let request = ApiRequest::post(self.endpoints.login.as_str()).with_form([
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ]);

        let response: TokenResponse = self
            .client
            .send_json(request)
            .await
            .map_err(SessionError::Auth)?;

        if response.access_token.is_empty() {
            return Err(SessionError::MissingToken);
        }

        self.handle.set_token(&response.access_token)?;
        tracing::info!(username = %credentials.username, "Login succeeded");

        self.fetch_profile().await
    }

    /// Load the profile of the current token.
    ///
    /// Does not recover from a rejected token; on an auth failure the
    /// caller decides whether to call [`SessionManager::logout`]. A profile
    /// that arrives after its session ended is discarded and reported as
    /// [`SessionError::NotAuthenticated`].
    pub async fn fetch_profile(&self) -> Result<Profile> {
        let token = self.handle.token();
        if token.is_empty() {
            return Err(SessionError::NotAuthenticated);
        }

        let profile: Profile = self
            .client
            .send_json(ApiRequest::get(self.endpoints.profile.as_str()))
            .await?;

        // The session ended while the request was in flight
        if !self.handle.set_profile(&token, profile.clone()) {
            return Err(SessionError::NotAuthenticated);
        }

        tracing::debug!(
            username = %profile.username,
            superuser = profile.is_superuser,
            permissions = profile.permissions.len(),
            "Loaded profile"
        );
        Ok(profile)
    }

    /// Load the tenant list. Never fails: on error the current list is
    /// kept and the failure is only logged.
    ///
    /// With no tenant selected, the default-flagged tenant is selected,
    /// else the first one listed. A list that arrives after its session
    /// ended is discarded.
    pub async fn fetch_tenants(&self) -> Vec<Tenant> {
        let token = self.handle.token();
        let body = match self
            .client
            .send(ApiRequest::get(self.endpoints.tenants.as_str()))
            .await
        {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load tenant list");
                return self.handle.tenants();
            }
        };

        let tenants = match parse_tenant_list(body) {
            Ok(tenants) => tenants,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable tenant list");
                return self.handle.tenants();
            }
        };

        match self.handle.set_tenants(&token, tenants.clone()) {
            Ok(true) => tenants,
            Ok(false) => self.handle.tenants(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to persist tenant selection");
                tenants
            }
        }
    }

    pub fn set_tenant(&self, tenant: Tenant) -> Result<()> {
        self.handle.set_tenant(tenant)
    }

    pub fn logout(&self) -> bool {
        self.handle.logout()
    }

    pub fn snapshot(&self) -> Session {
        self.handle.snapshot()
    }

    pub fn token(&self) -> String {
        self.handle.token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.handle.is_authenticated()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.handle.profile()
    }

    pub fn current_tenant(&self) -> Option<Tenant> {
        self.handle.current_tenant()
    }

    pub fn tenants(&self) -> Vec<Tenant> {
        self.handle.tenants()
    }

    pub fn is_superuser(&self) -> bool {
        self.handle.with_session(Session::is_superuser)
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.handle.with_session(|s| s.has_permission(name))
    }

    pub fn has_any<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.handle.with_session(|s| s.has_any(names))
    }

    pub fn has_all<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.handle.with_session(|s| s.has_all(names))
    }
}

impl Clone for SessionManager {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            client: self.client.clone(),
            endpoints: self.endpoints.clone(),
        }
    }
}

/// Accepts a bare array or an object wrapping it under `projects`/`tenants`
fn parse_tenant_list(body: Value) -> serde_json::Result<Vec<Tenant>> {
    let list = match body {
        Value::Object(mut map) => map
            .remove("projects")
            .or_else(|| map.remove("tenants"))
            .unwrap_or(Value::Array(Vec::new())),
        other => other,
    };
    serde_json::from_value(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use vigil_api::testing::MockTransport;
    use vigil_api::{BufferedSink, ClientConfig, Method, NotificationDispatcher};
    use vigil_storage::SessionStore;

    struct Fixture {
        manager: SessionManager,
        store: SessionStore,
        transport: Arc<MockTransport>,
        sink: Arc<BufferedSink>,
    }

    fn fixture() -> Fixture {
        let store = SessionStore::open_in_memory().unwrap();
        let handle = SessionHandle::new(store.clone());
        let transport = Arc::new(MockTransport::new());
        let sink = Arc::new(BufferedSink::new());
        let client = ApiClient::new(
            ClientConfig::default(),
            Arc::new(handle.clone()),
            transport.clone(),
            NotificationDispatcher::new(sink.clone()),
        );
        Fixture {
            manager: SessionManager::new(handle, client, SessionEndpoints::default()),
            store,
            transport,
            sink,
        }
    }

    fn profile_body() -> Value {
        json!({
            "id": 1,
            "username": "ops",
            "permissions": ["alert_rule.read", "datasource.read"],
            "is_superuser": false
        })
    }

    #[tokio::test]
    async fn test_login_persists_token_and_loads_profile() {
        let f = fixture();
        f.transport.respond(
            Method::Post,
            "/auth/login",
            200,
            json!({"access_token": "abc", "token_type": "bearer"}),
        );
        f.transport
            .respond(Method::Get, "/user-management/me", 200, profile_body());

        let profile = f
            .manager
            .login(&Credentials::new("ops", "secret"))
            .await
            .unwrap();

        assert_eq!(profile.username, "ops");
        assert_eq!(f.manager.token(), "abc");
        assert!(f.manager.has_permission("alert_rule.read"));
        assert!(!f.manager.has_permission("user.read"));

        let login = &f.transport.requests()[0];
        assert_eq!(login.header("Authorization"), None);
        assert!(matches!(login.body, vigil_api::Body::Form(_)));

        let me = f.transport.last_request().unwrap();
        assert_eq!(me.header("Authorization"), Some("Bearer abc"));

        let reloaded = SessionHandle::new(f.store.clone());
        reloaded.hydrate().unwrap();
        assert_eq!(reloaded.token(), "abc");
    }

    #[tokio::test]
    async fn test_login_failure_is_auth_error() {
        let f = fixture();
        f.transport.respond(
            Method::Post,
            "/auth/login",
            401,
            json!({"detail": "Incorrect username or password"}),
        );

        let result = f.manager.login(&Credentials::new("ops", "wrong")).await;
        assert!(matches!(result, Err(SessionError::Auth(_))));
        assert!(!f.manager.is_authenticated());
        assert!(f.sink.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_profile_does_not_self_heal_on_forbidden() {
        let f = fixture();
        f.manager.handle().set_token("abc").unwrap();
        f.transport
            .respond(Method::Get, "/user-management/me", 403, json!({"detail": "inactive"}));

        let error = f.manager.fetch_profile().await.unwrap_err();
        assert!(error.is_auth_failure());
        assert_eq!(f.manager.token(), "abc");
        assert_eq!(f.manager.profile(), None);
    }

    #[tokio::test]
    async fn test_fetch_profile_requires_token() {
        let f = fixture();
        let result = f.manager.fetch_profile().await;
        assert!(matches!(result, Err(SessionError::NotAuthenticated)));
        assert!(f.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_any_unauthorized_response_clears_session() {
        let f = fixture();
        f.manager.handle().set_token("abc").unwrap();
        f.manager.set_tenant(Tenant::new(7, "payments")).unwrap();
        f.transport
            .respond(Method::Get, "/user-management/me", 200, profile_body());
        f.manager.fetch_profile().await.unwrap();

        f.transport
            .respond(Method::Get, "/silence/", 401, json!({"detail": "expired"}));
        let result = f.manager.client().get("/silence/", json!({})).await;

        assert!(result.is_err());
        assert_eq!(f.manager.token(), "");
        assert_eq!(f.manager.profile(), None);
        assert_eq!(f.manager.current_tenant(), None);
        assert_eq!(f.sink.redirects(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_tenants_selects_default() {
        let f = fixture();
        f.manager.handle().set_token("abc").unwrap();
        f.transport.respond(
            Method::Get,
            "/tenant-management",
            200,
            json!([{"id": 1, "is_default": false}, {"id": 2, "is_default": true}]),
        );

        let tenants = f.manager.fetch_tenants().await;

        assert_eq!(tenants.len(), 2);
        assert_eq!(f.manager.current_tenant().map(|t| t.id), Some(2));
        assert!(f.transport.last_request().unwrap().query.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_tenants_keeps_existing_selection() {
        let f = fixture();
        f.manager.handle().set_token("abc").unwrap();
        f.manager.set_tenant(Tenant::new(9, "legacy")).unwrap();
        f.transport.respond(
            Method::Get,
            "/tenant-management",
            200,
            json!({"total": 2, "projects": [{"id": 1}, {"id": 2}]}),
        );

        let tenants = f.manager.fetch_tenants().await;
        assert_eq!(tenants.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(f.manager.current_tenant().map(|t| t.id), Some(9));
    }

    #[tokio::test]
    async fn test_fetch_tenants_falls_back_to_first() {
        let f = fixture();
        f.manager.handle().set_token("abc").unwrap();
        f.transport.respond(
            Method::Get,
            "/tenant-management",
            200,
            json!({"tenants": [{"id": 4}, {"id": 3}]}),
        );

        f.manager.fetch_tenants().await;
        assert_eq!(f.manager.current_tenant().map(|t| t.id), Some(4));
    }

    #[tokio::test]
    async fn test_fetch_tenants_failure_is_swallowed() {
        let f = fixture();
        f.transport
            .respond(Method::Get, "/tenant-management", 500, json!({"detail": "down"}));

        let tenants = f.manager.fetch_tenants().await;
        assert!(tenants.is_empty());
        assert_eq!(f.manager.current_tenant(), None);

        f.transport
            .respond(Method::Get, "/tenant-management", 200, json!("garbage"));
        assert!(f.manager.fetch_tenants().await.is_empty());
    }

    #[tokio::test]
    async fn test_profile_arriving_after_logout_is_rejected() {
        let f = fixture();
        f.manager.handle().set_token("abc").unwrap();
        f.transport
            .respond(Method::Get, "/user-management/me", 200, profile_body());
        let handle = f.manager.handle().clone();
        f.transport
            .on_request(Method::Get, "/user-management/me", move || {
                handle.logout();
            });

        let result = f.manager.fetch_profile().await;

        assert!(matches!(result, Err(SessionError::NotAuthenticated)));
        assert_eq!(f.manager.profile(), None);
        assert_eq!(f.manager.token(), "");
    }

    #[tokio::test]
    async fn test_tenants_arriving_after_logout_are_dropped() {
        let f = fixture();
        f.manager.handle().set_token("abc").unwrap();
        f.transport.respond(
            Method::Get,
            "/tenant-management",
            200,
            json!([{"id": 1}, {"id": 2, "is_default": true}]),
        );
        let handle = f.manager.handle().clone();
        f.transport
            .on_request(Method::Get, "/tenant-management", move || {
                handle.logout();
            });

        let tenants = f.manager.fetch_tenants().await;

        assert!(tenants.is_empty());
        assert!(f.manager.tenants().is_empty());
        assert_eq!(f.manager.current_tenant(), None);
        assert_eq!(f.store.current_tenant().unwrap(), None);

        let reloaded = SessionHandle::new(f.store.clone());
        reloaded.hydrate().unwrap();
        assert_eq!(reloaded.snapshot(), Session::default());
    }

    #[tokio::test]
    async fn test_late_rejection_keeps_new_login() {
        let f = fixture();
        f.manager.handle().set_token("old").unwrap();
        f.manager.set_tenant(Tenant::new(7, "payments")).unwrap();
        f.transport
            .respond(Method::Get, "/silence/", 401, json!({"detail": "expired"}));
        let handle = f.manager.handle().clone();
        f.transport.on_request(Method::Get, "/silence/", move || {
            handle.set_token("new").unwrap();
        });

        let result = f.manager.client().get("/silence/", json!({})).await;

        assert!(result.is_err());
        assert_eq!(f.manager.token(), "new");
        assert_eq!(f.manager.current_tenant().map(|t| t.id), Some(7));
        assert!(f.sink.redirects().is_empty());
        assert_eq!(f.store.token().unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("ops", "hunter2"));
        assert!(rendered.contains("ops"));
        assert!(!rendered.contains("hunter2"));
    }
}
