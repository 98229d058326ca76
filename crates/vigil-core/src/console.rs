//! Console state container
//!
//! Owns the session store, the request pipeline, the session manager and
//! the navigation guard, all sharing one [`SessionHandle`].

use serde_json::Value;
use std::sync::Arc;

use vigil_api::{
    ApiClient, ApiRequest, ErrorRecord, HttpTransport, NotificationDispatcher, SignalSink,
    TracingSink, Transport,
};
use vigil_navigation::{
    AlwaysProceed, LeaveConfirmation, NavigationGuard, RouteDef, RouteTable, Verdict,
};
use vigil_session::{Credentials, Profile, SessionHandle, SessionManager, Tenant};
use vigil_storage::{Database, SessionStore};

use crate::config::Config;
use crate::Result;

pub struct Console {
    config: Config,
    session: SessionManager,
    guard: NavigationGuard,
    routes: RouteTable,
}

impl Console {
    /// Open the on-disk store and talk HTTP to `config.api.base_url`
    pub fn new(config: Config) -> Result<Self> {
        let db = Database::open(&config.database_path)?;
        let transport = HttpTransport::new(&config.client_config())?;

        Ok(Self::with_parts(
            config,
            db,
            Arc::new(transport),
            Arc::new(TracingSink),
            Arc::new(AlwaysProceed),
        ))
    }

    pub fn with_parts(
        config: Config,
        db: Database,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn SignalSink>,
        confirmation: Arc<dyn LeaveConfirmation>,
    ) -> Self {
        let handle = SessionHandle::new(SessionStore::new(db));
        let client = ApiClient::new(
            config.client_config(),
            Arc::new(handle.clone()),
            transport,
            NotificationDispatcher::new(sink),
        );
        let session = SessionManager::new(handle, client, config.endpoints.clone());
        let guard = NavigationGuard::new(
            session.clone(),
            confirmation,
            config.routes.login.clone(),
            config.routes.home.clone(),
        );

        Self {
            config,
            session,
            guard,
            routes: RouteTable::console(),
        }
    }

    /// Restore the persisted session; when a token survived, reload the
    /// tenant list. The profile is left for the first guarded navigation.
    pub async fn initialize(&self) -> Result<()> {
        self.session.hydrate()?;

        if self.session.is_authenticated() {
            let tenants = self.session.fetch_tenants().await;
            tracing::debug!(count = tenants.len(), "Restored tenant list");
        }

        tracing::info!(
            authenticated = self.session.is_authenticated(),
            "Console initialized"
        );
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn client(&self) -> &ApiClient {
        self.session.client()
    }

    // === Session operations ===

    pub async fn login(&self, credentials: &Credentials) -> Result<Profile> {
        let profile = self.session.login(credentials).await?;
        self.session.fetch_tenants().await;
        Ok(profile)
    }

    pub fn logout(&self) -> bool {
        self.session.logout()
    }

    pub fn select_tenant(&self, tenant: Tenant) -> Result<()> {
        Ok(self.session.set_tenant(tenant)?)
    }

    // === Navigation ===

    pub async fn navigate(&self, from: &str, to: &str) -> Verdict {
        self.guard.check_paths(&self.routes, from, to).await
    }

    /// Menu entries visible to the current session
    pub fn menu(&self) -> Vec<RouteDef> {
        let session = self.session.snapshot();
        self.routes
            .visible_for(&session)
            .into_iter()
            .cloned()
            .collect()
    }

    // === Requests ===

    pub async fn request(&self, request: ApiRequest) -> Result<Value> {
        Ok(self.client().send(request).await?)
    }

    pub fn error_log(&self) -> Vec<ErrorRecord> {
        self.client().dispatcher().error_log()
    }
}
