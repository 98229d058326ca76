//! Shared session state
//!
//! `SessionHandle` owns the in-memory [`Session`] and the durable store.
//! Durable writes complete before the in-memory value changes, so a value
//! seen in memory is always already persisted.

use parking_lot::RwLock;
use std::sync::Arc;

use vigil_api::AuthContext;
use vigil_storage::SessionStore;

use crate::session::{Profile, Session, Tenant};
use crate::Result;

pub struct SessionHandle {
    state: Arc<RwLock<Session>>,
    store: SessionStore,
}

impl SessionHandle {
    /// Empty, unauthenticated session backed by `store`
    pub fn new(store: SessionStore) -> Self {
        Self {
            state: Arc::new(RwLock::new(Session::default())),
            store,
        }
    }

    /// Load token and tenant snapshot from the durable store.
    ///
    /// Profile and tenant list are left empty; they are always re-fetched.
    /// A snapshot that no longer parses is dropped from the store.
    pub fn hydrate(&self) -> Result<()> {
        let token = self.store.token()?.unwrap_or_default();

        let current_tenant = match self.store.current_tenant()? {
            Some(json) => match serde_json::from_str::<Tenant>(&json) {
                Ok(tenant) => Some(tenant),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable tenant snapshot");
                    self.store.set_current_tenant(None)?;
                    None
                }
            },
            None => None,
        };

        let mut state = self.state.write();
        state.token = token;
        state.profile = None;
        state.current_tenant = current_tenant;
        state.tenants.clear();

        tracing::info!(
            authenticated = state.is_authenticated(),
            tenant_id = ?state.current_tenant.as_ref().map(|t| t.id),
            "Hydrated session"
        );

        Ok(())
    }

    /// Copy of the whole session
    pub fn snapshot(&self) -> Session {
        self.state.read().clone()
    }

    /// Run `f` against the current session without cloning it
    pub fn with_session<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&Session) -> T,
    {
        f(&self.state.read())
    }

    pub fn token(&self) -> String {
        self.state.read().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_authenticated()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state.read().profile.clone()
    }

    pub fn current_tenant(&self) -> Option<Tenant> {
        self.state.read().current_tenant.clone()
    }

    pub fn tenants(&self) -> Vec<Tenant> {
        self.state.read().tenants.clone()
    }

    /// Replace the selected tenant. Membership is not checked.
    pub fn set_tenant(&self, tenant: Tenant) -> Result<()> {
        let mut state = self.state.write();
        self.persist_tenant(&tenant)?;

        tracing::info!(tenant_id = tenant.id, tenant_name = %tenant.name, "Selected tenant");
        state.current_tenant = Some(tenant);
        Ok(())
    }

    /// Clear every field and the durable entries.
    ///
    /// Idempotent. Returns true when a live session was ended. A failing
    /// store write is logged and the in-memory session is cleared anyway.
    pub fn logout(&self) -> bool {
        let mut state = self.state.write();
        self.end(&mut state)
    }

    /// Caller holds the write lock across the store clear and the reset, so
    /// no other writer can persist in between
    fn end(&self, state: &mut Session) -> bool {
        if let Err(e) = self.store.clear() {
            tracing::error!(error = %e, "Failed to clear durable session entries");
        }

        let was_authenticated = state.is_authenticated();
        *state = Session::default();

        if was_authenticated {
            tracing::info!("Logged out");
        }
        was_authenticated
    }

    /// End the session only while it still runs on `token`
    pub(crate) fn end_if_current(&self, token: &str) -> bool {
        let mut state = self.state.write();
        if state.token.is_empty() || state.token != token {
            tracing::debug!("Ignoring rejection of a token that is no longer current");
            return false;
        }
        self.end(&mut state)
    }

    fn persist_tenant(&self, tenant: &Tenant) -> Result<()> {
        let snapshot = serde_json::to_string(tenant)?;
        self.store.set_current_tenant(Some(&snapshot))?;
        Ok(())
    }

    pub(crate) fn set_token(&self, token: &str) -> Result<()> {
        self.store.set_token(token)?;
        self.state.write().token = token.to_string();
        Ok(())
    }

    /// Install a fetched profile unless the token it was fetched with has
    /// since been replaced or cleared
    pub(crate) fn set_profile(&self, issued_for: &str, profile: Profile) -> bool {
        let mut state = self.state.write();
        if state.token.is_empty() || state.token != issued_for {
            tracing::debug!("Dropping profile fetched for a session that has ended");
            return false;
        }
        state.profile = Some(profile);
        true
    }

    /// Install a fetched tenant list unless the token it was fetched with
    /// has since been replaced or cleared. With no tenant selected, the
    /// preferred one is selected and persisted.
    ///
    /// Returns false when the list was dropped.
    pub(crate) fn set_tenants(&self, issued_for: &str, tenants: Vec<Tenant>) -> Result<bool> {
        let mut state = self.state.write();
        if state.token.is_empty() || state.token != issued_for {
            tracing::debug!("Dropping tenant list fetched for a session that has ended");
            return Ok(false);
        }

        let selected = if state.current_tenant.is_none() {
            Session::preferred_tenant(&tenants).cloned()
        } else {
            None
        };
        state.tenants = tenants;

        if let Some(tenant) = selected {
            self.persist_tenant(&tenant)?;
            tracing::info!(tenant_id = tenant.id, tenant_name = %tenant.name, "Selected default tenant");
            state.current_tenant = Some(tenant);
        }
        Ok(true)
    }
}

impl AuthContext for SessionHandle {
    fn bearer_token(&self) -> Option<String> {
        Some(self.token()).filter(|token| !token.is_empty())
    }

    fn tenant_id(&self) -> Option<i64> {
        self.state.read().current_tenant.as_ref().map(|t| t.id)
    }

    fn expire(&self, rejected_token: &str) -> bool {
        self.end_if_current(rejected_token)
    }
}

impl Clone for SessionHandle {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            store: self.store.clone(),
        }
    }
}
