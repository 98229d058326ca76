//! Navigation guard
//!
//! Runs the [`GuardState`] machine for one attempted route change. The
//! surrounding router runs at most one guard at a time, so the current
//! state is a plain shared value rather than a per-navigation lock.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use vigil_session::SessionManager;

use crate::error::NavigationError;
use crate::route::Route;
use crate::state::GuardState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveDecision {
    Proceed,
    Cancel,
}

/// Asks the user whether to abandon unsaved input
#[async_trait]
pub trait LeaveConfirmation: Send + Sync {
    async fn confirm_leave(&self, from: &Route, to: &Route) -> LeaveDecision;
}

/// Confirmation that never blocks, for non-interactive callers
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysProceed;

#[async_trait]
impl LeaveConfirmation for AlwaysProceed {
    async fn confirm_leave(&self, _from: &Route, _to: &Route) -> LeaveDecision {
        LeaveDecision::Proceed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Navigation proceeds unmodified
    Allowed,
    /// Navigation is aborted; go to `redirect` when present
    Denied { redirect: Option<String> },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    pub fn redirect(&self) -> Option<&str> {
        match self {
            Verdict::Denied { redirect } => redirect.as_deref(),
            Verdict::Allowed => None,
        }
    }
}

/// One guard execution
struct GuardRun {
    state: GuardState,
    trace: Vec<GuardState>,
    redirect: Option<String>,
}

impl GuardRun {
    fn new() -> Self {
        Self {
            state: GuardState::Idle,
            trace: vec![GuardState::Idle],
            redirect: None,
        }
    }

    fn advance(&mut self, next: GuardState) -> crate::Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(NavigationError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }

        tracing::debug!(from = %self.state, to = %next, "Guard transition");
        self.state = next;
        self.trace.push(next);
        Ok(())
    }

    fn deny(&mut self, redirect: Option<&str>) -> GuardState {
        self.redirect = redirect.map(str::to_string);
        GuardState::Denied
    }
}

pub struct NavigationGuard {
    session: SessionManager,
    confirmation: Arc<dyn LeaveConfirmation>,
    login_route: String,
    home_route: String,
    state: Arc<Mutex<GuardState>>,
    last_trace: Arc<Mutex<Vec<GuardState>>>,
}

impl NavigationGuard {
    pub fn new(
        session: SessionManager,
        confirmation: Arc<dyn LeaveConfirmation>,
        login_route: impl Into<String>,
        home_route: impl Into<String>,
    ) -> Self {
        Self {
            session,
            confirmation,
            login_route: login_route.into(),
            home_route: home_route.into(),
            state: Arc::new(Mutex::new(GuardState::Idle)),
            last_trace: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// State of the current or most recent run
    pub fn state(&self) -> GuardState {
        *self.state.lock()
    }

    /// States visited by the most recent run, starting at `Idle`
    pub fn last_trace(&self) -> Vec<GuardState> {
        self.last_trace.lock().clone()
    }

    /// Decide whether the move from `from` to `to` may proceed
    pub async fn check(&self, from: &Route, to: &Route) -> Verdict {
        let mut run = GuardRun::new();
        self.publish(&run);

        loop {
            let current = run.state;
            let next = match current {
                GuardState::Idle => {
                    if from.is_edit_route() && !to.is_edit_route() {
                        GuardState::ConfirmingLeave
                    } else {
                        GuardState::CheckingAuth
                    }
                }
                GuardState::ConfirmingLeave => {
                    match self.confirmation.confirm_leave(from, to).await {
                        LeaveDecision::Proceed => GuardState::CheckingAuth,
                        LeaveDecision::Cancel => {
                            tracing::debug!(from = %from.path, to = %to.path, "Leave cancelled");
                            run.deny(None)
                        }
                    }
                }
                GuardState::CheckingAuth => {
                    let authenticated = self.session.is_authenticated();
                    let requires_auth = to.requires_auth(&self.login_route);

                    if requires_auth && !authenticated {
                        run.deny(Some(&self.login_route))
                    } else if !requires_auth && authenticated {
                        run.deny(Some(&self.home_route))
                    } else if authenticated && self.session.profile().is_none() {
                        GuardState::FetchingProfile
                    } else {
                        GuardState::CheckingPermission
                    }
                }
                GuardState::FetchingProfile => match self.session.fetch_profile().await {
                    Ok(_) => GuardState::CheckingPermission,
                    Err(e) => {
                        tracing::warn!(error = %e, to = %to.path, "Profile load failed, logging out");
                        self.session.logout();
                        run.deny(Some(&self.login_route))
                    }
                },
                GuardState::CheckingPermission => {
                    if to.meta.require_superuser && !self.session.is_superuser() {
                        run.deny(Some(&self.home_route))
                    } else {
                        GuardState::Allowed
                    }
                }
                GuardState::Allowed => return self.finish(&run, Verdict::Allowed),
                GuardState::Denied => {
                    let verdict = Verdict::Denied {
                        redirect: run.redirect.clone(),
                    };
                    return self.finish(&run, verdict);
                }
            };

            if let Err(e) = run.advance(next) {
                tracing::error!(error = %e, "Guard reached an impossible state, denying");
                run.state = GuardState::Denied;
                run.trace.push(GuardState::Denied);
                run.redirect = None;
            }
            self.publish(&run);
        }
    }

    /// [`NavigationGuard::check`] on paths resolved through `routes`
    pub async fn check_paths(
        &self,
        routes: &crate::RouteTable,
        from: &str,
        to: &str,
    ) -> Verdict {
        self.check(&routes.resolve(from), &routes.resolve(to)).await
    }

    fn publish(&self, run: &GuardRun) {
        *self.state.lock() = run.state;
        *self.last_trace.lock() = run.trace.clone();
    }

    fn finish(&self, run: &GuardRun, verdict: Verdict) -> Verdict {
        tracing::debug!(
            states = ?run.trace,
            allowed = verdict.is_allowed(),
            redirect = ?verdict.redirect(),
            "Guard finished"
        );
        verdict
    }
}

impl Clone for NavigationGuard {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            confirmation: Arc::clone(&self.confirmation),
            login_route: self.login_route.clone(),
            home_route: self.home_route.clone(),
            state: Arc::clone(&self.state),
            last_trace: Arc::clone(&self.last_trace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{RouteMeta, RouteTable};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vigil_api::testing::MockTransport;
    use vigil_api::{ApiClient, BufferedSink, ClientConfig, Method, NotificationDispatcher};
    use vigil_session::{Profile, SessionEndpoints, SessionHandle, Tenant};
    use vigil_storage::SessionStore;

    const PROFILE_PATH: &str = "/user-management/me";

    struct ScriptedConfirmation {
        decision: LeaveDecision,
        asked: AtomicUsize,
    }

    impl ScriptedConfirmation {
        fn new(decision: LeaveDecision) -> Arc<Self> {
            Arc::new(Self {
                decision,
                asked: AtomicUsize::new(0),
            })
        }

        fn asked(&self) -> usize {
            self.asked.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LeaveConfirmation for ScriptedConfirmation {
        async fn confirm_leave(&self, _from: &Route, _to: &Route) -> LeaveDecision {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.decision
        }
    }

    struct Fixture {
        guard: NavigationGuard,
        session: SessionManager,
        transport: Arc<MockTransport>,
        routes: RouteTable,
    }

    fn fixture(token: Option<&str>, confirmation: Arc<dyn LeaveConfirmation>) -> Fixture {
        let store = SessionStore::open_in_memory().unwrap();
        if let Some(token) = token {
            store.set_token(token).unwrap();
        }
        let handle = SessionHandle::new(store);
        handle.hydrate().unwrap();

        let transport = Arc::new(MockTransport::new());
        let client = ApiClient::new(
            ClientConfig::default(),
            Arc::new(handle.clone()),
            transport.clone(),
            NotificationDispatcher::new(Arc::new(BufferedSink::new())),
        );
        let session = SessionManager::new(handle, client, SessionEndpoints::default());
        let guard = NavigationGuard::new(session.clone(), confirmation, "/login", "/");

        Fixture {
            guard,
            session,
            transport,
            routes: RouteTable::console(),
        }
    }

    fn respond_profile(transport: &MockTransport, is_superuser: bool) {
        transport.respond(
            Method::Get,
            PROFILE_PATH,
            200,
            json!({"username": "ops", "permissions": ["alert_rule.read"], "is_superuser": is_superuser}),
        );
    }

    #[tokio::test]
    async fn test_no_token_redirects_to_login() {
        let f = fixture(None, Arc::new(AlwaysProceed));

        for path in ["/", "/dashboard", "/alert-rules/edit/3", "/audit", "/unknown"] {
            let verdict = f.guard.check_paths(&f.routes, "/login", path).await;
            assert_eq!(
                verdict,
                Verdict::Denied {
                    redirect: Some("/login".to_string())
                },
                "path {}",
                path
            );
        }
        assert!(f.transport.requests().is_empty());
        assert_eq!(
            f.guard.last_trace(),
            vec![GuardState::Idle, GuardState::CheckingAuth, GuardState::Denied]
        );
    }

    #[tokio::test]
    async fn test_login_page_open_without_token() {
        let f = fixture(None, Arc::new(AlwaysProceed));
        let verdict = f.guard.check_paths(&f.routes, "/", "/login").await;
        assert_eq!(verdict, Verdict::Allowed);
        assert_eq!(f.guard.state(), GuardState::Allowed);
    }

    #[tokio::test]
    async fn test_authenticated_user_cannot_view_login() {
        let f = fixture(Some("abc"), Arc::new(AlwaysProceed));
        let verdict = f.guard.check_paths(&f.routes, "/dashboard", "/login").await;
        assert_eq!(verdict.redirect(), Some("/"));
        assert!(f.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_profile_fetched_exactly_once() {
        let f = fixture(Some("abc"), Arc::new(AlwaysProceed));
        respond_profile(&f.transport, false);

        let first = f.guard.check_paths(&f.routes, "/login", "/dashboard").await;
        assert_eq!(first, Verdict::Allowed);
        assert_eq!(
            f.guard.last_trace(),
            vec![
                GuardState::Idle,
                GuardState::CheckingAuth,
                GuardState::FetchingProfile,
                GuardState::CheckingPermission,
                GuardState::Allowed
            ]
        );

        let second = f.guard.check_paths(&f.routes, "/dashboard", "/silence").await;
        assert_eq!(second, Verdict::Allowed);
        assert_eq!(f.transport.count(Method::Get, PROFILE_PATH), 1);

        let request = f.transport.last_request().unwrap();
        assert_eq!(request.header("Authorization"), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn test_profile_failure_logs_out() {
        let f = fixture(Some("abc"), Arc::new(AlwaysProceed));
        f.session.set_tenant(Tenant::new(7, "payments")).unwrap();
        f.transport
            .respond(Method::Get, PROFILE_PATH, 500, json!({"detail": "db down"}));

        let verdict = f.guard.check_paths(&f.routes, "/login", "/dashboard").await;

        assert_eq!(verdict.redirect(), Some("/login"));
        assert_eq!(f.session.token(), "");
        assert_eq!(f.session.current_tenant(), None);
        assert_eq!(f.guard.state(), GuardState::Denied);
    }

    #[tokio::test]
    async fn test_session_ending_during_profile_fetch_denies() {
        let f = fixture(Some("abc"), Arc::new(AlwaysProceed));
        respond_profile(&f.transport, true);
        let session = f.session.clone();
        f.transport.on_request(Method::Get, PROFILE_PATH, move || {
            session.logout();
        });

        let verdict = f.guard.check_paths(&f.routes, "/login", "/dashboard").await;

        assert_eq!(verdict.redirect(), Some("/login"));
        assert_eq!(f.session.token(), "");
        assert_eq!(f.session.profile(), None);
        assert_eq!(
            f.guard.last_trace(),
            vec![
                GuardState::Idle,
                GuardState::CheckingAuth,
                GuardState::FetchingProfile,
                GuardState::Denied
            ]
        );
    }

    #[tokio::test]
    async fn test_superuser_routes() {
        let f = fixture(Some("abc"), Arc::new(AlwaysProceed));
        respond_profile(&f.transport, false);

        let verdict = f.guard.check_paths(&f.routes, "/dashboard", "/audit").await;
        assert_eq!(verdict.redirect(), Some("/"));

        let g = fixture(Some("root-token"), Arc::new(AlwaysProceed));
        respond_profile(&g.transport, true);
        let verdict = g.guard.check_paths(&g.routes, "/dashboard", "/audit").await;
        assert_eq!(verdict, Verdict::Allowed);
    }

    #[tokio::test]
    async fn test_permission_metadata_is_not_enforced_by_guard() {
        let f = fixture(Some("abc"), Arc::new(AlwaysProceed));
        respond_profile(&f.transport, false);

        // Menu filtering hides /users; the guard itself only checks superuser
        let verdict = f.guard.check_paths(&f.routes, "/dashboard", "/users").await;
        assert_eq!(verdict, Verdict::Allowed);
    }

    #[tokio::test]
    async fn test_leaving_edit_page_cancelled() {
        let confirmation = ScriptedConfirmation::new(LeaveDecision::Cancel);
        let f = fixture(Some("abc"), confirmation.clone());
        respond_profile(&f.transport, false);

        let verdict = f
            .guard
            .check_paths(&f.routes, "/alert-rules/edit/3", "/alert-rules")
            .await;

        assert_eq!(verdict, Verdict::Denied { redirect: None });
        assert_eq!(confirmation.asked(), 1);
        assert!(f.transport.requests().is_empty());
        assert_eq!(f.session.profile(), None);
        assert_eq!(
            f.guard.last_trace(),
            vec![GuardState::Idle, GuardState::ConfirmingLeave, GuardState::Denied]
        );
    }

    #[tokio::test]
    async fn test_leaving_edit_page_confirmed() {
        let confirmation = ScriptedConfirmation::new(LeaveDecision::Proceed);
        let f = fixture(Some("abc"), confirmation.clone());
        respond_profile(&f.transport, false);

        let verdict = f
            .guard
            .check_paths(&f.routes, "/alert-rules/create", "/dashboard")
            .await;

        assert_eq!(verdict, Verdict::Allowed);
        assert_eq!(confirmation.asked(), 1);
        assert_eq!(f.guard.last_trace()[1], GuardState::ConfirmingLeave);
    }

    #[tokio::test]
    async fn test_moving_between_edit_pages_does_not_prompt() {
        let confirmation = ScriptedConfirmation::new(LeaveDecision::Cancel);
        let f = fixture(Some("abc"), confirmation.clone());
        respond_profile(&f.transport, false);

        let verdict = f
            .guard
            .check_paths(&f.routes, "/alert-rules/create", "/alert-rules/edit/9")
            .await;

        assert_eq!(verdict, Verdict::Allowed);
        assert_eq!(confirmation.asked(), 0);
    }

    #[tokio::test]
    async fn test_prompt_precedes_auth_check() {
        let confirmation = ScriptedConfirmation::new(LeaveDecision::Proceed);
        let f = fixture(None, confirmation.clone());

        let from = Route::with_meta("/alert-rules/create", RouteMeta::default());
        let verdict = f.guard.check(&from, &Route::new("/dashboard")).await;

        assert_eq!(confirmation.asked(), 1);
        assert_eq!(verdict.redirect(), Some("/login"));
    }

    #[tokio::test]
    async fn test_loaded_profile_skips_fetch() {
        let f = fixture(Some("abc"), Arc::new(AlwaysProceed));
        respond_profile(&f.transport, false);
        let profile: Profile = f.session.fetch_profile().await.unwrap();
        assert_eq!(profile.username, "ops");

        let verdict = f.guard.check_paths(&f.routes, "/", "/datasources").await;
        assert_eq!(verdict, Verdict::Allowed);
        assert!(!f.guard.last_trace().contains(&GuardState::FetchingProfile));
        assert_eq!(f.transport.count(Method::Get, PROFILE_PATH), 1);
    }
}
