//! Console routes and their guard metadata

use serde::{Deserialize, Serialize};

use vigil_session::Session;

use crate::error::NavigationError;
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteMeta {
    pub name: Option<String>,
    pub title: Option<String>,
    /// Permission a menu entry needs to be shown
    pub permission: Option<String>,
    pub require_superuser: bool,
    /// Reachable but never listed in menus
    pub hidden: bool,
}

impl RouteMeta {
    pub fn named(name: &str, title: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            title: Some(title.to_string()),
            ..Self::default()
        }
    }

    pub fn permission(mut self, permission: &str) -> Self {
        self.permission = Some(permission.to_string());
        self
    }

    pub fn superuser(mut self) -> Self {
        self.require_superuser = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// A concrete navigation target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub meta: RouteMeta,
}

impl Route {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            meta: RouteMeta::default(),
        }
    }

    pub fn with_meta(path: impl Into<String>, meta: RouteMeta) -> Self {
        Self {
            path: path.into(),
            meta,
        }
    }

    /// Every route except the login page needs a session
    pub fn requires_auth(&self, login_route: &str) -> bool {
        normalize(&self.path) != normalize(login_route)
    }

    pub fn is_login(&self, login_route: &str) -> bool {
        !self.requires_auth(login_route)
    }

    /// Pages holding unsaved form input
    pub fn is_edit_route(&self) -> bool {
        segments(&self.path).any(|s| s == "create" || s == "edit")
    }
}

/// Registered route pattern; `:name` segments match any single segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDef {
    pub pattern: String,
    pub meta: RouteMeta,
}

impl RouteDef {
    pub fn matches(&self, path: &str) -> bool {
        let mut pattern = segments(&self.pattern);
        let mut actual = segments(path);
        loop {
            match (pattern.next(), actual.next()) {
                (None, None) => return true,
                (Some(p), Some(a)) if p.starts_with(':') || p == a => continue,
                _ => return false,
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteDef>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pattern: &str, meta: RouteMeta) -> Result<()> {
        let normalized = normalize(pattern);
        if self.routes.iter().any(|r| normalize(&r.pattern) == normalized) {
            return Err(NavigationError::DuplicateRoute(pattern.to_string()));
        }
        self.routes.push(RouteDef {
            pattern: normalized,
            meta,
        });
        Ok(())
    }

    /// The console's pages
    pub fn console() -> Self {
        let defs = [
            ("/login", RouteMeta::named("Login", "Sign in").hidden()),
            ("/", RouteMeta::named("Home", "Home").hidden()),
            ("/dashboard", RouteMeta::named("Dashboard", "Overview")),
            (
                "/alert-rules",
                RouteMeta::named("AlertRules", "Alert rules").permission("alert_rule.read"),
            ),
            (
                "/alert-rules/create",
                RouteMeta::named("AlertRuleCreate", "Create alert rule")
                    .permission("alert_rule.create")
                    .hidden(),
            ),
            (
                "/alert-rules/edit/:id",
                RouteMeta::named("AlertRuleEdit", "Edit alert rule")
                    .permission("alert_rule.update")
                    .hidden(),
            ),
            ("/current-alerts", RouteMeta::named("CurrentAlerts", "Current alerts")),
            ("/alert-history", RouteMeta::named("AlertHistory", "Alert history")),
            ("/silence", RouteMeta::named("Silence", "Silences")),
            (
                "/datasources",
                RouteMeta::named("Datasources", "Datasources").permission("datasource.read"),
            ),
            (
                "/notifications",
                RouteMeta::named("Notifications", "Notification channels")
                    .permission("notification.read"),
            ),
            ("/projects", RouteMeta::named("Projects", "Projects")),
            (
                "/users",
                RouteMeta::named("Users", "Users").permission("user.read"),
            ),
            (
                "/settings",
                RouteMeta::named("Settings", "Settings").permission("settings.read"),
            ),
            ("/audit", RouteMeta::named("Audit", "Audit log").superuser()),
            ("/profile", RouteMeta::named("Profile", "Profile").hidden()),
        ];

        Self {
            routes: defs
                .into_iter()
                .map(|(pattern, meta)| RouteDef {
                    pattern: normalize(pattern),
                    meta,
                })
                .collect(),
        }
    }

    pub fn routes(&self) -> &[RouteDef] {
        &self.routes
    }

    pub fn find(&self, path: &str) -> Option<&RouteDef> {
        let path = strip_suffix(path);
        self.routes.iter().find(|r| r.matches(path))
    }

    /// Route for `path`, with empty metadata when no pattern matches
    pub fn resolve(&self, path: &str) -> Route {
        let meta = self
            .find(path)
            .map(|def| def.meta.clone())
            .unwrap_or_default();
        Route::with_meta(path, meta)
    }

    pub fn resolve_strict(&self, path: &str) -> Result<Route> {
        self.find(path)
            .map(|def| Route::with_meta(path, def.meta.clone()))
            .ok_or_else(|| NavigationError::UnknownRoute(path.to_string()))
    }

    /// Menu entries the session may see
    pub fn visible_for(&self, session: &Session) -> Vec<&RouteDef> {
        self.routes
            .iter()
            .filter(|r| !r.meta.hidden)
            .filter(|r| !r.meta.require_superuser || session.is_superuser())
            .filter(|r| {
                r.meta
                    .permission
                    .as_deref()
                    .map_or(true, |p| session.has_permission(p))
            })
            .collect()
    }
}

fn strip_suffix(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or_default()
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    strip_suffix(path).split('/').filter(|s| !s.is_empty())
}

fn normalize(path: &str) -> String {
    let joined: Vec<&str> = segments(path).collect();
    format!("/{}", joined.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_session::Profile;

    #[test]
    fn test_pattern_matching() {
        let table = RouteTable::console();

        let edit = table.resolve("/alert-rules/edit/42");
        assert_eq!(edit.meta.name.as_deref(), Some("AlertRuleEdit"));
        assert!(edit.is_edit_route());

        let list = table.resolve("/alert-rules/?status=firing");
        assert_eq!(list.meta.name.as_deref(), Some("AlertRules"));
        assert!(!list.is_edit_route());

        assert!(table.resolve("/audit").meta.require_superuser);
        assert_eq!(table.resolve("/nowhere").meta, RouteMeta::default());
        assert_eq!(
            table.resolve_strict("/nowhere"),
            Err(NavigationError::UnknownRoute("/nowhere".to_string()))
        );
    }

    #[test]
    fn test_requires_auth() {
        assert!(!Route::new("/login").requires_auth("/login"));
        assert!(!Route::new("/login/").requires_auth("/login"));
        assert!(Route::new("/").requires_auth("/login"));
        assert!(Route::new("/dashboard").requires_auth("/login"));
    }

    #[test]
    fn test_edit_routes() {
        assert!(Route::new("/alert-rules/create").is_edit_route());
        assert!(Route::new("/silence/edit/3").is_edit_route());
        assert!(!Route::new("/creator").is_edit_route());
        assert!(!Route::new("/alert-rules").is_edit_route());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut table = RouteTable::new();
        table.register("/reports", RouteMeta::default()).unwrap();
        assert_eq!(
            table.register("/reports/", RouteMeta::default()),
            Err(NavigationError::DuplicateRoute("/reports/".to_string()))
        );
    }

    #[test]
    fn test_visible_for() {
        let table = RouteTable::console();
        let mut session = Session {
            token: "abc".to_string(),
            profile: Some(Profile {
                permissions: ["alert_rule.read".to_string()].into_iter().collect(),
                ..Profile::default()
            }),
            ..Session::default()
        };

        let names: Vec<&str> = table
            .visible_for(&session)
            .iter()
            .filter_map(|r| r.meta.name.as_deref())
            .collect();
        assert!(names.contains(&"AlertRules"));
        assert!(names.contains(&"Dashboard"));
        assert!(!names.contains(&"Users"));
        assert!(!names.contains(&"Audit"));
        assert!(!names.contains(&"AlertRuleCreate"));

        if let Some(profile) = session.profile.as_mut() {
            profile.is_superuser = true;
        }
        let all = table.visible_for(&session);
        assert!(all.iter().any(|r| r.meta.name.as_deref() == Some("Audit")));
        assert!(all.iter().any(|r| r.meta.name.as_deref() == Some("Users")));
    }
}
