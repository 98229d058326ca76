//! Scripted transport and session context for tests

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::AuthContext;
use crate::request::{ApiRequest, Method};
use crate::transport::{RawResponse, Transport, TransportError};

#[derive(Debug, Clone)]
enum Reply {
    Respond(RawResponse),
    Fail(TransportError),
}

#[derive(Debug, Clone)]
struct Script {
    method: Method,
    path: String,
    reply: Reply,
}

struct Hook {
    method: Method,
    path: String,
    action: Arc<dyn Fn() + Send + Sync>,
}

/// In-memory [`Transport`] answering from registered replies.
///
/// The latest registration for a method and path wins. Unregistered
/// routes answer 404 with a legacy `detail` body. Every request is yielded
/// once before it is answered so concurrent callers interleave.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<Vec<Script>>,
    hooks: Mutex<Vec<Hook>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.scripts.lock().push(Script {
            method,
            path: path.to_string(),
            reply: Reply::Respond(RawResponse::new(status, body)),
        });
        self
    }

    pub fn fail(&self, method: Method, path: &str, error: TransportError) -> &Self {
        self.scripts.lock().push(Script {
            method,
            path: path.to_string(),
            reply: Reply::Fail(error),
        });
        self
    }

    /// Run `action` while a matching request is in flight, after it was
    /// sent and before its reply is produced
    pub fn on_request<F>(&self, method: Method, path: &str, action: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.lock().push(Hook {
            method,
            path: path.to_string(),
            action: Arc::new(action),
        });
        self
    }

    /// Requests as they reached the transport, after the pipeline built them
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        _timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        self.requests.lock().push(request.clone());
        tokio::task::yield_now().await;

        let actions: Vec<Arc<dyn Fn() + Send + Sync>> = self
            .hooks
            .lock()
            .iter()
            .filter(|h| h.method == request.method && h.path == request.path)
            .map(|h| Arc::clone(&h.action))
            .collect();
        for action in actions {
            action();
        }

        let reply = self
            .scripts
            .lock()
            .iter()
            .rev()
            .find(|s| s.method == request.method && s.path == request.path)
            .map(|s| s.reply.clone());

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(error)) => Err(error),
            None => Ok(RawResponse::new(404, json!({"detail": "Not Found"}))),
        }
    }
}

/// Fixed [`AuthContext`] whose `expire` clears a still-current token like a
/// real logout
#[derive(Debug, Default)]
pub struct StaticContext {
    token: RwLock<Option<String>>,
    tenant_id: RwLock<Option<i64>>,
    expire_calls: AtomicUsize,
}

impl StaticContext {
    pub fn new(token: Option<&str>, tenant_id: Option<i64>) -> Self {
        Self {
            token: RwLock::new(token.map(str::to_string)),
            tenant_id: RwLock::new(tenant_id),
            expire_calls: AtomicUsize::new(0),
        }
    }

    pub fn expire_calls(&self) -> usize {
        self.expire_calls.load(Ordering::SeqCst)
    }

    /// Swap the credential, as a re-login would
    pub fn set_token(&self, token: Option<&str>) {
        *self.token.write() = token.map(str::to_string);
    }
}

impl AuthContext for StaticContext {
    fn bearer_token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn tenant_id(&self) -> Option<i64> {
        *self.tenant_id.read()
    }

    fn expire(&self, rejected_token: &str) -> bool {
        self.expire_calls.fetch_add(1, Ordering::SeqCst);
        let mut token = self.token.write();
        if token.as_deref() != Some(rejected_token) {
            return false;
        }
        *token = None;
        *self.tenant_id.write() = None;
        true
    }
}
