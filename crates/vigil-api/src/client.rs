//! Request pipeline
//!
//! `build` → `dispatch` → on failure `classify`, apply the global side
//! effects, then hand the typed error back to the caller so it can still
//! recover locally.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::classify::{classify, ClassifiedError};
use crate::config::ClientConfig;
use crate::context::AuthContext;
use crate::error::ApiError;
use crate::notify::{NotificationDispatcher, SignalSink};
use crate::request::ApiRequest;
use crate::transport::{HttpTransport, RawResponse, Transport, TransportError};
use crate::Result;

pub struct ApiClient {
    config: Arc<ClientConfig>,
    context: Arc<dyn AuthContext>,
    transport: Arc<dyn Transport>,
    dispatcher: NotificationDispatcher,
}

impl ApiClient {
    pub fn new(
        config: ClientConfig,
        context: Arc<dyn AuthContext>,
        transport: Arc<dyn Transport>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            config: Arc::new(config),
            context,
            transport,
            dispatcher,
        }
    }

    /// Client talking to the configured server over HTTP
    pub fn with_http(
        config: ClientConfig,
        context: Arc<dyn AuthContext>,
        sink: Arc<dyn SignalSink>,
    ) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(
            config,
            context,
            Arc::new(transport),
            NotificationDispatcher::new(sink),
        ))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Attach credentials and tenant scope. Applied exactly once per request.
    ///
    /// Tenant scope is skipped for excluded prefixes and when no tenant is
    /// selected. For POST/PUT/PATCH it is only merged into JSON object
    /// bodies; uploads, forms and other payloads go out unscoped.
    pub fn build(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(token) = self.context.bearer_token() {
            request
                .headers
                .insert("Authorization".to_string(), format!("Bearer {}", token));
        }

        if self.config.is_excluded(&request.path) {
            return request;
        }

        let Some(tenant_id) = self.context.tenant_id() else {
            return request;
        };

        let key = self.config.tenant_key.clone();
        if request.method.scopes_query() {
            request.query.insert(key, Value::from(tenant_id));
        } else if request.method.scopes_body() {
            match request.body.as_structured_mut() {
                Some(body) => {
                    body.insert(key, Value::from(tenant_id));
                }
                None => {
                    tracing::debug!(
                        method = %request.method,
                        path = %request.path,
                        "Body is not a key/value payload, tenant scope not injected"
                    );
                }
            }
        }

        request
    }

    /// Perform the call. Only a missing response is an error here; any
    /// status comes back as a [`RawResponse`] with its body untouched.
    pub async fn dispatch(&self, request: &ApiRequest) -> Result<RawResponse> {
        self.transmit(request)
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    async fn transmit(&self, request: &ApiRequest) -> std::result::Result<RawResponse, TransportError> {
        tracing::debug!(method = %request.method, path = %request.path, "Dispatching request");
        self.transport.send(request, self.config.timeout()).await
    }

    /// Build, dispatch and return the response body of a successful call
    pub async fn send(&self, request: ApiRequest) -> Result<Value> {
        let request = self.build(request);
        let outcome = self.transmit(&request).await;

        if let Ok(response) = &outcome {
            if response.is_success() {
                return Ok(response.body.clone());
            }
        }

        let classified = classify(outcome.as_ref());
        self.apply_side_effects(&request, &classified);
        Err(ApiError::from(&classified))
    }

    /// [`ApiClient::send`] followed by decoding the body into `T`
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let body = self.send(request).await?;
        serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn get(&self, path: &str, params: Value) -> Result<Value> {
        self.send(ApiRequest::get(path).with_params(params)).await
    }

    pub async fn delete(&self, path: &str, params: Value) -> Result<Value> {
        self.send(ApiRequest::delete(path).with_params(params)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.send(ApiRequest::post(path).with_json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value> {
        self.send(ApiRequest::put(path).with_json(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<Value> {
        self.send(ApiRequest::patch(path).with_json(body)).await
    }

    fn apply_side_effects(&self, request: &ApiRequest, classified: &ClassifiedError) {
        tracing::warn!(
            method = %request.method,
            path = %request.path,
            status = ?classified.status(),
            code = ?classified.code().map(|c| c.as_str()),
            "Request failed"
        );

        if classified.is_unauthorized() {
            self.dispatcher.record(request, classified);
            // Sent without a credential: there is no session to end
            let Some(token) = bearer_of(request) else {
                return;
            };
            // Only the request that actually ended the session redirects
            if self.context.expire(token) {
                tracing::info!(path = %request.path, "Credential rejected, session expired");
                self.dispatcher.session_expired(&self.config.login_route);
            }
            return;
        }

        self.dispatcher.report(request, classified);
    }
}

fn bearer_of(request: &ApiRequest) -> Option<&str> {
    request
        .header("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

impl Clone for ApiClient {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            context: Arc::clone(&self.context),
            transport: Arc::clone(&self.transport),
            dispatcher: self.dispatcher.clone(),
        }
    }
}
