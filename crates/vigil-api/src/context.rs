//! Read access to the session from inside the pipeline

/// Session view consumed by the request pipeline.
///
/// Implemented by the session crate. The pipeline only reads through it,
/// apart from [`AuthContext::expire`] after the server rejects the token.
pub trait AuthContext: Send + Sync {
    /// Current bearer token, `None` while unauthenticated
    fn bearer_token(&self) -> Option<String>;

    /// Id of the selected tenant, if any
    fn tenant_id(&self) -> Option<i64>;

    /// Clear the session after the server rejected `rejected_token`.
    ///
    /// Must be idempotent, and must leave the session alone when it no
    /// longer runs on `rejected_token`. Returns true only for the call that
    /// actually ended a live session, which is what limits redirects to one
    /// per expiry when several requests fail together.
    fn expire(&self, rejected_token: &str) -> bool;
}
