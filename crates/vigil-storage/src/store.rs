//! Durable session store
//!
//! Persists the credential token and the selected tenant snapshot. Values
//! are opaque strings here; the tenant snapshot is JSON produced by the
//! session crate.

use crate::database::Database;
use crate::Result;

pub const TOKEN_KEY: &str = "token";
pub const CURRENT_TENANT_KEY: &str = "currentTenant";

#[derive(Clone)]
pub struct SessionStore {
    db: Database,
}

impl SessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Stored token; an empty stored value reads as absent
    pub fn token(&self) -> Result<Option<String>> {
        Ok(self
            .db
            .get_entry(TOKEN_KEY)?
            .filter(|token| !token.is_empty()))
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            self.db.remove_entry(TOKEN_KEY)?;
            return Ok(());
        }
        self.db.set_entry(TOKEN_KEY, token)
    }

    /// Raw JSON snapshot of the selected tenant
    pub fn current_tenant(&self) -> Result<Option<String>> {
        Ok(self
            .db
            .get_entry(CURRENT_TENANT_KEY)?
            .filter(|json| json != "null"))
    }

    pub fn set_current_tenant(&self, snapshot: Option<&str>) -> Result<()> {
        match snapshot {
            Some(json) => self.db.set_entry(CURRENT_TENANT_KEY, json),
            None => {
                self.db.remove_entry(CURRENT_TENANT_KEY)?;
                Ok(())
            }
        }
    }

    /// Remove every session entry in one transaction
    pub fn clear(&self) -> Result<()> {
        self.db.transaction(|conn| {
            conn.execute(
                "DELETE FROM session_entries WHERE key IN (?1, ?2)",
                [TOKEN_KEY, CURRENT_TENANT_KEY],
            )?;
            Ok(())
        })?;

        tracing::debug!("Cleared durable session entries");
        Ok(())
    }
}
