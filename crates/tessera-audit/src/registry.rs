//! Independent trails keyed by tenant.
//!
//! Each tenant gets its own `AuditTrail` with its own store, tail hash and
//! correlation index.  Appends for one tenant never wait on another's tail
//! lock; the registry lock is only held to look up or insert a trail, never
//! while a tenant's log is being opened.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::info;

use tessera_contracts::error::{TesseraError, TesseraResult};

use crate::{config::TrailConfig, trail::AuditTrail};

/// Lazily created, per-tenant audit trails sharing one configuration.
///
/// When the configuration names a store path, each tenant's log lives at
/// `<dir>/<tenant>.jsonl` next to that path.
pub struct TrailRegistry {
    config: TrailConfig,
    trails: RwLock<HashMap<String, Arc<AuditTrail>>>,
}

impl TrailRegistry {
    pub fn new(config: TrailConfig) -> Self {
        Self {
            config,
            trails: RwLock::new(HashMap::new()),
        }
    }

    /// The trail for `tenant`, created on first use.
    pub fn trail(&self, tenant: &str) -> TesseraResult<Arc<AuditTrail>> {
        validate_tenant(tenant)?;

        if let Some(trail) = self
            .trails
            .read()
            .map_err(|e| TesseraError::StorageRead {
                reason: format!("trail registry lock poisoned: {}", e),
            })?
            .get(tenant)
        {
            return Ok(trail.clone());
        }

        // Open outside the registry lock: loading a tenant's log must not
        // stall lookups for every other tenant.
        let mut config = self.config.clone();
        config.store.path = self.tenant_path(tenant);
        let opened = Arc::new(AuditTrail::from_config(&config)?);

        let mut trails = self.trails.write().map_err(|e| TesseraError::StorageWrite {
            reason: format!("trail registry lock poisoned: {}", e),
        })?;
        // A concurrent caller may have won the race; keep its trail.
        let trail = trails.entry(tenant.to_string()).or_insert(opened).clone();
        drop(trails);

        info!(tenant, "created tenant audit trail");
        Ok(trail)
    }

    /// Tenants with a trail created so far, sorted.
    pub fn tenants(&self) -> TesseraResult<Vec<String>> {
        let trails = self.trails.read().map_err(|e| TesseraError::StorageRead {
            reason: format!("trail registry lock poisoned: {}", e),
        })?;
        let mut names: Vec<String> = trails.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn tenant_path(&self, tenant: &str) -> Option<PathBuf> {
        self.config.store.path.as_ref().map(|base| {
            base.parent()
                .map(PathBuf::from)
                .unwrap_or_default()
                .join(format!("{}.jsonl", tenant))
        })
    }
}

/// Tenant names become file names, so keep them to a safe alphabet.
fn validate_tenant(tenant: &str) -> TesseraResult<()> {
    if tenant.is_empty()
        || !tenant
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
    {
        return Err(TesseraError::validation(
            "tenant",
            format!("'{}' is not a valid tenant name", tenant),
        ));
    }
    Ok(())
}
