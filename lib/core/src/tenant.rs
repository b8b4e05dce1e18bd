//! Tenant scoping
//!
//! A [`TenantContext`] is threaded explicitly through every store, search and
//! fusion call. `None` means global scope (no isolation), which keeps
//! single-tenant callers working unchanged.

use crate::entity::Entity;
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static TENANT_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("static tenant id pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    /// Tenants share tables/collections; rows are filtered by tenant id
    #[default]
    SharedSchema,
    /// Each tenant has its own physical namespace
    Dedicated,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
    tenant_id: String,
    #[serde(default)]
    isolation: IsolationMode,
}

impl TenantContext {
    /// Create a shared-schema context, validating the tenant id
    pub fn new(tenant_id: impl Into<String>) -> Result<Self> {
        Self::with_isolation(tenant_id, IsolationMode::SharedSchema)
    }

    pub fn with_isolation(tenant_id: impl Into<String>, isolation: IsolationMode) -> Result<Self> {
        let tenant_id = tenant_id.into();
        if !TENANT_ID_PATTERN.is_match(&tenant_id) {
            return Err(Error::InvalidConfig(format!(
                "tenant id {tenant_id:?} must match [A-Za-z0-9][A-Za-z0-9_-]{{0,63}}"
            )));
        }
        Ok(Self {
            tenant_id,
            isolation,
        })
    }

    #[inline]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    #[inline]
    pub fn isolation(&self) -> IsolationMode {
        self.isolation
    }

    /// Prefix `key` with this tenant's id
    pub fn scoped_key(&self, key: &str) -> String {
        format!("{}:{}", self.tenant_id, key)
    }
}

impl fmt::Display for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tenant_id)
    }
}

/// Tenant id of an optional context
#[inline]
pub fn tenant_of(ctx: Option<&TenantContext>) -> Option<&str> {
    ctx.map(TenantContext::tenant_id)
}

/// Scope label used for logging and per-tenant bookkeeping
#[inline]
pub fn scope_label(ctx: Option<&TenantContext>) -> &str {
    tenant_of(ctx).unwrap_or("<global>")
}

/// Whether a record owned by `owner` is visible under `ctx`.
///
/// Without a context everything is visible. With a context only records
/// owned by that exact tenant are.
#[inline]
pub fn is_visible(ctx: Option<&TenantContext>, owner: Option<&str>) -> bool {
    match ctx {
        None => true,
        Some(ctx) => owner == Some(ctx.tenant_id()),
    }
}

/// Key optionally prefixed by tenant id
pub fn tenant_key(tenant_id: Option<&str>, key: &str) -> String {
    match tenant_id {
        Some(tenant) => format!("{tenant}:{key}"),
        None => key.to_string(),
    }
}

/// Drop entities not visible under `ctx`, returning how many were removed.
pub fn retain_visible(ctx: Option<&TenantContext>, entities: &mut Vec<Entity>) -> usize {
    let before = entities.len();
    entities.retain(|e| is_visible(ctx, e.tenant_id.as_deref()));
    before - entities.len()
}
