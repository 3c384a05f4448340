//! Session context providers.
//!
//! A provider supplies the one-time priming text sent to the upstream session
//! when a bridge session opens: a rendered snapshot of the shop's inventory and
//! today's sales. The relay treats the result as opaque; an empty string means
//! "no priming".

mod inventory_api;
mod snapshot;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use inventory_api::InventoryApiContextProvider;
pub use snapshot::{
    Product, Sale, build_system_context, render_inventory, render_sales_today, render_snapshot,
    today_utc,
};

/// Errors raised while producing shop context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Shop API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode shop API response: {0}")]
    Decode(String),

    #[error("Shop context timed out after {0:?}")]
    Timeout(Duration),
}

/// Supplies the priming context for a new session.
#[async_trait]
pub trait ShopContextProvider: Send + Sync {
    /// Produce the rendered context. Called once per session open.
    async fn shop_context(&self) -> Result<String, ContextError>;

    /// Provider name for logs.
    fn name(&self) -> &'static str;
}

/// Fixed context text (possibly empty).
#[derive(Debug, Clone, Default)]
pub struct StaticContextProvider {
    text: String,
}

impl StaticContextProvider {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// A provider that never primes the session.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShopContextProvider for StaticContextProvider {
    async fn shop_context(&self) -> Result<String, ContextError> {
        Ok(self.text.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Pick a provider: the shop API when a URL is configured, else static text.
pub fn create_context_provider(
    shop_api_url: Option<&str>,
    static_text: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn ShopContextProvider>, ContextError> {
    match shop_api_url {
        Some(url) if !url.trim().is_empty() => {
            Ok(Arc::new(InventoryApiContextProvider::new(url, timeout)?))
        }
        _ => Ok(Arc::new(StaticContextProvider::new(
            static_text.unwrap_or_default(),
        ))),
    }
}

/// Fetch context, degrading any failure to an empty string.
pub async fn resolve_context(provider: &dyn ShopContextProvider) -> String {
    match provider.shop_context().await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(
                provider = provider.name(),
                error = %e,
                "Shop context unavailable, opening session without priming"
            );
            String::new()
        }
    }
}
