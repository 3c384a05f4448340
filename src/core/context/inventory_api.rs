//! Context provider backed by the shop's inventory/sales HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use super::snapshot::{Product, Sale, build_system_context, render_snapshot, today_utc};
use super::{ContextError, ShopContextProvider};

const USER_AGENT: &str = concat!("kirana-gateway/", env!("CARGO_PKG_VERSION"));

/// Fetches inventory and sales from the shop backend and renders them.
#[derive(Debug, Clone)]
pub struct InventoryApiContextProvider {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl InventoryApiContextProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ContextError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(2)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ContextError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, ContextError> {
        let url = format!("{}/{}/", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ContextError::Http(format!("GET {url}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ContextError::Status { status, body });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ContextError::Decode(format!("GET {url}: {e}")))
    }
}

#[async_trait]
impl ShopContextProvider for InventoryApiContextProvider {
    async fn shop_context(&self) -> Result<String, ContextError> {
        let fetch_both = async {
            tokio::try_join!(
                self.fetch::<Vec<Product>>("inventory"),
                self.fetch::<Vec<Sale>>("sales"),
            )
        };
        let (products, sales) = tokio::time::timeout(self.timeout, fetch_both)
            .await
            .map_err(|_| ContextError::Timeout(self.timeout))??;

        tracing::debug!(
            products = products.len(),
            sales = sales.len(),
            "Fetched shop snapshot"
        );

        let snapshot = render_snapshot(&products, &sales, &today_utc());
        Ok(build_system_context(&snapshot))
    }

    fn name(&self) -> &'static str {
        "inventory_api"
    }
}
