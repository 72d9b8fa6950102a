//! Image resolution collaborator
//!
//! When an enqueued item names a product but carries no image, the queue
//! manager asks a resolver for a best-effort URL (product photo, then a
//! generated image, then a stock fallback). The real resolver lives outside
//! this crate; here is the seam plus a passthrough implementation.

use async_trait::async_trait;

#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Best-effort image URL for a product, or `None` when nothing suitable
    /// exists. Resolution failures are not errors; the item just goes out
    /// without an image.
    async fn resolve(
        &self,
        product_type: &str,
        product_data: Option<&serde_json::Value>,
    ) -> Option<String>;
}

/// Resolver that never finds an image.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImageResolver;

#[async_trait]
impl ImageResolver for NoImageResolver {
    async fn resolve(&self, _: &str, _: Option<&serde_json::Value>) -> Option<String> {
        None
    }
}

/// Resolver backed by a fixed lookup table, used in tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticImageResolver {
    entries: std::collections::HashMap<String, String>,
}

impl StaticImageResolver {
    pub fn with(mut self, product_type: &str, url: &str) -> Self {
        self.entries
            .insert(product_type.to_string(), url.to_string());
        self
    }
}

#[async_trait]
impl ImageResolver for StaticImageResolver {
    async fn resolve(&self, product_type: &str, _: Option<&serde_json::Value>) -> Option<String> {
        self.entries.get(product_type).cloned()
    }
}
