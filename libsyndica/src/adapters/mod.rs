//! Platform adapters
//!
//! An adapter owns the API mechanics of one platform. The queue manager
//! formats and validates content before calling `publish`, so adapters only
//! deal with delivery.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::PlatformError;
use crate::platform::Platform;
use crate::types::ContentItem;

pub mod mock;

pub use mock::MockAdapter;

/// Proof of delivery from a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub post_id: Option<String>,
    pub url: Option<String>,
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether credentials and settings are in place to post.
    fn is_configured(&self) -> bool;

    /// Deliver the formatted content. `item` carries attachments (image,
    /// link) the platform may want beyond the text.
    async fn publish(
        &self,
        item: &ContentItem,
        formatted: &str,
    ) -> Result<PublishReceipt, PlatformError>;
}

const MAX_ATTEMPTS: u32 = 3;

/// Publish with bounded internal retry. Only transient errors (network,
/// platform-side throttling) are retried; backoff doubles per attempt.
pub async fn publish_with_retry(
    adapter: &dyn PlatformAdapter,
    item: &ContentItem,
    formatted: &str,
) -> Result<PublishReceipt, PlatformError> {
    let mut attempt = 1;
    loop {
        match adapter.publish(item, formatted).await {
            Ok(receipt) => return Ok(receipt),
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                let delay = Duration::from_secs(1 << (attempt - 1));
                warn!(
                    platform = %adapter.platform(),
                    attempt,
                    error = %e,
                    "transient publish error, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Adapters keyed by platform. The queue manager consults this for every
/// target; a missing entry means the platform is not wired up at all.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn get(&self, platform: Platform) -> Option<&Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform)
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
