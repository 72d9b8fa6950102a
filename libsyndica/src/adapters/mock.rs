//! Scriptable in-memory adapter
//!
//! Used by the test suite and the dry-run paths of the binaries. Records
//! every publish call and can be scripted to fail a number of times before
//! succeeding.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::PlatformError;
use crate::platform::Platform;
use crate::types::ContentItem;

use super::{PlatformAdapter, PublishReceipt};

#[derive(Debug, Clone)]
pub struct RecordedPublish {
    pub item_id: String,
    pub formatted: String,
}

pub struct MockAdapter {
    platform: Platform,
    configured: bool,
    remaining_failures: AtomicU32,
    failure: Mutex<Option<PlatformError>>,
    calls: Arc<Mutex<Vec<RecordedPublish>>>,
    counter: AtomicU32,
}

impl MockAdapter {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            configured: true,
            remaining_failures: AtomicU32::new(0),
            failure: Mutex::new(None),
            calls: Arc::new(Mutex::new(Vec::new())),
            counter: AtomicU32::new(0),
        }
    }

    pub fn unconfigured(platform: Platform) -> Self {
        let mut adapter = Self::new(platform);
        adapter.configured = false;
        adapter
    }

    /// Fail the next `n` publish calls with `error`, then succeed.
    pub fn fail_times(self, n: u32, error: PlatformError) -> Self {
        self.remaining_failures.store(n, Ordering::SeqCst);
        *self.failure.lock().unwrap() = Some(error);
        self
    }

    pub fn publish_calls(&self) -> u32 {
        self.calls.lock().unwrap().len() as u32
    }

    pub fn recorded(&self) -> Vec<RecordedPublish> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn publish(
        &self,
        item: &ContentItem,
        formatted: &str,
    ) -> Result<PublishReceipt, PlatformError> {
        self.calls.lock().unwrap().push(RecordedPublish {
            item_id: item.id.clone(),
            formatted: formatted.to_string(),
        });

        if self.remaining_failures.load(Ordering::SeqCst) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            let error = self
                .failure
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| PlatformError::Publish("scripted failure".to_string()));
            return Err(error);
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let post_id = format!("{}-{}", self.platform.as_str(), n);
        Ok(PublishReceipt {
            url: Some(format!("https://{}.example/{}", self.platform.as_str(), post_id)),
            post_id: Some(post_id),
        })
    }
}
