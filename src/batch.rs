use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::gmail::{GmailClient, MessageFormat};
use crate::message::RawMessage;
use crate::normalization::{CanonicalRecord, MessageNormalizer};

/// Fans out one retrieval per identifier and gathers the normalised results.
///
/// Retrievals run concurrently as independent tasks; each writes only its own
/// result slot. Output order follows input order regardless of completion
/// order. Individual failures are logged and dropped.
pub struct BatchFetcher {
    normalizer: Arc<MessageNormalizer>,
}

impl BatchFetcher {
    pub fn new(normalizer: Arc<MessageNormalizer>) -> Self {
        Self { normalizer }
    }

    pub async fn fetch_all<F, Fut>(&self, ids: &[String], fetch_one: F) -> Vec<CanonicalRecord>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<RawMessage>> + Send + 'static,
    {
        if ids.is_empty() {
            return Vec::new();
        }

        let handles: Vec<_> = ids
            .iter()
            .map(|id| (id.as_str(), tokio::spawn(fetch_one(id.clone()))))
            .collect();

        let mut records = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            match handle.await {
                Ok(Ok(raw)) => records.push(self.normalizer.normalize(&raw)),
                Ok(Err(e)) => log::warn!("Failed to fetch message {id}: {e}"),
                Err(e) => log::warn!("Fetch task for message {id} did not complete: {e}"),
            }
        }

        log::debug!("Fetched {} of {} messages", records.len(), ids.len());
        records
    }

    /// [`fetch_all`](Self::fetch_all) against the mail provider with one bearer credential.
    pub async fn fetch_from_gmail(
        &self,
        client: &GmailClient,
        token: &str,
        ids: &[String],
        format: MessageFormat,
    ) -> Vec<CanonicalRecord> {
        let token: Arc<str> = Arc::from(token);
        self.fetch_all(ids, |id| {
            let client = client.clone();
            let token = Arc::clone(&token);
            async move { client.get_message(&token, &id, format).await }
        })
        .await
    }
}
