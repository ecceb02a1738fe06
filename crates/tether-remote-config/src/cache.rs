//! Process-wide remote configuration cache.
//!
//! The document is loaded once per process by a warm-up task. Readers await
//! the warm-up, then read the current document under a read lock. Each
//! successful fetch replaces the document wholesale. A document saved before
//! the warm-up finishes is never overwritten by the persisted one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::document::RemoteConfigDocument;
use crate::errors::Result;
use crate::signed::{ApplyOutcome, SignedEnvelope, fetch_signed};
use crate::store::RemoteConfigStore;

/// Signed-fetch source consulted during warm-up.
#[derive(Clone, Debug)]
struct SignedSource {
    url: String,
    public_key: String,
    client: reqwest::Client,
}

/// Last-fetched remote configuration, backed by a [`RemoteConfigStore`].
pub struct RemoteConfigCache {
    store: Arc<dyn RemoteConfigStore>,
    document: RwLock<Arc<RemoteConfigDocument>>,
    /// Set under the `document` write lock by every `save`.
    replaced: AtomicBool,
    warmed: OnceCell<()>,
    signed_source: Option<SignedSource>,
}

impl RemoteConfigCache {
    /// Cache over `store`, warmed from the persisted document only.
    pub fn new(store: Arc<dyn RemoteConfigStore>) -> Self {
        Self {
            store,
            document: RwLock::new(Arc::new(RemoteConfigDocument::default())),
            replaced: AtomicBool::new(false),
            warmed: OnceCell::new(),
            signed_source: None,
        }
    }

    /// Also fetch a signed envelope from `url` during warm-up and apply it
    /// when it verifies against `public_key_b64`.
    #[must_use]
    pub fn with_signed_source(
        mut self,
        url: impl Into<String>,
        public_key_b64: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        self.signed_source = Some(SignedSource {
            url: url.into(),
            public_key: public_key_b64.into(),
            client,
        });
        self
    }

    /// Run the warm-up in a detached task.
    pub fn spawn_warm_up(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move { cache.warm_up().await })
    }

    /// Load the document once. Concurrent and later callers wait for the
    /// first load to finish.
    pub async fn warm_up(&self) {
        let _ = self.warmed.get_or_init(|| self.load_initial()).await;
    }

    /// Whether the warm-up has completed.
    pub fn is_warm(&self) -> bool {
        self.warmed.initialized()
    }

    /// The current document, after warm-up.
    pub async fn current_document(&self) -> Arc<RemoteConfigDocument> {
        self.warm_up().await;
        Arc::clone(&self.document.read())
    }

    /// Replace the document in memory and persist it.
    ///
    /// The in-memory replacement happens even when persisting fails.
    pub fn save(&self, document: RemoteConfigDocument) -> Result<()> {
        let document = Arc::new(document);
        {
            let mut current = self.document.write();
            *current = Arc::clone(&document);
            self.replaced.store(true, Ordering::Release);
        }
        self.store.save(&document)
    }

    /// Verify `envelope` against `public_key_b64` and save its payload.
    pub fn apply_signed(&self, envelope: &SignedEnvelope, public_key_b64: &str) -> ApplyOutcome {
        if !envelope.verify(public_key_b64) {
            warn!(timestamp = envelope.timestamp, "remote config signature rejected");
            return ApplyOutcome::Untrusted;
        }
        let mut document: RemoteConfigDocument = match serde_json::from_str(&envelope.payload) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "signed remote config payload is malformed");
                return ApplyOutcome::Malformed;
            }
        };
        if document.fetched_at_unix_seconds == 0 {
            document.fetched_at_unix_seconds = envelope.timestamp;
        }
        if let Err(e) = self.save(document) {
            warn!(error = %e, "failed to persist remote config");
        }
        ApplyOutcome::Applied
    }

    async fn load_initial(&self) {
        match self.store.load() {
            Ok(Some(doc)) => {
                let mut current = self.document.write();
                if self.replaced.load(Ordering::Acquire) {
                    debug!("remote config saved before warm-up, ignoring persisted copy");
                } else {
                    debug!(fetched_at = doc.fetched_at_unix_seconds, "loaded persisted remote config");
                    *current = Arc::new(doc);
                }
            }
            Ok(None) => debug!("no persisted remote config, using built-in document"),
            Err(e) => warn!(error = %e, "failed to load persisted remote config"),
        }

        let Some(source) = &self.signed_source else {
            return;
        };
        match fetch_signed(&source.client, &source.url).await {
            Ok(envelope) => {
                let outcome = self.apply_signed(&envelope, &source.public_key);
                info!(?outcome, url = %source.url, "signed remote config fetched");
            }
            Err(e) => warn!(error = %e, url = %source.url, "signed remote config fetch failed"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
