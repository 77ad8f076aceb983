use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use super::SharedStore;
use crate::snapshot::{DataSnapshot, SourceId};
use crate::source::{DataSource, FetchError};

/// Starts fetch workers on the tokio runtime and guarantees each one ends in
/// exactly one publish.
///
/// A worker is claimed through [`SharedStore::begin_fetch`] before it is
/// spawned, so two triggers for the same source can never both start one,
/// and it publishes under that claim.
/// The fetch itself runs in a child task bounded by `timeout`: a hung request
/// becomes [`FetchError::Timeout`] and a panicking one [`FetchError::Worker`],
/// which keeps a source from being stuck in flight forever.
pub struct FetchSupervisor<S: DataSource> {
    source: Arc<S>,
    store: Arc<SharedStore<S::Values>>,
    runtime: Handle,
    timeout: Duration,
}

impl<S: DataSource> FetchSupervisor<S> {
    pub fn new(source: S, store: Arc<SharedStore<S::Values>>, runtime: Handle, timeout: Duration) -> Self {
        Self {
            source: Arc::new(source),
            store,
            runtime,
            timeout,
        }
    }

    pub fn store(&self) -> &Arc<SharedStore<S::Values>> {
        &self.store
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Spawn a fetch for `id` unless one is already in flight.
    ///
    /// Never blocks: returns as soon as the task is handed to the runtime.
    pub fn try_spawn(&self, id: &SourceId) -> bool {
        let Some(claim) = self.store.begin_fetch(id) else {
            tracing::debug!(source = %id, "fetch already in flight, skipping");
            return false;
        };

        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);
        let id = id.clone();
        let timeout = self.timeout;
        tracing::debug!(source = %id, kind = source.name(), "spawning fetch");

        self.runtime.spawn(async move {
            let result = run_bounded(Arc::clone(&source), id.clone(), timeout).await;
            match &result {
                Ok(snapshot) => tracing::info!(
                    source = %snapshot.source(),
                    kind = source.name(),
                    fetched_at = %snapshot.fetched_at(),
                    points = snapshot.history().len(),
                    "fetch succeeded"
                ),
                Err(e) => tracing::warn!(source = %id, kind = source.name(), error = %e, "fetch failed"),
            }
            store.publish(&id, claim, result);
        });
        true
    }
}

async fn run_bounded<S: DataSource>(
    source: Arc<S>,
    id: SourceId,
    timeout: Duration,
) -> Result<DataSnapshot<S::Values>, FetchError> {
    let mut task = tokio::spawn(async move { source.fetch(&id).await });
    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(FetchError::Worker(join.to_string())),
        Err(_) => {
            task.abort();
            Err(FetchError::Timeout(timeout))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
