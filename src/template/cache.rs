//! Memoized mapping cache
//!
//! One cell per `(formType, version)`. Concurrent first lookups of a key wait
//! on the same load; failed loads leave the cell empty so the next lookup
//! tries again. Entries live as long as the cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::mapping::FormMapping;

use super::types::{CacheStats, TemplateResult};

type Cell = Arc<OnceCell<Arc<FormMapping>>>;

#[derive(Default)]
pub struct MappingCache {
    cells: Mutex<HashMap<(String, String), Cell>>,
    lookups: AtomicU64,
    misses: AtomicU64,
}

impl MappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, form_type: &str, version: &str) -> Cell {
        let mut cells = self.cells.lock();
        cells
            .entry((form_type.to_string(), version.to_string()))
            .or_default()
            .clone()
    }

    /// Cached mapping, running `load` when the key has none yet
    pub async fn get_or_load<F, Fut>(&self, form_type: &str, version: &str, load: F) -> TemplateResult<Arc<FormMapping>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TemplateResult<FormMapping>>,
    {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let cell = self.cell(form_type, version);

        let mapping = cell
            .get_or_try_init(|| async {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Mapping cache miss for {} {}", form_type, version);
                load().await.map(Arc::new)
            })
            .await?;

        Ok(Arc::clone(mapping))
    }

    pub fn stats(&self) -> CacheStats {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            hits: lookups.saturating_sub(misses),
            misses,
            entries: self
                .cells
                .lock()
                .values()
                .filter(|cell| cell.initialized())
                .count(),
        }
    }
}

impl std::fmt::Debug for MappingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingCache").field("stats", &self.stats()).finish()
    }
}
