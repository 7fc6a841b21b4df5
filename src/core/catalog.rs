use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use super::elements::ElementRecord;
use super::tle::{ParseError, ParsedBatch};

/// Immutable mapping from catalog number to element record.
/// A new value is built for every refresh; readers keep whichever `Arc` they loaded.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    generation: u64,
    records: HashMap<u32, Arc<ElementRecord>>,
    rejected: HashMap<u32, ParseError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub generation: u64,
    pub added: usize,
    pub replaced: usize,
    pub removed: usize,
    pub rejected: usize,
    pub total: usize,
}

impl Catalog {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: u32) -> Option<Arc<ElementRecord>> {
        self.records.get(&id).cloned()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.records.contains_key(&id)
    }

    /// Sorted catalog numbers.
    pub fn all_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Arc<ElementRecord>)> {
        self.records.iter().map(|(id, record)| (*id, record))
    }

    /// The parse error of the most recent delivery for `id`, if it was rejected.
    pub fn rejection(&self, id: u32) -> Option<&ParseError> {
        self.rejected.get(&id)
    }

    /// Builds the next catalog value: records in `batch` replace or extend the
    /// current ones, ids in `removals` are dropped, everything else is kept.
    pub fn merged(&self, batch: ParsedBatch, removals: &[u32]) -> (Catalog, RefreshSummary) {
        let mut next = self.clone();
        next.generation = self.generation + 1;
        let mut summary =
            RefreshSummary { generation: next.generation, ..RefreshSummary::default() };

        let mut refreshed = HashSet::new();
        for record in batch.records {
            let id = record.norad_id;
            refreshed.insert(id);
            next.rejected.remove(&id);
            if next.records.insert(id, Arc::new(record)).is_some() {
                summary.replaced += 1;
            } else {
                summary.added += 1;
            }
        }
        for error in batch.errors {
            if let Some(id) = error.catalog_id {
                // A valid record for the same id in this batch wins.
                if next.records.contains_key(&id) && !refreshed.contains(&id) {
                    debug!(
                        norad = id,
                        error = %error,
                        "Keeping previous record for rejected element set"
                    );
                    next.rejected.insert(id, error);
                    summary.rejected += 1;
                }
            }
        }
        for id in removals {
            next.rejected.remove(id);
            if next.records.remove(id).is_some() {
                summary.removed += 1;
            }
        }
        summary.total = next.records.len();
        (next, summary)
    }
}

/// Shared slot holding the current catalog. Refreshes are serialised and
/// published with a single pointer swap.
#[derive(Debug, Default)]
pub struct CatalogHandle {
    current: RwLock<Arc<Catalog>>,
    writer: Mutex<()>,
}

impl CatalogHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        Self { current: RwLock::new(Arc::new(catalog)), writer: Mutex::new(()) }
    }

    /// A stable snapshot; later refreshes never change it.
    pub fn load(&self) -> Arc<Catalog> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get(&self, id: u32) -> Option<Arc<ElementRecord>> {
        self.load().get(id)
    }

    pub fn all_ids(&self) -> Vec<u32> {
        self.load().all_ids()
    }

    pub fn refresh(&self, batch: ParsedBatch, removals: &[u32]) -> RefreshSummary {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let (next, summary) = self.load().merged(batch, removals);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        info!(
            generation = summary.generation,
            added = summary.added,
            replaced = summary.replaced,
            removed = summary.removed,
            rejected = summary.rejected,
            total = summary.total,
            "Catalog refreshed"
        );
        summary
    }
}
