//! Per-entity state cells.
//!
//! Each entity gets its own lock around a loaded [`ConversationStore`], so
//! operations on one entity run one at a time while different entities run
//! concurrently. A cell only becomes visible once its store has loaded.

use crate::error::StoreError;
use crate::storage::KeyValueStore;
use crate::store::{ConversationStore, StoreConfig};
use dashmap::DashMap;
use lucy_core::EntityId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type Cell = Arc<Mutex<ConversationStore>>;

/// Exclusive access to one entity's store.
pub type EntityGuard = OwnedMutexGuard<ConversationStore>;

/// Registry of loaded entity cells.
pub struct EntityRegistry {
    kv: Arc<dyn KeyValueStore>,
    config: StoreConfig,
    cells: DashMap<EntityId, Cell>,
}

impl EntityRegistry {
    /// Creates an empty registry over a storage backend.
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>, config: StoreConfig) -> Self {
        Self {
            kv,
            config,
            cells: DashMap::new(),
        }
    }

    /// Store settings applied to every entity.
    #[must_use]
    pub fn config(&self) -> StoreConfig {
        self.config
    }

    /// Locks an entity's store, loading it on first access.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity's state cannot be loaded.
    pub async fn lock(&self, entity: &EntityId) -> lucy_core::Result<EntityGuard, StoreError> {
        let existing = self.cells.get(entity).map(|cell| Arc::clone(cell.value()));
        let cell = match existing {
            Some(cell) => cell,
            None => {
                let store =
                    ConversationStore::load(Arc::clone(&self.kv), entity.clone(), self.config)
                        .await?;
                // A concurrent load may have won; its cell is authoritative.
                Arc::clone(
                    self.cells
                        .entry(entity.clone())
                        .or_insert_with(|| Arc::new(Mutex::new(store)))
                        .value(),
                )
            }
        };
        Ok(cell.lock_owned().await)
    }

    /// Number of loaded cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if no cell is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Drops cells nobody is using. Their state is already persisted and is
    /// reloaded on next access. Returns the number of dropped cells.
    pub fn prune_idle(&self) -> usize {
        let before = self.cells.len();
        self.cells.retain(|_, cell| Arc::strong_count(cell) > 1);
        let pruned = before.saturating_sub(self.cells.len());
        if pruned > 0 {
            debug!(pruned, "pruned idle entity cells");
        }
        pruned
    }
}
