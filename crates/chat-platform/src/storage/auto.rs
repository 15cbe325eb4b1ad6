//! Auto-detect the best available storage backend.
//!
//! Priority: IndexedDB → localStorage → Memory (fallback)

use std::rc::Rc;
use chat_core::ports::StoragePort;
use super::{IndexedDbStorage, LocalStorageBackend, MemoryStorage};

/// Open the best available storage backend. Never fails: without any
/// browser storage the chat state simply does not survive a reload.
pub async fn auto_detect_storage() -> Rc<dyn StoragePort> {
    match IndexedDbStorage::open().await {
        Ok(idb) => {
            log::info!("Storage backend: IndexedDB");
            return Rc::new(idb);
        }
        Err(e) => log::warn!("IndexedDB unavailable ({}), trying localStorage", e),
    }
    match LocalStorageBackend::open() {
        Ok(local) => {
            log::info!("Storage backend: localStorage");
            Rc::new(local)
        }
        Err(e) => {
            log::warn!("localStorage unavailable ({}), falling back to memory", e);
            Rc::new(MemoryStorage::new())
        }
    }
}
