//! Process-wide identity cache for singleton-per-handle wrappers.
//!
//! Some native objects (playlists, the playlist container) must map to
//! exactly one live wrapper so application-level identity comparisons are
//! meaningful. The registry keeps weak references keyed by backend instance
//! and handle address; wrapper lifetime stays governed solely by external
//! owners, and stale entries are pruned lazily on lookup.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::Mutex;
use respot_core::capi::{NativeLib, RawHandle};

use crate::error::Result;

type Key = (usize, usize);

static REGISTRY: LazyLock<Mutex<HashMap<Key, Weak<dyn Any + Send + Sync>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn key(lib: &Arc<dyn NativeLib>, raw: RawHandle) -> Key {
    // Keyed per backend instance as well as per address, so address reuse
    // across independent library instances cannot alias.
    (Arc::as_ptr(lib) as *const () as usize, raw.addr())
}

/// Return the registered live wrapper for `raw`, or build one with `factory`
/// and register it.
///
/// The factory runs without the registry lock held (it usually enters the
/// native library); if another thread registered a wrapper in the meantime,
/// that wrapper wins and the fresh one is dropped before it ever escapes.
pub(crate) fn get_or_create<T, F>(
    lib: &Arc<dyn NativeLib>,
    raw: RawHandle,
    factory: F,
) -> Result<Arc<T>>
where
    T: Any + Send + Sync,
    F: FnOnce() -> Result<Arc<T>>,
{
    let key = key(lib, raw);

    if let Some(existing) = lookup::<T>(key) {
        return Ok(existing);
    }

    let fresh = factory()?;

    let mut table = REGISTRY.lock();
    if let Some(weak) = table.get(&key) {
        if let Some(strong) = weak.upgrade() {
            if let Ok(existing) = strong.downcast::<T>() {
                return Ok(existing);
            }
        }
    }
    let as_any: Arc<dyn Any + Send + Sync> = fresh.clone();
    table.insert(key, Arc::downgrade(&as_any));
    Ok(fresh)
}

fn lookup<T: Any + Send + Sync>(key: Key) -> Option<Arc<T>> {
    let mut table = REGISTRY.lock();
    match table.get(&key) {
        Some(weak) => match weak.upgrade() {
            Some(strong) => strong.downcast::<T>().ok(),
            None => {
                table.remove(&key);
                None
            }
        },
        None => None,
    }
}
