//! Global serialization of native-library calls.
//!
//! The native library is not reentrant across its call surface, so every call
//! site in this crate takes this process-wide lock before entering the
//! capability trait. The lock is reentrant: callbacks fired inside the event
//! loop's processing step may drop wrappers (reference-count release) or call
//! accessors on the same thread.

use std::sync::LazyLock;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

static NATIVE_CALL_LOCK: LazyLock<ReentrantMutex<()>> = LazyLock::new(|| ReentrantMutex::new(()));

/// Acquire the native-call lock for the duration of the returned guard.
pub(crate) fn native_call() -> ReentrantMutexGuard<'static, ()> {
    NATIVE_CALL_LOCK.lock()
}
