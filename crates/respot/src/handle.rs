//! RAII ownership of native reference counts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use respot_core::capi::{NativeLib, ObjectKind, RawHandle};
use respot_core::ffi::SP_ERROR_OK;

use crate::error::{Error, Result, check};
use crate::serialized;

/// Owner of exactly one logical reference count unit on a native object.
///
/// Wrapping with `acquire` increments the native count once; dropping (or an
/// explicit [`HandleRef::release`]) decrements it exactly once. Cloning
/// acquires a fresh reference, moving does not. The raw handle never leaves
/// the wrapper except to be passed back into the capability trait.
pub struct HandleRef {
    lib: Arc<dyn NativeLib>,
    kind: ObjectKind,
    raw: RawHandle,
    released: AtomicBool,
}

impl HandleRef {
    /// Wrap a native handle.
    ///
    /// Pass `acquire = true` for handles borrowed from another native call
    /// (the default situation) and `acquire = false` for handles returned
    /// fresh from a native `create` call, which already carry one reference.
    pub fn wrap(
        lib: Arc<dyn NativeLib>,
        kind: ObjectKind,
        raw: RawHandle,
        acquire: bool,
    ) -> Result<HandleRef> {
        if raw.is_null() {
            return Err(Error::InvalidHandle);
        }
        if acquire {
            let _guard = serialized::native_call();
            check(lib.add_ref(kind, raw))?;
        }
        Ok(HandleRef {
            lib,
            kind,
            raw,
            released: AtomicBool::new(false),
        })
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// The wrapped handle, for passing back into the capability trait.
    ///
    /// Using a handle after [`HandleRef::release`] is a programming error.
    pub fn raw(&self) -> RawHandle {
        debug_assert!(
            !self.released.load(Ordering::Acquire),
            "use of a released {} handle",
            self.kind.name()
        );
        self.raw
    }

    /// Decrement the native reference count.
    ///
    /// Idempotent: only the first call releases; later calls (including the
    /// one from `Drop`) are no-ops.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let _guard = serialized::native_call();
        let code = self.lib.release(self.kind, self.raw);
        if code != SP_ERROR_OK {
            tracing::warn!(kind = self.kind.name(), code, "native release reported an error");
        }
    }

    pub(crate) fn lib(&self) -> &Arc<dyn NativeLib> {
        &self.lib
    }
}

impl Clone for HandleRef {
    fn clone(&self) -> Self {
        let raw = self.raw();
        let _guard = serialized::native_call();
        let code = self.lib.add_ref(self.kind, raw);
        debug_assert_eq!(code, SP_ERROR_OK, "add_ref failed while cloning");
        HandleRef {
            lib: Arc::clone(&self.lib),
            kind: self.kind,
            raw,
            released: AtomicBool::new(false),
        }
    }
}

impl Drop for HandleRef {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for HandleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRef")
            .field("kind", &self.kind)
            .field("raw", &self.raw)
            .field("released", &self.released.load(Ordering::Relaxed))
            .finish()
    }
}
