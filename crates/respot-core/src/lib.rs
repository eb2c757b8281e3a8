//! respot-core: raw surface of the native streaming library.
//!
//! This crate contains everything the safe binding shares with the native
//! side of the boundary:
//!
//! - `ffi`: `#[repr(C)]` types, constants and extern declarations of the
//!   library's C ABI
//! - `capi`: the [`capi::NativeLib`] capability trait the binding programs
//!   against, plus the handle/enum types marshaled across the boundary
//! - `mock` (feature `mock`): an in-memory backend for tests
//!
//! # Usage
//!
//! ```ignore
//! use respot_core::capi::{NativeLib, ObjectKind};
//!
//! fn release(lib: &dyn NativeLib, handle: respot_core::capi::RawHandle) {
//!     lib.release(ObjectKind::Track, handle);
//! }
//! ```

pub mod capi;
pub mod ffi;

#[cfg(feature = "mock")]
pub mod mock;

// Re-export commonly used types at crate root for convenience
pub use capi::{
    AlbumType, ConnectionState, LinkType, NativeCallbacks, NativeConfig, NativeLib, ObjectKind,
    RawHandle, UnknownDiscriminant,
};
pub use ffi::{sp_audioformat, sp_error};
