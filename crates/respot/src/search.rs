//! Asynchronous search.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use respot_core::capi::{ObjectKind, RawHandle};
use respot_core::ffi::{SP_ERROR_OK, sp_error};

use crate::album::Album;
use crate::artist::Artist;
use crate::browse::{self, BrowseCallback, CompletionFlag, PendingRequest};
use crate::error::{Error, Result};
use crate::handle::HandleRef;
use crate::loadable::Loadable;
use crate::serialized;
use crate::session::Session;
use crate::track::Track;
use crate::util;

/// Results requested per category; matches the defaults of the original
/// search call.
const PAGE_SIZE: i32 = 20;

/// Result of an asynchronous search, pending until the native completion
/// callback fires.
#[derive(Clone)]
pub struct SearchResult {
    inner: Arc<SearchInner>,
}

struct SearchInner {
    session: Session,
    handle: HandleRef,
    done: CompletionFlag,
    callback: Mutex<Option<BrowseCallback<SearchResult>>>,
}

impl SearchResult {
    pub(crate) fn create(
        session: &Session,
        query: &str,
        callback: Option<BrowseCallback<SearchResult>>,
    ) -> Result<SearchResult> {
        let token = browse::next_token();
        // Native lock held across create + register; see the browse module.
        let _guard = serialized::native_call();
        let raw = session.lib().search_create(
            session.raw(),
            query,
            0,
            PAGE_SIZE,
            0,
            PAGE_SIZE,
            0,
            PAGE_SIZE,
            0,
            PAGE_SIZE,
            token,
        );
        if raw.is_null() {
            return Err(Error::InvalidHandle);
        }
        let handle = HandleRef::wrap(session.lib().clone(), ObjectKind::Search, raw, false)?;
        let inner = Arc::new(SearchInner {
            session: session.clone(),
            handle,
            done: CompletionFlag::new(),
            callback: Mutex::new(callback),
        });
        browse::register(token, Arc::clone(&inner) as Arc<dyn PendingRequest>);
        Ok(SearchResult { inner })
    }

    /// Park the calling thread until the search completes or `timeout`
    /// elapses, without pumping the event loop. Requires a running
    /// [`crate::EventLoop`]. Returns whether the search completed.
    pub fn wait_until_complete(&self, timeout: Duration) -> bool {
        self.inner.done.wait(timeout)
    }

    /// The query string as echoed by the native library.
    pub fn query(&self) -> Option<String> {
        let _guard = serialized::native_call();
        util::non_empty(self.inner.session.lib().search_query(self.inner.handle.raw()))
    }

    /// Tracks in the current result page. Empty until complete.
    pub fn tracks(&self) -> Result<Vec<Track>> {
        let raws = self.collect(|lib, raw, index| lib.search_track(raw, index), |lib, raw| {
            lib.search_num_tracks(raw)
        });
        raws.into_iter()
            .map(|raw| Track::from_raw(&self.inner.session, raw, true))
            .collect()
    }

    /// Albums in the current result page. Empty until complete.
    pub fn albums(&self) -> Result<Vec<Album>> {
        let raws = self.collect(|lib, raw, index| lib.search_album(raw, index), |lib, raw| {
            lib.search_num_albums(raw)
        });
        raws.into_iter()
            .map(|raw| Album::from_raw(&self.inner.session, raw, true))
            .collect()
    }

    /// Artists in the current result page. Empty until complete.
    pub fn artists(&self) -> Result<Vec<Artist>> {
        let raws = self.collect(|lib, raw, index| lib.search_artist(raw, index), |lib, raw| {
            lib.search_num_artists(raw)
        });
        raws.into_iter()
            .map(|raw| Artist::from_raw(&self.inner.session, raw, true))
            .collect()
    }

    /// Names of matching playlists in the current result page.
    pub fn playlist_names(&self) -> Vec<String> {
        let _guard = serialized::native_call();
        let lib = self.inner.session.lib();
        let raw = self.inner.handle.raw();
        let count = lib.search_num_playlists(raw);
        (0..count)
            .map(|index| lib.search_playlist_name(raw, index))
            .collect()
    }

    /// Total matches per category across all pages.
    pub fn track_total(&self) -> i32 {
        let _guard = serialized::native_call();
        self.inner.session.lib().search_total_tracks(self.inner.handle.raw())
    }

    pub fn album_total(&self) -> i32 {
        let _guard = serialized::native_call();
        self.inner.session.lib().search_total_albums(self.inner.handle.raw())
    }

    pub fn artist_total(&self) -> i32 {
        let _guard = serialized::native_call();
        self.inner.session.lib().search_total_artists(self.inner.handle.raw())
    }

    pub fn playlist_total(&self) -> i32 {
        let _guard = serialized::native_call();
        self.inner
            .session
            .lib()
            .search_total_playlists(self.inner.handle.raw())
    }

    fn collect(
        &self,
        item: impl Fn(&dyn respot_core::capi::NativeLib, RawHandle, i32) -> RawHandle,
        count: impl Fn(&dyn respot_core::capi::NativeLib, RawHandle) -> i32,
    ) -> Vec<RawHandle> {
        let _guard = serialized::native_call();
        let lib = self.inner.session.lib().as_ref();
        let raw = self.inner.handle.raw();
        (0..count(lib, raw))
            .map(|index| item(lib, raw, index))
            .filter(|raw| !raw.is_null())
            .collect()
    }
}

impl PendingRequest for SearchInner {
    fn complete(self: Arc<Self>, error: sp_error) {
        if error != SP_ERROR_OK {
            tracing::warn!(code = error, "search completed with an error");
        }
        self.done.set();
        let callback = self.callback.lock().take();
        let result = SearchResult {
            inner: Arc::clone(&self),
        };
        if let Some(callback) = callback {
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(&result)))
                .is_err()
            {
                tracing::error!("search completion callback panicked");
            }
        }
    }
}

impl Loadable for SearchResult {
    fn session(&self) -> &Session {
        &self.inner.session
    }

    fn handle(&self) -> &HandleRef {
        &self.inner.handle
    }

    /// Completion of the asynchronous request, substituted for the native
    /// loaded query.
    fn is_loaded(&self) -> bool {
        self.inner.done.is_set()
    }
}

impl fmt::Debug for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchResult")
            .field("query", &self.query())
            .field("complete", &self.is_loaded())
            .finish()
    }
}
