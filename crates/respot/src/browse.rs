//! One-shot asynchronous native requests (browse, search, image loads).
//!
//! Issuing a request hands the native library a fresh correlation token; the
//! completion callback round-trips it into [`complete`]. A process-wide table
//! maps each outstanding token to a strong reference on the issuing request,
//! so the completion always reaches a live object even if the application
//! dropped its wrapper right after issuing. The table entry is popped (and
//! the reference released) when the callback fires.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::{Condvar, Mutex};
use respot_core::capi::{ObjectKind, RawHandle};
use respot_core::ffi::{SP_ERROR_OK, sp_error};

use crate::album::Album;
use crate::artist::Artist;
use crate::error::{Error, Result};
use crate::handle::HandleRef;
use crate::loadable::Loadable;
use crate::serialized;
use crate::session::Session;
use crate::track::Track;
use crate::util;

/// Completion callback supplied when issuing a request; invoked exactly once
/// from the event-loop thread.
pub type BrowseCallback<T> = Box<dyn FnOnce(&T) + Send + 'static>;

/// An outstanding request waiting for its completion callback.
pub(crate) trait PendingRequest: Send + Sync {
    fn complete(self: Arc<Self>, error: sp_error);
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

static PENDING: LazyLock<Mutex<HashMap<u64, Arc<dyn PendingRequest>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub(crate) fn next_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// Register an outstanding request. Callers must hold the native-call lock
/// spanning the issuing native call and this registration, so the completion
/// cannot race in between.
pub(crate) fn register(token: u64, request: Arc<dyn PendingRequest>) {
    PENDING.lock().insert(token, request);
}

/// Route a completion from the native callback into the issuing request.
pub(crate) fn complete(token: u64, error: sp_error) {
    let request = PENDING.lock().remove(&token);
    match request {
        Some(request) => request.complete(error),
        // Tokens are also used for fire-and-forget loads (images) that have
        // no registered request.
        None => tracing::trace!(token, "completion without a registered request"),
    }
}

/// One-way PENDING → COMPLETE flag with a broadcast for blocked waiters.
/// The flag is checked before any wait, so a completion delivered earlier is
/// never missed.
pub(crate) struct CompletionFlag {
    done: Mutex<bool>,
    cond: Condvar,
}

impl CompletionFlag {
    pub(crate) fn new() -> CompletionFlag {
        CompletionFlag {
            done: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn set(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cond.notify_all();
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.done.lock()
    }

    /// Passive wait for completion: checks the flag before parking, so a
    /// broadcast delivered earlier is never missed. Returns whether the
    /// request completed within `timeout`.
    pub(crate) fn wait(&self, timeout: std::time::Duration) -> bool {
        let mut done = self.done.lock();
        if *done {
            return true;
        }
        let _ = self.cond.wait_for(&mut done, timeout);
        *done
    }
}

fn run_callback<T>(wrapper: &T, callback: Option<BrowseCallback<T>>) {
    if let Some(callback) = callback {
        if catch_unwind(AssertUnwindSafe(|| callback(wrapper))).is_err() {
            tracing::error!("browse completion callback panicked");
        }
    }
}

// ---------------------------------------------------------------------------
// Album browse
// ---------------------------------------------------------------------------

/// Result of browsing an album's full track list.
#[derive(Clone)]
pub struct AlbumBrowser {
    inner: Arc<AlbumBrowseInner>,
}

struct AlbumBrowseInner {
    session: Session,
    handle: HandleRef,
    done: CompletionFlag,
    callback: Mutex<Option<BrowseCallback<AlbumBrowser>>>,
}

impl AlbumBrowser {
    pub(crate) fn create(
        session: &Session,
        album: &Album,
        callback: Option<BrowseCallback<AlbumBrowser>>,
    ) -> Result<AlbumBrowser> {
        let token = next_token();
        // Hold the native lock across create + register: the completion is
        // delivered from a processing step, which this lock excludes.
        let _guard = serialized::native_call();
        let raw = session
            .lib()
            .albumbrowse_create(session.raw(), album.handle.raw(), token);
        if raw.is_null() {
            return Err(Error::InvalidHandle);
        }
        let handle = HandleRef::wrap(session.lib().clone(), ObjectKind::AlbumBrowse, raw, false)?;
        let inner = Arc::new(AlbumBrowseInner {
            session: session.clone(),
            handle,
            done: CompletionFlag::new(),
            callback: Mutex::new(callback),
        });
        register(token, Arc::clone(&inner) as Arc<dyn PendingRequest>);
        Ok(AlbumBrowser { inner })
    }

    /// Park the calling thread until the browse completes or `timeout`
    /// elapses, without pumping the event loop. Requires a running
    /// [`crate::EventLoop`]. Returns whether the browse completed.
    pub fn wait_until_complete(&self, timeout: std::time::Duration) -> bool {
        self.inner.done.wait(timeout)
    }

    /// The browsed album.
    pub fn album(&self) -> Result<Option<Album>> {
        let raw = {
            let _guard = serialized::native_call();
            self.inner.session.lib().albumbrowse_album(self.inner.handle.raw())
        };
        if raw.is_null() {
            return Ok(None);
        }
        Album::from_raw(&self.inner.session, raw, true).map(Some)
    }

    /// The album's main artist.
    pub fn artist(&self) -> Result<Option<Artist>> {
        let raw = {
            let _guard = serialized::native_call();
            self.inner.session.lib().albumbrowse_artist(self.inner.handle.raw())
        };
        if raw.is_null() {
            return Ok(None);
        }
        Artist::from_raw(&self.inner.session, raw, true).map(Some)
    }

    /// All tracks on the album. Empty until the browse completes.
    pub fn tracks(&self) -> Result<Vec<Track>> {
        let raws: Vec<RawHandle> = {
            let _guard = serialized::native_call();
            let lib = self.inner.session.lib();
            let count = lib.albumbrowse_num_tracks(self.inner.handle.raw());
            (0..count)
                .map(|index| lib.albumbrowse_track(self.inner.handle.raw(), index))
                .filter(|raw| !raw.is_null())
                .collect()
        };
        raws.into_iter()
            .map(|raw| Track::from_raw(&self.inner.session, raw, true))
            .collect()
    }

    /// Copyright lines. Empty until the browse completes.
    pub fn copyrights(&self) -> Vec<String> {
        let _guard = serialized::native_call();
        let lib = self.inner.session.lib();
        let count = lib.albumbrowse_num_copyrights(self.inner.handle.raw());
        (0..count)
            .map(|index| lib.albumbrowse_copyright(self.inner.handle.raw(), index))
            .collect()
    }

    /// Album review, or `None` if there is none.
    pub fn review(&self) -> Option<String> {
        let _guard = serialized::native_call();
        util::non_empty(
            self.inner
                .session
                .lib()
                .albumbrowse_review(self.inner.handle.raw()),
        )
    }
}

impl PendingRequest for AlbumBrowseInner {
    fn complete(self: Arc<Self>, error: sp_error) {
        if error != SP_ERROR_OK {
            tracing::warn!(code = error, "album browse completed with an error");
        }
        self.done.set();
        let callback = self.callback.lock().take();
        let browser = AlbumBrowser {
            inner: Arc::clone(&self),
        };
        run_callback(&browser, callback);
    }
}

impl Loadable for AlbumBrowser {
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

// ---------------------------------------------------------------------------
// Artist browse
// ---------------------------------------------------------------------------

/// Result of browsing an artist's catalogue.
#[derive(Clone)]
pub struct ArtistBrowser {
    inner: Arc<ArtistBrowseInner>,
}

struct ArtistBrowseInner {
    session: Session,
    handle: HandleRef,
    done: CompletionFlag,
    callback: Mutex<Option<BrowseCallback<ArtistBrowser>>>,
}

impl ArtistBrowser {
    pub(crate) fn create(
        session: &Session,
        artist: &Artist,
        callback: Option<BrowseCallback<ArtistBrowser>>,
    ) -> Result<ArtistBrowser> {
        let token = next_token();
        let _guard = serialized::native_call();
        let raw = session
            .lib()
            .artistbrowse_create(session.raw(), artist.handle.raw(), token);
        if raw.is_null() {
            return Err(Error::InvalidHandle);
        }
        let handle = HandleRef::wrap(session.lib().clone(), ObjectKind::ArtistBrowse, raw, false)?;
        let inner = Arc::new(ArtistBrowseInner {
            session: session.clone(),
            handle,
            done: CompletionFlag::new(),
            callback: Mutex::new(callback),
        });
        register(token, Arc::clone(&inner) as Arc<dyn PendingRequest>);
        Ok(ArtistBrowser { inner })
    }

    /// Park the calling thread until the browse completes or `timeout`
    /// elapses, without pumping the event loop. Requires a running
    /// [`crate::EventLoop`]. Returns whether the browse completed.
    pub fn wait_until_complete(&self, timeout: std::time::Duration) -> bool {
        self.inner.done.wait(timeout)
    }

    /// The browsed artist.
    pub fn artist(&self) -> Result<Option<Artist>> {
        let raw = {
            let _guard = serialized::native_call();
            self.inner
                .session
                .lib()
                .artistbrowse_artist(self.inner.handle.raw())
        };
        if raw.is_null() {
            return Ok(None);
        }
        Artist::from_raw(&self.inner.session, raw, true).map(Some)
    }

    /// Tracks in the artist's catalogue. Empty until the browse completes.
    pub fn tracks(&self) -> Result<Vec<Track>> {
        let raws: Vec<RawHandle> = {
            let _guard = serialized::native_call();
            let lib = self.inner.session.lib();
            let count = lib.artistbrowse_num_tracks(self.inner.handle.raw());
            (0..count)
                .map(|index| lib.artistbrowse_track(self.inner.handle.raw(), index))
                .filter(|raw| !raw.is_null())
                .collect()
        };
        raws.into_iter()
            .map(|raw| Track::from_raw(&self.inner.session, raw, true))
            .collect()
    }
}

impl PendingRequest for ArtistBrowseInner {
    fn complete(self: Arc<Self>, error: sp_error) {
        if error != SP_ERROR_OK {
            tracing::warn!(code = error, "artist browse completed with an error");
        }
        self.done.set();
        let callback = self.callback.lock().take();
        let browser = ArtistBrowser {
            inner: Arc::clone(&self),
        };
        run_callback(&browser, callback);
    }
}

impl Loadable for ArtistBrowser {
    fn session(&self) -> &Session {
        &self.inner.session
    }

    fn handle(&self) -> &HandleRef {
        &self.inner.handle
    }

    fn is_loaded(&self) -> bool {
        self.inner.done.is_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use respot_core::capi::NativeLib;
    use respot_core::mock::MockLib;
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn new_session() -> (Arc<MockLib>, Session) {
        let mock = Arc::new(MockLib::new());
        let session = Session::new(
            Arc::clone(&mock) as Arc<dyn NativeLib>,
            &SessionConfig::default(),
        )
        .expect("session");
        (mock, session)
    }

    fn album_fixture(mock: &MockLib) {
        mock.set_album("spotify:album:ram", "RAM", 2013, "spotify:artist:daft");
        mock.set_artist("spotify:artist:daft", "Daft Punk");
        mock.set_track("spotify:track:givelife", "Give Life Back to Music", 274_000, &[]);
        mock.set_track("spotify:track:lucky", "Get Lucky", 369_000, &[]);
        mock.set_album_browse(
            "spotify:album:ram",
            &["spotify:track:givelife", "spotify:track:lucky"],
            "A nice album",
        );
    }

    #[test]
    fn browse_completes_during_processing() {
        let (mock, session) = new_session();
        album_fixture(&mock);
        let album = session.get_album("spotify:album:ram").unwrap();

        let browser = album.browse(None).unwrap();
        assert!(!browser.is_loaded());
        assert!(browser.tracks().unwrap().is_empty());

        browser.load(Some(Duration::from_secs(2))).unwrap();
        assert!(browser.is_loaded());

        let tracks = browser.tracks().unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].name().as_deref(), Some("Give Life Back to Music"));
        assert_eq!(browser.review().as_deref(), Some("A nice album"));
        assert_eq!(browser.copyrights(), vec!["Mock Records".to_owned()]);
        assert_eq!(
            browser.album().unwrap().unwrap().name().as_deref(),
            Some("RAM")
        );
    }

    #[test]
    fn completion_callback_fires_exactly_once() {
        let (mock, session) = new_session();
        album_fixture(&mock);
        let album = session.get_album("spotify:album:ram").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_callback = Arc::clone(&calls);
        let browser = album
            .browse(Some(Box::new(move |_browser: &AlbumBrowser| {
                calls_in_callback.fetch_add(1, Ordering::SeqCst);
            })))
            .unwrap();

        session.process_events().unwrap();
        session.process_events().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(browser.is_loaded());
    }

    #[test]
    fn callback_reaches_a_live_object_after_the_wrapper_is_dropped() {
        let (mock, session) = new_session();
        album_fixture(&mock);
        let album = session.get_album("spotify:album:ram").unwrap();

        let seen = Arc::new(StdMutex::new(None));
        let seen_in_callback = Arc::clone(&seen);
        let browser = album
            .browse(Some(Box::new(move |browser: &AlbumBrowser| {
                let count = browser.tracks().expect("tracks").len();
                *seen_in_callback.lock().unwrap() = Some(count);
            })))
            .unwrap();

        // The application drops its last reference before completion; the
        // token table must keep the request alive.
        drop(browser);

        session.process_events().unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(2));
    }

    #[test]
    fn panicking_callback_is_contained() {
        let (mock, session) = new_session();
        album_fixture(&mock);
        let album = session.get_album("spotify:album:ram").unwrap();
        let browser = album
            .browse(Some(Box::new(|_browser: &AlbumBrowser| {
                panic!("callback bug");
            })))
            .unwrap();

        session.process_events().unwrap();
        assert!(browser.is_loaded());
    }

    #[test]
    fn artist_browse_lists_catalogue_tracks() {
        let (mock, session) = new_session();
        mock.set_artist("spotify:artist:daft", "Daft Punk");
        mock.set_track("spotify:track:one", "One More Time", 320_000, &[]);
        mock.set_artist_browse("spotify:artist:daft", &["spotify:track:one"]);

        let artist = session.get_artist("spotify:artist:daft").unwrap();
        let browser = artist.browse(None).unwrap();
        browser.load(Some(Duration::from_secs(2))).unwrap();

        let tracks = browser.tracks().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name().as_deref(), Some("One More Time"));
        assert_eq!(
            browser.artist().unwrap().unwrap().name().as_deref(),
            Some("Daft Punk")
        );
    }

    #[test]
    fn completion_flag_is_level_triggered() {
        let flag = CompletionFlag::new();
        assert!(!flag.is_set());
        flag.set();
        // A waiter arriving after the broadcast still observes completion.
        assert!(flag.is_set());
        flag.set();
        assert!(flag.is_set());
    }
}
