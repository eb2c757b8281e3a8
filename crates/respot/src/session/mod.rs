//! The session: owner of the native session handle and hub for callbacks.

pub mod events;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use respot_core::capi::{
    ConnectionState, NativeCallbacks, NativeConfig, NativeLib, ObjectKind, RawHandle,
};
use respot_core::ffi::{sp_audioformat, sp_error};
use serde::{Deserialize, Serialize};

use crate::browse;
use crate::error::{Error, LibError, Result, check, lib_error};
use crate::handle::HandleRef;
use crate::link::Link;
use crate::playlist::{Playlist, PlaylistContainer};
use crate::search::SearchResult;
use crate::serialized;
use crate::track::Track;
use crate::user::User;
use crate::util;

pub use events::{AudioFormat, SessionListener, SessionState};

/// Session creation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cache_location: PathBuf,
    pub settings_location: PathBuf,
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub application_key: Vec<u8>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            cache_location: PathBuf::from("tmp"),
            settings_location: PathBuf::from("tmp"),
            user_agent: concat!("respot/", env!("CARGO_PKG_VERSION")).to_owned(),
            application_key: Vec::new(),
        }
    }
}

impl SessionConfig {
    fn to_native(&self) -> NativeConfig {
        NativeConfig {
            cache_location: self.cache_location.to_string_lossy().into_owned(),
            settings_location: self.settings_location.to_string_lossy().into_owned(),
            user_agent: self.user_agent.clone(),
            application_key: self.application_key.clone(),
        }
    }
}

/// A native session, cheap to clone and shareable across threads.
///
/// All blocking waits (`wait_for_state`, `load` on the objects created here)
/// park the calling thread only; native interaction stays serialized behind
/// the global native-call lock.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct Wakeup {
    woken: Mutex<bool>,
    cond: Condvar,
}

pub(crate) struct SessionInner {
    lib: Arc<dyn NativeLib>,
    handle: HandleRef,
    state: Mutex<SessionState>,
    state_changed: Condvar,
    listeners: Mutex<Vec<(u64, Arc<dyn SessionListener>)>>,
    next_listener_id: AtomicU64,
    wakeup: Wakeup,
}

impl Session {
    /// Create a session over the given backend.
    pub fn new(lib: Arc<dyn NativeLib>, config: &SessionConfig) -> Result<Session> {
        let router = Arc::new(CallbackRouter::default());
        let raw = {
            let _guard = serialized::native_call();
            lib.session_create(
                &config.to_native(),
                Arc::clone(&router) as Arc<dyn NativeCallbacks>,
            )
        }
        .map_err(lib_error)?;
        let handle = HandleRef::wrap(Arc::clone(&lib), ObjectKind::Session, raw, false)?;

        let inner = Arc::new(SessionInner {
            lib,
            handle,
            state: Mutex::new(SessionState::LoggedOut),
            state_changed: Condvar::new(),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            wakeup: Wakeup {
                woken: Mutex::new(false),
                cond: Condvar::new(),
            },
        });
        router.attach(Arc::downgrade(&inner));
        Ok(Session { inner })
    }

    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Session {
        Session { inner }
    }

    pub(crate) fn lib(&self) -> &Arc<dyn NativeLib> {
        &self.inner.lib
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.inner.handle.raw()
    }

    // -- lifecycle -----------------------------------------------------------

    /// Issue a login. Non-blocking; completion arrives through the
    /// [`SessionListener::logged_in`] callback.
    ///
    /// The transitional state is entered before the native call: the
    /// confirming callback may fire on the event-loop thread before this
    /// method returns.
    pub fn login(&self, username: &str, password: &str, remember_me: bool) -> Result<()> {
        self.transition(SessionState::LoggingIn, |lib, raw| {
            lib.session_login(raw, username, password, remember_me, None)
        })
    }

    /// Login with a stored credentials blob instead of a password.
    pub fn login_with_blob(&self, username: &str, blob: &str, remember_me: bool) -> Result<()> {
        self.transition(SessionState::LoggingIn, |lib, raw| {
            lib.session_login(raw, username, "", remember_me, Some(blob))
        })
    }

    /// Log in as the remembered user.
    pub fn relogin(&self) -> Result<()> {
        match self.transition(SessionState::LoggingIn, |lib, raw| lib.session_relogin(raw)) {
            Err(Error::Library(LibError::NoCredentials)) => Err(Error::NoStoredCredentials),
            other => other,
        }
    }

    /// Issue a logout. Non-blocking; completion arrives through
    /// [`SessionListener::logged_out`].
    pub fn logout(&self) -> Result<()> {
        self.transition(SessionState::LoggingOut, |lib, raw| lib.session_logout(raw))
    }

    /// Enter `pending` before issuing the native call, so the confirming
    /// callback can never be outrun, and fall back to the previous state if
    /// the call itself is rejected.
    fn transition(
        &self,
        pending: SessionState,
        call: impl FnOnce(&dyn NativeLib, RawHandle) -> sp_error,
    ) -> Result<()> {
        let previous = self.state();
        self.inner.set_state(pending);
        let result = {
            let _guard = serialized::native_call();
            check(call(self.inner.lib.as_ref(), self.raw()))
        };
        if result.is_err() {
            self.inner.set_state(previous);
        }
        result
    }

    /// Forget the remembered user.
    pub fn forget_me(&self) -> Result<()> {
        let _guard = serialized::native_call();
        check(self.inner.lib.session_forget_me(self.raw()))
    }

    /// Name of the remembered user, if any.
    pub fn remembered_user_name(&self) -> Option<String> {
        let _guard = serialized::native_call();
        let needed = self.inner.lib.session_remembered_user(self.raw(), &mut []);
        if needed < 0 {
            return None;
        }
        let mut buffer = vec![0u8; needed as usize + 1];
        let len = self.inner.lib.session_remembered_user(self.raw(), &mut buffer) as usize;
        buffer.truncate(len.min(needed as usize + 1));
        Some(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// Block until the session reaches `target` or `timeout` elapses.
    pub fn wait_for_state(&self, target: SessionState, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while *state != target {
            if self
                .inner
                .state_changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                if *state == target {
                    break;
                }
                return Err(Error::Timeout(timeout));
            }
        }
        Ok(())
    }

    pub fn connection_state(&self) -> ConnectionState {
        let raw = {
            let _guard = serialized::native_call();
            self.inner.lib.session_connection_state(self.raw())
        };
        ConnectionState::try_from(raw).unwrap_or_else(|unknown| {
            tracing::warn!(%unknown, "unknown connection state from native library");
            ConnectionState::Undefined
        })
    }

    /// The logged-in user, once the login completed.
    pub fn user(&self) -> Result<Option<User>> {
        let raw = {
            let _guard = serialized::native_call();
            self.inner.lib.session_user(self.raw())
        };
        if raw.is_null() {
            return Ok(None);
        }
        User::from_raw(self, raw, true).map(Some)
    }

    /// Canonical name of the logged-in user, or `None` while logged out.
    pub fn user_name(&self) -> Option<String> {
        let _guard = serialized::native_call();
        util::non_empty(self.inner.lib.session_user_name(self.raw()))
    }

    // -- processing ----------------------------------------------------------

    /// Drive the native library once; returns the recommended delay before
    /// the next call. Normally invoked by the [`crate::EventLoop`] thread and
    /// by blocking `load` loops.
    pub fn process_events(&self) -> Result<Duration> {
        let next = {
            let _guard = serialized::native_call();
            self.inner.lib.session_process_events(self.raw())
        }
        .map_err(lib_error)?;
        Ok(Duration::from_millis(u64::from(next)))
    }

    /// Wake the event loop as if the native library had asked for it.
    pub(crate) fn wake_event_loop(&self) {
        self.inner.wake();
    }

    /// Park the calling thread until new work is signaled or `timeout`
    /// elapses. Used by the event loop between processing cycles.
    pub(crate) fn wait_for_work(&self, timeout: Duration) {
        let mut woken = self.inner.wakeup.woken.lock();
        if !*woken {
            let _ = self.inner.wakeup.cond.wait_for(&mut woken, timeout);
        }
        *woken = false;
    }

    // -- listeners -----------------------------------------------------------

    /// Register a listener; returns an id usable with `remove_listener`.
    /// Listeners fire in registration order.
    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) -> u64 {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: u64) {
        self.inner.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    // -- factories -----------------------------------------------------------

    pub fn get_link(&self, uri: &str) -> Result<Link> {
        Link::from_uri(self, uri)
    }

    pub fn get_track(&self, uri: &str) -> Result<Track> {
        self.get_link(uri)?
            .as_track()?
            .ok_or_else(|| Error::InvalidUri(uri.to_owned()))
    }

    pub fn get_album(&self, uri: &str) -> Result<crate::album::Album> {
        self.get_link(uri)?
            .as_album()?
            .ok_or_else(|| Error::InvalidUri(uri.to_owned()))
    }

    pub fn get_artist(&self, uri: &str) -> Result<crate::artist::Artist> {
        self.get_link(uri)?
            .as_artist()?
            .ok_or_else(|| Error::InvalidUri(uri.to_owned()))
    }

    pub fn get_user(&self, uri: &str) -> Result<User> {
        self.get_link(uri)?
            .as_user()?
            .ok_or_else(|| Error::InvalidUri(uri.to_owned()))
    }

    pub fn get_playlist(&self, uri: &str) -> Result<Playlist> {
        self.get_link(uri)?
            .as_playlist()?
            .ok_or_else(|| Error::InvalidUri(uri.to_owned()))
    }

    pub fn get_image(&self, uri: &str) -> Result<crate::image::Image> {
        self.get_link(uri)?
            .as_image()?
            .ok_or_else(|| Error::InvalidUri(uri.to_owned()))
    }

    /// Issue an asynchronous search; returns immediately with a pending
    /// [`SearchResult`].
    pub fn search(&self, query: &str) -> Result<SearchResult> {
        SearchResult::create(self, query, None)
    }

    /// Like [`Session::search`], with a completion callback invoked exactly
    /// once from the event-loop thread.
    pub fn search_with_callback(
        &self,
        query: &str,
        callback: impl FnOnce(&SearchResult) + Send + 'static,
    ) -> Result<SearchResult> {
        SearchResult::create(self, query, Some(Box::new(callback)))
    }

    /// Issue an asynchronous browse of an album's track list.
    pub fn browse_album(
        &self,
        album: &crate::album::Album,
        callback: Option<crate::browse::BrowseCallback<crate::browse::AlbumBrowser>>,
    ) -> Result<crate::browse::AlbumBrowser> {
        crate::browse::AlbumBrowser::create(self, album, callback)
    }

    /// Issue an asynchronous browse of an artist's catalogue.
    pub fn browse_artist(
        &self,
        artist: &crate::artist::Artist,
        callback: Option<crate::browse::BrowseCallback<crate::browse::ArtistBrowser>>,
    ) -> Result<crate::browse::ArtistBrowser> {
        crate::browse::ArtistBrowser::create(self, artist, callback)
    }

    /// The playlist of starred tracks.
    pub fn get_starred(&self) -> Result<Playlist> {
        let raw = {
            let _guard = serialized::native_call();
            self.inner.lib.session_starred_create(self.raw())
        };
        if raw.is_null() {
            return Err(Error::InvalidHandle);
        }
        Playlist::cached(self, raw, false)
    }

    /// The root container of the user's playlists.
    pub fn playlist_container(&self) -> Result<PlaylistContainer> {
        let raw = {
            let _guard = serialized::native_call();
            self.inner.lib.session_playlist_container(self.raw())
        };
        if raw.is_null() {
            return Err(Error::InvalidHandle);
        }
        PlaylistContainer::cached(self, raw, true)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SessionInner {
    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
        self.state_changed.notify_all();
    }

    fn wake(&self) {
        let mut woken = self.wakeup.woken.lock();
        *woken = true;
        self.wakeup.cond.notify_all();
    }

    /// Invoke `f` for every registered listener, in registration order,
    /// isolating panics so one failing listener cannot starve the rest.
    fn for_each_listener(self: &Arc<Self>, f: impl Fn(&dyn SessionListener, &Session)) {
        let session = Session::from_inner(Arc::clone(self));
        let listeners: Vec<Arc<dyn SessionListener>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            let result = catch_unwind(AssertUnwindSafe(|| f(listener.as_ref(), &session)));
            if let Err(payload) = result {
                tracing::error!(
                    panic = panic_message(&payload),
                    "session listener panicked during dispatch"
                );
            }
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

fn status(code: sp_error) -> std::result::Result<(), LibError> {
    match LibError::from_code(code) {
        None => Ok(()),
        Some(error) => Err(error),
    }
}

/// Receives native callbacks and routes them into the owning session.
///
/// Holds only a weak reference: callbacks arriving while the session is
/// tearing down are dropped instead of resurrecting it.
#[derive(Default)]
struct CallbackRouter {
    inner: OnceLock<Weak<SessionInner>>,
}

impl CallbackRouter {
    fn attach(&self, inner: Weak<SessionInner>) {
        let _ = self.inner.set(inner);
    }

    fn session(&self) -> Option<Arc<SessionInner>> {
        self.inner.get()?.upgrade()
    }
}

impl NativeCallbacks for CallbackRouter {
    fn notify_main_thread(&self) {
        if let Some(inner) = self.session() {
            inner.wake();
            inner.for_each_listener(|listener, session| listener.notify_main_thread(session));
        }
    }

    fn logged_in(&self, error: sp_error) {
        if let Some(inner) = self.session() {
            let result = status(error);
            inner.set_state(if result.is_ok() {
                SessionState::LoggedIn
            } else {
                SessionState::LoggedOut
            });
            inner.for_each_listener(|listener, session| listener.logged_in(session, result));
        }
    }

    fn logged_out(&self) {
        if let Some(inner) = self.session() {
            inner.set_state(SessionState::LoggedOut);
            inner.for_each_listener(|listener, session| listener.logged_out(session));
        }
    }

    fn metadata_updated(&self) {
        if let Some(inner) = self.session() {
            inner.for_each_listener(|listener, session| listener.metadata_updated(session));
        }
    }

    fn connection_error(&self, error: sp_error) {
        if let Some(inner) = self.session() {
            let result = status(error);
            inner.for_each_listener(|listener, session| {
                listener.connection_error(session, result)
            });
        }
    }

    fn message_to_user(&self, message: &str) {
        if let Some(inner) = self.session() {
            inner.for_each_listener(|listener, session| {
                listener.message_to_user(session, message)
            });
        }
    }

    fn log_message(&self, message: &str) {
        tracing::debug!(target: "respot::native", "{}", message.trim_end());
        if let Some(inner) = self.session() {
            inner.for_each_listener(|listener, session| listener.log_message(session, message));
        }
    }

    fn music_delivery(&self, format: sp_audioformat, frames: &[u8], num_frames: usize) -> usize {
        let Some(inner) = self.session() else {
            return 0;
        };
        let session = Session::from_inner(Arc::clone(&inner));
        let listeners: Vec<Arc<dyn SessionListener>> = inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        let format = AudioFormat::from(format);
        let mut consumed = 0;
        for listener in listeners {
            let result = catch_unwind(AssertUnwindSafe(|| {
                listener.music_delivery(&session, format, frames, num_frames)
            }));
            match result {
                Ok(frames_taken) => consumed = consumed.max(frames_taken),
                Err(payload) => tracing::error!(
                    panic = panic_message(&payload),
                    "music delivery listener panicked"
                ),
            }
        }
        consumed
    }

    fn play_token_lost(&self) {
        if let Some(inner) = self.session() {
            inner.for_each_listener(|listener, session| listener.play_token_lost(session));
        }
    }

    fn end_of_track(&self) {
        if let Some(inner) = self.session() {
            inner.for_each_listener(|listener, session| listener.end_of_track(session));
        }
    }

    fn credentials_blob_updated(&self, blob: &str) {
        if let Some(inner) = self.session() {
            inner.for_each_listener(|listener, session| {
                listener.credentials_blob_updated(session, blob)
            });
        }
    }

    fn connection_state_updated(&self) {
        if let Some(inner) = self.session() {
            inner.for_each_listener(|listener, session| {
                listener.connection_state_updated(session)
            });
        }
    }

    fn scrobble_error(&self, error: sp_error) {
        if let Some(inner) = self.session() {
            if let Some(error) = LibError::from_code(error) {
                inner.for_each_listener(|listener, session| {
                    listener.scrobble_error(session, error)
                });
            }
        }
    }

    fn private_session_mode_changed(&self, is_private: bool) {
        if let Some(inner) = self.session() {
            inner.for_each_listener(|listener, session| {
                listener.private_session_mode_changed(session, is_private)
            });
        }
    }

    fn browse_complete(&self, token: u64, error: sp_error) {
        browse::complete(token, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use respot_core::ffi;
    use respot_core::mock::{MockEvent, MockLib};
    use std::sync::Mutex as StdMutex;

    fn new_session() -> (Arc<MockLib>, Session) {
        let mock = Arc::new(MockLib::new());
        let session = Session::new(
            Arc::clone(&mock) as Arc<dyn NativeLib>,
            &SessionConfig::default(),
        )
        .expect("session");
        (mock, session)
    }

    #[derive(Default)]
    struct Recorder {
        events: StdMutex<Vec<String>>,
    }

    impl Recorder {
        fn record(&self, event: impl Into<String>) {
            self.events.lock().unwrap().push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl SessionListener for Recorder {
        fn logged_in(&self, _session: &Session, result: std::result::Result<(), LibError>) {
            self.record(match result {
                Ok(()) => "logged_in:ok".to_owned(),
                Err(error) => format!("logged_in:{error}"),
            });
        }

        fn logged_out(&self, _session: &Session) {
            self.record("logged_out");
        }

        fn message_to_user(&self, _session: &Session, message: &str) {
            self.record(format!("message:{message}"));
        }

        fn play_token_lost(&self, _session: &Session) {
            self.record("play_token_lost");
        }

        fn end_of_track(&self, _session: &Session) {
            self.record("end_of_track");
        }
    }

    #[test]
    fn login_moves_state_only_when_callback_confirms() {
        let (_, session) = new_session();
        let recorder = Arc::new(Recorder::default());
        session.add_listener(Arc::clone(&recorder) as Arc<dyn SessionListener>);

        session.login("alice", "secret", false).unwrap();
        assert_eq!(session.state(), SessionState::LoggingIn);

        session.process_events().unwrap();
        assert_eq!(session.state(), SessionState::LoggedIn);
        assert_eq!(recorder.events(), vec!["logged_in:ok"]);
        assert_eq!(session.connection_state(), ConnectionState::LoggedIn);
    }

    #[test]
    fn failed_login_returns_to_logged_out() {
        let (mock, session) = new_session();
        let recorder = Arc::new(Recorder::default());
        session.add_listener(Arc::clone(&recorder) as Arc<dyn SessionListener>);

        mock.fail_next_login(ffi::SP_ERROR_BAD_USERNAME_OR_PASSWORD);
        session.login("alice", "nope", false).unwrap();
        session.process_events().unwrap();

        assert_eq!(session.state(), SessionState::LoggedOut);
        assert_eq!(recorder.events(), vec!["logged_in:bad username or password"]);
    }

    #[test]
    fn logout_round_trip() {
        let (_, session) = new_session();
        session.login("alice", "secret", false).unwrap();
        session.process_events().unwrap();

        session.logout().unwrap();
        assert_eq!(session.state(), SessionState::LoggingOut);
        session.process_events().unwrap();
        assert_eq!(session.state(), SessionState::LoggedOut);
    }

    #[test]
    fn relogin_requires_stored_credentials() {
        let (mock, session) = new_session();
        assert!(matches!(
            session.relogin(),
            Err(Error::NoStoredCredentials)
        ));

        mock.set_remembered_user("alice");
        session.relogin().unwrap();
        session.process_events().unwrap();
        assert_eq!(session.state(), SessionState::LoggedIn);
        assert_eq!(session.remembered_user_name().as_deref(), Some("alice"));
    }

    #[test]
    fn remember_me_persists_user_and_forget_me_clears_it() {
        let (_, session) = new_session();
        session.login("alice", "secret", true).unwrap();
        session.process_events().unwrap();
        assert_eq!(session.remembered_user_name().as_deref(), Some("alice"));

        session.forget_me().unwrap();
        assert_eq!(session.remembered_user_name(), None);
    }

    #[test]
    fn logged_in_user_is_exposed() {
        let (_, session) = new_session();
        assert!(session.user().unwrap().is_none());
        assert_eq!(session.user_name(), None);
        session.login("alice", "secret", false).unwrap();
        session.process_events().unwrap();
        let user = session.user().unwrap().expect("logged-in user");
        assert_eq!(user.canonical_name().as_deref(), Some("alice"));
        assert_eq!(session.user_name().as_deref(), Some("alice"));
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let (mock, session) = new_session();
        let order = Arc::new(StdMutex::new(Vec::new()));

        struct Tagged {
            tag: &'static str,
            order: Arc<StdMutex<Vec<&'static str>>>,
        }
        impl SessionListener for Tagged {
            fn message_to_user(&self, _session: &Session, _message: &str) {
                self.order.lock().unwrap().push(self.tag);
            }
        }

        session.add_listener(Arc::new(Tagged {
            tag: "first",
            order: Arc::clone(&order),
        }));
        session.add_listener(Arc::new(Tagged {
            tag: "second",
            order: Arc::clone(&order),
        }));

        mock.push_event(MockEvent::MessageToUser("hello".into()));
        session.process_events().unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn panicking_listener_does_not_stop_dispatch() {
        let (mock, session) = new_session();

        struct Panicker;
        impl SessionListener for Panicker {
            fn message_to_user(&self, _session: &Session, _message: &str) {
                panic!("listener bug");
            }
        }

        let recorder = Arc::new(Recorder::default());
        session.add_listener(Arc::new(Panicker));
        session.add_listener(Arc::clone(&recorder) as Arc<dyn SessionListener>);

        mock.push_event(MockEvent::MessageToUser("still delivered".into()));
        session.process_events().unwrap();
        assert_eq!(recorder.events(), vec!["message:still delivered"]);
    }

    #[test]
    fn removed_listener_no_longer_fires() {
        let (mock, session) = new_session();
        let recorder = Arc::new(Recorder::default());
        let id = session.add_listener(Arc::clone(&recorder) as Arc<dyn SessionListener>);
        session.remove_listener(id);

        mock.push_event(MockEvent::PlayTokenLost);
        session.process_events().unwrap();
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn music_delivery_returns_largest_consumed_count() {
        let (mock, session) = new_session();

        struct Consumer(usize);
        impl SessionListener for Consumer {
            fn music_delivery(
                &self,
                _session: &Session,
                _format: AudioFormat,
                _frames: &[u8],
                _num_frames: usize,
            ) -> usize {
                self.0
            }
        }

        session.add_listener(Arc::new(Consumer(10)));
        session.add_listener(Arc::new(Consumer(40)));

        let format = sp_audioformat {
            sample_type: 0,
            sample_rate: 44_100,
            channels: 2,
        };
        let consumed = mock.deliver_music(format, &[0u8; 16], 4);
        assert_eq!(consumed, 40);
    }

    #[test]
    fn wait_for_state_times_out_without_progress() {
        let (_, session) = new_session();
        let error = session
            .wait_for_state(SessionState::LoggedIn, Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(error, Error::Timeout(_)));
    }

    #[test]
    fn session_config_serde_round_trip() {
        let config = SessionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.user_agent, config.user_agent);
        assert_eq!(back.cache_location, config.cache_location);
    }
}
