//! In-memory stand-in for the native library.
//!
//! Implements [`NativeLib`] over a synthetic handle table so the binding and
//! its test suites can run without the native binary. The mock follows the
//! documented contract closely: creation calls return owned handles,
//! accessors return borrowed handles and sentinel values on unloaded
//! objects, asynchronous requests complete during a later
//! `session_process_events` call, and `notify_main_thread` fires whenever
//! work is queued.
//!
//! One session per mock instance; tests construct a fresh mock each.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::capi::{NativeCallbacks, NativeConfig, NativeLib, ObjectKind, RawHandle};
use crate::ffi::{
    self, SP_ERROR_INVALID_INDATA, SP_ERROR_NO_CREDENTIALS, SP_ERROR_OK, sp_audioformat,
    sp_connectionstate, sp_error, sp_linktype,
};

/// Events a test can inject; delivered to the sink on the next
/// `session_process_events` call, like the native library would.
#[derive(Debug, Clone)]
pub enum MockEvent {
    ConnectionError(sp_error),
    MessageToUser(String),
    LogMessage(String),
    PlayTokenLost,
    EndOfTrack,
    CredentialsBlobUpdated(String),
    ConnectionStateUpdated,
    ScrobbleError(sp_error),
    PrivateSessionModeChanged(bool),
    MetadataUpdated,
    MusicDelivery {
        format: sp_audioformat,
        frames: Vec<u8>,
        num_frames: usize,
    },
}

/// Canned results for a search query.
#[derive(Debug, Clone, Default)]
pub struct SearchFixture {
    pub track_uris: Vec<String>,
    pub album_uris: Vec<String>,
    pub artist_uris: Vec<String>,
    pub playlist_names: Vec<String>,
    pub total_tracks: i32,
    pub total_albums: i32,
    pub total_artists: i32,
    pub total_playlists: i32,
}

#[derive(Debug)]
struct MockObject {
    kind: ObjectKind,
    refcount: usize,
    loaded: bool,
    loads_after: Option<u32>,
    error: sp_error,
    name: String,
    display_name: String,
    uri: String,
    link_type: sp_linktype,
    offset_ms: u32,
    duration_ms: i32,
    year: i32,
    album_type: i32,
    available: bool,
    artists: Vec<usize>,
    albums: Vec<usize>,
    album: Option<usize>,
    /// Child handles: browse/search/playlist tracks, or container playlists.
    children: Vec<usize>,
    copyrights: Vec<String>,
    review: String,
    playlist_names: Vec<String>,
    totals: [i32; 4],
    query: String,
    image_data: Vec<u8>,
    image_format: i32,
    // per-index playlist track metadata
    create_times: Vec<i64>,
    creators: Vec<usize>,
    seen: Vec<bool>,
    messages: Vec<String>,
}

impl MockObject {
    fn new(kind: ObjectKind) -> Self {
        MockObject {
            kind,
            refcount: 1,
            loaded: false,
            loads_after: None,
            error: SP_ERROR_OK,
            name: String::new(),
            display_name: String::new(),
            uri: String::new(),
            link_type: ffi::SP_LINKTYPE_INVALID,
            offset_ms: 0,
            duration_ms: 0,
            year: 0,
            album_type: ffi::SP_ALBUMTYPE_UNKNOWN,
            available: false,
            artists: Vec::new(),
            albums: Vec::new(),
            album: None,
            children: Vec::new(),
            copyrights: Vec::new(),
            review: String::new(),
            playlist_names: Vec::new(),
            totals: [0; 4],
            query: String::new(),
            image_data: Vec::new(),
            image_format: 0,
            create_times: Vec::new(),
            creators: Vec::new(),
            seen: Vec::new(),
            messages: Vec::new(),
        }
    }
}

enum Action {
    Login {
        username: String,
        remember: bool,
        error: sp_error,
    },
    Logout,
    CompleteBrowse {
        token: u64,
        handle: usize,
    },
    Event(MockEvent),
}

#[derive(Default)]
struct State {
    next_addr: usize,
    objects: HashMap<usize, MockObject>,
    targets: HashMap<String, usize>,
    counters: HashMap<usize, (u64, u64)>,
    sink: Option<Arc<dyn NativeCallbacks>>,
    container: Option<usize>,
    starred: Option<usize>,
    current_user: Option<usize>,
    remembered_user: Option<String>,
    connection_state: sp_connectionstate,
    pending: VecDeque<Action>,
    searches: HashMap<String, SearchFixture>,
    next_login_error: Option<sp_error>,
    next_timeout_ms: u32,
    process_calls: u64,
}

/// The mock native library.
pub struct MockLib {
    state: Mutex<State>,
}

impl Default for MockLib {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLib {
    pub fn new() -> Self {
        MockLib {
            state: Mutex::new(State {
                next_addr: 0x1000,
                connection_state: ffi::SP_CONNECTION_STATE_LOGGED_OUT,
                next_timeout_ms: 100,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------
    // Test fixtures and probes
    // ------------------------------------------------------------------

    /// Allocate a bare object with a reference count of one, as a native
    /// `create` call would. Used by low-level handle tests.
    pub fn alloc_object(&self, kind: ObjectKind) -> RawHandle {
        let mut state = self.lock();
        let addr = alloc(&mut state, kind);
        RawHandle::from_addr(addr)
    }

    /// Current native reference count, or `None` once the object died.
    pub fn refcount(&self, handle: RawHandle) -> Option<usize> {
        self.lock().objects.get(&handle.addr()).map(|o| o.refcount)
    }

    pub fn object_exists(&self, handle: RawHandle) -> bool {
        self.lock().objects.contains_key(&handle.addr())
    }

    /// Total `add_ref` calls observed for the handle, surviving object death.
    pub fn add_ref_calls(&self, handle: RawHandle) -> u64 {
        self.lock().counters.get(&handle.addr()).map_or(0, |c| c.0)
    }

    /// Total `release` calls observed for the handle, surviving object death.
    pub fn release_calls(&self, handle: RawHandle) -> u64 {
        self.lock().counters.get(&handle.addr()).map_or(0, |c| c.1)
    }

    /// Handle of the target object registered for a URI, if it exists.
    pub fn handle_for(&self, uri: &str) -> Option<RawHandle> {
        self.lock()
            .targets
            .get(uri)
            .copied()
            .map(RawHandle::from_addr)
    }

    pub fn process_calls(&self) -> u64 {
        self.lock().process_calls
    }

    /// Delay in milliseconds reported by subsequent `session_process_events`.
    pub fn set_next_timeout(&self, ms: u32) {
        self.lock().next_timeout_ms = ms;
    }

    pub fn set_remembered_user(&self, name: &str) {
        self.lock().remembered_user = Some(name.to_owned());
    }

    /// Make the next login fail with the given status code.
    pub fn fail_next_login(&self, error: sp_error) {
        self.lock().next_login_error = Some(error);
    }

    /// Queue a session-level event for delivery on the next processing call.
    pub fn push_event(&self, event: MockEvent) {
        self.queue_and_notify(Action::Event(event));
    }

    /// Deliver audio frames synchronously, the way the native library calls
    /// `music_delivery` from its own I/O thread. Returns the frames-consumed
    /// count reported by the sink.
    pub fn deliver_music(&self, format: sp_audioformat, frames: &[u8], num_frames: usize) -> usize {
        let sink = self.lock().sink.clone();
        match sink {
            Some(sink) => sink.music_delivery(format, frames, num_frames),
            None => 0,
        }
    }

    /// Register a fully-loaded track target.
    pub fn set_track(&self, uri: &str, name: &str, duration_ms: i32, artist_uris: &[&str]) {
        let mut state = self.lock();
        let artists: Vec<usize> = artist_uris
            .iter()
            .map(|a| target(&mut state, a, ObjectKind::Artist))
            .collect();
        let addr = target(&mut state, uri, ObjectKind::Track);
        let object = state.objects.get_mut(&addr).expect("track target");
        object.name = name.to_owned();
        object.duration_ms = duration_ms;
        object.artists = artists;
        object.loaded = true;
    }

    pub fn set_album(&self, uri: &str, name: &str, year: i32, artist_uri: &str) {
        let mut state = self.lock();
        let artist = target(&mut state, artist_uri, ObjectKind::Artist);
        let addr = target(&mut state, uri, ObjectKind::Album);
        let object = state.objects.get_mut(&addr).expect("album target");
        object.name = name.to_owned();
        object.year = year;
        object.album_type = ffi::SP_ALBUMTYPE_ALBUM;
        object.available = true;
        object.artists = vec![artist];
        object.loaded = true;
    }

    pub fn set_artist(&self, uri: &str, name: &str) {
        let mut state = self.lock();
        let addr = target(&mut state, uri, ObjectKind::Artist);
        let object = state.objects.get_mut(&addr).expect("artist target");
        object.name = name.to_owned();
        object.loaded = true;
    }

    pub fn set_user(&self, uri: &str, canonical: &str, display: &str) {
        let mut state = self.lock();
        let addr = target(&mut state, uri, ObjectKind::User);
        let object = state.objects.get_mut(&addr).expect("user target");
        object.name = canonical.to_owned();
        object.display_name = display.to_owned();
        object.loaded = true;
    }

    pub fn set_playlist(&self, uri: &str, name: &str, track_uris: &[&str]) {
        let mut state = self.lock();
        let tracks: Vec<usize> = track_uris
            .iter()
            .map(|t| target(&mut state, t, ObjectKind::Track))
            .collect();
        let count = tracks.len();
        let addr = target(&mut state, uri, ObjectKind::Playlist);
        let object = state.objects.get_mut(&addr).expect("playlist target");
        object.name = name.to_owned();
        object.children = tracks;
        object.create_times = vec![1_234_567_890; count];
        object.creators = vec![0; count];
        object.seen = vec![false; count];
        object.messages = vec![String::new(); count];
        object.loaded = true;
    }

    pub fn set_playlist_track_creator(&self, playlist_uri: &str, index: usize, user_uri: &str) {
        let mut state = self.lock();
        let user = target(&mut state, user_uri, ObjectKind::User);
        let addr = target(&mut state, playlist_uri, ObjectKind::Playlist);
        let object = state.objects.get_mut(&addr).expect("playlist target");
        if index < object.creators.len() {
            object.creators[index] = user;
        }
    }

    pub fn set_container(&self, playlist_uris: &[&str]) {
        let mut state = self.lock();
        let playlists: Vec<usize> = playlist_uris
            .iter()
            .map(|p| target(&mut state, p, ObjectKind::Playlist))
            .collect();
        let addr = match state.container {
            Some(addr) => addr,
            None => {
                let addr = alloc(&mut state, ObjectKind::PlaylistContainer);
                state.container = Some(addr);
                addr
            }
        };
        let object = state.objects.get_mut(&addr).expect("container");
        object.children = playlists;
        object.loaded = true;
    }

    pub fn set_album_browse(&self, album_uri: &str, track_uris: &[&str], review: &str) {
        let mut state = self.lock();
        let tracks: Vec<usize> = track_uris
            .iter()
            .map(|t| target(&mut state, t, ObjectKind::Track))
            .collect();
        let addr = target(&mut state, album_uri, ObjectKind::Album);
        let object = state.objects.get_mut(&addr).expect("album target");
        object.children = tracks;
        object.review = review.to_owned();
        object.copyrights = vec!["Mock Records".to_owned()];
    }

    pub fn set_artist_browse(&self, artist_uri: &str, track_uris: &[&str]) {
        let mut state = self.lock();
        let tracks: Vec<usize> = track_uris
            .iter()
            .map(|t| target(&mut state, t, ObjectKind::Track))
            .collect();
        let addr = target(&mut state, artist_uri, ObjectKind::Artist);
        state.objects.get_mut(&addr).expect("artist target").children = tracks;
    }

    pub fn expect_search(&self, query: &str, fixture: SearchFixture) {
        self.lock().searches.insert(query.to_owned(), fixture);
    }

    pub fn set_image(&self, uri: &str, format: i32, data: &[u8]) {
        let mut state = self.lock();
        let addr = target(&mut state, uri, ObjectKind::Image);
        let object = state.objects.get_mut(&addr).expect("image target");
        object.image_format = format;
        object.image_data = data.to_vec();
    }

    /// Mark a URI target loaded after `calls` further processing rounds.
    pub fn loads_after(&self, uri: &str, kind: ObjectKind, calls: u32) {
        let mut state = self.lock();
        let addr = target(&mut state, uri, kind);
        state.objects.get_mut(&addr).expect("target").loads_after = Some(calls);
    }

    /// Put a URI target into the error state reported by `error_state`.
    pub fn set_error(&self, uri: &str, kind: ObjectKind, error: sp_error) {
        let mut state = self.lock();
        let addr = target(&mut state, uri, kind);
        state.objects.get_mut(&addr).expect("target").error = error;
    }

    pub fn mark_loaded(&self, uri: &str) {
        let mut state = self.lock();
        if let Some(&addr) = state.targets.get(uri) {
            state.objects.get_mut(&addr).expect("target").loaded = true;
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn queue_and_notify(&self, action: Action) {
        let sink = {
            let mut state = self.lock();
            state.pending.push_back(action);
            state.sink.clone()
        };
        if let Some(sink) = sink {
            sink.notify_main_thread();
        }
    }

    fn apply(&self, action: Action, sink: &Arc<dyn NativeCallbacks>) {
        match action {
            Action::Login {
                username,
                remember,
                error,
            } => {
                if error == SP_ERROR_OK {
                    let mut state = self.lock();
                    let uri = format!("spotify:user:{username}");
                    let user = target(&mut state, &uri, ObjectKind::User);
                    let object = state.objects.get_mut(&user).expect("user target");
                    if object.name.is_empty() {
                        object.name = username.clone();
                    }
                    object.loaded = true;
                    state.current_user = Some(user);
                    state.connection_state = ffi::SP_CONNECTION_STATE_LOGGED_IN;
                    if remember {
                        state.remembered_user = Some(username);
                    }
                }
                sink.logged_in(error);
                sink.connection_state_updated();
            }
            Action::Logout => {
                {
                    let mut state = self.lock();
                    state.current_user = None;
                    state.connection_state = ffi::SP_CONNECTION_STATE_LOGGED_OUT;
                }
                sink.logged_out();
                sink.connection_state_updated();
            }
            Action::CompleteBrowse { token, handle } => {
                let error = {
                    let mut state = self.lock();
                    match state.objects.get_mut(&handle) {
                        Some(object) => {
                            object.loaded = true;
                            object.error
                        }
                        None => SP_ERROR_OK,
                    }
                };
                sink.browse_complete(token, error);
            }
            Action::Event(event) => match event {
                MockEvent::ConnectionError(code) => sink.connection_error(code),
                MockEvent::MessageToUser(msg) => sink.message_to_user(&msg),
                MockEvent::LogMessage(msg) => sink.log_message(&msg),
                MockEvent::PlayTokenLost => sink.play_token_lost(),
                MockEvent::EndOfTrack => sink.end_of_track(),
                MockEvent::CredentialsBlobUpdated(blob) => sink.credentials_blob_updated(&blob),
                MockEvent::ConnectionStateUpdated => sink.connection_state_updated(),
                MockEvent::ScrobbleError(code) => sink.scrobble_error(code),
                MockEvent::PrivateSessionModeChanged(private) => {
                    sink.private_session_mode_changed(private)
                }
                MockEvent::MetadataUpdated => sink.metadata_updated(),
                MockEvent::MusicDelivery {
                    format,
                    frames,
                    num_frames,
                } => {
                    sink.music_delivery(format, &frames, num_frames);
                }
            },
        }
    }

    fn attr<T: Default>(
        &self,
        handle: RawHandle,
        kind: ObjectKind,
        f: impl FnOnce(&MockObject) -> T,
    ) -> T {
        let state = self.lock();
        match state.objects.get(&handle.addr()) {
            Some(object) if object.kind == kind => f(object),
            _ => T::default(),
        }
    }

    fn indexed_handle(
        &self,
        handle: RawHandle,
        kind: ObjectKind,
        f: fn(&MockObject) -> &Vec<usize>,
        index: i32,
    ) -> RawHandle {
        if index < 0 {
            return RawHandle::NULL;
        }
        let state = self.lock();
        match state.objects.get(&handle.addr()) {
            Some(object) if object.kind == kind => f(object)
                .get(index as usize)
                .copied()
                .map_or(RawHandle::NULL, RawHandle::from_addr),
            _ => RawHandle::NULL,
        }
    }

    fn link_from_object(
        &self,
        handle: RawHandle,
        kind: ObjectKind,
        link_type: sp_linktype,
    ) -> RawHandle {
        let mut state = self.lock();
        let uri = match state.objects.get(&handle.addr()) {
            Some(object) if object.kind == kind && !object.uri.is_empty() => object.uri.clone(),
            _ => return RawHandle::NULL,
        };
        let addr = alloc(&mut state, ObjectKind::Link);
        let object = state.objects.get_mut(&addr).expect("fresh link");
        object.uri = uri;
        object.link_type = link_type;
        object.loaded = true;
        RawHandle::from_addr(addr)
    }

    fn link_target(&self, link: RawHandle, expected: sp_linktype, kind: ObjectKind) -> RawHandle {
        let mut state = self.lock();
        let uri = match state.objects.get(&link.addr()) {
            Some(object) if object.kind == ObjectKind::Link && object.link_type == expected => {
                // Targets are keyed without the offset fragment.
                match object.uri.split_once('#') {
                    Some((base, _)) => base.to_owned(),
                    None => object.uri.clone(),
                }
            }
            _ => return RawHandle::NULL,
        };
        RawHandle::from_addr(target(&mut state, &uri, kind))
    }
}

fn alloc(state: &mut State, kind: ObjectKind) -> usize {
    let addr = state.next_addr;
    state.next_addr += 0x10;
    state.objects.insert(addr, MockObject::new(kind));
    addr
}

/// Get or create the long-lived target object for a URI. Targets carry one
/// internal reference representing the library's own bookkeeping, so they
/// outlive wrapper acquire/release cycles.
fn target(state: &mut State, uri: &str, kind: ObjectKind) -> usize {
    if let Some(&addr) = state.targets.get(uri) {
        return addr;
    }
    let addr = alloc(state, kind);
    let object = state.objects.get_mut(&addr).expect("fresh target");
    object.uri = uri.to_owned();
    state.targets.insert(uri.to_owned(), addr);
    addr
}

fn uri_link_type(uri: &str) -> sp_linktype {
    let mut parts = uri.splitn(3, ':');
    if parts.next() != Some("spotify") {
        return ffi::SP_LINKTYPE_INVALID;
    }
    let kind = match parts.next() {
        Some(kind) => kind,
        None => return ffi::SP_LINKTYPE_INVALID,
    };
    if parts.next().is_none_or(str::is_empty) {
        return ffi::SP_LINKTYPE_INVALID;
    }
    match kind {
        "track" => ffi::SP_LINKTYPE_TRACK,
        "local" => ffi::SP_LINKTYPE_LOCALTRACK,
        "album" => ffi::SP_LINKTYPE_ALBUM,
        "artist" => ffi::SP_LINKTYPE_ARTIST,
        "search" => ffi::SP_LINKTYPE_SEARCH,
        "image" => ffi::SP_LINKTYPE_IMAGE,
        "user" => {
            if uri.ends_with(":starred") {
                ffi::SP_LINKTYPE_STARRED
            } else if uri.contains(":playlist:") {
                ffi::SP_LINKTYPE_PLAYLIST
            } else {
                ffi::SP_LINKTYPE_PROFILE
            }
        }
        _ => ffi::SP_LINKTYPE_INVALID,
    }
}

/// Offset suffix format used by track links: `#M:SS`.
fn parse_offset(fragment: &str) -> Option<u32> {
    let (minutes, seconds) = fragment.split_once(':')?;
    let minutes: u32 = minutes.parse().ok()?;
    let seconds: u32 = seconds.parse().ok()?;
    Some((minutes * 60 + seconds) * 1000)
}

fn format_offset(offset_ms: u32) -> String {
    let total_seconds = offset_ms / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

impl NativeLib for MockLib {
    fn session_create(
        &self,
        _config: &NativeConfig,
        callbacks: Arc<dyn NativeCallbacks>,
    ) -> Result<RawHandle, sp_error> {
        let mut state = self.lock();
        let addr = alloc(&mut state, ObjectKind::Session);
        state.sink = Some(callbacks);
        Ok(RawHandle::from_addr(addr))
    }

    fn session_process_events(&self, _session: RawHandle) -> Result<u32, sp_error> {
        let sink = {
            let mut state = self.lock();
            state.process_calls += 1;
            let addrs: Vec<usize> = state.objects.keys().copied().collect();
            for addr in addrs {
                let object = state.objects.get_mut(&addr).expect("known addr");
                if let Some(remaining) = object.loads_after {
                    if remaining <= 1 {
                        object.loads_after = None;
                        object.loaded = true;
                    } else {
                        object.loads_after = Some(remaining - 1);
                    }
                }
            }
            state.sink.clone()
        };
        if let Some(sink) = sink {
            loop {
                let action = self.lock().pending.pop_front();
                match action {
                    Some(action) => self.apply(action, &sink),
                    None => break,
                }
            }
        }
        Ok(self.lock().next_timeout_ms)
    }

    fn session_login(
        &self,
        _session: RawHandle,
        username: &str,
        _password: &str,
        remember_me: bool,
        _blob: Option<&str>,
    ) -> sp_error {
        let error = self.lock().next_login_error.take().unwrap_or(SP_ERROR_OK);
        self.queue_and_notify(Action::Login {
            username: username.to_owned(),
            remember: remember_me,
            error,
        });
        SP_ERROR_OK
    }

    fn session_relogin(&self, _session: RawHandle) -> sp_error {
        let remembered = self.lock().remembered_user.clone();
        match remembered {
            Some(username) => {
                self.queue_and_notify(Action::Login {
                    username,
                    remember: true,
                    error: SP_ERROR_OK,
                });
                SP_ERROR_OK
            }
            None => SP_ERROR_NO_CREDENTIALS,
        }
    }

    fn session_logout(&self, _session: RawHandle) -> sp_error {
        self.queue_and_notify(Action::Logout);
        SP_ERROR_OK
    }

    fn session_forget_me(&self, _session: RawHandle) -> sp_error {
        self.lock().remembered_user = None;
        SP_ERROR_OK
    }

    fn session_remembered_user(&self, _session: RawHandle, buffer: &mut [u8]) -> isize {
        let state = self.lock();
        match &state.remembered_user {
            Some(name) => {
                let bytes = name.as_bytes();
                let n = bytes.len().min(buffer.len());
                buffer[..n].copy_from_slice(&bytes[..n]);
                bytes.len() as isize
            }
            None => -1,
        }
    }

    fn session_user(&self, _session: RawHandle) -> RawHandle {
        self.lock()
            .current_user
            .map_or(RawHandle::NULL, RawHandle::from_addr)
    }

    fn session_user_name(&self, _session: RawHandle) -> String {
        let state = self.lock();
        state
            .current_user
            .and_then(|addr| state.objects.get(&addr))
            .map(|object| object.name.clone())
            .unwrap_or_default()
    }

    fn session_connection_state(&self, _session: RawHandle) -> sp_connectionstate {
        self.lock().connection_state
    }

    fn session_starred_create(&self, _session: RawHandle) -> RawHandle {
        let mut state = self.lock();
        let addr = match state.starred.filter(|addr| state.objects.contains_key(addr)) {
            Some(addr) => {
                state.objects.get_mut(&addr).expect("starred").refcount += 1;
                addr
            }
            None => {
                let addr = alloc(&mut state, ObjectKind::Playlist);
                let object = state.objects.get_mut(&addr).expect("starred");
                object.name = "Starred".to_owned();
                object.loaded = true;
                state.starred = Some(addr);
                addr
            }
        };
        state.counters.entry(addr).or_default().0 += 1;
        RawHandle::from_addr(addr)
    }

    fn session_playlist_container(&self, _session: RawHandle) -> RawHandle {
        let mut state = self.lock();
        match state.container {
            Some(addr) => RawHandle::from_addr(addr),
            None => {
                let addr = alloc(&mut state, ObjectKind::PlaylistContainer);
                state.objects.get_mut(&addr).expect("container").loaded = true;
                state.container = Some(addr);
                RawHandle::from_addr(addr)
            }
        }
    }

    fn add_ref(&self, kind: ObjectKind, handle: RawHandle) -> sp_error {
        let mut state = self.lock();
        state.counters.entry(handle.addr()).or_default().0 += 1;
        match state.objects.get_mut(&handle.addr()) {
            Some(object) if object.kind == kind => {
                object.refcount += 1;
                SP_ERROR_OK
            }
            _ => SP_ERROR_INVALID_INDATA,
        }
    }

    fn release(&self, kind: ObjectKind, handle: RawHandle) -> sp_error {
        let mut state = self.lock();
        state.counters.entry(handle.addr()).or_default().1 += 1;
        let dead = match state.objects.get_mut(&handle.addr()) {
            Some(object) if object.kind == kind => {
                object.refcount -= 1;
                object.refcount == 0
            }
            _ => return SP_ERROR_INVALID_INDATA,
        };
        if dead {
            state.objects.remove(&handle.addr());
            state.targets.retain(|_, addr| *addr != handle.addr());
        }
        SP_ERROR_OK
    }

    fn is_loaded(&self, kind: ObjectKind, handle: RawHandle) -> bool {
        self.attr(handle, kind, |o| o.loaded)
    }

    fn error_state(&self, kind: ObjectKind, handle: RawHandle) -> sp_error {
        self.attr(handle, kind, |o| o.error)
    }

    fn link_create_from_string(&self, uri: &str) -> RawHandle {
        let (base, fragment) = match uri.split_once('#') {
            Some((base, fragment)) => (base, Some(fragment)),
            None => (uri, None),
        };
        let link_type = uri_link_type(base);
        if link_type == ffi::SP_LINKTYPE_INVALID {
            return RawHandle::NULL;
        }
        let offset_ms = match fragment {
            Some(fragment) => match parse_offset(fragment) {
                Some(offset) => offset,
                None => return RawHandle::NULL,
            },
            None => 0,
        };
        let mut state = self.lock();
        let addr = alloc(&mut state, ObjectKind::Link);
        let object = state.objects.get_mut(&addr).expect("fresh link");
        object.uri = uri.to_owned();
        object.link_type = link_type;
        object.offset_ms = offset_ms;
        object.loaded = true;
        RawHandle::from_addr(addr)
    }

    fn link_create_from_track(&self, track: RawHandle, offset_ms: u32) -> RawHandle {
        let mut state = self.lock();
        let uri = match state.objects.get(&track.addr()) {
            Some(object) if object.kind == ObjectKind::Track && !object.uri.is_empty() => {
                if offset_ms > 0 {
                    format!("{}#{}", object.uri, format_offset(offset_ms))
                } else {
                    object.uri.clone()
                }
            }
            _ => return RawHandle::NULL,
        };
        let addr = alloc(&mut state, ObjectKind::Link);
        let object = state.objects.get_mut(&addr).expect("fresh link");
        object.uri = uri;
        object.link_type = ffi::SP_LINKTYPE_TRACK;
        object.offset_ms = offset_ms;
        object.loaded = true;
        RawHandle::from_addr(addr)
    }

    fn link_create_from_album(&self, album: RawHandle) -> RawHandle {
        self.link_from_object(album, ObjectKind::Album, ffi::SP_LINKTYPE_ALBUM)
    }

    fn link_create_from_artist(&self, artist: RawHandle) -> RawHandle {
        self.link_from_object(artist, ObjectKind::Artist, ffi::SP_LINKTYPE_ARTIST)
    }

    fn link_create_from_user(&self, user: RawHandle) -> RawHandle {
        self.link_from_object(user, ObjectKind::User, ffi::SP_LINKTYPE_PROFILE)
    }

    fn link_create_from_image(&self, image: RawHandle) -> RawHandle {
        self.link_from_object(image, ObjectKind::Image, ffi::SP_LINKTYPE_IMAGE)
    }

    fn link_as_string(&self, link: RawHandle, buffer: &mut [u8]) -> usize {
        let state = self.lock();
        match state.objects.get(&link.addr()) {
            Some(object) if object.kind == ObjectKind::Link => {
                let bytes = object.uri.as_bytes();
                let n = bytes.len().min(buffer.len());
                buffer[..n].copy_from_slice(&bytes[..n]);
                bytes.len()
            }
            _ => 0,
        }
    }

    fn link_type(&self, link: RawHandle) -> sp_linktype {
        self.attr(link, ObjectKind::Link, |o| o.link_type)
    }

    fn link_as_track(&self, link: RawHandle) -> RawHandle {
        self.link_target(link, ffi::SP_LINKTYPE_TRACK, ObjectKind::Track)
    }

    fn link_as_track_and_offset(&self, link: RawHandle) -> (RawHandle, u32) {
        let offset = self.attr(link, ObjectKind::Link, |o| o.offset_ms);
        (self.link_as_track(link), offset)
    }

    fn link_as_album(&self, link: RawHandle) -> RawHandle {
        self.link_target(link, ffi::SP_LINKTYPE_ALBUM, ObjectKind::Album)
    }

    fn link_as_artist(&self, link: RawHandle) -> RawHandle {
        self.link_target(link, ffi::SP_LINKTYPE_ARTIST, ObjectKind::Artist)
    }

    fn link_as_user(&self, link: RawHandle) -> RawHandle {
        self.link_target(link, ffi::SP_LINKTYPE_PROFILE, ObjectKind::User)
    }

    fn playlist_create(&self, _session: RawHandle, link: RawHandle) -> RawHandle {
        let mut state = self.lock();
        let uri = match state.objects.get(&link.addr()) {
            Some(object)
                if object.kind == ObjectKind::Link
                    && (object.link_type == ffi::SP_LINKTYPE_PLAYLIST
                        || object.link_type == ffi::SP_LINKTYPE_STARRED) =>
            {
                object.uri.clone()
            }
            _ => return RawHandle::NULL,
        };
        let addr = target(&mut state, &uri, ObjectKind::Playlist);
        // Owned result: the caller gets its own reference.
        state.objects.get_mut(&addr).expect("playlist target").refcount += 1;
        state.counters.entry(addr).or_default().0 += 1;
        RawHandle::from_addr(addr)
    }

    fn image_create_from_link(
        &self,
        _session: RawHandle,
        link: RawHandle,
        token: u64,
    ) -> RawHandle {
        let addr = {
            let mut state = self.lock();
            let uri = match state.objects.get(&link.addr()) {
                Some(object)
                    if object.kind == ObjectKind::Link
                        && object.link_type == ffi::SP_LINKTYPE_IMAGE =>
                {
                    object.uri.clone()
                }
                _ => return RawHandle::NULL,
            };
            let addr = target(&mut state, &uri, ObjectKind::Image);
            state.objects.get_mut(&addr).expect("image target").refcount += 1;
            state.counters.entry(addr).or_default().0 += 1;
            addr
        };
        self.queue_and_notify(Action::CompleteBrowse {
            token,
            handle: addr,
        });
        RawHandle::from_addr(addr)
    }

    fn track_name(&self, track: RawHandle) -> String {
        self.attr(track, ObjectKind::Track, |o| {
            if o.loaded { o.name.clone() } else { String::new() }
        })
    }

    fn track_duration_ms(&self, track: RawHandle) -> i32 {
        self.attr(track, ObjectKind::Track, |o| o.duration_ms)
    }

    fn track_num_artists(&self, track: RawHandle) -> i32 {
        self.attr(track, ObjectKind::Track, |o| o.artists.len() as i32)
    }

    fn track_artist(&self, track: RawHandle, index: i32) -> RawHandle {
        self.indexed_handle(track, ObjectKind::Track, |o| &o.artists, index)
    }

    fn track_album(&self, track: RawHandle) -> RawHandle {
        self.attr(track, ObjectKind::Track, |o| {
            o.album.map_or(RawHandle::NULL, RawHandle::from_addr)
        })
    }

    fn album_name(&self, album: RawHandle) -> String {
        self.attr(album, ObjectKind::Album, |o| {
            if o.loaded { o.name.clone() } else { String::new() }
        })
    }

    fn album_year(&self, album: RawHandle) -> i32 {
        self.attr(album, ObjectKind::Album, |o| o.year)
    }

    fn album_type(&self, album: RawHandle) -> i32 {
        self.attr(album, ObjectKind::Album, |o| o.album_type)
    }

    fn album_is_available(&self, album: RawHandle) -> bool {
        self.attr(album, ObjectKind::Album, |o| o.available)
    }

    fn album_artist(&self, album: RawHandle) -> RawHandle {
        self.indexed_handle(album, ObjectKind::Album, |o| &o.artists, 0)
    }

    fn album_cover(&self, _session: RawHandle, album: RawHandle, token: u64) -> RawHandle {
        let addr = {
            let mut state = self.lock();
            let uri = match state.objects.get(&album.addr()) {
                Some(object) if object.kind == ObjectKind::Album && !object.uri.is_empty() => {
                    format!("spotify:image:cover-of-{}", object.uri)
                }
                _ => return RawHandle::NULL,
            };
            let addr = target(&mut state, &uri, ObjectKind::Image);
            state.objects.get_mut(&addr).expect("image target").refcount += 1;
            state.counters.entry(addr).or_default().0 += 1;
            addr
        };
        self.queue_and_notify(Action::CompleteBrowse {
            token,
            handle: addr,
        });
        RawHandle::from_addr(addr)
    }

    fn artist_name(&self, artist: RawHandle) -> String {
        self.attr(artist, ObjectKind::Artist, |o| {
            if o.loaded { o.name.clone() } else { String::new() }
        })
    }

    fn user_canonical_name(&self, user: RawHandle) -> String {
        self.attr(user, ObjectKind::User, |o| o.name.clone())
    }

    fn user_display_name(&self, user: RawHandle) -> String {
        self.attr(user, ObjectKind::User, |o| o.display_name.clone())
    }

    fn image_format(&self, image: RawHandle) -> i32 {
        self.attr(image, ObjectKind::Image, |o| o.image_format)
    }

    fn image_data(&self, image: RawHandle) -> Vec<u8> {
        self.attr(image, ObjectKind::Image, |o| o.image_data.clone())
    }

    fn playlist_name(&self, playlist: RawHandle) -> String {
        self.attr(playlist, ObjectKind::Playlist, |o| o.name.clone())
    }

    fn playlist_rename(&self, playlist: RawHandle, name: &str) -> sp_error {
        let mut state = self.lock();
        match state.objects.get_mut(&playlist.addr()) {
            Some(object) if object.kind == ObjectKind::Playlist => {
                object.name = name.to_owned();
                SP_ERROR_OK
            }
            _ => SP_ERROR_INVALID_INDATA,
        }
    }

    fn playlist_num_tracks(&self, playlist: RawHandle) -> i32 {
        self.attr(playlist, ObjectKind::Playlist, |o| o.children.len() as i32)
    }

    fn playlist_track(&self, playlist: RawHandle, index: i32) -> RawHandle {
        self.indexed_handle(playlist, ObjectKind::Playlist, |o| &o.children, index)
    }

    fn playlist_track_create_time(&self, playlist: RawHandle, index: i32) -> i64 {
        self.attr(playlist, ObjectKind::Playlist, |o| {
            o.create_times.get(index as usize).copied().unwrap_or(0)
        })
    }

    fn playlist_track_creator(&self, playlist: RawHandle, index: i32) -> RawHandle {
        self.attr(playlist, ObjectKind::Playlist, |o| {
            o.creators
                .get(index as usize)
                .copied()
                .filter(|addr| *addr != 0)
                .map_or(RawHandle::NULL, RawHandle::from_addr)
        })
    }

    fn playlist_track_seen(&self, playlist: RawHandle, index: i32) -> bool {
        self.attr(playlist, ObjectKind::Playlist, |o| {
            o.seen.get(index as usize).copied().unwrap_or(false)
        })
    }

    fn playlist_track_set_seen(&self, playlist: RawHandle, index: i32, seen: bool) -> sp_error {
        let mut state = self.lock();
        match state.objects.get_mut(&playlist.addr()) {
            Some(object) if object.kind == ObjectKind::Playlist => {
                match object.seen.get_mut(index as usize) {
                    Some(slot) => {
                        *slot = seen;
                        SP_ERROR_OK
                    }
                    None => ffi::SP_ERROR_INDEX_OUT_OF_RANGE,
                }
            }
            _ => SP_ERROR_INVALID_INDATA,
        }
    }

    fn playlist_track_message(&self, playlist: RawHandle, index: i32) -> String {
        self.attr(playlist, ObjectKind::Playlist, |o| {
            o.messages.get(index as usize).cloned().unwrap_or_default()
        })
    }

    fn container_num_playlists(&self, container: RawHandle) -> i32 {
        self.attr(container, ObjectKind::PlaylistContainer, |o| {
            o.children.len() as i32
        })
    }

    fn container_playlist(&self, container: RawHandle, index: i32) -> RawHandle {
        self.indexed_handle(container, ObjectKind::PlaylistContainer, |o| &o.children, index)
    }

    fn albumbrowse_create(&self, _session: RawHandle, album: RawHandle, token: u64) -> RawHandle {
        let addr = {
            let mut state = self.lock();
            let (tracks, review, copyrights, artists) = match state.objects.get(&album.addr()) {
                Some(object) if object.kind == ObjectKind::Album => (
                    object.children.clone(),
                    object.review.clone(),
                    object.copyrights.clone(),
                    object.artists.clone(),
                ),
                _ => return RawHandle::NULL,
            };
            let addr = alloc(&mut state, ObjectKind::AlbumBrowse);
            let browse = state.objects.get_mut(&addr).expect("fresh browse");
            browse.album = Some(album.addr());
            browse.children = tracks;
            browse.review = review;
            browse.copyrights = copyrights;
            browse.artists = artists;
            addr
        };
        self.queue_and_notify(Action::CompleteBrowse {
            token,
            handle: addr,
        });
        RawHandle::from_addr(addr)
    }

    fn albumbrowse_album(&self, browse: RawHandle) -> RawHandle {
        self.attr(browse, ObjectKind::AlbumBrowse, |o| {
            o.album.map_or(RawHandle::NULL, RawHandle::from_addr)
        })
    }

    fn albumbrowse_artist(&self, browse: RawHandle) -> RawHandle {
        self.indexed_handle(browse, ObjectKind::AlbumBrowse, |o| &o.artists, 0)
    }

    fn albumbrowse_num_tracks(&self, browse: RawHandle) -> i32 {
        self.attr(browse, ObjectKind::AlbumBrowse, |o| {
            if o.loaded { o.children.len() as i32 } else { 0 }
        })
    }

    fn albumbrowse_track(&self, browse: RawHandle, index: i32) -> RawHandle {
        self.indexed_handle(browse, ObjectKind::AlbumBrowse, |o| &o.children, index)
    }

    fn albumbrowse_num_copyrights(&self, browse: RawHandle) -> i32 {
        self.attr(browse, ObjectKind::AlbumBrowse, |o| {
            if o.loaded { o.copyrights.len() as i32 } else { 0 }
        })
    }

    fn albumbrowse_copyright(&self, browse: RawHandle, index: i32) -> String {
        self.attr(browse, ObjectKind::AlbumBrowse, |o| {
            o.copyrights.get(index as usize).cloned().unwrap_or_default()
        })
    }

    fn albumbrowse_review(&self, browse: RawHandle) -> String {
        self.attr(browse, ObjectKind::AlbumBrowse, |o| o.review.clone())
    }

    fn artistbrowse_create(
        &self,
        _session: RawHandle,
        artist: RawHandle,
        token: u64,
    ) -> RawHandle {
        let addr = {
            let mut state = self.lock();
            let tracks = match state.objects.get(&artist.addr()) {
                Some(object) if object.kind == ObjectKind::Artist => object.children.clone(),
                _ => return RawHandle::NULL,
            };
            let addr = alloc(&mut state, ObjectKind::ArtistBrowse);
            let browse = state.objects.get_mut(&addr).expect("fresh browse");
            browse.artists = vec![artist.addr()];
            browse.children = tracks;
            addr
        };
        self.queue_and_notify(Action::CompleteBrowse {
            token,
            handle: addr,
        });
        RawHandle::from_addr(addr)
    }

    fn artistbrowse_artist(&self, browse: RawHandle) -> RawHandle {
        self.indexed_handle(browse, ObjectKind::ArtistBrowse, |o| &o.artists, 0)
    }

    fn artistbrowse_num_tracks(&self, browse: RawHandle) -> i32 {
        self.attr(browse, ObjectKind::ArtistBrowse, |o| {
            if o.loaded { o.children.len() as i32 } else { 0 }
        })
    }

    fn artistbrowse_track(&self, browse: RawHandle, index: i32) -> RawHandle {
        self.indexed_handle(browse, ObjectKind::ArtistBrowse, |o| &o.children, index)
    }

    fn search_create(
        &self,
        _session: RawHandle,
        query: &str,
        _track_offset: i32,
        _track_count: i32,
        _album_offset: i32,
        _album_count: i32,
        _artist_offset: i32,
        _artist_count: i32,
        _playlist_offset: i32,
        _playlist_count: i32,
        token: u64,
    ) -> RawHandle {
        let addr = {
            let mut state = self.lock();
            let fixture = state.searches.get(query).cloned().unwrap_or_default();
            let tracks: Vec<usize> = fixture
                .track_uris
                .iter()
                .map(|u| target(&mut state, u, ObjectKind::Track))
                .collect();
            let albums: Vec<usize> = fixture
                .album_uris
                .iter()
                .map(|u| target(&mut state, u, ObjectKind::Album))
                .collect();
            let artists: Vec<usize> = fixture
                .artist_uris
                .iter()
                .map(|u| target(&mut state, u, ObjectKind::Artist))
                .collect();
            let addr = alloc(&mut state, ObjectKind::Search);
            let search = state.objects.get_mut(&addr).expect("fresh search");
            search.query = query.to_owned();
            search.children = tracks;
            search.albums = albums;
            search.artists = artists;
            search.playlist_names = fixture.playlist_names.clone();
            search.totals = [
                fixture.total_tracks,
                fixture.total_albums,
                fixture.total_artists,
                fixture.total_playlists,
            ];
            addr
        };
        self.queue_and_notify(Action::CompleteBrowse {
            token,
            handle: addr,
        });
        RawHandle::from_addr(addr)
    }

    fn search_query(&self, search: RawHandle) -> String {
        self.attr(search, ObjectKind::Search, |o| o.query.clone())
    }

    fn search_num_tracks(&self, search: RawHandle) -> i32 {
        self.attr(search, ObjectKind::Search, |o| {
            if o.loaded { o.children.len() as i32 } else { 0 }
        })
    }

    fn search_track(&self, search: RawHandle, index: i32) -> RawHandle {
        self.indexed_handle(search, ObjectKind::Search, |o| &o.children, index)
    }

    fn search_total_tracks(&self, search: RawHandle) -> i32 {
        self.attr(search, ObjectKind::Search, |o| o.totals[0])
    }

    fn search_num_albums(&self, search: RawHandle) -> i32 {
        self.attr(search, ObjectKind::Search, |o| {
            if o.loaded { o.albums.len() as i32 } else { 0 }
        })
    }

    fn search_album(&self, search: RawHandle, index: i32) -> RawHandle {
        self.indexed_handle(search, ObjectKind::Search, |o| &o.albums, index)
    }

    fn search_total_albums(&self, search: RawHandle) -> i32 {
        self.attr(search, ObjectKind::Search, |o| o.totals[1])
    }

    fn search_num_artists(&self, search: RawHandle) -> i32 {
        self.attr(search, ObjectKind::Search, |o| {
            if o.loaded { o.artists.len() as i32 } else { 0 }
        })
    }

    fn search_artist(&self, search: RawHandle, index: i32) -> RawHandle {
        self.indexed_handle(search, ObjectKind::Search, |o| &o.artists, index)
    }

    fn search_total_artists(&self, search: RawHandle) -> i32 {
        self.attr(search, ObjectKind::Search, |o| o.totals[2])
    }

    fn search_num_playlists(&self, search: RawHandle) -> i32 {
        self.attr(search, ObjectKind::Search, |o| {
            if o.loaded { o.playlist_names.len() as i32 } else { 0 }
        })
    }

    fn search_playlist_name(&self, search: RawHandle, index: i32) -> String {
        self.attr(search, ObjectKind::Search, |o| {
            o.playlist_names.get(index as usize).cloned().unwrap_or_default()
        })
    }

    fn search_total_playlists(&self, search: RawHandle) -> i32 {
        self.attr(search, ObjectKind::Search, |o| o.totals[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;
    impl NativeCallbacks for NullSink {}

    fn session(lib: &MockLib) -> RawHandle {
        lib.session_create(&NativeConfig::default(), Arc::new(NullSink))
            .expect("mock session")
    }

    #[test]
    fn link_parsing_accepts_known_kinds() {
        let lib = MockLib::new();
        let link = lib.link_create_from_string("spotify:track:2Foc5Q5nqNiosCNqttzHof");
        assert!(!link.is_null());
        assert_eq!(lib.link_type(link), ffi::SP_LINKTYPE_TRACK);

        assert!(lib.link_create_from_string("http://example.com").is_null());
        assert!(lib.link_create_from_string("spotify:bogus:x").is_null());
        assert!(lib.link_create_from_string("spotify:track:").is_null());
    }

    #[test]
    fn link_round_trips_uri_bytes() {
        let lib = MockLib::new();
        let uri = "spotify:album:6G9fHYDCoyEErUkHrFYfs4";
        let link = lib.link_create_from_string(uri);
        let mut buffer = vec![0u8; 128];
        let len = lib.link_as_string(link, &mut buffer);
        assert_eq!(&buffer[..len], uri.as_bytes());
    }

    #[test]
    fn offset_fragment_parses_to_milliseconds() {
        let lib = MockLib::new();
        let link = lib.link_create_from_string("spotify:track:abc#1:23");
        let (track, offset) = lib.link_as_track_and_offset(link);
        assert!(!track.is_null());
        assert_eq!(offset, 83_000);
    }

    #[test]
    fn release_drops_object_at_zero() {
        let lib = MockLib::new();
        let handle = lib.alloc_object(ObjectKind::Track);
        assert_eq!(lib.refcount(handle), Some(1));
        lib.add_ref(ObjectKind::Track, handle);
        assert_eq!(lib.refcount(handle), Some(2));
        lib.release(ObjectKind::Track, handle);
        lib.release(ObjectKind::Track, handle);
        assert!(!lib.object_exists(handle));
        assert_eq!(lib.add_ref_calls(handle), 1);
        assert_eq!(lib.release_calls(handle), 2);
    }

    #[test]
    fn same_uri_resolves_to_same_target() {
        let lib = MockLib::new();
        let a = lib.link_create_from_string("spotify:track:abc");
        let b = lib.link_create_from_string("spotify:track:abc");
        assert_ne!(a, b);
        assert_eq!(lib.link_as_track(a), lib.link_as_track(b));
    }

    #[test]
    fn login_completes_on_process_events() {
        let lib = MockLib::new();
        let handle = session(&lib);
        lib.session_login(handle, "alice", "secret", true, None);
        assert_eq!(
            lib.session_connection_state(handle),
            ffi::SP_CONNECTION_STATE_LOGGED_OUT
        );
        lib.session_process_events(handle).unwrap();
        assert_eq!(
            lib.session_connection_state(handle),
            ffi::SP_CONNECTION_STATE_LOGGED_IN
        );
        let mut buffer = vec![0u8; 32];
        assert_eq!(lib.session_remembered_user(handle, &mut buffer), 5);
        assert_eq!(&buffer[..5], b"alice");
    }

    #[test]
    fn relogin_without_remembered_user_fails() {
        let lib = MockLib::new();
        let handle = session(&lib);
        assert_eq!(lib.session_relogin(handle), SP_ERROR_NO_CREDENTIALS);
    }
}
