//! Capability surface of the native library.
//!
//! [`NativeLib`] restates the C functions declared in [`crate::ffi`] as a
//! trait so the safe layer never touches raw pointers or symbols directly.
//! The production backend implements it over the extern declarations; the
//! test suites inject the [`crate::mock`] backend. [`NativeCallbacks`] is the
//! inverse direction: the sink the backend delivers native callbacks into.
//!
//! Conventions shared by every method:
//! - `create`-style calls return an *owned* handle (reference count already
//!   one) or the null handle on failure.
//! - accessor-style calls returning a handle return a *borrowed* reference
//!   the caller must `add_ref` before keeping.
//! - accessors on unloaded objects return sentinels (empty string, zero,
//!   null) rather than blocking.

use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ffi::{self, sp_audioformat, sp_connectionstate, sp_error, sp_linktype};

/// Raised when a native discriminant has no counterpart in a closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown native discriminant {0} for {1}")]
pub struct UnknownDiscriminant(pub i32, pub &'static str);

/// Pointer-sized identifier of a native object.
///
/// A `RawHandle` is never dereferenced inside this workspace; it is only
/// passed back into the capability trait and compared/hashed by address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(*mut c_void);

// SAFETY: the handle is an opaque token. All dereferencing happens on the
// native side of the capability trait, which carries its own thread
// requirements (serialized by the binding's native-call lock).
unsafe impl Send for RawHandle {}
unsafe impl Sync for RawHandle {}

impl RawHandle {
    /// The null sentinel returned by failed native creation calls.
    pub const NULL: RawHandle = RawHandle(std::ptr::null_mut());

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Address of the native object, used as the identity key.
    pub fn addr(self) -> usize {
        self.0 as usize
    }

    /// Rebuild a handle from an address. Used by backends that allocate
    /// synthetic addresses (the mock) and by the production backend when
    /// converting pointers received from the native library.
    pub fn from_addr(addr: usize) -> Self {
        RawHandle(addr as *mut c_void)
    }
}

impl Default for RawHandle {
    fn default() -> Self {
        RawHandle::NULL
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle({:#x})", self.addr())
    }
}

/// Every native object kind the binding manages.
///
/// Reference counting and load state are multiplexed over this enum: the
/// backend maps each kind to the matching `sp_<kind>_add_ref` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Session,
    Track,
    Album,
    Artist,
    Link,
    Image,
    Playlist,
    PlaylistContainer,
    AlbumBrowse,
    ArtistBrowse,
    Search,
    User,
}

impl ObjectKind {
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Session => "session",
            ObjectKind::Track => "track",
            ObjectKind::Album => "album",
            ObjectKind::Artist => "artist",
            ObjectKind::Link => "link",
            ObjectKind::Image => "image",
            ObjectKind::Playlist => "playlist",
            ObjectKind::PlaylistContainer => "playlistcontainer",
            ObjectKind::AlbumBrowse => "albumbrowse",
            ObjectKind::ArtistBrowse => "artistbrowse",
            ObjectKind::Search => "search",
            ObjectKind::User => "user",
        }
    }
}

/// Declared type of a link, one per URI form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Invalid,
    Track,
    Album,
    Artist,
    Search,
    Playlist,
    Profile,
    Starred,
    LocalTrack,
    Image,
}

impl LinkType {
    pub fn to_raw(self) -> sp_linktype {
        match self {
            LinkType::Invalid => ffi::SP_LINKTYPE_INVALID,
            LinkType::Track => ffi::SP_LINKTYPE_TRACK,
            LinkType::Album => ffi::SP_LINKTYPE_ALBUM,
            LinkType::Artist => ffi::SP_LINKTYPE_ARTIST,
            LinkType::Search => ffi::SP_LINKTYPE_SEARCH,
            LinkType::Playlist => ffi::SP_LINKTYPE_PLAYLIST,
            LinkType::Profile => ffi::SP_LINKTYPE_PROFILE,
            LinkType::Starred => ffi::SP_LINKTYPE_STARRED,
            LinkType::LocalTrack => ffi::SP_LINKTYPE_LOCALTRACK,
            LinkType::Image => ffi::SP_LINKTYPE_IMAGE,
        }
    }
}

impl TryFrom<sp_linktype> for LinkType {
    type Error = UnknownDiscriminant;

    fn try_from(raw: sp_linktype) -> Result<Self, UnknownDiscriminant> {
        match raw {
            ffi::SP_LINKTYPE_INVALID => Ok(LinkType::Invalid),
            ffi::SP_LINKTYPE_TRACK => Ok(LinkType::Track),
            ffi::SP_LINKTYPE_ALBUM => Ok(LinkType::Album),
            ffi::SP_LINKTYPE_ARTIST => Ok(LinkType::Artist),
            ffi::SP_LINKTYPE_SEARCH => Ok(LinkType::Search),
            ffi::SP_LINKTYPE_PLAYLIST => Ok(LinkType::Playlist),
            ffi::SP_LINKTYPE_PROFILE => Ok(LinkType::Profile),
            ffi::SP_LINKTYPE_STARRED => Ok(LinkType::Starred),
            ffi::SP_LINKTYPE_LOCALTRACK => Ok(LinkType::LocalTrack),
            ffi::SP_LINKTYPE_IMAGE => Ok(LinkType::Image),
            other => Err(UnknownDiscriminant(other, "sp_linktype")),
        }
    }
}

/// Connection state reported by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    LoggedOut,
    LoggedIn,
    Disconnected,
    Undefined,
    Offline,
}

impl TryFrom<sp_connectionstate> for ConnectionState {
    type Error = UnknownDiscriminant;

    fn try_from(raw: sp_connectionstate) -> Result<Self, UnknownDiscriminant> {
        match raw {
            ffi::SP_CONNECTION_STATE_LOGGED_OUT => Ok(ConnectionState::LoggedOut),
            ffi::SP_CONNECTION_STATE_LOGGED_IN => Ok(ConnectionState::LoggedIn),
            ffi::SP_CONNECTION_STATE_DISCONNECTED => Ok(ConnectionState::Disconnected),
            ffi::SP_CONNECTION_STATE_UNDEFINED => Ok(ConnectionState::Undefined),
            ffi::SP_CONNECTION_STATE_OFFLINE => Ok(ConnectionState::Offline),
            other => Err(UnknownDiscriminant(other, "sp_connectionstate")),
        }
    }
}

/// Album release type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlbumType {
    Album,
    Single,
    Compilation,
    Unknown,
}

impl TryFrom<i32> for AlbumType {
    type Error = UnknownDiscriminant;

    fn try_from(raw: i32) -> Result<Self, UnknownDiscriminant> {
        match raw {
            ffi::SP_ALBUMTYPE_ALBUM => Ok(AlbumType::Album),
            ffi::SP_ALBUMTYPE_SINGLE => Ok(AlbumType::Single),
            ffi::SP_ALBUMTYPE_COMPILATION => Ok(AlbumType::Compilation),
            ffi::SP_ALBUMTYPE_UNKNOWN => Ok(AlbumType::Unknown),
            other => Err(UnknownDiscriminant(other, "sp_albumtype")),
        }
    }
}

/// Session creation parameters marshaled into `sp_session_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeConfig {
    pub cache_location: String,
    pub settings_location: String,
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub application_key: Vec<u8>,
}

impl Default for NativeConfig {
    fn default() -> Self {
        NativeConfig {
            cache_location: "tmp".into(),
            settings_location: "tmp".into(),
            user_agent: concat!("respot/", env!("CARGO_PKG_VERSION")).into(),
            application_key: Vec::new(),
        }
    }
}

/// Sink for callbacks crossing the ABI boundary.
///
/// The backend invokes these from whatever thread the native library uses;
/// implementations must confine themselves to lock-protected bookkeeping and
/// signaling (see the concurrency notes in the binding crate).
pub trait NativeCallbacks: Send + Sync {
    fn notify_main_thread(&self) {}
    fn logged_in(&self, _error: sp_error) {}
    fn logged_out(&self) {}
    fn metadata_updated(&self) {}
    fn connection_error(&self, _error: sp_error) {}
    fn message_to_user(&self, _message: &str) {}
    fn log_message(&self, _message: &str) {}
    /// Returns the number of frames consumed.
    fn music_delivery(&self, _format: sp_audioformat, _frames: &[u8], _num_frames: usize) -> usize {
        0
    }
    fn play_token_lost(&self) {}
    fn end_of_track(&self) {}
    fn credentials_blob_updated(&self, _blob: &str) {}
    fn connection_state_updated(&self) {}
    fn scrobble_error(&self, _error: sp_error) {}
    fn private_session_mode_changed(&self, _is_private: bool) {}
    /// Completion of an asynchronous browse/search/image request issued with
    /// the given correlation token.
    fn browse_complete(&self, _token: u64, _error: sp_error) {}
}

/// The native library as seen by the binding.
///
/// One method per C entry point the binding needs, with C strings and
/// out-parameters already marshaled. Status codes are returned raw; the safe
/// layer routes every one of them through its error mapping.
pub trait NativeLib: Send + Sync {
    // -- session ------------------------------------------------------------

    /// Create a session and register the callback sink. Returns an owned
    /// session handle.
    fn session_create(
        &self,
        config: &NativeConfig,
        callbacks: Arc<dyn NativeCallbacks>,
    ) -> Result<RawHandle, sp_error>;

    /// Drive the library once. Returns the recommended delay in milliseconds
    /// until the next call.
    fn session_process_events(&self, session: RawHandle) -> Result<u32, sp_error>;

    fn session_login(
        &self,
        session: RawHandle,
        username: &str,
        password: &str,
        remember_me: bool,
        blob: Option<&str>,
    ) -> sp_error;
    fn session_relogin(&self, session: RawHandle) -> sp_error;
    fn session_logout(&self, session: RawHandle) -> sp_error;
    fn session_forget_me(&self, session: RawHandle) -> sp_error;

    /// Copy the remembered user name into `buffer`; returns the full name
    /// length, or -1 if no user is remembered.
    fn session_remembered_user(&self, session: RawHandle, buffer: &mut [u8]) -> isize;

    /// Borrowed handle to the logged-in user, or null.
    fn session_user(&self, session: RawHandle) -> RawHandle;
    /// Canonical name of the logged-in user; empty while logged out.
    fn session_user_name(&self, session: RawHandle) -> String;
    fn session_connection_state(&self, session: RawHandle) -> sp_connectionstate;
    /// Owned handle to the starred-tracks playlist.
    fn session_starred_create(&self, session: RawHandle) -> RawHandle;
    /// Borrowed handle to the root playlist container.
    fn session_playlist_container(&self, session: RawHandle) -> RawHandle;

    // -- reference counting and load state, multiplexed by kind -------------

    fn add_ref(&self, kind: ObjectKind, handle: RawHandle) -> sp_error;
    fn release(&self, kind: ObjectKind, handle: RawHandle) -> sp_error;
    fn is_loaded(&self, kind: ObjectKind, handle: RawHandle) -> bool;
    fn error_state(&self, kind: ObjectKind, handle: RawHandle) -> sp_error;

    // -- links --------------------------------------------------------------

    /// Parse a URI. Owned handle, or null if the parser rejects the string.
    fn link_create_from_string(&self, uri: &str) -> RawHandle;
    fn link_create_from_track(&self, track: RawHandle, offset_ms: u32) -> RawHandle;
    fn link_create_from_album(&self, album: RawHandle) -> RawHandle;
    fn link_create_from_artist(&self, artist: RawHandle) -> RawHandle;
    fn link_create_from_user(&self, user: RawHandle) -> RawHandle;
    fn link_create_from_image(&self, image: RawHandle) -> RawHandle;

    /// Copy the canonical URI into `buffer` (truncating); returns the full
    /// URI length.
    fn link_as_string(&self, link: RawHandle, buffer: &mut [u8]) -> usize;
    fn link_type(&self, link: RawHandle) -> sp_linktype;
    /// Borrowed conversions; null when the link type does not match.
    fn link_as_track(&self, link: RawHandle) -> RawHandle;
    fn link_as_track_and_offset(&self, link: RawHandle) -> (RawHandle, u32);
    fn link_as_album(&self, link: RawHandle) -> RawHandle;
    fn link_as_artist(&self, link: RawHandle) -> RawHandle;
    fn link_as_user(&self, link: RawHandle) -> RawHandle;

    /// Owned playlist handle created from a playlist/starred link.
    fn playlist_create(&self, session: RawHandle, link: RawHandle) -> RawHandle;
    /// Owned image handle created from an image link; completion is reported
    /// through [`NativeCallbacks::browse_complete`] with `token`.
    fn image_create_from_link(&self, session: RawHandle, link: RawHandle, token: u64)
    -> RawHandle;

    // -- attribute accessors (sentinels preserved) --------------------------

    fn track_name(&self, track: RawHandle) -> String;
    fn track_duration_ms(&self, track: RawHandle) -> i32;
    fn track_num_artists(&self, track: RawHandle) -> i32;
    fn track_artist(&self, track: RawHandle, index: i32) -> RawHandle;
    fn track_album(&self, track: RawHandle) -> RawHandle;

    fn album_name(&self, album: RawHandle) -> String;
    fn album_year(&self, album: RawHandle) -> i32;
    fn album_type(&self, album: RawHandle) -> i32;
    fn album_is_available(&self, album: RawHandle) -> bool;
    fn album_artist(&self, album: RawHandle) -> RawHandle;
    /// Owned image handle for the album cover, or null if none is known yet.
    fn album_cover(&self, session: RawHandle, album: RawHandle, token: u64) -> RawHandle;

    fn artist_name(&self, artist: RawHandle) -> String;

    fn user_canonical_name(&self, user: RawHandle) -> String;
    fn user_display_name(&self, user: RawHandle) -> String;

    fn image_format(&self, image: RawHandle) -> i32;
    fn image_data(&self, image: RawHandle) -> Vec<u8>;

    // -- playlists ----------------------------------------------------------

    fn playlist_name(&self, playlist: RawHandle) -> String;
    fn playlist_rename(&self, playlist: RawHandle, name: &str) -> sp_error;
    fn playlist_num_tracks(&self, playlist: RawHandle) -> i32;
    fn playlist_track(&self, playlist: RawHandle, index: i32) -> RawHandle;
    fn playlist_track_create_time(&self, playlist: RawHandle, index: i32) -> i64;
    fn playlist_track_creator(&self, playlist: RawHandle, index: i32) -> RawHandle;
    fn playlist_track_seen(&self, playlist: RawHandle, index: i32) -> bool;
    fn playlist_track_set_seen(&self, playlist: RawHandle, index: i32, seen: bool) -> sp_error;
    fn playlist_track_message(&self, playlist: RawHandle, index: i32) -> String;

    fn container_num_playlists(&self, container: RawHandle) -> i32;
    fn container_playlist(&self, container: RawHandle, index: i32) -> RawHandle;

    // -- asynchronous browse / search ----------------------------------------

    /// Issue an album browse; completion arrives via `browse_complete(token)`.
    fn albumbrowse_create(&self, session: RawHandle, album: RawHandle, token: u64) -> RawHandle;
    fn albumbrowse_album(&self, browse: RawHandle) -> RawHandle;
    fn albumbrowse_artist(&self, browse: RawHandle) -> RawHandle;
    fn albumbrowse_num_tracks(&self, browse: RawHandle) -> i32;
    fn albumbrowse_track(&self, browse: RawHandle, index: i32) -> RawHandle;
    fn albumbrowse_num_copyrights(&self, browse: RawHandle) -> i32;
    fn albumbrowse_copyright(&self, browse: RawHandle, index: i32) -> String;
    fn albumbrowse_review(&self, browse: RawHandle) -> String;

    fn artistbrowse_create(&self, session: RawHandle, artist: RawHandle, token: u64)
    -> RawHandle;
    fn artistbrowse_artist(&self, browse: RawHandle) -> RawHandle;
    fn artistbrowse_num_tracks(&self, browse: RawHandle) -> i32;
    fn artistbrowse_track(&self, browse: RawHandle, index: i32) -> RawHandle;

    /// Issue a search; completion arrives via `browse_complete(token)`.
    #[allow(clippy::too_many_arguments)]
    fn search_create(
        &self,
        session: RawHandle,
        query: &str,
        track_offset: i32,
        track_count: i32,
        album_offset: i32,
        album_count: i32,
        artist_offset: i32,
        artist_count: i32,
        playlist_offset: i32,
        playlist_count: i32,
        token: u64,
    ) -> RawHandle;
    fn search_query(&self, search: RawHandle) -> String;
    fn search_num_tracks(&self, search: RawHandle) -> i32;
    fn search_track(&self, search: RawHandle, index: i32) -> RawHandle;
    fn search_total_tracks(&self, search: RawHandle) -> i32;
    fn search_num_albums(&self, search: RawHandle) -> i32;
    fn search_album(&self, search: RawHandle, index: i32) -> RawHandle;
    fn search_total_albums(&self, search: RawHandle) -> i32;
    fn search_num_artists(&self, search: RawHandle) -> i32;
    fn search_artist(&self, search: RawHandle, index: i32) -> RawHandle;
    fn search_total_artists(&self, search: RawHandle) -> i32;
    fn search_num_playlists(&self, search: RawHandle) -> i32;
    fn search_playlist_name(&self, search: RawHandle, index: i32) -> String;
    fn search_total_playlists(&self, search: RawHandle) -> i32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle_is_null() {
        assert!(RawHandle::NULL.is_null());
        assert!(!RawHandle::from_addr(0x1000).is_null());
        assert_eq!(RawHandle::from_addr(0x1000).addr(), 0x1000);
    }

    #[test]
    fn link_type_round_trips_through_raw() {
        for link_type in [
            LinkType::Invalid,
            LinkType::Track,
            LinkType::Album,
            LinkType::Artist,
            LinkType::Search,
            LinkType::Playlist,
            LinkType::Profile,
            LinkType::Starred,
            LinkType::LocalTrack,
            LinkType::Image,
        ] {
            assert_eq!(LinkType::try_from(link_type.to_raw()), Ok(link_type));
        }
    }

    #[test]
    fn unknown_discriminant_is_rejected() {
        assert!(LinkType::try_from(99).is_err());
        assert!(ConnectionState::try_from(-1).is_err());
        assert!(AlbumType::try_from(17).is_err());
    }

    #[test]
    fn connection_state_mapping() {
        assert_eq!(
            ConnectionState::try_from(crate::ffi::SP_CONNECTION_STATE_LOGGED_IN),
            Ok(ConnectionState::LoggedIn)
        );
        assert_eq!(
            ConnectionState::try_from(crate::ffi::SP_CONNECTION_STATE_OFFLINE),
            Ok(ConnectionState::Offline)
        );
    }

    #[test]
    fn default_config_has_a_user_agent() {
        let config = NativeConfig::default();
        assert!(config.user_agent.starts_with("respot/"));
    }
}
