//! Raw C ABI of the native streaming library.
//!
//! This module declares the subset of the native library's C surface that the
//! binding is written against: status codes, enum discriminants, opaque handle
//! types and the session callback table. All types use `#[repr(C)]` to match
//! the library's layout.
//!
//! Nothing in the workspace links the native binary directly; the safe layer
//! reaches it through the [`crate::capi::NativeLib`] trait, whose production
//! implementation binds these symbols. See DESIGN notes in the repository
//! root.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_void};

/// API version the declarations below correspond to.
pub const SP_API_VERSION: c_int = 12;

// ============================================================================
// Status codes
// ============================================================================

/// Native status code. `0` is success; everything else is an error.
pub type sp_error = c_int;

pub const SP_ERROR_OK: sp_error = 0;
pub const SP_ERROR_BAD_API_VERSION: sp_error = 1;
pub const SP_ERROR_API_INITIALIZATION_FAILED: sp_error = 2;
pub const SP_ERROR_TRACK_NOT_PLAYABLE: sp_error = 3;
pub const SP_ERROR_BAD_APPLICATION_KEY: sp_error = 5;
pub const SP_ERROR_BAD_USERNAME_OR_PASSWORD: sp_error = 6;
pub const SP_ERROR_USER_BANNED: sp_error = 7;
pub const SP_ERROR_UNABLE_TO_CONTACT_SERVER: sp_error = 8;
pub const SP_ERROR_CLIENT_TOO_OLD: sp_error = 9;
pub const SP_ERROR_OTHER_PERMANENT: sp_error = 10;
pub const SP_ERROR_BAD_USER_AGENT: sp_error = 11;
pub const SP_ERROR_MISSING_CALLBACK: sp_error = 12;
pub const SP_ERROR_INVALID_INDATA: sp_error = 13;
pub const SP_ERROR_INDEX_OUT_OF_RANGE: sp_error = 14;
pub const SP_ERROR_USER_NEEDS_PREMIUM: sp_error = 15;
pub const SP_ERROR_OTHER_TRANSIENT: sp_error = 16;
pub const SP_ERROR_IS_LOADING: sp_error = 17;
pub const SP_ERROR_NO_STREAM_AVAILABLE: sp_error = 18;
pub const SP_ERROR_PERMISSION_DENIED: sp_error = 19;
pub const SP_ERROR_INBOX_IS_FULL: sp_error = 20;
pub const SP_ERROR_NO_CACHE: sp_error = 21;
pub const SP_ERROR_NO_SUCH_USER: sp_error = 22;
pub const SP_ERROR_NO_CREDENTIALS: sp_error = 23;
pub const SP_ERROR_NETWORK_DISABLED: sp_error = 24;
pub const SP_ERROR_INVALID_DEVICE_ID: sp_error = 25;
pub const SP_ERROR_CANT_OPEN_TRACE_FILE: sp_error = 26;
pub const SP_ERROR_APPLICATION_BANNED: sp_error = 27;
pub const SP_ERROR_OFFLINE_TOO_MANY_TRACKS: sp_error = 31;
pub const SP_ERROR_OFFLINE_DISK_CACHE: sp_error = 32;
pub const SP_ERROR_OFFLINE_EXPIRED: sp_error = 33;
pub const SP_ERROR_OFFLINE_NOT_ALLOWED: sp_error = 34;
pub const SP_ERROR_OFFLINE_LICENSE_LOST: sp_error = 35;
pub const SP_ERROR_OFFLINE_LICENSE_ERROR: sp_error = 36;
pub const SP_ERROR_LASTFM_AUTH_ERROR: sp_error = 39;
pub const SP_ERROR_INVALID_ARGUMENT: sp_error = 40;
pub const SP_ERROR_SYSTEM_FAILURE: sp_error = 41;

// ============================================================================
// Enum discriminants
// ============================================================================

pub type sp_linktype = c_int;

pub const SP_LINKTYPE_INVALID: sp_linktype = 0;
pub const SP_LINKTYPE_TRACK: sp_linktype = 1;
pub const SP_LINKTYPE_ALBUM: sp_linktype = 2;
pub const SP_LINKTYPE_ARTIST: sp_linktype = 3;
pub const SP_LINKTYPE_SEARCH: sp_linktype = 4;
pub const SP_LINKTYPE_PLAYLIST: sp_linktype = 5;
pub const SP_LINKTYPE_PROFILE: sp_linktype = 6;
pub const SP_LINKTYPE_STARRED: sp_linktype = 7;
pub const SP_LINKTYPE_LOCALTRACK: sp_linktype = 8;
pub const SP_LINKTYPE_IMAGE: sp_linktype = 9;

pub type sp_connectionstate = c_int;

pub const SP_CONNECTION_STATE_LOGGED_OUT: sp_connectionstate = 0;
pub const SP_CONNECTION_STATE_LOGGED_IN: sp_connectionstate = 1;
pub const SP_CONNECTION_STATE_DISCONNECTED: sp_connectionstate = 2;
pub const SP_CONNECTION_STATE_UNDEFINED: sp_connectionstate = 3;
pub const SP_CONNECTION_STATE_OFFLINE: sp_connectionstate = 4;

pub type sp_albumtype = c_int;

pub const SP_ALBUMTYPE_ALBUM: sp_albumtype = 0;
pub const SP_ALBUMTYPE_SINGLE: sp_albumtype = 1;
pub const SP_ALBUMTYPE_COMPILATION: sp_albumtype = 2;
pub const SP_ALBUMTYPE_UNKNOWN: sp_albumtype = 3;

pub type sp_sampletype = c_int;

pub const SP_SAMPLETYPE_INT16_NATIVE_ENDIAN: sp_sampletype = 0;

/// Audio delivery format passed alongside sample frames.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct sp_audioformat {
    pub sample_type: sp_sampletype,
    pub sample_rate: c_int,
    pub channels: c_int,
}

// ============================================================================
// Opaque handle types
// ============================================================================

macro_rules! opaque {
    ($($(#[$doc:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$doc])*
            #[repr(C)]
            pub struct $name {
                _private: [u8; 0],
            }
        )+
    };
}

opaque! {
    /// A native session instance.
    sp_session,
    sp_track,
    sp_album,
    sp_artist,
    sp_link,
    sp_image,
    sp_playlist,
    sp_playlistcontainer,
    sp_albumbrowse,
    sp_artistbrowse,
    sp_search,
    sp_user,
}

// ============================================================================
// Callback tables
// ============================================================================

/// Completion callback for an asynchronous album browse request.
pub type albumbrowse_complete_cb =
    Option<extern "C" fn(result: *mut sp_albumbrowse, userdata: *mut c_void)>;

/// Completion callback for an asynchronous artist browse request.
pub type artistbrowse_complete_cb =
    Option<extern "C" fn(result: *mut sp_artistbrowse, userdata: *mut c_void)>;

/// Completion callback for an asynchronous search request.
pub type search_complete_cb =
    Option<extern "C" fn(result: *mut sp_search, userdata: *mut c_void)>;

/// Completion callback for an asynchronous image load.
pub type image_loaded_cb = Option<extern "C" fn(image: *mut sp_image, userdata: *mut c_void)>;

/// Session-level callback table, registered once at session creation.
///
/// Every callback is invoked by the native library on its internal thread,
/// except `music_delivery`, `get_audio_buffer_stats` and `log_message` which
/// may arrive on dedicated I/O threads.
#[repr(C)]
pub struct sp_session_callbacks {
    pub logged_in: Option<extern "C" fn(session: *mut sp_session, error: sp_error)>,
    pub logged_out: Option<extern "C" fn(session: *mut sp_session)>,
    pub metadata_updated: Option<extern "C" fn(session: *mut sp_session)>,
    pub connection_error: Option<extern "C" fn(session: *mut sp_session, error: sp_error)>,
    pub message_to_user: Option<extern "C" fn(session: *mut sp_session, message: *const c_char)>,
    pub notify_main_thread: Option<extern "C" fn(session: *mut sp_session)>,
    pub music_delivery: Option<
        extern "C" fn(
            session: *mut sp_session,
            format: *const sp_audioformat,
            frames: *const c_void,
            num_frames: c_int,
        ) -> c_int,
    >,
    pub play_token_lost: Option<extern "C" fn(session: *mut sp_session)>,
    pub log_message: Option<extern "C" fn(session: *mut sp_session, message: *const c_char)>,
    pub end_of_track: Option<extern "C" fn(session: *mut sp_session)>,
    pub streaming_error: Option<extern "C" fn(session: *mut sp_session, error: sp_error)>,
    pub credentials_blob_updated:
        Option<extern "C" fn(session: *mut sp_session, blob: *const c_char)>,
    pub connectionstate_updated: Option<extern "C" fn(session: *mut sp_session)>,
    pub scrobble_error: Option<extern "C" fn(session: *mut sp_session, error: sp_error)>,
    pub private_session_mode_changed:
        Option<extern "C" fn(session: *mut sp_session, is_private: bool)>,
}

/// Session creation parameters.
#[repr(C)]
pub struct sp_session_config {
    pub api_version: c_int,
    pub cache_location: *const c_char,
    pub settings_location: *const c_char,
    pub application_key: *const c_void,
    pub application_key_size: usize,
    pub user_agent: *const c_char,
    pub callbacks: *const sp_session_callbacks,
    pub userdata: *mut c_void,
}

// ============================================================================
// Function declarations
// ============================================================================

unsafe extern "C" {
    // Session lifecycle
    pub fn sp_session_create(
        config: *const sp_session_config,
        session: *mut *mut sp_session,
    ) -> sp_error;
    pub fn sp_session_release(session: *mut sp_session) -> sp_error;

    /// Drive the library. Writes the recommended delay until the next call
    /// into `next_timeout` (milliseconds).
    pub fn sp_session_process_events(
        session: *mut sp_session,
        next_timeout: *mut c_int,
    ) -> sp_error;

    pub fn sp_session_login(
        session: *mut sp_session,
        username: *const c_char,
        password: *const c_char,
        remember_me: bool,
        blob: *const c_char,
    ) -> sp_error;
    pub fn sp_session_relogin(session: *mut sp_session) -> sp_error;
    pub fn sp_session_logout(session: *mut sp_session) -> sp_error;
    pub fn sp_session_forget_me(session: *mut sp_session) -> sp_error;

    /// Copy the remembered user name into `buffer`. Returns the length of the
    /// name, or -1 if no user is remembered.
    pub fn sp_session_remembered_user(
        session: *mut sp_session,
        buffer: *mut c_char,
        buffer_size: usize,
    ) -> c_int;

    pub fn sp_session_user(session: *mut sp_session) -> *mut sp_user;
    /// Canonical name of the logged-in user, or the empty string.
    pub fn sp_session_user_name(session: *mut sp_session) -> *const c_char;
    pub fn sp_session_connectionstate(session: *mut sp_session) -> sp_connectionstate;
    pub fn sp_session_starred_create(session: *mut sp_session) -> *mut sp_playlist;
    pub fn sp_session_playlistcontainer(session: *mut sp_session) -> *mut sp_playlistcontainer;

    // Links
    pub fn sp_link_create_from_string(link: *const c_char) -> *mut sp_link;
    pub fn sp_link_create_from_track(track: *mut sp_track, offset_ms: c_int) -> *mut sp_link;
    pub fn sp_link_create_from_album(album: *mut sp_album) -> *mut sp_link;
    pub fn sp_link_create_from_artist(artist: *mut sp_artist) -> *mut sp_link;
    pub fn sp_link_create_from_user(user: *mut sp_user) -> *mut sp_link;
    pub fn sp_link_create_from_image(image: *mut sp_image) -> *mut sp_link;

    /// Copy the canonical URI into `buffer`. Returns the length of the URI,
    /// which may exceed `buffer_size` (the copy is truncated in that case).
    pub fn sp_link_as_string(
        link: *mut sp_link,
        buffer: *mut c_char,
        buffer_size: c_int,
    ) -> c_int;

    pub fn sp_link_type(link: *mut sp_link) -> sp_linktype;
    pub fn sp_link_as_track(link: *mut sp_link) -> *mut sp_track;
    pub fn sp_link_as_track_and_offset(
        link: *mut sp_link,
        offset_ms: *mut c_int,
    ) -> *mut sp_track;
    pub fn sp_link_as_album(link: *mut sp_link) -> *mut sp_album;
    pub fn sp_link_as_artist(link: *mut sp_link) -> *mut sp_artist;
    pub fn sp_link_as_user(link: *mut sp_link) -> *mut sp_user;
    pub fn sp_link_add_ref(link: *mut sp_link) -> sp_error;
    pub fn sp_link_release(link: *mut sp_link) -> sp_error;

    // Object creation from links
    pub fn sp_playlist_create(session: *mut sp_session, link: *mut sp_link) -> *mut sp_playlist;
    pub fn sp_image_create_from_link(
        session: *mut sp_session,
        link: *mut sp_link,
    ) -> *mut sp_image;

    // Reference counting, load state and error state per object kind
    pub fn sp_track_add_ref(track: *mut sp_track) -> sp_error;
    pub fn sp_track_release(track: *mut sp_track) -> sp_error;
    pub fn sp_track_is_loaded(track: *mut sp_track) -> bool;
    pub fn sp_track_error(track: *mut sp_track) -> sp_error;
    pub fn sp_album_add_ref(album: *mut sp_album) -> sp_error;
    pub fn sp_album_release(album: *mut sp_album) -> sp_error;
    pub fn sp_album_is_loaded(album: *mut sp_album) -> bool;
    pub fn sp_artist_add_ref(artist: *mut sp_artist) -> sp_error;
    pub fn sp_artist_release(artist: *mut sp_artist) -> sp_error;
    pub fn sp_artist_is_loaded(artist: *mut sp_artist) -> bool;
    pub fn sp_user_add_ref(user: *mut sp_user) -> sp_error;
    pub fn sp_user_release(user: *mut sp_user) -> sp_error;
    pub fn sp_user_is_loaded(user: *mut sp_user) -> bool;
    pub fn sp_playlist_add_ref(playlist: *mut sp_playlist) -> sp_error;
    pub fn sp_playlist_release(playlist: *mut sp_playlist) -> sp_error;
    pub fn sp_playlist_is_loaded(playlist: *mut sp_playlist) -> bool;
    pub fn sp_image_add_ref(image: *mut sp_image) -> sp_error;
    pub fn sp_image_release(image: *mut sp_image) -> sp_error;
    pub fn sp_image_is_loaded(image: *mut sp_image) -> bool;
    pub fn sp_image_error(image: *mut sp_image) -> sp_error;

    // Asynchronous browse / search
    pub fn sp_albumbrowse_create(
        session: *mut sp_session,
        album: *mut sp_album,
        callback: albumbrowse_complete_cb,
        userdata: *mut c_void,
    ) -> *mut sp_albumbrowse;
    pub fn sp_albumbrowse_add_ref(browse: *mut sp_albumbrowse) -> sp_error;
    pub fn sp_albumbrowse_release(browse: *mut sp_albumbrowse) -> sp_error;
    pub fn sp_albumbrowse_is_loaded(browse: *mut sp_albumbrowse) -> bool;
    pub fn sp_albumbrowse_error(browse: *mut sp_albumbrowse) -> sp_error;

    pub fn sp_artistbrowse_create(
        session: *mut sp_session,
        artist: *mut sp_artist,
        callback: artistbrowse_complete_cb,
        userdata: *mut c_void,
    ) -> *mut sp_artistbrowse;
    pub fn sp_artistbrowse_add_ref(browse: *mut sp_artistbrowse) -> sp_error;
    pub fn sp_artistbrowse_release(browse: *mut sp_artistbrowse) -> sp_error;
    pub fn sp_artistbrowse_is_loaded(browse: *mut sp_artistbrowse) -> bool;
    pub fn sp_artistbrowse_error(browse: *mut sp_artistbrowse) -> sp_error;

    pub fn sp_search_create(
        session: *mut sp_session,
        query: *const c_char,
        track_offset: c_int,
        track_count: c_int,
        album_offset: c_int,
        album_count: c_int,
        artist_offset: c_int,
        artist_count: c_int,
        playlist_offset: c_int,
        playlist_count: c_int,
        callback: search_complete_cb,
        userdata: *mut c_void,
    ) -> *mut sp_search;
    pub fn sp_search_add_ref(search: *mut sp_search) -> sp_error;
    pub fn sp_search_release(search: *mut sp_search) -> sp_error;
    pub fn sp_search_error(search: *mut sp_search) -> sp_error;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_zero_is_success() {
        assert_eq!(SP_ERROR_OK, 0);
        assert_ne!(SP_ERROR_OTHER_PERMANENT, SP_ERROR_OTHER_TRANSIENT);
    }

    #[test]
    fn link_type_discriminants() {
        assert_eq!(SP_LINKTYPE_INVALID, 0);
        assert_eq!(SP_LINKTYPE_TRACK, 1);
        assert_eq!(SP_LINKTYPE_IMAGE, 9);
    }

    #[test]
    fn audio_format_is_plain_data() {
        let format = sp_audioformat {
            sample_type: SP_SAMPLETYPE_INT16_NATIVE_ENDIAN,
            sample_rate: 44_100,
            channels: 2,
        };
        let copy = format;
        assert_eq!(copy, format);
    }
}
