//! Playlists, playlist track views and the root container.
//!
//! Playlists are singleton-per-handle: the native library hands out the same
//! playlist object to everyone, so wrappers go through the identity cache and
//! two lookups of the same handle compare equal.

use std::fmt;
use std::sync::Arc;

use respot_core::capi::{ObjectKind, RawHandle};

use crate::error::{Result, check};
use crate::handle::HandleRef;
use crate::loadable::Loadable;
use crate::registry;
use crate::serialized;
use crate::session::Session;
use crate::track::Track;
use crate::user::User;
use crate::util;

#[derive(Clone)]
pub struct Playlist {
    inner: Arc<PlaylistInner>,
}

struct PlaylistInner {
    session: Session,
    handle: HandleRef,
}

impl Playlist {
    /// Wrap a playlist handle through the identity cache.
    ///
    /// The handle reference is taken over (or acquired) up front; if a live
    /// wrapper already exists the fresh reference is dropped again, keeping
    /// the native count balanced.
    pub(crate) fn cached(session: &Session, raw: RawHandle, acquire: bool) -> Result<Playlist> {
        let handle = HandleRef::wrap(session.lib().clone(), ObjectKind::Playlist, raw, acquire)?;
        let session_for_factory = session.clone();
        let inner = registry::get_or_create(session.lib(), raw, move || {
            Ok(Arc::new(PlaylistInner {
                session: session_for_factory,
                handle,
            }))
        })?;
        Ok(Playlist { inner })
    }

    /// Playlist name, or `None` while unloaded.
    pub fn name(&self) -> Option<String> {
        let _guard = serialized::native_call();
        util::non_empty(self.inner.session.lib().playlist_name(self.inner.handle.raw()))
    }

    /// Rename the playlist.
    pub fn rename(&self, name: &str) -> Result<()> {
        let _guard = serialized::native_call();
        check(
            self.inner
                .session
                .lib()
                .playlist_rename(self.inner.handle.raw(), name),
        )
    }

    /// Number of tracks in the playlist.
    pub fn num_tracks(&self) -> usize {
        let _guard = serialized::native_call();
        self.inner
            .session
            .lib()
            .playlist_num_tracks(self.inner.handle.raw())
            .max(0) as usize
    }

    /// View of the track at `index`, or `None` when out of range.
    pub fn track(&self, index: usize) -> Option<PlaylistTrack> {
        if index >= self.num_tracks() {
            return None;
        }
        Some(PlaylistTrack {
            playlist: self.clone(),
            index: index as i32,
        })
    }

    /// Views of all tracks in playlist order.
    pub fn tracks(&self) -> Vec<PlaylistTrack> {
        (0..self.num_tracks())
            .map(|index| PlaylistTrack {
                playlist: self.clone(),
                index: index as i32,
            })
            .collect()
    }
}

impl Loadable for Playlist {
    fn session(&self) -> &Session {
        &self.inner.session
    }

    fn handle(&self) -> &HandleRef {
        &self.inner.handle
    }
}

/// Identity comparison: same native playlist, same wrapper.
impl PartialEq for Playlist {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Playlist {}

impl fmt::Debug for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Playlist").field("name", &self.name()).finish()
    }
}

/// A position in a playlist, with the per-position metadata the native
/// library keeps alongside the track itself.
pub struct PlaylistTrack {
    playlist: Playlist,
    index: i32,
}

impl PlaylistTrack {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// The track at this position.
    pub fn track(&self) -> Result<Option<Track>> {
        let raw = {
            let _guard = serialized::native_call();
            self.lib().playlist_track(self.raw(), self.index)
        };
        if raw.is_null() {
            return Ok(None);
        }
        Track::from_raw(&self.playlist.inner.session, raw, true).map(Some)
    }

    /// Unix timestamp of when the track was added, or `None` if unknown.
    pub fn create_time(&self) -> Option<i64> {
        let _guard = serialized::native_call();
        let seconds = self.lib().playlist_track_create_time(self.raw(), self.index);
        if seconds == 0 { None } else { Some(seconds) }
    }

    /// The user who added the track.
    pub fn creator(&self) -> Result<Option<User>> {
        let raw = {
            let _guard = serialized::native_call();
            self.lib().playlist_track_creator(self.raw(), self.index)
        };
        if raw.is_null() {
            return Ok(None);
        }
        User::from_raw(&self.playlist.inner.session, raw, true).map(Some)
    }

    pub fn seen(&self) -> bool {
        let _guard = serialized::native_call();
        self.lib().playlist_track_seen(self.raw(), self.index)
    }

    pub fn set_seen(&self, seen: bool) -> Result<()> {
        let _guard = serialized::native_call();
        check(self.lib().playlist_track_set_seen(self.raw(), self.index, seen))
    }

    /// Message attached when the track was shared, or `None`.
    pub fn message(&self) -> Option<String> {
        let _guard = serialized::native_call();
        util::non_empty(self.lib().playlist_track_message(self.raw(), self.index))
    }

    fn lib(&self) -> &Arc<dyn respot_core::capi::NativeLib> {
        self.playlist.inner.session.lib()
    }

    fn raw(&self) -> RawHandle {
        self.playlist.inner.handle.raw()
    }
}

impl fmt::Debug for PlaylistTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaylistTrack")
            .field("index", &self.index)
            .finish()
    }
}

/// The root container of a user's playlists. Identity-cached like playlists.
#[derive(Clone)]
pub struct PlaylistContainer {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    session: Session,
    handle: HandleRef,
}

impl PlaylistContainer {
    pub(crate) fn cached(
        session: &Session,
        raw: RawHandle,
        acquire: bool,
    ) -> Result<PlaylistContainer> {
        let handle =
            HandleRef::wrap(session.lib().clone(), ObjectKind::PlaylistContainer, raw, acquire)?;
        let session_for_factory = session.clone();
        let inner = registry::get_or_create(session.lib(), raw, move || {
            Ok(Arc::new(ContainerInner {
                session: session_for_factory,
                handle,
            }))
        })?;
        Ok(PlaylistContainer { inner })
    }

    pub fn len(&self) -> usize {
        let _guard = serialized::native_call();
        self.inner
            .session
            .lib()
            .container_num_playlists(self.inner.handle.raw())
            .max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The playlist at `index`, or `None` when out of range.
    pub fn playlist(&self, index: usize) -> Result<Option<Playlist>> {
        let raw = {
            let _guard = serialized::native_call();
            self.inner
                .session
                .lib()
                .container_playlist(self.inner.handle.raw(), index as i32)
        };
        if raw.is_null() {
            return Ok(None);
        }
        Playlist::cached(&self.inner.session, raw, true).map(Some)
    }

    pub fn playlists(&self) -> Result<Vec<Playlist>> {
        (0..self.len())
            .filter_map(|index| self.playlist(index).transpose())
            .collect()
    }
}

impl Loadable for PlaylistContainer {
    fn session(&self) -> &Session {
        &self.inner.session
    }

    fn handle(&self) -> &HandleRef {
        &self.inner.handle
    }
}

impl PartialEq for PlaylistContainer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for PlaylistContainer {}

impl fmt::Debug for PlaylistContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaylistContainer")
            .field("len", &self.len())
            .finish()
    }
}
