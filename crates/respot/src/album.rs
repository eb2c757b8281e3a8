//! Album wrapper.

use std::fmt;

use respot_core::capi::{AlbumType, ObjectKind, RawHandle};

use crate::artist::Artist;
use crate::browse::{AlbumBrowser, BrowseCallback};
use crate::error::{Error, Result};
use crate::handle::HandleRef;
use crate::image::Image;
use crate::link::Link;
use crate::loadable::Loadable;
use crate::serialized;
use crate::session::Session;
use crate::util;
use crate::browse;

pub struct Album {
    session: Session,
    pub(crate) handle: HandleRef,
}

impl Album {
    pub(crate) fn from_raw(session: &Session, raw: RawHandle, acquire: bool) -> Result<Album> {
        Ok(Album {
            session: session.clone(),
            handle: HandleRef::wrap(session.lib().clone(), ObjectKind::Album, raw, acquire)?,
        })
    }

    /// Album name, or `None` while unloaded.
    pub fn name(&self) -> Option<String> {
        let _guard = serialized::native_call();
        util::non_empty(self.session.lib().album_name(self.handle.raw()))
    }

    /// Release year, or `None` while unloaded.
    pub fn year(&self) -> Option<i32> {
        if !self.is_loaded() {
            return None;
        }
        let _guard = serialized::native_call();
        Some(self.session.lib().album_year(self.handle.raw()))
    }

    /// Release type, or `None` while unloaded.
    pub fn album_type(&self) -> Option<AlbumType> {
        if !self.is_loaded() {
            return None;
        }
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().album_type(self.handle.raw())
        };
        Some(AlbumType::try_from(raw).unwrap_or(AlbumType::Unknown))
    }

    /// Whether the album is available in the current region, or `None`
    /// while unloaded.
    pub fn is_available(&self) -> Option<bool> {
        if !self.is_loaded() {
            return None;
        }
        let _guard = serialized::native_call();
        Some(self.session.lib().album_is_available(self.handle.raw()))
    }

    /// The album's main artist, or `None` while unloaded.
    pub fn artist(&self) -> Result<Option<Artist>> {
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().album_artist(self.handle.raw())
        };
        if raw.is_null() {
            return Ok(None);
        }
        Artist::from_raw(&self.session, raw, true).map(Some)
    }

    /// The album cover image, or `None` if no cover is known yet. Loading
    /// starts immediately.
    pub fn cover(&self) -> Result<Option<Image>> {
        let token = browse::next_token();
        let raw = {
            let _guard = serialized::native_call();
            self.session
                .lib()
                .album_cover(self.session.raw(), self.handle.raw(), token)
        };
        if raw.is_null() {
            return Ok(None);
        }
        Image::from_raw(&self.session, raw, false).map(Some)
    }

    /// A link to this album.
    pub fn link(&self) -> Result<Link> {
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().link_create_from_album(self.handle.raw())
        };
        if raw.is_null() {
            return Err(Error::InvalidHandle);
        }
        Link::from_raw(&self.session, raw, false)
    }

    /// Issue an asynchronous browse of the album's track list.
    pub fn browse(&self, callback: Option<BrowseCallback<AlbumBrowser>>) -> Result<AlbumBrowser> {
        AlbumBrowser::create(&self.session, self, callback)
    }
}

impl Loadable for Album {
    fn session(&self) -> &Session {
        &self.session
    }

    fn handle(&self) -> &HandleRef {
        &self.handle
    }
}

impl fmt::Debug for Album {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Album").field("name", &self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use respot_core::capi::NativeLib;
    use respot_core::mock::MockLib;
    use std::sync::Arc;

    fn new_session() -> (Arc<MockLib>, Session) {
        let mock = Arc::new(MockLib::new());
        let session = Session::new(
            Arc::clone(&mock) as Arc<dyn NativeLib>,
            &SessionConfig::default(),
        )
        .expect("session");
        (mock, session)
    }

    #[test]
    fn unloaded_album_reports_unknown_metadata() {
        let (_, session) = new_session();
        let album = session.get_album("spotify:album:pending").unwrap();
        assert_eq!(album.name(), None);
        assert_eq!(album.year(), None);
        assert_eq!(album.album_type(), None);
        assert_eq!(album.is_available(), None);
    }

    #[test]
    fn loaded_album_exposes_metadata() {
        let (mock, session) = new_session();
        mock.set_album("spotify:album:ram", "Random Access Memories", 2013, "spotify:artist:daft");
        mock.set_artist("spotify:artist:daft", "Daft Punk");

        let album = session.get_album("spotify:album:ram").unwrap();
        assert_eq!(album.name().as_deref(), Some("Random Access Memories"));
        assert_eq!(album.year(), Some(2013));
        assert_eq!(album.album_type(), Some(AlbumType::Album));
        assert_eq!(album.is_available(), Some(true));
        assert_eq!(
            album.artist().unwrap().unwrap().name().as_deref(),
            Some("Daft Punk")
        );
    }

    #[test]
    fn repeated_artist_conversions_each_acquire() {
        let (mock, session) = new_session();
        mock.set_album("spotify:album:ram", "RAM", 2013, "spotify:artist:daft");
        let album = session.get_album("spotify:album:ram").unwrap();

        let first = album.artist().unwrap().unwrap();
        let second = album.artist().unwrap().unwrap();
        let artist = mock.handle_for("spotify:artist:daft").unwrap();
        assert_eq!(mock.add_ref_calls(artist), 2);
        assert_eq!(mock.refcount(artist), Some(3));
        drop(first);
        drop(second);
        assert_eq!(mock.refcount(artist), Some(1));
    }

    #[test]
    fn cover_creates_a_pending_image() {
        let (mock, session) = new_session();
        mock.set_album("spotify:album:ram", "RAM", 2013, "spotify:artist:daft");
        let album = session.get_album("spotify:album:ram").unwrap();

        let cover = album.cover().unwrap().expect("cover image");
        assert!(!cover.is_loaded());
        session.process_events().unwrap();
        assert!(cover.is_loaded());

        let unknown = session.get_album("spotify:album:no-cover");
        // Albums with no registered metadata still produce a cover handle in
        // the mock; a null from the native side maps to None instead.
        assert!(unknown.is_ok());
    }
}
