//! Artist wrapper.

use std::fmt;

use respot_core::capi::{ObjectKind, RawHandle};

use crate::browse::{ArtistBrowser, BrowseCallback};
use crate::error::{Error, Result};
use crate::handle::HandleRef;
use crate::link::Link;
use crate::loadable::Loadable;
use crate::serialized;
use crate::session::Session;
use crate::util;

pub struct Artist {
    session: Session,
    pub(crate) handle: HandleRef,
}

impl Artist {
    pub(crate) fn from_raw(session: &Session, raw: RawHandle, acquire: bool) -> Result<Artist> {
        Ok(Artist {
            session: session.clone(),
            handle: HandleRef::wrap(session.lib().clone(), ObjectKind::Artist, raw, acquire)?,
        })
    }

    /// Artist name, or `None` while unloaded.
    pub fn name(&self) -> Option<String> {
        let _guard = serialized::native_call();
        util::non_empty(self.session.lib().artist_name(self.handle.raw()))
    }

    /// A link to this artist.
    pub fn link(&self) -> Result<Link> {
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().link_create_from_artist(self.handle.raw())
        };
        if raw.is_null() {
            return Err(Error::InvalidHandle);
        }
        Link::from_raw(&self.session, raw, false)
    }

    /// Issue an asynchronous browse of this artist's catalogue.
    pub fn browse(&self, callback: Option<BrowseCallback<ArtistBrowser>>) -> Result<ArtistBrowser> {
        ArtistBrowser::create(&self.session, self, callback)
    }
}

impl Loadable for Artist {
    fn session(&self) -> &Session {
        &self.session
    }

    fn handle(&self) -> &HandleRef {
        &self.handle
    }
}

impl fmt::Debug for Artist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artist").field("name", &self.name()).finish()
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
    fn name_is_none_until_loaded() {
        let (mock, session) = new_session();
        let artist = session.get_artist("spotify:artist:a").unwrap();
        assert_eq!(artist.name(), None);

        mock.set_artist("spotify:artist:a", "Daft Punk");
        assert_eq!(artist.name().as_deref(), Some("Daft Punk"));
    }

    #[test]
    fn link_round_trips() {
        let (mock, session) = new_session();
        mock.set_artist("spotify:artist:a", "Daft Punk");
        let artist = session.get_artist("spotify:artist:a").unwrap();
        assert_eq!(artist.link().unwrap().to_uri(), "spotify:artist:a");
    }
}
