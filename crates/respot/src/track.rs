//! Track wrapper.

use std::fmt;
use std::time::Duration;

use respot_core::capi::{ObjectKind, RawHandle};

use crate::album::Album;
use crate::artist::Artist;
use crate::error::Result;
use crate::handle::HandleRef;
use crate::link::Link;
use crate::loadable::Loadable;
use crate::serialized;
use crate::session::Session;
use crate::util;

/// A track. Metadata is available once the track [`Loadable::load`]s.
pub struct Track {
    session: Session,
    pub(crate) handle: HandleRef,
}

impl Track {
    pub(crate) fn from_raw(session: &Session, raw: RawHandle, acquire: bool) -> Result<Track> {
        Ok(Track {
            session: session.clone(),
            handle: HandleRef::wrap(session.lib().clone(), ObjectKind::Track, raw, acquire)?,
        })
    }

    /// Track name, or `None` while unloaded.
    pub fn name(&self) -> Option<String> {
        let _guard = serialized::native_call();
        util::non_empty(self.session.lib().track_name(self.handle.raw()))
    }

    /// Track duration, or `None` while unloaded.
    pub fn duration(&self) -> Option<Duration> {
        if !self.is_loaded() {
            return None;
        }
        let _guard = serialized::native_call();
        let ms = self.session.lib().track_duration_ms(self.handle.raw());
        Some(Duration::from_millis(ms.max(0) as u64))
    }

    /// The track's artists, in credited order. Empty while unloaded.
    pub fn artists(&self) -> Result<Vec<Artist>> {
        let raws: Vec<RawHandle> = {
            let _guard = serialized::native_call();
            let lib = self.session.lib();
            let count = lib.track_num_artists(self.handle.raw());
            (0..count)
                .map(|index| lib.track_artist(self.handle.raw(), index))
                .filter(|raw| !raw.is_null())
                .collect()
        };
        raws.into_iter()
            .map(|raw| Artist::from_raw(&self.session, raw, true))
            .collect()
    }

    /// The album the track appears on, or `None` while unloaded.
    pub fn album(&self) -> Result<Option<Album>> {
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().track_album(self.handle.raw())
        };
        if raw.is_null() {
            return Ok(None);
        }
        Album::from_raw(&self.session, raw, true).map(Some)
    }

    /// A link to this track.
    pub fn link(&self) -> Result<Link> {
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().link_create_from_track(self.handle.raw(), 0)
        };
        if raw.is_null() {
            return Err(crate::error::Error::InvalidHandle);
        }
        Link::from_raw(&self.session, raw, false)
    }

    /// A link to this track at a playback offset.
    pub fn link_with_offset(&self, offset: Duration) -> Result<Link> {
        let raw = {
            let _guard = serialized::native_call();
            self.session
                .lib()
                .link_create_from_track(self.handle.raw(), offset.as_millis() as u32)
        };
        if raw.is_null() {
            return Err(crate::error::Error::InvalidHandle);
        }
        Link::from_raw(&self.session, raw, false)
    }
}

impl Loadable for Track {
    fn session(&self) -> &Session {
        &self.session
    }

    fn handle(&self) -> &HandleRef {
        &self.handle
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track").field("name", &self.name()).finish()
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
    fn unloaded_track_reports_unknown_metadata() {
        let (_, session) = new_session();
        let track = session.get_track("spotify:track:pending").unwrap();
        assert!(!track.is_loaded());
        assert_eq!(track.name(), None);
        assert_eq!(track.duration(), None);
        assert!(track.artists().unwrap().is_empty());
        assert!(track.album().unwrap().is_none());
    }

    #[test]
    fn loaded_track_exposes_metadata() {
        let (mock, session) = new_session();
        mock.set_track(
            "spotify:track:lucky",
            "Get Lucky",
            248_000,
            &["spotify:artist:daft"],
        );
        mock.set_artist("spotify:artist:daft", "Daft Punk");

        let track = session.get_track("spotify:track:lucky").unwrap();
        assert!(track.is_loaded());
        assert_eq!(track.name().as_deref(), Some("Get Lucky"));
        assert_eq!(track.duration(), Some(Duration::from_millis(248_000)));

        let artists = track.artists().unwrap();
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].name().as_deref(), Some("Daft Punk"));
    }

    #[test]
    fn link_round_trips_the_uri() {
        let (mock, session) = new_session();
        mock.set_track("spotify:track:lucky", "Get Lucky", 248_000, &[]);
        let track = session.get_track("spotify:track:lucky").unwrap();

        let link = track.link().unwrap();
        assert_eq!(link.to_uri(), "spotify:track:lucky");

        let offset_link = track.link_with_offset(Duration::from_secs(83)).unwrap();
        assert_eq!(offset_link.to_uri(), "spotify:track:lucky#1:23");
        let (_, offset) = offset_link.as_track_with_offset().unwrap().unwrap();
        assert_eq!(offset, Duration::from_secs(83));
    }

    #[test]
    fn each_artists_call_acquires_fresh_references() {
        let (mock, session) = new_session();
        mock.set_track("spotify:track:t", "T", 1_000, &["spotify:artist:a"]);
        let track = session.get_track("spotify:track:t").unwrap();

        let first = track.artists().unwrap();
        let second = track.artists().unwrap();
        let artist = mock.handle_for("spotify:artist:a").unwrap();
        assert_eq!(mock.add_ref_calls(artist), 2);
        drop(first);
        drop(second);
        assert_eq!(mock.release_calls(artist), 2);
        assert_eq!(mock.refcount(artist), Some(1));
    }
}
