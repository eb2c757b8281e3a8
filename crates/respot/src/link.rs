//! Links: the parsed form of object URIs.

use std::fmt;
use std::time::Duration;

use respot_core::capi::{LinkType, ObjectKind, RawHandle};

use crate::album::Album;
use crate::artist::Artist;
use crate::browse;
use crate::error::{Error, Result};
use crate::handle::HandleRef;
use crate::image::Image;
use crate::playlist::Playlist;
use crate::serialized;
use crate::session::Session;
use crate::track::Track;
use crate::user::User;
use crate::util;

/// A parsed object URI.
///
/// Obtained from [`Session::get_link`] or from the `link()` accessor on most
/// wrapper types. A link has exactly one declared [`LinkType`] and converts
/// to at most one typed object per target kind.
pub struct Link {
    session: Session,
    handle: HandleRef,
}

impl Link {
    /// Parse a URI string through the native parser.
    pub(crate) fn from_uri(session: &Session, uri: &str) -> Result<Link> {
        let raw = {
            let _guard = serialized::native_call();
            session.lib().link_create_from_string(uri)
        };
        if raw.is_null() {
            return Err(Error::InvalidUri(uri.to_owned()));
        }
        // Fresh reference from the parser, no extra acquire.
        Link::from_raw(session, raw, false)
    }

    pub(crate) fn from_raw(session: &Session, raw: RawHandle, acquire: bool) -> Result<Link> {
        Ok(Link {
            session: session.clone(),
            handle: HandleRef::wrap(session.lib().clone(), ObjectKind::Link, raw, acquire)?,
        })
    }

    /// Canonical URI of the link. Round-trips byte for byte with the string
    /// the link was parsed from.
    pub fn to_uri(&self) -> String {
        let _guard = serialized::native_call();
        util::read_growing_buffer(|buffer| {
            self.session.lib().link_as_string(self.handle.raw(), buffer)
        })
    }

    pub fn link_type(&self) -> LinkType {
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().link_type(self.handle.raw())
        };
        LinkType::try_from(raw).unwrap_or_else(|unknown| {
            tracing::warn!(%unknown, "unknown link type from native library");
            LinkType::Invalid
        })
    }

    /// The track this link points to, or `None` for other link types.
    pub fn as_track(&self) -> Result<Option<Track>> {
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().link_as_track(self.handle.raw())
        };
        if raw.is_null() {
            return Ok(None);
        }
        // Borrowed from the link, so acquire our own reference.
        Track::from_raw(&self.session, raw, true).map(Some)
    }

    /// Like [`Link::as_track`], with the playback offset encoded in the URI.
    pub fn as_track_with_offset(&self) -> Result<Option<(Track, Duration)>> {
        let (raw, offset_ms) = {
            let _guard = serialized::native_call();
            self.session.lib().link_as_track_and_offset(self.handle.raw())
        };
        if raw.is_null() {
            return Ok(None);
        }
        let track = Track::from_raw(&self.session, raw, true)?;
        Ok(Some((track, Duration::from_millis(u64::from(offset_ms)))))
    }

    pub fn as_album(&self) -> Result<Option<Album>> {
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().link_as_album(self.handle.raw())
        };
        if raw.is_null() {
            return Ok(None);
        }
        Album::from_raw(&self.session, raw, true).map(Some)
    }

    pub fn as_artist(&self) -> Result<Option<Artist>> {
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().link_as_artist(self.handle.raw())
        };
        if raw.is_null() {
            return Ok(None);
        }
        Artist::from_raw(&self.session, raw, true).map(Some)
    }

    pub fn as_user(&self) -> Result<Option<User>> {
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().link_as_user(self.handle.raw())
        };
        if raw.is_null() {
            return Ok(None);
        }
        User::from_raw(&self.session, raw, true).map(Some)
    }

    /// The playlist this link points to.
    ///
    /// Unlike the borrowing conversions above this goes through the native
    /// playlist constructor, so the result is identity-cached: converting
    /// the same playlist twice yields the same wrapper.
    pub fn as_playlist(&self) -> Result<Option<Playlist>> {
        match self.link_type() {
            LinkType::Playlist | LinkType::Starred => {}
            _ => return Ok(None),
        }
        let raw = {
            let _guard = serialized::native_call();
            self.session
                .lib()
                .playlist_create(self.session.raw(), self.handle.raw())
        };
        if raw.is_null() {
            return Ok(None);
        }
        Playlist::cached(&self.session, raw, false).map(Some)
    }

    /// The image this link points to. Loading starts immediately.
    pub fn as_image(&self) -> Result<Option<Image>> {
        if self.link_type() != LinkType::Image {
            return Ok(None);
        }
        let token = browse::next_token();
        let raw = {
            let _guard = serialized::native_call();
            self.session
                .lib()
                .image_create_from_link(self.session.raw(), self.handle.raw(), token)
        };
        if raw.is_null() {
            return Ok(None);
        }
        Image::from_raw(&self.session, raw, false).map(Some)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Link({:?})", self.to_uri())
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.to_uri() == other.to_uri()
    }
}

impl Eq for Link {}
