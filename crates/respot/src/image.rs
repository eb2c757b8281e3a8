//! Image wrapper.

use std::fmt;

use respot_core::capi::{ObjectKind, RawHandle};

use crate::error::{Error, Result};
use crate::handle::HandleRef;
use crate::link::Link;
use crate::loadable::Loadable;
use crate::serialized;
use crate::session::Session;

pub struct Image {
    session: Session,
    handle: HandleRef,
}

impl Image {
    pub(crate) fn from_raw(session: &Session, raw: RawHandle, acquire: bool) -> Result<Image> {
        Ok(Image {
            session: session.clone(),
            handle: HandleRef::wrap(session.lib().clone(), ObjectKind::Image, raw, acquire)?,
        })
    }

    /// Native format discriminant, or `None` while unloaded.
    pub fn format(&self) -> Option<i32> {
        if !self.is_loaded() {
            return None;
        }
        let _guard = serialized::native_call();
        Some(self.session.lib().image_format(self.handle.raw()))
    }

    /// Raw image bytes, or `None` while unloaded.
    pub fn data(&self) -> Option<Vec<u8>> {
        if !self.is_loaded() {
            return None;
        }
        let _guard = serialized::native_call();
        Some(self.session.lib().image_data(self.handle.raw()))
    }

    /// A link to this image.
    pub fn link(&self) -> Result<Link> {
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().link_create_from_image(self.handle.raw())
        };
        if raw.is_null() {
            return Err(Error::InvalidHandle);
        }
        Link::from_raw(&self.session, raw, false)
    }
}

impl Loadable for Image {
    fn session(&self) -> &Session {
        &self.session
    }

    fn handle(&self) -> &HandleRef {
        &self.handle
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
