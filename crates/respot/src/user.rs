//! User wrapper.

use std::fmt;

use respot_core::capi::{ObjectKind, RawHandle};

use crate::error::{Error, Result};
use crate::handle::HandleRef;
use crate::link::Link;
use crate::loadable::Loadable;
use crate::serialized;
use crate::session::Session;
use crate::util;

pub struct User {
    session: Session,
    handle: HandleRef,
}

impl User {
    pub(crate) fn from_raw(session: &Session, raw: RawHandle, acquire: bool) -> Result<User> {
        Ok(User {
            session: session.clone(),
            handle: HandleRef::wrap(session.lib().clone(), ObjectKind::User, raw, acquire)?,
        })
    }

    /// The user's canonical (login) name, or `None` while unloaded.
    pub fn canonical_name(&self) -> Option<String> {
        let _guard = serialized::native_call();
        util::non_empty(self.session.lib().user_canonical_name(self.handle.raw()))
    }

    /// The user's display name. Falls back to the canonical name natively,
    /// so it is `None` only while unloaded.
    pub fn display_name(&self) -> Option<String> {
        let _guard = serialized::native_call();
        util::non_empty(self.session.lib().user_display_name(self.handle.raw()))
    }

    /// A link to this user's profile.
    pub fn link(&self) -> Result<Link> {
        let raw = {
            let _guard = serialized::native_call();
            self.session.lib().link_create_from_user(self.handle.raw())
        };
        if raw.is_null() {
            return Err(Error::InvalidHandle);
        }
        Link::from_raw(&self.session, raw, false)
    }
}

impl Loadable for User {
    fn session(&self) -> &Session {
        &self.session
    }

    fn handle(&self) -> &HandleRef {
        &self.handle
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("canonical_name", &self.canonical_name())
            .finish()
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
    fn names_translate_sentinels() {
        let (mock, session) = new_session();
        mock.set_user("spotify:user:alice", "alice", "Alice Goodwin");
        let user = session.get_user("spotify:user:alice").unwrap();
        assert_eq!(user.canonical_name().as_deref(), Some("alice"));
        assert_eq!(user.display_name().as_deref(), Some("Alice Goodwin"));

        let unknown = session.get_user("spotify:user:bob").unwrap();
        assert_eq!(unknown.canonical_name(), None);
    }

    #[test]
    fn profile_link_round_trips() {
        let (mock, session) = new_session();
        mock.set_user("spotify:user:alice", "alice", "Alice");
        let user = session.get_user("spotify:user:alice").unwrap();
        assert_eq!(user.link().unwrap().to_uri(), "spotify:user:alice");
    }
}
