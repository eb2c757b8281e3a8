//! The shared load protocol for asynchronously populated objects.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, LibError, Result, check};
use crate::handle::HandleRef;
use crate::serialized;
use crate::session::Session;

/// Interval between load-state polls while blocked in [`Loadable::load`].
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// An object whose metadata is fetched asynchronously.
///
/// Implemented by every such entity with the same provided load loop; only
/// the two accessors differ per type (and the browse/search types substitute
/// their completion flag for the native loaded query).
pub trait Loadable {
    fn session(&self) -> &Session;

    /// The native handle queried for load and error state.
    fn handle(&self) -> &HandleRef;

    /// Re-queried from the native library on every call; load state can flip
    /// asynchronously and is never cached on the wrapper.
    fn is_loaded(&self) -> bool {
        let handle = self.handle();
        let _guard = serialized::native_call();
        self.session().lib().is_loaded(handle.kind(), handle.raw())
    }

    /// Error state of the object. Only meaningful once loading finished.
    fn error(&self) -> Result<()> {
        let handle = self.handle();
        let _guard = serialized::native_call();
        check(self.session().lib().error_state(handle.kind(), handle.raw()))
    }

    /// Block until the object is loaded, pumping the session's processing
    /// step between checks.
    ///
    /// Returns `self` for chaining. `Error::Timeout` is recoverable: the
    /// native operation keeps running and a later `load` may succeed. The
    /// wait never blocks the event-loop thread; concurrent pumping is
    /// serialized by the native-call lock.
    fn load(&self, timeout: Option<Duration>) -> Result<&Self> {
        let deadline = timeout.map(|limit| (limit, Instant::now() + limit));
        loop {
            self.session().process_events()?;
            if self.is_loaded() {
                self.error()?;
                return Ok(self);
            }
            match self.error() {
                Ok(()) | Err(Error::Library(LibError::IsLoading)) => {}
                Err(error) => return Err(error),
            }
            if let Some((limit, at)) = deadline {
                if Instant::now() >= at {
                    return Err(Error::Timeout(limit));
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, SessionConfig};
    use respot_core::capi::{NativeLib, ObjectKind};
    use respot_core::ffi;
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
    fn load_returns_once_the_object_loads() {
        let (mock, session) = new_session();
        let uri = "spotify:track:needs-loading";
        let track = session.get_track(uri).unwrap();
        assert!(!track.is_loaded());
        mock.loads_after(uri, ObjectKind::Track, 3);

        let loaded = track.load(Some(Duration::from_secs(2))).unwrap();
        assert!(loaded.is_loaded());
        assert!(mock.process_calls() >= 3);
    }

    #[test]
    fn load_times_out_on_an_object_that_never_loads() {
        let (_, session) = new_session();
        let track = session.get_track("spotify:track:never-loads").unwrap();

        let timeout = Duration::from_millis(60);
        let started = Instant::now();
        let error = track.load(Some(timeout)).unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(error, Error::Timeout(t) if t == timeout));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_secs(2), "load loop overran");
    }

    #[test]
    fn timeout_is_recoverable() {
        let (mock, session) = new_session();
        let uri = "spotify:track:slow";
        let track = session.get_track(uri).unwrap();

        assert!(track.load(Some(Duration::from_millis(30))).is_err());
        mock.mark_loaded(uri);
        assert!(track.load(Some(Duration::from_secs(2))).is_ok());
    }

    #[test]
    fn load_surfaces_the_native_error_state() {
        let (mock, session) = new_session();
        let uri = "spotify:track:broken";
        let track = session.get_track(uri).unwrap();
        mock.set_error(uri, ObjectKind::Track, ffi::SP_ERROR_OTHER_PERMANENT);

        let error = track.load(Some(Duration::from_secs(1))).unwrap_err();
        assert!(matches!(
            error,
            Error::Library(LibError::OtherPermanent)
        ));
    }

    #[test]
    fn is_loading_state_is_not_an_error() {
        let (mock, session) = new_session();
        let uri = "spotify:track:loading-state";
        let track = session.get_track(uri).unwrap();
        mock.set_error(uri, ObjectKind::Track, ffi::SP_ERROR_IS_LOADING);

        // IS_LOADING while pending must not abort the wait.
        let result = track.load(Some(Duration::from_millis(40)));
        assert!(matches!(result, Err(Error::Timeout(_))));

        mock.set_error(uri, ObjectKind::Track, ffi::SP_ERROR_OK);
        mock.mark_loaded(uri);
        assert!(track.load(Some(Duration::from_secs(2))).is_ok());
    }
}
