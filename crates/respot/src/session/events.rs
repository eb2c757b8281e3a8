//! Session-level callback dispatch types.
//!
//! The native library reports everything that happens to a session through
//! its callback table; the binding marshals each callback into a method on
//! [`SessionListener`]. Listeners are invoked on the event-loop thread, in
//! registration order, and one listener's panic never stops dispatch to the
//! rest.

use respot_core::ffi::sp_audioformat;
use serde::{Deserialize, Serialize};

use crate::error::LibError;
use crate::session::Session;

/// Login lifecycle of a session.
///
/// `LoggingIn`/`LoggingOut` are entered when the request is issued;
/// `LoggedIn`/`LoggedOut` only when the matching native callback confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    LoggedOut,
    LoggingIn,
    LoggedIn,
    LoggingOut,
}

/// Sample format accompanying delivered audio frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_type: i32,
    pub sample_rate: i32,
    pub channels: i32,
}

impl From<sp_audioformat> for AudioFormat {
    fn from(raw: sp_audioformat) -> Self {
        AudioFormat {
            sample_type: raw.sample_type,
            sample_rate: raw.sample_rate,
            channels: raw.channels,
        }
    }
}

/// Receiver for session callbacks. Every method has a no-op default, so
/// implementations override only what they care about.
#[allow(unused_variables)]
pub trait SessionListener: Send + Sync {
    /// Login attempt finished; `Err` carries the native failure.
    fn logged_in(&self, session: &Session, result: Result<(), LibError>) {}

    fn logged_out(&self, session: &Session) {}

    /// Connection status change; `Err` while the connection is down, `Ok`
    /// once it recovers.
    fn connection_error(&self, session: &Session, status: Result<(), LibError>) {}

    fn message_to_user(&self, session: &Session, message: &str) {}

    /// The library wants its processing entry point called. The event loop
    /// is woken regardless of listeners.
    fn notify_main_thread(&self, session: &Session) {}

    /// Audio frames are available. Returns the number of frames consumed;
    /// when several listeners are registered the largest value wins.
    fn music_delivery(
        &self,
        session: &Session,
        format: AudioFormat,
        frames: &[u8],
        num_frames: usize,
    ) -> usize {
        0
    }

    fn play_token_lost(&self, session: &Session) {}

    fn log_message(&self, session: &Session, message: &str) {}

    fn end_of_track(&self, session: &Session) {}

    fn credentials_blob_updated(&self, session: &Session, blob: &str) {}

    fn connection_state_updated(&self, session: &Session) {}

    fn scrobble_error(&self, session: &Session, error: LibError) {}

    fn private_session_mode_changed(&self, session: &Session, is_private: bool) {}

    fn metadata_updated(&self, session: &Session) {}
}
