//! respot: safe Rust binding over a native streaming-media client library.
//!
//! The native library exposes a manually reference-counted C object model
//! (sessions, tracks, albums, artists, playlists, links, images, search and
//! browse results) and requires all calls to be serialized. This crate turns
//! that surface into safely-owned Rust objects:
//!
//! - [`HandleRef`] pairs every acquired native reference with exactly one
//!   release
//! - [`Session`] owns the native session and dispatches its callbacks to
//!   registered [`SessionListener`]s
//! - [`EventLoop`] is the single background thread driving the native
//!   processing entry point
//! - [`Loadable`] is the shared blocking-load protocol for asynchronously
//!   populated objects
//!
//! The native library itself is reached through the capability trait in
//! [`respot_core`]; see that crate for the raw ABI surface.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use respot::{EventLoop, Loadable, Session, SessionConfig, SessionState};
//!
//! let session = Session::new(backend, &SessionConfig::default())?;
//! let mut event_loop = EventLoop::new(&session);
//! event_loop.start();
//!
//! session.login("alice", "secret", true)?;
//! session.wait_for_state(SessionState::LoggedIn, Duration::from_secs(10))?;
//!
//! let track = session.get_track("spotify:track:2Foc5Q5nqNiosCNqttzHof")?;
//! track.load(Some(Duration::from_secs(10)))?;
//! println!("{:?}", track.name());
//!
//! event_loop.stop();
//! ```

pub mod album;
pub mod artist;
pub mod browse;
pub mod error;
pub mod event_loop;
pub mod handle;
pub mod image;
pub mod link;
pub mod loadable;
pub mod playlist;
pub mod search;
pub mod session;
pub mod track;
pub mod user;

mod registry;
mod serialized;
mod util;

#[cfg(test)]
mod concurrency_test;

pub use album::Album;
pub use artist::Artist;
pub use browse::{AlbumBrowser, ArtistBrowser, BrowseCallback};
pub use error::{Error, LibError, Result};
pub use event_loop::EventLoop;
pub use handle::HandleRef;
pub use image::Image;
pub use link::Link;
pub use loadable::Loadable;
pub use playlist::{Playlist, PlaylistContainer, PlaylistTrack};
pub use search::SearchResult;
pub use session::{AudioFormat, Session, SessionConfig, SessionListener, SessionState};
pub use track::Track;
pub use user::User;

// Shared-boundary types re-exported from the core crate.
pub use respot_core::capi::{AlbumType, ConnectionState, LinkType};
