//! End-to-end exercise of the binding over the mock backend: event loop,
//! login lifecycle, link round-trips, blocking loads and async search,
//! the same flow an interactive client drives.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use respot::{
    EventLoop, Error, LinkType, Loadable, SearchResult, Session, SessionConfig, SessionListener,
    SessionState,
};
use respot_core::capi::{NativeLib, ObjectKind};
use respot_core::mock::{MockLib, SearchFixture};

fn new_stack() -> (Arc<MockLib>, Session, EventLoop) {
    let mock = Arc::new(MockLib::new());
    let session = Session::new(
        Arc::clone(&mock) as Arc<dyn NativeLib>,
        &SessionConfig::default(),
    )
    .expect("session");
    let event_loop = EventLoop::new(&session);
    (mock, session, event_loop)
}

#[derive(Default)]
struct LoginTracker {
    logins: AtomicUsize,
    logouts: AtomicUsize,
}

impl SessionListener for LoginTracker {
    fn logged_in(&self, _session: &Session, result: Result<(), respot::LibError>) {
        if result.is_ok() {
            self.logins.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn logged_out(&self, _session: &Session) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn full_session_lifecycle() {
    let (_mock, session, mut event_loop) = new_stack();
    let tracker = Arc::new(LoginTracker::default());
    session.add_listener(Arc::clone(&tracker) as Arc<dyn SessionListener>);
    event_loop.start();

    // Login completes through the event loop, not synchronously.
    session.login("alice", "secret", true).expect("login");
    session
        .wait_for_state(SessionState::LoggedIn, Duration::from_secs(5))
        .expect("logged in");
    assert_eq!(tracker.logins.load(Ordering::SeqCst), 1);
    assert_eq!(
        session.user().expect("user").expect("logged-in user").canonical_name().as_deref(),
        Some("alice")
    );
    assert_eq!(session.remembered_user_name().as_deref(), Some("alice"));

    session.logout().expect("logout");
    session
        .wait_for_state(SessionState::LoggedOut, Duration::from_secs(5))
        .expect("logged out");
    assert_eq!(tracker.logouts.load(Ordering::SeqCst), 1);

    // Relogin uses the remembered user.
    session.relogin().expect("relogin");
    session
        .wait_for_state(SessionState::LoggedIn, Duration::from_secs(5))
        .expect("relogged in");

    event_loop.stop();

    // After forgetting the user, relogin has nothing to work with.
    session.forget_me().expect("forget");
    assert!(matches!(session.relogin(), Err(Error::NoStoredCredentials)));
}

#[test]
fn link_track_scenario() {
    let (mock, session, mut event_loop) = new_stack();
    event_loop.start();

    let uri = "spotify:track:2Foc5Q5nqNiosCNqttzHof";
    mock.set_track(uri, "Get Lucky", 369_000, &["spotify:artist:daft"]);
    mock.set_artist("spotify:artist:daft", "Daft Punk");

    let link = session.get_link(uri).expect("link");
    assert_eq!(link.link_type(), LinkType::Track);
    assert_eq!(link.to_uri(), uri);

    let track = link.as_track().expect("conversion").expect("track");
    track.load(Some(Duration::from_secs(5))).expect("load");
    assert_eq!(track.name().as_deref(), Some("Get Lucky"));
    assert_eq!(track.artists().expect("artists")[0].name().as_deref(), Some("Daft Punk"));
    assert_eq!(track.link().expect("link").to_uri(), uri);

    event_loop.stop();
}

#[test]
fn search_completes_through_the_event_loop() {
    let (mock, session, mut event_loop) = new_stack();
    // A long native delay: only the notify wakeup makes this fast.
    mock.set_next_timeout(30_000);
    event_loop.start();

    mock.set_track("spotify:track:one", "One More Time", 320_000, &[]);
    mock.expect_search(
        "one more time",
        SearchFixture {
            track_uris: vec!["spotify:track:one".into()],
            total_tracks: 1,
            ..SearchFixture::default()
        },
    );

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_in_callback = Arc::clone(&hits);
    let result = session
        .search_with_callback("one more time", move |result: &SearchResult| {
            assert_eq!(result.tracks().expect("tracks").len(), 1);
            hits_in_callback.fetch_add(1, Ordering::SeqCst);
        })
        .expect("search");

    // Passive wait: the event loop delivers the completion, the caller only
    // parks on the broadcast.
    assert!(result.wait_until_complete(Duration::from_secs(5)));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(result.track_total(), 1);
    assert_eq!(
        result.tracks().expect("tracks")[0].name().as_deref(),
        Some("One More Time")
    );

    event_loop.stop();
}

#[test]
fn browse_survives_wrapper_drop_while_loop_runs() {
    let (mock, session, mut event_loop) = new_stack();
    event_loop.start();

    mock.set_album("spotify:album:ram", "RAM", 2013, "spotify:artist:daft");
    mock.set_track("spotify:track:lucky", "Get Lucky", 369_000, &[]);
    mock.set_album_browse("spotify:album:ram", &["spotify:track:lucky"], "");

    let album = session.get_album("spotify:album:ram").expect("album");
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_in_callback = Arc::clone(&hits);
    let browser = album
        .browse(Some(Box::new(move |browser: &respot::AlbumBrowser| {
            assert_eq!(browser.tracks().expect("tracks").len(), 1);
            hits_in_callback.fetch_add(1, Ordering::SeqCst);
        })))
        .expect("browse");
    drop(browser);
    drop(album);

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while hits.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    event_loop.stop();
}

#[test]
fn reference_counts_balance_over_a_whole_scenario() {
    let (mock, session, mut event_loop) = new_stack();
    event_loop.start();

    let uri = "spotify:track:balanced";
    mock.set_track(uri, "Balanced", 1_000, &[]);

    {
        let track = session.get_track(uri).expect("track");
        track.load(Some(Duration::from_secs(5))).expect("load");
        let link = track.link().expect("link");
        let again = link.as_track().expect("conversion").expect("track");
        assert_eq!(again.name().as_deref(), Some("Balanced"));
    }

    event_loop.stop();

    let target = mock.handle_for(uri).expect("target");
    // Back to only the library-internal reference.
    assert_eq!(mock.refcount(target), Some(1));
    assert_eq!(
        mock.add_ref_calls(target),
        mock.release_calls(target)
    );
}

#[test]
fn playlist_identity_is_stable_across_access_paths() {
    let (mock, session, mut event_loop) = new_stack();
    event_loop.start();

    mock.set_playlist("spotify:user:alice:playlist:mix", "Mix", &[]);
    mock.set_container(&["spotify:user:alice:playlist:mix"]);

    let via_link = session
        .get_playlist("spotify:user:alice:playlist:mix")
        .expect("playlist");
    let container = session.playlist_container().expect("container");
    let via_container = container.playlist(0).expect("lookup").expect("playlist");
    assert_eq!(via_link, via_container);

    event_loop.stop();
}
