//! The event loop: the one background thread that drives the native library.
//!
//! Every processing cycle asks the session how long until it wants to be
//! called again, then parks for that long or until a `notify_main_thread`
//! callback wakes it early. Shutdown is cooperative: a stop flag checked
//! each iteration, with a wakeup so the loop exits within one cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::session::Session;

/// Fallback delay when a processing cycle fails; keeps a broken backend from
/// spinning the loop hot.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub struct EventLoop {
    session: Session,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EventLoop {
    pub fn new(session: &Session) -> EventLoop {
        EventLoop {
            session: session.clone(),
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Start the processing thread. A no-op if already running.
    pub fn start(&mut self) {
        if self.thread.is_some() {
            return;
        }
        self.stop.store(false, Ordering::Release);
        let session = self.session.clone();
        let stop = Arc::clone(&self.stop);
        let thread = thread::Builder::new()
            .name("respot-event-loop".into())
            .spawn(move || run(session, stop))
            .expect("failed to spawn event loop thread");
        self.thread = Some(thread);
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Request shutdown and join the processing thread.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.session.wake_event_loop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("event loop thread panicked");
            }
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(session: Session, stop: Arc<AtomicBool>) {
    tracing::debug!("event loop started");
    while !stop.load(Ordering::Acquire) {
        let timeout = match session.process_events() {
            Ok(timeout) => timeout,
            Err(error) => {
                tracing::error!(%error, "processing cycle failed");
                ERROR_BACKOFF
            }
        };
        if stop.load(Ordering::Acquire) {
            break;
        }
        session.wait_for_work(timeout);
    }
    tracing::debug!("event loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loadable::Loadable;
    use crate::session::{SessionConfig, SessionState};
    use respot_core::capi::NativeLib;
    use respot_core::mock::MockLib;
    use std::time::Instant;

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
    fn loop_processes_shortly_after_start() {
        let (mock, session) = new_session();
        let mut event_loop = EventLoop::new(&session);
        event_loop.start();
        assert!(event_loop.is_running());

        let deadline = Instant::now() + Duration::from_secs(2);
        while mock.process_calls() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(mock.process_calls() > 0);
        event_loop.stop();
    }

    #[test]
    fn stop_interrupts_a_long_native_timeout() {
        let (mock, session) = new_session();
        mock.set_next_timeout(60_000);
        let mut event_loop = EventLoop::new(&session);
        event_loop.start();
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        event_loop.stop();
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "stop did not interrupt the sleeping loop"
        );
        assert!(!event_loop.is_running());
    }

    #[test]
    fn notify_wakes_the_loop_for_new_work() {
        let (mock, session) = new_session();
        // Without the notify wakeup the loop would sleep for a minute
        // between cycles.
        mock.set_next_timeout(60_000);
        let mut event_loop = EventLoop::new(&session);
        event_loop.start();
        thread::sleep(Duration::from_millis(50));

        session.login("alice", "secret", false).unwrap();
        session
            .wait_for_state(SessionState::LoggedIn, Duration::from_secs(2))
            .expect("login was not processed in time");
        event_loop.stop();
    }

    #[test]
    fn blocking_load_coexists_with_the_running_loop() {
        let (mock, session) = new_session();
        mock.set_next_timeout(10);
        let mut event_loop = EventLoop::new(&session);
        event_loop.start();

        let uri = "spotify:track:background";
        let track = session.get_track(uri).unwrap();
        mock.loads_after(uri, respot_core::capi::ObjectKind::Track, 5);
        track.load(Some(Duration::from_secs(2))).expect("load");
        assert!(track.is_loaded());

        event_loop.stop();
    }

    #[test]
    fn drop_stops_the_thread() {
        let (mock, session) = new_session();
        mock.set_next_timeout(60_000);
        {
            let mut event_loop = EventLoop::new(&session);
            event_loop.start();
            thread::sleep(Duration::from_millis(20));
        }
        // Reaching this point means drop joined the thread.
        let calls = mock.process_calls();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(mock.process_calls(), calls);
    }
}
