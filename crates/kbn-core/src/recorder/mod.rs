//! Keystroke recorder: an idle/recording state machine around a platform key
//! hook, with session history and per-key statistics.
//!
//! Threads involved while recording:
//! - the hook's own thread, which calls [`KeySink::on_key`];
//! - a one-second display ticker (`utils::start_interval_loop`).
//!
//! Both are coordinated through the shared recording flag; key names travel
//! over an mpsc channel that [`Recorder::stop`] drains.

pub mod history;
pub mod session;

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    time::Duration,
};

use chrono::Local;
use tracing::{error, info, warn};

use crate::{
    errors::Error,
    utils::{start_interval_loop, IntervalController},
    Result,
};

use self::{
    history::{load_sessions, save_sessions},
    session::{KeyStats, Session},
};

/// Platform keyboard hook.
///
/// `install` starts delivering key names to the sink until `remove` is called.
pub trait KeyHook: Send {
    fn install(&mut self, sink: KeySink) -> Result<()>;
    fn remove(&mut self) -> Result<()>;
}

/// The single entry point for key events.
#[derive(Clone, Debug)]
pub struct KeySink {
    recording: Arc<AtomicBool>,
    tx: mpsc::Sender<String>,
}

impl KeySink {
    /// Record one key press. Returns `false` when it was dropped because no
    /// recording is active.
    pub fn on_key(&self, key: &str) -> bool {
        if !self.recording.load(Ordering::SeqCst) {
            return false;
        }
        self.tx.send(key.to_string()).is_ok()
    }
}

struct ActiveRecording {
    session: Session,
    keys: mpsc::Receiver<String>,
    ticker: IntervalController,
}

/// Result of [`Recorder::stop`]. The session is kept in memory even when
/// writing the history file failed.
#[derive(Debug)]
pub struct StopReport {
    pub session: Session,
    pub persist_error: Option<Error>,
}

pub struct Recorder {
    sessions_path: PathBuf,
    sessions: Vec<Session>,
    stats: KeyStats,
    hook: Box<dyn KeyHook>,
    recording: Arc<AtomicBool>,
    active: Option<ActiveRecording>,
    load_error: Option<String>,
}

impl Recorder {
    /// Load history from `sessions_path`. A corrupt file starts an empty
    /// history; the failure is kept in [`Recorder::load_error`].
    pub fn open(sessions_path: impl Into<PathBuf>, hook: Box<dyn KeyHook>) -> Self {
        let sessions_path = sessions_path.into();
        let (sessions, load_error) = match load_sessions(&sessions_path) {
            Ok(s) => (s, None),
            Err(e) => {
                error!("failed to load {}: {e}", sessions_path.display());
                (Vec::new(), Some(e.to_string()))
            }
        };
        let stats = KeyStats::from_sessions(&sessions);

        Self {
            sessions_path,
            sessions,
            stats,
            hook,
            recording: Arc::new(AtomicBool::new(false)),
            active: None,
            load_error,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Begin a session. `on_tick` receives elapsed seconds once per second.
    pub fn start(&mut self, mut on_tick: impl FnMut(u64) + Send + 'static) -> Result<()> {
        if self.active.is_some() {
            return Err(Error::Validation("already recording".to_string()));
        }

        let session = Session::begin(Local::now());
        let (tx, rx) = mpsc::channel();
        self.recording.store(true, Ordering::SeqCst);

        let sink = KeySink {
            recording: Arc::clone(&self.recording),
            tx,
        };
        if let Err(e) = self.hook.install(sink) {
            self.recording.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let mut elapsed = 0u64;
        let ticker = start_interval_loop(Duration::from_secs(1), move || {
            elapsed += 1;
            on_tick(elapsed);
        });

        info!(session = %session.id, "recording started");
        self.active = Some(ActiveRecording {
            session,
            keys: rx,
            ticker,
        });
        Ok(())
    }

    /// Finish the active session, fold it into history and persist.
    pub fn stop(&mut self) -> Result<StopReport> {
        let Some(active) = self.active.take() else {
            return Err(Error::Validation("not recording".to_string()));
        };

        self.recording.store(false, Ordering::SeqCst);
        if let Err(e) = self.hook.remove() {
            warn!("failed to remove key hook: {e}");
        }
        active.ticker.stop();

        let keys: Vec<String> = active.keys.try_iter().collect();
        let mut session = active.session;
        session.finish(Local::now(), keys);

        self.stats.record(&session.keys);
        self.sessions.insert(0, session.clone());

        let persist_error = save_sessions(&self.sessions_path, &self.sessions).err();
        if let Some(e) = &persist_error {
            error!("failed to save {}: {e}", self.sessions_path.display());
        }

        info!(
            session = %session.id,
            duration = session.duration,
            keys = session.key_count,
            "recording stopped"
        );
        Ok(StopReport {
            session,
            persist_error,
        })
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn stats(&self) -> &KeyStats {
        &self.stats
    }

    pub fn sessions_path(&self) -> &Path {
        &self.sessions_path
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn export_csv(&self, path: &Path) -> Result<()> {
        history::export_csv(path, &self.sessions)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Hook driven by the test: keys are pushed through the installed sink.
    #[derive(Clone, Default)]
    struct ManualHook {
        sink: Arc<Mutex<Option<KeySink>>>,
        fail_install: bool,
    }

    impl ManualHook {
        fn press(&self, key: &str) -> bool {
            match self.sink.lock().unwrap().as_ref() {
                Some(sink) => sink.on_key(key),
                None => false,
            }
        }
    }

    impl KeyHook for ManualHook {
        fn install(&mut self, sink: KeySink) -> Result<()> {
            if self.fail_install {
                return Err(Error::External("no input device".into()));
            }
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        fn remove(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn tmp(name: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!("kbn-recorder-{}-{name}", std::process::id()));
        let _ = std::fs::remove_file(&p);
        p
    }

    #[test]
    fn records_keys_only_while_recording() {
        let path = tmp("record.json");
        let hook = ManualHook::default();
        let mut rec = Recorder::open(&path, Box::new(hook.clone()));

        rec.start(|_| {}).unwrap();
        assert!(rec.is_recording());
        assert!(hook.press("a"));
        assert!(hook.press("space"));
        assert!(hook.press("a"));

        let report = rec.stop().unwrap();
        assert!(report.persist_error.is_none());
        assert_eq!(report.session.keys, vec!["a", "space", "a"]);
        assert_eq!(report.session.key_count, 3);
        assert!(report.session.end_time.is_some());

        // The sink outlives the session but drops keys while idle.
        assert!(!hook.press("b"));

        assert_eq!(rec.stats().count("a"), 2);
        assert_eq!(rec.sessions().len(), 1);

        let reopened = Recorder::open(&path, Box::new(ManualHook::default()));
        assert_eq!(reopened.sessions(), rec.sessions());
        assert_eq!(reopened.stats().count("space"), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn zero_key_session_is_saved() {
        let path = tmp("zero.json");
        let mut rec = Recorder::open(&path, Box::new(ManualHook::default()));
        rec.start(|_| {}).unwrap();
        let report = rec.stop().unwrap();
        assert_eq!(report.session.key_count, 0);
        assert!(report.session.is_finished());
        assert_eq!(load_sessions(&path).unwrap().len(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn newest_session_comes_first() {
        let path = tmp("order.json");
        let mut rec = Recorder::open(&path, Box::new(ManualHook::default()));
        rec.start(|_| {}).unwrap();
        let first = rec.stop().unwrap().session;
        rec.start(|_| {}).unwrap();
        let second = rec.stop().unwrap().session;
        assert_eq!(rec.sessions()[0], second);
        assert_eq!(rec.sessions()[1], first);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn start_and_stop_are_guarded() {
        let path = tmp("guard.json");
        let mut rec = Recorder::open(&path, Box::new(ManualHook::default()));
        assert!(matches!(rec.stop(), Err(Error::Validation(_))));
        rec.start(|_| {}).unwrap();
        assert!(matches!(rec.start(|_| {}), Err(Error::Validation(_))));
        rec.stop().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn failed_hook_install_leaves_recorder_idle() {
        let hook = ManualHook {
            fail_install: true,
            ..Default::default()
        };
        let mut rec = Recorder::open(tmp("hookfail.json"), Box::new(hook));
        assert!(rec.start(|_| {}).is_err());
        assert!(!rec.is_recording());
    }

    #[test]
    fn corrupt_history_starts_empty() {
        let path = tmp("corrupt.json");
        std::fs::write(&path, "[{").unwrap();
        let rec = Recorder::open(&path, Box::new(ManualHook::default()));
        assert!(rec.sessions().is_empty());
        assert!(rec.load_error().is_some());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unwritable_history_is_reported_not_fatal() {
        let dir = tmp("as-dir");
        std::fs::create_dir_all(&dir).unwrap();
        // Writing a file over an existing directory fails.
        let mut rec = Recorder::open(&dir, Box::new(ManualHook::default()));
        assert!(rec.load_error().is_some());
        rec.start(|_| {}).unwrap();
        let report = rec.stop().unwrap();
        assert!(report.persist_error.is_some());
        assert_eq!(rec.sessions().len(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
