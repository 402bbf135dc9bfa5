//! Key hooks for the recorder binary.
//!
//! [`TerminalHook`] turns typed terminal lines into key events and works
//! everywhere. The global OS hook (`rdev`) needs X11 or Accessibility
//! permissions and is behind the `os-hook` feature.

use std::sync::{Arc, Mutex};

use kbn_core::{errors::Error, recorder::KeyHook, recorder::KeySink, Result};

type SharedSink = Arc<Mutex<Option<KeySink>>>;

fn set_sink(slot: &SharedSink, sink: Option<KeySink>) -> Result<()> {
    let mut guard = slot
        .lock()
        .map_err(|_| Error::External("key sink lock poisoned".to_string()))?;
    *guard = sink;
    Ok(())
}

/// Key name for a typed character: whitespace and control characters get
/// symbolic names, everything else is the character itself.
pub fn char_key_name(c: char) -> String {
    match c {
        ' ' => "space".to_string(),
        '\t' => "tab".to_string(),
        '\n' | '\r' => "enter".to_string(),
        c if c.is_control() => format!("U+{:04X}", c as u32),
        c => c.to_string(),
    }
}

/// Hook fed by the terminal front-end, one line at a time.
#[derive(Clone, Default)]
pub struct TerminalHook {
    sink: SharedSink,
}

/// Handle the front-end keeps after handing the hook to the recorder.
#[derive(Clone)]
pub struct TerminalFeed {
    sink: SharedSink,
}

impl TerminalHook {
    pub fn connected() -> (Self, TerminalFeed) {
        let hook = Self::default();
        let feed = TerminalFeed {
            sink: Arc::clone(&hook.sink),
        };
        (hook, feed)
    }
}

impl KeyHook for TerminalHook {
    fn install(&mut self, sink: KeySink) -> Result<()> {
        set_sink(&self.sink, Some(sink))
    }

    fn remove(&mut self) -> Result<()> {
        set_sink(&self.sink, None)
    }
}

impl TerminalFeed {
    /// Deliver every character of `line` followed by `enter`. Returns how
    /// many keys were accepted.
    pub fn feed_line(&self, line: &str) -> usize {
        let Ok(guard) = self.sink.lock() else {
            return 0;
        };
        let Some(sink) = guard.as_ref() else {
            return 0;
        };
        line.chars()
            .chain(std::iter::once('\n'))
            .filter(|c| sink.on_key(&char_key_name(*c)))
            .count()
    }
}

#[cfg(feature = "os-hook")]
pub use os::OsHook;

#[cfg(feature = "os-hook")]
mod os {
    use std::sync::{Arc, Mutex};

    use rdev::{listen, Event, EventType, Key};
    use tracing::error;

    use super::{set_sink, SharedSink};
    use kbn_core::{recorder::KeyHook, recorder::KeySink, Result};

    /// Global keyboard hook. `rdev::listen` cannot be stopped, so the
    /// listener thread is started once and `remove` only detaches the sink.
    #[derive(Default)]
    pub struct OsHook {
        sink: SharedSink,
        started: bool,
    }

    fn key_name(event: &Event, key: Key) -> String {
        match event.name.as_deref() {
            Some(name) if name.chars().all(|c| !c.is_control()) && !name.trim().is_empty() => {
                name.to_string()
            }
            _ => format!("{key:?}").to_lowercase(),
        }
    }

    impl KeyHook for OsHook {
        fn install(&mut self, sink: KeySink) -> Result<()> {
            set_sink(&self.sink, Some(sink))?;
            if self.started {
                return Ok(());
            }
            let slot: Arc<Mutex<Option<KeySink>>> = Arc::clone(&self.sink);
            std::thread::spawn(move || {
                let result = listen(move |event: Event| {
                    let EventType::KeyPress(key) = event.event_type else {
                        return;
                    };
                    if let Ok(guard) = slot.lock() {
                        if let Some(sink) = guard.as_ref() {
                            sink.on_key(&key_name(&event, key));
                        }
                    }
                });
                if let Err(e) = result {
                    error!("keyboard listener failed: {e:?}");
                }
            });
            self.started = true;
            Ok(())
        }

        fn remove(&mut self) -> Result<()> {
            set_sink(&self.sink, None)
        }
    }
}
