use std::{
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};

use chrono::Local;

// ============== Timestamp Helpers ==============

/// Local timestamp without offset, e.g. `2025-03-01T10:15:00.123456`.
pub fn iso_timestamp_local() -> String {
    Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

// ============== Ticker Loop ==============

pub struct IntervalController {
    stop: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl IntervalController {
    /// Signal the loop and wait for the thread to exit.
    pub fn stop(mut self) {
        let _ = self.stop.send(());
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Start a cancellable background loop that calls `tick()` every `interval`.
///
/// The first tick fires after one full interval. `stop()` wakes the thread
/// immediately instead of waiting for the current sleep to finish.
pub fn start_interval_loop(
    interval: Duration,
    mut tick: impl FnMut() + Send + 'static,
) -> IntervalController {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => tick(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    });

    IntervalController {
        stop: stop_tx,
        handle: Some(handle),
    }
}
