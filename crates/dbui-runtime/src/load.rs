#![forbid(unsafe_code)]

//! Waiting on work done outside the runtime.
//!
//! Some representations swap in content produced elsewhere, e.g. an
//! embedded display loaded from a file. The load runs on its own thread;
//! the UI thread waits for it with a timeout and proceeds without the
//! result if it does not arrive. Nothing here can deadlock the UI thread.

use std::fmt;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// A load running on a background thread.
pub struct BackgroundLoad<R> {
    what: String,
    rx: mpsc::Receiver<Result<R, String>>,
}

impl<R> fmt::Debug for BackgroundLoad<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundLoad").field("what", &self.what).finish()
    }
}

impl<R: Send + 'static> BackgroundLoad<R> {
    /// Start `loader` on a new thread. `what` names the load in log output.
    pub fn spawn<E, F>(what: impl Into<String>, loader: F) -> Self
    where
        E: fmt::Display,
        F: FnOnce() -> Result<R, E> + Send + 'static,
    {
        let what = what.into();
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("dbui-load".into())
            .spawn(move || {
                let _ = tx.send(loader().map_err(|e| e.to_string()));
            });
        if let Err(e) = spawned {
            // The sender was dropped with the closure; `wait` sees a disconnect.
            tracing::warn!(load = %what, error = %e, "cannot start loader thread");
        }
        Self { what, rx }
    }

    /// Wait up to `timeout` for the result.
    ///
    /// Returns `None`, after logging a warning, if the load times out, fails
    /// or its thread dies.
    pub fn wait(self, timeout: Duration) -> Option<R> {
        match self.rx.recv_timeout(timeout) {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => {
                tracing::warn!(load = %self.what, error = %e, "load failed, continuing without it");
                None
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    load = %self.what,
                    timeout_ms = timeout.as_millis() as u64,
                    "load timed out, continuing without it"
                );
                None
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::warn!(load = %self.what, "loader ended without a result");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_result_within_timeout() {
        let load = BackgroundLoad::spawn("quick", || Ok::<_, String>(42));
        assert_eq!(load.wait(Duration::from_secs(5)), Some(42));
    }

    #[test]
    fn timeout_proceeds_without_result() {
        let load = BackgroundLoad::spawn("slow", || {
            thread::sleep(Duration::from_millis(500));
            Ok::<_, String>(1)
        });
        assert_eq!(load.wait(Duration::from_millis(10)), None);
    }

    #[test]
    fn loader_error_gives_none() {
        let load = BackgroundLoad::<u8>::spawn("broken", || Err("missing file"));
        assert_eq!(load.wait(Duration::from_secs(5)), None);
    }

    #[test]
    fn loader_panic_gives_none() {
        let load = BackgroundLoad::<u8>::spawn("panics", || -> Result<u8, String> {
            panic!("loader bug")
        });
        assert_eq!(load.wait(Duration::from_secs(5)), None);
    }
}
