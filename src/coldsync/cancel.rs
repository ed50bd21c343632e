use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Cooperative stop signal shared between the scheduler and whoever may
/// stop it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` in short slices, calling `poll` between slices.
    /// Returns `true` if the token was cancelled before the time ran out.
    pub fn sleep_unless_cancelled(&self, duration: Duration, mut poll: impl FnMut(&Self)) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            poll(self);
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

/// A file whose appearance asks a running watcher to stop.
#[derive(Debug, Clone)]
pub struct StopRequest {
    path: PathBuf,
}

impl StopRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_requested(&self) -> bool {
        self.path.exists()
    }

    /// Cancel `token` if a stop was requested. The request file is consumed.
    pub fn poll(&self, token: &CancellationToken) -> std::io::Result<bool> {
        if !self.is_requested() {
            return Ok(false);
        }
        token.cancel();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn sleep_returns_early_once_cancelled() {
        let token = CancellationToken::new();
        let started = Instant::now();
        let mut polls = 0;
        let cancelled = token.sleep_unless_cancelled(Duration::from_secs(30), |t| {
            polls += 1;
            if polls == 2 {
                t.cancel();
            }
        });
        assert!(cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn sleep_runs_to_deadline_without_cancel() {
        let token = CancellationToken::new();
        let cancelled = token.sleep_unless_cancelled(Duration::from_millis(20), |_| {});
        assert!(!cancelled);
    }

    #[test]
    fn stop_request_file_cancels_and_is_consumed() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let request = StopRequest::new(tmp.path().join("watch.stop"));
        let token = CancellationToken::new();
        assert!(!request.poll(&token).expect("poll"));
        assert!(!token.is_cancelled());

        std::fs::write(request.path(), "stop\n").expect("write");
        assert!(request.poll(&token).expect("poll"));
        assert!(token.is_cancelled());
        assert!(!request.is_requested());
    }
}
