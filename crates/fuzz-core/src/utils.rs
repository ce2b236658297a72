use std::time::{Duration, Instant};

/// Tracks a single deadline derived from a relative timeout, so the
/// various blocking reads in the runner can each be given the
/// remaining budget instead of the full timeout.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self { at: Instant::now() + timeout }
    }

    /// Remaining time, or `None` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        if now >= self.at {
            None
        } else {
            Some(self.at - now)
        }
    }
}

/// Maps a raw signal number to its symbolic name, falling back to
/// `SIG<n>` for anything this build's `nix::sys::signal::Signal` does
/// not know about.
pub fn signal_name(sig: i32) -> String {
    match nix::sys::signal::Signal::try_from(sig) {
        Ok(s) => s.as_str().to_string(),
        Err(_) => format!("SIG{sig}"),
    }
}

pub const CRASH_SIGNALS: &[i32] = &[
    libc::SIGSEGV,
    libc::SIGABRT,
    libc::SIGBUS,
    libc::SIGILL,
    libc::SIGFPE,
];

pub fn is_crash_signal(sig: i32) -> bool {
    CRASH_SIGNALS.contains(&sig)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_crash_signals() {
        assert!(is_crash_signal(libc::SIGSEGV));
        assert!(is_crash_signal(libc::SIGABRT));
        assert!(!is_crash_signal(libc::SIGTERM));
    }

    #[test]
    fn names_known_signal() {
        assert_eq!(signal_name(libc::SIGSEGV), "SIGSEGV");
    }

    #[test]
    fn falls_back_for_unknown_signal() {
        assert_eq!(signal_name(9999), "SIG9999");
    }

    #[test]
    fn deadline_expires() {
        let d = Deadline::after(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(d.remaining().is_none());
    }
}
