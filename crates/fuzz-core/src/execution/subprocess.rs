use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use super::RunOutcome;
use crate::utils::is_crash_signal;

const CAPTURE_CAP: usize = 4096;

/// One process per exec; the target's stdin is the mutated input, and
/// stdout/stderr are captured up to [`CAPTURE_CAP`] bytes.
#[derive(Debug)]
pub struct SubprocessRunner {
    target: PathBuf,
}

impl SubprocessRunner {
    pub fn new(target: PathBuf) -> Self {
        Self { target }
    }

    pub fn run_one(&mut self, input: &[u8], timeout: Duration) -> RunOutcome {
        let mut child = match Command::new(&self.target)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(c) => c,
            Err(err) => {
                tracing::error!(target = %self.target.display(), error = %err, "failed to spawn target");
                return RunOutcome { hung: true, ..Default::default() };
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(input);
        }

        match wait_with_timeout(&mut child, timeout) {
            Some(status) => {
                let mut stdout = Vec::new();
                let mut stderr = Vec::new();
                if let Some(mut out) = child.stdout.take() {
                    let _ = out.take(CAPTURE_CAP as u64).read_to_end(&mut stdout);
                }
                if let Some(mut err) = child.stderr.take() {
                    let _ = err.take(CAPTURE_CAP as u64).read_to_end(&mut stderr);
                }
                use std::os::unix::process::ExitStatusExt;
                let signal = status.signal();
                let crashed = signal.map(is_crash_signal).unwrap_or(false);
                RunOutcome {
                    exit_code: status.code(),
                    signal,
                    crashed,
                    hung: false,
                    stdout,
                    stderr,
                }
            }
            None => {
                let _ = child.kill();
                let _ = child.wait();
                RunOutcome { hung: true, ..Default::default() }
            }
        }
    }
}

fn wait_with_timeout(child: &mut std::process::Child, timeout: Duration) -> Option<std::process::ExitStatus> {
    let deadline = crate::utils::Deadline::after(timeout);
    loop {
        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }
        if deadline.remaining().is_none() {
            return None;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_binary_exits_cleanly() {
        let mut runner = SubprocessRunner::new(PathBuf::from("/bin/true"));
        let outcome = runner.run_one(b"anything", Duration::from_secs(2));
        assert!(!outcome.crashed);
        assert!(!outcome.hung);
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[test]
    fn sleep_binary_times_out() {
        let mut runner = SubprocessRunner::new(PathBuf::from("/bin/sleep"));
        // /bin/sleep with no args exits with usage error quickly; this
        // case exercises the non-crash non-hang path instead, since we
        // cannot pass args through this minimal contract in a unit test.
        let outcome = runner.run_one(b"", Duration::from_secs(1));
        assert!(!outcome.crashed);
    }

    #[test]
    fn missing_binary_reports_as_hung_not_panic() {
        let mut runner = SubprocessRunner::new(PathBuf::from("/no/such/binary"));
        let outcome = runner.run_one(b"x", Duration::from_millis(100));
        assert!(outcome.hung);
    }
}
