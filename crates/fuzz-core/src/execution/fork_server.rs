//! A persistent target process that forks per exec, so the fuzzer pays
//! process-creation cost once per target instead of once per input.
//!
//! Wire protocol with the child (little-endian, 4-byte fields), carried
//! over two pipes mapped onto fixed file descriptors:
//!
//! 1. parent writes `u32 len` + `len` input bytes into the input shared
//!    memory segment, then writes 4 zero bytes to the control pipe.
//! 2. child forks, writes the child pid (4 bytes) then the raw wait
//!    status (4 bytes) to the status pipe.
//! 3. parent reads pid, then status, each under the per-exec deadline.

use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use libafl_bolts::shmem::{ShMem, ShMemProvider, UnixShMem, UnixShMemProvider};
use libafl_bolts::{AsSlice, AsSliceMut};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use super::RunOutcome;
use crate::error::RunnerError;
use crate::utils::{is_crash_signal, Deadline};

/// File descriptors the child inherits the pipes on. Matches the
/// convention the injected forkserver shim expects.
mod fd {
    pub const CONTROL: i32 = 198;
    pub const STATUS: i32 = 199;
}

const INPUT_SHM_SIZE: usize = 1 << 20;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct ForkServerRunner {
    child: Child,
    ctl_w: os_pipe::PipeWriter,
    st_r: os_pipe::PipeReader,
    input_shmem: UnixShMem,
    cov_shmem: UnixShMem,
}

impl ForkServerRunner {
    pub fn start(target: &Path, cov_size: usize) -> Result<Self> {
        let mut shmem_provider =
            UnixShMemProvider::new().map_err(|e| RunnerError::ShMemSetup(e.to_string()))?;
        let input_shmem = shmem_provider
            .new_shmem(INPUT_SHM_SIZE)
            .map_err(|e| RunnerError::ShMemSetup(e.to_string()))?;
        let cov_shmem = shmem_provider
            .new_shmem(cov_size)
            .map_err(|e| RunnerError::ShMemSetup(e.to_string()))?;

        unsafe {
            input_shmem
                .write_to_env("FUZZER_SHM_NAME")
                .map_err(|e| RunnerError::ShMemSetup(e.to_string()))?;
            cov_shmem
                .write_to_env("FUZZER_COV_NAME")
                .map_err(|e| RunnerError::ShMemSetup(e.to_string()))?;
        }

        let (ctl_r, ctl_w) = os_pipe::pipe().context("creating control pipe")?;
        let (st_r, st_w) = os_pipe::pipe().context("creating status pipe")?;

        let ctl_r_fd = ctl_r.as_raw_fd();
        let st_w_fd = st_w.as_raw_fd();

        let mut cmd = Command::new(target);
        cmd.env("LD_PRELOAD", "/forkserver_lib.so")
            .env("FUZZER_SHM_SIZE", INPUT_SHM_SIZE.to_string())
            .env("FUZZER_COV_SIZE", cov_size.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // SAFETY: only async-signal-safe calls (dup2, fcntl) run between
        // fork and exec in the child.
        unsafe {
            cmd.pre_exec(move || {
                if libc::dup2(ctl_r_fd, fd::CONTROL) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                if libc::dup2(st_w_fd, fd::STATUS) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                clear_cloexec(fd::CONTROL)?;
                clear_cloexec(fd::STATUS)?;
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(RunnerError::Spawn)?;
        drop(ctl_r);
        drop(st_w);

        let mut runner = Self { child, ctl_w, st_r, input_shmem, cov_shmem };
        runner
            .read_exact_timeout(4, HANDSHAKE_TIMEOUT)
            .ok_or(RunnerError::HandshakeTimeout(HANDSHAKE_TIMEOUT))?;
        Ok(runner)
    }

    pub fn clear_coverage(&mut self) {
        self.cov_shmem.as_slice_mut().fill(0);
    }

    pub fn read_coverage_indices(&self) -> Vec<u32> {
        self.cov_shmem
            .as_slice()
            .iter()
            .enumerate()
            .filter(|(_, &b)| b != 0)
            .map(|(i, _)| i as u32)
            .collect()
    }

    pub fn run_one(&mut self, input: &[u8], timeout: Duration) -> RunOutcome {
        let buf = self.input_shmem.as_slice_mut();
        let input = if input.len() + 4 > buf.len() { &input[..buf.len() - 4] } else { input };
        buf[0..4].copy_from_slice(&(input.len() as u32).to_le_bytes());
        buf[4..4 + input.len()].copy_from_slice(input);

        if self.ctl_w.write_all(&[0u8; 4]).is_err() {
            self.drain_status();
            return RunOutcome { hung: true, ..Default::default() };
        }

        let deadline = Deadline::after(timeout);

        let Some(pid_bytes) = self.read_exact_deadline(4, deadline) else {
            self.drain_status();
            return RunOutcome { hung: true, ..Default::default() };
        };
        let pid = u32::from_le_bytes(pid_bytes.try_into().unwrap());

        let Some(status_bytes) = self.read_exact_deadline(4, deadline) else {
            if pid != 0 {
                let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
            }
            self.drain_status();
            return RunOutcome { hung: true, ..Default::default() };
        };
        let status = u32::from_le_bytes(status_bytes.try_into().unwrap());

        decode_wait_status(status)
    }

    fn read_exact_timeout(&mut self, n: usize, timeout: Duration) -> Option<Vec<u8>> {
        self.read_exact_deadline(n, Deadline::after(timeout))
    }

    fn read_exact_deadline(&mut self, n: usize, deadline: Deadline) -> Option<Vec<u8>> {
        use std::io::Read;
        let fd = self.st_r.as_raw_fd();
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            let remaining = deadline.remaining()?;
            let mut pfd = [PollFd::new(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN)];
            let ms = remaining.as_millis().min(i32::MAX as u128) as i32;
            match poll(&mut pfd, PollTimeout::try_from(ms).unwrap()) {
                Ok(n) if n > 0 => {}
                _ => return None,
            }
            match self.st_r.read(&mut buf[filled..]) {
                Ok(0) => return None,
                Ok(k) => filled += k,
                Err(_) => return None,
            }
        }
        Some(buf)
    }

    /// Non-blocking drain used to resynchronize the protocol after a
    /// timeout: whatever is left readable on the status pipe is discarded
    /// so the next `run_one` starts on a message boundary.
    fn drain_status(&mut self) {
        use std::io::Read;
        let fd = self.st_r.as_raw_fd();
        let mut scratch = [0u8; 4096];
        loop {
            let mut pfd = [PollFd::new(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN)];
            match poll(&mut pfd, PollTimeout::ZERO) {
                Ok(n) if n > 0 => match self.st_r.read(&mut scratch) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                },
                _ => break,
            }
        }
    }
}

impl Drop for ForkServerRunner {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn clear_cloexec(raw_fd: i32) -> std::io::Result<()> {
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};
    let fd = unsafe { std::os::fd::BorrowedFd::borrow_raw(raw_fd) };
    fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))
        .map(|_| ())
        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))
}

fn decode_wait_status(status: u32) -> RunOutcome {
    let status = status as i32;
    if libc::WIFSIGNALED(status) {
        let sig = libc::WTERMSIG(status);
        let crashed = is_crash_signal(sig);
        RunOutcome {
            exit_code: Some(-sig),
            signal: Some(sig),
            crashed,
            hung: false,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    } else if libc::WIFEXITED(status) {
        RunOutcome {
            exit_code: Some(libc::WEXITSTATUS(status)),
            signal: None,
            crashed: false,
            hung: false,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    } else {
        RunOutcome::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_normal_exit() {
        // WIFEXITED encodes (code << 8); WIFSIGNALED bits stay clear.
        let status = 0u32 << 8;
        let outcome = decode_wait_status(status);
        assert!(!outcome.crashed);
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[test]
    fn decodes_signaled_crash() {
        let status = libc::SIGSEGV as u32;
        let outcome = decode_wait_status(status);
        assert!(outcome.crashed);
        assert_eq!(outcome.signal, Some(libc::SIGSEGV));
    }

    #[test]
    fn decodes_signaled_non_crash() {
        let status = libc::SIGTERM as u32;
        let outcome = decode_wait_status(status);
        assert!(!outcome.crashed);
        assert_eq!(outcome.signal, Some(libc::SIGTERM));
    }

    #[test]
    fn missing_binary_fails_to_start() {
        let result = ForkServerRunner::start(Path::new("/no/such/binary"), 65536);
        assert!(result.is_err());
    }
}
