//! Crash fingerprinting, deduplication, and report-file writing.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::utils::signal_name;

const TRUNCATE_LEN: usize = 256;

pub type CrashKey = (i32, String);

/// A 128-bit hash (blake3, truncated, hex-encoded) of the post-exec
/// coverage bitmap, or of stdout/stderr when no coverage is available.
pub fn fingerprint_from_coverage(coverage: &[u8]) -> String {
    hex16(blake3::hash(coverage).as_bytes())
}

pub fn fingerprint_from_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut buf = Vec::with_capacity(TRUNCATE_LEN * 2 + 1);
    buf.extend_from_slice(&stdout[..stdout.len().min(TRUNCATE_LEN)]);
    buf.push(b'|');
    buf.extend_from_slice(&stderr[..stderr.len().min(TRUNCATE_LEN)]);
    hex16(blake3::hash(&buf).as_bytes())
}

fn hex16(full: &[u8; 32]) -> String {
    full[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// Tracks the set of already-reported `(signal, fingerprint)` keys for one
/// target and appends novel crashes to its report file.
#[derive(Debug)]
pub struct CrashReporter {
    report_path: std::path::PathBuf,
    seen_keys: HashSet<CrashKey>,
}

impl CrashReporter {
    pub fn new(report_path: impl Into<std::path::PathBuf>) -> Self {
        Self { report_path: report_path.into(), seen_keys: HashSet::new() }
    }

    /// Returns `true` if this crash was novel (and has just been appended
    /// to the report file).
    pub fn report(&mut self, signal: i32, fingerprint: &str, input: &[u8]) -> Result<bool> {
        let key = (signal, fingerprint.to_string());
        if self.seen_keys.contains(&key) {
            return Ok(false);
        }
        self.seen_keys.insert(key);

        if let Some(parent) = self.report_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating report directory {}", parent.display()))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.report_path)
            .with_context(|| format!("opening report file {}", self.report_path.display()))?;

        writeln!(f, "---- crash signal={signal} ({}) triage={fingerprint} ----", signal_name(signal))?;
        match std::str::from_utf8(input) {
            Ok(s) => {
                f.write_all(s.as_bytes())?;
            }
            Err(_) => {
                f.write_all(&String::from_utf8_lossy(input).into_owned().into_bytes())?;
            }
        }
        if !input.ends_with(b"\n") {
            writeln!(f)?;
        }
        writeln!(f)?;
        Ok(true)
    }

    pub fn unique_count(&self) -> usize {
        self.seen_keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_for_same_coverage() {
        let cov = vec![1u8, 0, 2, 0, 3];
        assert_eq!(fingerprint_from_coverage(&cov), fingerprint_from_coverage(&cov));
    }

    #[test]
    fn fingerprint_differs_for_different_coverage() {
        assert_ne!(fingerprint_from_coverage(&[1, 0]), fingerprint_from_coverage(&[0, 1]));
    }

    #[test]
    fn fingerprint_is_32_hex_chars() {
        let fp = fingerprint_from_coverage(&[1, 2, 3]);
        assert_eq!(fp.len(), 32);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn dedupes_identical_crash_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_target.txt");
        let mut reporter = CrashReporter::new(&path);
        assert!(reporter.report(11, "abc123", b"\x00\x00").unwrap());
        assert!(!reporter.report(11, "abc123", b"\x00\x00").unwrap());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("crash signal=11").count(), 1);
    }

    #[test]
    fn distinct_signals_are_both_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_target.txt");
        let mut reporter = CrashReporter::new(&path);
        assert!(reporter.report(11, "fp1", b"a").unwrap());
        assert!(reporter.report(6, "fp1", b"b").unwrap());
        assert_eq!(reporter.unique_count(), 2);
    }
}
