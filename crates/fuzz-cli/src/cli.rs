use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fuzz_core::fuzz_loop::{default_report_path, fuzz_target, FuzzConfig};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Black-box coverage-guided fuzzer for stdin-reading executables.
#[derive(Debug, Parser)]
pub struct Cli {
    /// Directory of target executables.
    #[arg(long, default_value = "/binaries")]
    pub binaries_dir: PathBuf,

    /// Directory of seed files, one `<target>.txt` per binary.
    #[arg(long, default_value = "/example_inputs")]
    pub seeds_dir: PathBuf,

    /// Directory crash reports are appended to.
    #[arg(long, default_value = "/fuzzer_output")]
    pub output_dir: PathBuf,

    /// Wall-clock budget for the random phase of each target, in seconds.
    #[arg(long, default_value_t = 60)]
    pub max_run_time: u64,

    /// Per-exec timeout in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub exec_timeout: u64,

    /// Coverage bitmap size in bytes.
    #[arg(long, default_value_t = 65536)]
    pub cov_size: usize,

    /// Default log level, overridable with `RUST_LOG`.
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,

    /// Fuzz only these targets (by binary name) instead of every
    /// executable under `--binaries-dir`.
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,
}

impl Cli {
    pub fn run(&self) -> Result<()> {
        self.setup_logger();

        if self.exec_timeout == 0 {
            anyhow::bail!("--exec-timeout must be greater than zero");
        }

        let targets = self.enumerate_targets()?;
        if targets.is_empty() {
            tracing::warn!(dir = %self.binaries_dir.display(), "no target binaries found");
        }

        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("creating output directory {}", self.output_dir.display()))?;

        let config = FuzzConfig {
            max_run_time: Duration::from_secs(self.max_run_time),
            exec_timeout: Duration::from_millis(self.exec_timeout),
            cov_size: self.cov_size,
            ..Default::default()
        };

        for target_name in targets {
            let target_path = self.binaries_dir.join(&target_name);
            let seed_path = self.seeds_dir.join(format!("{target_name}.txt"));
            if !seed_path.is_file() {
                tracing::warn!(target = %target_name, seed = %seed_path.display(), "seed file missing, skipping target");
                continue;
            }
            let report_path = default_report_path(&self.output_dir, &target_name);

            tracing::info!(target = %target_name, "starting target");
            if let Err(err) = fuzz_target(&target_path, &seed_path, &report_path, &config) {
                tracing::error!(target = %target_name, error = %err, "target run failed");
            }
        }

        Ok(())
    }

    fn enumerate_targets(&self) -> Result<Vec<String>> {
        if !self.targets.is_empty() {
            return Ok(self.targets.clone());
        }
        let entries = std::fs::read_dir(&self.binaries_dir)
            .with_context(|| format!("reading binaries directory {}", self.binaries_dir.display()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if is_executable(&entry.path()) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn setup_logger(&self) {
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_timer(fmt::time::ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_owned())))
            .with(
                EnvFilter::builder()
                    .with_default_directive(self.log_level.into())
                    .from_env_lossy(),
            )
            .try_init();
    }
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bails_on_zero_exec_timeout() {
        let cli = Cli {
            binaries_dir: PathBuf::from("/nonexistent"),
            seeds_dir: PathBuf::from("/nonexistent"),
            output_dir: std::env::temp_dir(),
            max_run_time: 1,
            exec_timeout: 0,
            cov_size: 65536,
            log_level: LevelFilter::INFO,
            targets: vec![],
        };
        assert!(cli.run().is_err());
    }

    #[test]
    fn missing_binaries_dir_is_an_error() {
        let cli = Cli {
            binaries_dir: PathBuf::from("/definitely/not/a/real/dir"),
            seeds_dir: PathBuf::from("/nonexistent"),
            output_dir: std::env::temp_dir(),
            max_run_time: 1,
            exec_timeout: 100,
            cov_size: 65536,
            log_level: LevelFilter::INFO,
            targets: vec![],
        };
        assert!(cli.run().is_err());
    }

    #[test]
    fn explicit_target_list_skips_directory_enumeration() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli {
            binaries_dir: dir.path().to_path_buf(),
            seeds_dir: dir.path().to_path_buf(),
            output_dir: dir.path().join("out"),
            max_run_time: 1,
            exec_timeout: 100,
            cov_size: 65536,
            log_level: LevelFilter::INFO,
            targets: vec!["some_target".to_string()],
        };
        // seed file for `some_target` does not exist, so run() should
        // complete by skipping it rather than erroring.
        assert!(cli.run().is_ok());
    }
}
