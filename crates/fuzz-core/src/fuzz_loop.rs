//! Per-target orchestration: detect format, build the mutator, start a
//! runner, run the deterministic phase, then fuzz randomly until the
//! deadline.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::Rng;

use crate::coverage::CoveragePolicy;
use crate::coverage::CorpusQueue;
use crate::execution::Runner;
use crate::mutators::Mutator;
use crate::seed::Seed;
use crate::triage::{fingerprint_from_coverage, fingerprint_from_output, CrashReporter};

#[derive(Debug, Clone)]
pub struct FuzzConfig {
    pub max_run_time: Duration,
    pub exec_timeout: Duration,
    pub cov_size: usize,
    pub mutate_bytes_amplify_prob: f64,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            max_run_time: Duration::from_secs(60),
            exec_timeout: Duration::from_millis(1000),
            cov_size: 65536,
            mutate_bytes_amplify_prob: 0.2,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FuzzSummary {
    pub execs: u64,
    pub coverage: usize,
    pub crashes: u64,
    pub unique_crashes: u64,
    pub hangs: u64,
    pub queue_len: usize,
    pub elapsed: Duration,
}

const PROGRESS_INTERVAL: Duration = Duration::from_secs(4);

/// Runs one target end to end: deterministic phase, then random phase
/// until `config.max_run_time` elapses.
pub fn fuzz_target(target: &Path, seed_path: &Path, report_path: &Path, config: &FuzzConfig) -> Result<FuzzSummary> {
    let target_name = target.file_name().unwrap_or_default().to_string_lossy().into_owned();
    let span = tracing::info_span!("fuzz_target", target = %target_name);
    let _enter = span.enter();

    let seed = Seed::load(seed_path).with_context(|| format!("loading seed for {target_name}"))?;
    tracing::info!(format = %seed.format, "detected seed format");

    let mutator = Mutator::for_seed(&seed);
    let mut runner = Runner::start(target, config.cov_size);
    let mut coverage = CoveragePolicy::new();
    let mut queue = CorpusQueue::new(seed.bytes.clone());
    let mut reporter = CrashReporter::new(report_path);
    let mut rng = rand::thread_rng();

    let start = Instant::now();
    let mut summary = FuzzSummary::default();

    for input in mutator.deterministic_inputs() {
        execute_and_record(&mut runner, &input, config.exec_timeout, &mut coverage, &mut queue, &mut reporter, &mut summary, &target_name)?;
    }

    let mut last_report = Instant::now();
    while start.elapsed() < config.max_run_time {
        let base = queue.sample(&mut rng).to_vec();
        let mut mutated = mutator.mutate(&base, &mut rng);
        if rng.gen_bool(config.mutate_bytes_amplify_prob) {
            mutated = mutator.mutate_bytes(&mutated, &mut rng);
        }
        execute_and_record(&mut runner, &mutated, config.exec_timeout, &mut coverage, &mut queue, &mut reporter, &mut summary, &target_name)?;

        if last_report.elapsed() >= PROGRESS_INTERVAL {
            summary.elapsed = start.elapsed();
            log_progress(&target_name, &summary);
            last_report = Instant::now();
        }
    }

    summary.elapsed = start.elapsed();
    tracing::info!(
        target = %target_name,
        execs = summary.execs,
        coverage = summary.coverage,
        crashes = summary.crashes,
        unique_crashes = summary.unique_crashes,
        hangs = summary.hangs,
        "finished fuzzing target"
    );
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn execute_and_record(
    runner: &mut Runner,
    input: &[u8],
    timeout: Duration,
    coverage: &mut CoveragePolicy,
    queue: &mut CorpusQueue,
    reporter: &mut CrashReporter,
    summary: &mut FuzzSummary,
    target_name: &str,
) -> Result<()> {
    let outcome = runner.run_one(input, timeout);
    summary.execs += 1;

    let admit = if outcome.crashed || outcome.hung {
        false
    } else {
        match runner.coverage_indices() {
            Some(indices) => {
                let admitted = coverage.observe_coverage(&indices, queue.len());
                summary.coverage = coverage.seen_bits_count();
                admitted
            }
            None => {
                let sig = (outcome.exit_code, outcome.stdout.len(), outcome.stderr.len());
                let admitted = coverage.observe_behavior(sig, queue.len());
                summary.coverage = coverage.seen_behaviors_count();
                admitted
            }
        }
    };
    if admit {
        queue.push(input.to_vec());
    }
    summary.queue_len = queue.len();

    if outcome.crashed {
        summary.crashes += 1;
        let signal = outcome.signal.unwrap_or(0);
        let fingerprint = match runner.coverage_indices() {
            Some(indices) => {
                let mut bitmap = Vec::with_capacity(indices.len() * 4);
                for idx in &indices {
                    bitmap.extend_from_slice(&idx.to_le_bytes());
                }
                fingerprint_from_coverage(&bitmap)
            }
            None => fingerprint_from_output(&outcome.stdout, &outcome.stderr),
        };
        if reporter.report(signal, &fingerprint, input)? {
            summary.unique_crashes += 1;
            tracing::info!(target = target_name, signal, fingerprint = %fingerprint, "novel crash");
        }
    } else if outcome.hung {
        summary.hangs += 1;
    }
    Ok(())
}

fn log_progress(target_name: &str, summary: &FuzzSummary) {
    let rate = if summary.elapsed.as_secs_f64() > 0.0 {
        summary.execs as f64 / summary.elapsed.as_secs_f64()
    } else {
        0.0
    };
    tracing::info!(
        target = target_name,
        execs = summary.execs,
        rate = format!("{rate:.0}/s"),
        coverage = summary.coverage,
        crashes = summary.crashes,
        unique_crashes = summary.unique_crashes,
        hangs = summary.hangs,
        queue = summary.queue_len,
        elapsed = format!("{:.1}s", summary.elapsed.as_secs_f64()),
        "progress"
    );
}

pub fn default_report_path(output_dir: &Path, target_name: &str) -> PathBuf {
    output_dir.join(format!("bad_{target_name}.txt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzing_a_clean_binary_produces_no_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let seed_path = dir.path().join("seed.txt");
        std::fs::write(&seed_path, b"hello").unwrap();
        let report_path = dir.path().join("bad_true.txt");

        let config = FuzzConfig { max_run_time: Duration::from_millis(200), ..Default::default() };
        let summary = fuzz_target(Path::new("/bin/true"), &seed_path, &report_path, &config).unwrap();

        assert_eq!(summary.crashes, 0);
        assert!(!report_path.exists());
    }

    #[test]
    fn queue_length_never_exceeds_cap() {
        let dir = tempfile::tempdir().unwrap();
        let seed_path = dir.path().join("seed.txt");
        std::fs::write(&seed_path, b"id,name\n1,Alice\n").unwrap();
        let report_path = dir.path().join("bad_true.txt");

        let config = FuzzConfig { max_run_time: Duration::from_millis(300), ..Default::default() };
        let summary = fuzz_target(Path::new("/bin/true"), &seed_path, &report_path, &config).unwrap();
        assert!(summary.queue_len <= 1024);
    }

    #[test]
    fn default_report_path_matches_naming_convention() {
        let p = default_report_path(Path::new("/out"), "mytarget");
        assert_eq!(p, Path::new("/out/bad_mytarget.txt"));
    }

    #[test]
    #[allow(unused_must_use)]
    fn missing_seed_file_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let seed_path = dir.path().join("missing.txt");
        let report_path = dir.path().join("bad_x.txt");
        let config = FuzzConfig { max_run_time: Duration::from_millis(10), ..Default::default() };
        let result = fuzz_target(Path::new("/bin/true"), &seed_path, &report_path, &config);
        assert!(result.is_err());
    }
}
