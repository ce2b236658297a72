//! Coverage accumulation and the corpus queue admission policy.

use std::collections::HashSet;

const MAX_QUEUE_LEN: usize = 1024;

/// Behavioral signature used as a one-bit-per-tuple coverage proxy when no
/// forkserver coverage channel is available.
pub type BehaviorSignature = (Option<i32>, usize, usize);

#[derive(Debug, Default)]
pub struct CoveragePolicy {
    seen_cov_bits: HashSet<u32>,
    seen_behaviors: HashSet<BehaviorSignature>,
}

impl CoveragePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen_bits_count(&self) -> usize {
        self.seen_cov_bits.len()
    }

    pub fn seen_behaviors_count(&self) -> usize {
        self.seen_behaviors.len()
    }

    /// Returns `true` if this exec's coverage is novel and the queue still
    /// has room, in which case the caller should admit the input.
    pub fn observe_coverage(&mut self, indices: &[u32], queue_len: usize) -> bool {
        let is_new = indices.iter().any(|i| !self.seen_cov_bits.contains(i));
        if is_new {
            self.seen_cov_bits.extend(indices.iter().copied());
        }
        is_new && queue_len < MAX_QUEUE_LEN
    }

    pub fn observe_behavior(&mut self, sig: BehaviorSignature, queue_len: usize) -> bool {
        let is_new = self.seen_behaviors.insert(sig);
        is_new && queue_len < MAX_QUEUE_LEN
    }
}

/// The bounded, seed-first corpus of inputs from which the random phase
/// samples. Invariants: element 0 is always the seed; length never
/// exceeds [`MAX_QUEUE_LEN`]; every element executed without crashing or
/// hanging, and every non-seed element increased coverage at admission.
#[derive(Debug)]
pub struct CorpusQueue {
    entries: Vec<Vec<u8>>,
}

impl CorpusQueue {
    pub fn new(seed: Vec<u8>) -> Self {
        Self { entries: vec![seed] }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, input: Vec<u8>) {
        if self.entries.len() < MAX_QUEUE_LEN {
            self.entries.push(input);
        }
    }

    pub fn sample(&self, rng: &mut impl rand::Rng) -> &[u8] {
        let idx = rng.gen_range(0..self.entries.len());
        &self.entries[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_always_first_element() {
        let mut q = CorpusQueue::new(b"seed".to_vec());
        q.push(b"a".to_vec());
        q.push(b"b".to_vec());
        assert_eq!(q.entries[0], b"seed");
    }

    #[test]
    fn queue_never_exceeds_cap() {
        let mut q = CorpusQueue::new(Vec::new());
        for i in 0..2000 {
            q.push(vec![i as u8]);
        }
        assert_eq!(q.len(), MAX_QUEUE_LEN);
    }

    #[test]
    fn coverage_policy_admits_only_novel_indices() {
        let mut policy = CoveragePolicy::new();
        assert!(policy.observe_coverage(&[1, 2, 3], 0));
        assert!(!policy.observe_coverage(&[1, 2], 1));
        assert!(policy.observe_coverage(&[1, 4], 1));
    }

    #[test]
    fn coverage_policy_rejects_when_queue_full() {
        let mut policy = CoveragePolicy::new();
        assert!(!policy.observe_coverage(&[99], MAX_QUEUE_LEN));
    }
}
