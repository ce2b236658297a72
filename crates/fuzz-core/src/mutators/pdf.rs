use rand::Rng;

use super::generic::{det_empty_file, det_overflow_bytes, mutate_bytes};

#[derive(Debug, Clone)]
pub struct PdfMutator {
    seed_bytes: Vec<u8>,
}

impl PdfMutator {
    pub fn new(seed_bytes: Vec<u8>) -> Self {
        Self { seed_bytes }
    }

    pub fn deterministic_inputs(&self) -> Vec<Vec<u8>> {
        let mut outs = Vec::new();
        outs.extend(self.det_version_change());
        outs.extend(self.det_remove_eof());
        outs.extend(self.det_truncations());
        outs.extend(self.det_insert_bad_object());
        outs.extend(self.det_corrupt_xref());
        outs.extend(self.det_trailer_mutations());
        outs.extend(self.det_append_junk());
        outs.extend(det_empty_file());
        outs.extend(det_overflow_bytes(&self.seed_bytes));
        outs
    }

    fn det_version_change(&self) -> Vec<Vec<u8>> {
        if !self.seed_bytes.starts_with(b"%PDF-") {
            return Vec::new();
        }
        ["1.0", "1.1", "1.2", "1.3", "1.4", "1.5", "1.6", "1.7"]
            .iter()
            .filter(|_| self.seed_bytes.len() >= 8)
            .map(|ver| {
                let mut b = self.seed_bytes.clone();
                b[5..8].copy_from_slice(ver.as_bytes());
                b
            })
            .collect()
    }

    fn det_remove_eof(&self) -> Vec<Vec<u8>> {
        find(&self.seed_bytes, b"%%EOF")
            .map(|pos| {
                let mut b = self.seed_bytes[..pos].to_vec();
                b.extend_from_slice(&self.seed_bytes[pos + 6..]);
                vec![b]
            })
            .unwrap_or_default()
    }

    fn det_truncations(&self) -> Vec<Vec<u8>> {
        [0.9f64, 0.5, 0.1]
            .iter()
            .map(|frac| {
                let n = (self.seed_bytes.len() as f64 * frac) as usize;
                self.seed_bytes[..n.min(self.seed_bytes.len())].to_vec()
            })
            .collect()
    }

    fn det_insert_bad_object(&self) -> Vec<Vec<u8>> {
        let mut b = b"1 0 obj\n<< /Type /BadType >>\nendobj\n".to_vec();
        b.extend_from_slice(&self.seed_bytes);
        vec![b]
    }

    fn det_corrupt_xref(&self) -> Vec<Vec<u8>> {
        find(&self.seed_bytes, b"xref")
            .filter(|&pos| pos + 10 <= self.seed_bytes.len())
            .map(|pos| {
                let mut b = self.seed_bytes.clone();
                b[pos..pos + 9].copy_from_slice(b"xref\n0 1\n");
                vec![b]
            })
            .unwrap_or_default()
    }

    fn det_trailer_mutations(&self) -> Vec<Vec<u8>> {
        let Some(pos) = find(&self.seed_bytes, b"trailer") else { return Vec::new() };
        let removed = self.seed_bytes[..pos].to_vec();
        let mut duplicated = self.seed_bytes.clone();
        duplicated.extend_from_slice(b"\ntrailer\n<< /Root 1 0 R >>");
        vec![removed, duplicated]
    }

    fn det_append_junk(&self) -> Vec<Vec<u8>> {
        let mut b = self.seed_bytes.clone();
        b.extend_from_slice(b"\nJUNKJUNKJUNK\n");
        vec![b]
    }

    pub fn mutate(&self, base: &[u8], rng: &mut impl Rng) -> Vec<u8> {
        let mut b = base.to_vec();
        let mut insertion = format!("\n{} 0 obj\n<< /Length 0 /Filter /FlateDecode >>\nstream\n", rng.gen_range(10..=999)).into_bytes();
        let n = rng.gen_range(8..=64);
        insertion.extend((0..n).map(|_| rng.gen::<u8>()));
        insertion.extend_from_slice(b"\nendstream\nendobj\n");
        let pos = rng.gen_range(0..=b.len());
        b.splice(pos..pos, insertion);

        if rng.gen_bool(0.3) {
            if let Some(x) = find(&b, b"xref") {
                if x + 10 < b.len() {
                    b[x..x + 10].copy_from_slice(b"xref\n0 1\n0");
                }
            }
        }
        if rng.gen_bool(0.2) {
            if let Some(t) = find(&b, b"trailer") {
                if t + 7 < b.len() {
                    for i in 0..7 {
                        b[t + i] = rng.gen();
                    }
                }
            }
        }
        for _ in 0..rng.gen_range(1..=3) {
            b = mutate_bytes(rng, &b);
        }
        b
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_change_yields_eight_cases() {
        let seed = b"%PDF-1.4\n%rest".to_vec();
        let m = PdfMutator::new(seed);
        assert_eq!(m.det_version_change().len(), 8);
    }

    #[test]
    fn non_pdf_has_no_version_cases() {
        let m = PdfMutator::new(b"not a pdf".to_vec());
        assert!(m.det_version_change().is_empty());
    }

    #[test]
    fn mutate_never_panics_on_minimal_input() {
        let m = PdfMutator::new(b"%PDF-1.4\n%%EOF".to_vec());
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let _ = m.mutate(b"%PDF-1.4\n%%EOF", &mut rng);
        }
    }
}
