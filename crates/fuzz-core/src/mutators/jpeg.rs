use rand::Rng;

use super::generic::{det_empty_file, det_overflow_bytes, mutate_bytes};

#[derive(Debug, Clone)]
pub struct JpegMutator {
    seed_bytes: Vec<u8>,
}

impl JpegMutator {
    pub fn new(seed_bytes: Vec<u8>) -> Self {
        Self { seed_bytes }
    }

    pub fn deterministic_inputs(&self) -> Vec<Vec<u8>> {
        let mut outs = det_empty_file();
        outs.extend(det_overflow_bytes(&self.seed_bytes));
        outs
    }

    pub fn mutate(&self, base: &[u8], rng: &mut impl Rng) -> Vec<u8> {
        if !base.starts_with(b"\xFF\xD8\xFF") {
            return mutate_bytes(rng, base);
        }
        let mut b = base.to_vec();
        for _ in 0..rng.gen_range(1..=4) {
            if b.len() <= 2 {
                break;
            }
            let start = rng.gen_range(2..b.len());
            let Some(rel) = b[start..].iter().position(|&x| x == 0xFF) else { break };
            let i = start + rel;
            if i + 3 >= b.len() {
                break;
            }
            if !matches!(b[i + 1], 0x00 | 0xD8 | 0xD9) {
                b[i + 2] = rng.gen();
                b[i + 3] = rng.gen();
            }
        }
        if rng.gen_bool(0.2) && b.len() > 4 {
            let n = rng.gen_range(1..=(1024.min(b.len() - 2)));
            b.truncate(b.len() - n);
        }
        if rng.gen_bool(0.2) && b.len() < 65500 {
            let n = rng.gen_range(1..=512);
            b.extend((0..n).map(|_| rng.gen::<u8>()));
        }
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_jpeg_falls_back_to_generic() {
        let m = JpegMutator::new(b"not a jpeg".to_vec());
        let mut rng = rand::thread_rng();
        assert!(!m.mutate(b"not a jpeg", &mut rng).is_empty());
    }

    #[test]
    fn jpeg_magic_is_preserved() {
        let seed = [0xFFu8, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
        let m = JpegMutator::new(seed.to_vec());
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let out = m.mutate(&seed, &mut rng);
            assert!(out.starts_with(&[0xFF, 0xD8, 0xFF]));
        }
    }
}
