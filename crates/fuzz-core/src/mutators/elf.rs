use rand::Rng;

use super::generic::{det_empty_file, det_overflow_bytes, mutate_bytes};

#[derive(Debug, Clone)]
pub struct ElfMutator {
    seed_bytes: Vec<u8>,
}

impl ElfMutator {
    pub fn new(seed_bytes: Vec<u8>) -> Self {
        Self { seed_bytes }
    }

    pub fn deterministic_inputs(&self) -> Vec<Vec<u8>> {
        let mut outs = Vec::new();
        outs.extend(self.det_corrupt_ident());
        outs.extend(self.det_truncate_header());
        outs.extend(self.det_entrypoint_zero());
        outs.extend(det_empty_file());
        outs.extend(det_overflow_bytes(&self.seed_bytes));
        outs
    }

    fn det_corrupt_ident(&self) -> Vec<Vec<u8>> {
        if !self.seed_bytes.starts_with(b"\x7FELF") {
            return Vec::new();
        }
        [0x00u8, 0xFF]
            .iter()
            .map(|&v| {
                let mut b = self.seed_bytes.clone();
                b[1] = v;
                b
            })
            .collect()
    }

    fn det_truncate_header(&self) -> Vec<Vec<u8>> {
        if self.seed_bytes.len() > 64 {
            vec![self.seed_bytes[..64].to_vec()]
        } else {
            Vec::new()
        }
    }

    fn det_entrypoint_zero(&self) -> Vec<Vec<u8>> {
        if self.seed_bytes.starts_with(b"\x7FELF") && self.seed_bytes.len() > 0x18 + 8 {
            let mut b = self.seed_bytes.clone();
            for i in 0..8 {
                b[0x18 + i] = 0;
            }
            vec![b]
        } else {
            Vec::new()
        }
    }

    pub fn mutate(&self, base: &[u8], rng: &mut impl Rng) -> Vec<u8> {
        if !base.starts_with(b"\x7FELF") {
            return mutate_bytes(rng, base);
        }
        let mut b = base.to_vec();
        for off in [16usize, 18, 48, 44] {
            if off + 1 < b.len() {
                let val = u16::from_le_bytes([b[off], b[off + 1]]);
                let delta: i32 = *[-1, 1, 0x100, -0x100, 0x7FFF].iter().nth(rng.gen_range(0..5)).unwrap();
                let new_val = ((val as i32 + delta).rem_euclid(0x10000)) as u16;
                b[off..off + 2].copy_from_slice(&new_val.to_le_bytes());
            }
        }
        for _ in 0..rng.gen_range(1..=3) {
            b = mutate_bytes(rng, &b);
        }
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_ident_yields_two_cases() {
        let mut seed = vec![0x7F, b'E', b'L', b'F'];
        seed.extend(vec![0u8; 60]);
        let m = ElfMutator::new(seed);
        assert_eq!(m.det_corrupt_ident().len(), 2);
    }

    #[test]
    fn non_elf_falls_back_to_generic() {
        let m = ElfMutator::new(b"not elf".to_vec());
        let mut rng = rand::thread_rng();
        assert!(!m.mutate(b"not elf", &mut rng).is_empty());
    }

    #[test]
    fn truncate_header_only_for_long_inputs() {
        let m = ElfMutator::new(vec![0u8; 10]);
        assert!(m.det_truncate_header().is_empty());
    }
}
