//! Format-agnostic byte-level mutation and the small helper pools shared
//! by every format-specific mutator: overflow amplification, numeric edge
//! values, and string edge values. These are free functions rather than
//! methods on a shared base type — each mutator variant calls the ones it
//! needs.

use rand::Rng;

/// Picks uniformly from a small set of byte-level operations. An empty
/// buffer always yields a single random byte.
pub fn mutate_bytes(rng: &mut impl Rng, data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return vec![rng.gen()];
    }
    let mut b = data.to_vec();
    match rng.gen_range(0..6) {
        0 => {
            let i = rng.gen_range(0..b.len());
            b[i] ^= 1 << rng.gen_range(0..8);
        }
        1 => {
            let i = rng.gen_range(0..b.len());
            b[i] = rng.gen();
        }
        2 => {
            let i = rng.gen_range(0..b.len());
            let delta: i32 = *[-128, -16, -1, 1, 16, 127].choice(rng);
            b[i] = (b[i] as i32 + delta).rem_euclid(256) as u8;
        }
        3 if b.len() < 65535 => {
            let i = rng.gen_range(0..=b.len());
            let n = rng.gen_range(1..=8);
            let extra: Vec<u8> = (0..n).map(|_| rng.gen()).collect();
            b.splice(i..i, extra);
        }
        4 if b.len() > 1 => {
            let i = rng.gen_range(0..b.len());
            b.remove(i);
        }
        5 if b.len() < 65535 => {
            let start = rng.gen_range(0..b.len());
            let end = (start + rng.gen_range(1..=16)).min(b.len());
            let chunk = b[start..end].to_vec();
            let ins = rng.gen_range(0..=b.len());
            b.splice(ins..ins, chunk);
        }
        _ => {
            let i = rng.gen_range(0..b.len());
            b[i] = rng.gen();
        }
    }
    b
}

trait ChooseExt<T> {
    fn choice(&self, rng: &mut impl Rng) -> &T;
}

impl<T> ChooseExt<T> for [T] {
    fn choice(&self, rng: &mut impl Rng) -> &T {
        &self[rng.gen_range(0..self.len())]
    }
}

pub fn det_empty_file() -> Vec<Vec<u8>> {
    vec![Vec::new()]
}

/// The five overflow amplifications appended to a seed's raw bytes.
pub fn det_overflow_bytes(seed: &[u8]) -> Vec<Vec<u8>> {
    let mut outs = Vec::with_capacity(5);
    for suffix in [
        b"A".repeat(1000),
        b"A".repeat(10000),
        vec![0u8],
        b"\t\n\r".to_vec(),
        "\u{202e}".as_bytes().to_vec(),
    ] {
        let mut v = seed.to_vec();
        v.extend_from_slice(&suffix);
        outs.push(v);
    }
    outs
}

/// Numeric edge values for a field that parses as a number; empty if it
/// doesn't.
pub fn numeric_mutations(value: &str) -> Vec<String> {
    let Ok(num) = value.parse::<f64>() else {
        return Vec::new();
    };
    let is_int = num.is_finite() && num.fract() == 0.0;
    let mut out = vec![
        "0".to_string(),
        "-0".to_string(),
        "1".to_string(),
        "-1".to_string(),
        "100".to_string(),
        "-100".to_string(),
        i32::MAX.to_string(),
        i32::MIN.to_string(),
        i64::MAX.to_string(),
        i64::MIN.to_string(),
        "1000000000".to_string(),
        "1000000000000000000".to_string(),
        "inf".to_string(),
        "-inf".to_string(),
        "NaN".to_string(),
        "1e9".to_string(),
        "1e-9".to_string(),
        "1e308".to_string(),
        "-1e308".to_string(),
    ];
    if is_int {
        let iv = num as i64;
        out.push((iv.wrapping_add(1)).to_string());
        out.push((iv.wrapping_sub(1)).to_string());
        out.push((iv.wrapping_mul(10)).to_string());
        out.push(if iv != 0 { (iv / 10).to_string() } else { "0".to_string() });
    } else {
        out.push((num * 1.1).to_string());
        out.push((num * 0.9).to_string());
        out.push(num.floor().to_string());
        out.push(num.ceil().to_string());
    }
    out
}

/// String edge values, independent of whether `value` parses as a number.
pub fn string_mutations(value: &str) -> Vec<String> {
    vec![
        String::new(),
        "\"".to_string(),
        "\"\"".to_string(),
        "'".to_string(),
        "A".repeat(1000),
        "A".repeat(10000),
        "\u{0}".to_string(),
        "\t\n\r".to_string(),
        "\u{1f6a8}".to_string(),
        "\u{202e}".to_string(),
        format!("'{value}'"),
        format!("\"{value}\""),
        format!("{value},"),
        format!("{value}\n"),
        format!("{value}\\"),
    ]
}

#[derive(Debug, Clone)]
pub struct GenericMutator {
    seed_bytes: Vec<u8>,
}

impl GenericMutator {
    pub fn new(seed_bytes: Vec<u8>) -> Self {
        Self { seed_bytes }
    }

    pub fn deterministic_inputs(&self) -> Vec<Vec<u8>> {
        let mut outs = det_empty_file();
        outs.extend(det_overflow_bytes(&self.seed_bytes));
        outs
    }

    pub fn mutate(&self, base: &[u8], rng: &mut impl Rng) -> Vec<u8> {
        mutate_bytes(rng, base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn mutate_bytes_of_empty_buffer_yields_one_byte() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let out = mutate_bytes(&mut rng, &[]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn mutate_bytes_length_stays_close_to_input() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let input = vec![1u8; 32];
        for _ in 0..50 {
            let out = mutate_bytes(&mut rng, &input);
            assert!(out.len() + 1 >= input.len());
            assert!(out.len() <= input.len() + 16);
        }
    }

    #[test]
    fn numeric_mutations_nonempty_for_numeric_field() {
        assert!(!numeric_mutations("42").is_empty());
        assert!(numeric_mutations("not a number").is_empty());
    }

    #[test]
    fn overflow_bytes_preserve_seed_prefix() {
        let outs = det_overflow_bytes(b"abc");
        for o in &outs {
            assert!(o.starts_with(b"abc"));
        }
        assert_eq!(outs.len(), 5);
    }
}
