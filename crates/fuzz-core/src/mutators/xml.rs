use rand::seq::SliceRandom;
use rand::Rng;

use super::generic::mutate_bytes;

#[derive(Debug, Clone)]
pub struct XmlMutator {
    seed_text: Option<String>,
    seed_bytes: Vec<u8>,
}

impl XmlMutator {
    pub fn new(seed_text: Option<&str>, seed_bytes: Vec<u8>) -> Self {
        Self { seed_text: seed_text.map(|s| s.to_string()), seed_bytes }
    }

    pub fn deterministic_inputs(&self) -> Vec<Vec<u8>> {
        let mut outs = super::generic::det_empty_file();
        outs.extend(super::generic::det_overflow_bytes(&self.seed_bytes));
        outs
    }

    pub fn mutate(&self, base: &[u8], rng: &mut impl Rng) -> Vec<u8> {
        let Some(text) = &self.seed_text else {
            return mutate_bytes(rng, base);
        };
        let tag_len = rng.gen_range(10..=200);
        let comment_body = match text.char_indices().nth(1000) {
            Some((i, _)) => &text[..i],
            None => text.as_str(),
        };
        let variants = [
            text.replacen("</", "<\\/", 1),
            text.replacen("=\"", "=\"'", 1),
            format!("<!--{comment_body}-->"),
            format!("<root>{text}</root>"),
            format!("{text}\n<a{}/>\n", "x".repeat(tag_len)),
        ];
        variants.choose(rng).unwrap().clone().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_in_root_is_one_possible_variant() {
        let m = XmlMutator::new(Some("<a/>"), b"<a/>".to_vec());
        let mut found_wrap = false;
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let out = String::from_utf8(m.mutate(b"<a/>", &mut rng)).unwrap();
            if out == "<root><a/></root>" {
                found_wrap = true;
                break;
            }
        }
        assert!(found_wrap);
    }

    #[test]
    fn falls_back_to_generic_without_text() {
        let m = XmlMutator::new(None, Vec::new());
        let mut rng = rand::thread_rng();
        assert!(!m.mutate(b"<a/>", &mut rng).is_empty());
    }
}
