//! The mutator family: one tagged variant per input format. Dispatch is a
//! plain `match`, not a trait object — there is exactly one mutator alive
//! per target for the whole run, so there is no need to pay for dynamic
//! dispatch on the hot path.

mod csv;
mod elf;
mod generic;
mod json;
mod jpeg;
mod pdf;
mod xml;

use rand::Rng;

use crate::format::Format;
use crate::seed::Seed;

pub use csv::CsvMutator;
pub use elf::ElfMutator;
pub use generic::GenericMutator;
pub use json::JsonMutator;
pub use jpeg::JpegMutator;
pub use pdf::PdfMutator;
pub use xml::XmlMutator;

#[derive(Debug, Clone)]
pub enum Mutator {
    Json(JsonMutator),
    Csv(CsvMutator),
    Xml(XmlMutator),
    Jpeg(JpegMutator),
    Elf(ElfMutator),
    Pdf(PdfMutator),
    Generic(GenericMutator),
}

impl Mutator {
    pub fn for_seed(seed: &Seed) -> Self {
        match seed.format {
            Format::Json => Mutator::Json(JsonMutator::new(seed.text.as_deref(), seed.bytes.clone())),
            Format::Csv => Mutator::Csv(CsvMutator::new(seed.text.as_deref())),
            Format::Xml => Mutator::Xml(XmlMutator::new(seed.text.as_deref(), seed.bytes.clone())),
            Format::Jpeg => Mutator::Jpeg(JpegMutator::new(seed.bytes.clone())),
            Format::Elf => Mutator::Elf(ElfMutator::new(seed.bytes.clone())),
            Format::Pdf => Mutator::Pdf(PdfMutator::new(seed.bytes.clone())),
            Format::Text => Mutator::Generic(GenericMutator::new(seed.bytes.clone())),
        }
    }

    /// The finite, fixed-order sequence of edge-case inputs run once per
    /// target before random fuzzing begins.
    pub fn deterministic_inputs(&self) -> Vec<Vec<u8>> {
        match self {
            Mutator::Json(m) => m.deterministic_inputs(),
            Mutator::Csv(m) => m.deterministic_inputs(),
            Mutator::Xml(m) => m.deterministic_inputs(),
            Mutator::Jpeg(m) => m.deterministic_inputs(),
            Mutator::Elf(m) => m.deterministic_inputs(),
            Mutator::Pdf(m) => m.deterministic_inputs(),
            Mutator::Generic(m) => m.deterministic_inputs(),
        }
    }

    /// A randomized mutation derived from `base`, an entry in the corpus
    /// queue (or the seed itself).
    pub fn mutate(&self, base: &[u8], rng: &mut impl Rng) -> Vec<u8> {
        match self {
            Mutator::Json(m) => m.mutate(base, rng),
            Mutator::Csv(m) => m.mutate(base, rng),
            Mutator::Xml(m) => m.mutate(base, rng),
            Mutator::Jpeg(m) => m.mutate(base, rng),
            Mutator::Elf(m) => m.mutate(base, rng),
            Mutator::Pdf(m) => m.mutate(base, rng),
            Mutator::Generic(m) => m.mutate(base, rng),
        }
    }

    /// Format-agnostic byte-level mutation, used as a post-processing
    /// amplifier and as the sole strategy for the generic variant.
    pub fn mutate_bytes(&self, data: &[u8], rng: &mut impl Rng) -> Vec<u8> {
        generic::mutate_bytes(rng, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_json_mutator_for_json_seed() {
        let seed = Seed::from_bytes(br#"{"a":1}"#.to_vec());
        assert!(matches!(Mutator::for_seed(&seed), Mutator::Json(_)));
    }

    #[test]
    fn picks_generic_mutator_for_plain_text() {
        let seed = Seed::from_bytes(b"hello world".to_vec());
        assert!(matches!(Mutator::for_seed(&seed), Mutator::Generic(_)));
    }

    #[test]
    fn deterministic_inputs_always_include_empty_file() {
        let seed = Seed::from_bytes(b"hello".to_vec());
        let mutator = Mutator::for_seed(&seed);
        assert!(mutator.deterministic_inputs().iter().any(|i| i.is_empty()));
    }
}
