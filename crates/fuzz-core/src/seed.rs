use std::path::Path;

use anyhow::{Context, Result};

use crate::format::{detect_format_bytes, Format};

/// The immutable original input for a target, held both as raw bytes
/// and (when the bytes are valid UTF-8) as text.
#[derive(Debug, Clone)]
pub struct Seed {
    pub bytes: Vec<u8>,
    pub text: Option<String>,
    pub format: Format,
}

impl Seed {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let format = detect_format_bytes(&bytes);
        let text = match format {
            Format::Jpeg | Format::Elf | Format::Pdf => None,
            _ => Some(String::from_utf8_lossy(&bytes).into_owned()),
        };
        Self { bytes, text, format }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_formats_have_no_text() {
        let seed = Seed::from_bytes(b"\xFF\xD8\xFF\x00\x01".to_vec());
        assert!(seed.text.is_none());
        assert_eq!(seed.format, Format::Jpeg);
    }

    #[test]
    fn textual_formats_decode_lossily() {
        let seed = Seed::from_bytes(br#"{"a":1}"#.to_vec());
        assert_eq!(seed.text.as_deref(), Some(r#"{"a":1}"#));
    }
}
