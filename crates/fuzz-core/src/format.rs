use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};

/// Input format tag assigned to a seed, used to pick a [`crate::mutators::Mutator`]
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Csv,
    Xml,
    Jpeg,
    Elf,
    Pdf,
    Text,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
            Format::Xml => "xml",
            Format::Jpeg => "jpeg",
            Format::Elf => "elf",
            Format::Pdf => "pdf",
            Format::Text => "text",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PROBE_BYTES: usize = 8192;
const TEXT_PROBE_CHARS: usize = 4096;

/// Classifies a seed file by magic bytes, then by textual parse probes,
/// falling back to `text`. Pure apart from reading the file.
pub fn detect_format(seed_path: &Path) -> Result<Format> {
    let bytes = std::fs::read(seed_path)
        .with_context(|| format!("reading seed {}", seed_path.display()))?;
    Ok(detect_format_bytes(&bytes))
}

pub fn detect_format_bytes(bytes: &[u8]) -> Format {
    let head = &bytes[..bytes.len().min(PROBE_BYTES)];
    if head.starts_with(b"\xFF\xD8\xFF") {
        return Format::Jpeg;
    }
    if head.starts_with(b"\x7FELF") {
        return Format::Elf;
    }
    if head.starts_with(b"%PDF-") {
        return Format::Pdf;
    }

    let text_probe = String::from_utf8_lossy(head);
    let text_probe: &str = {
        let n = text_probe.char_indices().nth(TEXT_PROBE_CHARS).map(|(i, _)| i);
        match n {
            Some(i) => &text_probe[..i],
            None => &text_probe,
        }
    };

    if serde_json::from_str::<serde_json::Value>(text_probe).is_ok() {
        return Format::Json;
    }

    if is_probably_xml(text_probe.trim()) {
        return Format::Xml;
    }

    if sniff_csv(text_probe) {
        return Format::Csv;
    }

    Format::Text
}

fn is_probably_xml(probe: &str) -> bool {
    if probe.is_empty() {
        return false;
    }
    let mut reader = quick_xml::Reader::from_str(probe);
    let mut buf = Vec::new();
    let mut saw_start = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(quick_xml::events::Event::Start(_)) | Ok(quick_xml::events::Event::Empty(_)) => {
                saw_start = true;
            }
            Ok(_) => {}
            Err(_) => return false,
        }
        buf.clear();
    }
    saw_start
}

/// A loose delimiter sniff modeled on `csv.Sniffer`: does any candidate
/// delimiter appear with the same count on at least two lines?
fn sniff_csv(probe: &str) -> bool {
    const CANDIDATES: [char; 5] = [',', ';', '\t', '|', ':'];
    let lines: Vec<&str> = probe.lines().filter(|l| !l.is_empty()).take(10).collect();
    if lines.len() < 2 {
        return false;
    }
    for delim in CANDIDATES {
        let counts: Vec<usize> = lines.iter().map(|l| l.matches(delim).count()).collect();
        let first = counts[0];
        if first > 0 && counts.iter().all(|c| *c == first) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_jpeg_by_magic() {
        assert_eq!(detect_format_bytes(b"\xFF\xD8\xFFrest"), Format::Jpeg);
    }

    #[test]
    fn detects_elf_by_magic() {
        assert_eq!(detect_format_bytes(b"\x7FELF\x02\x01"), Format::Elf);
    }

    #[test]
    fn detects_pdf_by_magic() {
        assert_eq!(detect_format_bytes(b"%PDF-1.4\n..."), Format::Pdf);
    }

    #[test]
    fn detects_json() {
        assert_eq!(detect_format_bytes(br#"{"a": 1, "b": [1,2,3]}"#), Format::Json);
    }

    #[test]
    fn detects_xml() {
        assert_eq!(detect_format_bytes(b"<root><a>1</a></root>"), Format::Xml);
    }

    #[test]
    fn detects_csv() {
        assert_eq!(detect_format_bytes(b"id,name\n1,Alice\n2,Bob\n"), Format::Csv);
    }

    #[test]
    fn falls_back_to_text() {
        assert_eq!(detect_format_bytes(b"just some plain text"), Format::Text);
    }

    #[test]
    fn empty_input_is_text() {
        assert_eq!(detect_format_bytes(b""), Format::Text);
    }
}
