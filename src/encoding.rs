use std::fmt;

use anyhow::{Result, anyhow};
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSource {
    Override,
    Bom,
    StrictUtf8,
    Detector,
}

impl fmt::Display for EncodingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EncodingSource::Override => "override",
            EncodingSource::Bom => "bom",
            EncodingSource::StrictUtf8 => "utf-8",
            EncodingSource::Detector => "detector",
        };
        f.write_str(label)
    }
}

/// How the snapshot's bytes were interpreted. Carried on the document so the
/// write-back re-encodes with the same encoding.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotEncoding {
    pub encoding: &'static Encoding,
    pub source: EncodingSource,
}

impl SnapshotEncoding {
    pub fn describe(&self) -> String {
        format!("{} ({})", self.encoding.name(), self.source)
    }
}

#[derive(Debug, Clone)]
pub struct Decoded {
    pub text: String,
    pub had_errors: bool,
    pub encoding: SnapshotEncoding,
}

pub fn resolve_override(label: Option<&str>) -> Result<Option<&'static Encoding>> {
    let Some(raw) = label else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    Encoding::for_label(trimmed.as_bytes())
        .map(Some)
        .ok_or_else(|| anyhow!("unknown encoding override '{trimmed}'"))
}

pub fn decode(bytes: &[u8], override_encoding: Option<&'static Encoding>) -> Decoded {
    let decision = match override_encoding {
        Some(encoding) => SnapshotEncoding {
            encoding,
            source: EncodingSource::Override,
        },
        None => sniff(bytes),
    };
    let (text, _, had_errors) = decision.encoding.decode(bytes);
    Decoded {
        text: text.into_owned(),
        had_errors,
        encoding: decision,
    }
}

fn sniff(bytes: &[u8]) -> SnapshotEncoding {
    if let Some(encoding) = detect_bom(bytes) {
        return SnapshotEncoding {
            encoding,
            source: EncodingSource::Bom,
        };
    }

    if std::str::from_utf8(bytes).is_ok() {
        return SnapshotEncoding {
            encoding: UTF_8,
            source: EncodingSource::StrictUtf8,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    SnapshotEncoding {
        encoding: detector.guess(None, true),
        source: EncodingSource::Detector,
    }
}

fn detect_bom(bytes: &[u8]) -> Option<&'static Encoding> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Some(UTF_8);
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Some(UTF_16LE);
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Some(UTF_16BE);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_label_is_validated() {
        assert!(resolve_override(Some("utf-16le")).unwrap().is_some());
        assert!(resolve_override(Some("not-a-charset")).is_err());
        assert!(resolve_override(None).unwrap().is_none());
    }

    #[test]
    fn plain_ascii_decodes_as_strict_utf8() {
        let decoded = decode(b"hello world", None);
        assert_eq!(decoded.encoding.source, EncodingSource::StrictUtf8);
        assert_eq!(decoded.text, "hello world");
        assert!(!decoded.had_errors);
    }

    #[test]
    fn bom_wins_over_detection() {
        let decoded = decode(&[0xFF, 0xFE, 0x61, 0x00], None);
        assert_eq!(decoded.encoding.source, EncodingSource::Bom);
        assert_eq!(decoded.encoding.encoding.name(), "UTF-16LE");
        assert_eq!(decoded.text, "a");
    }
}
