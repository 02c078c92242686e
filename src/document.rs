use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use time::OffsetDateTime;

use crate::encoding::{self, EncodingSource, SnapshotEncoding};

/// One line of the snapshot together with the terminator it carried in the
/// original bytes, so untouched regions round-trip exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub content: String,
    pub terminator: &'static str,
}

impl Line {
    fn new(content: String, terminator: &'static str) -> Self {
        Self {
            content,
            terminator,
        }
    }
}

/// Immutable snapshot of the target file, captured once per run. All anchor
/// resolution and edit application happens against this snapshot; it is never
/// mutated in place.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    lines: Vec<Line>,
    dominant_terminator: &'static str,
    pub encoding: SnapshotEncoding,
    pub decode_errors: bool,
}

impl SourceDocument {
    pub fn read(path: &Path, override_encoding: Option<&'static Encoding>) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let decoded = encoding::decode(&bytes, override_encoding);
        Ok(Self::from_parts(
            &decoded.text,
            decoded.encoding,
            decoded.had_errors,
        ))
    }

    /// Snapshot from in-memory text, assumed UTF-8. Used by tests and by
    /// callers that already hold decoded content.
    pub fn from_text(text: &str) -> Self {
        let snapshot = SnapshotEncoding {
            encoding: UTF_8,
            source: EncodingSource::StrictUtf8,
        };
        Self::from_parts(text, snapshot, false)
    }

    fn from_parts(text: &str, encoding: SnapshotEncoding, decode_errors: bool) -> Self {
        let lines = split_lines(text);
        let dominant_terminator = dominant_terminator(&lines);
        Self {
            lines,
            dominant_terminator,
            encoding,
            decode_errors,
        }
    }

    /// A new document with the same encoding and terminator conventions but
    /// different lines. Used by the applier for its output.
    pub fn with_lines(&self, lines: Vec<Line>) -> Self {
        Self {
            lines,
            dominant_terminator: self.dominant_terminator,
            encoding: self.encoding,
            decode_errors: self.decode_errors,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line content with the terminator stripped; what patterns match against.
    pub fn content(&self, index: usize) -> &str {
        &self.lines[index].content
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Terminator given to inserted lines.
    pub fn dominant_terminator(&self) -> &'static str {
        self.dominant_terminator
    }

    pub fn render(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(&line.content);
            text.push_str(line.terminator);
        }
        text
    }

    /// Re-encode with the snapshot's original encoding. The flag reports a
    /// lossy fallback during encoding.
    pub fn encode(&self) -> (Vec<u8>, bool) {
        let text = self.render();
        let (bytes, _, had_errors) = self.encoding.encoding.encode(&text);
        (bytes.into_owned(), had_errors)
    }
}

fn split_lines(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut content = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\n' => lines.push(Line::new(std::mem::take(&mut content), "\n")),
            '\r' => {
                let terminator = if chars.peek() == Some(&'\n') {
                    chars.next();
                    "\r\n"
                } else {
                    "\r"
                };
                lines.push(Line::new(std::mem::take(&mut content), terminator));
            }
            _ => content.push(ch),
        }
    }
    if !content.is_empty() {
        lines.push(Line::new(content, ""));
    }
    lines
}

fn dominant_terminator(lines: &[Line]) -> &'static str {
    let mut lf = 0usize;
    let mut crlf = 0usize;
    let mut cr = 0usize;
    for line in lines {
        match line.terminator {
            "\n" => lf += 1,
            "\r\n" => crlf += 1,
            "\r" => cr += 1,
            _ => {}
        }
    }
    if crlf > lf && crlf >= cr {
        "\r\n"
    } else if cr > lf && cr > crlf {
        "\r"
    } else {
        "\n"
    }
}

/// Write to a temp file in the target's directory, fsync, then rename over
/// the target. A failure at any point before the rename leaves the original
/// file byte-for-byte untouched.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let base_dir = parent.unwrap_or_else(|| Path::new("."));
    let unique = format!(
        ".anchorpatch-tmp-{}-{}",
        std::process::id(),
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    );
    let temp_path = base_dir.join(unique);
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("creating temp file {}", temp_path.display()))?;
        file.write_all(data)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing temp file {}", temp_path.display()))?;
    }
    fs::rename(&temp_path, path).or_else(|err| {
        let _ = fs::remove_file(&temp_path);
        Err(err).with_context(|| format!("replacing {}", path.display()))
    })?;
    Ok(())
}

/// Copy the target aside before an apply; picks the first free `.bak` name.
pub fn create_backup(path: &Path) -> Result<PathBuf> {
    let mut attempt = 0usize;
    loop {
        let candidate = backup_candidate(path, attempt);
        if !candidate.exists() {
            fs::copy(path, &candidate)
                .with_context(|| format!("creating backup {}", candidate.display()))?;
            return Ok(candidate);
        }
        attempt += 1;
    }
}

fn backup_candidate(path: &Path, index: usize) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("anchorpatch_target");
    let suffix = if index == 0 {
        ".bak".to_string()
    } else {
        format!(".bak{index}")
    };
    path.with_file_name(format!("{name}{suffix}"))
}
