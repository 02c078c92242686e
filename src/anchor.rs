use std::fmt;
use std::ops::Range;

use regex::Regex;

use crate::document::SourceDocument;
use crate::error::PlanError;

/// Content pattern matched against a line with its terminator stripped.
/// Positions are always found by content, never trusted from a caller's
/// absolute line number; a stale number is only ever a warning (see
/// [`Anchor::with_hint`]).
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, PlanError> {
        Regex::new(pattern)
            .map(Pattern::Regex)
            .map_err(|source| PlanError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn matches(&self, line: &str) -> bool {
        match self {
            Pattern::Literal(needle) => line.contains(needle.as_str()),
            Pattern::Regex(regex) => regex.is_match(line),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(needle) => write!(f, "\"{needle}\""),
            Pattern::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

/// Accept/reject pair consulted against a single line. The reject side lets
/// an end rule say "a registration of the same kind that is not ours".
#[derive(Debug, Clone)]
pub struct LinePredicate {
    pub accept: Pattern,
    pub reject: Option<Pattern>,
}

impl LinePredicate {
    pub fn accepting(accept: Pattern) -> Self {
        Self {
            accept,
            reject: None,
        }
    }

    pub fn rejecting(accept: Pattern, reject: Pattern) -> Self {
        Self {
            accept,
            reject: Some(reject),
        }
    }

    pub fn matches(&self, line: &str) -> bool {
        if !self.accept.matches(line) {
            return false;
        }
        match &self.reject {
            Some(reject) => !reject.matches(line),
            None => true,
        }
    }
}

impl fmt::Display for LinePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reject {
            Some(reject) => write!(f, "{} without {}", self.accept, reject),
            None => self.accept.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// Exactly one match in the window; more than one is a hard error.
    Unique,
    First,
    /// 1-based.
    Nth(usize),
}

#[derive(Debug, Clone)]
pub struct Anchor {
    pub pattern: Pattern,
    /// Half-open 0-based line-index window; whole document when absent.
    pub window: Option<Range<usize>>,
    pub occurrence: Occurrence,
    /// 1-based line number the caller believes the anchor sits at. Checked
    /// after content resolution and reported on mismatch, never trusted.
    pub line_hint: Option<usize>,
}

#[derive(Debug)]
pub struct ResolvedAnchor {
    /// 0-based line index.
    pub index: usize,
    pub hint_warning: Option<String>,
}

impl Anchor {
    pub fn unique(pattern: Pattern) -> Self {
        Self {
            pattern,
            window: None,
            occurrence: Occurrence::Unique,
            line_hint: None,
        }
    }

    pub fn with_window(mut self, window: Range<usize>) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_occurrence(mut self, occurrence: Occurrence) -> Self {
        self.occurrence = occurrence;
        self
    }

    pub fn with_hint(mut self, line: usize) -> Self {
        self.line_hint = Some(line);
        self
    }

    pub fn resolve(
        &self,
        doc: &SourceDocument,
        intent: &str,
    ) -> Result<ResolvedAnchor, PlanError> {
        let window = self.window.clone().unwrap_or(0..doc.len());
        let start = window.start.min(doc.len());
        let end = window.end.min(doc.len());

        let mut matches = Vec::new();
        for index in start..end {
            if self.pattern.matches(doc.content(index)) {
                matches.push(index);
            }
        }

        let index = match self.occurrence {
            Occurrence::Unique => match matches.as_slice() {
                [] => return Err(self.not_found(intent)),
                [only] => *only,
                _ => {
                    return Err(PlanError::AnchorAmbiguous {
                        intent: intent.to_string(),
                        pattern: self.pattern.to_string(),
                        count: matches.len(),
                    });
                }
            },
            Occurrence::First => *matches.first().ok_or_else(|| self.not_found(intent))?,
            Occurrence::Nth(n) => {
                if n == 0 {
                    return Err(self.not_found(intent));
                }
                *matches.get(n - 1).ok_or_else(|| self.not_found(intent))?
            }
        };

        let hint_warning = self.line_hint.and_then(|hint| {
            let actual = index + 1;
            (hint != actual).then(|| {
                format!(
                    "intent '{intent}': anchor {} resolved to line {actual}, hint said line {hint}",
                    self.pattern
                )
            })
        });

        Ok(ResolvedAnchor {
            index,
            hint_warning,
        })
    }

    fn not_found(&self, intent: &str) -> PlanError {
        PlanError::AnchorNotFound {
            intent: intent.to_string(),
            pattern: self.pattern.to_string(),
        }
    }
}
