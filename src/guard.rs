use std::fmt;

use serde::Serialize;

use crate::anchor::Pattern;
use crate::document::SourceDocument;
use crate::intents::TransformIntent;

/// What the document looks like once an intent has been applied. Signatures
/// are checked before planning so a rerun downgrades finished work to no-ops
/// instead of duplicating inserts or deleting already-removed blocks.
#[derive(Debug, Clone)]
pub enum Signature {
    /// Applied when a line matching the pattern exists.
    LinePresent(Pattern),
    /// Applied when no line matches the pattern.
    LineAbsent(Pattern),
    /// A replacement: applied when the inserted marker exists and the removed
    /// marker is gone. Both present, or neither, is an inconsistent document.
    Exchanged { inserted: Pattern, removed: Pattern },
}

impl Signature {
    pub fn evaluate(&self, doc: &SourceDocument) -> IntentState {
        match self {
            Signature::LinePresent(pattern) => {
                if contains(doc, pattern) {
                    IntentState::Applied
                } else {
                    IntentState::Unapplied
                }
            }
            Signature::LineAbsent(pattern) => {
                if contains(doc, pattern) {
                    IntentState::Unapplied
                } else {
                    IntentState::Applied
                }
            }
            Signature::Exchanged { inserted, removed } => {
                match (contains(doc, inserted), contains(doc, removed)) {
                    (true, false) => IntentState::Applied,
                    (false, true) => IntentState::Unapplied,
                    _ => IntentState::Inconsistent,
                }
            }
        }
    }
}

fn contains(doc: &SourceDocument, pattern: &Pattern) -> bool {
    (0..doc.len()).any(|index| pattern.matches(doc.content(index)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentState {
    Applied,
    Unapplied,
    Inconsistent,
}

impl fmt::Display for IntentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IntentState::Applied => "applied",
            IntentState::Unapplied => "unapplied",
            IntentState::Inconsistent => "inconsistent",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentState {
    FullyApplied,
    FullyUnapplied,
    Partial,
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocumentState::FullyApplied => "fully-applied",
            DocumentState::FullyUnapplied => "fully-unapplied",
            DocumentState::Partial => "inconsistent/partial",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentSignatureState {
    pub intent: &'static str,
    pub state: IntentState,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuardReport {
    pub states: Vec<IntentSignatureState>,
}

impl GuardReport {
    pub fn document_state(&self) -> DocumentState {
        let applied = self
            .states
            .iter()
            .filter(|entry| entry.state == IntentState::Applied)
            .count();
        let unapplied = self
            .states
            .iter()
            .filter(|entry| entry.state == IntentState::Unapplied)
            .count();
        if applied == self.states.len() {
            DocumentState::FullyApplied
        } else if unapplied == self.states.len() {
            DocumentState::FullyUnapplied
        } else {
            DocumentState::Partial
        }
    }
}

pub fn inspect(doc: &SourceDocument, intents: &[TransformIntent]) -> GuardReport {
    let states = intents
        .iter()
        .map(|intent| IntentSignatureState {
            intent: intent.name,
            state: intent.signature.evaluate(doc),
        })
        .collect();
    GuardReport { states }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_and_absence_signatures() {
        let doc = SourceDocument::from_text("import service\nuse it\n");
        let present = Signature::LinePresent(Pattern::literal("import service"));
        assert_eq!(present.evaluate(&doc), IntentState::Applied);
        let absent = Signature::LineAbsent(Pattern::literal("legacy block"));
        assert_eq!(absent.evaluate(&doc), IntentState::Applied);
        let pending = Signature::LinePresent(Pattern::literal("not here"));
        assert_eq!(pending.evaluate(&doc), IntentState::Unapplied);
    }

    #[test]
    fn exchanged_signature_tracks_both_markers() {
        let exchanged = Signature::Exchanged {
            inserted: Pattern::literal("delegate()"),
            removed: Pattern::literal("inline.clear()"),
        };
        let applied = SourceDocument::from_text("delegate()\n");
        assert_eq!(exchanged.evaluate(&applied), IntentState::Applied);
        let unapplied = SourceDocument::from_text("inline.clear()\n");
        assert_eq!(exchanged.evaluate(&unapplied), IntentState::Unapplied);
        let both = SourceDocument::from_text("delegate()\ninline.clear()\n");
        assert_eq!(exchanged.evaluate(&both), IntentState::Inconsistent);
        let neither = SourceDocument::from_text("something else\n");
        assert_eq!(exchanged.evaluate(&neither), IntentState::Inconsistent);
    }

    #[test]
    fn document_state_aggregates_intent_states() {
        let report = GuardReport {
            states: vec![
                IntentSignatureState {
                    intent: "a",
                    state: IntentState::Applied,
                },
                IntentSignatureState {
                    intent: "b",
                    state: IntentState::Applied,
                },
            ],
        };
        assert_eq!(report.document_state(), DocumentState::FullyApplied);

        let report = GuardReport {
            states: vec![
                IntentSignatureState {
                    intent: "a",
                    state: IntentState::Applied,
                },
                IntentSignatureState {
                    intent: "b",
                    state: IntentState::Unapplied,
                },
            ],
        };
        assert_eq!(report.document_state(), DocumentState::Partial);
    }
}
