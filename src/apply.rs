use serde::Serialize;

use crate::document::{Line, SourceDocument};
use crate::plan::{EditPlan, PlannedAction};

/// Per-operation accounting; `line` is 1-based for human output.
#[derive(Debug, Clone, Serialize)]
pub struct OpReport {
    pub intent: &'static str,
    pub line: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

/// The applier's output: the new document plus the diagnostics record of
/// what changed, what was skipped as already applied, and any warnings
/// gathered during planning.
#[derive(Debug, Serialize)]
pub struct PatchResult {
    #[serde(skip)]
    pub document: SourceDocument,
    pub reports: Vec<OpReport>,
    pub already_applied: Vec<&'static str>,
    pub warnings: Vec<String>,
}

impl PatchResult {
    pub fn lines_added(&self) -> usize {
        self.reports.iter().map(|report| report.lines_added).sum()
    }

    pub fn lines_removed(&self) -> usize {
        self.reports.iter().map(|report| report.lines_removed).sum()
    }
}

/// Materialize a validated plan in one left-to-right pass. Every position
/// was resolved against the untouched snapshot, so operations apply in plan
/// order without recounting: earlier edits cannot perturb later ones.
pub fn apply_plan(
    doc: &SourceDocument,
    plan: &EditPlan,
    already_applied: Vec<&'static str>,
) -> PatchResult {
    let terminator = doc.dominant_terminator();
    let mut lines: Vec<Line> = Vec::with_capacity(doc.len());
    let mut reports = Vec::with_capacity(plan.ops.len());
    let mut ops = plan.ops.iter().peekable();

    let mut index = 0;
    while index < doc.len() {
        let Some(op) = ops.next_if(|op| op.start_line() == index) else {
            lines.push(doc.lines()[index].clone());
            index += 1;
            continue;
        };
        match &op.action {
            PlannedAction::InsertAfter { line, payload } => {
                let mut anchor_line = doc.lines()[*line].clone();
                // the anchor may have been the last, unterminated line
                if anchor_line.terminator.is_empty() {
                    anchor_line.terminator = terminator;
                }
                lines.push(anchor_line);
                for text in payload {
                    lines.push(Line {
                        content: text.clone(),
                        terminator,
                    });
                }
                reports.push(OpReport {
                    intent: op.intent,
                    line: line + 1,
                    lines_added: payload.len(),
                    lines_removed: 0,
                });
                index += 1;
            }
            PlannedAction::DeleteRange { start, end } => {
                reports.push(OpReport {
                    intent: op.intent,
                    line: start + 1,
                    lines_added: 0,
                    lines_removed: end - start + 1,
                });
                index = end + 1;
            }
            PlannedAction::ReplaceRange {
                start,
                end,
                payload,
            } => {
                for text in payload {
                    lines.push(Line {
                        content: text.clone(),
                        terminator,
                    });
                }
                reports.push(OpReport {
                    intent: op.intent,
                    line: start + 1,
                    lines_added: payload.len(),
                    lines_removed: end - start + 1,
                });
                index = end + 1;
            }
        }
    }

    PatchResult {
        document: doc.with_lines(lines),
        reports,
        already_applied,
        warnings: plan.warnings.clone(),
    }
}
