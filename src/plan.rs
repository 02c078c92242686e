use crate::anchor::LinePredicate;
use crate::document::SourceDocument;
use crate::error::PlanError;
use crate::intents::{IntentKind, Placement, TransformIntent};

/// Where a delete/replace range stops. One explicit rule is fixed per intent
/// when the intent set is constructed; it is never re-derived per run from
/// absolute offsets.
#[derive(Debug, Clone)]
pub enum EndRule {
    /// First line strictly after the start anchor matching the predicate.
    /// Exclusive means the range ends on the line before that match.
    NextMatch {
        predicate: LinePredicate,
        inclusive: bool,
    },
    /// The line on which bracket nesting opened at the start line returns to
    /// its starting level.
    BlockClose,
}

/// An operation with every position already resolved against the snapshot.
/// Ranges are inclusive 0-based line indices, valid only for that snapshot.
#[derive(Debug, Clone)]
pub struct PlannedOp {
    pub intent: &'static str,
    pub action: PlannedAction,
}

#[derive(Debug, Clone)]
pub enum PlannedAction {
    InsertAfter {
        line: usize,
        payload: Vec<String>,
    },
    DeleteRange {
        start: usize,
        end: usize,
    },
    ReplaceRange {
        start: usize,
        end: usize,
        payload: Vec<String>,
    },
}

impl PlannedOp {
    /// Inclusive line span the operation occupies. An insert occupies its
    /// anchor line so that inserting inside a deleted range is an overlap.
    pub fn span(&self) -> (usize, usize) {
        match &self.action {
            PlannedAction::InsertAfter { line, .. } => (*line, *line),
            PlannedAction::DeleteRange { start, end }
            | PlannedAction::ReplaceRange { start, end, .. } => (*start, *end),
        }
    }

    pub fn start_line(&self) -> usize {
        self.span().0
    }
}

/// Validated, ordered operations plus warnings accumulated while resolving
/// (stale line hints). Built once per run; either fully valid or the run
/// aborts with the first planning error.
#[derive(Debug)]
pub struct EditPlan {
    pub ops: Vec<PlannedOp>,
    pub warnings: Vec<String>,
}

pub fn build_plan(
    doc: &SourceDocument,
    intents: &[&TransformIntent],
) -> Result<EditPlan, PlanError> {
    let mut ops = Vec::with_capacity(intents.len());
    let mut warnings = Vec::new();
    for intent in intents {
        ops.push(resolve_intent(doc, intent, &mut warnings)?);
    }
    ops.sort_by_key(PlannedOp::span);
    reject_overlaps(&ops)?;
    Ok(EditPlan { ops, warnings })
}

fn resolve_intent(
    doc: &SourceDocument,
    intent: &TransformIntent,
    warnings: &mut Vec<String>,
) -> Result<PlannedOp, PlanError> {
    let action = match &intent.kind {
        IntentKind::InsertAfter {
            anchor,
            placement,
            payload,
        } => {
            let resolved = anchor.resolve(doc, intent.name)?;
            warnings.extend(resolved.hint_warning);
            let line = match placement {
                Placement::AnchorLine => resolved.index,
                Placement::BlockClose => {
                    block_close(doc, resolved.index).ok_or_else(|| PlanError::AnchorNotFound {
                        intent: intent.name.to_string(),
                        pattern: "block close".to_string(),
                    })?
                }
            };
            PlannedAction::InsertAfter {
                line,
                payload: payload.clone(),
            }
        }
        IntentKind::DeleteRange { start, end } => {
            let resolved = start.resolve(doc, intent.name)?;
            warnings.extend(resolved.hint_warning);
            let end = resolve_end(doc, intent.name, resolved.index, end)?;
            PlannedAction::DeleteRange {
                start: resolved.index,
                end,
            }
        }
        IntentKind::ReplaceRange {
            start,
            end,
            payload,
        } => {
            let resolved = start.resolve(doc, intent.name)?;
            warnings.extend(resolved.hint_warning);
            let end = resolve_end(doc, intent.name, resolved.index, end)?;
            PlannedAction::ReplaceRange {
                start: resolved.index,
                end,
                payload: payload.clone(),
            }
        }
    };
    Ok(PlannedOp {
        intent: intent.name,
        action,
    })
}

fn resolve_end(
    doc: &SourceDocument,
    intent: &str,
    start: usize,
    rule: &EndRule,
) -> Result<usize, PlanError> {
    let end = match rule {
        EndRule::NextMatch {
            predicate,
            inclusive,
        } => {
            let matched = (start + 1..doc.len())
                .find(|index| predicate.matches(doc.content(*index)))
                .ok_or_else(|| PlanError::AnchorNotFound {
                    intent: intent.to_string(),
                    pattern: predicate.to_string(),
                })?;
            if *inclusive { matched } else { matched - 1 }
        }
        EndRule::BlockClose => {
            block_close(doc, start).ok_or_else(|| PlanError::AnchorNotFound {
                intent: intent.to_string(),
                pattern: "block close".to_string(),
            })?
        }
    };
    if end <= start {
        return Err(PlanError::EndBeforeStart {
            intent: intent.to_string(),
        });
    }
    Ok(end)
}

/// Line on which bracket depth opened at `start` returns to zero. Purely
/// line-oriented: brackets inside string literals are counted too, which is
/// good enough for the block shapes this engine targets.
fn block_close(doc: &SourceDocument, start: usize) -> Option<usize> {
    let mut depth: i64 = 0;
    for index in start..doc.len() {
        depth += bracket_delta(doc.content(index));
        if depth <= 0 {
            return Some(index);
        }
    }
    None
}

fn bracket_delta(line: &str) -> i64 {
    let mut delta = 0;
    for ch in line.chars() {
        match ch {
            '(' | '{' | '[' => delta += 1,
            ')' | '}' | ']' => delta -= 1,
            _ => {}
        }
    }
    delta
}

fn reject_overlaps(ops: &[PlannedOp]) -> Result<(), PlanError> {
    for pair in ops.windows(2) {
        let (_, first_end) = pair[0].span();
        let (second_start, _) = pair[1].span();
        if second_start <= first_end {
            return Err(PlanError::RangeOverlap {
                first: pair[0].intent.to_string(),
                second: pair[1].intent.to_string(),
            });
        }
    }
    Ok(())
}
