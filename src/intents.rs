use crate::anchor::{Anchor, LinePredicate, Pattern};
use crate::error::PlanError;
use crate::guard::Signature;
use crate::plan::EndRule;

/// A named transformation with its anchors, payload, and the signature the
/// idempotence guard checks. Payload text is opaque: the engine never
/// inspects or validates what the inserted lines mean.
#[derive(Debug, Clone)]
pub struct TransformIntent {
    pub name: &'static str,
    pub kind: IntentKind,
    pub signature: Signature,
}

#[derive(Debug, Clone)]
pub enum IntentKind {
    InsertAfter {
        anchor: Anchor,
        placement: Placement,
        payload: Vec<String>,
    },
    DeleteRange {
        start: Anchor,
        end: EndRule,
    },
    ReplaceRange {
        start: Anchor,
        end: EndRule,
        payload: Vec<String>,
    },
}

/// Where an insert lands relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    AnchorLine,
    /// After the line that closes the bracket block opened at the anchor.
    BlockClose,
}

const GIT_SERVICE_IMPORT: &str =
    "import { registerGitHandlers, cleanupGitWatchers } from './services/git-service.js'";
const IMPORT_MARKER: &str = "import { generateFileId";
const WATCHER_INTERFACE_OPEN: &str = "interface GitWatcherSet";
const WATCHER_INTERFACE_LAST: &str = "const GIT_DEBOUNCE_MS";
const STATUS_LISTENER_OPEN: &str = "sshManager.on('status-change'";
const HANDLER_REGION_OPEN: &str = "ipcMain.handle('git:get-info'";
// a top-level registration or a top-level section comment ends the handler
// region; indented comments inside handler bodies never match
const HANDLER_REGION_BOUNDARY: &str = r"^(?:ipcMain\.handle\(|//)";
const GIT_HANDLER_TAG: &str = "('git:";
const CLEANUP_COMMENT: &str = "// Clean up all git watchers";
const CLEANUP_LAST: &str = "gitWatchers.clear()";

/// The five transformations that move the git subsystem out of the
/// main-process entry point and delegate to `git-service`.
pub fn git_service_intents() -> Result<Vec<TransformIntent>, PlanError> {
    Ok(vec![
        TransformIntent {
            name: "add-git-service-import",
            kind: IntentKind::InsertAfter {
                anchor: Anchor::unique(Pattern::literal(IMPORT_MARKER)),
                placement: Placement::AnchorLine,
                payload: vec![GIT_SERVICE_IMPORT.to_string()],
            },
            signature: Signature::LinePresent(Pattern::literal("./services/git-service.js")),
        },
        TransformIntent {
            name: "remove-watcher-interface",
            kind: IntentKind::DeleteRange {
                start: Anchor::unique(Pattern::literal(WATCHER_INTERFACE_OPEN)),
                end: EndRule::NextMatch {
                    predicate: LinePredicate::accepting(Pattern::literal(WATCHER_INTERFACE_LAST)),
                    inclusive: true,
                },
            },
            signature: Signature::LineAbsent(Pattern::literal(WATCHER_INTERFACE_OPEN)),
        },
        TransformIntent {
            name: "register-git-handlers",
            kind: IntentKind::InsertAfter {
                anchor: Anchor::unique(Pattern::literal(STATUS_LISTENER_OPEN)),
                placement: Placement::BlockClose,
                payload: vec![
                    String::new(),
                    "  // Register all git-related IPC handlers".to_string(),
                    "  registerGitHandlers(mainWindow, sshManager, execInContextAsync)"
                        .to_string(),
                ],
            },
            signature: Signature::LinePresent(Pattern::literal("registerGitHandlers(mainWindow")),
        },
        TransformIntent {
            name: "remove-git-ipc-handlers",
            kind: IntentKind::DeleteRange {
                start: Anchor::unique(Pattern::literal(HANDLER_REGION_OPEN)),
                end: EndRule::NextMatch {
                    predicate: LinePredicate::rejecting(
                        Pattern::regex(HANDLER_REGION_BOUNDARY)?,
                        Pattern::literal(GIT_HANDLER_TAG),
                    ),
                    inclusive: false,
                },
            },
            signature: Signature::LineAbsent(Pattern::literal("ipcMain.handle('git:")),
        },
        TransformIntent {
            name: "delegate-watcher-cleanup",
            kind: IntentKind::ReplaceRange {
                start: Anchor::unique(Pattern::literal(CLEANUP_COMMENT)),
                end: EndRule::NextMatch {
                    predicate: LinePredicate::accepting(Pattern::literal(CLEANUP_LAST)),
                    inclusive: true,
                },
                payload: vec![
                    "    // Clean up all git watchers".to_string(),
                    "    cleanupGitWatchers()".to_string(),
                ],
            },
            signature: Signature::Exchanged {
                inserted: Pattern::literal("cleanupGitWatchers()"),
                removed: Pattern::literal(CLEANUP_LAST),
            },
        },
    ])
}
