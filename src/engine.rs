use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::apply::{self, PatchResult};
use crate::document::{self, SourceDocument};
use crate::error::PlanError;
use crate::guard::{self, GuardReport, IntentState};
use crate::intents::TransformIntent;
use crate::plan;

/// Everything a dry-run or apply computes before deciding whether to write.
#[derive(Debug)]
pub struct PatchOutcome {
    pub guard: GuardReport,
    /// None when every intent was already applied: a global no-op.
    pub result: Option<PatchResult>,
}

/// The whole planning side of the pipeline: signature check, anchor
/// resolution, plan validation, and the in-memory apply. Pure with respect
/// to the filesystem; callers decide whether the result is written.
pub fn plan_and_apply(
    doc: &SourceDocument,
    intents: &[TransformIntent],
) -> Result<PatchOutcome, PlanError> {
    let report = guard::inspect(doc, intents);

    let mut pending = Vec::new();
    let mut already_applied = Vec::new();
    for (intent, entry) in intents.iter().zip(&report.states) {
        match entry.state {
            IntentState::Applied => already_applied.push(intent.name),
            IntentState::Unapplied => pending.push(intent),
            IntentState::Inconsistent => {
                return Err(PlanError::InconsistentState {
                    intent: intent.name.to_string(),
                });
            }
        }
    }

    if pending.is_empty() {
        return Ok(PatchOutcome {
            guard: report,
            result: None,
        });
    }

    let plan = plan::build_plan(doc, &pending)?;
    let result = apply::apply_plan(doc, &plan, already_applied);
    Ok(PatchOutcome {
        guard: report,
        result: Some(result),
    })
}

/// Re-encode and write the patched document over the target. The temp-write
/// plus rename means any failure here leaves the original file byte-for-byte
/// intact. Returns the backup path when one was taken.
pub fn write_back(
    path: &Path,
    result: &PatchResult,
    no_backup: bool,
) -> Result<Option<PathBuf>> {
    let (bytes, lossy) = result.document.encode();
    if lossy {
        eprintln!(
            "warning: encoding fallback occurred while writing {}; output may be lossy",
            path.display()
        );
    }
    let backup = if no_backup {
        None
    } else {
        Some(document::create_backup(path)?)
    };
    document::write_atomic(path, &bytes)?;
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::DocumentState;
    use crate::intents::git_service_intents;
    use std::fs;
    use tempfile::tempdir;

    const FIXTURE: &str = r#"import { app, BrowserWindow, ipcMain } from 'electron'
import { generateFileId } from './utils/file-id.js'
import { SshManager } from './services/ssh-manager.js'

interface GitWatcherSet {
  watcher: FSWatcher
  debounce: NodeJS.Timeout | null
  pollTimer: NodeJS.Timeout | null
  repoRoot: string
  lastStatus: string | null
}

const gitWatchers = new Map<string, GitWatcherSet>()
const GIT_DEBOUNCE_MS = 250

function createWindow() {
  const mainWindow = new BrowserWindow({ width: 1200, height: 800 })

  sshManager.on('status-change', (status) => {
    mainWindow.webContents.send('ssh:status-change', status)
  })
}

app.on('before-quit', () => {
    // Clean up all git watchers
    for (const [repoRoot, set] of gitWatchers) {
      set.watcher.close()
      if (set.debounce) clearTimeout(set.debounce)
    }
    gitWatchers.clear()
})

ipcMain.handle('git:get-info', async (_event, filePath) => {
  return getGitInfo(filePath)
})

ipcMain.handle('git:status', async (_event, repoRoot) => {
  return runGitStatus(repoRoot)
})

ipcMain.handle('git:pull', async (_event, repoRoot) => {
  return runGitPull(repoRoot)
})

// File system IPC handlers
ipcMain.handle('fs:read-file', async (_event, filePath) => {
  return readFileSafe(filePath)
})
"#;

    const PATCHED: &str = r#"import { app, BrowserWindow, ipcMain } from 'electron'
import { generateFileId } from './utils/file-id.js'
import { registerGitHandlers, cleanupGitWatchers } from './services/git-service.js'
import { SshManager } from './services/ssh-manager.js'


function createWindow() {
  const mainWindow = new BrowserWindow({ width: 1200, height: 800 })

  sshManager.on('status-change', (status) => {
    mainWindow.webContents.send('ssh:status-change', status)
  })

  // Register all git-related IPC handlers
  registerGitHandlers(mainWindow, sshManager, execInContextAsync)
}

app.on('before-quit', () => {
    // Clean up all git watchers
    cleanupGitWatchers()
})

// File system IPC handlers
ipcMain.handle('fs:read-file', async (_event, filePath) => {
  return readFileSafe(filePath)
})
"#;

    fn intents() -> Vec<TransformIntent> {
        git_service_intents().expect("intent set")
    }

    #[test]
    fn full_extraction_produces_the_delegated_document() {
        let doc = SourceDocument::from_text(FIXTURE);
        let outcome = plan_and_apply(&doc, &intents()).expect("plans");
        assert_eq!(outcome.guard.document_state(), DocumentState::FullyUnapplied);
        let result = outcome.result.expect("pending work");
        assert_eq!(result.document.render(), PATCHED);
        assert_eq!(result.reports.len(), 5);
        assert!(result.already_applied.is_empty());
    }

    #[test]
    fn line_accounting_matches_the_removed_and_inserted_regions() {
        let doc = SourceDocument::from_text(FIXTURE);
        let outcome = plan_and_apply(&doc, &intents()).expect("plans");
        let result = outcome.result.expect("pending work");
        // interface block 10, handler region 12, cleanup block 6
        assert_eq!(result.lines_removed(), 10 + 12 + 6);
        // import 1, registration payload 3, cleanup replacement 2
        assert_eq!(result.lines_added(), 1 + 3 + 2);
        let original_lines = doc.len();
        let patched_lines = result.document.len();
        assert_eq!(
            patched_lines,
            original_lines - result.lines_removed() + result.lines_added()
        );
        assert_eq!(patched_lines, 26);
    }

    #[test]
    fn second_run_is_a_global_no_op() {
        let doc = SourceDocument::from_text(FIXTURE);
        let first = plan_and_apply(&doc, &intents()).expect("first run");
        let patched = first.result.expect("pending work").document;

        let second = plan_and_apply(&patched, &intents()).expect("second run");
        assert_eq!(second.guard.document_state(), DocumentState::FullyApplied);
        assert!(second.result.is_none(), "second run must not edit");
        assert_eq!(patched.render(), PATCHED);
    }

    #[test]
    fn unrelated_earlier_insertions_do_not_change_the_edits() {
        let prefix = "// bootstrap preamble\nimport { log } from './log.js'\n\n";
        let shifted = format!("{prefix}{FIXTURE}");
        let doc = SourceDocument::from_text(&shifted);
        let outcome = plan_and_apply(&doc, &intents()).expect("plans");
        let result = outcome.result.expect("pending work");
        assert_eq!(result.document.render(), format!("{prefix}{PATCHED}"));
    }

    #[test]
    fn partially_applied_document_gets_only_the_missing_edits() {
        let with_import = FIXTURE.replace(
            "import { generateFileId } from './utils/file-id.js'\n",
            "import { generateFileId } from './utils/file-id.js'\n\
             import { registerGitHandlers, cleanupGitWatchers } from './services/git-service.js'\n",
        );
        let doc = SourceDocument::from_text(&with_import);
        let report = guard::inspect(&doc, &intents());
        assert_eq!(report.document_state(), DocumentState::Partial);

        let outcome = plan_and_apply(&doc, &intents()).expect("plans");
        let result = outcome.result.expect("pending work");
        assert_eq!(result.already_applied, vec!["add-git-service-import"]);
        assert_eq!(result.reports.len(), 4);
        assert_eq!(result.document.render(), PATCHED);
    }

    #[test]
    fn missing_anchor_aborts_without_any_edit() {
        let broken = FIXTURE.replace("sshManager.on('status-change'", "sshManager.once('ready'");
        let doc = SourceDocument::from_text(&broken);
        let err = plan_and_apply(&doc, &intents()).unwrap_err();
        assert!(matches!(
            err,
            PlanError::AnchorNotFound { ref intent, .. } if intent == "register-git-handlers"
        ));
    }

    #[test]
    fn planning_failure_never_touches_the_file() {
        let dir = tempdir().expect("temp dir");
        let target = dir.path().join("main.ts");
        let drifted = FIXTURE.replace("// Clean up all git watchers", "// tidy watchers");
        fs::write(&target, &drifted).expect("seed file");

        let doc = SourceDocument::read(&target, None).expect("snapshot");
        let err = plan_and_apply(&doc, &intents()).unwrap_err();
        assert!(matches!(
            err,
            PlanError::AnchorNotFound { ref intent, .. } if intent == "delegate-watcher-cleanup"
        ));
        assert_eq!(fs::read_to_string(&target).expect("read back"), drifted);
    }

    #[test]
    fn mixed_markers_are_refused_as_inconsistent() {
        let both = FIXTURE.replace(
            "    gitWatchers.clear()\n",
            "    cleanupGitWatchers()\n    gitWatchers.clear()\n",
        );
        let doc = SourceDocument::from_text(&both);
        let err = plan_and_apply(&doc, &intents()).unwrap_err();
        assert!(matches!(
            err,
            PlanError::InconsistentState { ref intent } if intent == "delegate-watcher-cleanup"
        ));
    }

    #[test]
    fn failed_write_back_leaves_the_original_untouched() {
        let dir = tempdir().expect("temp dir");
        let target = dir.path().join("main.ts");
        fs::write(&target, FIXTURE).expect("seed file");

        let doc = SourceDocument::read(&target, None).expect("snapshot");
        let outcome = plan_and_apply(&doc, &intents()).expect("plans");
        let result = outcome.result.expect("pending work");

        // a path whose parent is the original file cannot host the temp
        // file, so the write fails before any rename
        let sabotaged = target.join("nested.ts");
        assert!(write_back(&sabotaged, &result, true).is_err());
        assert_eq!(fs::read_to_string(&target).expect("read back"), FIXTURE);
    }
}
