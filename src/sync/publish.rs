//! Publishing resync results through version control.
//!
//! The engine never touches version control itself. Callers that want the
//! rewritten modeling files committed pass the report of a finished resync
//! to [`publish_resync`] together with their [`VersionControl`]
//! implementation.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use super::types::ResyncReport;
use crate::error::Result;

/// Version-control operations needed to publish modeling-file changes.
pub trait VersionControl {
    /// Stage the given files.
    fn stage(&self, paths: &[PathBuf]) -> Result<()>;

    /// Commit staged changes and return the new revision id.
    fn commit(&self, message: &str) -> Result<String>;

    /// Push the current branch.
    fn push(&self) -> Result<()>;

    /// Diff of `path` against `revision`.
    fn diff(&self, path: &Path, revision: &str) -> Result<String>;
}

/// Stage, commit and push the files a resync wrote.
///
/// Returns the revision id, or `None` when the resync wrote nothing. Stops at
/// the first failing step.
#[instrument(skip(report, vcs), fields(files = report.files_written.len()))]
pub fn publish_resync(
    report: &ResyncReport,
    vcs: &dyn VersionControl,
    message: &str,
) -> Result<Option<String>> {
    if report.files_written.is_empty() {
        return Ok(None);
    }
    vcs.stage(&report.files_written)?;
    let revision = vcs.commit(message)?;
    vcs.push()?;
    info!(revision = %revision, "Published resync");
    Ok(Some(revision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingVcs {
        calls: RefCell<Vec<String>>,
        fail_push: bool,
    }

    impl VersionControl for RecordingVcs {
        fn stage(&self, paths: &[PathBuf]) -> Result<()> {
            for path in paths {
                self.calls.borrow_mut().push(format!("stage {}", path.display()));
            }
            Ok(())
        }

        fn commit(&self, message: &str) -> Result<String> {
            self.calls.borrow_mut().push(format!("commit {}", message));
            Ok("abc123".to_string())
        }

        fn push(&self) -> Result<()> {
            if self.fail_push {
                return Err(Error::VersionControl("remote rejected".to_string()));
            }
            self.calls.borrow_mut().push("push".to_string());
            Ok(())
        }

        fn diff(&self, path: &Path, revision: &str) -> Result<String> {
            Ok(format!("{} @ {}", path.display(), revision))
        }
    }

    #[test]
    fn test_publish_nothing_written() {
        let vcs = RecordingVcs::default();
        let report = ResyncReport::new();
        assert_eq!(publish_resync(&report, &vcs, "sync").unwrap(), None);
        assert!(vcs.calls.borrow().is_empty());
    }

    #[test]
    fn test_publish_written_files() {
        let vcs = RecordingVcs::default();
        let mut report = ResyncReport::new();
        report.files_written.push(PathBuf::from("se/drone.sysml"));

        let revision = publish_resync(&report, &vcs, "Resync metadata").unwrap();
        assert_eq!(revision.as_deref(), Some("abc123"));
        assert_eq!(
            *vcs.calls.borrow(),
            vec!["stage se/drone.sysml", "commit Resync metadata", "push"]
        );
        assert_eq!(vcs.diff(Path::new("a"), "HEAD").unwrap(), "a @ HEAD");
    }

    #[test]
    fn test_publish_push_failure() {
        let vcs = RecordingVcs {
            fail_push: true,
            ..Default::default()
        };
        let mut report = ResyncReport::new();
        report.files_written.push(PathBuf::from("se/drone.sysml"));
        assert!(matches!(
            publish_resync(&report, &vcs, "sync"),
            Err(Error::VersionControl(_))
        ));
    }
}
