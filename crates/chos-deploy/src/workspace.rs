//! Disposable per-run working directory
//!
//! A `Workspace` owns every file written during one provisioning run. It is
//! removed when dropped, so any early return on the apply path releases it.
//! Calling [`Workspace::retain`] switches it to keep-on-drop, which the destroy
//! path uses so state survives a failed removal for inspection.

use crate::error::{DeployError, Result};
use chos_common::defaults::WORKSPACE_PREFIX;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What happens to the directory when the handle is dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retention {
    RemoveOnDrop,
    Keep,
}

/// Isolated directory tree for one provisioning run
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    retention: Retention,
}

impl Workspace {
    /// Create a fresh workspace under the system temp directory
    pub fn create() -> Result<Self> {
        Self::create_in(std::env::temp_dir())
    }

    /// Create a fresh workspace under `parent`
    pub fn create_in(parent: impl AsRef<Path>) -> Result<Self> {
        let parent = parent.as_ref();
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| {
                DeployError::io(
                    format!("Failed to create workspace in {}", parent.display()),
                    e,
                )
            })?;

        // Ownership moves to us; removal follows `retention`, not TempDir's drop.
        let root = dir.keep();
        debug!(path = %root.display(), "Created workspace");

        Ok(Self {
            root,
            retention: Retention::RemoveOnDrop,
        })
    }

    /// Workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a file or directory inside the workspace
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Keep the directory when this handle is dropped
    pub fn retain(&mut self) {
        self.retention = Retention::Keep;
    }

    pub fn is_retained(&self) -> bool {
        self.retention == Retention::Keep
    }

    /// Remove the workspace and everything in it.
    ///
    /// Removing an already-removed workspace is not an error.
    pub fn destroy(&self) -> Result<()> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {
                debug!(path = %self.root.display(), "Removed workspace");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeployError::io(
                format!("Failed to remove workspace {}", self.root.display()),
                e,
            )),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.retention == Retention::RemoveOnDrop {
            if let Err(e) = self.destroy() {
                warn!(path = %self.root.display(), error = %e, "Failed to remove workspace");
            }
        }
    }
}
