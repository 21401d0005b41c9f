//! Provisioning tool lifecycle
//!
//! A [`TerraformClient`] is bound to one workspace and one executable. It
//! walks a small state machine:
//!
//! ```text
//! Uninitialized --init--> Initialized --plan--> Planned --apply--> Terminal(Success)
//!                              |
//!                              +--destroy--> Terminal(Success)
//! ```
//!
//! Any non-zero exit moves the session to `Terminal(Failed)`. Nothing is
//! retried; the next step never runs after a failed one.

use crate::error::{DeployError, Result};
use crate::process::{BufferSink, OutputSink, run_streaming};
use crate::workspace::Workspace;
use chos_common::defaults::{CONFIG_DIR, PLAN_FILENAME};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Provisioning tool subcommands driven by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Subcommand {
    Init,
    Plan,
    Apply,
    Destroy,
}

impl Subcommand {
    /// Full argument list passed to the executable
    pub fn args(self) -> Vec<String> {
        match self {
            Subcommand::Init => vec!["init".into()],
            Subcommand::Plan => vec![
                "plan".into(),
                "-input=false".into(),
                format!("-out={PLAN_FILENAME}"),
            ],
            Subcommand::Apply => vec!["apply".into(), PLAN_FILENAME.into()],
            Subcommand::Destroy => vec!["destroy".into(), "-force".into()],
        }
    }
}

/// How a finished session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
}

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Planned,
    Terminal(Outcome),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => f.write_str("uninitialized"),
            SessionState::Initialized => f.write_str("initialized"),
            SessionState::Planned => f.write_str("planned"),
            SessionState::Terminal(outcome) => write!(f, "finished ({outcome})"),
        }
    }
}

/// Drives the provisioning tool inside one workspace
pub struct TerraformClient {
    workspace: Workspace,
    binary: PathBuf,
    sink: Arc<dyn OutputSink>,
    state: SessionState,
}

impl TerraformClient {
    /// Bind a session to `workspace` and the executable at `binary`
    pub fn new(
        workspace: Workspace,
        binary: impl Into<PathBuf>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            workspace,
            binary: binary.into(),
            sink,
            state: SessionState::Uninitialized,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run `init`.
    ///
    /// Output is held back while init runs and only shown if it fails, since
    /// a successful init is noise.
    pub async fn initialize(&mut self) -> Result<()> {
        self.require("initialize", SessionState::Uninitialized)?;

        let captured = BufferSink::new();
        let result = self.run(Subcommand::Init, &captured).await;
        if result.is_err() {
            captured.replay_into(self.sink.as_ref());
        }
        result?;

        self.state = SessionState::Initialized;
        info!("Provisioning tool initialized");
        Ok(())
    }

    /// Run `plan` then `apply` on the saved plan. Apply only runs after a
    /// successful plan.
    pub async fn apply(&mut self) -> Result<()> {
        self.require("apply", SessionState::Initialized)?;

        let sink = Arc::clone(&self.sink);
        self.run(Subcommand::Plan, sink.as_ref()).await?;
        self.state = SessionState::Planned;

        self.run(Subcommand::Apply, sink.as_ref()).await?;
        self.state = SessionState::Terminal(Outcome::Success);
        info!("Infrastructure applied");
        Ok(())
    }

    /// Run `destroy -force`. Needs a successful init in this session only.
    pub async fn destroy(&mut self) -> Result<()> {
        self.require("destroy", SessionState::Initialized)?;

        let sink = Arc::clone(&self.sink);
        self.run(Subcommand::Destroy, sink.as_ref()).await?;
        self.state = SessionState::Terminal(Outcome::Success);
        info!("Infrastructure destroyed");
        Ok(())
    }

    /// Remove the workspace. Safe to call more than once.
    pub fn cleanup(&self) -> Result<()> {
        self.workspace.destroy()
    }

    fn require(&self, operation: &'static str, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DeployError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    async fn run(&mut self, stage: Subcommand, sink: &dyn OutputSink) -> Result<()> {
        let args = stage.args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let cwd = self.workspace.path(CONFIG_DIR);

        let outcome = match run_streaming(&self.binary, &args, &cwd, sink).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state = SessionState::Terminal(Outcome::Failed);
                return Err(e);
            }
        };

        if outcome.success() {
            return Ok(());
        }

        warn!(stage = %stage, code = ?outcome.code(), "Provisioning tool failed");
        self.state = SessionState::Terminal(Outcome::Failed);
        Err(DeployError::Subprocess {
            stage,
            code: outcome.code(),
            stderr: outcome.stderr,
        })
    }
}

impl fmt::Debug for TerraformClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerraformClient")
            .field("workspace", &self.workspace)
            .field("binary", &self.binary)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
