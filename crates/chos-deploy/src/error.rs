//! Error taxonomy for a provisioning run
//!
//! Every stage returns a typed failure; only `main` decides whether to
//! terminate the process. Nothing here is retried automatically: a caller
//! that wants another attempt re-runs the whole pipeline.

use crate::terraform::{SessionState, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T, E = DeployError> = std::result::Result<T, E>;

/// Failures a provisioning run can end with
#[derive(Debug, Error)]
pub enum DeployError {
    /// Run configuration failed validation
    #[error("Invalid run configuration: {0}")]
    InvalidConfig(#[from] garde::Report),

    /// A template could not be parsed or referenced an unknown value
    #[error("Failed to render template '{template}'")]
    Template {
        template: String,
        #[source]
        source: tera::Error,
    },

    /// Workspace creation, write or removal failed
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Downloading the provisioning tool failed
    #[error("Failed to download {url}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The host OS has no published provisioning tool archive
    #[error("Unsupported operating system: `{os}`")]
    UnsupportedPlatform { os: String },

    /// An archive entry would be written outside the extraction root
    #[error("Refusing to extract archive entry '{name}' outside the workspace")]
    UnsafeArchiveEntry { name: String },

    /// A file referenced by the infra config was not staged
    #[error("Staged artifact missing: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// The provisioning tool exited non-zero
    #[error("terraform {stage} failed ({}){}", exit_label(*code), stderr_suffix(stderr))]
    Subprocess {
        stage: Subcommand,
        code: Option<i32>,
        stderr: String,
    },

    /// A lifecycle operation was called in the wrong session state
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// An AWS API call made by a collaborator failed
    #[error("AWS {operation} failed: {message}")]
    Aws {
        operation: &'static str,
        message: String,
    },
}

impl DeployError {
    /// Attach context to an IO error
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn template(template: impl Into<String>, source: tera::Error) -> Self {
        Self::Template {
            template: template.into(),
            source,
        }
    }

    /// Exit code of a failed subcommand, if it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            DeployError::Subprocess { code, .. } => *code,
            _ => None,
        }
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            DeployError::Network { .. } => {
                Some("Check network access to the release mirror and re-run the command.")
            }
            DeployError::UnsupportedPlatform { .. } => Some(
                "Only darwin, linux and windows hosts are supported; \
                 pass --terraform-bin to use a locally installed binary.",
            ),
            DeployError::Subprocess {
                stage: Subcommand::Destroy,
                ..
            } => Some("The workspace was kept; inspect it before retrying the removal."),
            DeployError::Subprocess { .. } => {
                Some("Review the terraform output above, then re-run the command.")
            }
            DeployError::InvalidConfig(_) => {
                Some("Names must be 3-40 lowercase letters, digits or hyphens.")
            }
            _ => None,
        }
    }
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subprocess_display_includes_stderr_verbatim() {
        let err = DeployError::Subprocess {
            stage: Subcommand::Plan,
            code: Some(1),
            stderr: "Error: provider.aws: no suitable version installed\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "terraform plan failed (exit code 1):\nError: provider.aws: no suitable version installed"
        );
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn test_subprocess_display_without_stderr() {
        let err = DeployError::Subprocess {
            stage: Subcommand::Init,
            code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "terraform init failed (terminated by signal)");
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn test_io_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = DeployError::io("Failed to write /tmp/x", io_err);
        assert_eq!(err.to_string(), "Failed to write /tmp/x");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_suggestions() {
        assert!(
            DeployError::UnsupportedPlatform {
                os: "freebsd".into()
            }
            .suggestion()
            .is_some()
        );
        let destroy = DeployError::Subprocess {
            stage: Subcommand::Destroy,
            code: Some(1),
            stderr: String::new(),
        };
        assert!(destroy.suggestion().unwrap().contains("workspace was kept"));
        assert!(
            DeployError::MissingArtifact {
                path: PathBuf::from("x")
            }
            .suggestion()
            .is_none()
        );
    }

    #[test]
    fn test_invalid_state_display() {
        let err = DeployError::InvalidState {
            operation: "apply",
            state: SessionState::Uninitialized,
        };
        assert_eq!(err.to_string(), "Cannot apply while session is uninitialized");
    }
}
