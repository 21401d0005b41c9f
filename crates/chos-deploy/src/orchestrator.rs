//! Deploy pipeline
//!
//! Composes the stages into the two flows the binary offers:
//!
//! - **apply**: state bucket, render, stage, install tool, init, plan, apply,
//!   then remove the workspace. On any error the workspace is dropped and
//!   removed with it.
//! - **destroy**: render, stage, install tool, init, destroy. The workspace
//!   is retained whatever happens and its path is logged.

use crate::aws::{BucketStore, ensure_state_bucket};
use crate::config::DeployConfig;
use crate::error::Result;
use crate::process::OutputSink;
use crate::render::{ArtifactBundle, Renderer};
use crate::stage::stage;
use crate::terraform::TerraformClient;
use crate::tool::ToolProvisioner;
use crate::workspace::Workspace;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

/// Runs the apply and destroy flows for one configuration
pub struct Deployer {
    config: DeployConfig,
    sink: Arc<dyn OutputSink>,
    workspace_parent: Option<PathBuf>,
}

impl Deployer {
    pub fn new(config: DeployConfig, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            config,
            sink,
            workspace_parent: None,
        }
    }

    /// Create workspaces under `parent` instead of the system temp dir
    pub fn with_workspace_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.workspace_parent = Some(parent.into());
        self
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Create or update the infrastructure.
    ///
    /// Returns the workspace path if it was kept (`keep_workspace`).
    #[instrument(skip_all, fields(name = %self.config.run.name, region = %self.config.run.region))]
    pub async fn apply<S: BucketStore>(&self, buckets: &S) -> Result<Option<PathBuf>> {
        let run = &self.config.run;
        self.config.validate()?;

        ensure_state_bucket(buckets, run).await?;

        let bundle = Renderer::new()?.render_bundle(run)?;

        let mut workspace = self.create_workspace()?;
        let keep = self.config.flags.keep_workspace;
        if keep {
            workspace.retain();
        }

        let mut client = self.prepare(workspace, &bundle).await?;
        client.initialize().await?;
        client.apply().await?;

        if keep {
            let path = client.workspace().root().to_path_buf();
            info!(workspace = %path.display(), "Apply complete, workspace kept");
            return Ok(Some(path));
        }

        client.cleanup()?;
        info!("Apply complete");
        Ok(None)
    }

    /// Tear the infrastructure down.
    ///
    /// The workspace is never removed on this path; its location is returned
    /// and logged so the state can be inspected.
    #[instrument(skip_all, fields(name = %self.config.run.name, region = %self.config.run.region))]
    pub async fn destroy(&self) -> Result<PathBuf> {
        let run = &self.config.run;
        self.config.validate()?;

        let bundle = Renderer::new()?.render_bundle(run)?;

        let mut workspace = self.create_workspace()?;
        workspace.retain();
        let path = workspace.root().to_path_buf();
        info!(workspace = %path.display(), "Destroy workspace retained");

        let mut client = self.prepare(workspace, &bundle).await?;
        client.initialize().await?;
        client.destroy().await?;

        info!(workspace = %path.display(), "Destroy complete");
        Ok(path)
    }

    /// Stage artifacts and install the tool, handing back a fresh session
    async fn prepare(
        &self,
        workspace: Workspace,
        bundle: &ArtifactBundle,
    ) -> Result<TerraformClient> {
        stage(&workspace, bundle).await?;
        let binary = ToolProvisioner::new(self.config.tool.clone())
            .ensure(&workspace)
            .await?;
        Ok(TerraformClient::new(
            workspace,
            binary,
            Arc::clone(&self.sink),
        ))
    }

    fn create_workspace(&self) -> Result<Workspace> {
        match &self.workspace_parent {
            Some(parent) => Workspace::create_in(parent),
            None => Workspace::create(),
        }
    }
}
