//! Writing rendered artifacts into the workspace
//!
//! Layout after staging:
//!
//! ```text
//! <workspace>/
//!   config/main.tf
//!   chos.sh
//!   lambda_spot_function.py
//!   lambda_spot.zip
//! ```
//!
//! The infra config refers to its siblings as `${path.module}/../<file>`;
//! [`verify_complete`] checks every such reference resolves before the
//! provisioning tool is allowed to run.

use crate::error::{DeployError, Result};
use crate::render::{ArtifactBundle, RenderedArtifact};
use crate::workspace::Workspace;
use chos_common::defaults::{CONFIG_DIR, LAMBDA_SPOT_FUNCTION_FILENAME, LAMBDA_SPOT_ZIP_FILENAME};
use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Mode for staged files
const FILE_MODE: u32 = 0o644;

/// Mode for the config directory
const DIR_MODE: u32 = 0o755;

/// How the infra config addresses files staged at the workspace root
const MODULE_PARENT_REF: &str = "${path.module}/../";

/// Absolute paths of everything [`stage`] wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPaths {
    pub infra_config: PathBuf,
    pub build_script: PathBuf,
    pub spot_function: PathBuf,
    pub spot_archive: PathBuf,
}

/// Write the bundle into `workspace` and package the spot function.
#[tracing::instrument(skip_all, fields(workspace = %workspace.root().display()))]
pub async fn stage(workspace: &Workspace, bundle: &ArtifactBundle) -> Result<StagedPaths> {
    let config_dir = workspace.path(CONFIG_DIR);
    tokio::fs::create_dir_all(&config_dir).await.map_err(|e| {
        DeployError::io(format!("Failed to create {}", config_dir.display()), e)
    })?;
    set_mode(&config_dir, DIR_MODE).await?;

    let infra_config = write_artifact(workspace, &bundle.infra_config).await?;
    let build_script = write_artifact(workspace, &bundle.build_script).await?;
    let spot_function = write_artifact(workspace, &bundle.spot_function).await?;

    let archive = package_single_entry(LAMBDA_SPOT_FUNCTION_FILENAME, &bundle.spot_function.bytes)?;
    let spot_archive = workspace.path(LAMBDA_SPOT_ZIP_FILENAME);
    write_file(&spot_archive, &archive).await?;

    verify_complete(workspace, bundle.infra_config.as_str())?;

    info!(files = 4, "Staged artifacts");

    Ok(StagedPaths {
        infra_config,
        build_script,
        spot_function,
        spot_archive,
    })
}

/// Build a standalone zip archive holding exactly one deflated entry
pub fn package_single_entry(entry_name: &str, bytes: &[u8]) -> Result<Vec<u8>> {
    let zip_err = |e: zip::result::ZipError| {
        DeployError::io(
            format!("Failed to package {entry_name}"),
            std::io::Error::other(e),
        )
    };

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(FILE_MODE);
    zip.start_file(entry_name, options).map_err(zip_err)?;
    zip.write_all(bytes)
        .map_err(|e| DeployError::io(format!("Failed to package {entry_name}"), e))?;
    let cursor = zip.finish().map_err(zip_err)?;

    Ok(cursor.into_inner())
}

/// Workspace-relative files the infra config expects next to `config/`
pub fn referenced_artifacts(infra_config: &str) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    let mut rest = infra_config;
    while let Some(start) = rest.find(MODULE_PARENT_REF) {
        rest = &rest[start + MODULE_PARENT_REF.len()..];
        let end = rest
            .find(|c: char| c == '"' || c == ')' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..end];
        if !name.is_empty() {
            found.insert(PathBuf::from(name));
        }
        rest = &rest[end..];
    }
    found.into_iter().collect()
}

/// Fail with `MissingArtifact` if anything the infra config references is absent
pub fn verify_complete(workspace: &Workspace, infra_config: &str) -> Result<()> {
    for relative in referenced_artifacts(infra_config) {
        let path = workspace.path(&relative);
        if !path.is_file() {
            return Err(DeployError::MissingArtifact { path });
        }
        debug!(path = %relative.display(), "Referenced artifact present");
    }
    Ok(())
}

async fn write_artifact(workspace: &Workspace, artifact: &RenderedArtifact) -> Result<PathBuf> {
    let path = workspace.path(artifact.target_path);
    write_file(&path, &artifact.bytes).await?;
    Ok(path)
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| DeployError::io(format!("Failed to write {}", path.display()), e))?;
    set_mode(path, FILE_MODE).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote artifact");
    Ok(())
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| DeployError::io(format!("Failed to set mode on {}", path.display()), e))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Renderer;
    use chos_common::{Device, RunConfig};
    use std::io::Read;

    fn bundle() -> ArtifactBundle {
        Renderer::new()
            .unwrap()
            .render_bundle(&RunConfig::new("stagetest", "us-east-1", Device::Marlin))
            .unwrap()
    }

    #[tokio::test]
    async fn test_stage_writes_full_layout() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create_in(parent.path()).unwrap();
        let bundle = bundle();

        let staged = stage(&workspace, &bundle).await.unwrap();

        assert_eq!(staged.infra_config, workspace.path("config/main.tf"));
        assert_eq!(staged.build_script, workspace.path("chos.sh"));
        assert_eq!(staged.spot_function, workspace.path("lambda_spot_function.py"));
        assert_eq!(staged.spot_archive, workspace.path("lambda_spot.zip"));

        assert_eq!(
            std::fs::read(&staged.build_script).unwrap(),
            bundle.build_script.bytes
        );
        assert_eq!(
            std::fs::read(&staged.infra_config).unwrap(),
            bundle.infra_config.bytes
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stage_sets_modes() {
        use std::os::unix::fs::PermissionsExt;

        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create_in(parent.path()).unwrap();
        let staged = stage(&workspace, &bundle()).await.unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&workspace.path("config")), 0o755);
        assert_eq!(mode(&staged.build_script), 0o644);
        assert_eq!(mode(&staged.spot_archive), 0o644);
    }

    #[tokio::test]
    async fn test_spot_archive_round_trips() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create_in(parent.path()).unwrap();
        let bundle = bundle();
        let staged = stage(&workspace, &bundle).await.unwrap();

        let file = std::fs::File::open(&staged.spot_archive).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 1);

        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "lambda_spot_function.py");
        assert_eq!(entry.compression(), CompressionMethod::Deflated);

        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, bundle.spot_function.bytes);
    }

    #[test]
    fn test_referenced_artifacts_from_infra_config() {
        let refs = referenced_artifacts(bundle().infra_config.as_str());
        assert_eq!(
            refs,
            vec![PathBuf::from("chos.sh"), PathBuf::from("lambda_spot.zip")]
        );
    }

    #[test]
    fn test_referenced_artifacts_ignores_other_interpolations() {
        let config = r#"
            bucket = "${aws_s3_bucket.script.id}"
            source = "${path.module}/../a.txt"
            hash   = "${md5(file("${path.module}/../a.txt"))}"
            other  = "${path.module}/local.txt"
        "#;
        assert_eq!(referenced_artifacts(config), vec![PathBuf::from("a.txt")]);
    }

    #[tokio::test]
    async fn test_verify_complete_reports_missing_file() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create_in(parent.path()).unwrap();
        let bundle = bundle();
        stage(&workspace, &bundle).await.unwrap();

        std::fs::remove_file(workspace.path("lambda_spot.zip")).unwrap();

        let err = verify_complete(&workspace, bundle.infra_config.as_str()).unwrap_err();
        match err {
            DeployError::MissingArtifact { path } => {
                assert_eq!(path, workspace.path("lambda_spot.zip"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
