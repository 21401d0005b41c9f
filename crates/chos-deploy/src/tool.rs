//! Provisioning tool installation
//!
//! The `terraform` executable lives inside the workspace, never on `PATH`,
//! so each run drives exactly the pinned release it downloaded (or the local
//! binary it was pointed at).

use crate::error::{DeployError, Result};
use crate::workspace::Workspace;
use chos_common::defaults::TERRAFORM_ARCHIVE_FILENAME;
use chos_common::{Platform, ToolRelease};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Mode for the installed executable
#[cfg(unix)]
const EXECUTABLE_MODE: u32 = 0o700;

/// Where the provisioning tool comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSource {
    /// Fetch the release archive for the host platform
    Download(ToolRelease),
    /// Copy a pre-installed executable into the workspace
    Local(PathBuf),
}

impl Default for ToolSource {
    fn default() -> Self {
        ToolSource::Download(ToolRelease::default())
    }
}

/// Ensures the provisioning tool is present and executable in a workspace
#[derive(Debug, Clone, Default)]
pub struct ToolProvisioner {
    source: ToolSource,
}

impl ToolProvisioner {
    pub fn new(source: ToolSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &ToolSource {
        &self.source
    }

    /// Install the tool for the host OS, returning the executable path
    pub async fn ensure(&self, workspace: &Workspace) -> Result<PathBuf> {
        self.ensure_for_os(std::env::consts::OS, workspace).await
    }

    /// Install the tool for an explicit OS name.
    ///
    /// Unsupported OS names fail before anything is fetched or copied. An
    /// executable already present in the workspace is reused.
    pub async fn ensure_for_os(&self, os: &str, workspace: &Workspace) -> Result<PathBuf> {
        let platform = Platform::from_os(os)
            .map_err(|e| DeployError::UnsupportedPlatform { os: e.0 })?;
        let binary = workspace.path(platform.binary_name());

        if binary.is_file() {
            debug!(path = %binary.display(), "Reusing installed terraform");
        } else {
            match &self.source {
                ToolSource::Download(release) => {
                    download_and_extract(release, platform, workspace).await?;
                }
                ToolSource::Local(path) => {
                    info!(from = %path.display(), "Copying local terraform");
                    tokio::fs::copy(path, &binary).await.map_err(|e| {
                        DeployError::io(format!("Failed to copy {}", path.display()), e)
                    })?;
                }
            }
        }

        if !binary.is_file() {
            return Err(DeployError::MissingArtifact { path: binary });
        }
        make_executable(&binary).await?;

        Ok(binary)
    }
}

async fn download_and_extract(
    release: &ToolRelease,
    platform: Platform,
    workspace: &Workspace,
) -> Result<()> {
    let url = release.archive_url(platform);
    let archive = workspace.path(TERRAFORM_ARCHIVE_FILENAME);

    download(&url, &archive).await?;

    let root = workspace.root().to_path_buf();
    let archive_path = archive.clone();
    let extracted = tokio::task::spawn_blocking(move || extract_archive(&archive_path, &root))
        .await
        .map_err(|e| DeployError::io("Extraction task failed", std::io::Error::other(e)))??;

    debug!(entries = extracted.len(), "Extracted terraform archive");

    tokio::fs::remove_file(&archive)
        .await
        .map_err(|e| DeployError::io(format!("Failed to remove {}", archive.display()), e))?;

    Ok(())
}

/// Stream `url` into `dest`. Non-success statuses are network errors.
async fn download(url: &str, dest: &Path) -> Result<()> {
    info!(url = %url, "Downloading terraform");

    let network = |source| DeployError::Network {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::builder().build().map_err(network)?;
    let mut response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(network)?;

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| DeployError::io(format!("Failed to create {}", dest.display()), e))?;

    let mut written = 0usize;
    while let Some(chunk) = response.chunk().await.map_err(network)? {
        file.write_all(&chunk)
            .await
            .map_err(|e| DeployError::io(format!("Failed to write {}", dest.display()), e))?;
        written += chunk.len();
    }
    file.flush()
        .await
        .map_err(|e| DeployError::io(format!("Failed to write {}", dest.display()), e))?;

    debug!(bytes = written, path = %dest.display(), "Download complete");
    Ok(())
}

/// Extract every entry of `archive` under `dest`, keeping directory structure.
///
/// Entries whose names are absolute or climb out of `dest` are rejected
/// before anything from them is written.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let zip_err = |e: zip::result::ZipError| {
        DeployError::io(
            format!("Failed to read archive {}", archive.display()),
            std::io::Error::other(e),
        )
    };

    let file = std::fs::File::open(archive)
        .map_err(|e| DeployError::io(format!("Failed to open {}", archive.display()), e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(zip_err)?;

    let mut written = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(zip_err)?;
        let name = entry.name().to_string();
        let relative = sanitize_entry_name(&name)
            .ok_or_else(|| DeployError::UnsafeArchiveEntry { name: name.clone() })?;
        let target = dest.join(&relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| DeployError::io(format!("Failed to create {}", target.display()), e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DeployError::io(format!("Failed to create {}", parent.display()), e))?;
        }
        let mut out = std::fs::File::create(&target)
            .map_err(|e| DeployError::io(format!("Failed to create {}", target.display()), e))?;
        std::io::copy(&mut entry, &mut out)
            .map_err(|e| DeployError::io(format!("Failed to extract {name}"), e))?;

        written.push(target);
    }

    Ok(written)
}

/// Relative path for an archive entry, or `None` if it would escape the root
fn sanitize_entry_name(name: &str) -> Option<PathBuf> {
    if name.contains('\0') {
        return None;
    }

    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    (!relative.as_os_str().is_empty()).then_some(relative)
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(EXECUTABLE_MODE))
        .await
        .map_err(|e| DeployError::io(format!("Failed to set mode on {}", path.display()), e))
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
