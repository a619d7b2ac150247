use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::types::Permission;

const GIT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitService {
    UploadPack,
    ReceivePack,
}

impl GitService {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "git-upload-pack" => Some(Self::UploadPack),
            "git-receive-pack" => Some(Self::ReceivePack),
            _ => None,
        }
    }

    pub fn command_name(self) -> &'static str {
        match self {
            Self::UploadPack => "git-upload-pack",
            Self::ReceivePack => "git-receive-pack",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::UploadPack => "application/x-git-upload-pack-result",
            Self::ReceivePack => "application/x-git-receive-pack-result",
        }
    }

    pub fn advertisement_content_type(self) -> &'static str {
        match self {
            Self::UploadPack => "application/x-git-upload-pack-advertisement",
            Self::ReceivePack => "application/x-git-receive-pack-advertisement",
        }
    }

    /// The repository permission the service requires.
    pub fn required_permission(self) -> Permission {
        match self {
            Self::UploadPack => Permission::RepoView,
            Self::ReceivePack => Permission::RepoPush,
        }
    }
}

pub async fn run_git_command(
    repo_path: &Path,
    service: GitService,
    advertise_refs: bool,
    input: Option<&[u8]>,
) -> Result<Output> {
    let mut cmd = Command::new(service.command_name());
    cmd.arg("--stateless-rpc");

    if advertise_refs {
        cmd.arg("--advertise-refs");
    }

    cmd.arg(repo_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        if let Some(data) = input {
            stdin.write_all(data).await?;
        }
    }

    let output = tokio::time::timeout(GIT_COMMAND_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("{} timed out", service.command_name()),
            ))
        })??;

    Ok(output)
}

/// Creates the on-disk bare repository if it does not exist yet.
pub async fn ensure_bare_repo(repo_path: &Path) -> Result<()> {
    if fs::try_exists(repo_path).await? {
        return Ok(());
    }

    if let Some(parent) = repo_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let output = Command::new("git")
        .args(["init", "--bare", "--quiet"])
        .arg(repo_path)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Io(std::io::Error::other(format!(
            "git init failed: {stderr}"
        ))));
    }

    fs::write(repo_path.join("HEAD"), "ref: refs/heads/main\n").await?;

    tracing::info!(path = %repo_path.display(), "initialized bare repository");
    Ok(())
}

pub fn format_pkt_line_header(service: GitService) -> Vec<u8> {
    let service_line = format!("# service={}\n", service.command_name());
    let length = service_line.len() + 4;
    let mut result = format!("{length:04x}{service_line}").into_bytes();
    result.extend_from_slice(b"0000");
    result
}

/// Repositories are stored by id, so renames and moves never touch the disk.
#[must_use]
pub fn repo_path(data_dir: &Path, repo_id: i64) -> PathBuf {
    data_dir.join("repos").join(format!("{repo_id}.git"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_service_parse() {
        assert_eq!(
            GitService::parse("git-upload-pack"),
            Some(GitService::UploadPack)
        );
        assert_eq!(
            GitService::parse("git-receive-pack"),
            Some(GitService::ReceivePack)
        );
        assert_eq!(GitService::parse("invalid"), None);
    }

    #[test]
    fn test_required_permission() {
        assert_eq!(
            GitService::UploadPack.required_permission(),
            Permission::RepoView
        );
        assert_eq!(
            GitService::ReceivePack.required_permission(),
            Permission::RepoPush
        );
    }

    #[test]
    fn test_format_pkt_line_header() {
        let header = format_pkt_line_header(GitService::UploadPack);
        let header_str = String::from_utf8_lossy(&header);
        assert!(header_str.starts_with("001e# service=git-upload-pack\n"));
        assert!(header_str.ends_with("0000"));
    }

    #[test]
    fn test_repo_path() {
        let path = repo_path(Path::new("/data"), 42);
        assert_eq!(path, Path::new("/data/repos/42.git"));
    }
}
