//! Thin wrappers around the `git` binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{error, info};

use crate::cmd;
use crate::error::{Error, Result};

fn git() -> Result<PathBuf> {
    which::which("git").map_err(|_| Error::MissingPrerequisite("git not found in PATH".into()))
}

/// Clone `url` at `branch` into `target`, or fetch and check out `branch` when a checkout
/// of the same remote is already there.
pub fn clone_or_update(url: &str, branch: &str, target: &Path) -> Result<()> {
    let git = git()?;
    if target.join(".git").is_dir() {
        let origin = cmd::query(
            Command::new(&git)
                .arg("-C")
                .arg(target)
                .args(["remote", "get-url", "origin"]),
        );
        if origin.as_deref() == Some(url) {
            info!("Updating repository {} ...", target.display());
            cmd::run(Command::new(&git).arg("-C").arg(target).args(["fetch", "origin"]))?;
            cmd::run(Command::new(&git).arg("-C").arg(target).args(["checkout", branch]))?;
            return pull(target);
        }
        return Err(Error::Unsupported(format!(
            "{} already holds a checkout of {}",
            target.display(),
            origin.unwrap_or_else(|| "an unknown remote".to_string())
        )));
    }

    info!("Cloning {url} ({branch}) ...");
    cmd::run(
        Command::new(&git)
            .args(["clone", "--branch", branch, url])
            .arg(target),
    )
    .inspect_err(|e| error!("Error cloning repository {url}: {e}"))?;
    info!("Clone successful!");
    Ok(())
}

pub fn pull(target: &Path) -> Result<()> {
    let git = git()?;
    info!("Updating repository {} ...", target.display());
    cmd::run(Command::new(git).arg("-C").arg(target).args(["pull", "--ff-only"]))
        .inspect_err(|e| error!("Error updating repository: {e}"))?;
    info!("Repository updated!");
    Ok(())
}

/// `owner/repo` of the origin remote, `-` when unknown.
pub fn repo_name(target: &Path) -> String {
    let Ok(git) = git() else {
        return "-".to_string();
    };
    cmd::query(
        Command::new(git)
            .arg("-C")
            .arg(target)
            .args(["config", "--get", "remote.origin.url"]),
    )
    .map(|url| owner_repo(&url))
    .unwrap_or_else(|| "-".to_string())
}

/// Short hash of `HEAD`, `-` when unknown.
pub fn local_commit(target: &Path) -> String {
    short_hash(target, "HEAD")
}

/// Short hash of the upstream branch after a fetch, `-` when unknown.
pub fn remote_commit(target: &Path) -> String {
    if let Ok(git) = git() {
        let _ = cmd::query(Command::new(git).arg("-C").arg(target).args(["fetch", "-q"]));
    }
    short_hash(target, "@{u}")
}

fn short_hash(target: &Path, rev: &str) -> String {
    if !target.join(".git").exists() {
        return "-".to_string();
    }
    let Ok(git) = git() else {
        return "-".to_string();
    };
    cmd::query(Command::new(git).arg("-C").arg(target).args(["rev-parse", "--short=8", rev]))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "-".to_string())
}

fn owner_repo(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/').trim_end_matches(".git");
    let mut parts = trimmed.rsplit(['/', ':']);
    match (parts.next(), parts.next()) {
        (Some(repo), Some(owner)) if !repo.is_empty() && !owner.is_empty() => {
            format!("{owner}/{repo}")
        }
        _ => "-".to_string(),
    }
}
