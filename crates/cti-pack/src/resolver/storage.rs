use std::{path::Path, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Where a `(source, version)` pair actually lives: the VCS kind, repo
/// URL, pinned commit, and the ref that was asked for. Field names match
/// the on-disk `.info` records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
  #[serde(rename = "VCS")]
  pub vcs: String,
  #[serde(rename = "URL")]
  pub url: String,
  #[serde(rename = "Hash")]
  pub hash: String,
  #[serde(rename = "Ref")]
  pub ref_: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
  #[error("discovering '{src}': {reason}")]
  DiscoveryFailed { src: String, reason: String },

  #[error("downloading from '{url}': {reason}")]
  DownloadFailed { url: String, reason: String },

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

/// Pluggable transport resolving sources to origins and origins to trees.
///
/// Alternative backends (OCI, HTTP tarballs) implement this trait without
/// the resolver changing.
#[allow(async_fn_in_trait)]
pub trait Storage {
  async fn discover(&self, source: &str, version: &str) -> Result<Origin, StorageError>;
  async fn download(&self, origin: &Origin, dest: &Path) -> Result<(), StorageError>;
}

static GO_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"<meta\s+name="go-import"\s+content="([^\s"]+)\s+([^\s"]+)\s+([^\s"]+)""#).expect("static regex compiles")
});

/// The default backend: `go-import` meta-tag discovery plus git.
#[derive(Debug, Default)]
pub struct GitStorage {
  client: reqwest::Client,
}

impl GitStorage {
  pub fn new() -> Self {
    Self::default()
  }

  async fn resolve_repo_url(&self, source: &str) -> Result<(String, String), StorageError> {
    let page_url = format!("https://{source}?go-get=1");
    let failed = |reason: String| StorageError::DiscoveryFailed {
      src: source.to_string(),
      reason,
    };

    let body = self
      .client
      .get(&page_url)
      .send()
      .await
      .map_err(|err| failed(err.to_string()))?
      .text()
      .await
      .map_err(|err| failed(err.to_string()))?;

    for captures in GO_IMPORT_RE.captures_iter(&body) {
      let (prefix, vcs, repo) = (&captures[1], &captures[2], &captures[3]);
      if source == prefix || source.starts_with(&format!("{prefix}/")) {
        url::Url::parse(repo).map_err(|err| failed(format!("malformed repo url '{repo}': {err}")))?;
        return Ok((vcs.to_string(), repo.to_string()));
      }
    }
    Err(failed("no matching go-import meta tag".to_string()))
  }

  async fn ls_remote(&self, repo: &str, version: &str) -> Result<String, StorageError> {
    let output = Command::new("git")
      .args(["ls-remote", repo, version])
      .output()
      .await?;
    if !output.status.success() {
      return Err(StorageError::DiscoveryFailed {
        src: repo.to_string(),
        reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
      .lines()
      .filter_map(|line| line.split_whitespace().next())
      .next()
      .map(ToString::to_string)
      .ok_or_else(|| StorageError::DiscoveryFailed {
        src: repo.to_string(),
        reason: format!("no ref matching '{version}'"),
      })
  }
}

impl Storage for GitStorage {
  async fn discover(&self, source: &str, version: &str) -> Result<Origin, StorageError> {
    let (vcs, url) = self.resolve_repo_url(source).await?;
    if vcs != "git" {
      return Err(StorageError::DiscoveryFailed {
        src: source.to_string(),
        reason: format!("unsupported vcs '{vcs}'"),
      });
    }
    let hash = self.ls_remote(&url, version).await?;
    Ok(Origin {
      vcs,
      url,
      hash,
      ref_: version.to_string(),
    })
  }

  async fn download(&self, origin: &Origin, dest: &Path) -> Result<(), StorageError> {
    std::fs::create_dir_all(dest)?;
    run_git(dest, &origin.url, &["init", "--quiet"]).await?;
    run_git(dest, &origin.url, &["remote", "add", "origin", &origin.url]).await?;
    run_git(dest, &origin.url, &["fetch", "--quiet", "--depth", "1", "origin", &origin.hash]).await?;
    run_git(dest, &origin.url, &["checkout", "--quiet", "FETCH_HEAD"]).await?;

    let git_dir = dest.join(".git");
    if git_dir.exists() {
      std::fs::remove_dir_all(git_dir)?;
    }
    Ok(())
  }
}

async fn run_git(dest: &Path, url: &str, args: &[&str]) -> Result<(), StorageError> {
  let output = Command::new("git").args(args).current_dir(dest).output().await?;
  if output.status.success() {
    Ok(())
  } else {
    Err(StorageError::DownloadFailed {
      url: url.to_string(),
      reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
  }
}
