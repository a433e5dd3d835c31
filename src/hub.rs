//! Snapshot downloads from the dataset hub
//!
//! A snapshot is pinned to the commit sha the requested revision resolves to.
//! Every file of that commit is fetched into a local directory, and a small
//! manifest records what was fetched so that later runs can skip the hub.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::DatasetConfig;

/// Manifest written into the snapshot directory once it is complete
pub const MANIFEST_FILE: &str = ".snapshot.json";

/// Kind of hub repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    Dataset,
    Model,
}

impl RepoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoType::Dataset => "dataset",
            RepoType::Model => "model",
        }
    }

    /// Path segment of the repository API route
    fn api_segment(&self) -> &'static str {
        match self {
            RepoType::Dataset => "datasets",
            RepoType::Model => "models",
        }
    }

    /// Prefix of file download routes; models live at the hub root
    fn resolve_prefix(&self) -> &'static str {
        match self {
            RepoType::Dataset => "datasets/",
            RepoType::Model => "",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Hub request to {url} failed with status {status}")]
    Status { url: String, status: reqwest::StatusCode },

    #[error("Refusing to write {0}: path escapes the snapshot directory")]
    UnsafePath(String),
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    sha: String,
    #[serde(default)]
    siblings: Vec<RepoSibling>,
}

#[derive(Debug, Deserialize)]
struct RepoSibling {
    rfilename: String,
}

/// Record of a completed snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotManifest {
    pub repo_id: String,
    pub repo_type: RepoType,
    pub revision: String,
    pub sha: String,
    pub files: Vec<String>,
    pub downloaded_at: DateTime<Utc>,
}

impl SnapshotManifest {
    /// Read the manifest of a snapshot directory, if any
    pub async fn read(local_dir: &Path) -> Option<Self> {
        let content = tokio::fs::read_to_string(local_dir.join(MANIFEST_FILE)).await.ok()?;
        serde_json::from_str(&content).ok()
    }

    fn matches(&self, repo_id: &str, repo_type: RepoType, revision: &str) -> bool {
        self.repo_id == repo_id && self.repo_type == repo_type && self.revision == revision
    }

    fn is_complete(&self, local_dir: &Path) -> bool {
        self.files.iter().all(|file| local_dir.join(file).is_file())
    }
}

/// Outcome of a snapshot request
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub local_dir: PathBuf,
    pub sha: String,
    pub files: Vec<String>,

    /// Files fetched by this call; 0 when everything was already present
    pub downloaded: usize,
}

/// Downloads repository snapshots from the hub
pub struct SnapshotDownloader {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    max_concurrent: usize,
}

impl SnapshotDownloader {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("action100m-loader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: None,
            max_concurrent: 4,
        })
    }

    /// Downloader for the configured hub, with the token read from the environment
    pub fn from_config(config: &DatasetConfig) -> Result<Self> {
        Ok(Self::new(config.endpoint.clone())?
            .with_token(token_from_env())
            .with_max_concurrent(config.max_concurrent_downloads))
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Materialize `repo_id` at `revision` into `local_dir`.
    ///
    /// Returns without touching the network when a complete snapshot of the
    /// same revision is already present.
    pub async fn download(
        &self,
        repo_id: &str,
        repo_type: RepoType,
        revision: &str,
        local_dir: &Path,
    ) -> Result<Snapshot> {
        if let Some(manifest) = SnapshotManifest::read(local_dir).await {
            if manifest.matches(repo_id, repo_type, revision) && manifest.is_complete(local_dir) {
                info!(
                    "📦 Snapshot of {} already present in {} ({} files)",
                    repo_id,
                    local_dir.display(),
                    manifest.files.len()
                );
                return Ok(Snapshot {
                    local_dir: local_dir.to_path_buf(),
                    sha: manifest.sha,
                    files: manifest.files,
                    downloaded: 0,
                });
            }
        }

        let repo = self.repo_info(repo_id, repo_type, revision).await?;
        let files: Vec<String> = repo.siblings.into_iter().map(|s| s.rfilename).collect();
        for file in &files {
            ensure_relative(file)?;
        }

        tokio::fs::create_dir_all(local_dir)
            .await
            .with_context(|| format!("Failed to create {}", local_dir.display()))?;

        let missing: Vec<&String> = files.iter().filter(|f| !local_dir.join(f).is_file()).collect();
        info!(
            "⬇️  Fetching {} of {} files of {}@{}",
            missing.len(),
            files.len(),
            repo_id,
            &repo.sha
        );

        let downloaded = futures::stream::iter(missing)
            .map(|file| self.download_file(repo_id, repo_type, &repo.sha, file, local_dir))
            .buffer_unordered(self.max_concurrent)
            .try_fold(0usize, |count, _| async move { Ok::<_, anyhow::Error>(count + 1) })
            .await?;

        let manifest = SnapshotManifest {
            repo_id: repo_id.to_string(),
            repo_type,
            revision: revision.to_string(),
            sha: repo.sha.clone(),
            files: files.clone(),
            downloaded_at: Utc::now(),
        };
        tokio::fs::write(local_dir.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?).await?;

        info!("✅ Snapshot ready in {} ({} downloaded)", local_dir.display(), downloaded);

        Ok(Snapshot {
            local_dir: local_dir.to_path_buf(),
            sha: repo.sha,
            files,
            downloaded,
        })
    }

    async fn repo_info(&self, repo_id: &str, repo_type: RepoType, revision: &str) -> Result<RepoInfo> {
        let url = format!(
            "{}/api/{}/{}/revision/{}",
            self.endpoint,
            repo_type.api_segment(),
            repo_id,
            urlencoding::encode(revision)
        );
        debug!("Resolving revision via {}", url);

        let response = self.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(HubError::Status { url, status: response.status() }.into());
        }

        Ok(response.json().await?)
    }

    async fn download_file(
        &self,
        repo_id: &str,
        repo_type: RepoType,
        sha: &str,
        file: &str,
        local_dir: &Path,
    ) -> Result<()> {
        let encoded: Vec<String> = file.split('/').map(|s| urlencoding::encode(s).into_owned()).collect();
        let url = format!(
            "{}/{}{}/resolve/{}/{}",
            self.endpoint,
            repo_type.resolve_prefix(),
            repo_id,
            sha,
            encoded.join("/")
        );

        let response = self.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(HubError::Status { url, status: response.status() }.into());
        }

        let target = local_dir.join(file);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = target.with_file_name(format!(
            "{}.incomplete",
            target.file_name().and_then(|n| n.to_str()).unwrap_or("download")
        ));

        let mut out = tokio::fs::File::create(&partial)
            .await
            .with_context(|| format!("Failed to create {}", partial.display()))?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            out.write_all(&chunk).await?;
        }
        out.flush().await?;
        drop(out);

        tokio::fs::rename(&partial, &target).await?;
        debug!("Downloaded {} ({} bytes)", file, written);
        Ok(())
    }
}

/// Hub token from the environment, if one is set
pub fn token_from_env() -> Option<String> {
    ["HF_TOKEN", "HUGGING_FACE_HUB_TOKEN"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|token| !token.trim().is_empty())
}

/// Fetch the configured snapshot, or use the local directory as-is when offline
pub async fn ensure_snapshot(config: &DatasetConfig) -> Result<PathBuf> {
    if config.offline {
        info!("📴 Offline: using {} as-is", config.local_dir.display());
        return Ok(config.local_dir.clone());
    }

    let downloader = SnapshotDownloader::from_config(config)?;
    let snapshot = downloader
        .download(&config.repo_id, config.repo_type, &config.revision, &config.local_dir)
        .await?;
    Ok(snapshot.local_dir)
}

fn ensure_relative(file: &str) -> Result<()> {
    let path = Path::new(file);
    if file.is_empty() || !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(HubError::UnsafePath(file.to_string()).into());
    }
    Ok(())
}
