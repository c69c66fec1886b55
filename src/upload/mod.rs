//! Cloud upload sink: pushes produced export files to Google Drive.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Credential bundle with a pre-issued OAuth bearer token for the Drive API.
#[derive(Debug, Deserialize)]
struct CredentialBundle {
    access_token: String,
}

pub struct DriveUploader {
    client: reqwest::Client,
    access_token: String,
    folder_id: Option<String>,
}

impl DriveUploader {
    pub fn from_credentials_file(path: &Path, folder_id: Option<String>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read credentials file {path:?}"))?;
        let bundle: CredentialBundle =
            serde_json::from_str(&raw).context("Malformed credentials file")?;

        Ok(Self {
            client: reqwest::Client::new(),
            access_token: bundle.access_token,
            folder_id,
        })
    }

    /// Upload each file in turn. A failed upload is logged and skipped; the
    /// scrape run already finished and the remaining artifacts still go out.
    pub async fn upload_all(&self, files: &[PathBuf]) -> usize {
        let mut uploaded = 0usize;
        for path in files {
            match self.upload_file(path).await {
                Ok(file_id) => {
                    info!(file = %path.display(), file_id, "Uploaded to Drive");
                    uploaded += 1;
                }
                Err(e) => warn!(file = %path.display(), "Upload failed: {e:#}"),
            }
        }
        uploaded
    }

    /// Resumable upload: initiate for an upload URL, then send the bytes.
    async fn upload_file(&self, path: &Path) -> Result<String> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Could not read {path:?}"))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("export.csv");
        let mime = mime_for(name);

        let mut metadata = serde_json::json!({ "name": name });
        if let Some(folder) = &self.folder_id {
            metadata["parents"] = serde_json::json!([folder]);
        }

        let init = self
            .client
            .post("https://www.googleapis.com/upload/drive/v3/files?uploadType=resumable")
            .bearer_auth(&self.access_token)
            .header("X-Upload-Content-Type", mime)
            .header("X-Upload-Content-Length", data.len().to_string())
            .json(&metadata)
            .send()
            .await
            .context("Drive upload initiation failed")?;

        let upload_url = init
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .context("No Location header in Drive response")?
            .to_string();

        let resp = self
            .client
            .put(&upload_url)
            .bearer_auth(&self.access_token)
            .header("Content-Type", mime)
            .body(data)
            .send()
            .await
            .context("Drive upload failed")?;

        if !resp.status().is_success() {
            let msg = resp.text().await.unwrap_or_default();
            anyhow::bail!("Drive rejected upload: {msg}");
        }

        let json: serde_json::Value = resp.json().await.context("Malformed Drive response")?;
        json["id"]
            .as_str()
            .map(str::to_string)
            .context("No file id in Drive response")
    }
}

fn mime_for(filename: &str) -> &'static str {
    if filename.to_lowercase().ends_with(".csv") {
        "text/csv"
    } else {
        "application/octet-stream"
    }
}
