// ============================================================
// Layer 6 — Model Hub Client
// ============================================================
// Creates a model repository and uploads files to it over the
// hub's REST API (blocking reqwest):
//
//   GET  /api/whoami-v2                              → user name
//   POST /api/repos/create                           → 409 = exists
//   PUT  /api/models/<repo>/upload/main/<path>       → one file
//
// Ids without an owner ("my-model") are placed under the
// token's user namespace.

use std::path::Path;

const HUB_ENDPOINT: &str = "https://huggingface.co";

/// Errors while talking to the hub
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Invalid repository ID '{repo_id}': expected 'owner/name' or 'name'")]
    InvalidRepoId { repo_id: String },

    #[error("Failed to create repository '{repo_id}': {message}")]
    RepoCreationFailed { repo_id: String, message: String },

    #[error("Failed to upload '{path}': {message}")]
    UploadFailed { path: String, message: String },

    #[error("Cannot resolve the user for this token: {message}")]
    WhoAmI { message: String },

    #[error("HTTP error: {message}")]
    Http { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Split "owner/name" or "name"; anything else is rejected.
pub fn split_repo_id(repo_id: &str) -> Result<(Option<&str>, &str), HubError> {
    let invalid = || HubError::InvalidRepoId { repo_id: repo_id.to_string() };
    match repo_id.split_once('/') {
        None if !repo_id.is_empty() => Ok((None, repo_id)),
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((Some(owner), name))
        }
        _ => Err(invalid()),
    }
}

pub struct HubClient {
    client:   reqwest::blocking::Client,
    token:    String,
    endpoint: String,
    repo_id:  String,
}

impl HubClient {
    /// Build a client for `repo_id`, resolving the owner from the token if needed.
    pub fn connect(repo_id: &str, token: &str) -> Result<Self, HubError> {
        Self::with_endpoint(repo_id, token, HUB_ENDPOINT)
    }

    pub fn with_endpoint(repo_id: &str, token: &str, endpoint: &str) -> Result<Self, HubError> {
        let (owner, name) = split_repo_id(repo_id)?;
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("medsum-finetune/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HubError::Http { message: format!("Failed to create HTTP client: {e}") })?;

        let mut hub = Self {
            client,
            token:    token.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            repo_id:  repo_id.to_string(),
        };
        if owner.is_none() {
            let user = hub.whoami()?;
            hub.repo_id = format!("{user}/{name}");
        }
        Ok(hub)
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn repo_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.repo_id)
    }

    fn whoami(&self) -> Result<String, HubError> {
        let response = self
            .client
            .get(format!("{}/api/whoami-v2", self.endpoint))
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| HubError::WhoAmI { message: e.to_string() })?;
        if !response.status().is_success() {
            return Err(HubError::WhoAmI { message: format!("HTTP {}", response.status()) });
        }
        let body: serde_json::Value = response
            .json()
            .map_err(|e| HubError::WhoAmI { message: e.to_string() })?;
        body.get("name")
            .and_then(|n| n.as_str())
            .map(str::to_string)
            .ok_or_else(|| HubError::WhoAmI { message: "response has no 'name'".to_string() })
    }

    /// Create the repository; an existing one is fine.
    pub fn create_repo(&self, private: bool) -> Result<String, HubError> {
        let (owner, name) = split_repo_id(&self.repo_id)?;
        let mut body = serde_json::json!({ "name": name, "type": "model", "private": private });
        if let Some(org) = owner {
            body["organization"] = serde_json::Value::String(org.to_string());
        }

        let response = self
            .client
            .post(format!("{}/api/repos/create", self.endpoint))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|e| HubError::Http { message: format!("Create repo request failed: {e}") })?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 409 {
            Ok(self.repo_url())
        } else {
            Err(HubError::RepoCreationFailed {
                repo_id: self.repo_id.clone(),
                message: format!("HTTP {status}: {}", response.text().unwrap_or_default()),
            })
        }
    }

    pub fn upload_bytes(&self, content: Vec<u8>, path_in_repo: &str) -> Result<(), HubError> {
        let url = format!(
            "{}/api/models/{}/upload/main/{}",
            self.endpoint, self.repo_id, path_in_repo
        );
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/octet-stream")
            .body(content)
            .send()
            .map_err(|e| HubError::UploadFailed {
                path:    path_in_repo.to_string(),
                message: e.to_string(),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            Err(HubError::UploadFailed {
                path:    path_in_repo.to_string(),
                message: format!("HTTP {status}: {}", response.text().unwrap_or_default()),
            })
        }
    }

    pub fn upload_file(&self, local: &Path, path_in_repo: &str) -> Result<(), HubError> {
        self.upload_bytes(std::fs::read(local)?, path_in_repo)
    }

    /// Upload every regular file directly inside `dir`, under `prefix` if given.
    /// Returns the number of files uploaded.
    pub fn upload_folder(&self, dir: &Path, prefix: Option<&str>) -> Result<usize, HubError> {
        let mut uploaded = 0;
        for (local, remote) in folder_uploads(dir, prefix)? {
            tracing::debug!("Uploading '{}' → {}", local.display(), remote);
            self.upload_file(&local, &remote)?;
            uploaded += 1;
        }
        tracing::info!("Uploaded {uploaded} files to {}", self.repo_url());
        Ok(uploaded)
    }
}

/// (local path, path in repo) pairs for the files directly inside `dir`, by name.
pub fn folder_uploads(dir: &Path, prefix: Option<&str>) -> Result<Vec<(std::path::PathBuf, String)>, HubError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let remote = match prefix {
            Some(p) => format!("{}/{name}", p.trim_end_matches('/')),
            None => name,
        };
        files.push((path, remote));
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("repo_id", &self.repo_id)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use tempfile::TempDir;

    #[test]
    fn test_split_repo_id() {
        assert_eq!(split_repo_id("org/model").unwrap(), (Some("org"), "model"));
        assert_eq!(split_repo_id("google--flan-t5").unwrap(), (None, "google--flan-t5"));
        assert!(split_repo_id("").is_err());
        assert!(split_repo_id("/model").is_err());
        assert!(split_repo_id("a/b/c").is_err());
    }

    #[test]
    fn test_folder_uploads_skips_subdirectories() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        std::fs::write(dir.path().join("model.mpk"), "x").unwrap();
        std::fs::create_dir(dir.path().join("checkpoint-5")).unwrap();

        let plain = folder_uploads(dir.path(), None).unwrap();
        let names: Vec<_> = plain.iter().map(|(_, r)| r.as_str()).collect();
        assert_eq!(names, vec!["config.json", "model.mpk"]);

        let nested = folder_uploads(dir.path(), Some("last-checkpoint/")).unwrap();
        assert_eq!(nested[0].1, "last-checkpoint/config.json");
    }

    #[test]
    fn test_client_with_owner_skips_whoami() {
        // No request is made when the id already has an owner.
        let hub = HubClient::with_endpoint("org/model", "hf_x", "http://127.0.0.1:9/").unwrap();
        assert_eq!(hub.repo_id(), "org/model");
        assert_eq!(hub.repo_url(), "http://127.0.0.1:9/org/model");
    }

    #[test]
    fn test_id_without_owner_uses_token_namespace() {
        let mut server = Server::new();
        let whoami = server
            .mock("GET", "/api/whoami-v2")
            .match_header("authorization", "Bearer hf_x")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"type": "user", "name": "alice"}"#)
            .create();

        let hub = HubClient::with_endpoint("med-t5", "hf_x", &server.url()).unwrap();
        assert_eq!(hub.repo_id(), "alice/med-t5");
        assert_eq!(hub.repo_url(), format!("{}/alice/med-t5", server.url()));
        whoami.assert();
    }

    #[test]
    fn test_rejected_token_fails_whoami() {
        let mut server = Server::new();
        let _whoami = server.mock("GET", "/api/whoami-v2").with_status(401).create();

        let err = HubClient::with_endpoint("med-t5", "bad", &server.url()).unwrap_err();
        assert!(matches!(err, HubError::WhoAmI { .. }), "{err}");
    }

    #[test]
    fn test_existing_repo_counts_as_created() {
        let mut server = Server::new();
        let create = server
            .mock("POST", "/api/repos/create")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "name": "model", "organization": "org", "private": false
            })))
            .with_status(409)
            .with_body(r#"{"error": "You already created this model repo"}"#)
            .create();

        let hub = HubClient::with_endpoint("org/model", "hf_x", &server.url()).unwrap();
        assert_eq!(hub.create_repo(false).unwrap(), format!("{}/org/model", server.url()));
        create.assert();
    }

    #[test]
    fn test_create_repo_server_error() {
        let mut server = Server::new();
        let _create = server
            .mock("POST", "/api/repos/create")
            .with_status(500)
            .with_body("boom")
            .create();

        let hub = HubClient::with_endpoint("org/model", "hf_x", &server.url()).unwrap();
        match hub.create_repo(true).unwrap_err() {
            HubError::RepoCreationFailed { repo_id, message } => {
                assert_eq!(repo_id, "org/model");
                assert!(message.contains("500") && message.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_upload_folder_puts_each_file_under_prefix() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        std::fs::write(dir.path().join("model.mpk"), "weights").unwrap();

        let mut server = Server::new();
        let config = server
            .mock("PUT", "/api/models/org/model/upload/main/last-checkpoint/config.json")
            .match_header("authorization", "Bearer hf_x")
            .match_header("content-type", "application/octet-stream")
            .match_body("{}")
            .with_status(200)
            .create();
        let weights = server
            .mock("PUT", "/api/models/org/model/upload/main/last-checkpoint/model.mpk")
            .match_body("weights")
            .with_status(200)
            .create();

        let hub = HubClient::with_endpoint("org/model", "hf_x", &server.url()).unwrap();
        assert_eq!(hub.upload_folder(dir.path(), Some("last-checkpoint")).unwrap(), 2);
        config.assert();
        weights.assert();
    }
}
