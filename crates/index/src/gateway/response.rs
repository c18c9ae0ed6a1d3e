//! Response payloads of gateway operations.

use crate::models::RepoKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub project_id: String,
    pub repo_name: String,
    /// Normalised repository-relative path of the artifact.
    pub path: String,
    pub content_sha256: String,
    pub content_md5: String,
    /// Whether and how the catalogs were updated.
    pub description: String,
}

impl UploadResponse {
    pub(crate) fn new(repo: &RepoKey, path: &str, sha256: &str, md5: &str, description: impl Into<String>) -> Self {
        Self {
            project_id: repo.project_id.clone(),
            repo_name: repo.repo_name.clone(),
            path: path.to_string(),
            content_sha256: sha256.to_string(),
            content_md5: md5.to_string(),
            description: description.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub project_id: String,
    pub repo_name: String,
    pub path: String,
    pub description: String,
    /// Whether the artifact was removed.
    pub removed: bool,
}

impl DeleteResponse {
    pub(crate) fn removed(repo: &RepoKey, path: &str, description: impl Into<String>) -> Self {
        Self::new(repo, path, description, true)
    }

    pub(crate) fn kept(repo: &RepoKey, path: &str, description: impl Into<String>) -> Self {
        Self::new(repo, path, description, false)
    }

    fn new(repo: &RepoKey, path: &str, description: impl Into<String>, removed: bool) -> Self {
        Self {
            project_id: repo.project_id.clone(),
            repo_name: repo.repo_name.clone(),
            path: path.to_string(),
            description: description.into(),
            removed,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upload_response_json() {
        let response = UploadResponse::new(&RepoKey::new("proj", "rpms"), "a/p.rpm", "aa", "bb", "indexed");
        let value: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "projectId": "proj",
                "repoName": "rpms",
                "path": "a/p.rpm",
                "contentSha256": "aa",
                "contentMd5": "bb",
                "description": "indexed",
            })
        );
    }

    #[test]
    fn test_delete_response_json() {
        let response = DeleteResponse::kept(&RepoKey::new("proj", "rpms"), "a/p.rpm", "index record not found");
        let json = response.to_json().unwrap();
        assert!(json.contains(r#""repoName":"rpms""#));
        assert!(json.contains(r#""removed":false"#));
        assert_eq!(serde_json::from_str::<DeleteResponse>(&json).unwrap(), response);
    }
}
