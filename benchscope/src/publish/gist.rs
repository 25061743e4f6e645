//! Private gist upload via the GitHub REST API.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::client::post_json;
use crate::domain::PipelineError;

pub const GITHUB_API_BASE: &str = "https://api.github.com";

#[derive(Serialize)]
struct GistFile {
    content: String,
}

#[derive(Serialize)]
struct CreateGist<'a> {
    description: &'a str,
    public: bool,
    files: BTreeMap<String, GistFile>,
}

#[derive(Deserialize)]
struct CreatedGist {
    html_url: String,
}

#[derive(Debug, Clone)]
pub struct GistClient {
    api_base: String,
    token: String,
}

impl GistClient {
    #[must_use]
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Create a private gist holding `path` (named after its file name) and
    /// return its browsable URL.
    ///
    /// # Errors
    /// Returns an error if the file can't be read, the API rejects the
    /// request, or the answer has no `html_url`.
    pub fn upload_file(&self, title: &str, path: &Path) -> Result<String, PipelineError> {
        let upload_err = |reason: String| PipelineError::Upload {
            path: path.to_path_buf(),
            reason,
        };

        let content =
            std::fs::read(path).map_err(|e| upload_err(format!("failed to read file: {e}")))?;
        let name = path
            .file_name()
            .map_or_else(|| "report.txt".to_string(), |n| n.to_string_lossy().into_owned());

        let mut files = BTreeMap::new();
        files.insert(name, GistFile {
            content: String::from_utf8_lossy(&content).into_owned(),
        });
        let request = CreateGist {
            description: title,
            public: false,
            files,
        };

        let authorization = format!("Bearer {}", self.token);
        let reply = post_json(
            &format!("{}/gists", self.api_base),
            &[
                ("Authorization", authorization.as_str()),
                ("Accept", "application/vnd.github+json"),
                ("User-Agent", concat!("benchscope/", env!("CARGO_PKG_VERSION"))),
            ],
            &request,
        )
        .map_err(|e| upload_err(format!("failed to create gist: {e}")))?;

        let created: CreatedGist = serde_json::from_str(&reply)
            .map_err(|e| upload_err(format!("unexpected gist response: {e}")))?;
        Ok(created.html_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::spawn_recorder;
    use axum::http::StatusCode;

    #[test]
    fn test_upload_creates_private_gist() {
        let (base, recorded) =
            spawn_recorder(StatusCode::CREATED, r#"{"html_url":"https://gist.github.com/abc"}"#);
        let dir = tempfile::tempdir().expect("tempdir");
        let report = dir.path().join("digest_2024_01_01_00_00_00_slow_query.log");
        std::fs::write(&report, "# Query 1").expect("write");

        let url = GistClient::new(&base, "secret")
            .upload_file("slow query", &report)
            .expect("upload");
        assert_eq!(url, "https://gist.github.com/abc");

        let requests = recorded.lock().expect("lock");
        assert_eq!(requests[0].path, "/gists");
        assert_eq!(requests[0].headers["authorization"], "Bearer secret");
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).expect("json");
        assert_eq!(body["public"], false);
        assert_eq!(body["description"], "slow query");
        assert_eq!(
            body["files"]["digest_2024_01_01_00_00_00_slow_query.log"]["content"],
            "# Query 1"
        );
    }

    #[test]
    fn test_upload_missing_file() {
        let client = GistClient::new("http://127.0.0.1:9", "secret");
        let err = client.upload_file("t", Path::new("/nonexistent/report.log")).unwrap_err();
        assert!(err.to_string().contains("failed to read file"));
    }

    #[test]
    fn test_upload_rejected() {
        let (base, _) =
            spawn_recorder(StatusCode::UNAUTHORIZED, r#"{"message":"Bad credentials"}"#);
        let dir = tempfile::tempdir().expect("tempdir");
        let report = dir.path().join("r.log");
        std::fs::write(&report, "x").expect("write");

        let err = GistClient::new(&base, "bad").upload_file("t", &report).unwrap_err();
        assert!(err.to_string().contains("Bad credentials"));
    }
}
