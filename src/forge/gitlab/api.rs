//! forge::gitlab::api
//!
//! Native GitLab REST (v4) client.
//!
//! Projects are addressed by their `"owner/repo"` path, which GitLab expects
//! URL-encoded as a single path segment (`acme%2Fwidgets`). Branch names and
//! file paths are encoded the same way.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::forge::http::{self, ApiError};

/// Default GitLab instance.
pub const DEFAULT_BASE_URL: &str = "https://gitlab.com";

/// Path of the REST API below the instance URL.
pub const API_PREFIX: &str = "/api/v4";

/// GitLab REST capabilities used by the adapter.
///
/// `project` is always the `"owner/repo"` composite path.
#[async_trait]
pub trait GitLabApi: Send + Sync {
    /// `GET /projects/:id`
    async fn get_project(&self, project: &str) -> Result<GitLabProject, ApiError>;

    /// `GET /projects/:id/repository/branches/:branch`
    async fn get_branch(&self, project: &str, branch: &str) -> Result<GitLabBranch, ApiError>;

    /// `GET /projects/:id/repository/branches?per_page=N`
    async fn list_branches(
        &self,
        project: &str,
        per_page: usize,
    ) -> Result<Vec<GitLabBranch>, ApiError>;

    /// `POST /projects/:id/repository/branches?branch=B&ref=R`
    async fn create_branch(
        &self,
        project: &str,
        branch: &str,
        from: &str,
    ) -> Result<GitLabBranch, ApiError>;

    /// `POST /projects/:id/merge_requests`
    async fn create_merge_request(
        &self,
        project: &str,
        body: &CreateMergeRequestBody,
    ) -> Result<GitLabMergeRequest, ApiError>;

    /// `GET /projects/:id/merge_requests/:iid`
    async fn get_merge_request(
        &self,
        project: &str,
        iid: u64,
    ) -> Result<GitLabMergeRequest, ApiError>;

    /// `GET /projects/:id/merge_requests?state=S&per_page=N`
    async fn list_merge_requests(
        &self,
        project: &str,
        state: &str,
        per_page: usize,
    ) -> Result<Vec<GitLabMergeRequest>, ApiError>;

    /// `GET /projects/:id/repository/files/:path?ref=B`
    async fn get_file(&self, project: &str, path: &str, branch: &str)
        -> Result<GitLabFile, ApiError>;

    /// `POST /projects/:id/repository/files/:path`
    async fn create_file(
        &self,
        project: &str,
        path: &str,
        body: &FileWriteBody,
    ) -> Result<GitLabFileWrite, ApiError>;

    /// `PUT /projects/:id/repository/files/:path`
    async fn update_file(
        &self,
        project: &str,
        path: &str,
        body: &FileWriteBody,
    ) -> Result<GitLabFileWrite, ApiError>;
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

/// Project response (subset). Empty repositories have no default branch.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabProject {
    pub default_branch: Option<String>,
}

/// Branch response.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabBranch {
    pub name: String,
    pub commit: GitLabCommitRef,
    #[serde(default)]
    pub protected: bool,
}

/// Commit a branch points at.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabCommitRef {
    pub id: String,
}

/// Request body for creating a merge request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateMergeRequestBody {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Merge request response.
///
/// Older instances report `work_in_progress`, newer ones `draft`; both may
/// be absent.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabMergeRequest {
    pub id: u64,
    pub iid: u64,
    pub title: String,
    pub description: Option<String>,
    pub state: String,
    #[serde(default)]
    pub draft: Option<bool>,
    #[serde(default)]
    pub work_in_progress: Option<bool>,
    pub source_branch: String,
    pub target_branch: String,
    pub author: Option<GitLabUser>,
    pub web_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account reference.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabUser {
    pub username: String,
}

/// File metadata response (subset).
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabFile {
    pub file_path: String,
}

/// Request body for creating or updating a file.
#[derive(Debug, Clone, Serialize)]
pub struct FileWriteBody {
    pub branch: String,
    pub content: String,
    pub commit_message: String,
}

/// File write response. Carries no commit id.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabFileWrite {
    pub file_path: String,
    pub branch: String,
}

// --------------------------------------------------------------------------
// reqwest client
// --------------------------------------------------------------------------

/// GitLab REST client over `reqwest`.
#[derive(Clone)]
pub struct GitLabClient {
    client: Client,
    token: String,
    /// Instance URL plus [`API_PREFIX`]
    api_base: String,
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("has_token", &!self.token.is_empty())
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitLabClient {
    /// Client for gitlab.com.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Client for a self-hosted instance, e.g. `https://gitlab.example.com`.
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: format!("{}{}", base_url.trim_end_matches('/'), API_PREFIX),
        }
    }

    /// The API base URL, including the `/api/v4` prefix.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&self.token)
            .map_err(|_| ApiError::connection("token is not usable as a header value"))?;
        headers.insert("PRIVATE-TOKEN", token);
        headers.insert(USER_AGENT, HeaderValue::from_static("polyforge"));
        Ok(headers)
    }

    /// Build URL for a project endpoint. Every segment is encoded whole.
    fn project_url(&self, project: &str, tail: &[&str]) -> Result<Url, ApiError> {
        let mut segments = vec!["projects", project];
        segments.extend_from_slice(tail);
        http::endpoint(&self.api_base, &segments)
    }
}

#[async_trait]
impl GitLabApi for GitLabClient {
    async fn get_project(&self, project: &str) -> Result<GitLabProject, ApiError> {
        let url = self.project_url(project, &[])?;
        http::send_json(self.client.get(url).headers(self.headers()?)).await
    }

    async fn get_branch(&self, project: &str, branch: &str) -> Result<GitLabBranch, ApiError> {
        let url = self.project_url(project, &["repository", "branches", branch])?;
        http::send_json(self.client.get(url).headers(self.headers()?)).await
    }

    async fn list_branches(
        &self,
        project: &str,
        per_page: usize,
    ) -> Result<Vec<GitLabBranch>, ApiError> {
        let url = self.project_url(project, &["repository", "branches"])?;
        let request = self
            .client
            .get(url)
            .headers(self.headers()?)
            .query(&[("per_page", per_page.to_string())]);
        http::send_json(request).await
    }

    async fn create_branch(
        &self,
        project: &str,
        branch: &str,
        from: &str,
    ) -> Result<GitLabBranch, ApiError> {
        let url = self.project_url(project, &["repository", "branches"])?;
        let request = self
            .client
            .post(url)
            .headers(self.headers()?)
            .query(&[("branch", branch), ("ref", from)]);
        http::send_json(request).await
    }

    async fn create_merge_request(
        &self,
        project: &str,
        body: &CreateMergeRequestBody,
    ) -> Result<GitLabMergeRequest, ApiError> {
        let url = self.project_url(project, &["merge_requests"])?;
        http::send_json(self.client.post(url).headers(self.headers()?).json(body)).await
    }

    async fn get_merge_request(
        &self,
        project: &str,
        iid: u64,
    ) -> Result<GitLabMergeRequest, ApiError> {
        let iid = iid.to_string();
        let url = self.project_url(project, &["merge_requests", iid.as_str()])?;
        http::send_json(self.client.get(url).headers(self.headers()?)).await
    }

    async fn list_merge_requests(
        &self,
        project: &str,
        state: &str,
        per_page: usize,
    ) -> Result<Vec<GitLabMergeRequest>, ApiError> {
        let url = self.project_url(project, &["merge_requests"])?;
        let request = self
            .client
            .get(url)
            .headers(self.headers()?)
            .query(&[("state", state.to_string()), ("per_page", per_page.to_string())]);
        http::send_json(request).await
    }

    async fn get_file(
        &self,
        project: &str,
        path: &str,
        branch: &str,
    ) -> Result<GitLabFile, ApiError> {
        let url = self.project_url(project, &["repository", "files", path])?;
        let request = self
            .client
            .get(url)
            .headers(self.headers()?)
            .query(&[("ref", branch)]);
        http::send_json(request).await
    }

    async fn create_file(
        &self,
        project: &str,
        path: &str,
        body: &FileWriteBody,
    ) -> Result<GitLabFileWrite, ApiError> {
        let url = self.project_url(project, &["repository", "files", path])?;
        http::send_json(self.client.post(url).headers(self.headers()?).json(body)).await
    }

    async fn update_file(
        &self,
        project: &str,
        path: &str,
        body: &FileWriteBody,
    ) -> Result<GitLabFileWrite, ApiError> {
        let url = self.project_url(project, &["repository", "files", path])?;
        http::send_json(self.client.put(url).headers(self.headers()?).json(body)).await
    }
}
