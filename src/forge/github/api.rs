//! forge::github::api
//!
//! Native GitHub REST client.
//!
//! [`GitHubApi`] lists the REST capabilities the adapter needs, in GitHub's
//! own terms and shapes. [`GitHubClient`] implements it over `reqwest`.
//! Nothing here knows about the normalized model.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::forge::http::{self, ApiError};

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "polyforge";

/// GitHub REST capabilities used by the adapter.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// `GET /repos/{owner}/{repo}`
    async fn get_repo(&self, owner: &str, repo: &str) -> Result<GitHubRepo, ApiError>;

    /// `GET /repos/{owner}/{repo}/git/ref/heads/{branch}`
    async fn get_ref(&self, owner: &str, repo: &str, branch: &str)
        -> Result<GitHubGitRef, ApiError>;

    /// `POST /repos/{owner}/{repo}/git/refs`
    async fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        ref_name: &str,
        sha: &str,
    ) -> Result<GitHubGitRef, ApiError>;

    /// `GET /repos/{owner}/{repo}/branches/{branch}`
    async fn get_branch(&self, owner: &str, repo: &str, branch: &str)
        -> Result<GitHubBranch, ApiError>;

    /// `GET /repos/{owner}/{repo}/branches?per_page=N`
    async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
        per_page: usize,
    ) -> Result<Vec<GitHubBranch>, ApiError>;

    /// `POST /repos/{owner}/{repo}/pulls`
    async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        body: &CreatePullBody,
    ) -> Result<GitHubPullRequest, ApiError>;

    /// `GET /repos/{owner}/{repo}/pulls/{number}`
    async fn get_pull(&self, owner: &str, repo: &str, number: u64)
        -> Result<GitHubPullRequest, ApiError>;

    /// `GET /repos/{owner}/{repo}/pulls?state=S&per_page=N`
    async fn list_pulls(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
        per_page: usize,
    ) -> Result<Vec<GitHubPullRequest>, ApiError>;

    /// `GET /repos/{owner}/{repo}/contents/{path}?ref={branch}`
    async fn get_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<GitHubContent, ApiError>;

    /// `PUT /repos/{owner}/{repo}/contents/{path}`
    async fn put_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        body: &PutContentsBody,
    ) -> Result<GitHubContentCommit, ApiError>;
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

/// Repository response (subset).
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    pub default_branch: String,
}

/// Git ref response.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubGitRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub object: GitHubObject,
}

/// Object a ref points at.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubObject {
    pub sha: String,
}

/// Branch response; `protected` comes inline.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubBranch {
    pub name: String,
    pub commit: GitHubObject,
    #[serde(default)]
    pub protected: bool,
}

/// Request body for creating a ref.
#[derive(Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    ref_name: &'a str,
    sha: &'a str,
}

/// Request body for creating a PR.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePullBody {
    pub title: String,
    pub head: String,
    pub base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub draft: bool,
}

/// Pull request response.
///
/// The list endpoint omits `merged`; `merged_at` is present on both.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPullRequest {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub merged: Option<bool>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub draft: Option<bool>,
    pub head: GitHubPrRef,
    pub base: GitHubPrRef,
    pub user: Option<GitHubUser>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// PR head/base.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPrRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

/// Account reference.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

/// Contents response (subset) for an existing file.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubContent {
    pub sha: String,
}

/// Request body for creating or updating a file.
#[derive(Debug, Clone, Serialize)]
pub struct PutContentsBody {
    pub message: String,
    /// Base64 file contents
    pub content: String,
    pub branch: String,
    /// Blob sha of the file being replaced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Response to a contents write.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubContentCommit {
    pub commit: GitHubCommit,
}

/// Commit created by a contents write.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
    pub message: String,
}

// --------------------------------------------------------------------------
// reqwest client
// --------------------------------------------------------------------------

/// GitHub REST client over `reqwest`.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    token: String,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
}

// Custom Debug to avoid exposing token
impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("has_token", &!self.token.is_empty())
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubClient {
    /// Client for api.github.com.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Client for a GitHub Enterprise API base, e.g.
    /// `https://github.example.com/api/v3`.
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// The API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ApiError::connection("token is not usable as a header value"))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    ///
    /// `tail` segments may themselves contain `/` (branch names, file
    /// paths); GitHub wants those as literal path separators.
    fn repo_url(&self, owner: &str, repo: &str, tail: &[&str]) -> Result<Url, ApiError> {
        let mut segments = vec!["repos", owner, repo];
        segments.extend(tail.iter().copied().flat_map(|t| t.split('/')));
        http::endpoint(&self.api_base, &segments)
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn get_repo(&self, owner: &str, repo: &str) -> Result<GitHubRepo, ApiError> {
        let url = self.repo_url(owner, repo, &[])?;
        http::send_json(self.client.get(url).headers(self.headers()?)).await
    }

    async fn get_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<GitHubGitRef, ApiError> {
        let url = self.repo_url(owner, repo, &["git", "ref", "heads", branch])?;
        http::send_json(self.client.get(url).headers(self.headers()?)).await
    }

    async fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        ref_name: &str,
        sha: &str,
    ) -> Result<GitHubGitRef, ApiError> {
        let url = self.repo_url(owner, repo, &["git", "refs"])?;
        let body = CreateRefBody { ref_name, sha };
        http::send_json(self.client.post(url).headers(self.headers()?).json(&body)).await
    }

    async fn get_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<GitHubBranch, ApiError> {
        let url = self.repo_url(owner, repo, &["branches", branch])?;
        http::send_json(self.client.get(url).headers(self.headers()?)).await
    }

    async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
        per_page: usize,
    ) -> Result<Vec<GitHubBranch>, ApiError> {
        let url = self.repo_url(owner, repo, &["branches"])?;
        let request = self
            .client
            .get(url)
            .headers(self.headers()?)
            .query(&[("per_page", per_page.to_string())]);
        http::send_json(request).await
    }

    async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        body: &CreatePullBody,
    ) -> Result<GitHubPullRequest, ApiError> {
        let url = self.repo_url(owner, repo, &["pulls"])?;
        http::send_json(self.client.post(url).headers(self.headers()?).json(body)).await
    }

    async fn get_pull(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<GitHubPullRequest, ApiError> {
        let number = number.to_string();
        let url = self.repo_url(owner, repo, &["pulls", number.as_str()])?;
        http::send_json(self.client.get(url).headers(self.headers()?)).await
    }

    async fn list_pulls(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
        per_page: usize,
    ) -> Result<Vec<GitHubPullRequest>, ApiError> {
        let url = self.repo_url(owner, repo, &["pulls"])?;
        let request = self
            .client
            .get(url)
            .headers(self.headers()?)
            .query(&[("state", state.to_string()), ("per_page", per_page.to_string())]);
        http::send_json(request).await
    }

    async fn get_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<GitHubContent, ApiError> {
        let url = self.repo_url(owner, repo, &["contents", path])?;
        let request = self
            .client
            .get(url)
            .headers(self.headers()?)
            .query(&[("ref", branch)]);
        http::send_json(request).await
    }

    async fn put_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        body: &PutContentsBody,
    ) -> Result<GitHubContentCommit, ApiError> {
        let url = self.repo_url(owner, repo, &["contents", path])?;
        http::send_json(self.client.put(url).headers(self.headers()?).json(body)).await
    }
}
