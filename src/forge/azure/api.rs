//! forge::azure::api
//!
//! Native Azure DevOps Git REST client.
//!
//! Every repository endpoint lives under
//! `<orgUrl>/<project>/_apis/git/repositories/<repo>` and carries
//! `api-version=7.1`. Authentication is HTTP basic with an empty user name
//! and the personal access token as password.
//!
//! An invalid PAT does not produce a 401: Azure answers `203` with an HTML
//! sign-in page. The client turns that into a 401 [`ApiError`].

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::forge::http::{self, ApiError};

/// REST API version sent with every request.
pub const API_VERSION: &str = "7.1";

/// Sentinel old object id that marks a ref update as "create".
pub const ZERO_OBJECT_ID: &str = "0000000000000000000000000000000000000000";

/// Azure DevOps Git REST capabilities used by the adapter.
#[async_trait]
pub trait AzureDevOpsApi: Send + Sync {
    /// `GET .../repositories/{repo}`
    async fn get_repository(&self, project: &str, repo: &str)
        -> Result<AzureRepository, ApiError>;

    /// `GET .../refs?filter={filter}&$top=N`
    ///
    /// `filter` is a prefix match without the leading `refs/`, e.g.
    /// `heads/main`.
    async fn list_refs(
        &self,
        project: &str,
        repo: &str,
        filter: &str,
        top: usize,
    ) -> Result<Vec<AzureRef>, ApiError>;

    /// `POST .../refs`
    async fn update_refs(
        &self,
        project: &str,
        repo: &str,
        updates: &[RefUpdate],
    ) -> Result<Vec<RefUpdateResult>, ApiError>;

    /// `POST .../pullrequests`
    async fn create_pull_request(
        &self,
        project: &str,
        repo: &str,
        body: &CreatePullRequestBody,
    ) -> Result<AzurePullRequest, ApiError>;

    /// `GET .../pullrequests/{id}`
    async fn get_pull_request(
        &self,
        project: &str,
        repo: &str,
        id: u64,
    ) -> Result<AzurePullRequest, ApiError>;

    /// `GET .../pullrequests?searchCriteria.status={status}&$top=N`
    async fn list_pull_requests(
        &self,
        project: &str,
        repo: &str,
        status: &str,
        top: usize,
    ) -> Result<Vec<AzurePullRequest>, ApiError>;

    /// `POST .../pushes`
    async fn push(&self, project: &str, repo: &str, body: &PushBody)
        -> Result<AzurePush, ApiError>;
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

/// Collection envelope used by list endpoints.
#[derive(Debug, Deserialize)]
struct ValueList<T> {
    value: Vec<T>,
}

/// Repository response (subset). `defaultBranch` is a full ref name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureRepository {
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// A git ref.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureRef {
    /// Full ref name, e.g. `refs/heads/main`
    pub name: String,
    pub object_id: String,
}

/// One ref update in a `POST refs` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefUpdate {
    pub name: String,
    pub old_object_id: String,
    pub new_object_id: String,
}

/// Per-ref outcome of a `POST refs` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefUpdateResult {
    pub name: String,
    pub new_object_id: String,
    pub success: bool,
    #[serde(default)]
    pub update_status: Option<String>,
    #[serde(default)]
    pub custom_message: Option<String>,
}

/// Request body for creating a pull request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePullRequestBody {
    pub source_ref_name: String,
    pub target_ref_name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_draft: bool,
}

/// Native pull request status.
///
/// Azure reports it numerically (1/2/3) in some payloads and by name in
/// others; both decode to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "RawStatus")]
pub enum AzurePrStatus {
    Active,
    Abandoned,
    Completed,
    /// `notSet`, `all` or anything newer
    Other,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStatus {
    Code(i64),
    Name(String),
}

impl From<RawStatus> for AzurePrStatus {
    fn from(raw: RawStatus) -> Self {
        match raw {
            RawStatus::Code(1) => AzurePrStatus::Active,
            RawStatus::Code(2) => AzurePrStatus::Abandoned,
            RawStatus::Code(3) => AzurePrStatus::Completed,
            RawStatus::Code(_) => AzurePrStatus::Other,
            RawStatus::Name(name) => match name.to_ascii_lowercase().as_str() {
                "active" => AzurePrStatus::Active,
                "abandoned" => AzurePrStatus::Abandoned,
                "completed" => AzurePrStatus::Completed,
                _ => AzurePrStatus::Other,
            },
        }
    }
}

/// Pull request response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzurePullRequest {
    pub pull_request_id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: AzurePrStatus,
    pub source_ref_name: String,
    pub target_ref_name: String,
    #[serde(default)]
    pub created_by: Option<AzureIdentity>,
    #[serde(default)]
    pub is_draft: Option<bool>,
    pub creation_date: DateTime<Utc>,
    #[serde(default)]
    pub closed_date: Option<DateTime<Utc>>,
}

/// Identity reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureIdentity {
    pub display_name: String,
}

/// Request body for a push.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushBody {
    pub ref_updates: Vec<PushRefUpdate>,
    pub commits: Vec<PushCommit>,
}

/// Branch a push moves, and the tip it expects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRefUpdate {
    pub name: String,
    pub old_object_id: String,
}

/// Commit inside a push.
#[derive(Debug, Clone, Serialize)]
pub struct PushCommit {
    pub comment: String,
    pub changes: Vec<PushChange>,
}

/// Change type of a pushed file. Azure does not infer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Edit,
}

/// One file change inside a pushed commit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushChange {
    pub change_type: ChangeType,
    pub item: PushItem,
    pub new_content: PushContent,
}

/// Path of a pushed file, rooted at `/`.
#[derive(Debug, Clone, Serialize)]
pub struct PushItem {
    pub path: String,
}

/// Content of a pushed file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushContent {
    pub content: String,
    pub content_type: String,
}

/// Push response (subset).
#[derive(Debug, Clone, Deserialize)]
pub struct AzurePush {
    #[serde(default)]
    pub commits: Vec<AzureCommit>,
}

/// Commit created by a push.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCommit {
    pub commit_id: String,
    #[serde(default)]
    pub comment: String,
}

// --------------------------------------------------------------------------
// reqwest client
// --------------------------------------------------------------------------

/// Azure DevOps REST client over `reqwest`.
#[derive(Clone)]
pub struct AzureDevOpsClient {
    client: Client,
    token: String,
    /// Organization URL, e.g. `https://dev.azure.com/acme`
    org_url: String,
}

impl std::fmt::Debug for AzureDevOpsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureDevOpsClient")
            .field("has_token", &!self.token.is_empty())
            .field("org_url", &self.org_url)
            .finish()
    }
}

impl AzureDevOpsClient {
    /// Client for an organization URL.
    pub fn new(token: impl Into<String>, org_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            org_url: org_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The organization URL.
    pub fn org_url(&self) -> &str {
        &self.org_url
    }

    fn headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!(":{}", self.token));
        let auth = HeaderValue::from_str(&format!("Basic {}", encoded))
            .map_err(|_| ApiError::connection("token is not usable as a header value"))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(USER_AGENT, HeaderValue::from_static("polyforge"));
        Ok(headers)
    }

    /// Build URL for a repository endpoint with `api-version` set.
    fn repo_url(&self, project: &str, repo: &str, tail: &[&str]) -> Result<Url, ApiError> {
        let mut segments = vec![project, "_apis", "git", "repositories", repo];
        segments.extend_from_slice(tail);
        let mut url = http::endpoint(&self.org_url, &segments)?;
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    fn get(&self, url: Url) -> Result<RequestBuilder, ApiError> {
        Ok(self.client.get(url).headers(self.headers()?))
    }

    fn post(&self, url: Url) -> Result<RequestBuilder, ApiError> {
        Ok(self.client.post(url).headers(self.headers()?))
    }
}

/// Send and decode, treating Azure's 203 sign-in redirect as a 401.
async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = http::send(request).await?;
    if response.status() == StatusCode::NON_AUTHORITATIVE_INFORMATION {
        return Err(ApiError::status(
            401,
            "unauthorized: credential rejected (203 sign-in response)",
        ));
    }
    let status = response.status();
    response.json().await.map_err(|e| {
        ApiError::decode(format!(
            "failed to decode {} response body: {}",
            status.as_u16(),
            e
        ))
    })
}

#[async_trait]
impl AzureDevOpsApi for AzureDevOpsClient {
    async fn get_repository(
        &self,
        project: &str,
        repo: &str,
    ) -> Result<AzureRepository, ApiError> {
        let url = self.repo_url(project, repo, &[])?;
        send_json(self.get(url)?).await
    }

    async fn list_refs(
        &self,
        project: &str,
        repo: &str,
        filter: &str,
        top: usize,
    ) -> Result<Vec<AzureRef>, ApiError> {
        let mut url = self.repo_url(project, repo, &["refs"])?;
        url.query_pairs_mut()
            .append_pair("filter", filter)
            .append_pair("$top", &top.to_string());
        let list: ValueList<AzureRef> = send_json(self.get(url)?).await?;
        Ok(list.value)
    }

    async fn update_refs(
        &self,
        project: &str,
        repo: &str,
        updates: &[RefUpdate],
    ) -> Result<Vec<RefUpdateResult>, ApiError> {
        let url = self.repo_url(project, repo, &["refs"])?;
        let list: ValueList<RefUpdateResult> = send_json(self.post(url)?.json(updates)).await?;
        Ok(list.value)
    }

    async fn create_pull_request(
        &self,
        project: &str,
        repo: &str,
        body: &CreatePullRequestBody,
    ) -> Result<AzurePullRequest, ApiError> {
        let url = self.repo_url(project, repo, &["pullrequests"])?;
        send_json(self.post(url)?.json(body)).await
    }

    async fn get_pull_request(
        &self,
        project: &str,
        repo: &str,
        id: u64,
    ) -> Result<AzurePullRequest, ApiError> {
        let id = id.to_string();
        let url = self.repo_url(project, repo, &["pullrequests", id.as_str()])?;
        send_json(self.get(url)?).await
    }

    async fn list_pull_requests(
        &self,
        project: &str,
        repo: &str,
        status: &str,
        top: usize,
    ) -> Result<Vec<AzurePullRequest>, ApiError> {
        let mut url = self.repo_url(project, repo, &["pullrequests"])?;
        url.query_pairs_mut()
            .append_pair("searchCriteria.status", status)
            .append_pair("$top", &top.to_string());
        let list: ValueList<AzurePullRequest> = send_json(self.get(url)?).await?;
        Ok(list.value)
    }

    async fn push(
        &self,
        project: &str,
        repo: &str,
        body: &PushBody,
    ) -> Result<AzurePush, ApiError> {
        let url = self.repo_url(project, repo, &["pushes"])?;
        send_json(self.post(url)?.json(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_url_carries_api_version() {
        let client = AzureDevOpsClient::new("pat", "https://dev.azure.com/acme/");
        assert_eq!(
            client.repo_url("Platform", "widgets", &["refs"]).unwrap().as_str(),
            "https://dev.azure.com/acme/Platform/_apis/git/repositories/widgets/refs?api-version=7.1"
        );
    }

    #[test]
    fn project_with_space_is_encoded() {
        let client = AzureDevOpsClient::new("pat", "https://dev.azure.com/acme");
        let url = client.repo_url("My Project", "widgets", &[]).unwrap();
        assert!(url.as_str().contains("/My%20Project/_apis/"));
    }

    #[test]
    fn basic_auth_has_empty_user() {
        let client = AzureDevOpsClient::new("pat", "https://dev.azure.com/acme");
        let headers = client.headers().unwrap();
        // base64(":pat")
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Basic OnBhdA==");
    }

    #[test]
    fn debug_redacts_token() {
        let client = AzureDevOpsClient::new("super-secret-pat", "https://dev.azure.com/acme");
        assert!(!format!("{:?}", client).contains("super-secret-pat"));
    }

    mod status {
        use super::*;

        fn decode(json: &str) -> AzurePrStatus {
            serde_json::from_str(json).unwrap()
        }

        #[test]
        fn numeric() {
            assert_eq!(decode("1"), AzurePrStatus::Active);
            assert_eq!(decode("2"), AzurePrStatus::Abandoned);
            assert_eq!(decode("3"), AzurePrStatus::Completed);
            assert_eq!(decode("0"), AzurePrStatus::Other);
        }

        #[test]
        fn named() {
            assert_eq!(decode(r#""active""#), AzurePrStatus::Active);
            assert_eq!(decode(r#""abandoned""#), AzurePrStatus::Abandoned);
            assert_eq!(decode(r#""completed""#), AzurePrStatus::Completed);
            assert_eq!(decode(r#""notSet""#), AzurePrStatus::Other);
        }
    }

    #[test]
    fn push_body_shape() {
        let body = PushBody {
            ref_updates: vec![PushRefUpdate {
                name: "refs/heads/main".into(),
                old_object_id: "abc".into(),
            }],
            commits: vec![PushCommit {
                comment: "msg".into(),
                changes: vec![PushChange {
                    change_type: ChangeType::Add,
                    item: PushItem {
                        path: "/README.md".into(),
                    },
                    new_content: PushContent {
                        content: "hi".into(),
                        content_type: "rawtext".into(),
                    },
                }],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["refUpdates"][0]["oldObjectId"], "abc");
        assert_eq!(json["commits"][0]["changes"][0]["changeType"], "add");
        assert_eq!(json["commits"][0]["changes"][0]["newContent"]["contentType"], "rawtext");
    }
}
