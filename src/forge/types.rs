//! forge::types
//!
//! Provider-agnostic read models and request types.
//!
//! # Design
//!
//! Every value here is a transient read model: adapters build them fresh from
//! backend responses on each call and never mutate them afterwards. Nothing
//! is cached.
//!
//! Two fields need care across backends:
//! - [`PullRequest::state`] is always one of three values, whatever the
//!   native vocabulary was.
//! - [`PullRequest::draft`] is always a boolean, `false` when the backend has
//!   no draft concept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ForgeError;

/// Supported hosting providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    /// github.com or GitHub Enterprise
    #[serde(rename = "github")]
    GitHub,
    /// gitlab.com or a self-hosted GitLab
    #[serde(rename = "gitlab")]
    GitLab,
    /// Azure DevOps Services
    AzureDevOps,
}

impl Provider {
    /// All providers, in configuration order.
    pub fn all() -> &'static [Provider] {
        &[Provider::GitHub, Provider::GitLab, Provider::AzureDevOps]
    }

    /// The provider name as used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::GitLab => "gitlab",
            Provider::AzureDevOps => "azure-devops",
        }
    }

    /// Parse a provider from its configuration name (case-insensitive).
    ///
    /// # Example
    ///
    /// ```
    /// use polyforge::forge::Provider;
    ///
    /// assert_eq!(Provider::parse("GitLab"), Some(Provider::GitLab));
    /// assert_eq!(Provider::parse("azure-devops"), Some(Provider::AzureDevOps));
    /// assert_eq!(Provider::parse("bitbucket"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "github" => Some(Provider::GitHub),
            "gitlab" => Some(Provider::GitLab),
            "azure-devops" | "azuredevops" | "azure" => Some(Provider::AzureDevOps),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Identity of a repository, passed on every call.
///
/// `project` is only meaningful for Azure DevOps, where it is mandatory.
/// The GitHub and GitLab adapters never read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRef {
    /// Which backend this repository lives on
    pub provider: Provider,
    /// User, organization or group
    pub owner: String,
    /// Repository name
    pub repo_name: String,
    /// Azure DevOps project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl RepositoryRef {
    /// Reference a GitHub or GitLab repository.
    pub fn new(provider: Provider, owner: impl Into<String>, repo_name: impl Into<String>) -> Self {
        Self {
            provider,
            owner: owner.into(),
            repo_name: repo_name.into(),
            project: None,
        }
    }

    /// Reference an Azure DevOps repository inside `project`.
    pub fn azure(
        owner: impl Into<String>,
        project: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Self {
        Self {
            provider: Provider::AzureDevOps,
            owner: owner.into(),
            repo_name: repo_name.into(),
            project: Some(project.into()),
        }
    }

    /// Set the project.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// `owner/repo`, the form used in messages and GitLab project paths.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo_name)
    }

    /// Check the reference can be served by an adapter for `provider`.
    ///
    /// Runs before any backend call. Azure DevOps also requires a non-empty
    /// `project`.
    ///
    /// # Errors
    ///
    /// `ForgeError::Validation` with `field` set to `provider` or `project`.
    pub fn validate_for(&self, provider: Provider) -> Result<(), ForgeError> {
        if self.provider != provider {
            return Err(ForgeError::validation(
                provider,
                format!(
                    "repository {} belongs to {}, not {}",
                    self.full_name(),
                    self.provider,
                    provider
                ),
                Some("provider"),
            ));
        }

        if provider == Provider::AzureDevOps
            && self.project.as_deref().map_or(true, |p| p.trim().is_empty())
        {
            return Err(ForgeError::validation(
                provider,
                "project is required for Azure DevOps repositories",
                Some("project"),
            ));
        }

        Ok(())
    }
}

/// A branch as seen at call time.
///
/// `is_default` comes from joining the branch read with a separate
/// default-branch read; the two are not atomic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// Bare branch name (no `refs/heads/` prefix)
    pub name: String,
    /// Tip commit
    pub sha: String,
    /// Whether this is the repository's default branch
    pub is_default: bool,
    /// Whether the backend reports the branch as protected
    pub protected: bool,
}

/// Normalized pull request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    /// Open and awaiting review/merge
    Open,
    /// Closed without being merged
    Closed,
    /// Merged
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Closed => write!(f, "closed"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// Pull request (merge request on GitLab) information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// Provider-internal key
    pub id: u64,
    /// Display-facing number (`#12`, `!12`); may differ from `id`
    pub number: u64,
    pub title: String,
    pub description: Option<String>,
    pub state: PrState,
    pub source_branch: String,
    pub target_branch: String,
    /// Display name or handle of the author
    pub author: String,
    /// Web URL
    pub url: String,
    pub draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a single-file create-or-update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    /// Resulting commit
    pub sha: String,
    /// Commit message
    pub message: String,
}

/// Request to create a branch.
#[derive(Debug, Clone)]
pub struct CreateBranchRequest {
    /// New branch name
    pub name: String,
    /// Branch name or 40-hex commit sha to branch from
    pub from_ref: String,
}

/// Request to create a pull request.
#[derive(Debug, Clone)]
pub struct CreatePrRequest {
    pub title: String,
    pub description: Option<String>,
    /// Branch with the changes
    pub source_branch: String,
    /// Branch to merge into
    pub target_branch: String,
    /// Create as draft
    pub draft: bool,
}

/// Which pull requests to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrStateFilter {
    /// Normalized state `open`
    #[default]
    Open,
    /// Normalized state `closed` or `merged`
    Closed,
    /// Everything
    All,
}

impl PrStateFilter {
    /// Whether a normalized state passes this filter.
    pub fn matches(&self, state: PrState) -> bool {
        match self {
            PrStateFilter::Open => state == PrState::Open,
            PrStateFilter::Closed => matches!(state, PrState::Closed | PrState::Merged),
            PrStateFilter::All => true,
        }
    }
}

/// Default page size for pull request listings.
pub const DEFAULT_PR_LIMIT: usize = 30;

/// Single-page bound used by every list call.
pub const MAX_PAGE_SIZE: usize = 100;

/// Options for listing pull requests.
#[derive(Debug, Clone, Default)]
pub struct ListPrsOpts {
    /// State filter (defaults to open)
    pub state: PrStateFilter,
    /// Page-size hint (defaults to 30)
    pub limit: Option<usize>,
}

impl ListPrsOpts {
    /// The page size to request, clamped to `1..=100`.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PR_LIMIT)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

/// Request to create or update one file on a branch.
#[derive(Debug, Clone)]
pub struct CommitFileRequest {
    /// Repository-relative path
    pub path: String,
    /// Full new file contents
    pub content: String,
    /// Commit message
    pub message: String,
    /// Branch to commit to
    pub branch: String,
}

/// Whether `reference` is a full 40-character hex commit sha.
///
/// Branch creation skips ref resolution for these.
///
/// # Example
///
/// ```
/// use polyforge::forge::is_commit_sha;
///
/// assert!(is_commit_sha("0123456789abcdef0123456789abcdef01234567"));
/// assert!(!is_commit_sha("main"));
/// assert!(!is_commit_sha("0123456"));
/// ```
pub fn is_commit_sha(reference: &str) -> bool {
    reference.len() == 40 && reference.bytes().all(|b| b.is_ascii_hexdigit())
}
