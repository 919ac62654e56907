//! forge::gitlab
//!
//! GitLab adapter.
//!
//! # Design
//!
//! [`GitLabForge`] implements [`Forge`] on top of a [`GitLabApi`] client.
//! GitLab's quirks, and how they are normalized:
//!
//! - The project is addressed by the `"owner/repo"` composite path.
//! - A merge request is a draft if the title starts with `"Draft:"` or the
//!   native `draft`/`work_in_progress` flag is set. Creating a draft adds
//!   the prefix to the title, so re-reading it still reports a draft
//!   whichever signal the instance honors.
//! - `opened` is open, `merged` is merged, anything else (`closed`,
//!   `locked`) is closed.
//! - The file write endpoints need create vs. update chosen up front and do
//!   not return the commit id, so `commit_file` probes for the file first and
//!   re-reads the branch tip afterwards. A failed probe counts as "absent".
//!
//! # Example
//!
//! ```ignore
//! use polyforge::forge::gitlab::GitLabForge;
//! use polyforge::forge::{Forge, Provider, RepositoryRef};
//!
//! let forge = GitLabForge::with_base_url("glpat-xxx", "https://gitlab.example.com");
//! let repo = RepositoryRef::new(Provider::GitLab, "acme", "widgets");
//! let branches = forge.list_branches(&repo).await?;
//! ```

pub mod api;

use std::sync::Arc;

use async_trait::async_trait;

use self::api::{CreateMergeRequestBody, FileWriteBody, GitLabApi, GitLabClient, GitLabMergeRequest};
use super::error::{map_api_error, ForgeError, Operation, ResourceKind};
use super::http::ApiError;
use super::traits::Forge;
use super::types::{
    is_commit_sha, Branch, CommitFileRequest, CommitResult, CreateBranchRequest, CreatePrRequest,
    ListPrsOpts, PrState, PrStateFilter, Provider, PullRequest, RepositoryRef, MAX_PAGE_SIZE,
};

const PROVIDER: Provider = Provider::GitLab;

/// Title prefix GitLab uses to mark a draft merge request.
pub const DRAFT_PREFIX: &str = "Draft: ";

/// GitLab forge implementation.
pub struct GitLabForge {
    api: Arc<dyn GitLabApi>,
}

impl std::fmt::Debug for GitLabForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabForge").finish_non_exhaustive()
    }
}

impl GitLabForge {
    /// Create a forge for gitlab.com.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api(Arc::new(GitLabClient::new(token)))
    }

    /// Create a forge for a self-hosted instance.
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::with_api(Arc::new(GitLabClient::with_base_url(token, base_url)))
    }

    /// Create a forge over any [`GitLabApi`] implementation.
    pub fn with_api(api: Arc<dyn GitLabApi>) -> Self {
        Self { api }
    }
}

fn fail(
    operation: Operation,
    resource: ResourceKind,
    identifier: &str,
) -> impl FnOnce(ApiError) -> ForgeError + '_ {
    move |err| map_api_error(PROVIDER, operation, (resource, identifier), err)
}

/// Normalize GitLab's merge request state vocabulary.
pub fn map_mr_state(state: &str) -> PrState {
    match state {
        "opened" => PrState::Open,
        "merged" => PrState::Merged,
        _ => PrState::Closed,
    }
}

/// Whether a title carries the draft marker.
pub fn has_draft_prefix(title: &str) -> bool {
    title.starts_with(DRAFT_PREFIX.trim_end())
}

impl From<GitLabMergeRequest> for PullRequest {
    fn from(mr: GitLabMergeRequest) -> Self {
        let draft = mr.draft.unwrap_or(false)
            || mr.work_in_progress.unwrap_or(false)
            || has_draft_prefix(&mr.title);

        PullRequest {
            id: mr.id,
            number: mr.iid,
            state: map_mr_state(&mr.state),
            title: mr.title,
            description: mr.description,
            source_branch: mr.source_branch,
            target_branch: mr.target_branch,
            author: mr.author.map(|u| u.username).unwrap_or_default(),
            url: mr.web_url,
            draft,
            created_at: mr.created_at,
            updated_at: mr.updated_at,
        }
    }
}

#[async_trait]
impl Forge for GitLabForge {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn create_branch(
        &self,
        repo: &RepositoryRef,
        request: CreateBranchRequest,
    ) -> Result<Branch, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let op = Operation::CreateBranch;
        let project = repo.full_name();
        tracing::debug!(provider = %PROVIDER, repo = %project, branch = %request.name, from = %request.from_ref, "creating branch");

        let sha = if is_commit_sha(&request.from_ref) {
            request.from_ref.clone()
        } else {
            self.api
                .get_branch(&project, &request.from_ref)
                .await
                .map_err(fail(op, ResourceKind::Branch, &request.from_ref))?
                .commit
                .id
        };

        let created = self
            .api
            .create_branch(&project, &request.name, &sha)
            .await
            .map_err(fail(op, ResourceKind::Repository, &project))?;

        Ok(Branch {
            name: created.name,
            sha: created.commit.id,
            is_default: false,
            protected: false,
        })
    }

    async fn get_branch(&self, repo: &RepositoryRef, name: &str) -> Result<Branch, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let op = Operation::GetBranch;
        let project = repo.full_name();
        tracing::debug!(provider = %PROVIDER, repo = %project, branch = %name, "getting branch");

        let branch = async {
            self.api
                .get_branch(&project, name)
                .await
                .map_err(fail(op, ResourceKind::Branch, name))
        };
        let info = async {
            self.api
                .get_project(&project)
                .await
                .map_err(fail(op, ResourceKind::Repository, &project))
        };
        // Both reads 404 when the repository is missing; the branch error wins
        let (branch, info) = tokio::join!(branch, info);
        let (branch, info) = (branch?, info?);

        Ok(Branch {
            is_default: info.default_branch.as_deref() == Some(branch.name.as_str()),
            name: branch.name,
            sha: branch.commit.id,
            protected: branch.protected,
        })
    }

    async fn list_branches(&self, repo: &RepositoryRef) -> Result<Vec<Branch>, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let op = Operation::ListBranches;
        let project = repo.full_name();
        tracing::debug!(provider = %PROVIDER, repo = %project, "listing branches");

        let branches = async {
            self.api
                .list_branches(&project, MAX_PAGE_SIZE)
                .await
                .map_err(fail(op, ResourceKind::Repository, &project))
        };
        let info = async {
            self.api
                .get_project(&project)
                .await
                .map_err(fail(op, ResourceKind::Repository, &project))
        };
        let (branches, info) = tokio::join!(branches, info);
        let (branches, info) = (branches?, info?);
        let default = info.default_branch.unwrap_or_default();

        Ok(branches
            .into_iter()
            .map(|b| Branch {
                is_default: b.name == default,
                name: b.name,
                sha: b.commit.id,
                protected: b.protected,
            })
            .collect())
    }

    async fn create_pr(
        &self,
        repo: &RepositoryRef,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let project = repo.full_name();
        tracing::debug!(provider = %PROVIDER, repo = %project, source = %request.source_branch, target = %request.target_branch, draft = request.draft, "creating merge request");

        let title = if request.draft && !has_draft_prefix(&request.title) {
            format!("{}{}", DRAFT_PREFIX, request.title)
        } else {
            request.title
        };

        let body = CreateMergeRequestBody {
            source_branch: request.source_branch,
            target_branch: request.target_branch,
            title,
            description: request.description,
        };

        let mr = self
            .api
            .create_merge_request(&project, &body)
            .await
            .map_err(fail(Operation::CreatePr, ResourceKind::Repository, &project))?;

        Ok(mr.into())
    }

    async fn get_pr(&self, repo: &RepositoryRef, number: u64) -> Result<PullRequest, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let project = repo.full_name();
        tracing::debug!(provider = %PROVIDER, repo = %project, number, "getting merge request");

        let identifier = number.to_string();
        let mr = self
            .api
            .get_merge_request(&project, number)
            .await
            .map_err(fail(Operation::GetPr, ResourceKind::PullRequest, &identifier))?;

        Ok(mr.into())
    }

    async fn list_prs(
        &self,
        repo: &RepositoryRef,
        opts: ListPrsOpts,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let project = repo.full_name();
        let limit = opts.effective_limit();
        tracing::debug!(provider = %PROVIDER, repo = %project, state = ?opts.state, limit, "listing merge requests");

        // GitLab's "closed" excludes merged, so fetch everything and filter
        let state = match opts.state {
            PrStateFilter::Open => "opened",
            PrStateFilter::Closed | PrStateFilter::All => "all",
        };

        let mrs = self
            .api
            .list_merge_requests(&project, state, limit)
            .await
            .map_err(fail(Operation::ListPrs, ResourceKind::Repository, &project))?;

        Ok(mrs
            .into_iter()
            .map(PullRequest::from)
            .filter(|pr| opts.state.matches(pr.state))
            .collect())
    }

    async fn commit_file(
        &self,
        repo: &RepositoryRef,
        request: CommitFileRequest,
    ) -> Result<CommitResult, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let op = Operation::CommitFile;
        let project = repo.full_name();
        tracing::debug!(provider = %PROVIDER, repo = %project, path = %request.path, branch = %request.branch, "committing file");

        let exists = match self
            .api
            .get_file(&project, &request.path, &request.branch)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(
                    provider = %PROVIDER,
                    path = %request.path,
                    status = ?err.status,
                    "file probe failed, treating as absent: {}",
                    err.message
                );
                false
            }
        };

        let body = FileWriteBody {
            branch: request.branch.clone(),
            content: request.content,
            commit_message: request.message.clone(),
        };

        let written = if exists {
            self.api.update_file(&project, &request.path, &body).await
        } else {
            self.api.create_file(&project, &request.path, &body).await
        };
        written.map_err(fail(op, ResourceKind::Branch, &request.branch))?;

        let tip = self
            .api
            .get_branch(&project, &request.branch)
            .await
            .map_err(fail(op, ResourceKind::Branch, &request.branch))?;

        Ok(CommitResult {
            sha: tip.commit.id,
            message: request.message,
        })
    }
}
