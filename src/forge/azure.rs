//! forge::azure
//!
//! Azure DevOps adapter.
//!
//! # Design
//!
//! [`AzureDevOpsForge`] implements [`Forge`] on top of an [`AzureDevOpsApi`]
//! client. Azure differs from the other two backends in several ways:
//!
//! - Repositories live inside a project. A [`RepositoryRef`] without one is
//!   rejected before any request. The organization comes from `orgUrl`, so
//!   `owner` is not used in requests.
//! - Branches are refs (`refs/heads/<name>`). Creation is a ref update whose
//!   old object id is forty zeros.
//! - Pull request status is numeric: 1 active, 2 abandoned, 3 completed.
//!   The backend's status filter only knows active vs. all, so a "closed"
//!   listing fetches all and keeps 2 and 3.
//! - A push must say whether a file is added or edited. `commit_file` tries
//!   `add` first and, on any failure, repeats the same push as `edit`
//!   against the same tip. This is the only retry anywhere in the crate and
//!   it is not idempotent if the first attempt partly landed.
//! - Branch policies are not read, so `protected` is always false.
//!
//! # Example
//!
//! ```ignore
//! use polyforge::forge::azure::AzureDevOpsForge;
//! use polyforge::forge::{Forge, RepositoryRef};
//!
//! let forge = AzureDevOpsForge::new("pat", "https://dev.azure.com/acme");
//! let repo = RepositoryRef::azure("acme", "Platform", "widgets");
//! let prs = forge.list_prs(&repo, Default::default()).await?;
//! ```

pub mod api;

use std::sync::Arc;

use async_trait::async_trait;

use self::api::{
    AzureDevOpsApi, AzureDevOpsClient, AzurePrStatus, AzurePullRequest, ChangeType,
    CreatePullRequestBody, PushBody, PushChange, PushCommit, PushContent, PushItem, PushRefUpdate,
    RefUpdate, ZERO_OBJECT_ID,
};
use super::error::{map_api_error, ForgeError, Operation, ResourceKind};
use super::http::ApiError;
use super::traits::Forge;
use super::types::{
    is_commit_sha, Branch, CommitFileRequest, CommitResult, CreateBranchRequest, CreatePrRequest,
    ListPrsOpts, PrState, PrStateFilter, Provider, PullRequest, RepositoryRef, MAX_PAGE_SIZE,
};

const PROVIDER: Provider = Provider::AzureDevOps;

/// Prefix of branch ref names.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Azure DevOps forge implementation.
pub struct AzureDevOpsForge {
    api: Arc<dyn AzureDevOpsApi>,
    /// Organization URL, used to build pull request web links
    org_url: String,
}

impl std::fmt::Debug for AzureDevOpsForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureDevOpsForge")
            .field("org_url", &self.org_url)
            .finish_non_exhaustive()
    }
}

impl AzureDevOpsForge {
    /// Create a forge for an organization, e.g. `https://dev.azure.com/acme`.
    pub fn new(token: impl Into<String>, org_url: impl Into<String>) -> Self {
        let client = AzureDevOpsClient::new(token, org_url);
        let org_url = client.org_url().to_string();
        Self::with_api(org_url, Arc::new(client))
    }

    /// Create a forge over any [`AzureDevOpsApi`] implementation.
    pub fn with_api(org_url: impl Into<String>, api: Arc<dyn AzureDevOpsApi>) -> Self {
        Self {
            api,
            org_url: org_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Web URL of a pull request.
    pub fn pr_web_url(&self, project: &str, repo: &str, id: u64) -> String {
        format!(
            "{}/{}/_git/{}/pullrequest/{}",
            self.org_url, project, repo, id
        )
    }

    fn to_pull_request(&self, project: &str, repo: &str, pr: AzurePullRequest) -> PullRequest {
        PullRequest {
            id: pr.pull_request_id,
            number: pr.pull_request_id,
            title: pr.title,
            description: pr.description,
            state: map_pr_status(pr.status),
            source_branch: strip_heads(&pr.source_ref_name).to_string(),
            target_branch: strip_heads(&pr.target_ref_name).to_string(),
            author: pr.created_by.map(|u| u.display_name).unwrap_or_default(),
            url: self.pr_web_url(project, repo, pr.pull_request_id),
            draft: pr.is_draft.unwrap_or(false),
            created_at: pr.creation_date,
            updated_at: pr.closed_date.unwrap_or(pr.creation_date),
        }
    }

    /// Resolve a branch name to its tip, matching the ref exactly.
    ///
    /// The refs filter is a prefix match, so `heads/main` also returns
    /// `refs/heads/main-old`.
    async fn resolve_branch(
        &self,
        project: &str,
        repo: &str,
        branch: &str,
        operation: Operation,
    ) -> Result<String, ForgeError> {
        let full = heads_ref(branch);
        let refs = self
            .api
            .list_refs(project, repo, &full["refs/".len()..], MAX_PAGE_SIZE)
            .await
            .map_err(fail(operation, ResourceKind::Branch, branch))?;

        refs.into_iter()
            .find(|r| r.name == full)
            .map(|r| r.object_id)
            .ok_or_else(|| ForgeError::not_found(PROVIDER, ResourceKind::Branch, branch))
    }

    async fn default_branch(
        &self,
        project: &str,
        repo: &str,
        operation: Operation,
        full_name: &str,
    ) -> Result<Option<String>, ForgeError> {
        let info = self
            .api
            .get_repository(project, repo)
            .await
            .map_err(fail(operation, ResourceKind::Repository, full_name))?;
        Ok(info.default_branch.map(|b| strip_heads(&b).to_string()))
    }

    async fn push_file(
        &self,
        project: &str,
        repo: &str,
        request: &CommitFileRequest,
        tip: &str,
        change_type: ChangeType,
    ) -> Result<api::AzurePush, ApiError> {
        let body = PushBody {
            ref_updates: vec![PushRefUpdate {
                name: heads_ref(&request.branch),
                old_object_id: tip.to_string(),
            }],
            commits: vec![PushCommit {
                comment: request.message.clone(),
                changes: vec![PushChange {
                    change_type,
                    item: PushItem {
                        path: rooted_path(&request.path),
                    },
                    new_content: PushContent {
                        content: request.content.clone(),
                        content_type: "rawtext".to_string(),
                    },
                }],
            }],
        };
        self.api.push(project, repo, &body).await
    }
}

fn fail(
    operation: Operation,
    resource: ResourceKind,
    identifier: &str,
) -> impl FnOnce(ApiError) -> ForgeError + '_ {
    move |err| map_api_error(PROVIDER, operation, (resource, identifier), err)
}

/// Normalize Azure's native pull request status.
pub fn map_pr_status(status: AzurePrStatus) -> PrState {
    match status {
        AzurePrStatus::Active => PrState::Open,
        AzurePrStatus::Completed => PrState::Merged,
        AzurePrStatus::Abandoned | AzurePrStatus::Other => PrState::Closed,
    }
}

/// Bare branch name from a `refs/heads/<name>` ref.
pub fn strip_heads(ref_name: &str) -> &str {
    ref_name.strip_prefix(HEADS_PREFIX).unwrap_or(ref_name)
}

/// Full ref name for a branch.
pub fn heads_ref(branch: &str) -> String {
    format!("{}{}", HEADS_PREFIX, strip_heads(branch))
}

fn rooted_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Project of an already-validated Azure reference.
fn project_of(repo: &RepositoryRef) -> &str {
    repo.project.as_deref().unwrap_or_default()
}

#[async_trait]
impl Forge for AzureDevOpsForge {
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
        let project = project_of(repo);
        let full_name = repo.full_name();
        tracing::debug!(provider = %PROVIDER, project = %project, repo = %repo.repo_name, branch = %request.name, from = %request.from_ref, "creating branch");

        let sha = if is_commit_sha(&request.from_ref) {
            request.from_ref.clone()
        } else {
            self.resolve_branch(project, &repo.repo_name, &request.from_ref, op)
                .await?
        };

        let update = RefUpdate {
            name: heads_ref(&request.name),
            old_object_id: ZERO_OBJECT_ID.to_string(),
            new_object_id: sha,
        };
        let results = self
            .api
            .update_refs(project, &repo.repo_name, std::slice::from_ref(&update))
            .await
            .map_err(fail(op, ResourceKind::Repository, &full_name))?;

        let result = results
            .into_iter()
            .next()
            .ok_or_else(|| ForgeError::generic(PROVIDER, op, "ref update returned no result"))?;

        if !result.success {
            let reason = result
                .custom_message
                .or(result.update_status)
                .unwrap_or_else(|| "ref update rejected".to_string());
            return Err(ForgeError::validation(
                PROVIDER,
                format!("cannot create branch '{}': {}", request.name, reason),
                Some("name"),
            ));
        }

        Ok(Branch {
            name: strip_heads(&result.name).to_string(),
            sha: result.new_object_id,
            is_default: false,
            protected: false,
        })
    }

    async fn get_branch(&self, repo: &RepositoryRef, name: &str) -> Result<Branch, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let op = Operation::GetBranch;
        let project = project_of(repo);
        let full_name = repo.full_name();
        tracing::debug!(provider = %PROVIDER, project = %project, repo = %repo.repo_name, branch = %name, "getting branch");

        // Both reads 404 when the repository is missing; the branch error wins
        let (sha, default) = tokio::join!(
            self.resolve_branch(project, &repo.repo_name, name, op),
            self.default_branch(project, &repo.repo_name, op, &full_name),
        );
        let (sha, default) = (sha?, default?);

        let name = strip_heads(name);
        Ok(Branch {
            name: name.to_string(),
            sha,
            is_default: default.as_deref() == Some(name),
            protected: false,
        })
    }

    async fn list_branches(&self, repo: &RepositoryRef) -> Result<Vec<Branch>, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let op = Operation::ListBranches;
        let project = project_of(repo);
        let full_name = repo.full_name();
        tracing::debug!(provider = %PROVIDER, project = %project, repo = %repo.repo_name, "listing branches");

        let refs = async {
            self.api
                .list_refs(project, &repo.repo_name, "heads/", MAX_PAGE_SIZE)
                .await
                .map_err(fail(op, ResourceKind::Repository, &full_name))
        };
        let (refs, default) = tokio::join!(
            refs,
            self.default_branch(project, &repo.repo_name, op, &full_name),
        );
        let (refs, default) = (refs?, default?);

        Ok(refs
            .into_iter()
            .map(|r| {
                let name = strip_heads(&r.name).to_string();
                Branch {
                    is_default: default.as_deref() == Some(name.as_str()),
                    name,
                    sha: r.object_id,
                    protected: false,
                }
            })
            .collect())
    }

    async fn create_pr(
        &self,
        repo: &RepositoryRef,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let project = project_of(repo);
        let full_name = repo.full_name();
        tracing::debug!(provider = %PROVIDER, project = %project, repo = %repo.repo_name, source = %request.source_branch, target = %request.target_branch, draft = request.draft, "creating pull request");

        let body = CreatePullRequestBody {
            source_ref_name: heads_ref(&request.source_branch),
            target_ref_name: heads_ref(&request.target_branch),
            title: request.title,
            description: request.description,
            is_draft: request.draft,
        };

        let pr = self
            .api
            .create_pull_request(project, &repo.repo_name, &body)
            .await
            .map_err(fail(Operation::CreatePr, ResourceKind::Repository, &full_name))?;

        Ok(self.to_pull_request(project, &repo.repo_name, pr))
    }

    async fn get_pr(&self, repo: &RepositoryRef, number: u64) -> Result<PullRequest, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let project = project_of(repo);
        tracing::debug!(provider = %PROVIDER, project = %project, repo = %repo.repo_name, number, "getting pull request");

        let identifier = number.to_string();
        let pr = self
            .api
            .get_pull_request(project, &repo.repo_name, number)
            .await
            .map_err(fail(Operation::GetPr, ResourceKind::PullRequest, &identifier))?;

        Ok(self.to_pull_request(project, &repo.repo_name, pr))
    }

    async fn list_prs(
        &self,
        repo: &RepositoryRef,
        opts: ListPrsOpts,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let project = project_of(repo);
        let full_name = repo.full_name();
        let limit = opts.effective_limit();
        tracing::debug!(provider = %PROVIDER, project = %project, repo = %repo.repo_name, state = ?opts.state, limit, "listing pull requests");

        let status = match opts.state {
            PrStateFilter::Open => "active",
            PrStateFilter::Closed | PrStateFilter::All => "all",
        };

        let prs = self
            .api
            .list_pull_requests(project, &repo.repo_name, status, limit)
            .await
            .map_err(fail(Operation::ListPrs, ResourceKind::Repository, &full_name))?;

        Ok(prs
            .into_iter()
            .filter(|pr| match opts.state {
                PrStateFilter::Closed => matches!(
                    pr.status,
                    AzurePrStatus::Abandoned | AzurePrStatus::Completed
                ),
                PrStateFilter::Open | PrStateFilter::All => true,
            })
            .map(|pr| self.to_pull_request(project, &repo.repo_name, pr))
            .collect())
    }

    async fn commit_file(
        &self,
        repo: &RepositoryRef,
        request: CommitFileRequest,
    ) -> Result<CommitResult, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let op = Operation::CommitFile;
        let project = project_of(repo);
        tracing::debug!(provider = %PROVIDER, project = %project, repo = %repo.repo_name, path = %request.path, branch = %request.branch, "committing file");

        let tip = self
            .resolve_branch(project, &repo.repo_name, &request.branch, op)
            .await?;

        let pushed = match self
            .push_file(project, &repo.repo_name, &request, &tip, ChangeType::Add)
            .await
        {
            Ok(pushed) => pushed,
            Err(err) => {
                tracing::warn!(
                    provider = %PROVIDER,
                    path = %request.path,
                    status = ?err.status,
                    "add push failed, retrying as edit: {}",
                    err.message
                );
                self.push_file(project, &repo.repo_name, &request, &tip, ChangeType::Edit)
                    .await
                    .map_err(fail(op, ResourceKind::Branch, &request.branch))?
            }
        };

        let commit = pushed
            .commits
            .into_iter()
            .next()
            .ok_or_else(|| ForgeError::generic(PROVIDER, op, "push returned no commit"))?;

        Ok(CommitResult {
            sha: commit.commit_id,
            message: if commit.comment.is_empty() {
                request.message
            } else {
                commit.comment
            },
        })
    }
}
