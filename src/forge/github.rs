//! forge::github
//!
//! GitHub adapter.
//!
//! # Design
//!
//! [`GitHubForge`] implements [`Forge`] on top of a [`GitHubApi`] client and
//! maps GitHub's shapes into the normalized model:
//!
//! - Branch detail and list carry `protected` inline, but default-branch
//!   membership needs a separate repository read. The two reads run
//!   concurrently and are joined with no consistency guarantee.
//! - `draft` is a native field.
//! - A PR is `merged` when GitHub says `merged: true` or has a `merged_at`
//!   timestamp (the list endpoint omits `merged`). Merged wins over the raw
//!   `closed` state.
//!
//! # Example
//!
//! ```ignore
//! use polyforge::forge::github::GitHubForge;
//! use polyforge::forge::{Forge, Provider, RepositoryRef};
//!
//! let forge = GitHubForge::new("ghp_xxx");
//! let repo = RepositoryRef::new(Provider::GitHub, "octocat", "hello-world");
//! let branches = forge.list_branches(&repo).await?;
//! ```

pub mod api;

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;

use self::api::{CreatePullBody, GitHubApi, GitHubClient, GitHubPullRequest, PutContentsBody};
use super::error::{map_api_error, ForgeError, Operation, ResourceKind};
use super::http::ApiError;
use super::traits::Forge;
use super::types::{
    is_commit_sha, Branch, CommitFileRequest, CommitResult, CreateBranchRequest, CreatePrRequest,
    ListPrsOpts, PrState, PrStateFilter, Provider, PullRequest, RepositoryRef, MAX_PAGE_SIZE,
};

const PROVIDER: Provider = Provider::GitHub;

/// GitHub forge implementation.
pub struct GitHubForge {
    api: Arc<dyn GitHubApi>,
}

impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge").finish_non_exhaustive()
    }
}

impl GitHubForge {
    /// Create a forge for api.github.com.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api(Arc::new(GitHubClient::new(token)))
    }

    /// Create a forge with a custom API base URL (GitHub Enterprise).
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self::with_api(Arc::new(GitHubClient::with_api_base(token, api_base)))
    }

    /// Create a forge over any [`GitHubApi`] implementation.
    pub fn with_api(api: Arc<dyn GitHubApi>) -> Self {
        Self { api }
    }
}

/// Error mapper for one call site.
fn fail(
    operation: Operation,
    resource: ResourceKind,
    identifier: &str,
) -> impl FnOnce(ApiError) -> ForgeError + '_ {
    move |err| map_api_error(PROVIDER, operation, (resource, identifier), err)
}

/// Normalize GitHub's open/closed + merged flag.
pub fn map_pr_state(state: &str, merged: bool) -> PrState {
    if merged {
        PrState::Merged
    } else if state == "closed" {
        PrState::Closed
    } else {
        PrState::Open
    }
}

impl From<GitHubPullRequest> for PullRequest {
    fn from(pr: GitHubPullRequest) -> Self {
        let merged = pr.merged.unwrap_or(false) || pr.merged_at.is_some();

        PullRequest {
            id: pr.id,
            number: pr.number,
            title: pr.title,
            description: pr.body,
            state: map_pr_state(&pr.state, merged),
            source_branch: pr.head.ref_name,
            target_branch: pr.base.ref_name,
            author: pr.user.map(|u| u.login).unwrap_or_default(),
            url: pr.html_url,
            draft: pr.draft.unwrap_or(false),
            created_at: pr.created_at,
            updated_at: pr.updated_at,
        }
    }
}

#[async_trait]
impl Forge for GitHubForge {
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
        let full_name = repo.full_name();
        tracing::debug!(provider = %PROVIDER, repo = %full_name, branch = %request.name, from = %request.from_ref, "creating branch");

        let sha = if is_commit_sha(&request.from_ref) {
            request.from_ref.clone()
        } else {
            self.api
                .get_ref(&repo.owner, &repo.repo_name, &request.from_ref)
                .await
                .map_err(fail(op, ResourceKind::Branch, &request.from_ref))?
                .object
                .sha
        };

        let ref_name = format!("refs/heads/{}", request.name);
        let created = self
            .api
            .create_ref(&repo.owner, &repo.repo_name, &ref_name, &sha)
            .await
            .map_err(fail(op, ResourceKind::Repository, &full_name))?;

        Ok(Branch {
            name: request.name,
            sha: created.object.sha,
            is_default: false,
            protected: false,
        })
    }

    async fn get_branch(&self, repo: &RepositoryRef, name: &str) -> Result<Branch, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let op = Operation::GetBranch;
        let full_name = repo.full_name();
        tracing::debug!(provider = %PROVIDER, repo = %full_name, branch = %name, "getting branch");

        let branch = async {
            self.api
                .get_branch(&repo.owner, &repo.repo_name, name)
                .await
                .map_err(fail(op, ResourceKind::Branch, name))
        };
        let info = async {
            self.api
                .get_repo(&repo.owner, &repo.repo_name)
                .await
                .map_err(fail(op, ResourceKind::Repository, &full_name))
        };
        // Both reads 404 when the repository is missing; the branch error wins
        let (branch, info) = tokio::join!(branch, info);
        let (branch, info) = (branch?, info?);

        Ok(Branch {
            is_default: branch.name == info.default_branch,
            name: branch.name,
            sha: branch.commit.sha,
            protected: branch.protected,
        })
    }

    async fn list_branches(&self, repo: &RepositoryRef) -> Result<Vec<Branch>, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let op = Operation::ListBranches;
        let full_name = repo.full_name();
        tracing::debug!(provider = %PROVIDER, repo = %full_name, "listing branches");

        let branches = async {
            self.api
                .list_branches(&repo.owner, &repo.repo_name, MAX_PAGE_SIZE)
                .await
                .map_err(fail(op, ResourceKind::Repository, &full_name))
        };
        let info = async {
            self.api
                .get_repo(&repo.owner, &repo.repo_name)
                .await
                .map_err(fail(op, ResourceKind::Repository, &full_name))
        };
        let (branches, info) = tokio::join!(branches, info);
        let (branches, info) = (branches?, info?);

        Ok(branches
            .into_iter()
            .map(|b| Branch {
                is_default: b.name == info.default_branch,
                name: b.name,
                sha: b.commit.sha,
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
        let full_name = repo.full_name();
        tracing::debug!(provider = %PROVIDER, repo = %full_name, source = %request.source_branch, target = %request.target_branch, draft = request.draft, "creating pull request");

        let body = CreatePullBody {
            title: request.title,
            head: request.source_branch,
            base: request.target_branch,
            body: request.description,
            draft: request.draft,
        };

        let pr = self
            .api
            .create_pull(&repo.owner, &repo.repo_name, &body)
            .await
            .map_err(fail(Operation::CreatePr, ResourceKind::Repository, &full_name))?;

        Ok(pr.into())
    }

    async fn get_pr(&self, repo: &RepositoryRef, number: u64) -> Result<PullRequest, ForgeError> {
        repo.validate_for(PROVIDER)?;
        tracing::debug!(provider = %PROVIDER, repo = %repo.full_name(), number, "getting pull request");

        let identifier = number.to_string();
        let pr = self
            .api
            .get_pull(&repo.owner, &repo.repo_name, number)
            .await
            .map_err(fail(Operation::GetPr, ResourceKind::PullRequest, &identifier))?;

        Ok(pr.into())
    }

    async fn list_prs(
        &self,
        repo: &RepositoryRef,
        opts: ListPrsOpts,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let full_name = repo.full_name();
        let limit = opts.effective_limit();
        tracing::debug!(provider = %PROVIDER, repo = %full_name, state = ?opts.state, limit, "listing pull requests");

        // GitHub's own "closed" already includes merged PRs
        let state = match opts.state {
            PrStateFilter::Open => "open",
            PrStateFilter::Closed => "closed",
            PrStateFilter::All => "all",
        };

        let prs = self
            .api
            .list_pulls(&repo.owner, &repo.repo_name, state, limit)
            .await
            .map_err(fail(Operation::ListPrs, ResourceKind::Repository, &full_name))?;

        Ok(prs.into_iter().map(Into::into).collect())
    }

    async fn commit_file(
        &self,
        repo: &RepositoryRef,
        request: CommitFileRequest,
    ) -> Result<CommitResult, ForgeError> {
        repo.validate_for(PROVIDER)?;
        let op = Operation::CommitFile;
        tracing::debug!(provider = %PROVIDER, repo = %repo.full_name(), path = %request.path, branch = %request.branch, "committing file");

        // Updating an existing file requires its current blob sha
        let existing = match self
            .api
            .get_contents(&repo.owner, &repo.repo_name, &request.path, &request.branch)
            .await
        {
            Ok(content) => Some(content.sha),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(fail(op, ResourceKind::Branch, &request.branch)(err)),
        };

        let body = PutContentsBody {
            message: request.message,
            content: base64::engine::general_purpose::STANDARD.encode(request.content.as_bytes()),
            branch: request.branch.clone(),
            sha: existing,
        };

        let written = self
            .api
            .put_contents(&repo.owner, &repo.repo_name, &request.path, &body)
            .await
            .map_err(fail(op, ResourceKind::Branch, &request.branch))?;

        Ok(CommitResult {
            sha: written.commit.sha,
            message: written.commit.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::api::*;
    use super::*;
    use crate::forge::ErrorClass;
    use std::sync::Mutex;

    const TIP: &str = "1111111111111111111111111111111111111111";
    const OTHER: &str = "abcdefabcdefabcdefabcdefabcdefabcdefabcd";

    fn ts() -> chrono::DateTime<chrono::Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    fn gh_pr(number: u64, state: &str, merged: Option<bool>) -> GitHubPullRequest {
        GitHubPullRequest {
            id: 9000 + number,
            number,
            title: "Add feature".to_string(),
            body: Some("PR description".to_string()),
            state: state.to_string(),
            merged,
            merged_at: None,
            draft: Some(false),
            head: GitHubPrRef {
                ref_name: "feature".to_string(),
            },
            base: GitHubPrRef {
                ref_name: "main".to_string(),
            },
            user: Some(GitHubUser {
                login: "octocat".to_string(),
            }),
            html_url: format!("https://github.com/owner/repo/pull/{}", number),
            created_at: ts(),
            updated_at: ts(),
        }
    }

    /// Scripted GitHub client that records every call.
    #[derive(Default)]
    struct FakeGitHub {
        calls: Mutex<Vec<&'static str>>,
        fail_with: Option<ApiError>,
        contents_error: Option<ApiError>,
        put_body: Mutex<Option<PutContentsBody>>,
    }

    impl FakeGitHub {
        fn failing(err: ApiError) -> Self {
            Self {
                fail_with: Some(err),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn hit(&self, call: &'static str) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(call);
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl GitHubApi for FakeGitHub {
        async fn get_repo(&self, _owner: &str, _repo: &str) -> Result<GitHubRepo, ApiError> {
            self.hit("get_repo")?;
            Ok(GitHubRepo {
                default_branch: "main".to_string(),
            })
        }

        async fn get_ref(
            &self,
            _owner: &str,
            _repo: &str,
            branch: &str,
        ) -> Result<GitHubGitRef, ApiError> {
            self.hit("get_ref")?;
            if branch == "missing" {
                return Err(ApiError::status(404, "Not Found"));
            }
            Ok(GitHubGitRef {
                ref_name: format!("refs/heads/{}", branch),
                object: GitHubObject {
                    sha: TIP.to_string(),
                },
            })
        }

        async fn create_ref(
            &self,
            _owner: &str,
            _repo: &str,
            ref_name: &str,
            sha: &str,
        ) -> Result<GitHubGitRef, ApiError> {
            self.hit("create_ref")?;
            if ref_name == "refs/heads/main" {
                return Err(ApiError::status(422, "Reference already exists"));
            }
            Ok(GitHubGitRef {
                ref_name: ref_name.to_string(),
                object: GitHubObject {
                    sha: sha.to_string(),
                },
            })
        }

        async fn get_branch(
            &self,
            _owner: &str,
            _repo: &str,
            branch: &str,
        ) -> Result<GitHubBranch, ApiError> {
            self.hit("get_branch")?;
            if branch == "missing" {
                return Err(ApiError::status(404, "Branch not found"));
            }
            Ok(GitHubBranch {
                name: branch.to_string(),
                commit: GitHubObject {
                    sha: TIP.to_string(),
                },
                protected: branch == "main",
            })
        }

        async fn list_branches(
            &self,
            _owner: &str,
            _repo: &str,
            _per_page: usize,
        ) -> Result<Vec<GitHubBranch>, ApiError> {
            self.hit("list_branches")?;
            Ok(vec![
                GitHubBranch {
                    name: "main".to_string(),
                    commit: GitHubObject {
                        sha: TIP.to_string(),
                    },
                    protected: true,
                },
                GitHubBranch {
                    name: "feature".to_string(),
                    commit: GitHubObject {
                        sha: OTHER.to_string(),
                    },
                    protected: false,
                },
            ])
        }

        async fn create_pull(
            &self,
            _owner: &str,
            _repo: &str,
            body: &CreatePullBody,
        ) -> Result<GitHubPullRequest, ApiError> {
            self.hit("create_pull")?;
            let mut pr = gh_pr(7, "open", Some(false));
            pr.title = body.title.clone();
            pr.draft = Some(body.draft);
            Ok(pr)
        }

        async fn get_pull(
            &self,
            _owner: &str,
            _repo: &str,
            number: u64,
        ) -> Result<GitHubPullRequest, ApiError> {
            self.hit("get_pull")?;
            if number == 404 {
                return Err(ApiError::status(404, "Not Found"));
            }
            Ok(gh_pr(number, "closed", Some(true)))
        }

        async fn list_pulls(
            &self,
            _owner: &str,
            _repo: &str,
            _state: &str,
            _per_page: usize,
        ) -> Result<Vec<GitHubPullRequest>, ApiError> {
            self.hit("list_pulls")?;
            Ok(vec![gh_pr(1, "open", None), gh_pr(2, "open", None)])
        }

        async fn get_contents(
            &self,
            _owner: &str,
            _repo: &str,
            _path: &str,
            _branch: &str,
        ) -> Result<GitHubContent, ApiError> {
            self.hit("get_contents")?;
            match &self.contents_error {
                Some(err) => Err(err.clone()),
                None => Ok(GitHubContent {
                    sha: "blobsha".to_string(),
                }),
            }
        }

        async fn put_contents(
            &self,
            _owner: &str,
            _repo: &str,
            _path: &str,
            body: &PutContentsBody,
        ) -> Result<GitHubContentCommit, ApiError> {
            self.hit("put_contents")?;
            *self.put_body.lock().unwrap() = Some(body.clone());
            Ok(GitHubContentCommit {
                commit: GitHubCommit {
                    sha: OTHER.to_string(),
                    message: body.message.clone(),
                },
            })
        }
    }

    fn repo() -> RepositoryRef {
        RepositoryRef::new(Provider::GitHub, "owner", "repo")
    }

    fn forge(fake: Arc<FakeGitHub>) -> GitHubForge {
        GitHubForge::with_api(fake)
    }

    mod pr_state {
        use super::*;

        #[test]
        fn merged_flag_beats_closed() {
            assert_eq!(map_pr_state("closed", true), PrState::Merged);
        }

        #[test]
        fn closed_without_merge() {
            assert_eq!(map_pr_state("closed", false), PrState::Closed);
        }

        #[test]
        fn open() {
            assert_eq!(map_pr_state("open", false), PrState::Open);
        }

        #[test]
        fn from_merged_pr() {
            let pr: PullRequest = gh_pr(42, "closed", Some(true)).into();
            assert_eq!(pr.state, PrState::Merged);
        }

        #[test]
        fn from_list_item_with_merged_at() {
            let mut gh = gh_pr(42, "closed", None);
            gh.merged_at = Some(ts());
            let pr: PullRequest = gh.into();
            assert_eq!(pr.state, PrState::Merged);
        }

        #[test]
        fn from_open_pr_maps_every_field() {
            let pr: PullRequest = gh_pr(42, "open", Some(false)).into();
            assert_eq!(pr.id, 9042);
            assert_eq!(pr.number, 42);
            assert_eq!(pr.url, "https://github.com/owner/repo/pull/42");
            assert_eq!(pr.state, PrState::Open);
            assert!(!pr.draft);
            assert_eq!(pr.source_branch, "feature");
            assert_eq!(pr.target_branch, "main");
            assert_eq!(pr.author, "octocat");
            assert_eq!(pr.description, Some("PR description".to_string()));
        }

        #[test]
        fn missing_draft_defaults_false() {
            let mut gh = gh_pr(1, "open", None);
            gh.draft = None;
            let pr: PullRequest = gh.into();
            assert!(!pr.draft);
        }
    }

    mod branches {
        use super::*;

        #[tokio::test]
        async fn create_from_branch_name_resolves_first() {
            let fake = Arc::new(FakeGitHub::default());
            let branch = forge(fake.clone())
                .create_branch(
                    &repo(),
                    CreateBranchRequest {
                        name: "feature-x".into(),
                        from_ref: "main".into(),
                    },
                )
                .await
                .unwrap();

            assert_eq!(fake.calls(), vec!["get_ref", "create_ref"]);
            assert_eq!(branch.sha, TIP);
            assert_eq!(branch.name, "feature-x");
            assert!(!branch.is_default);
        }

        #[tokio::test]
        async fn create_from_sha_skips_resolution() {
            let fake = Arc::new(FakeGitHub::default());
            let branch = forge(fake.clone())
                .create_branch(
                    &repo(),
                    CreateBranchRequest {
                        name: "feature-x".into(),
                        from_ref: OTHER.into(),
                    },
                )
                .await
                .unwrap();

            assert_eq!(fake.calls(), vec!["create_ref"]);
            assert_eq!(branch.sha, OTHER);
        }

        #[tokio::test]
        async fn create_from_unknown_ref_is_not_found() {
            let fake = Arc::new(FakeGitHub::default());
            let err = forge(fake.clone())
                .create_branch(
                    &repo(),
                    CreateBranchRequest {
                        name: "feature-x".into(),
                        from_ref: "missing".into(),
                    },
                )
                .await
                .unwrap_err();

            match err {
                ForgeError::NotFound {
                    resource,
                    identifier,
                    ..
                } => {
                    assert_eq!(resource, ResourceKind::Branch);
                    assert_eq!(identifier, "missing");
                }
                other => panic!("expected NotFound, got {:?}", other),
            }
            assert_eq!(fake.calls(), vec!["get_ref"]);
        }

        #[tokio::test]
        async fn create_existing_is_validation() {
            let fake = Arc::new(FakeGitHub::default());
            let err = forge(fake)
                .create_branch(
                    &repo(),
                    CreateBranchRequest {
                        name: "main".into(),
                        from_ref: TIP.into(),
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorClass::Validation);
        }

        #[tokio::test]
        async fn get_joins_detail_and_default() {
            let fake = Arc::new(FakeGitHub::default());
            let branch = forge(fake.clone()).get_branch(&repo(), "main").await.unwrap();

            assert!(branch.is_default);
            assert!(branch.protected);
            let mut calls = fake.calls();
            calls.sort();
            assert_eq!(calls, vec!["get_branch", "get_repo"]);
        }

        #[tokio::test]
        async fn get_missing_is_not_found_with_name() {
            let fake = Arc::new(FakeGitHub::default());
            let err = forge(fake).get_branch(&repo(), "missing").await.unwrap_err();
            assert!(matches!(
                err,
                ForgeError::NotFound { resource: ResourceKind::Branch, ref identifier, .. } if identifier == "missing"
            ));
        }

        #[tokio::test]
        async fn list_marks_only_default() {
            let fake = Arc::new(FakeGitHub::default());
            let branches = forge(fake).list_branches(&repo()).await.unwrap();

            assert_eq!(branches.len(), 2);
            assert_eq!(branches[0].name, "main");
            assert!(branches[0].is_default);
            assert!(branches[0].protected);
            assert!(!branches[1].is_default);
            assert!(!branches[1].protected);
        }
    }

    mod pull_requests {
        use super::*;

        #[tokio::test]
        async fn create_passes_draft_natively() {
            let fake = Arc::new(FakeGitHub::default());
            let pr = forge(fake)
                .create_pr(
                    &repo(),
                    CreatePrRequest {
                        title: "Add feature".into(),
                        description: None,
                        source_branch: "feature".into(),
                        target_branch: "main".into(),
                        draft: true,
                    },
                )
                .await
                .unwrap();
            assert!(pr.draft);
            assert_eq!(pr.title, "Add feature");
        }

        #[tokio::test]
        async fn get_missing_is_not_found_with_number() {
            let fake = Arc::new(FakeGitHub::default());
            let err = forge(fake).get_pr(&repo(), 404).await.unwrap_err();
            assert!(matches!(
                err,
                ForgeError::NotFound { resource: ResourceKind::PullRequest, ref identifier, .. } if identifier == "404"
            ));
        }

        #[tokio::test]
        async fn list_maps_all() {
            let fake = Arc::new(FakeGitHub::default());
            let prs = forge(fake).list_prs(&repo(), ListPrsOpts::default()).await.unwrap();
            assert_eq!(prs.len(), 2);
            assert!(prs.iter().all(|p| p.state == PrState::Open));
        }
    }

    mod commit_file {
        use super::*;

        fn request() -> CommitFileRequest {
            CommitFileRequest {
                path: "docs/README.md".into(),
                content: "hello".into(),
                message: "Update readme".into(),
                branch: "feature".into(),
            }
        }

        #[tokio::test]
        async fn update_sends_existing_sha() {
            let fake = Arc::new(FakeGitHub::default());
            let result = forge(fake.clone()).commit_file(&repo(), request()).await.unwrap();

            assert_eq!(result.sha, OTHER);
            assert_eq!(result.message, "Update readme");
            let body = fake.put_body.lock().unwrap().clone().unwrap();
            assert_eq!(body.sha.as_deref(), Some("blobsha"));
            assert_eq!(body.content, "aGVsbG8=");
        }

        #[tokio::test]
        async fn create_when_absent() {
            let fake = Arc::new(FakeGitHub {
                contents_error: Some(ApiError::status(404, "Not Found")),
                ..Default::default()
            });
            forge(fake.clone()).commit_file(&repo(), request()).await.unwrap();

            let body = fake.put_body.lock().unwrap().clone().unwrap();
            assert!(body.sha.is_none());
            assert_eq!(fake.calls(), vec!["get_contents", "put_contents"]);
        }

        #[tokio::test]
        async fn probe_failure_other_than_404_propagates() {
            let fake = Arc::new(FakeGitHub {
                contents_error: Some(ApiError::status(401, "Bad credentials")),
                ..Default::default()
            });
            let err = forge(fake.clone()).commit_file(&repo(), request()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorClass::Authentication);
            assert_eq!(fake.calls(), vec!["get_contents"]);
        }
    }

    mod error_mapping {
        use super::*;

        #[tokio::test]
        async fn unauthorized_is_authentication() {
            let fake = Arc::new(FakeGitHub::failing(ApiError::status(401, "Bad credentials")));
            let err = forge(fake).list_branches(&repo()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorClass::Authentication);
            assert_eq!(err.provider(), Provider::GitHub);
        }

        #[tokio::test]
        async fn too_many_requests_is_rate_limit() {
            let fake = Arc::new(FakeGitHub::failing(
                ApiError::status(429, "slow down").with_retry_after(Some(60)),
            ));
            let err = forge(fake).get_pr(&repo(), 1).await.unwrap_err();
            assert!(matches!(
                err,
                ForgeError::RateLimit {
                    retry_after: Some(60),
                    ..
                }
            ));
        }

        #[tokio::test]
        async fn server_error_is_generic_with_operation() {
            let fake = Arc::new(FakeGitHub::failing(ApiError::status(502, "Bad Gateway")));
            let err = forge(fake)
                .list_prs(&repo(), ListPrsOpts::default())
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ForgeError::Generic {
                    operation: Operation::ListPrs,
                    ..
                }
            ));
        }

        #[tokio::test]
        async fn wrong_provider_makes_no_call() {
            let fake = Arc::new(FakeGitHub::default());
            let other = RepositoryRef::new(Provider::GitLab, "owner", "repo");
            let err = forge(fake.clone()).list_branches(&other).await.unwrap_err();
            assert_eq!(err.kind(), ErrorClass::Validation);
            assert!(fake.calls().is_empty());
        }
    }
}
