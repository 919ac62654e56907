//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge is an in-memory [`Forge`] for testing code that sits on
//! top of the adapters. It keeps branches, pull requests and committed
//! files, validates [`RepositoryRef`]s the same way the real adapters do,
//! and can be told to fail one operation with a chosen [`ForgeError`].
//! Every call is recorded.
//!
//! Commit ids are deterministic: the n-th commit the mock makes is `n`
//! rendered as forty hex digits.
//!
//! # Example
//!
//! ```
//! use polyforge::forge::mock::MockForge;
//! use polyforge::forge::{CreatePrRequest, Forge, PrState, Provider, RepositoryRef};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let forge = MockForge::new().with_branch("main", true).with_branch("feature", false);
//! let repo = RepositoryRef::new(Provider::GitHub, "owner", "repo");
//!
//! let pr = forge.create_pr(&repo, CreatePrRequest {
//!     title: "Add feature".to_string(),
//!     description: None,
//!     source_branch: "feature".to_string(),
//!     target_branch: "main".to_string(),
//!     draft: false,
//! }).await.unwrap();
//!
//! assert_eq!(pr.number, 1);
//! assert_eq!(pr.state, PrState::Open);
//!
//! let retrieved = forge.get_pr(&repo, 1).await.unwrap();
//! assert_eq!(retrieved.title, "Add feature");
//! # });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::error::{ForgeError, Operation, ResourceKind};
use super::traits::Forge;
use super::types::{
    is_commit_sha, Branch, CommitFileRequest, CommitResult, CreateBranchRequest, CreatePrRequest,
    ListPrsOpts, PrState, PrStateFilter, Provider, PullRequest, RepositoryRef,
};

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockForge {
    provider: Provider,
    inner: Arc<Mutex<MockForgeInner>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockForgeInner {
    /// Branches in insertion order.
    branches: Vec<Branch>,
    /// Stored PRs by number.
    prs: BTreeMap<u64, PullRequest>,
    /// File contents by (branch, path).
    files: HashMap<(String, String), String>,
    /// Commits made so far.
    commit_count: u64,
    /// Method to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    CreateBranch(ForgeError),
    GetBranch(ForgeError),
    ListBranches(ForgeError),
    CreatePr(ForgeError),
    GetPr(ForgeError),
    ListPrs(ForgeError),
    CommitFile(ForgeError),
}

impl FailOn {
    /// The operation this failure applies to.
    pub fn operation(&self) -> Operation {
        match self {
            FailOn::CreateBranch(_) => Operation::CreateBranch,
            FailOn::GetBranch(_) => Operation::GetBranch,
            FailOn::ListBranches(_) => Operation::ListBranches,
            FailOn::CreatePr(_) => Operation::CreatePr,
            FailOn::GetPr(_) => Operation::GetPr,
            FailOn::ListPrs(_) => Operation::ListPrs,
            FailOn::CommitFile(_) => Operation::CommitFile,
        }
    }

    fn error(&self) -> &ForgeError {
        match self {
            FailOn::CreateBranch(e)
            | FailOn::GetBranch(e)
            | FailOn::ListBranches(e)
            | FailOn::CreatePr(e)
            | FailOn::GetPr(e)
            | FailOn::ListPrs(e)
            | FailOn::CommitFile(e) => e,
        }
    }
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    CreateBranch {
        name: String,
        from_ref: String,
    },
    GetBranch {
        name: String,
    },
    ListBranches,
    CreatePr {
        source_branch: String,
        target_branch: String,
        title: String,
        draft: bool,
    },
    GetPr {
        number: u64,
    },
    ListPrs {
        state: PrStateFilter,
        limit: usize,
    },
    CommitFile {
        path: String,
        branch: String,
        message: String,
    },
}

fn sha_for(n: u64) -> String {
    format!("{:040x}", n)
}

impl MockForge {
    /// Create a new empty mock forge that reports itself as GitHub.
    pub fn new() -> Self {
        Self::for_provider(Provider::GitHub)
    }

    /// Create a new empty mock forge for a provider.
    ///
    /// The provider decides which [`RepositoryRef`]s are accepted, so an
    /// Azure DevOps mock rejects references without a project.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            inner: Arc::new(Mutex::new(MockForgeInner::default())),
        }
    }

    /// Add a branch with a fresh commit.
    pub fn with_branch(self, name: &str, is_default: bool) -> Self {
        {
            let mut inner = self.lock();
            inner.commit_count += 1;
            let sha = sha_for(inner.commit_count);
            inner.branches.push(Branch {
                name: name.to_string(),
                sha,
                is_default,
                protected: is_default,
            });
        }
        self
    }

    /// Add pre-existing PRs. New PRs are numbered after the highest one.
    pub fn with_prs(self, prs: Vec<PullRequest>) -> Self {
        {
            let mut inner = self.lock();
            inner.prs.extend(prs.into_iter().map(|p| (p.number, p)));
        }
        self
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// # Example
    ///
    /// ```
    /// use polyforge::forge::mock::{FailOn, MockForge};
    /// use polyforge::forge::{ForgeError, Provider};
    ///
    /// let forge = MockForge::new().fail_on(FailOn::CreatePr(ForgeError::RateLimit {
    ///     provider: Provider::GitHub,
    ///     retry_after: Some(30),
    /// }));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.lock().fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }

    /// Get all PRs ordered by number (for test verification).
    pub fn all_prs(&self) -> Vec<PullRequest> {
        self.lock().prs.values().cloned().collect()
    }

    /// Content of a committed file (for test verification).
    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        self.lock()
            .files
            .get(&(branch.to_string(), path.to_string()))
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MockForgeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate, record, then apply any configured failure.
    fn enter(
        &self,
        repo: &RepositoryRef,
        op: MockOperation,
        operation: Operation,
    ) -> Result<MutexGuard<'_, MockForgeInner>, ForgeError> {
        repo.validate_for(self.provider)?;
        let mut inner = self.lock();
        inner.operations.push(op);
        let failure = inner
            .fail_on
            .as_ref()
            .filter(|fail| fail.operation() == operation)
            .map(|fail| fail.error().clone());
        match failure {
            Some(err) => Err(err),
            None => Ok(inner),
        }
    }

    fn not_found(&self, resource: ResourceKind, identifier: impl Into<String>) -> ForgeError {
        ForgeError::not_found(self.provider, resource, identifier)
    }
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockForgeInner {
    fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.name == name)
    }

    fn next_sha(&mut self) -> String {
        self.commit_count += 1;
        sha_for(self.commit_count)
    }
}

#[async_trait]
impl Forge for MockForge {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn create_branch(
        &self,
        repo: &RepositoryRef,
        request: CreateBranchRequest,
    ) -> Result<Branch, ForgeError> {
        let mut inner = self.enter(
            repo,
            MockOperation::CreateBranch {
                name: request.name.clone(),
                from_ref: request.from_ref.clone(),
            },
            Operation::CreateBranch,
        )?;

        let sha = if is_commit_sha(&request.from_ref) {
            request.from_ref.clone()
        } else {
            inner
                .branch(&request.from_ref)
                .map(|b| b.sha.clone())
                .ok_or_else(|| self.not_found(ResourceKind::Branch, &request.from_ref))?
        };

        if inner.branch(&request.name).is_some() {
            return Err(ForgeError::validation(
                self.provider,
                format!("branch '{}' already exists", request.name),
                Some("name"),
            ));
        }

        let branch = Branch {
            name: request.name,
            sha,
            is_default: false,
            protected: false,
        };
        inner.branches.push(branch.clone());
        Ok(branch)
    }

    async fn get_branch(&self, repo: &RepositoryRef, name: &str) -> Result<Branch, ForgeError> {
        let inner = self.enter(
            repo,
            MockOperation::GetBranch {
                name: name.to_string(),
            },
            Operation::GetBranch,
        )?;
        inner
            .branch(name)
            .cloned()
            .ok_or_else(|| self.not_found(ResourceKind::Branch, name))
    }

    async fn list_branches(&self, repo: &RepositoryRef) -> Result<Vec<Branch>, ForgeError> {
        let inner = self.enter(repo, MockOperation::ListBranches, Operation::ListBranches)?;
        Ok(inner.branches.clone())
    }

    async fn create_pr(
        &self,
        repo: &RepositoryRef,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError> {
        let mut inner = self.enter(
            repo,
            MockOperation::CreatePr {
                source_branch: request.source_branch.clone(),
                target_branch: request.target_branch.clone(),
                title: request.title.clone(),
                draft: request.draft,
            },
            Operation::CreatePr,
        )?;

        if request.source_branch == request.target_branch {
            return Err(ForgeError::validation(
                self.provider,
                "source and target branch are the same",
                Some("source_branch"),
            ));
        }

        let number = inner.prs.keys().next_back().copied().unwrap_or(0) + 1;
        let now = Utc::now();
        let pr = PullRequest {
            id: 1000 + number,
            number,
            title: request.title,
            description: request.description,
            state: PrState::Open,
            source_branch: request.source_branch,
            target_branch: request.target_branch,
            author: "mock".to_string(),
            url: format!(
                "https://{}.example.com/{}/pulls/{}",
                self.provider,
                repo.full_name(),
                number
            ),
            draft: request.draft,
            created_at: now,
            updated_at: now,
        };

        inner.prs.insert(number, pr.clone());
        Ok(pr)
    }

    async fn get_pr(&self, repo: &RepositoryRef, number: u64) -> Result<PullRequest, ForgeError> {
        let inner = self.enter(repo, MockOperation::GetPr { number }, Operation::GetPr)?;
        inner
            .prs
            .get(&number)
            .cloned()
            .ok_or_else(|| self.not_found(ResourceKind::PullRequest, number.to_string()))
    }

    async fn list_prs(
        &self,
        repo: &RepositoryRef,
        opts: ListPrsOpts,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        let limit = opts.effective_limit();
        let inner = self.enter(
            repo,
            MockOperation::ListPrs {
                state: opts.state,
                limit,
            },
            Operation::ListPrs,
        )?;
        Ok(inner
            .prs
            .values()
            .filter(|pr| opts.state.matches(pr.state))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn commit_file(
        &self,
        repo: &RepositoryRef,
        request: CommitFileRequest,
    ) -> Result<CommitResult, ForgeError> {
        let mut inner = self.enter(
            repo,
            MockOperation::CommitFile {
                path: request.path.clone(),
                branch: request.branch.clone(),
                message: request.message.clone(),
            },
            Operation::CommitFile,
        )?;

        if inner.branch(&request.branch).is_none() {
            return Err(self.not_found(ResourceKind::Branch, &request.branch));
        }

        let sha = inner.next_sha();
        if let Some(branch) = inner.branches.iter_mut().find(|b| b.name == request.branch) {
            branch.sha = sha.clone();
        }
        inner
            .files
            .insert((request.branch, request.path), request.content);

        Ok(CommitResult {
            sha,
            message: request.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::ErrorClass;

    fn repo() -> RepositoryRef {
        RepositoryRef::new(Provider::GitHub, "owner", "repo")
    }

    fn seeded() -> MockForge {
        MockForge::new()
            .with_branch("main", true)
            .with_branch("feature", false)
    }

    fn pr_request(source: &str) -> CreatePrRequest {
        CreatePrRequest {
            title: "Add feature".to_string(),
            description: Some("body".to_string()),
            source_branch: source.to_string(),
            target_branch: "main".to_string(),
            draft: false,
        }
    }

    mod branches {
        use super::*;

        #[tokio::test]
        async fn seeded_in_order() {
            let forge = seeded();
            let branches = forge.list_branches(&repo()).await.unwrap();
            assert_eq!(branches.len(), 2);
            assert_eq!(branches[0].name, "main");
            assert!(branches[0].is_default);
            assert_eq!(branches[0].sha, sha_for(1));
            assert!(!branches[1].is_default);
        }

        #[tokio::test]
        async fn create_from_name_copies_tip() {
            let forge = seeded();
            let branch = forge
                .create_branch(
                    &repo(),
                    CreateBranchRequest {
                        name: "topic".into(),
                        from_ref: "feature".into(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(branch.sha, sha_for(2));
            assert!(!branch.is_default);
        }

        #[tokio::test]
        async fn create_from_unknown_ref_is_not_found() {
            let forge = seeded();
            let err = forge
                .create_branch(
                    &repo(),
                    CreateBranchRequest {
                        name: "topic".into(),
                        from_ref: "nope".into(),
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorClass::NotFound);
        }

        #[tokio::test]
        async fn create_duplicate_is_validation() {
            let forge = seeded();
            let err = forge
                .create_branch(
                    &repo(),
                    CreateBranchRequest {
                        name: "feature".into(),
                        from_ref: "main".into(),
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorClass::Validation);
        }

        #[tokio::test]
        async fn get_missing() {
            let err = seeded().get_branch(&repo(), "nope").await.unwrap_err();
            assert!(matches!(
                err,
                ForgeError::NotFound {
                    resource: ResourceKind::Branch,
                    ..
                }
            ));
        }
    }

    mod pull_requests {
        use super::*;

        #[tokio::test]
        async fn numbers_increase() {
            let forge = seeded();
            let first = forge.create_pr(&repo(), pr_request("feature")).await.unwrap();
            let second = forge.create_pr(&repo(), pr_request("feature")).await.unwrap();
            assert_eq!(first.number, 1);
            assert_eq!(second.number, 2);
            assert_ne!(first.id, first.number);
        }

        #[tokio::test]
        async fn numbered_after_seeded() {
            let forge = seeded();
            let mut existing = forge.create_pr(&repo(), pr_request("feature")).await.unwrap();
            existing.number = 41;
            let forge = seeded().with_prs(vec![existing]);
            let pr = forge.create_pr(&repo(), pr_request("feature")).await.unwrap();
            assert_eq!(pr.number, 42);
        }

        #[tokio::test]
        async fn same_branches_rejected() {
            let err = seeded()
                .create_pr(&repo(), pr_request("main"))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorClass::Validation);
        }

        #[tokio::test]
        async fn list_filters_and_limits() {
            let forge = seeded();
            for _ in 0..3 {
                forge.create_pr(&repo(), pr_request("feature")).await.unwrap();
            }
            let mut merged = forge.get_pr(&repo(), 2).await.unwrap();
            merged.state = PrState::Merged;
            let forge = forge.with_prs(vec![merged]);

            let open = forge.list_prs(&repo(), ListPrsOpts::default()).await.unwrap();
            assert_eq!(open.len(), 2);

            let closed = forge
                .list_prs(
                    &repo(),
                    ListPrsOpts {
                        state: PrStateFilter::Closed,
                        limit: None,
                    },
                )
                .await
                .unwrap();
            assert_eq!(closed.len(), 1);
            assert_eq!(closed[0].number, 2);

            let limited = forge
                .list_prs(
                    &repo(),
                    ListPrsOpts {
                        state: PrStateFilter::All,
                        limit: Some(1),
                    },
                )
                .await
                .unwrap();
            assert_eq!(limited.len(), 1);
        }
    }

    mod commit_file {
        use super::*;

        #[tokio::test]
        async fn advances_branch_tip() {
            let forge = seeded();
            let result = forge
                .commit_file(
                    &repo(),
                    CommitFileRequest {
                        path: "README.md".into(),
                        content: "hello".into(),
                        message: "Add readme".into(),
                        branch: "feature".into(),
                    },
                )
                .await
                .unwrap();

            assert_eq!(result.sha, sha_for(3));
            assert_eq!(result.message, "Add readme");
            let branch = forge.get_branch(&repo(), "feature").await.unwrap();
            assert_eq!(branch.sha, result.sha);
            assert_eq!(forge.file("feature", "README.md").as_deref(), Some("hello"));
        }

        #[tokio::test]
        async fn unknown_branch() {
            let err = seeded()
                .commit_file(
                    &repo(),
                    CommitFileRequest {
                        path: "a".into(),
                        content: "b".into(),
                        message: "c".into(),
                        branch: "nope".into(),
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorClass::NotFound);
        }
    }

    mod failures {
        use super::*;

        #[tokio::test]
        async fn fail_on_only_affects_that_operation() {
            let forge = seeded().fail_on(FailOn::ListBranches(ForgeError::RateLimit {
                provider: Provider::GitHub,
                retry_after: Some(5),
            }));

            let err = forge.list_branches(&repo()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorClass::RateLimit);
            assert!(forge.get_branch(&repo(), "main").await.is_ok());

            forge.clear_fail_on();
            assert!(forge.list_branches(&repo()).await.is_ok());
        }

        #[tokio::test]
        async fn azure_mock_requires_project() {
            let forge = MockForge::for_provider(Provider::AzureDevOps).with_branch("main", true);
            let no_project = RepositoryRef::new(Provider::AzureDevOps, "acme", "widgets");
            let err = forge.list_branches(&no_project).await.unwrap_err();
            assert_eq!(err.kind(), ErrorClass::Validation);
            assert!(forge.operations().is_empty());

            let with_project = no_project.with_project("Platform");
            assert_eq!(forge.list_branches(&with_project).await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn records_operations() {
        let forge = seeded();
        forge.get_pr(&repo(), 9).await.unwrap_err();
        forge.list_branches(&repo()).await.unwrap();

        assert_eq!(
            forge.operations(),
            vec![
                MockOperation::GetPr { number: 9 },
                MockOperation::ListBranches
            ]
        );

        forge.clear_operations();
        assert!(forge.operations().is_empty());
    }
}
