//! forge::traits
//!
//! The `Forge` trait: one branch and pull request contract for every backend.
//!
//! # Design
//!
//! The trait is async because every operation is a network round trip.
//! Adapters hold only a credential and a client handle, so a single instance
//! can serve concurrent calls without locking.
//!
//! Every method takes the [`RepositoryRef`] it operates on. Adapters validate
//! it before touching the network; Azure DevOps rejects a missing `project`
//! at that point.
//!
//! # Example
//!
//! ```ignore
//! use polyforge::forge::{create_forge, CreateBranchRequest, ForgeConfig, Provider, RepositoryRef};
//!
//! let forge = create_forge(&ForgeConfig::GitLab { token, base_url: None });
//! let repo = RepositoryRef::new(Provider::GitLab, "acme", "widgets");
//!
//! let branch = forge
//!     .create_branch(&repo, CreateBranchRequest {
//!         name: "feature-x".to_string(),
//!         from_ref: "main".to_string(),
//!     })
//!     .await?;
//! println!("{} at {}", branch.name, branch.sha);
//! ```

use async_trait::async_trait;

use super::error::ForgeError;
use super::types::{
    Branch, CommitFileRequest, CommitResult, CreateBranchRequest, CreatePrRequest, ListPrsOpts,
    Provider, PullRequest, RepositoryRef,
};

/// The Forge trait for branch and pull request operations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// Every method returns one of the five [`ForgeError`] kinds:
/// - `Authentication`: the credential was rejected
/// - `NotFound`: the repository, branch or pull request is absent
/// - `RateLimit`: back off, optionally for `retry_after` seconds
/// - `Validation`: bad input, or the backend refused it (duplicate branch)
/// - `Generic`: anything else, tagged with the operation in flight
///
/// Nothing is retried. The Azure DevOps file commit add→edit fallback is the
/// only two-attempt sequence, and it is internal to that adapter.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Which backend this forge talks to.
    fn provider(&self) -> Provider;

    /// Get the forge name (e.g., "github", "azure-devops").
    fn name(&self) -> &'static str {
        self.provider().name()
    }

    /// Create a branch from a branch name or a 40-hex commit sha.
    ///
    /// A sha is used as is; a branch name is first resolved to its tip.
    ///
    /// # Errors
    ///
    /// - `NotFound` (branch) if `from_ref` does not resolve
    /// - `Validation` if `name` already exists
    async fn create_branch(
        &self,
        repo: &RepositoryRef,
        request: CreateBranchRequest,
    ) -> Result<Branch, ForgeError>;

    /// Get a branch by name.
    ///
    /// # Errors
    ///
    /// - `NotFound` (branch) if it doesn't exist
    async fn get_branch(&self, repo: &RepositoryRef, name: &str) -> Result<Branch, ForgeError>;

    /// List branches in backend order, one page of at most 100.
    async fn list_branches(&self, repo: &RepositoryRef) -> Result<Vec<Branch>, ForgeError>;

    /// Create a pull request.
    ///
    /// # Errors
    ///
    /// - `Validation` if the backend rejects the branches or title
    async fn create_pr(
        &self,
        repo: &RepositoryRef,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError>;

    /// Get a pull request by its display number.
    ///
    /// # Errors
    ///
    /// - `NotFound` (pull-request) if it doesn't exist
    async fn get_pr(&self, repo: &RepositoryRef, number: u64) -> Result<PullRequest, ForgeError>;

    /// List pull requests, one page, filtered by normalized state.
    ///
    /// `opts.limit` is a page-size hint; backends that filter locally may
    /// return fewer.
    async fn list_prs(
        &self,
        repo: &RepositoryRef,
        opts: ListPrsOpts,
    ) -> Result<Vec<PullRequest>, ForgeError>;

    /// Create or update one file on a branch with a single commit.
    ///
    /// # Errors
    ///
    /// - `NotFound` (branch) if the branch doesn't exist
    async fn commit_file(
        &self,
        repo: &RepositoryRef,
        request: CommitFileRequest,
    ) -> Result<CommitResult, ForgeError>;
}
