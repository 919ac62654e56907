//! forge
//!
//! One branch and pull request interface over GitHub, GitLab and Azure DevOps.
//!
//! # Architecture
//!
//! The [`Forge`] trait is the contract. Each backend has an adapter that
//! implements it over a native client trait:
//!
//! ```text
//! caller ──► Forge ──► GitHubForge      ──► GitHubApi      (GitHubClient)
//!                  ├─► GitLabForge      ──► GitLabApi      (GitLabClient)
//!                  └─► AzureDevOpsForge ──► AzureDevOpsApi (AzureDevOpsClient)
//! ```
//!
//! Native clients speak their backend's shapes and return [`ApiError`].
//! Adapters translate both directions: native payloads into [`Branch`],
//! [`PullRequest`] and [`CommitResult`], native failures into [`ForgeError`]
//! through [`map_api_error`].
//!
//! # Modules
//!
//! - `types`: normalized data model
//! - `error`: error taxonomy and classification table
//! - `traits`: the [`Forge`] trait
//! - `http`: shared reqwest plumbing and [`ApiError`]
//! - [`github`], [`gitlab`], [`azure`]: adapters and native clients
//! - [`mock`]: in-memory forge for deterministic testing
//! - `factory`: [`ForgeConfig`] and [`create_forge`]
//!
//! # Example
//!
//! ```ignore
//! use polyforge::forge::{create_forge, CreatePrRequest, ForgeConfig, Provider, RepositoryRef};
//!
//! let forge = create_forge(&ForgeConfig::GitHub { token, base_url: None });
//! let repo = RepositoryRef::new(Provider::GitHub, "owner", "repo");
//!
//! let pr = forge.create_pr(&repo, CreatePrRequest {
//!     title: "Add feature".to_string(),
//!     description: None,
//!     source_branch: "feature".to_string(),
//!     target_branch: "main".to_string(),
//!     draft: false,
//! }).await?;
//!
//! println!("Created PR #{}: {}", pr.number, pr.url);
//! ```

pub mod azure;
mod error;
mod factory;
pub mod github;
pub mod gitlab;
mod http;
pub mod mock;
mod traits;
mod types;

pub use error::{
    classify, map_api_error, ClassificationRule, ErrorClass, ForgeError, Operation, ResourceKind,
    CLASSIFICATION_RULES,
};
pub use factory::{create_forge, valid_forge_names, ForgeConfig};
pub use http::{ApiError, ApiErrorKind};
pub use traits::Forge;
pub use types::*;
