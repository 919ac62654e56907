//! forge::factory
//!
//! Forge selection and creation.
//!
//! # Design
//!
//! Callers build a [`ForgeConfig`] and hand it to [`create_forge`] instead
//! of importing a specific adapter. The config is a tagged union, so a
//! well-typed value always names exactly one backend with its required
//! fields; construction cannot fail. Whether a token is empty or a URL is
//! reachable is the caller's concern and surfaces on the first call.
//!
//! # Example
//!
//! ```
//! use polyforge::forge::{create_forge, ForgeConfig, Provider};
//!
//! let config = ForgeConfig::AzureDevOps {
//!     token: "pat".to_string(),
//!     org_url: "https://dev.azure.com/acme".to_string(),
//! };
//! let forge = create_forge(&config);
//! assert_eq!(forge.provider(), Provider::AzureDevOps);
//! ```

use serde::{Deserialize, Serialize};

use super::azure::AzureDevOpsForge;
use super::github::GitHubForge;
use super::gitlab::GitLabForge;
use super::traits::Forge;
use super::types::Provider;

/// Configuration for one forge backend.
///
/// Serialized with a `type` tag:
///
/// ```json
/// { "type": "github", "token": "ghp_...", "baseUrl": "https://ghe.example.com/api/v3" }
/// { "type": "gitlab", "token": "glpat-..." }
/// { "type": "azure-devops", "token": "...", "orgUrl": "https://dev.azure.com/acme" }
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ForgeConfig {
    #[serde(rename = "github")]
    GitHub {
        token: String,
        /// API base URL; api.github.com when absent
        #[serde(
            rename = "baseUrl",
            alias = "base_url",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        base_url: Option<String>,
    },
    #[serde(rename = "gitlab")]
    GitLab {
        token: String,
        /// Instance URL; gitlab.com when absent
        #[serde(
            rename = "baseUrl",
            alias = "base_url",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        base_url: Option<String>,
    },
    #[serde(rename = "azure-devops")]
    AzureDevOps {
        token: String,
        /// Organization URL, e.g. `https://dev.azure.com/acme`
        #[serde(rename = "orgUrl", alias = "org_url")]
        org_url: String,
    },
}

// Custom Debug to avoid exposing tokens
impl std::fmt::Debug for ForgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForgeConfig::GitHub { token, base_url } => f
                .debug_struct("GitHub")
                .field("has_token", &!token.is_empty())
                .field("base_url", base_url)
                .finish(),
            ForgeConfig::GitLab { token, base_url } => f
                .debug_struct("GitLab")
                .field("has_token", &!token.is_empty())
                .field("base_url", base_url)
                .finish(),
            ForgeConfig::AzureDevOps { token, org_url } => f
                .debug_struct("AzureDevOps")
                .field("has_token", &!token.is_empty())
                .field("org_url", org_url)
                .finish(),
        }
    }
}

impl ForgeConfig {
    /// Which backend this config selects.
    pub fn provider(&self) -> Provider {
        match self {
            ForgeConfig::GitHub { .. } => Provider::GitHub,
            ForgeConfig::GitLab { .. } => Provider::GitLab,
            ForgeConfig::AzureDevOps { .. } => Provider::AzureDevOps,
        }
    }

    /// The credential.
    pub fn token(&self) -> &str {
        match self {
            ForgeConfig::GitHub { token, .. }
            | ForgeConfig::GitLab { token, .. }
            | ForgeConfig::AzureDevOps { token, .. } => token,
        }
    }
}

/// Create the adapter a config selects.
///
/// This is the primary entry point. It never fails; bad credentials or
/// URLs surface as errors from the first operation.
pub fn create_forge(config: &ForgeConfig) -> Box<dyn Forge> {
    tracing::debug!(provider = %config.provider(), "creating forge");

    match config {
        ForgeConfig::GitHub { token, base_url } => match base_url {
            Some(base) => Box::new(GitHubForge::with_api_base(token.clone(), base.clone())),
            None => Box::new(GitHubForge::new(token.clone())),
        },
        ForgeConfig::GitLab { token, base_url } => match base_url {
            Some(base) => Box::new(GitLabForge::with_base_url(token.clone(), base.clone())),
            None => Box::new(GitLabForge::new(token.clone())),
        },
        ForgeConfig::AzureDevOps { token, org_url } => {
            Box::new(AzureDevOpsForge::new(token.clone(), org_url.clone()))
        }
    }
}

/// Get a list of valid forge names for configuration `type` tags.
pub fn valid_forge_names() -> Vec<&'static str> {
    Provider::all().iter().map(|p| p.name()).collect()
}
