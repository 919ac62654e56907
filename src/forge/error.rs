//! forge::error
//!
//! Provider-independent error taxonomy.
//!
//! # Design
//!
//! Every failure an adapter returns is one of five kinds, each tagged with
//! the provider it came from. Native client failures ([`ApiError`]) are
//! turned into a [`ForgeError`] only through [`map_api_error`], which consults
//! [`CLASSIFICATION_RULES`] in order.
//!
//! Some backends only give a message, so rules also match on lowercase
//! substrings. Order matters: a message such as "401 Unauthorized: project
//! not found" must classify as authentication, so the authentication and
//! not-found rules run first.
//!
//! # Example
//!
//! ```
//! use polyforge::forge::{classify, ErrorClass};
//!
//! assert_eq!(classify(Some(404), ""), ErrorClass::NotFound);
//! assert_eq!(classify(None, "API rate limit exceeded"), ErrorClass::RateLimit);
//! assert_eq!(classify(Some(500), "boom"), ErrorClass::Generic);
//! ```

use std::sync::Arc;

use thiserror::Error;

use super::http::{ApiError, ApiErrorKind};
use super::types::Provider;

/// Kind of entity a not-found error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Repository,
    Branch,
    PullRequest,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Repository => write!(f, "repository"),
            ResourceKind::Branch => write!(f, "branch"),
            ResourceKind::PullRequest => write!(f, "pull-request"),
        }
    }
}

/// Logical operation that was in flight when a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateBranch,
    GetBranch,
    ListBranches,
    CreatePr,
    GetPr,
    ListPrs,
    CommitFile,
}

impl Operation {
    /// Name of the contract method.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateBranch => "create_branch",
            Operation::GetBranch => "get_branch",
            Operation::ListBranches => "list_branches",
            Operation::CreatePr => "create_pr",
            Operation::GetPr => "get_pr",
            Operation::ListPrs => "list_prs",
            Operation::CommitFile => "commit_file",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The five normalized failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Authentication,
    NotFound,
    Validation,
    RateLimit,
    Generic,
}

/// Errors from forge operations.
///
/// Callers match on this exhaustively; there is no open hierarchy.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Invalid or expired credential, or insufficient scope.
    #[error("{provider}: authentication failed: {message}")]
    Authentication { provider: Provider, message: String },

    /// The requested entity does not exist.
    #[error("{provider}: {resource} not found: {identifier}")]
    NotFound {
        provider: Provider,
        resource: ResourceKind,
        identifier: String,
    },

    /// The backend is throttling.
    #[error("{provider}: rate limited{}", retry_after_suffix(.retry_after))]
    RateLimit {
        provider: Provider,
        /// Seconds to wait, when the backend said
        retry_after: Option<u64>,
    },

    /// Malformed input or a request the backend rejected.
    #[error("{provider}: validation failed: {message}")]
    Validation {
        provider: Provider,
        message: String,
        /// Offending input field, when known
        field: Option<String>,
    },

    /// Anything unclassified.
    #[error("{provider}: {operation} failed: {message}")]
    Generic {
        provider: Provider,
        operation: Operation,
        message: String,
        #[source]
        cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },
}

fn retry_after_suffix(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(" (retry after {}s)", secs),
        None => String::new(),
    }
}

impl ForgeError {
    /// Build a validation error.
    pub fn validation(provider: Provider, message: impl Into<String>, field: Option<&str>) -> Self {
        ForgeError::Validation {
            provider,
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    /// Build a not-found error.
    pub fn not_found(provider: Provider, resource: ResourceKind, identifier: impl Into<String>) -> Self {
        ForgeError::NotFound {
            provider,
            resource,
            identifier: identifier.into(),
        }
    }

    /// Build a generic error with no underlying cause.
    pub fn generic(provider: Provider, operation: Operation, message: impl Into<String>) -> Self {
        ForgeError::Generic {
            provider,
            operation,
            message: message.into(),
            cause: None,
        }
    }

    /// Which of the five categories this is.
    pub fn kind(&self) -> ErrorClass {
        match self {
            ForgeError::Authentication { .. } => ErrorClass::Authentication,
            ForgeError::NotFound { .. } => ErrorClass::NotFound,
            ForgeError::RateLimit { .. } => ErrorClass::RateLimit,
            ForgeError::Validation { .. } => ErrorClass::Validation,
            ForgeError::Generic { .. } => ErrorClass::Generic,
        }
    }

    /// The provider that produced this error.
    pub fn provider(&self) -> Provider {
        match self {
            ForgeError::Authentication { provider, .. }
            | ForgeError::NotFound { provider, .. }
            | ForgeError::RateLimit { provider, .. }
            | ForgeError::Validation { provider, .. }
            | ForgeError::Generic { provider, .. } => *provider,
        }
    }
}

/// One row of the classification table.
#[derive(Debug)]
pub struct ClassificationRule {
    pub class: ErrorClass,
    /// HTTP status codes that select this class
    pub statuses: &'static [u16],
    /// Lowercase substrings that select this class
    pub needles: &'static [&'static str],
}

/// Ordered classification table. First match wins; no match is `Generic`.
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule {
        class: ErrorClass::Authentication,
        statuses: &[401, 403],
        needles: &["unauthorized", "forbidden", "authentication"],
    },
    ClassificationRule {
        class: ErrorClass::NotFound,
        statuses: &[404],
        needles: &["not found"],
    },
    ClassificationRule {
        class: ErrorClass::Validation,
        statuses: &[400, 409, 422],
        needles: &["invalid", "already exists"],
    },
    ClassificationRule {
        class: ErrorClass::RateLimit,
        statuses: &[429],
        needles: &["rate limit"],
    },
];

/// Classify a native failure by status code and message.
pub fn classify(status: Option<u16>, message: &str) -> ErrorClass {
    let message = message.to_lowercase();
    CLASSIFICATION_RULES
        .iter()
        .find(|rule| {
            status.is_some_and(|s| rule.statuses.contains(&s))
                || rule.needles.iter().any(|n| message.contains(n))
        })
        .map(|rule| rule.class)
        .unwrap_or(ErrorClass::Generic)
}

/// Map a native failure into the taxonomy.
///
/// `subject` names what a not-found refers to for this call, e.g.
/// `(ResourceKind::Branch, "feature-x")`.
pub fn map_api_error(
    provider: Provider,
    operation: Operation,
    subject: (ResourceKind, &str),
    err: ApiError,
) -> ForgeError {
    tracing::debug!(
        provider = %provider,
        operation = %operation,
        status = ?err.status,
        "backend call failed: {}",
        err.message
    );

    let class = match err.kind {
        ApiErrorKind::Decode | ApiErrorKind::Connection => ErrorClass::Generic,
        ApiErrorKind::Status | ApiErrorKind::Transport => classify(err.status, &err.message),
    };

    match class {
        ErrorClass::Authentication => ForgeError::Authentication {
            provider,
            message: err.message,
        },
        ErrorClass::NotFound => ForgeError::not_found(provider, subject.0, subject.1),
        ErrorClass::Validation => ForgeError::Validation {
            provider,
            message: err.message,
            field: None,
        },
        ErrorClass::RateLimit => ForgeError::RateLimit {
            provider,
            retry_after: err.retry_after,
        },
        ErrorClass::Generic => ForgeError::Generic {
            provider,
            operation,
            message: err.message.clone(),
            cause: Some(Arc::new(err)),
        },
    }
}
