//! Polyforge - one branch and pull request interface over several forges
//!
//! Polyforge normalizes GitHub, GitLab and Azure DevOps behind a single async
//! [`forge::Forge`] trait: the same branch, pull request and file commit
//! operations, the same data model, and the same five-kind error taxonomy
//! whichever backend answers.
//!
//! # Architecture
//!
//! - [`forge`] - The `Forge` trait, normalized types, errors, and one adapter
//!   plus native REST client per backend
//! - [`config`] - Loading a `ForgeConfig` from TOML or JSON files
//!
//! # Guarantees
//!
//! 1. Native backend errors never leave an adapter; every failure is a
//!    [`forge::ForgeError`] tagged with its provider
//! 2. `merged` always wins over a raw open/closed state
//! 3. Nothing is cached and nothing is retried, except the Azure DevOps
//!    add→edit file push
//! 4. Every list is a single bounded page

pub mod config;
pub mod forge;
