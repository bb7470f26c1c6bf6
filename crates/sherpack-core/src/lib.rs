//! Sherpack Core - Core types and utilities for the Kubernetes package manager
//!
//! This crate provides the foundational types used throughout Sherpack:
//! - `Pack`: The package definition (equivalent to Helm Chart)
//! - `Values`: Configuration values with deep merge support
//! - `Release`: Deployment state tracking
//! - `Context`: Template rendering context

pub mod archive;
pub mod context;
pub mod error;
pub mod files;
pub mod manifest;
pub mod pack;
pub mod release;
pub mod schema;
pub mod secrets;
pub mod values;

pub use context::TemplateContext;
pub use error::{CoreError, ValidationErrorInfo};
pub use manifest::Manifest;
pub use pack::{Dependency, LoadedPack, Pack, PackKind, PackMetadata};
pub use release::{Release, ReleaseInfo, ReleaseStatus};
pub use schema::{Schema, SchemaValidator, ValidationResult};
pub use secrets::{SecretEntry, SecretGenerator, SecretState};
pub use values::{parse_set_values, Values};
