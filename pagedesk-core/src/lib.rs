//! Pagedesk Core Library
//!
//! Implements the primitives shared by the pagedesk gateway:
//! - The global role hierarchy and page-relation status model
//! - Application-issued session tokens (access/refresh pair)
//! - The outbound automation-webhook URL policy

pub mod error;
pub mod policy;
pub mod roles;
pub mod token;

pub use error::Error;
pub use policy::{validate_webhook_url, PolicyViolation};
pub use roles::{ApprovalStatus, Feature, GlobalRole, RelationStatus};
pub use token::{
    hash_refresh_token, issue_access_token, issue_refresh_token, verify_access_token, Claims,
    TokenConfig,
};

/// Result type for pagedesk-core operations
pub type Result<T> = std::result::Result<T, Error>;
