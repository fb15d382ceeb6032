//! Role hierarchy and relation status model
//!
//! A user has exactly one account-wide [`GlobalRole`]. Roles form a total
//! order; every global access check reduces to a single rank comparison.
//! Page-scoped roles are free-form strings tested by containment and live
//! on the relation records in the gateway.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Account-wide privilege level, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRole {
    Client,
    Moderator,
    Admin,
    SuperAdmin,
}

impl GlobalRole {
    /// Numeric rank in the hierarchy `client < moderator < admin < super_admin`.
    pub fn rank(&self) -> u8 {
        match self {
            GlobalRole::Client => 0,
            GlobalRole::Moderator => 1,
            GlobalRole::Admin => 2,
            GlobalRole::SuperAdmin => 3,
        }
    }

    /// Whether this role grants the given feature gate.
    pub fn allows(&self, feature: Feature) -> bool {
        self.rank() >= feature.min_role().rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalRole::Client => "client",
            GlobalRole::Moderator => "moderator",
            GlobalRole::Admin => "admin",
            GlobalRole::SuperAdmin => "super_admin",
        }
    }

    /// Parse a wire-format role string. Unknown values are an error, never
    /// a default: role writes must be validated before they happen.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "client" => Ok(GlobalRole::Client),
            "moderator" => Ok(GlobalRole::Moderator),
            "admin" => Ok(GlobalRole::Admin),
            "super_admin" => Ok(GlobalRole::SuperAdmin),
            other => Err(Error::InvalidRole(other.to_string())),
        }
    }
}

/// A feature gate requiring a minimum global role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Moderator,
    Admin,
    Superadmin,
}

impl Feature {
    /// The lowest role that may use this feature.
    pub fn min_role(&self) -> GlobalRole {
        match self {
            Feature::Moderator => GlobalRole::Moderator,
            Feature::Admin => GlobalRole::Admin,
            Feature::Superadmin => GlobalRole::SuperAdmin,
        }
    }
}

/// Whether a user's link to a page is currently operative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationStatus {
    Active,
    Pending,
    Banished,
}

impl RelationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationStatus::Active => "active",
            RelationStatus::Pending => "pending",
            RelationStatus::Banished => "banished",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(RelationStatus::Active),
            "pending" => Ok(RelationStatus::Pending),
            "banished" => Ok(RelationStatus::Banished),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// Whether a pending access grant has been accepted by an authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Accepted,
    Pending,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Accepted => "accepted",
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "accepted" => Ok(ApprovalStatus::Accepted),
            "pending" => Ok(ApprovalStatus::Pending),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}
