//! # palisade-core
//!
//! Shared configuration model for the Palisade security layer.
//!
//! This crate defines the role-definition documents that describe what a
//! role may do inside the search cluster (cluster actions, index access,
//! tenant access), together with the YAML loading used by the rest of the
//! workspace. Role definitions are the values embedded in trust-token role
//! snapshots, so they must serialize losslessly through JSON as well.

// Role configuration types shared across all Palisade crates
pub mod config;

pub use config::role_definition::{
    IndexPermissions, RoleDefinition, TenantPermissions, pattern_matches,
};
pub use config::{ConfigError, RolesConfig};
