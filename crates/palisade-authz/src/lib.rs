//! # palisade-authz
//!
//! Authorization context binding for Palisade trust tokens.
//!
//! After `palisade-token` has verified a token, this crate turns the
//! result into the object the per-request authorization pipeline consumes:
//! a user identity, the effective role names, and an action-authorization
//! view compiled from the role definitions *embedded in the token*, the
//! authorization state frozen at issuance, deliberately independent of the
//! live role configuration. It also supplies the configuration-backed
//! subject → role mapping the token producer needs.

pub mod authorization;
pub mod context;
pub mod mapper;

pub use authorization::RoleBasedActionAuthorization;
pub use context::{
    PrivilegesContext, TRUST_TOKEN_AUTH_DOMAIN, TokenAuthContext, User, bind_from_parts,
};
pub use mapper::ConfigRoleMapper;
