//! Hierarchical permission resolution and ACL administration.
//!
//! Resolution order for any entity: study owner, then the admin daemon's
//! separate ACL table, then entity-level entries for the member triple
//! `[user, group, *]`, then (files only) the ancestor-path walk, and finally
//! the study-level ACL projected through the derivation table.

pub mod context;
pub mod filter;
pub mod mutator;
pub mod resolver;

pub use context::AuthContext;
pub use filter::{Annotated, Secured};
pub use mutator::{AclMutator, AclUpdate};
pub use resolver::{Decision, PermissionResolver};

#[cfg(test)]
mod tests;
