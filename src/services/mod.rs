//! Service layer for business logic
//!
//! Shared between the CLI and any other interface that embeds the registry.

mod link_service;

pub use link_service::*;
