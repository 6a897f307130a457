//! User-facing interfaces over the link registry.

pub mod cli;
