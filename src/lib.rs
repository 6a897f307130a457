//! Linkvault - link registry for a multi-owner URL shortener
//!
//! Maps long URLs to short ids shared by every owner that submitted them,
//! with pluggable storage and asynchronous batched deletion.
//!
//! # Architecture
//! - `storage`: the `LinkStore` contract and its memory, append-only file and
//!   relational (SeaORM) backends
//! - `services`: `LinkService`, dedup and ownership rules
//! - `deletion`: the background deletion batcher
//! - `config`: static configuration (TOML + environment)
//! - `runtime`: startup and shutdown
//! - `interfaces`: the command-line front end
//! - `system`: logging

pub mod cli;
pub mod config;
pub mod deletion;
pub mod errors;
pub mod interfaces;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
