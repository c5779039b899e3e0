//! Shortener - a content-addressed URL shortener
//!
//! The short id of a URL is a 64-bit FNV-1 hash of its text, exposed as
//! base64url(lowercase hex). Users are anonymous and identified by an
//! encrypted, authenticated cookie token.
//!
//! # Features
//! - **server**: HTTP front end on actix-web (default)
//!
//! # Architecture
//! - `storage`: the `UrlStorage` contract and the memory, log-file and
//!   relational backends
//! - `services`: `UrlShortener`, the orchestrator the front end talks to
//! - `identity`: anonymous identity tokens
//! - `api`: HTTP routes
//! - `config`: static configuration (TOML + env + command line)
//! - `runtime`: server lifecycle
//! - `system`: logging

#[cfg(feature = "server")]
pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod identity;
#[cfg(feature = "server")]
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
