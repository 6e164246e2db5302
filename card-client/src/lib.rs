//! # Card Client
//!
//! Clients for the services an ID card template depends on, and the
//! `idcard` command line built on them.
//!
//! - [`StorageClient`]: templates, student records and uploaded assets.
//! - [`import_search_results`]: copies online search hits into storage.
//! - [`HttpImageLoader`]: feeds the renderer's asset cache over HTTP.
//!
//! This library is used by both the binary and integration tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod loader;
pub mod search;
pub mod storage;

pub use config::{ClientConfig, RetryConfig};
pub use error::{ClientError, ClientResult};
pub use loader::HttpImageLoader;
pub use search::{import_search_results, ImageSearch, SearchHit};
pub use storage::{StorageClient, UploadedAsset};
