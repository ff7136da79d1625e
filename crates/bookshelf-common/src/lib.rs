//! Bookshelf Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the Bookshelf workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Custom error types and result types
//! - **Logging**: Centralized `tracing` subscriber setup
//! - **Memory**: Human-readable sizes and process memory sampling
//!
//! # Example
//!
//! ```no_run
//! use bookshelf_common::memory::{format_bytes, resident_memory_bytes};
//!
//! if let Some(rss) = resident_memory_bytes() {
//!     println!("RSS: {}", format_bytes(rss));
//! }
//! ```

pub mod error;
pub mod logging;
pub mod memory;

// Re-export commonly used types
pub use error::{BookshelfError, Result};
