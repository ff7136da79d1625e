//! Bookshelf Ingest Library
//!
//! Streaming import of Open Library author dumps into PostgreSQL.
//!
//! # Overview
//!
//! - **Authors**: line source, parser, normalizer, batcher, sink and the
//!   pipeline that drives them ([`authors`])
//! - **Configuration**: `IMPORT_*` environment settings ([`config`])
//! - **Database**: connection pool and migrations ([`db`])
//!
//! # Example
//!
//! ```no_run
//! use bookshelf_ingest::authors::{AuthorImportPipeline, PgAuthorStorage};
//! use bookshelf_ingest::config::ImportConfig;
//! use bookshelf_ingest::db::{create_pool, DbConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = create_pool(&DbConfig::from_env()?).await?;
//! let storage = PgAuthorStorage::new(pool);
//!
//! let mut pipeline = AuthorImportPipeline::new(ImportConfig::from_env()?, storage)?;
//! let stats = pipeline.run("authors.txt").await?;
//! println!("imported {} authors", stats.records_imported);
//! # Ok(())
//! # }
//! ```

pub mod authors;
pub mod config;
pub mod db;

pub use authors::{AuthorImportError, AuthorImportPipeline, RunStats};
pub use config::ImportConfig;
