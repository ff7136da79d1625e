//! Bookshelf Ingest - Open Library author import tool

use anyhow::{Context, Result};
use bookshelf_common::logging::{init_logging, LogConfig, LogLevel};
use bookshelf_common::memory::format_bytes;
use bookshelf_ingest::authors::{
    scan_file, Author, AuthorImportError, AuthorImportPipeline, AuthorSearchParams, AuthorStore,
    BatchFailurePolicy, PgAuthorStorage,
};
use bookshelf_ingest::config::{ImportConfig, DEFAULT_CLI_BATCH_SIZE, DEFAULT_SCAN_BATCH_SIZE};
use bookshelf_ingest::db::{self, DbConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Bios longer than this are cut in search listings
const BIO_PREVIEW_CHARS: usize = 100;

#[derive(Parser, Debug)]
#[command(name = "bookshelf-ingest")]
#[command(author, version, about = "Open Library author import tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import an Open Library authors dump into the database
    ImportAuthors {
        /// Path to the dump file
        #[arg(default_value = "./authors.txt")]
        file: PathBuf,

        /// Authors per bulk insert
        #[arg(env = "IMPORT_BATCH_SIZE", default_value_t = DEFAULT_CLI_BATCH_SIZE)]
        batch_size: usize,

        /// Seconds between progress reports
        #[arg(long)]
        report_interval_secs: Option<u64>,

        /// Stop after this many lines
        #[arg(long)]
        limit: Option<u64>,

        /// Resubmit failed batches one record at a time
        #[arg(long)]
        retry_per_record: bool,
    },

    /// Search imported authors
    SearchAuthors {
        /// Case-insensitive substring of the name
        #[arg(long)]
        name: Option<String>,

        /// Exact alternate name
        #[arg(long)]
        alternate_name: Option<String>,

        /// Case-insensitive substring of the biography
        #[arg(long)]
        about: Option<String>,

        /// Maximum results to show
        #[arg(long, default_value_t = 10)]
        limit: i64,

        /// Results to skip
        #[arg(long, default_value_t = 0)]
        skip: i64,
    },

    /// Read a dump without a database and report record types per batch
    Scan {
        /// Path to the dump file
        #[arg(default_value = "./authors.txt")]
        file: PathBuf,

        /// Lines per batch
        #[arg(long, default_value_t = DEFAULT_SCAN_BATCH_SIZE)]
        batch_size: usize,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("bookshelf-ingest")
        .filter_directives("sqlx=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::ImportAuthors {
            file,
            batch_size,
            report_interval_secs,
            limit,
            retry_per_record,
        } => {
            let config = apply_import_flags(
                ImportConfig::from_env()?,
                batch_size,
                report_interval_secs,
                limit,
                retry_per_record,
            )?;

            import_authors(file, config).await
        },
        Command::SearchAuthors {
            name,
            alternate_name,
            about,
            limit,
            skip,
        } => {
            let params = AuthorSearchParams {
                name,
                alternate_name,
                about,
                take: limit,
                skip,
            };
            search_authors(params).await?;
            Ok(ExitCode::SUCCESS)
        },
        Command::Scan { file, batch_size } => {
            let config = ImportConfig::from_env()?;
            match scan_file(
                &file,
                batch_size,
                config.read_buffer_bytes,
                config.report_interval(),
            )
            .await
            {
                Ok(summary) => {
                    info!(types = ?summary.type_counts, "Scan complete");
                    Ok(ExitCode::SUCCESS)
                },
                Err(e @ AuthorImportError::FileNotFound { .. }) => {
                    error!(error = %e, "Scan aborted");
                    Ok(ExitCode::FAILURE)
                },
                Err(e) => Err(e.into()),
            }
        },
    }
}

/// Layer command-line flags over the environment settings and validate
fn apply_import_flags(
    base: ImportConfig,
    batch_size: usize,
    report_interval_secs: Option<u64>,
    limit: Option<u64>,
    retry_per_record: bool,
) -> Result<ImportConfig> {
    let mut config = base.with_batch_size(batch_size);
    if let Some(secs) = report_interval_secs {
        config = config.with_report_interval_secs(secs);
    }
    if limit.is_some() {
        config = config.with_parse_limit(limit);
    }
    if retry_per_record {
        config = config.with_failure_policy(BatchFailurePolicy::RetryPerRecord);
    }

    config.validate().context("Invalid import settings")?;
    Ok(config)
}

async fn import_authors(file: PathBuf, config: ImportConfig) -> Result<ExitCode> {
    // Fail on a missing dump before touching the database
    let metadata = match tokio::fs::metadata(&file).await {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => {
            error!(path = %file.display(), "Not a regular file");
            return Ok(ExitCode::FAILURE);
        },
        Err(e) => {
            error!(path = %file.display(), error = %e, "File not found");
            return Ok(ExitCode::FAILURE);
        },
    };
    info!(
        path = %file.display(),
        size = %format_bytes(metadata.len()),
        "Found author dump"
    );

    let db_config = DbConfig::from_env()?;
    let pool = db::create_pool(&db_config)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool).await?;

    let storage = PgAuthorStorage::new(pool);
    let mut pipeline = AuthorImportPipeline::new(config, storage)?;

    match pipeline.run(&file).await {
        Ok(stats) => {
            info!(
                imported = stats.records_imported,
                duplicates = stats.records_duplicate,
                errored = stats.records_errored,
                "Author import complete"
            );
            Ok(ExitCode::SUCCESS)
        },
        Err(e @ AuthorImportError::FileNotFound { .. }) => {
            error!(error = %e, "Author import aborted");
            Ok(ExitCode::FAILURE)
        },
        Err(e) => Err(e.into()),
    }
}

async fn search_authors(params: AuthorSearchParams) -> Result<()> {
    let db_config = DbConfig::from_env()?;
    let pool = db::create_pool(&db_config)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool).await?;
    let storage = PgAuthorStorage::new(pool);

    info!(
        name = ?params.name,
        alternate_name = ?params.alternate_name,
        about = ?params.about,
        "Searching authors"
    );

    let authors = storage.search(&params).await?;
    let total = storage.count(&params).await?;

    println!("Found {} authors of {} total matches", authors.len(), total);
    if authors.is_empty() {
        println!("No authors found matching your search criteria.");
        return Ok(());
    }

    println!("\nSearch Results:");
    println!("{}", "=".repeat(62));
    for (index, author) in authors.iter().enumerate() {
        print!("{}", render_author(index + 1, author));
        println!("{}", "-".repeat(62));
    }
    println!("\nShowing {} of {} matching authors.", authors.len(), total);

    Ok(())
}

fn render_author(position: usize, author: &Author) -> String {
    let mut out = format!("{}. {}\n", position, author.name);
    if let Some(birth_date) = author.birth_date {
        out.push_str(&format!("   Birth Date: {}\n", birth_date.format("%Y-%m-%d")));
    }
    if !author.alternate_names.is_empty() {
        out.push_str(&format!(
            "   Also known as: {}\n",
            author.alternate_names.join(", ")
        ));
    }
    out.push_str(&format!("   Open Library ID: {}\n", author.olid));
    if !author.about.is_empty() {
        out.push_str(&format!("   Bio: {}\n", preview(&author.about, BIO_PREVIEW_CHARS)));
    }
    out
}

/// First `max_chars` characters of `text`, with `...` appended when cut
fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_ingest::authors::Gender;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 100), "short");
        assert_eq!(preview(&"a".repeat(100), 100), "a".repeat(100));
        assert_eq!(preview(&"a".repeat(101), 100), format!("{}...", "a".repeat(100)));
        assert_eq!(preview("éééé", 2), "éé...");
    }

    #[test]
    fn test_render_author() {
        let now = Utc::now();
        let author = Author {
            id: 1,
            uuid: uuid::Uuid::nil(),
            olid: "OL1A".to_string(),
            name: "Ada".to_string(),
            birth_date: Utc.with_ymd_and_hms(2008, 4, 1, 3, 28, 50).single(),
            alternate_names: vec!["A. L.".to_string(), "Countess".to_string()],
            link: "https://openlibrary.org/authors/OL1A".to_string(),
            rating_count: 0,
            average_rating: 0.0,
            gender: Gender::Unspecified,
            image_url: None,
            about: String::new(),
            created_at: now,
            updated_at: now,
        };

        let out = render_author(3, &author);
        assert_eq!(
            out,
            "3. Ada\n   Birth Date: 2008-04-01\n   Also known as: A. L., Countess\n   Open Library ID: OL1A\n"
        );
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["bookshelf-ingest", "import-authors"]);
        match cli.command {
            Command::ImportAuthors {
                file,
                batch_size,
                limit,
                retry_per_record,
                ..
            } => {
                assert_eq!(file, PathBuf::from("./authors.txt"));
                assert_eq!(batch_size, 50);
                assert_eq!(limit, None);
                assert!(!retry_per_record);
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_positional_batch_size() {
        let cli = Cli::parse_from(["bookshelf-ingest", "-v", "import-authors", "dump.txt", "500"]);
        assert!(cli.verbose);
        match cli.command {
            Command::ImportAuthors { file, batch_size, .. } => {
                assert_eq!(file, PathBuf::from("dump.txt"));
                assert_eq!(batch_size, 500);
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_apply_import_flags() {
        let config =
            apply_import_flags(ImportConfig::default(), 500, Some(5), Some(1000), true).unwrap();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.report_interval_secs, 5);
        assert_eq!(config.parse_limit, Some(1000));
        assert_eq!(config.failure_policy, BatchFailurePolicy::RetryPerRecord);

        let kept = apply_import_flags(ImportConfig::default(), 50, None, None, false).unwrap();
        assert_eq!(kept.parse_limit, ImportConfig::default().parse_limit);
        assert_eq!(kept.failure_policy, ImportConfig::default().failure_policy);
    }

    #[test]
    fn test_apply_import_flags_rejects_bad_batch_size() {
        for batch_size in [0, bookshelf_ingest::config::MAX_BATCH_SIZE + 1] {
            let err = apply_import_flags(ImportConfig::default(), batch_size, None, None, false)
                .unwrap_err();
            assert!(err.to_string().contains("Invalid import settings"));
        }
        assert!(apply_import_flags(ImportConfig::default(), 10, Some(0), None, false).is_err());
    }

    #[test]
    fn test_cli_search_defaults() {
        let cli = Cli::parse_from(["bookshelf-ingest", "search-authors", "--name", "tolkien"]);
        match cli.command {
            Command::SearchAuthors { name, limit, skip, .. } => {
                assert_eq!(name.as_deref(), Some("tolkien"));
                assert_eq!(limit, 10);
                assert_eq!(skip, 0);
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
