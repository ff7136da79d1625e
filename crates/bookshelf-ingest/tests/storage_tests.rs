//! PostgreSQL author storage tests
//!
//! Need Docker for the PostgreSQL container; run with
//! `cargo test -p bookshelf-ingest --test storage_tests -- --ignored`.

mod common;

use anyhow::Result;
use bookshelf_ingest::authors::{
    AuthorImportPipeline, AuthorSearchParams, AuthorSink, AuthorStore, AuthorUpdate, Gender,
    NewAuthor, PgAuthorStorage,
};
use common::{author_lines, init_tracing, test_config, write_dump, TestDb};
use serial_test::serial;
use tracing::info;

fn new_author(olid: &str, name: &str) -> NewAuthor {
    NewAuthor {
        olid: olid.to_string(),
        name: name.to_string(),
        birth_date: None,
        alternate_names: Vec::new(),
        link: format!("https://openlibrary.org/authors/{}", olid),
        rating_count: 0,
        average_rating: 0.0,
        gender: Gender::Unspecified,
        image_url: None,
        about: String::new(),
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_bulk_insert_skips_existing_olids() -> Result<()> {
    init_tracing();
    let db = TestDb::start().await?;
    let storage = PgAuthorStorage::new(db.pool());

    let batch = vec![new_author("OL1A", "Ada"), new_author("OL2A", "Grace")];
    assert_eq!(storage.bulk_insert(&batch).await?, 2);

    let again = vec![new_author("OL2A", "Grace"), new_author("OL3A", "Edsger")];
    assert_eq!(storage.bulk_insert(&again).await?, 1);

    let count = storage.count(&AuthorSearchParams::default()).await?;
    assert_eq!(count, 3);

    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_bulk_insert_splits_large_batches() -> Result<()> {
    init_tracing();
    let db = TestDb::start().await?;
    let storage = PgAuthorStorage::new(db.pool()).with_rows_per_statement(2);

    let batch: Vec<NewAuthor> = (0..5)
        .map(|i| new_author(&format!("OL{}A", i), &format!("Author {}", i)))
        .collect();
    assert_eq!(storage.bulk_insert(&batch).await?, 5);
    assert_eq!(storage.list(0, 10).await?.len(), 5);

    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_lookup_update_delete() -> Result<()> {
    init_tracing();
    let db = TestDb::start().await?;
    let storage = PgAuthorStorage::new(db.pool());

    storage.bulk_insert(&[new_author("OL1A", "Ada")]).await?;

    let ada = storage.get_by_olid("OL1A").await?.expect("author stored");
    assert_eq!(ada.gender, Gender::Unspecified);
    assert_eq!(storage.get_by_id(ada.id).await?.map(|a| a.uuid), Some(ada.uuid));
    assert_eq!(storage.get_by_uuid(ada.uuid).await?.map(|a| a.id), Some(ada.id));

    let update = AuthorUpdate {
        about: Some("Wrote the first program".to_string()),
        gender: Some(Gender::Female),
        ..Default::default()
    };
    let updated = storage.update(ada.id, &update).await?.expect("row updated");
    assert_eq!(updated.about, "Wrote the first program");
    assert_eq!(updated.gender, Gender::Female);
    assert_eq!(updated.name, "Ada");
    assert!(updated.updated_at >= ada.updated_at);

    assert!(storage.update(ada.id + 1000, &update).await?.is_none());

    let deleted = storage.delete(ada.id).await?.expect("row deleted");
    assert_eq!(deleted.olid, "OL1A");
    assert!(storage.get_by_olid("OL1A").await?.is_none());

    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_search_filters() -> Result<()> {
    init_tracing();
    let db = TestDb::start().await?;
    let storage = PgAuthorStorage::new(db.pool());

    let mut tolkien = new_author("OL26320A", "J.R.R. Tolkien");
    tolkien.alternate_names = vec!["John Ronald Reuel Tolkien".to_string()];
    tolkien.about = "Oxford philologist".to_string();
    let mut christopher = new_author("OL26321A", "Christopher Tolkien");
    christopher.about = "Editor of 100% of the posthumous works".to_string();
    let lewis = new_author("OL31574A", "C.S. Lewis");

    storage.bulk_insert(&[tolkien, christopher, lewis]).await?;

    let by_name = AuthorSearchParams::new().with_name("tolkien");
    let found = storage.search(&by_name).await?;
    assert_eq!(found.len(), 2);
    assert_eq!(storage.count(&by_name).await?, 2);
    // Ordered by name
    assert_eq!(found[0].name, "Christopher Tolkien");

    let by_alias = AuthorSearchParams::new().with_alternate_name("John Ronald Reuel Tolkien");
    let found = storage.search(&by_alias).await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].olid, "OL26320A");

    let by_about = AuthorSearchParams::new().with_about("OXFORD");
    assert_eq!(storage.count(&by_about).await?, 1);

    // Wildcards in the term match literally
    let literal = AuthorSearchParams::new().with_about("100%");
    assert_eq!(storage.count(&literal).await?, 1);

    let paged = AuthorSearchParams::new().with_take(1).with_skip(1);
    let page = storage.search(&paged).await?;
    assert_eq!(page.len(), 1);
    assert_eq!(storage.count(&paged).await?, 3);

    info!("Search filters verified");
    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_pipeline_into_postgres_is_idempotent() -> Result<()> {
    init_tracing();
    let db = TestDb::start().await?;
    let dump = write_dump(&author_lines(0..120));

    let storage = PgAuthorStorage::new(db.pool());
    let mut pipeline = AuthorImportPipeline::new(test_config(50), storage.clone())?;

    let first = pipeline.run(dump.path()).await?;
    assert_eq!(first.records_imported, 120);
    assert_eq!(first.batches_flushed, 3);

    let second = pipeline.run(dump.path()).await?;
    assert_eq!(second.records_imported, 0);
    assert_eq!(second.records_duplicate, 120);
    assert!(second.is_balanced());

    let stored = storage.get_by_olid("OL7A").await?.expect("author stored");
    assert_eq!(stored.name, "Author 7");
    assert_eq!(stored.link, "https://openlibrary.org/authors/OL7A");
    assert!(stored.birth_date.is_some());

    Ok(())
}
