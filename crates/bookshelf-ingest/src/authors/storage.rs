//! PostgreSQL storage for authors
//!
//! Write path: [`AuthorSink`] bulk insert with `ON CONFLICT (olid) DO NOTHING`.
//! Read path: [`AuthorStore`] lookups, search, partial update and delete used
//! by the search tooling.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::models::{Author, AuthorSearchParams, AuthorUpdate, NewAuthor};
use super::sink::{AuthorSink, SinkError};
use crate::db::DbResult;

/// Bound parameters per inserted row
const INSERT_COLUMNS: usize = 10;

/// Postgres caps a statement at 65535 bind parameters
const MAX_BIND_PARAMS: usize = 65_535;

/// Rows per INSERT statement; batches larger than this are split into several
/// statements inside one transaction
pub const DEFAULT_ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMS / INSERT_COLUMNS;

/// Read-side operations on stored authors
#[async_trait]
pub trait AuthorStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> DbResult<Option<Author>>;

    async fn get_by_olid(&self, olid: &str) -> DbResult<Option<Author>>;

    async fn get_by_uuid(&self, uuid: Uuid) -> DbResult<Option<Author>>;

    /// Page through all authors ordered by name
    async fn list(&self, skip: i64, take: i64) -> DbResult<Vec<Author>>;

    async fn search(&self, params: &AuthorSearchParams) -> DbResult<Vec<Author>>;

    /// Number of authors matching the filters of `params` (paging ignored)
    async fn count(&self, params: &AuthorSearchParams) -> DbResult<i64>;

    /// Apply a partial update, returning the updated row if `id` exists
    async fn update(&self, id: i64, update: &AuthorUpdate) -> DbResult<Option<Author>>;

    /// Delete by id, returning the removed row if it existed
    async fn delete(&self, id: i64) -> DbResult<Option<Author>>;
}

/// Author table access over a shared pool
#[derive(Clone)]
pub struct PgAuthorStorage {
    db: PgPool,
    rows_per_statement: usize,
}

impl PgAuthorStorage {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            rows_per_statement: DEFAULT_ROWS_PER_STATEMENT,
        }
    }

    /// Override the rows per INSERT statement (clamped to the bind limit)
    pub fn with_rows_per_statement(mut self, rows: usize) -> Self {
        self.rows_per_statement = rows.clamp(1, DEFAULT_ROWS_PER_STATEMENT);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl AuthorSink for PgAuthorStorage {
    async fn bulk_insert(&self, authors: &[NewAuthor]) -> Result<u64, SinkError> {
        if authors.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.begin().await?;
        let mut inserted = 0;

        for chunk in authors.chunks(self.rows_per_statement) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"
                INSERT INTO authors (
                    olid,
                    name,
                    birth_date,
                    alternate_names,
                    link,
                    rating_count,
                    average_rating,
                    gender,
                    image_url,
                    about
                )
                "#,
            );

            query_builder.push_values(chunk, |mut b, author| {
                b.push_bind(&author.olid)
                    .push_bind(&author.name)
                    .push_bind(author.birth_date)
                    .push_bind(&author.alternate_names)
                    .push_bind(&author.link)
                    .push_bind(author.rating_count)
                    .push_bind(author.average_rating)
                    .push_bind(author.gender)
                    .push_bind(&author.image_url)
                    .push_bind(&author.about);
            });

            query_builder.push(" ON CONFLICT (olid) DO NOTHING");

            let result = query_builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;

        debug!(
            submitted = authors.len(),
            inserted,
            "Bulk insert committed"
        );

        Ok(inserted)
    }
}

#[async_trait]
impl AuthorStore for PgAuthorStorage {
    async fn get_by_id(&self, id: i64) -> DbResult<Option<Author>> {
        let author = sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(author)
    }

    async fn get_by_olid(&self, olid: &str) -> DbResult<Option<Author>> {
        let author = sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE olid = $1")
            .bind(olid)
            .fetch_optional(&self.db)
            .await?;
        Ok(author)
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> DbResult<Option<Author>> {
        let author = sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE uuid = $1")
            .bind(uuid)
            .fetch_optional(&self.db)
            .await?;
        Ok(author)
    }

    async fn list(&self, skip: i64, take: i64) -> DbResult<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>(
            "SELECT * FROM authors ORDER BY name ASC, id ASC LIMIT $1 OFFSET $2",
        )
        .bind(take)
        .bind(skip)
        .fetch_all(&self.db)
        .await?;
        Ok(authors)
    }

    async fn search(&self, params: &AuthorSearchParams) -> DbResult<Vec<Author>> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM authors");
        push_search_filters(&mut query_builder, params);
        query_builder
            .push(" ORDER BY name ASC, id ASC LIMIT ")
            .push_bind(params.take)
            .push(" OFFSET ")
            .push_bind(params.skip);

        let authors = query_builder
            .build_query_as::<Author>()
            .fetch_all(&self.db)
            .await?;
        Ok(authors)
    }

    async fn count(&self, params: &AuthorSearchParams) -> DbResult<i64> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM authors");
        push_search_filters(&mut query_builder, params);

        let count = query_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn update(&self, id: i64, update: &AuthorUpdate) -> DbResult<Option<Author>> {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE authors SET ");
        let mut set = query_builder.separated(", ");

        if let Some(name) = &update.name {
            set.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(birth_date) = update.birth_date {
            set.push("birth_date = ").push_bind_unseparated(birth_date);
        }
        if let Some(alternate_names) = &update.alternate_names {
            set.push("alternate_names = ")
                .push_bind_unseparated(alternate_names.clone());
        }
        if let Some(link) = &update.link {
            set.push("link = ").push_bind_unseparated(link.clone());
        }
        if let Some(rating_count) = update.rating_count {
            set.push("rating_count = ").push_bind_unseparated(rating_count);
        }
        if let Some(average_rating) = update.average_rating {
            set.push("average_rating = ").push_bind_unseparated(average_rating);
        }
        if let Some(gender) = update.gender {
            set.push("gender = ").push_bind_unseparated(gender);
        }
        if let Some(image_url) = &update.image_url {
            set.push("image_url = ").push_bind_unseparated(image_url.clone());
        }
        if let Some(about) = &update.about {
            set.push("about = ").push_bind_unseparated(about.clone());
        }
        set.push("updated_at = NOW()");

        query_builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING *");

        let author = query_builder
            .build_query_as::<Author>()
            .fetch_optional(&self.db)
            .await?;
        Ok(author)
    }

    async fn delete(&self, id: i64) -> DbResult<Option<Author>> {
        let author =
            sqlx::query_as::<_, Author>("DELETE FROM authors WHERE id = $1 RETURNING *")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        Ok(author)
    }
}

fn push_search_filters(query_builder: &mut QueryBuilder<'_, Postgres>, params: &AuthorSearchParams) {
    query_builder.push(" WHERE TRUE");

    if let Some(name) = &params.name {
        query_builder
            .push(" AND name ILIKE ")
            .push_bind(contains_pattern(name));
    }

    if let Some(alternate_name) = &params.alternate_name {
        query_builder
            .push(" AND ")
            .push_bind(alternate_name.clone())
            .push(" = ANY(alternate_names)");
    }

    if let Some(about) = &params.about {
        query_builder
            .push(" AND about ILIKE ")
            .push_bind(contains_pattern(about));
    }
}

/// `%term%` with LIKE wildcards in `term` escaped
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
