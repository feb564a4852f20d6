//! PostgreSQL grammar store
//!
//! All SQL is runtime-checked (sqlx::query, not sqlx::query!) to avoid a
//! compile-time database requirement. Each mutation runs in its own
//! transaction and locks the grammar row first, so concurrent updates and
//! deletes of the same id are serialized.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::store::PatternStore;
use super::types::{GrammarPattern, GrammarSummary, TagGrammar};
use crate::error::Result;

pub struct PgPatternStore {
    pool: PgPool,
}

impl PgPatternStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Create the grammar tables if they do not exist yet
    pub async fn init_schema(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tag_grammars (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                entire_pattern TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS grammar_contents (
                id BIGSERIAL PRIMARY KEY,
                grammar_id BIGINT NOT NULL REFERENCES tag_grammars(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                pattern TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_contents(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        grammar_id: i64,
        contents: &[GrammarPattern],
    ) -> Result<()> {
        for content in contents {
            sqlx::query(
                r#"
                INSERT INTO grammar_contents (grammar_id, name, pattern)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(grammar_id)
            .bind(&content.name)
            .bind(&content.pattern)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Lock the grammar row for the rest of the transaction
    async fn lock_row(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: i64,
    ) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM tag_grammars WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl PatternStore for PgPatternStore {
    async fn create(&self, grammar: &TagGrammar) -> Result<i64> {
        grammar.validate()?;
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tag_grammars (name, entire_pattern)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(&grammar.entire_pattern.name)
        .bind(&grammar.entire_pattern.pattern)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_contents(&mut tx, id, &grammar.contents).await?;
        tx.commit().await?;

        tracing::debug!(id, name = grammar.name(), "Grammar created");
        Ok(id)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<TagGrammar>> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query("SELECT name, entire_pattern FROM tag_grammars WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let contents = sqlx::query(
            r#"
            SELECT name, pattern
            FROM grammar_contents
            WHERE grammar_id = $1
            ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|r| GrammarPattern::new(r.get::<String, _>("name"), r.get::<String, _>("pattern")))
        .collect();

        tx.commit().await?;

        Ok(Some(TagGrammar::new(
            GrammarPattern::new(
                row.get::<String, _>("name"),
                row.get::<String, _>("entire_pattern"),
            ),
            contents,
        )))
    }

    async fn list_all(&self) -> Result<Vec<GrammarSummary>> {
        let rows = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT id, name, entire_pattern FROM tag_grammars ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, entire_pattern)| GrammarSummary {
                id,
                name,
                entire_pattern,
            })
            .collect())
    }

    async fn update(&self, id: i64, grammar: &TagGrammar) -> Result<bool> {
        grammar.validate()?;
        let mut tx = self.pool.begin().await?;

        if !Self::lock_row(&mut tx, id).await? {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE tag_grammars
            SET name = $1, entire_pattern = $2
            WHERE id = $3
            "#,
        )
        .bind(&grammar.entire_pattern.name)
        .bind(&grammar.entire_pattern.pattern)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM grammar_contents WHERE grammar_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        Self::insert_contents(&mut tx, id, &grammar.contents).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if !Self::lock_row(&mut tx, id).await? {
            return Ok(false);
        }

        sqlx::query("DELETE FROM grammar_contents WHERE grammar_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tag_grammars WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_all(&self) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM grammar_contents")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tag_grammars")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn health_check(&self) -> Result<bool> {
        let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(one == 1)
    }
}
