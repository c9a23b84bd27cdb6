mod schema;

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Card, MasteryLevel, Set};

pub use schema::split_sql_statements;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),
    #[error("flashcard set not found")]
    SetNotFound,
    #[error("card not found")]
    CardNotFound,
    /// A stored document failed the read-side validation boundary: empty
    /// front/back text or a mastery value outside the five levels. The row
    /// is rejected rather than propagated.
    #[error("corrupt card document: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
}

/// A card accepted for persistence. Carries the mastery the user may have
/// already accumulated while studying the unsaved list.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub front: String,
    pub back: String,
    pub mastery: MasteryLevel,
}

/// SQLite-backed set store. Every operation takes the owner identity
/// explicitly and scopes its queries by it; there is no ambient user.
#[derive(Clone)]
pub struct SetStore {
    pool: SqlitePool,
}

impl SetStore {
    /// Open the database named by `DATABASE_PATH` (default
    /// `./data/flashpass.db`, `:memory:` for an in-process database) and
    /// apply the bundled schema.
    pub async fn from_env() -> Result<Self, StoreError> {
        let path = std::env::var("DATABASE_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "./data/flashpass.db".to_string());
        Self::connect(&path).await
    }

    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let in_memory = path == ":memory:";

        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(StoreError::Sql)?
                .foreign_keys(false)
        } else {
            let db_path = PathBuf::from(path);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StoreError::Validation(e.to_string()))?;
                }
            }
            SqliteConnectOptions::from_str(&format!("sqlite:{path}?mode=rwc"))
                .map_err(StoreError::Sql)?
                .create_if_missing(true)
                .foreign_keys(false)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(30))
        };

        // An in-memory database exists per connection; a second pool
        // connection would see an empty schema, and recycling the single
        // connection would drop the data.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;

        for statement in split_sql_statements(schema::SCHEMA_SQL) {
            let sql: String = statement
                .lines()
                .filter(|line| !line.trim().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n");
            let trimmed = sql.trim();
            if trimmed.is_empty() {
                continue;
            }
            sqlx::query(trimmed).execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create a set and its cards in one transaction. Empty title or an
    /// empty card list is a validation failure and performs no write.
    pub async fn create_set(
        &self,
        owner_id: &str,
        title: &str,
        cards: &[NewCard],
    ) -> Result<Set, StoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::Validation(
                "set title must not be empty".to_string(),
            ));
        }
        if cards.is_empty() {
            return Err(StoreError::Validation(
                "a set needs at least one card".to_string(),
            ));
        }
        for (index, card) in cards.iter().enumerate() {
            if card.front.trim().is_empty() || card.back.trim().is_empty() {
                return Err(StoreError::Validation(format!(
                    "card {} has an empty front or back",
                    index + 1
                )));
            }
        }

        let set_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO "flashcard_sets" ("id", "ownerId", "title", "createdAt")
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&set_id)
        .bind(owner_id)
        .bind(title)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        let mut stored = Vec::with_capacity(cards.len());
        for (position, card) in cards.iter().enumerate() {
            let card_id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO "cards"
                  ("id", "setId", "position", "front", "back", "mastery", "createdAt")
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&card_id)
            .bind(&set_id)
            .bind(position as i64)
            .bind(card.front.trim())
            .bind(card.back.trim())
            .bind(card.mastery.percent() as i64)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

            stored.push(Card {
                id: Some(card_id),
                front: card.front.trim().to_string(),
                back: card.back.trim().to_string(),
                mastery: card.mastery,
                created_at,
            });
        }

        tx.commit().await?;

        Ok(Set {
            id: set_id,
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            cards: stored,
            created_at,
        })
    }

    /// All of an owner's sets, newest first, each with its cards in
    /// presentation order.
    pub async fn list_sets(&self, owner_id: &str) -> Result<Vec<Set>, StoreError> {
        let set_rows = sqlx::query(
            r#"
            SELECT "id", "title", "createdAt"
            FROM "flashcard_sets"
            WHERE "ownerId" = $1
            ORDER BY "createdAt" DESC, "id" ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let card_rows = sqlx::query(
            r#"
            SELECT c."id", c."setId", c."front", c."back", c."mastery", c."createdAt"
            FROM "cards" c
            JOIN "flashcard_sets" s ON s."id" = c."setId"
            WHERE s."ownerId" = $1
            ORDER BY c."setId" ASC, c."position" ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let mut cards_by_set: HashMap<String, Vec<Card>> = HashMap::new();
        for row in card_rows {
            let set_id: String = row.try_get("setId")?;
            cards_by_set
                .entry(set_id)
                .or_default()
                .push(decode_card(&row)?);
        }

        let mut sets = Vec::with_capacity(set_rows.len());
        for row in set_rows {
            let id: String = row.try_get("id")?;
            let cards = cards_by_set.remove(&id).unwrap_or_default();
            sets.push(Set {
                cards,
                owner_id: owner_id.to_string(),
                title: row.try_get("title")?,
                created_at: row.try_get("createdAt")?,
                id,
            });
        }
        Ok(sets)
    }

    pub async fn get_set(&self, owner_id: &str, set_id: &str) -> Result<Set, StoreError> {
        let set_row = sqlx::query(
            r#"
            SELECT "id", "title", "createdAt"
            FROM "flashcard_sets"
            WHERE "id" = $1 AND "ownerId" = $2
            "#,
        )
        .bind(set_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::SetNotFound)?;

        let card_rows = sqlx::query(
            r#"
            SELECT "id", "setId", "front", "back", "mastery", "createdAt"
            FROM "cards"
            WHERE "setId" = $1
            ORDER BY "position" ASC
            "#,
        )
        .bind(set_id)
        .fetch_all(&self.pool)
        .await?;

        let mut cards = Vec::with_capacity(card_rows.len());
        for row in &card_rows {
            cards.push(decode_card(row)?);
        }

        Ok(Set {
            id: set_row.try_get("id")?,
            owner_id: owner_id.to_string(),
            title: set_row.try_get("title")?,
            created_at: set_row.try_get("createdAt")?,
            cards,
        })
    }

    /// Persist a new mastery value for one card, scoped by owner. The only
    /// mutation a saved set ever sees.
    pub async fn update_card_mastery(
        &self,
        owner_id: &str,
        set_id: &str,
        card_id: &str,
        level: MasteryLevel,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE "cards"
            SET "mastery" = $1
            WHERE "id" = $2
              AND "setId" IN (
                SELECT "id" FROM "flashcard_sets"
                WHERE "id" = $3 AND "ownerId" = $4
              )
            "#,
        )
        .bind(level.percent() as i64)
        .bind(card_id)
        .bind(set_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::CardNotFound);
        }
        Ok(())
    }
}

/// Read-side validation boundary: stored documents with missing text or an
/// out-of-range mastery value are rejected here, never handed to the
/// engine.
fn decode_card(row: &sqlx::sqlite::SqliteRow) -> Result<Card, StoreError> {
    let id: String = row.try_get("id")?;
    let front: String = row.try_get("front")?;
    let back: String = row.try_get("back")?;
    let mastery_raw: i64 = row.try_get("mastery")?;
    let created_at: DateTime<Utc> = row.try_get("createdAt")?;

    if front.trim().is_empty() || back.trim().is_empty() {
        return Err(StoreError::Corrupt(format!("card {id} has an empty side")));
    }
    let mastery = MasteryLevel::from_percent(mastery_raw)
        .map_err(|err| StoreError::Corrupt(format!("card {id}: {err}")))?;

    Ok(Card {
        id: Some(id),
        front,
        back,
        mastery,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SetStore {
        SetStore::connect(":memory:").await.unwrap()
    }

    fn drafts(n: usize) -> Vec<NewCard> {
        (0..n)
            .map(|i| NewCard {
                front: format!("front {i}"),
                back: format!("back {i}"),
                mastery: MasteryLevel::ZERO,
            })
            .collect()
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = store().await;
        let created = store.create_set("owner-1", "Capitals", &drafts(3)).await.unwrap();

        let fetched = store.get_set("owner-1", &created.id).await.unwrap();
        assert_eq!(fetched.title, "Capitals");
        assert_eq!(fetched.cards.len(), 3);
        assert_eq!(fetched.cards[0].front, "front 0");
        assert_eq!(fetched.cards[2].front, "front 2");
    }

    #[tokio::test]
    async fn empty_title_writes_nothing() {
        let store = store().await;
        let err = store.create_set("owner-1", "  ", &drafts(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.list_sets("owner-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_card_list_is_rejected() {
        let store = store().await;
        let err = store.create_set("owner-1", "Capitals", &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn sets_are_scoped_to_their_owner() {
        let store = store().await;
        let created = store.create_set("owner-1", "Mine", &drafts(1)).await.unwrap();

        assert!(matches!(
            store.get_set("owner-2", &created.id).await,
            Err(StoreError::SetNotFound)
        ));
        assert!(store.list_sets("owner-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mastery_update_persists_and_checks_ownership() {
        let store = store().await;
        let created = store.create_set("owner-1", "Mine", &drafts(2)).await.unwrap();
        let card_id = created.cards[1].id.clone().unwrap();

        store
            .update_card_mastery("owner-1", &created.id, &card_id, MasteryLevel::MAX)
            .await
            .unwrap();

        let fetched = store.get_set("owner-1", &created.id).await.unwrap();
        assert_eq!(fetched.cards[1].mastery, MasteryLevel::MAX);
        assert_eq!(fetched.cards[0].mastery, MasteryLevel::ZERO);

        assert!(matches!(
            store
                .update_card_mastery("owner-2", &created.id, &card_id, MasteryLevel::MAX)
                .await,
            Err(StoreError::CardNotFound)
        ));
    }

    #[tokio::test]
    async fn corrupt_mastery_is_rejected_on_read() {
        let store = store().await;
        let created = store.create_set("owner-1", "Mine", &drafts(1)).await.unwrap();
        let card_id = created.cards[0].id.clone().unwrap();

        sqlx::query(r#"UPDATE "cards" SET "mastery" = 63 WHERE "id" = $1"#)
            .bind(&card_id)
            .execute(store.pool())
            .await
            .unwrap();

        assert!(matches!(
            store.get_set("owner-1", &created.id).await,
            Err(StoreError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn saved_mastery_is_carried_from_new_cards() {
        let store = store().await;
        let cards = vec![NewCard {
            front: "Paris".into(),
            back: "Capital of France".into(),
            mastery: MasteryLevel::from_percent(75).unwrap(),
        }];
        let created = store.create_set("owner-1", "Capitals", &cards).await.unwrap();
        assert_eq!(created.cards[0].mastery.percent(), 75);
    }
}
