//! Document store
//!
//! Alerts and pet photo lists are stored as JSON documents keyed by pet id
//! in SQLite. Documents are read and written whole.
//!
//! Every write goes through one write lock, and read-modify-write cycles run
//! inside a transaction, so a document is never rebuilt from a stale copy.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use petfinder_common::{AlertDocument, PetImagesDocument, Result};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use tracing::debug;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS alerts (
        pet_id TEXT PRIMARY KEY NOT NULL,
        document TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS pet_images (
        pet_id TEXT PRIMARY KEY NOT NULL,
        document TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
];

const ALERTS: &str = "alerts";
const PET_IMAGES: &str = "pet_images";

/// SQLite-backed store for alert and pet photo documents
#[derive(Debug, Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl DocumentStore {
    /// Open (creating if needed) the database file at `db_path`
    pub async fn connect(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database, used by tests
    pub async fn in_memory() -> Result<Self> {
        // A single connection that is never recycled, or the data vanishes
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        debug!("Document store schema ready");

        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, table: &str, pet_id: &str) -> Result<Option<T>> {
        let mut conn = self.pool.acquire().await?;
        fetch_in(&mut conn, table, pet_id).await
    }

    async fn list<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let sql = format!("SELECT document FROM {} ORDER BY rowid", table);
        let documents: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;

        documents
            .iter()
            .map(|json| serde_json::from_str(json).map_err(Into::into))
            .collect()
    }

    async fn upsert(&self, table: &str, pet_id: &str, document: String) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.acquire().await?;
        upsert_in(&mut conn, table, pet_id, document).await
    }

    async fn delete(&self, table: &str, pet_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let sql = format!("DELETE FROM {} WHERE pet_id = ?", table);
        let result = sqlx::query(&sql).bind(pet_id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_alert(&self, pet_id: &str) -> Result<Option<AlertDocument>> {
        self.fetch(ALERTS, pet_id).await
    }

    pub async fn set_alert(&self, alert: &AlertDocument) -> Result<()> {
        let document = serde_json::to_string(alert)?;
        self.upsert(ALERTS, &alert.pet_id, document).await
    }

    pub async fn delete_alert(&self, pet_id: &str) -> Result<bool> {
        self.delete(ALERTS, pet_id).await
    }

    /// Every open alert, oldest first
    pub async fn list_alerts(&self) -> Result<Vec<AlertDocument>> {
        self.list(ALERTS).await
    }

    /// Apply `change` to the stored alert and write it back atomically.
    ///
    /// Returns `None` without writing when no alert exists for `pet_id`,
    /// so a closed alert is never brought back.
    pub async fn modify_alert<F, T>(&self, pet_id: &str, change: F) -> Result<Option<(AlertDocument, T)>>
    where
        F: FnOnce(&mut AlertDocument) -> T,
    {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let Some(mut alert) = fetch_in::<AlertDocument>(&mut tx, ALERTS, pet_id).await? else {
            return Ok(None);
        };
        let outcome = change(&mut alert);
        upsert_in(&mut tx, ALERTS, pet_id, serde_json::to_string(&alert)?).await?;

        tx.commit().await?;
        Ok(Some((alert, outcome)))
    }

    /// Create or replace the alert for `pet_id` from its current state
    pub async fn upsert_alert<F>(&self, pet_id: &str, build: F) -> Result<AlertDocument>
    where
        F: FnOnce(Option<AlertDocument>) -> Result<AlertDocument>,
    {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing = fetch_in::<AlertDocument>(&mut tx, ALERTS, pet_id).await?;
        let alert = build(existing)?;
        upsert_in(&mut tx, ALERTS, pet_id, serde_json::to_string(&alert)?).await?;

        tx.commit().await?;
        Ok(alert)
    }

    pub async fn get_pet_images(
        &self,
        pet_id: &str,
        create_if_not_present: bool,
    ) -> Result<Option<PetImagesDocument>> {
        if let Some(document) = self.fetch(PET_IMAGES, pet_id).await? {
            return Ok(Some(document));
        }
        if !create_if_not_present {
            return Ok(None);
        }

        let document = PetImagesDocument::new(pet_id);
        self.set_pet_images(&document).await?;
        Ok(Some(document))
    }

    pub async fn set_pet_images(&self, images: &PetImagesDocument) -> Result<()> {
        let document = serde_json::to_string(images)?;
        self.upsert(PET_IMAGES, &images.pet_id, document).await
    }

    /// Append a photo to the pet's list, creating the list if needed
    pub async fn add_pet_image(&self, pet_id: &str, image: &str, url: &str) -> Result<PetImagesDocument> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let mut photos = fetch_in::<PetImagesDocument>(&mut tx, PET_IMAGES, pet_id)
            .await?
            .unwrap_or_else(|| PetImagesDocument::new(pet_id));
        photos.add_image(image.to_string(), url.to_string());
        upsert_in(&mut tx, PET_IMAGES, pet_id, serde_json::to_string(&photos)?).await?;

        tx.commit().await?;
        Ok(photos)
    }

    /// Every pet photo list, oldest first
    pub async fn list_pet_images(&self) -> Result<Vec<PetImagesDocument>> {
        self.list(PET_IMAGES).await
    }

    pub async fn delete_pet_images(&self, pet_id: &str) -> Result<bool> {
        self.delete(PET_IMAGES, pet_id).await
    }
}

async fn fetch_in<T: DeserializeOwned>(
    conn: &mut SqliteConnection,
    table: &str,
    pet_id: &str,
) -> Result<Option<T>> {
    let sql = format!("SELECT document FROM {} WHERE pet_id = ?", table);
    let document: Option<String> = sqlx::query_scalar(&sql)
        .bind(pet_id)
        .fetch_optional(&mut *conn)
        .await?;

    match document {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

async fn upsert_in(conn: &mut SqliteConnection, table: &str, pet_id: &str, document: String) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (pet_id, document, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(pet_id) DO UPDATE SET document = excluded.document, updated_at = excluded.updated_at",
        table
    );
    sqlx::query(&sql)
        .bind(pet_id)
        .bind(document)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *conn)
        .await?;
    Ok(())
}
