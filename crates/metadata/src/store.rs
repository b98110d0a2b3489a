//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{CatalogRepo, TokenRepo, UploadRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: UploadRepo + CatalogRepo + TokenRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout = Duration::from_secs(query_timeout_secs.unwrap_or(30));

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // One connection: SQLite serialises writers anyway, and a single
        // connection avoids "database is locked" under request concurrency.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout,
        };
        store.migrate().await?;

        tracing::info!(
            path = %path.display(),
            query_timeout_secs = query_timeout.as_secs(),
            "opened sqlite metadata store"
        );

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        tokio::time::timeout(
            self.query_timeout,
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await
        .map_err(|_| {
            MetadataError::Internal(format!(
                "health check exceeded {}s",
                self.query_timeout.as_secs()
            ))
        })??;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::SegmentUpdate;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl UploadRepo for SqliteStore {
        async fn create_session(&self, session: &UploadSessionRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO upload_sessions (
                    upload_id, owner_id, trip_id, segment_id, filename, media_kind,
                    expected_sha256, declared_length, received_offset, status,
                    error_code, error_detail, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(session.upload_id)
            .bind(session.owner_id)
            .bind(session.trip_id)
            .bind(session.segment_id)
            .bind(&session.filename)
            .bind(&session.media_kind)
            .bind(&session.expected_sha256)
            .bind(session.declared_length)
            .bind(session.received_offset)
            .bind(&session.status)
            .bind(&session.error_code)
            .bind(&session.error_detail)
            .bind(session.created_at)
            .bind(session.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::from_insert("upload session", e))?;
            Ok(())
        }

        async fn get_session(&self, upload_id: Uuid) -> MetadataResult<Option<UploadSessionRow>> {
            let row = sqlx::query_as::<_, UploadSessionRow>(
                "SELECT * FROM upload_sessions WHERE upload_id = ?",
            )
            .bind(upload_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn delete_session(&self, upload_id: Uuid) -> MetadataResult<bool> {
            let result = sqlx::query("DELETE FROM upload_sessions WHERE upload_id = ?")
                .bind(upload_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn advance_offset(
            &self,
            upload_id: Uuid,
            expected_offset: i64,
            new_offset: i64,
            status: &str,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                r#"
                UPDATE upload_sessions
                SET received_offset = ?, status = ?, updated_at = ?
                WHERE upload_id = ?
                  AND received_offset = ?
                  AND status IN ('pending', 'receiving')
                "#,
            )
            .bind(new_offset)
            .bind(status)
            .bind(updated_at)
            .bind(upload_id)
            .bind(expected_offset)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn set_status(
            &self,
            upload_id: Uuid,
            status: &str,
            error_code: Option<&str>,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE upload_sessions SET status = ?, error_code = ?, updated_at = ? WHERE upload_id = ?",
            )
            .bind(status)
            .bind(error_code)
            .bind(updated_at)
            .bind(upload_id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("upload session {upload_id}")));
            }
            Ok(())
        }

        async fn fail_session(
            &self,
            upload_id: Uuid,
            error_code: &str,
            error_detail: Option<&str>,
            failed_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query(
                "UPDATE upload_sessions SET status = 'failed', error_code = ?, error_detail = ?, updated_at = ? WHERE upload_id = ?",
            )
            .bind(error_code)
            .bind(error_detail)
            .bind(failed_at)
            .bind(upload_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn list_sessions_for_owner(
            &self,
            owner_id: Uuid,
            limit: u32,
        ) -> MetadataResult<Vec<UploadSessionRow>> {
            let rows = sqlx::query_as::<_, UploadSessionRow>(
                "SELECT * FROM upload_sessions WHERE owner_id = ? ORDER BY updated_at DESC, created_at DESC LIMIT ?",
            )
            .bind(owner_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl CatalogRepo for SqliteStore {
        async fn create_trip(&self, trip: &TripRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO trips (trip_id, owner_id, title, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(trip.trip_id)
            .bind(trip.owner_id)
            .bind(&trip.title)
            .bind(trip.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::from_insert("trip", e))?;
            Ok(())
        }

        async fn get_trip(&self, trip_id: Uuid) -> MetadataResult<Option<TripRow>> {
            let row = sqlx::query_as::<_, TripRow>("SELECT * FROM trips WHERE trip_id = ?")
                .bind(trip_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn create_segment(&self, segment: &SegmentRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO segments (
                    segment_id, trip_id, sequence, file_size_bytes, sha256, created_at
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(segment.segment_id)
            .bind(segment.trip_id)
            .bind(segment.sequence)
            .bind(segment.file_size_bytes)
            .bind(&segment.sha256)
            .bind(segment.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::from_insert("segment", e))?;
            Ok(())
        }

        async fn get_segment(&self, segment_id: Uuid) -> MetadataResult<Option<SegmentRow>> {
            let row =
                sqlx::query_as::<_, SegmentRow>("SELECT * FROM segments WHERE segment_id = ?")
                    .bind(segment_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn segment_owned_by(
            &self,
            trip_id: Uuid,
            segment_id: Uuid,
            owner_id: Uuid,
        ) -> MetadataResult<bool> {
            let owned: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM segments s
                    JOIN trips t ON t.trip_id = s.trip_id
                    WHERE s.segment_id = ? AND s.trip_id = ? AND t.owner_id = ?
                )
                "#,
            )
            .bind(segment_id)
            .bind(trip_id)
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
            Ok(owned)
        }

        async fn record_stored_file(
            &self,
            file: &StoredFileRow,
            segment_update: Option<&SegmentUpdate>,
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                r#"
                INSERT INTO stored_files (
                    file_id, segment_id, upload_id, media_kind, storage_uri,
                    sha256, size_bytes, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(file.file_id)
            .bind(file.segment_id)
            .bind(file.upload_id)
            .bind(&file.media_kind)
            .bind(&file.storage_uri)
            .bind(&file.sha256)
            .bind(file.size_bytes)
            .bind(file.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| MetadataError::from_insert("stored file", e))?;

            if let Some(update) = segment_update {
                let result = sqlx::query(
                    "UPDATE segments SET file_size_bytes = ?, sha256 = ? WHERE segment_id = ?",
                )
                .bind(update.file_size_bytes)
                .bind(&update.sha256)
                .bind(file.segment_id)
                .execute(&mut *tx)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(MetadataError::NotFound(format!(
                        "segment {}",
                        file.segment_id
                    )));
                }
            }

            tx.commit().await?;
            Ok(())
        }

        async fn list_stored_files(&self, segment_id: Uuid) -> MetadataResult<Vec<StoredFileRow>> {
            let rows = sqlx::query_as::<_, StoredFileRow>(
                "SELECT * FROM stored_files WHERE segment_id = ? ORDER BY created_at ASC",
            )
            .bind(segment_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl TokenRepo for SqliteStore {
        async fn create_token(&self, token: &TokenRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO tokens (
                    token_id, owner_id, token_hash, expires_at,
                    revoked_at, created_at, last_used_at, description
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(token.token_id)
            .bind(token.owner_id)
            .bind(&token.token_hash)
            .bind(token.expires_at)
            .bind(token.revoked_at)
            .bind(token.created_at)
            .bind(token.last_used_at)
            .bind(&token.description)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::from_insert("token", e))?;
            Ok(())
        }

        async fn get_token_by_hash(&self, token_hash: &str) -> MetadataResult<Option<TokenRow>> {
            let row = sqlx::query_as::<_, TokenRow>("SELECT * FROM tokens WHERE token_hash = ?")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn touch_token(&self, token_id: Uuid, used_at: OffsetDateTime) -> MetadataResult<()> {
            sqlx::query("UPDATE tokens SET last_used_at = ? WHERE token_id = ?")
                .bind(used_at)
                .bind(token_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn revoke_token(
            &self,
            token_id: Uuid,
            revoked_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query("UPDATE tokens SET revoked_at = ? WHERE token_id = ?")
                .bind(revoked_at)
                .bind(token_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Trip catalog
CREATE TABLE IF NOT EXISTS trips (
    trip_id BLOB PRIMARY KEY,
    owner_id BLOB NOT NULL,
    title TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_trips_owner ON trips(owner_id);

CREATE TABLE IF NOT EXISTS segments (
    segment_id BLOB PRIMARY KEY,
    trip_id BLOB NOT NULL REFERENCES trips(trip_id) ON DELETE CASCADE,
    sequence INTEGER NOT NULL DEFAULT 0,
    file_size_bytes INTEGER,
    sha256 TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_segments_trip ON segments(trip_id, sequence);

-- Upload sessions
CREATE TABLE IF NOT EXISTS upload_sessions (
    upload_id BLOB PRIMARY KEY,
    owner_id BLOB NOT NULL,
    trip_id BLOB NOT NULL,
    segment_id BLOB NOT NULL,
    filename TEXT NOT NULL,
    media_kind TEXT NOT NULL,
    expected_sha256 TEXT,
    declared_length INTEGER NOT NULL CHECK (declared_length >= 0),
    received_offset INTEGER NOT NULL DEFAULT 0
        CHECK (received_offset >= 0 AND received_offset <= declared_length),
    status TEXT NOT NULL DEFAULT 'pending',
    error_code TEXT,
    error_detail TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_upload_sessions_owner ON upload_sessions(owner_id, updated_at);
CREATE INDEX IF NOT EXISTS idx_upload_sessions_status ON upload_sessions(status, updated_at);

-- Completed artifacts
CREATE TABLE IF NOT EXISTS stored_files (
    file_id BLOB PRIMARY KEY,
    segment_id BLOB NOT NULL REFERENCES segments(segment_id) ON DELETE CASCADE,
    upload_id BLOB NOT NULL UNIQUE,
    media_kind TEXT NOT NULL,
    storage_uri TEXT NOT NULL UNIQUE,
    sha256 TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_stored_files_segment ON stored_files(segment_id);

-- API tokens
CREATE TABLE IF NOT EXISTS tokens (
    token_id BLOB PRIMARY KEY,
    owner_id BLOB NOT NULL,
    token_hash TEXT NOT NULL UNIQUE,
    expires_at TEXT,
    revoked_at TEXT,
    created_at TEXT NOT NULL,
    last_used_at TEXT,
    description TEXT
);
CREATE INDEX IF NOT EXISTS idx_tokens_owner ON tokens(owner_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use crate::repos::SegmentUpdate;
    use time::OffsetDateTime;
    use uuid::Uuid;

    async fn open() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("metadata.db"), None)
            .await
            .unwrap();
        (dir, store)
    }

    async fn seed_segment(store: &SqliteStore, owner_id: Uuid) -> (Uuid, Uuid) {
        let now = OffsetDateTime::now_utc();
        let trip_id = Uuid::new_v4();
        let segment_id = Uuid::new_v4();
        store
            .create_trip(&TripRow {
                trip_id,
                owner_id,
                title: Some("Coast road".to_string()),
                created_at: now,
            })
            .await
            .unwrap();
        store
            .create_segment(&SegmentRow {
                segment_id,
                trip_id,
                sequence: 1,
                file_size_bytes: None,
                sha256: None,
                created_at: now,
            })
            .await
            .unwrap();
        (trip_id, segment_id)
    }

    fn session_row(owner_id: Uuid, trip_id: Uuid, segment_id: Uuid) -> UploadSessionRow {
        let now = OffsetDateTime::now_utc();
        UploadSessionRow {
            upload_id: Uuid::new_v4(),
            owner_id,
            trip_id,
            segment_id,
            filename: "front.mp4".to_string(),
            media_kind: "video_mp4".to_string(),
            expected_sha256: None,
            declared_length: 100,
            received_offset: 0,
            status: "pending".to_string(),
            error_code: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_session_roundtrip_and_delete() {
        let (_dir, store) = open().await;
        let owner = Uuid::new_v4();
        let (trip, segment) = seed_segment(&store, owner).await;
        let row = session_row(owner, trip, segment);

        store.create_session(&row).await.unwrap();
        let fetched = store.get_session(row.upload_id).await.unwrap().unwrap();
        assert_eq!(fetched.filename, "front.mp4");
        assert_eq!(fetched.declared_length, 100);
        assert_eq!(fetched.status, "pending");

        assert!(matches!(
            store.create_session(&row).await,
            Err(MetadataError::AlreadyExists(_))
        ));

        assert!(store.delete_session(row.upload_id).await.unwrap());
        assert!(!store.delete_session(row.upload_id).await.unwrap());
        assert!(store.get_session(row.upload_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_advance_offset_is_compare_and_set() {
        let (_dir, store) = open().await;
        let owner = Uuid::new_v4();
        let (trip, segment) = seed_segment(&store, owner).await;
        let row = session_row(owner, trip, segment);
        store.create_session(&row).await.unwrap();
        let now = OffsetDateTime::now_utc();

        assert!(
            store
                .advance_offset(row.upload_id, 0, 40, "receiving", now)
                .await
                .unwrap()
        );
        // Stale expected offset loses.
        assert!(
            !store
                .advance_offset(row.upload_id, 0, 40, "receiving", now)
                .await
                .unwrap()
        );

        store
            .set_status(row.upload_id, "complete", None, now)
            .await
            .unwrap();
        // Terminal sessions never move.
        assert!(
            !store
                .advance_offset(row.upload_id, 40, 100, "receiving", now)
                .await
                .unwrap()
        );

        let fetched = store.get_session(row.upload_id).await.unwrap().unwrap();
        assert_eq!(fetched.received_offset, 40);
        assert_eq!(fetched.status, "complete");
    }

    #[tokio::test]
    async fn test_fail_session_records_error() {
        let (_dir, store) = open().await;
        let owner = Uuid::new_v4();
        let (trip, segment) = seed_segment(&store, owner).await;
        let row = session_row(owner, trip, segment);
        store.create_session(&row).await.unwrap();

        store
            .fail_session(
                row.upload_id,
                "checksum_mismatch",
                Some("expected aa, got bb"),
                OffsetDateTime::now_utc(),
            )
            .await
            .unwrap();

        let fetched = store.get_session(row.upload_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, "failed");
        assert_eq!(fetched.error_code.as_deref(), Some("checksum_mismatch"));
        assert_eq!(fetched.error_detail.as_deref(), Some("expected aa, got bb"));
    }

    #[tokio::test]
    async fn test_set_status_missing_session() {
        let (_dir, store) = open().await;
        let result = store
            .set_status(Uuid::new_v4(), "failed", None, OffsetDateTime::now_utc())
            .await;
        assert!(matches!(result, Err(MetadataError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_sessions_for_owner_scoped() {
        let (_dir, store) = open().await;
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (trip, segment) = seed_segment(&store, owner).await;

        for _ in 0..3 {
            store
                .create_session(&session_row(owner, trip, segment))
                .await
                .unwrap();
        }
        store
            .create_session(&session_row(other, trip, segment))
            .await
            .unwrap();

        assert_eq!(store.list_sessions_for_owner(owner, 10).await.unwrap().len(), 3);
        assert_eq!(store.list_sessions_for_owner(owner, 2).await.unwrap().len(), 2);
        assert_eq!(store.list_sessions_for_owner(other, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_segment_ownership() {
        let (_dir, store) = open().await;
        let owner = Uuid::new_v4();
        let (trip, segment) = seed_segment(&store, owner).await;
        let (other_trip, _) = seed_segment(&store, Uuid::new_v4()).await;

        assert!(store.segment_owned_by(trip, segment, owner).await.unwrap());
        assert!(!store.segment_owned_by(trip, segment, Uuid::new_v4()).await.unwrap());
        assert!(!store.segment_owned_by(other_trip, segment, owner).await.unwrap());
        assert!(!store.segment_owned_by(trip, Uuid::new_v4(), owner).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_stored_file_updates_segment() {
        let (_dir, store) = open().await;
        let owner = Uuid::new_v4();
        let (_trip, segment) = seed_segment(&store, owner).await;
        let file = StoredFileRow {
            file_id: Uuid::new_v4(),
            segment_id: segment,
            upload_id: Uuid::new_v4(),
            media_kind: "video_mp4".to_string(),
            storage_uri: "segments/s/u/front.mp4".to_string(),
            sha256: "ab".repeat(32),
            size_bytes: 4096,
            created_at: OffsetDateTime::now_utc(),
        };
        let update = SegmentUpdate {
            file_size_bytes: 4096,
            sha256: "ab".repeat(32),
        };

        store.record_stored_file(&file, Some(&update)).await.unwrap();

        let seg = store.get_segment(segment).await.unwrap().unwrap();
        assert_eq!(seg.file_size_bytes, Some(4096));
        assert_eq!(seg.sha256, Some("ab".repeat(32)));
        let files = store.list_stored_files(segment).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].storage_uri, "segments/s/u/front.mp4");
    }

    #[tokio::test]
    async fn test_record_stored_file_rolls_back_on_missing_segment() {
        let (_dir, store) = open().await;
        let missing_segment = Uuid::new_v4();
        let file = StoredFileRow {
            file_id: Uuid::new_v4(),
            segment_id: missing_segment,
            upload_id: Uuid::new_v4(),
            media_kind: "gps_gpx".to_string(),
            storage_uri: "segments/x/y/track.gpx".to_string(),
            sha256: "cd".repeat(32),
            size_bytes: 10,
            created_at: OffsetDateTime::now_utc(),
        };

        // Foreign key on segment_id rejects the insert.
        assert!(store.record_stored_file(&file, None).await.is_err());
        assert!(store.list_stored_files(missing_segment).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_lookup_and_revoke() {
        let (_dir, store) = open().await;
        let now = OffsetDateTime::now_utc();
        let token = TokenRow {
            token_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            token_hash: "ef".repeat(32),
            expires_at: None,
            revoked_at: None,
            created_at: now,
            last_used_at: None,
            description: Some("dashcam".to_string()),
        };
        store.create_token(&token).await.unwrap();

        let found = store.get_token_by_hash(&"ef".repeat(32)).await.unwrap().unwrap();
        assert_eq!(found.owner_id, token.owner_id);

        store.touch_token(token.token_id, now).await.unwrap();
        store.revoke_token(token.token_id, now).await.unwrap();
        let found = store.get_token_by_hash(&"ef".repeat(32)).await.unwrap().unwrap();
        assert!(found.last_used_at.is_some());
        assert!(found.revoked_at.is_some());
        assert!(store.get_token_by_hash("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let (_dir, store) = open().await;
        store.migrate().await.unwrap();
        store.health_check().await.unwrap();
    }
}
