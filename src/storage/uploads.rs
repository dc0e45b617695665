use async_trait::async_trait;

use super::schema::Database;
use super::types::{StoreError, UploadDbRow, UploadRecord, UploadStatus};
use super::EpisodeStore;

const UPLOAD_COLUMNS: &str = "id, title, description, file_path, processed_file_path, \
     file_size, mime_type, status, duration_secs, created_at";

impl Database {
    // ========================================================================
    // Upload Operations
    // ========================================================================

    /// Insert an upload, or overwrite every column of an existing one with the same id.
    pub async fn upsert_upload(&self, upload: &UploadRecord) -> Result<(), StoreError> {
        let file_size = i64::try_from(upload.file_size).map_err(|_| {
            StoreError::InvalidRecord(format!(
                "upload {} file size {} exceeds storage range",
                upload.id, upload.file_size
            ))
        })?;
        let duration_secs = upload.duration_secs.and_then(|d| i64::try_from(d).ok());

        sqlx::query(
            r#"
            INSERT INTO uploads
                (id, title, description, file_path, processed_file_path,
                 file_size, mime_type, status, duration_secs, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                file_path = excluded.file_path,
                processed_file_path = excluded.processed_file_path,
                file_size = excluded.file_size,
                mime_type = excluded.mime_type,
                status = excluded.status,
                duration_secs = excluded.duration_secs,
                created_at = excluded.created_at
        "#,
        )
        .bind(&upload.id)
        .bind(&upload.title)
        .bind(&upload.description)
        .bind(&upload.file_path)
        .bind(&upload.processed_file_path)
        .bind(file_size)
        .bind(&upload.mime_type)
        .bind(upload.status.as_str())
        .bind(duration_secs)
        .bind(upload.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(())
    }

    /// Update only the status column. Returns `false` if no upload has that id.
    pub async fn set_upload_status(
        &self,
        id: &str,
        status: UploadStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE uploads SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    /// Fetch a single upload by id.
    pub async fn get_upload(&self, id: &str) -> Result<Option<UploadRecord>, StoreError> {
        let row: Option<UploadDbRow> =
            sqlx::query_as(&format!("SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;

        row.map(UploadDbRow::into_record).transpose()
    }

    /// Fetch every upload, newest first.
    pub async fn get_all_uploads(&self) -> Result<Vec<UploadRecord>, StoreError> {
        let rows: Vec<UploadDbRow> = sqlx::query_as(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM uploads ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        rows.into_iter().map(UploadDbRow::into_record).collect()
    }
}

#[async_trait]
impl EpisodeStore for Database {
    async fn get_upload(&self, id: &str) -> Result<Option<UploadRecord>, StoreError> {
        Database::get_upload(self, id).await
    }

    async fn get_all_uploads(&self) -> Result<Vec<UploadRecord>, StoreError> {
        Database::get_all_uploads(self).await
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, EpisodeStore, StoreError, UploadRecord, UploadStatus};
    use chrono::{TimeZone, Utc};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn test_upload(id: &str, minute: u32) -> UploadRecord {
        UploadRecord {
            id: id.to_string(),
            title: format!("Episode {id}"),
            description: Some("Weekly show".to_string()),
            file_path: format!("uploads/{id}.mp3"),
            processed_file_path: None,
            file_size: 1_024,
            mime_type: "audio/mpeg".to_string(),
            status: UploadStatus::Completed,
            duration_secs: Some(95),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, minute, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_upload() {
        let db = test_db().await;
        let upload = test_upload("a1", 0);

        db.upsert_upload(&upload).await.unwrap();

        let fetched = db.get_upload("a1").await.unwrap();
        assert_eq!(fetched, Some(upload));
    }

    #[tokio::test]
    async fn test_get_missing_upload_returns_none() {
        let db = test_db().await;
        assert!(db.get_upload("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_existing() {
        let db = test_db().await;
        let mut upload = test_upload("a1", 0);
        db.upsert_upload(&upload).await.unwrap();

        upload.title = "Renamed".to_string();
        upload.processed_file_path = Some("processed/a1.mp3".to_string());
        db.upsert_upload(&upload).await.unwrap();

        let all = db.get_all_uploads().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Renamed");
        assert_eq!(all[0].media_path(), "processed/a1.mp3");
    }

    #[tokio::test]
    async fn test_get_all_uploads_newest_first() {
        let db = test_db().await;
        db.upsert_upload(&test_upload("old", 0)).await.unwrap();
        db.upsert_upload(&test_upload("new", 30)).await.unwrap();
        db.upsert_upload(&test_upload("mid", 15)).await.unwrap();

        let ids: Vec<String> = db
            .get_all_uploads()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_set_upload_status() {
        let db = test_db().await;
        let mut upload = test_upload("a1", 0);
        upload.status = UploadStatus::Processing;
        db.upsert_upload(&upload).await.unwrap();

        assert!(db
            .set_upload_status("a1", UploadStatus::Completed)
            .await
            .unwrap());
        assert!(!db
            .set_upload_status("missing", UploadStatus::Completed)
            .await
            .unwrap());

        let fetched = db.get_upload("a1").await.unwrap().unwrap();
        assert_eq!(fetched.status, UploadStatus::Completed);
    }

    #[tokio::test]
    async fn test_unknown_status_is_invalid_record() {
        let db = test_db().await;
        sqlx::query(
            "INSERT INTO uploads (id, title, file_path, file_size, mime_type, status, created_at)
             VALUES ('bad', 'Bad', 'x.mp3', 10, 'audio/mpeg', 'exploded', 0)",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let result = db.get_upload("bad").await;
        assert!(matches!(result, Err(StoreError::InvalidRecord(_))));
    }

    #[tokio::test]
    async fn test_episode_store_trait_object() {
        let db = test_db().await;
        db.upsert_upload(&test_upload("a1", 0)).await.unwrap();

        let store: &dyn EpisodeStore = &db;
        assert!(store.get_upload("a1").await.unwrap().is_some());
        assert_eq!(store.get_all_uploads().await.unwrap().len(), 1);
    }
}
