/// SQLite-backed [`ResultStore`].
///
/// Emotions are kept as JSON text and timestamps as fixed-width RFC 3339
/// UTC strings, so `ORDER BY timestamp` is chronological.
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use thiserror::Error;

use crate::emotion::domain::emotion::Emotion;
use crate::storage::domain::detection_record::{DetectionRecord, SourceType};
use crate::storage::domain::page::Page;
use crate::storage::domain::result_store::ResultStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode emotions: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt row {id}: {message}")]
    Corrupt { id: i64, message: String },
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS emotion_results (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp        TEXT    NOT NULL,
        filename         TEXT    NOT NULL,
        source_type      TEXT    NOT NULL,
        emotions         TEXT    NOT NULL,
        dominant_emotion TEXT    NOT NULL,
        confidence       REAL    NOT NULL,
        faces_detected   INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_emotion_results_timestamp
        ON emotion_results (timestamp);
";

const SELECT_COLUMNS: &str = "SELECT id, timestamp, filename, source_type, emotions, \
     dominant_emotion, confidence, faces_detected FROM emotion_results";

pub struct SqliteResultStore {
    conn: Connection,
}

impl SqliteResultStore {
    /// Opens (or creates) the database file and its table.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self::init(Connection::open(path)?)?;
        log::debug!("Opened result store at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn save_records(&mut self, records: &[DetectionRecord]) -> Result<Vec<i64>, StoreError> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(records.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO emotion_results (timestamp, filename, source_type, emotions, \
                 dominant_emotion, confidence, faces_detected) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for record in records {
                stmt.execute(params![
                    format_timestamp(&record.timestamp),
                    record.filename,
                    record.source_type.as_str(),
                    serde_json::to_string(&record.emotions)?,
                    record.dominant_emotion.label(),
                    record.confidence,
                    record.faces_detected as i64,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn emotion_counts(&self) -> Result<Vec<(Emotion, u64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT dominant_emotion, COUNT(*) AS n FROM emotion_results \
             GROUP BY dominant_emotion ORDER BY n DESC, dominant_emotion ASC",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(label, n)| {
                let emotion = label.parse::<Emotion>().map_err(|e| StoreError::Corrupt {
                    id: 0,
                    message: e.to_string(),
                })?;
                Ok((emotion, n as u64))
            })
            .collect()
    }

    pub fn newest(&self, limit: usize, offset: usize) -> Result<Vec<DetectionRecord>, StoreError> {
        // SQLite reads a negative OFFSET as 0, so an offset past i64 has no rows.
        let Ok(offset) = i64::try_from(offset) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!("{SELECT_COLUMNS} ORDER BY timestamp DESC, id DESC LIMIT ?1 OFFSET ?2");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit, offset], RawRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawRow::into_record).collect()
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM emotion_results", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn page_of(&self, page: usize, per_page: usize) -> Result<Page<DetectionRecord>, StoreError> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        Ok(Page {
            items: self.newest(per_page, Page::<DetectionRecord>::offset(page, per_page))?,
            page,
            per_page,
            total: self.count()?,
        })
    }
}

impl ResultStore for SqliteResultStore {
    fn save(&mut self, records: &[DetectionRecord]) -> Result<Vec<i64>, Box<dyn std::error::Error>> {
        Ok(self.save_records(records)?)
    }

    fn counts_by_emotion(&self) -> Result<Vec<(Emotion, u64)>, Box<dyn std::error::Error>> {
        Ok(self.emotion_counts()?)
    }

    fn recent(&self, limit: usize) -> Result<Vec<DetectionRecord>, Box<dyn std::error::Error>> {
        Ok(self.newest(limit, 0)?)
    }

    fn page(
        &self,
        page: usize,
        per_page: usize,
    ) -> Result<Page<DetectionRecord>, Box<dyn std::error::Error>> {
        Ok(self.page_of(page, per_page)?)
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Column values as stored, before domain validation.
struct RawRow {
    id: i64,
    timestamp: String,
    filename: String,
    source_type: String,
    emotions: String,
    dominant_emotion: String,
    confidence: f64,
    faces_detected: i64,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            filename: row.get(2)?,
            source_type: row.get(3)?,
            emotions: row.get(4)?,
            dominant_emotion: row.get(5)?,
            confidence: row.get(6)?,
            faces_detected: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<DetectionRecord, StoreError> {
        let id = self.id;
        let corrupt = |message: String| StoreError::Corrupt { id, message };
        Ok(DetectionRecord {
            id: Some(id),
            timestamp: DateTime::parse_from_rfc3339(&self.timestamp)
                .map_err(|e| corrupt(format!("timestamp: {e}")))?
                .with_timezone(&Utc),
            filename: self.filename,
            source_type: self
                .source_type
                .parse::<SourceType>()
                .map_err(|e| corrupt(e.to_string()))?,
            emotions: serde_json::from_str(&self.emotions)
                .map_err(|e| corrupt(format!("emotions: {e}")))?,
            dominant_emotion: self
                .dominant_emotion
                .parse::<Emotion>()
                .map_err(|e| corrupt(e.to_string()))?,
            confidence: self.confidence,
            faces_detected: usize::try_from(self.faces_detected)
                .map_err(|_| corrupt(format!("faces_detected {}", self.faces_detected)))?,
        })
    }
}
