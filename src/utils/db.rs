use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad timestamp {value:?} for source {source_key}")]
    Timestamp { source_key: String, value: String },
}

/// Opens the element-set cache, creating the file and schema if needed.
pub fn open_or_init(path: &Path) -> Result<Connection, DbError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        CREATE TABLE IF NOT EXISTS source_cache (
            source TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            fetched_at TEXT NOT NULL
        );
        "#,
    )?;
    Ok(conn)
}

pub fn store_source_text(
    conn: &Connection,
    source: &str,
    body: &str,
    fetched_at: DateTime<Utc>,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO source_cache (source, body, fetched_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(source) DO UPDATE SET body=excluded.body, fetched_at=excluded.fetched_at",
        params![source, body, fetched_at.to_rfc3339()],
    )?;
    Ok(())
}

/// Cached text for `source` and when it was fetched.
pub fn load_source_text(
    conn: &Connection,
    source: &str,
) -> Result<Option<(String, DateTime<Utc>)>, DbError> {
    let row = conn
        .query_row(
            "SELECT body, fetched_at FROM source_cache WHERE source = ?1",
            params![source],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    let Some((body, fetched_at)) = row else {
        return Ok(None);
    };
    let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
        .map_err(|_| DbError::Timestamp {
            source_key: source.to_string(),
            value: fetched_at.clone(),
        })?
        .with_timezone(&Utc);
    Ok(Some((body, fetched_at)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn store_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/cache.sqlite");
        let conn = open_or_init(&path).unwrap();
        assert!(path.exists());
        assert!(load_source_text(&conn, "group:stations").unwrap().is_none());

        let first = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        store_source_text(&conn, "group:stations", "old", first).unwrap();
        let second = first + chrono::Duration::hours(3);
        store_source_text(&conn, "group:stations", "new", second).unwrap();

        let (body, fetched_at) = load_source_text(&conn, "group:stations").unwrap().unwrap();
        assert_eq!(body, "new");
        assert_eq!(fetched_at, second);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        {
            let conn = open_or_init(&path).unwrap();
            store_source_text(&conn, "intdes:1998-067A", "ISS", now).unwrap();
        }
        let conn = open_or_init(&path).unwrap();
        assert_eq!(
            load_source_text(&conn, "intdes:1998-067A").unwrap(),
            Some(("ISS".to_string(), now))
        );
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let dir = tempdir().unwrap();
        let conn = open_or_init(&dir.path().join("cache.sqlite")).unwrap();
        conn.execute(
            "INSERT INTO source_cache (source, body, fetched_at) VALUES ('x', 'y', 'yesterday')",
            [],
        )
        .unwrap();
        assert!(matches!(load_source_text(&conn, "x"), Err(DbError::Timestamp { .. })));
    }
}
