use super::Snapshot;
use crate::entity::Value;
use crate::error::{PathGrabError, Result};
use crate::file::File;
use crate::schema::DomainConfig;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

/// SQLite-backed snapshot store. Holds one snapshot at a time; writing
/// replaces the previous one in a single transaction.
pub struct SnapshotDb {
    conn: Connection,
}

impl SnapshotDb {
    /// Open or create the snapshot database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = SnapshotDb { conn };
        db.initialize_tables()?;
        Ok(db)
    }

    /// Open an in-memory snapshot database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = SnapshotDb { conn };
        db.initialize_tables()?;
        Ok(db)
    }

    fn initialize_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS snapshot_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS domains (
                position INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                root TEXT NOT NULL,
                config_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                domain TEXT NOT NULL,
                entities_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_files_domain ON files(domain);
            ",
        )?;
        Ok(())
    }

    /// Replace the stored snapshot.
    pub fn write(&mut self, snapshot: &Snapshot) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch("DELETE FROM snapshot_meta; DELETE FROM domains; DELETE FROM files;")?;

        for (key, value) in [
            ("version", snapshot.version.to_string()),
            ("created_at", snapshot.created_at.to_rfc3339()),
            ("config_hash", snapshot.config_hash.clone()),
            ("regex_search", snapshot.regex_search.to_string()),
        ] {
            tx.execute(
                "INSERT INTO snapshot_meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }

        for (position, domain) in snapshot.domains.iter().enumerate() {
            tx.execute(
                "INSERT INTO domains (position, name, root, config_json) VALUES (?1, ?2, ?3, ?4)",
                params![
                    position as i64,
                    domain.name,
                    domain.root,
                    serde_json::to_string(domain)?
                ],
            )?;
        }

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO files (path, domain, entities_json) VALUES (?1, ?2, ?3)",
            )?;
            for file in &snapshot.files {
                stmt.execute(params![
                    file.path,
                    file.domain,
                    serde_json::to_string(&file.entities)?
                ])?;
            }
        }

        tx.commit()?;
        log::debug!("Wrote {} files to snapshot database", snapshot.files.len());
        Ok(())
    }

    fn meta(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .conn
            .query_row(
                "SELECT value FROM snapshot_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    /// Read the stored snapshot, or `None` if nothing was written yet.
    pub fn read(&self) -> Result<Option<Snapshot>> {
        let Some(version) = self.meta("version")? else {
            return Ok(None);
        };
        let version = version
            .parse()
            .map_err(|_| corrupt(&format!("invalid version '{version}'")))?;
        let created_at = self
            .meta("created_at")?
            .ok_or_else(|| corrupt("missing created_at"))?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| corrupt(&format!("invalid created_at: {e}")))?
            .with_timezone(&Utc);
        let config_hash = self.meta("config_hash")?.unwrap_or_default();
        let regex_search = self.meta("regex_search")?.as_deref() == Some("true");

        Ok(Some(Snapshot {
            version,
            created_at,
            config_hash,
            regex_search,
            domains: self.domains()?,
            files: self.files(None)?,
        }))
    }

    pub fn domains(&self) -> Result<Vec<DomainConfig>> {
        let mut stmt = self
            .conn
            .prepare("SELECT config_json FROM domains ORDER BY position")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut domains = Vec::new();
        for row in rows {
            domains.push(serde_json::from_str(&row?)?);
        }
        Ok(domains)
    }

    /// Stored file records, optionally restricted to one domain.
    pub fn files(&self, domain: Option<&str>) -> Result<Vec<File>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, domain, entities_json FROM files
             WHERE ?1 IS NULL OR domain = ?1 ORDER BY path",
        )?;
        let rows = stmt.query_map(params![domain], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut files = Vec::new();
        for row in rows {
            let (path, domain, entities_json) = row?;
            let entities: BTreeMap<String, Value> = serde_json::from_str(&entities_json)?;
            files.push(File {
                path,
                domain,
                entities,
            });
        }
        Ok(files)
    }

    pub fn file_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn corrupt(message: &str) -> PathGrabError {
    PathGrabError::Configuration(format!("Corrupt snapshot database: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::bids_layout;

    #[test]
    fn test_empty_database() {
        let db = SnapshotDb::open_in_memory().unwrap();
        assert!(db.read().unwrap().is_none());
        assert_eq!(db.file_count().unwrap(), 0);
    }

    #[test]
    fn test_write_and_read() {
        let mut db = SnapshotDb::open_in_memory().unwrap();
        let snapshot = bids_layout().snapshot();
        db.write(&snapshot).unwrap();

        let read = db.read().unwrap().unwrap();
        assert_eq!(read.config_hash, snapshot.config_hash);
        assert_eq!(read.domains, snapshot.domains);
        assert_eq!(read.files.len(), snapshot.files.len());
        assert_eq!(
            read.created_at.timestamp(),
            snapshot.created_at.timestamp()
        );
        assert_eq!(db.files(Some("bids")).unwrap().len(), 11);
        assert!(db.files(Some("other")).unwrap().is_empty());
    }

    #[test]
    fn test_write_replaces_previous() {
        let mut db = SnapshotDb::open_in_memory().unwrap();
        let mut snapshot = bids_layout().snapshot();
        db.write(&snapshot).unwrap();
        snapshot.files.truncate(2);
        db.write(&snapshot).unwrap();
        assert_eq!(db.file_count().unwrap(), 2);
    }
}
