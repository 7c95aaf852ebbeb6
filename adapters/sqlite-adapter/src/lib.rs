//! sqlite-adapter: SQLite implementation of the `UrlStore` port.
//!
//! Purpose
//! - Durable, file-based storage for the shortener.
//! - A single table `urls(long, short)`; `short` carries a UNIQUE index so the
//!   database itself enforces alias uniqueness.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - The connection runs in autocommit mode, so every mutating statement is
//!   durable once `execute` returns.
//! - Long-URL substring matching uses `instr`, not `LIKE`, so `%` and `_` in
//!   user input are matched literally and case-sensitively.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use domain::{CoreError, Mapping, UrlStore};
use rusqlite::{params, Connection};
use tracing::debug;

/// SQLite-backed mapping store.
pub struct SqliteRepo {
    conn: Mutex<Connection>,
}

impl SqliteRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(map_sqerr)?;
        }
        let conn = Connection::open(path).map_err(map_sqerr)?;
        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn in_memory() -> Result<Self, CoreError> {
        Self::with_connection(Connection::open_in_memory().map_err(map_sqerr)?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CoreError> {
        conn.busy_timeout(Duration::from_secs(5)).map_err(map_sqerr)?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }

    fn query_mappings(
        &self,
        sql: &str,
        arg: &str,
    ) -> Result<Vec<Mapping>, CoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(map_sqerr)?;
        let mut rows = stmt.query(params![arg]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(row_to_mapping(row)?);
        }
        Ok(out)
    }
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation)
}

fn row_to_mapping(row: &rusqlite::Row) -> Result<Mapping, CoreError> {
    let long: String = row.get(0).map_err(map_sqerr)?;
    let short: String = row.get(1).map_err(map_sqerr)?;
    Ok(Mapping { short, long })
}

impl UrlStore for SqliteRepo {
    fn ensure_schema(&self) -> Result<(), CoreError> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS urls (
                long TEXT NOT NULL,
                short TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_urls_short ON urls(short);
            CREATE INDEX IF NOT EXISTS idx_urls_long ON urls(long);
            "#,
        )
        .map_err(map_sqerr)
    }

    fn find_by_short(&self, short: &str) -> Result<Option<Mapping>, CoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT long, short FROM urls WHERE short = ?1")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![short]).map_err(map_sqerr)?;
        if let Some(row) = rows.next().map_err(map_sqerr)? {
            Ok(Some(row_to_mapping(row)?))
        } else {
            Ok(None)
        }
    }

    fn find_by_long(&self, long: &str) -> Result<Vec<Mapping>, CoreError> {
        self.query_mappings(
            "SELECT long, short FROM urls WHERE long = ?1 ORDER BY rowid",
            long,
        )
    }

    fn find_by_long_substring(&self, fragment: &str) -> Result<Vec<Mapping>, CoreError> {
        self.query_mappings(
            "SELECT long, short FROM urls WHERE instr(long, ?1) > 0 ORDER BY rowid",
            fragment,
        )
    }

    fn insert(&self, mapping: &Mapping) -> Result<(), CoreError> {
        let conn = self.conn()?;
        let res = conn.execute(
            "INSERT INTO urls(long, short) VALUES (?1, ?2)",
            params![mapping.long, mapping.short],
        );
        match res {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => {
                debug!(short = %mapping.short, "unique constraint hit on insert");
                Err(CoreError::DuplicateKey)
            }
            Err(e) => Err(map_sqerr(e)),
        }
    }

    fn update(&self, short: &str, long: &str) -> Result<(), CoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE urls SET long = ?1 WHERE short = ?2",
                params![long, short],
            )
            .map_err(map_sqerr)?;
        if changed == 0 {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }

    fn delete(&self, short: &str) -> Result<usize, CoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM urls WHERE short = ?1", params![short])
            .map_err(map_sqerr)
    }

    fn delete_matching(&self, fragment: &str) -> Result<usize, CoreError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM urls WHERE instr(long, ?1) > 0",
            params![fragment],
        )
        .map_err(map_sqerr)
    }

    fn list_all(&self) -> Result<Vec<Mapping>, CoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT long, short FROM urls ORDER BY rowid")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query([]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(row_to_mapping(row)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_db() -> (SqliteRepo, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.db");
        let repo = SqliteRepo::new(path).unwrap();
        (repo, dir)
    }

    #[test]
    fn insert_find_roundtrip() {
        let (repo, _dir) = tmp_db();
        repo.insert(&Mapping::new("abc", "https://example.com")).unwrap();
        let got = repo.find_by_short("abc").unwrap().unwrap();
        assert_eq!(got.long, "https://example.com");
        assert!(repo.find_by_short("zzz").unwrap().is_none());
    }

    #[test]
    fn insert_duplicate_is_duplicate_key() {
        let (repo, _dir) = tmp_db();
        repo.insert(&Mapping::new("dup", "https://one")).unwrap();
        let err = repo.insert(&Mapping::new("dup", "https://two")).unwrap_err();
        assert_eq!(err, CoreError::DuplicateKey);
    }

    #[test]
    fn ensure_schema_is_idempotent_and_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("urls.db");
        {
            let repo = SqliteRepo::new(&path).unwrap();
            repo.ensure_schema().unwrap();
            repo.insert(&Mapping::new("keep", "https://kept.example")).unwrap();
        }
        let repo = SqliteRepo::new(&path).unwrap();
        assert_eq!(repo.list_all().unwrap(), vec![Mapping::new("keep", "https://kept.example")]);
    }

    #[test]
    fn update_existing_and_missing() {
        let (repo, _dir) = tmp_db();
        repo.insert(&Mapping::new("l", "https://old.example")).unwrap();
        repo.update("l", "https://new.example").unwrap();
        assert_eq!(repo.find_by_short("l").unwrap().unwrap().long, "https://new.example");
        assert_eq!(repo.update("nope", "https://x").unwrap_err(), CoreError::NotFound);
    }

    #[test]
    fn find_by_long_keeps_insertion_order() {
        let (repo, _dir) = tmp_db();
        repo.insert(&Mapping::new("zz", "https://same.example")).unwrap();
        repo.insert(&Mapping::new("aa", "https://same.example")).unwrap();
        repo.insert(&Mapping::new("mm", "https://other.example")).unwrap();
        let shorts: Vec<String> = repo
            .find_by_long("https://same.example")
            .unwrap()
            .into_iter()
            .map(|m| m.short)
            .collect();
        assert_eq!(shorts, vec!["zz", "aa"]);
    }

    #[test]
    fn substring_match_is_literal() {
        let (repo, _dir) = tmp_db();
        repo.insert(&Mapping::new("a", "https://one.example/100%")).unwrap();
        repo.insert(&Mapping::new("b", "https://one.example/100")).unwrap();
        repo.insert(&Mapping::new("c", "https://two.example/x_y")).unwrap();
        assert_eq!(repo.find_by_long_substring("100%").unwrap().len(), 1);
        assert_eq!(repo.find_by_long_substring("ONE.example").unwrap().len(), 0);
        assert_eq!(repo.find_by_long_substring("x_y").unwrap().len(), 1);
    }

    #[test]
    fn deletes_report_counts() {
        let (repo, _dir) = tmp_db();
        repo.insert(&Mapping::new("a", "https://one.example/1")).unwrap();
        repo.insert(&Mapping::new("b", "https://one.example/2")).unwrap();
        repo.insert(&Mapping::new("c", "https://two.example")).unwrap();
        assert_eq!(repo.delete("c").unwrap(), 1);
        assert_eq!(repo.delete("c").unwrap(), 0);
        assert_eq!(repo.delete_matching("one.example").unwrap(), 2);
        assert!(repo.list_all().unwrap().is_empty());
    }

    #[test]
    fn in_memory_database_works() {
        let repo = SqliteRepo::in_memory().unwrap();
        repo.insert(&Mapping::new("m", "https://mem.example")).unwrap();
        assert_eq!(repo.list_all().unwrap().len(), 1);
    }
}
