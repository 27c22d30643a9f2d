//! SQLite `RecordStore` built on rusqlite.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::storage::{CacheRecord, RecordFilter, RecordStore};

// == Table Layout ==
/// Table and column names used for cache records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub table: String,
    pub id_col: String,
    pub data_col: String,
    pub expiration_col: String,
    pub namespace_col: String,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            table: "cache_items".to_string(),
            id_col: "id".to_string(),
            data_col: "data".to_string(),
            expiration_col: "expiration".to_string(),
            namespace_col: "namespace".to_string(),
        }
    }
}

impl TableLayout {
    /// Identifiers are spliced into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` is allowed.
    fn validate(&self) -> StorageResult<()> {
        for name in [
            &self.table,
            &self.id_col,
            &self.data_col,
            &self.expiration_col,
            &self.namespace_col,
        ] {
            let mut chars = name.chars();
            let valid_start = chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
            if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(StorageError::InvalidPath(format!(
                    "invalid SQL identifier {:?}",
                    name
                )));
            }
        }
        Ok(())
    }
}

// == SQLite Record Store ==
/// Record store persisting to one SQLite table.
#[derive(Debug)]
pub struct SqliteRecordStore {
    conn: Connection,
    layout: TableLayout,
}

impl SqliteRecordStore {
    /// Opens (or creates) a database file and prepares the table.
    pub fn open(path: impl AsRef<Path>, layout: TableLayout) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, layout)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(layout: TableLayout) -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, layout)
    }

    /// Wraps an existing connection and prepares the table.
    pub fn with_connection(conn: Connection, layout: TableLayout) -> StorageResult<Self> {
        layout.validate()?;

        let TableLayout {
            table,
            id_col,
            data_col,
            expiration_col,
            namespace_col,
        } = &layout;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                {id_col} TEXT PRIMARY KEY,
                {data_col} TEXT NOT NULL,
                {expiration_col} INTEGER NULL,
                {namespace_col} TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {table}_{namespace_col}_{expiration_col}
                ON {table} ({namespace_col}, {expiration_col});"
        ))?;

        debug!("SQLite record store ready on table {}", table);
        Ok(Self { conn, layout })
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    fn columns(&self) -> String {
        let l = &self.layout;
        format!(
            "{}, {}, {}, {}",
            l.id_col, l.data_col, l.expiration_col, l.namespace_col
        )
    }

    /// Builds a WHERE clause for `filter`; the clause binds `?1` and maybe `?2`.
    fn where_clause(&self, filter: &RecordFilter) -> String {
        let l = &self.layout;
        match filter {
            RecordFilter::Namespace(_) => format!("{} = ?1", l.namespace_col),
            RecordFilter::ExpiredBefore { .. } => format!(
                "{ns} = ?1 AND {exp} IS NOT NULL AND {exp} < ?2",
                ns = l.namespace_col,
                exp = l.expiration_col
            ),
        }
    }

    fn with_filter<T>(
        &self,
        sql: &str,
        filter: &RecordFilter,
        run: impl FnOnce(&Connection, &str, &RecordFilter) -> rusqlite::Result<T>,
    ) -> StorageResult<T> {
        let sql = format!("{} WHERE {}", sql, self.where_clause(filter));
        Ok(run(&self.conn, &sql, filter)?)
    }
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<CacheRecord> {
    Ok(CacheRecord {
        id: row.get(0)?,
        data: row.get(1)?,
        expiration: row.get(2)?,
        namespace: row.get(3)?,
    })
}

impl RecordStore for SqliteRecordStore {
    fn upsert(&self, record: &CacheRecord) -> StorageResult<()> {
        let l = &self.layout;
        let sql = format!(
            "INSERT INTO {table} ({columns}) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT({id}) DO UPDATE SET
                {data} = excluded.{data},
                {exp} = excluded.{exp},
                {ns} = excluded.{ns}",
            table = l.table,
            columns = self.columns(),
            id = l.id_col,
            data = l.data_col,
            exp = l.expiration_col,
            ns = l.namespace_col,
        );
        self.conn.execute(
            &sql,
            params![record.id, record.data, record.expiration, record.namespace],
        )?;
        Ok(())
    }

    fn find(&self, id: &str) -> StorageResult<Option<CacheRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            self.columns(),
            self.layout.table,
            self.layout.id_col
        );
        Ok(self
            .conn
            .query_row(&sql, params![id], read_record)
            .optional()?)
    }

    fn delete(&self, id: &str) -> StorageResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            self.layout.table, self.layout.id_col
        );
        self.conn.execute(&sql, params![id])?;
        Ok(())
    }

    fn delete_where(&self, filter: &RecordFilter) -> StorageResult<usize> {
        let sql = format!("DELETE FROM {}", self.layout.table);
        self.with_filter(&sql, filter, |conn, sql, filter| match filter {
            RecordFilter::Namespace(ns) => conn.execute(sql, params![ns]),
            RecordFilter::ExpiredBefore { namespace, now } => {
                conn.execute(sql, params![namespace, now])
            }
        })
    }

    fn count(&self, filter: &RecordFilter) -> StorageResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.layout.table);
        let count: i64 = self.with_filter(&sql, filter, |conn, sql, filter| match filter {
            RecordFilter::Namespace(ns) => conn.query_row(sql, params![ns], |row| row.get(0)),
            RecordFilter::ExpiredBefore { namespace, now } => {
                conn.query_row(sql, params![namespace, now], |row| row.get(0))
            }
        })?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
