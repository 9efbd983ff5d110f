use crate::error::Result;
use super::entity::{self, Entity, RowDecoder};
use rusqlite::{params_from_iter, Connection, Params};
use std::path::Path;

/// A connection to the backing SQLite file.
///
/// A session may carry a generic row decoder bound to one record definition;
/// schema migration refuses to run while one is installed.
pub struct Session {
    conn: Connection,
    row_decoder: Option<&'static str>,
}

impl Session {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            row_decoder: None,
        }
    }

    /// Binds generic row decoding on this session to `T`.
    pub fn with_row_decoder<T: Entity>(mut self) -> Self {
        self.row_decoder = Some(T::NAME);
        self
    }

    pub fn row_decoder(&self) -> Option<&'static str> {
        self.row_decoder
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Writes `records` in one transaction with `T`'s upsert mode.
    ///
    /// Returns the number of rows actually inserted or replaced.
    pub fn write_all<T: Entity>(&mut self, records: &[T]) -> Result<usize> {
        let sql = entity::upsert_statement::<T>();
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for record in records {
                written += stmt.execute(params_from_iter(entity::to_params(record)))?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Runs `SELECT * FROM <table> <clause>` and decodes every row as `T`.
    pub fn select<T: Entity, P: Params>(&self, clause: &str, params: P) -> Result<Vec<T>> {
        let sql = format!("SELECT * FROM {} {}", entity::table_name::<T>(), clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let decoder = RowDecoder::<T>::resolve(&stmt.column_names());

        let mut rows = stmt.query(params)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(decoder.decode_row(row)?);
        }
        Ok(records)
    }
}
