//! Relational sink: the narrow statement interface the loader drives

use std::fmt;
use std::path::PathBuf;

use duckdb::Connection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Connection dropped or database temporarily unavailable
    ConnectionLost(String),
    /// Statement rejected (syntax, constraint, type)
    Statement(String),
}

impl SinkError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::ConnectionLost(_))
    }

    /// Sort a driver message into connection-class vs statement errors.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let connection_class = ["connection", "io error", "could not set lock", "database is locked"]
            .iter()
            .any(|needle| lower.contains(needle));
        if connection_class {
            SinkError::ConnectionLost(message)
        } else {
            SinkError::Statement(message)
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::ConnectionLost(msg) => write!(f, "connection lost: {msg}"),
            SinkError::Statement(msg) => write!(f, "statement failed: {msg}"),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<duckdb::Error> for SinkError {
    fn from(e: duckdb::Error) -> Self {
        SinkError::classify(e.to_string())
    }
}

/// What the loader needs from a relational database.
pub trait RelationalSink {
    /// Maintenance or UPDATE statement outside a managed unit of work.
    fn execute(&mut self, sql: &str) -> Result<(), SinkError>;

    /// All statements in one transaction; nothing is applied on error.
    fn execute_atomic(&mut self, statements: &[String]) -> Result<(), SinkError>;

    /// First column of the first row as a count.
    fn query_count(&mut self, sql: &str) -> Result<u64, SinkError>;

    /// First column of every row. The column must be textual.
    fn query_strings(&mut self, sql: &str) -> Result<Vec<String>, SinkError>;

    fn reconnect(&mut self) -> Result<(), SinkError>;
}

impl<S: RelationalSink + ?Sized> RelationalSink for Box<S> {
    fn execute(&mut self, sql: &str) -> Result<(), SinkError> {
        (**self).execute(sql)
    }

    fn execute_atomic(&mut self, statements: &[String]) -> Result<(), SinkError> {
        (**self).execute_atomic(statements)
    }

    fn query_count(&mut self, sql: &str) -> Result<u64, SinkError> {
        (**self).query_count(sql)
    }

    fn query_strings(&mut self, sql: &str) -> Result<Vec<String>, SinkError> {
        (**self).query_strings(sql)
    }

    fn reconnect(&mut self) -> Result<(), SinkError> {
        (**self).reconnect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuckDbTarget {
    File(PathBuf),
    InMemory,
}

impl fmt::Display for DuckDbTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuckDbTarget::File(path) => write!(f, "{}", path.display()),
            DuckDbTarget::InMemory => f.write_str(":memory:"),
        }
    }
}

/// DuckDB-backed warehouse. Bulk loads go through `read_csv`.
pub struct DuckDbSink {
    target: DuckDbTarget,
    conn: Connection,
}

impl DuckDbSink {
    pub fn open(target: DuckDbTarget) -> Result<Self, SinkError> {
        let conn = connect(&target)?;
        log::debug!("opened duckdb at {target}");
        Ok(Self { target, conn })
    }

    pub fn in_memory() -> Result<Self, SinkError> {
        Self::open(DuckDbTarget::InMemory)
    }
}

fn connect(target: &DuckDbTarget) -> Result<Connection, SinkError> {
    let conn = match target {
        DuckDbTarget::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SinkError::ConnectionLost(format!("{}: {e}", parent.display())))?;
            }
            Connection::open(path)?
        }
        DuckDbTarget::InMemory => Connection::open_in_memory()?,
    };
    Ok(conn)
}

impl RelationalSink for DuckDbSink {
    fn execute(&mut self, sql: &str) -> Result<(), SinkError> {
        log::trace!("execute: {sql}");
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn execute_atomic(&mut self, statements: &[String]) -> Result<(), SinkError> {
        let tx = self.conn.transaction()?;
        for stmt in statements {
            log::trace!("execute (tx): {stmt}");
            tx.execute_batch(stmt)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn query_count(&mut self, sql: &str) -> Result<u64, SinkError> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    fn query_strings(&mut self, sql: &str) -> Result<Vec<String>, SinkError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, Option<String>>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.unwrap_or_default());
        }
        Ok(out)
    }

    fn reconnect(&mut self) -> Result<(), SinkError> {
        log::info!("reconnecting to {}", self.target);
        self.conn = match &self.target {
            // a fresh in-memory connection would be a different database
            DuckDbTarget::InMemory => self.conn.try_clone()?,
            DuckDbTarget::File(_) => connect(&self.target)?,
        };
        Ok(())
    }
}
