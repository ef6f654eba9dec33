//! RowSet: table name + fixed header + rows of sanitized strings

use std::fmt;

use crate::table::Table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Row width does not match the header
    Arity {
        table: String,
        expected: usize,
        got: usize,
    },
}

impl TransformError {
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::Arity {
                table,
                expected,
                got,
            } => write!(f, "{table}: row has {got} fields, header has {expected}"),
        }
    }
}

impl std::error::Error for TransformError {}

/// Rows destined for one table. Every row has exactly `header.len()` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSet {
    table: String,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RowSet {
    pub fn new(table: impl Into<String>, header: Vec<String>) -> Self {
        Self {
            table: table.into(),
            header,
            rows: Vec::new(),
        }
    }

    /// Empty row set with the catalog header of `table`.
    pub fn for_table(table: Table) -> Self {
        Self::new(
            table.name(),
            table.columns().iter().map(|c| c.to_string()).collect(),
        )
    }

    pub fn push(&mut self, row: Vec<String>) -> Result<(), TransformError> {
        if row.len() != self.header.len() {
            return Err(TransformError::Arity {
                table: self.table.clone(),
                expected: self.header.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Move all rows of `other` (same table) into `self`.
    pub fn append(&mut self, other: &mut RowSet) {
        debug_assert_eq!(self.table, other.table);
        debug_assert_eq!(self.header, other.header);
        self.rows.append(&mut other.rows);
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Empty copy with the same table and header.
    pub fn empty_like(&self) -> Self {
        Self::new(self.table.clone(), self.header.clone())
    }

    /// Same rows under another table name (staging copies).
    pub fn renamed(&self, table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            header: self.header.clone(),
            rows: self.rows.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn push_enforces_arity() {
        let mut rs = RowSet::for_table(Table::PersonArticleKeyword);
        rs.push(row(&["abc1001", "Neoplasms", "123"])).unwrap();
        let err = rs.push(row(&["abc1001", "123"])).unwrap_err();
        assert_eq!(
            err,
            TransformError::Arity {
                table: "person_article_keyword".into(),
                expected: 3,
                got: 2
            }
        );
        assert_eq!(rs.len(), 1);
    }

    #[test]
    fn append_moves_rows() {
        let mut a = RowSet::for_table(Table::PersonPersonType);
        let mut b = a.empty_like();
        b.push(row(&["abc1001", "academic"])).unwrap();
        a.append(&mut b);
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }
}
