//! SQL generation for schema setup, staging loads and maintenance.
//!
//! Staging files are read with every column as VARCHAR; typed columns are
//! cast on insert, so an empty or malformed value becomes NULL instead of
//! failing the whole table.

use std::path::Path;

use reciter_transform::{PERSON_MASTER_COLUMNS, Table};

/// Double-quoted identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quoted string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Declared type of a warehouse column.
pub fn column_type(column: &str) -> &'static str {
    match column {
        "pmid" | "cited_pmid" | "citing_pmid" => "BIGINT",
        "knownRelationshipCount" => "INTEGER",
        c if c.contains("Score") => "DOUBLE",
        _ => "VARCHAR",
    }
}

/// Every column of the target table, including columns the loader never
/// writes directly (person master attributes).
pub fn table_columns(table: Table) -> Vec<&'static str> {
    let mut cols = table.columns().to_vec();
    if table == Table::Person {
        cols.extend(PERSON_MASTER_COLUMNS);
    }
    cols
}

pub fn create_table(table: Table) -> String {
    let cols: Vec<String> = table_columns(table)
        .into_iter()
        .map(|c| format!("{} {}", quote_ident(c), column_type(c)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table.name(),
        cols.join(", ")
    )
}

fn index_name(table: Table) -> String {
    format!("idx_{}_subject", table.name())
}

/// Secondary index on the subject key, for tables that have one.
pub fn create_index(table: Table) -> Option<String> {
    let key = table.subject_key()?;
    Some(format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        index_name(table),
        table.name(),
        quote_ident(key)
    ))
}

pub fn drop_index(table: Table) -> Option<String> {
    table
        .subject_key()
        .map(|_| format!("DROP INDEX IF EXISTS {}", index_name(table)))
}

/// Remove every row, keeping the table definition.
pub fn truncate(table: &str) -> String {
    format!("DELETE FROM {table}")
}

fn read_csv(path: &Path) -> String {
    format!(
        "read_csv({}, header = true, all_varchar = true, delim = ',', quote = '\"', escape = '\"')",
        quote_literal(&path.to_string_lossy())
    )
}

/// Bulk insert a staging file whose header is `header`.
pub fn insert_from_csv(table: &str, header: &[String], path: &Path) -> String {
    let cols: Vec<String> = header.iter().map(|c| quote_ident(c)).collect();
    let exprs: Vec<String> = header
        .iter()
        .map(|c| match column_type(c) {
            "VARCHAR" => quote_ident(c),
            ty => format!("TRY_CAST({} AS {ty})", quote_ident(c)),
        })
        .collect();
    format!(
        "INSERT INTO {table} ({}) SELECT {} FROM {}",
        cols.join(", "),
        exprs.join(", "),
        read_csv(path)
    )
}

/// Delete the rows of every subject present in a staging file.
pub fn supersede(table: &str, key: &str, path: &Path) -> String {
    let key = quote_ident(key);
    format!(
        "DELETE FROM {table} WHERE {key} IN (SELECT DISTINCT {key} FROM {})",
        read_csv(path)
    )
}

/// Copy master attributes from `identity_temp` onto matching `person` rows.
pub fn apply_master_attributes() -> String {
    let assignments: Vec<String> = PERSON_MASTER_COLUMNS
        .iter()
        .map(|c| format!("{col} = i.{col}", col = quote_ident(c)))
        .collect();
    format!(
        "UPDATE person SET {} FROM identity_temp i \
         WHERE person.\"personIdentifier\" = i.\"personIdentifier\"",
        assignments.join(", ")
    )
}

pub fn staging_name(table: &str) -> String {
    format!("{table}_staging")
}

/// Empty side table with the target's definition.
pub fn create_staging(table: &str) -> String {
    format!(
        "CREATE OR REPLACE TABLE {} AS SELECT * FROM {table} LIMIT 0",
        staging_name(table)
    )
}

/// Replace the target's content with its staging table, then drop it.
pub fn swap_from_staging(table: &str) -> Vec<String> {
    let staging = staging_name(table);
    vec![
        truncate(table),
        format!("INSERT INTO {table} SELECT * FROM {staging}"),
        format!("DROP TABLE {staging}"),
    ]
}

pub fn count_rows(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {table}")
}

/// Distinct PMIDs of accepted articles, as text.
pub fn accepted_pmids() -> &'static str {
    "SELECT DISTINCT CAST(pmid AS VARCHAR) FROM person_article \
     WHERE \"userAssertion\" = 'ACCEPTED' AND pmid IS NOT NULL ORDER BY 1"
}
