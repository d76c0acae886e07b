//! SELECT and INSERT statement composition from table metadata.

use std::collections::HashMap;

use tiberius::Row;

use crate::schema::{SqlTypeCode, TableMetadata};
use crate::sql::{quote_ident, value};

/// Compose the export SELECT for a table.
///
/// `TOP` is emitted only for a positive row limit; the ORDER BY clause
/// comes from the table's sort strategy and is omitted when empty.
pub fn build_select(metadata: &TableMetadata, row_limit: u32) -> String {
    let mut query = String::from("SELECT ");

    if row_limit > 0 {
        query.push_str(&format!("TOP {} ", row_limit));
    }

    let cols = metadata
        .columns
        .iter()
        .map(|col| quote_ident(&col.name))
        .collect::<Vec<_>>()
        .join(", ");
    query.push_str(&cols);

    query.push_str(" FROM ");
    query.push_str(&metadata.full_name());

    let sort_clause = metadata.sort_strategy.sort_clause();
    if !sort_clause.is_empty() {
        query.push_str(" ORDER BY ");
        query.push_str(&sort_clause);
    }

    query
}

/// Builds INSERT statements for one table's rows.
///
/// The column list mirrors the cursor's column order, not the metadata's,
/// so a mismatched projection cannot desynchronize names and values.
pub struct InsertBuilder {
    qualified_table: String,
    type_by_column: HashMap<String, SqlTypeCode>,
}

impl InsertBuilder {
    pub fn new(metadata: &TableMetadata) -> Self {
        let type_by_column = metadata
            .columns
            .iter()
            .map(|col| (col.name.clone(), col.type_code))
            .collect();

        Self {
            qualified_table: metadata.full_name(),
            type_by_column,
        }
    }

    /// Compose one `INSERT INTO … VALUES (…);` statement for a cursor row.
    pub fn insert_for_row(&self, row: &Row) -> String {
        let columns = row.columns();

        let mut stmt = String::from("INSERT INTO ");
        stmt.push_str(&self.qualified_table);
        stmt.push_str(" (");

        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                stmt.push_str(", ");
            }
            stmt.push_str(&quote_ident(col.name()));
        }

        stmt.push_str(") VALUES (");

        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                stmt.push_str(", ");
            }
            let code = self
                .type_by_column
                .get(col.name())
                .copied()
                .unwrap_or(SqlTypeCode::Other);
            stmt.push_str(&value::format_value(row, i, code));
        }

        stmt.push_str(");");
        stmt
    }
}
