//! T-SQL generation: identifier quoting, the value codec, statement
//! building, and the output sink.

mod statement;
mod value;
mod writer;

pub use statement::{build_select, InsertBuilder};
pub use value::{format_value, BINARY_INLINE_LIMIT};
pub use writer::SqlSink;

/// Quote a SQL Server identifier using brackets.
///
/// Escapes closing brackets by doubling them and wraps in brackets.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}
