//! Schema and metadata types.

use crate::sql::quote_ident;

/// Closed set of column type codes driving value formatting.
///
/// Produced from the server's catalog type names by [`SqlTypeCode::from_type_name`]
/// and from nothing else; the codec matches exhaustively on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlTypeCode {
    Char,
    VarChar,
    NChar,
    NVarChar,
    LongVarChar,
    LongNVarChar,
    /// uniqueidentifier; formatted through the string family.
    Guid,
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Real,
    Float,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Binary,
    VarBinary,
    LongVarBinary,
    /// Anything the mapping table does not know; formatted via the quoted fallback.
    Other,
}

impl SqlTypeCode {
    /// Map a SQL Server catalog type name to its type code.
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name.to_lowercase().as_str() {
            "char" => SqlTypeCode::Char,
            "varchar" => SqlTypeCode::VarChar,
            "nchar" => SqlTypeCode::NChar,
            "nvarchar" => SqlTypeCode::NVarChar,
            "text" => SqlTypeCode::LongVarChar,
            "ntext" => SqlTypeCode::LongNVarChar,
            "uniqueidentifier" => SqlTypeCode::Guid,
            "bit" => SqlTypeCode::Bit,
            "tinyint" => SqlTypeCode::TinyInt,
            "smallint" => SqlTypeCode::SmallInt,
            "int" => SqlTypeCode::Integer,
            "bigint" => SqlTypeCode::BigInt,
            "decimal" | "numeric" | "money" | "smallmoney" => SqlTypeCode::Decimal,
            "real" => SqlTypeCode::Real,
            "float" => SqlTypeCode::Float,
            "date" => SqlTypeCode::Date,
            "time" => SqlTypeCode::Time,
            "datetime" | "datetime2" | "smalldatetime" => SqlTypeCode::Timestamp,
            "datetimeoffset" => SqlTypeCode::TimestampTz,
            "binary" => SqlTypeCode::Binary,
            "varbinary" => SqlTypeCode::VarBinary,
            "image" => SqlTypeCode::LongVarBinary,
            _ => SqlTypeCode::Other,
        }
    }

    /// Character data, including GUIDs which round-trip as text.
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            SqlTypeCode::Char
                | SqlTypeCode::VarChar
                | SqlTypeCode::NChar
                | SqlTypeCode::NVarChar
                | SqlTypeCode::LongVarChar
                | SqlTypeCode::LongNVarChar
                | SqlTypeCode::Guid
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlTypeCode::TinyInt
                | SqlTypeCode::SmallInt
                | SqlTypeCode::Integer
                | SqlTypeCode::BigInt
                | SqlTypeCode::Decimal
                | SqlTypeCode::Real
                | SqlTypeCode::Float
        )
    }

    pub fn is_date_time(&self) -> bool {
        matches!(
            self,
            SqlTypeCode::Date | SqlTypeCode::Time | SqlTypeCode::Timestamp | SqlTypeCode::TimestampTz
        )
    }

    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            SqlTypeCode::Binary | SqlTypeCode::VarBinary | SqlTypeCode::LongVarBinary
        )
    }
}

/// Column metadata.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Type code for codec dispatch.
    pub type_code: SqlTypeCode,

    /// Raw catalog type name (e.g. "nvarchar", "datetime2").
    pub type_name: String,

    /// Declared size for string/binary types (-1 for MAX, 0 when not applicable).
    pub size: i32,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Whether the column is an identity column.
    pub auto_increment: bool,

    /// Ordinal position (1-based).
    pub ordinal: i32,
}

impl ColumnInfo {
    /// Date/time typed, either by code or by a datetime-ish catalog name.
    pub fn is_date_time(&self) -> bool {
        let lower = self.type_name.to_lowercase();
        self.type_code.is_date_time() || lower.contains("datetime") || lower.contains("timestamp")
    }

    pub fn is_numeric(&self) -> bool {
        self.type_code.is_numeric()
    }

    pub fn is_string(&self) -> bool {
        self.type_code.is_string()
    }
}

/// Foreign key column metadata. One entry per constraint column;
/// composite constraints are ordered by `key_sequence`.
#[derive(Debug, Clone)]
pub struct ForeignKeyInfo {
    /// Constraint name.
    pub constraint_name: String,

    /// Referencing column in the local table.
    pub local_column: String,

    /// Schema of the referenced table.
    pub referenced_schema: String,

    /// Referenced table name.
    pub referenced_table: String,

    /// Referenced column name.
    pub referenced_column: String,

    /// Position within the constraint (1-based).
    pub key_sequence: i32,
}

/// How a date-typed sort column was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateColumnKind {
    Updated,
    Created,
    Generic,
}

/// Deterministic row ordering chosen per table.
///
/// The only shared contract is producing an ORDER BY fragment, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortStrategy {
    /// Newest-first on a date/time column.
    DateTimeBased { column: String, kind: DateColumnKind },

    /// Descending over the primary key columns.
    PrimaryKeyBased { key_columns: Vec<String> },

    /// Rows come back in server order.
    NoSort,
}

impl SortStrategy {
    /// ORDER BY fragment for the SELECT; empty means no ORDER BY at all.
    pub fn sort_clause(&self) -> String {
        match self {
            SortStrategy::DateTimeBased { column, .. } => format!("{} DESC", column),
            SortStrategy::PrimaryKeyBased { key_columns } => key_columns
                .iter()
                .map(|col| format!("{} DESC", quote_ident(col)))
                .collect::<Vec<_>>()
                .join(", "),
            SortStrategy::NoSort => String::new(),
        }
    }
}

/// Full metadata for one exported table, immutable after introspection.
#[derive(Debug, Clone)]
pub struct TableMetadata {
    /// Table name.
    pub name: String,

    /// Schema name.
    pub schema: String,

    /// Primary key column names, in key order.
    pub primary_key: Vec<String>,

    /// Foreign key columns, sorted by `key_sequence`.
    pub foreign_keys: Vec<ForeignKeyInfo>,

    /// Columns sorted by ordinal.
    pub columns: Vec<ColumnInfo>,

    /// Row ordering for the export SELECT.
    pub sort_strategy: SortStrategy,

    /// Approximate row count from the partitions catalog (-1 when unknown).
    pub estimated_row_count: i64,
}

impl TableMetadata {
    /// Bracket-quoted qualified name; the schema qualifier is omitted when empty.
    pub fn full_name(&self) -> String {
        if self.schema.is_empty() {
            quote_ident(&self.name)
        } else {
            format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
        }
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn has_composite_key(&self) -> bool {
        self.primary_key.len() > 1
    }
}
