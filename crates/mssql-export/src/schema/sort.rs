//! Sort strategy resolution.
//!
//! Priority: updated/modified date column > created date column > any date
//! column > primary key > no sort.

use tracing::warn;

use super::types::{ColumnInfo, DateColumnKind, SortStrategy};

const UPDATED_PATTERNS: &[&str] = &["updated", "modify", "modified"];
const CREATED_PATTERNS: &[&str] = &["created", "insert"];

/// Pick the deterministic row ordering for one table.
pub fn resolve_sort_strategy(
    table_name: &str,
    primary_key: &[String],
    columns: &[ColumnInfo],
) -> SortStrategy {
    if let Some(strategy) = date_based_strategy(columns) {
        return strategy;
    }

    if !primary_key.is_empty() {
        return SortStrategy::PrimaryKeyBased {
            key_columns: primary_key.to_vec(),
        };
    }

    warn!(
        "Table '{}' has no date columns or primary key - records may not be in latest order",
        table_name
    );
    SortStrategy::NoSort
}

fn date_based_strategy(columns: &[ColumnInfo]) -> Option<SortStrategy> {
    let date_columns: Vec<&ColumnInfo> = columns.iter().filter(|c| c.is_date_time()).collect();

    if date_columns.is_empty() {
        return None;
    }

    if let Some(col) = find_by_patterns(&date_columns, UPDATED_PATTERNS) {
        return Some(SortStrategy::DateTimeBased {
            column: col.name.clone(),
            kind: DateColumnKind::Updated,
        });
    }

    if let Some(col) = find_by_patterns(&date_columns, CREATED_PATTERNS) {
        return Some(SortStrategy::DateTimeBased {
            column: col.name.clone(),
            kind: DateColumnKind::Created,
        });
    }

    Some(SortStrategy::DateTimeBased {
        column: date_columns[0].name.clone(),
        kind: DateColumnKind::Generic,
    })
}

fn find_by_patterns<'a>(columns: &[&'a ColumnInfo], patterns: &[&str]) -> Option<&'a ColumnInfo> {
    columns.iter().copied().find(|col| {
        let lower = col.name.to_lowercase();
        patterns.iter().any(|p| lower.contains(p))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SqlTypeCode;

    fn column(name: &str, type_name: &str, ordinal: i32) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            type_code: SqlTypeCode::from_type_name(type_name),
            type_name: type_name.to_string(),
            size: 0,
            nullable: true,
            auto_increment: false,
            ordinal,
        }
    }

    #[test]
    fn test_updated_column_wins_over_created() {
        let columns = vec![
            column("id", "int", 1),
            column("created_at", "datetime2", 2),
            column("updated_at", "datetime2", 3),
        ];
        let strategy = resolve_sort_strategy("orders", &["id".to_string()], &columns);
        assert_eq!(
            strategy,
            SortStrategy::DateTimeBased {
                column: "updated_at".to_string(),
                kind: DateColumnKind::Updated,
            }
        );
        assert_eq!(strategy.sort_clause(), "updated_at DESC");
    }

    #[test]
    fn test_updated_match_is_case_insensitive() {
        let columns = vec![column("UpdatedAt", "datetime", 1)];
        let strategy = resolve_sort_strategy("t", &[], &columns);
        assert!(matches!(
            strategy,
            SortStrategy::DateTimeBased {
                kind: DateColumnKind::Updated,
                ..
            }
        ));
    }

    #[test]
    fn test_modified_counts_as_updated() {
        let columns = vec![column("last_modified", "datetime2", 1)];
        let strategy = resolve_sort_strategy("t", &[], &columns);
        assert!(matches!(
            strategy,
            SortStrategy::DateTimeBased {
                kind: DateColumnKind::Updated,
                ..
            }
        ));
    }

    #[test]
    fn test_created_when_no_updated() {
        let columns = vec![
            column("inserted_on", "datetime", 1),
            column("due_date", "date", 2),
        ];
        let strategy = resolve_sort_strategy("t", &[], &columns);
        assert_eq!(
            strategy,
            SortStrategy::DateTimeBased {
                column: "inserted_on".to_string(),
                kind: DateColumnKind::Created,
            }
        );
    }

    #[test]
    fn test_generic_first_date_column() {
        let columns = vec![
            column("id", "int", 1),
            column("shipped_on", "date", 2),
            column("billed_on", "date", 3),
        ];
        let strategy = resolve_sort_strategy("t", &[], &columns);
        assert_eq!(
            strategy,
            SortStrategy::DateTimeBased {
                column: "shipped_on".to_string(),
                kind: DateColumnKind::Generic,
            }
        );
    }

    #[test]
    fn test_primary_key_when_no_date_columns() {
        let columns = vec![column("id", "int", 1), column("name", "nvarchar", 2)];
        let strategy = resolve_sort_strategy("t", &["id".to_string()], &columns);
        assert_eq!(
            strategy,
            SortStrategy::PrimaryKeyBased {
                key_columns: vec!["id".to_string()],
            }
        );
    }

    #[test]
    fn test_no_sort_without_dates_or_pk() {
        let columns = vec![column("payload", "nvarchar", 1)];
        let strategy = resolve_sort_strategy("t", &[], &columns);
        assert_eq!(strategy, SortStrategy::NoSort);
    }
}
