//! Layered table exclusion policy.
//!
//! Categories are evaluated in order of increasing cost: exact match,
//! prefix, wildcard, regex. A category whose configured list is empty
//! falls back to the built-in defaults below. State is immutable after
//! construction.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::FilterConfig;
use crate::schema::TableMetadata;

/// Common backup/temp/audit table shapes.
const DEFAULT_WILDCARDS: &[&str] = &[
    "*_backup",
    "*_bk",
    "*_history",
    "*_archive",
    "*_temp",
    "*_staging",
    "*_audit",
    "*_log",
    "tmp_*",
    "temp_*",
    "staging_*",
    "archive_*",
    "bak_*",
];

/// SQL Server meta tables that survive the system-name check.
const DEFAULT_EXACT: &[&str] = &["sysdiagrams", "dtproperties", "sysconstraints", "syssegments"];

const DEFAULT_PREFIXES: &[&str] = &["sys", "INFORMATION_SCHEMA", "__", "msreplication", "spt_"];

/// Dollar-prefixed tables and date/datetime-suffixed snapshots.
const DEFAULT_REGEX: &[&str] = &[r"^\$.*", r".*_\d{8}$", r".*_\d{8}_\d{6}$"];

/// Name-based exclusion filter with per-category default fallback.
pub struct TableExclusionFilter {
    exact_matches: HashSet<String>,
    prefixes: Vec<String>,
    wildcards: Vec<Regex>,
    regexes: Vec<Regex>,
}

impl TableExclusionFilter {
    pub fn from_config(config: &FilterConfig) -> Self {
        let exact_matches: HashSet<String> = if config.excluded_tables.is_empty() {
            DEFAULT_EXACT.iter().map(|s| s.to_string()).collect()
        } else {
            config.excluded_tables.iter().cloned().collect()
        };

        let prefixes: Vec<String> = if config.excluded_prefixes.is_empty() {
            DEFAULT_PREFIXES.iter().map(|s| s.to_string()).collect()
        } else {
            config.excluded_prefixes.clone()
        };

        let wildcard_sources: Vec<String> = if config.exclusion_patterns.is_empty() {
            DEFAULT_WILDCARDS.iter().map(|s| s.to_string()).collect()
        } else {
            config.exclusion_patterns.clone()
        };
        let wildcards = wildcard_sources
            .iter()
            .filter_map(|p| compile(&wildcard_to_regex(p)))
            .collect();

        let regex_sources: Vec<String> = if config.exclusion_regex.is_empty() {
            DEFAULT_REGEX.iter().map(|s| s.to_string()).collect()
        } else {
            config.exclusion_regex.clone()
        };
        let regexes = regex_sources.iter().filter_map(|p| compile(p)).collect();

        let filter = Self {
            exact_matches,
            prefixes,
            wildcards,
            regexes,
        };
        filter.log_configuration();
        filter
    }

    /// First matching category wins; blank names are always excluded.
    pub fn is_excluded(&self, table_name: &str) -> bool {
        if table_name.trim().is_empty() {
            return true;
        }

        if self.exact_matches.contains(table_name) {
            debug!("Excluded (exact match): {}", table_name);
            return true;
        }

        for prefix in &self.prefixes {
            if table_name.starts_with(prefix.as_str()) {
                debug!("Excluded (prefix '{}'): {}", prefix, table_name);
                return true;
            }
        }

        for pattern in &self.wildcards {
            if pattern.is_match(table_name) {
                debug!("Excluded (wildcard '{}'): {}", pattern, table_name);
                return true;
            }
        }

        for regex in &self.regexes {
            if regex.is_match(table_name) {
                debug!("Excluded (regex '{}'): {}", regex, table_name);
                return true;
            }
        }

        false
    }

    fn log_configuration(&self) {
        info!(
            "Table exclusion filter: {} exact, {} prefixes, {} wildcards, {} regexes",
            self.exact_matches.len(),
            self.prefixes.len(),
            self.wildcards.len(),
            self.regexes.len()
        );
    }
}

/// Translate a `*`/`?` wildcard into a fully anchored regex.
fn wildcard_to_regex(pattern: &str) -> String {
    let escaped = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");
    format!("^{}$", escaped)
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!("Invalid exclusion pattern '{}': {}", pattern, e);
            None
        }
    }
}

/// Result counts from one filtering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterStatistics {
    pub total_tables: usize,
    pub included_tables: usize,
    pub excluded_by_pattern: usize,
    pub excluded_by_empty: usize,
}

impl fmt::Display for FilterStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Filter stats: {} total, {} included, {} excluded (pattern: {}, empty: {})",
            self.total_tables,
            self.included_tables,
            self.excluded_by_pattern + self.excluded_by_empty,
            self.excluded_by_pattern,
            self.excluded_by_empty
        )
    }
}

/// Applies the exclusion policy and the empty-table rule to introspected
/// metadata.
pub struct TableFilter {
    exclusion: TableExclusionFilter,
    exclude_empty_tables: bool,
}

impl TableFilter {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            exclusion: TableExclusionFilter::from_config(config),
            exclude_empty_tables: config.exclude_empty_tables,
        }
    }

    /// Keep the tables that pass every active rule, preserving order.
    pub fn apply(&self, tables: Vec<TableMetadata>) -> (Vec<TableMetadata>, FilterStatistics) {
        let total = tables.len();
        let mut excluded_by_pattern = 0;
        let mut excluded_by_empty = 0;

        let included: Vec<TableMetadata> = tables
            .into_iter()
            .filter(|table| {
                if self.exclusion.is_excluded(&table.name) {
                    excluded_by_pattern += 1;
                    return false;
                }
                if self.exclude_empty_tables && table.estimated_row_count == 0 {
                    debug!("Excluded (empty): {}", table.name);
                    excluded_by_empty += 1;
                    return false;
                }
                true
            })
            .collect();

        let stats = FilterStatistics {
            total_tables: total,
            included_tables: included.len(),
            excluded_by_pattern,
            excluded_by_empty,
        };

        info!("{}", stats);
        (included, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SortStrategy;

    fn default_filter() -> TableExclusionFilter {
        TableExclusionFilter::from_config(&FilterConfig::default())
    }

    fn table(name: &str, rows: i64) -> TableMetadata {
        TableMetadata {
            name: name.to_string(),
            schema: "dbo".to_string(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            columns: Vec::new(),
            sort_strategy: SortStrategy::NoSort,
            estimated_row_count: rows,
        }
    }

    #[test]
    fn test_blank_name_always_excluded() {
        let filter = default_filter();
        assert!(filter.is_excluded(""));
        assert!(filter.is_excluded("   "));
    }

    #[test]
    fn test_default_exact_matches() {
        let filter = default_filter();
        assert!(filter.is_excluded("sysdiagrams"));
        assert!(filter.is_excluded("dtproperties"));
    }

    #[test]
    fn test_default_prefixes() {
        let filter = default_filter();
        assert!(filter.is_excluded("sysjobs"));
        assert!(filter.is_excluded("spt_values"));
        assert!(filter.is_excluded("__EFMigrationsHistory"));
        assert!(!filter.is_excluded("config_backup_plan"));
    }

    #[test]
    fn test_default_wildcards() {
        let filter = default_filter();
        assert!(filter.is_excluded("users_backup"));
        assert!(filter.is_excluded("tmp_import"));
        assert!(filter.is_excluded("audit_log"));
        assert!(filter.is_excluded("staging_orders"));
        assert!(!filter.is_excluded("backup_plan_config"));
    }

    #[test]
    fn test_default_regexes() {
        let filter = default_filter();
        assert!(filter.is_excluded("$ingest"));
        assert!(filter.is_excluded("orders_20240101"));
        assert!(filter.is_excluded("orders_20240101_120000"));
        assert!(!filter.is_excluded("orders_2024"));
    }

    #[test]
    fn test_mixed_catalog_with_defaults_keeps_only_users() {
        let filter = default_filter();
        let input = [
            "audit_log",
            "users",
            "users_backup",
            "sysjobs",
            "tmp_import",
            "orders_20240101",
        ];
        let kept: Vec<&str> = input
            .iter()
            .copied()
            .filter(|name| !filter.is_excluded(name))
            .collect();
        assert_eq!(kept, vec!["users"]);
    }

    #[test]
    fn test_custom_list_replaces_default_for_that_category_only() {
        let config = FilterConfig {
            excluded_tables: vec!["keepaway".to_string()],
            ..FilterConfig::default()
        };
        let filter = TableExclusionFilter::from_config(&config);

        // Custom exact list is in force, defaults for that category are not.
        assert!(filter.is_excluded("keepaway"));
        assert!(!filter.is_excluded("sysdiagrams"));
        // sysdiagrams still falls to the default prefix category.
        assert!(filter.is_excluded("sysjobs"));
        // Other categories keep their defaults.
        assert!(filter.is_excluded("users_backup"));
    }

    #[test]
    fn test_wildcard_question_mark_matches_one_char() {
        let config = FilterConfig {
            exclusion_patterns: vec!["shard_?".to_string()],
            ..FilterConfig::default()
        };
        let filter = TableExclusionFilter::from_config(&config);
        assert!(filter.is_excluded("shard_1"));
        assert!(!filter.is_excluded("shard_12"));
        assert!(!filter.is_excluded("shard_"));
    }

    #[test]
    fn test_wildcard_escapes_regex_metacharacters() {
        assert_eq!(wildcard_to_regex("a.b_*"), r"^a\.b_.*$");
    }

    #[test]
    fn test_invalid_user_regex_is_skipped() {
        let config = FilterConfig {
            exclusion_regex: vec!["[unclosed".to_string(), "^valid$".to_string()],
            ..FilterConfig::default()
        };
        let filter = TableExclusionFilter::from_config(&config);
        assert!(filter.is_excluded("valid"));
        assert!(!filter.is_excluded("[unclosed"));
    }

    #[test]
    fn test_apply_excludes_empty_tables_when_configured() {
        let table_filter = TableFilter::from_config(&FilterConfig::default());
        let tables = vec![table("users", 10), table("ghost", 0)];
        let (kept, stats) = table_filter.apply(tables);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "users");
        assert_eq!(stats.excluded_by_empty, 1);
        assert_eq!(stats.excluded_by_pattern, 0);
    }

    #[test]
    fn test_apply_keeps_empty_tables_when_disabled() {
        let config = FilterConfig {
            exclude_empty_tables: false,
            ..FilterConfig::default()
        };
        let table_filter = TableFilter::from_config(&config);
        let (kept, stats) = table_filter.apply(vec![table("ghost", 0)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.included_tables, 1);
    }

    #[test]
    fn test_apply_counts_pattern_exclusions() {
        let table_filter = TableFilter::from_config(&FilterConfig::default());
        let (kept, stats) =
            table_filter.apply(vec![table("users", 5), table("users_backup", 5)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.excluded_by_pattern, 1);
        assert_eq!(stats.total_tables, 2);
    }
}
