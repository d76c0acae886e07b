//! Dependency-level parallel scheduling.
//!
//! Tables are partitioned into waves by foreign-key depth: wave 0 has no
//! in-set dependencies, wave N depends only on waves 0..N-1. Waves run
//! strictly in order; tables within a wave export concurrently on pooled
//! sessions. Tables on a reference cycle cannot be levelled and are
//! appended as a final wave — the output still contains them, but their
//! inserts may violate FK constraints at restore time.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{info, warn};

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::exporter::{export_table, ExportResult};
use crate::pool::SessionPool;
use crate::schema::TableMetadata;
use crate::sql::SqlSink;

/// Wave partition of the export set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyWaves {
    /// Waves in execution order; the cyclic remainder, if any, is the last wave.
    pub waves: Vec<Vec<String>>,

    /// Tables that sit on a reference cycle.
    pub cyclic: Vec<String>,
}

impl DependencyWaves {
    pub fn table_count(&self) -> usize {
        self.waves.iter().map(|w| w.len()).sum()
    }
}

/// Assign each table its FK depth via BFS from the zero-dependency roots.
///
/// Only edges to tables inside the export set count; self-references are
/// ignored. Tables never reached by the construction are on a cycle.
pub fn compute_waves(tables: &[TableMetadata]) -> DependencyWaves {
    let names: HashSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();

    let deps: HashMap<&str, HashSet<&str>> = tables
        .iter()
        .map(|table| {
            let dep_set: HashSet<&str> = table
                .foreign_keys
                .iter()
                .map(|fk| fk.referenced_table.as_str())
                .filter(|referenced| *referenced != table.name && names.contains(referenced))
                .collect();
            (table.name.as_str(), dep_set)
        })
        .collect();

    let mut levels: HashMap<&str, usize> = HashMap::new();
    let mut processed: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();

    for table in tables {
        if deps[table.name.as_str()].is_empty() {
            levels.insert(&table.name, 0);
            processed.insert(&table.name);
            queue.push_back(&table.name);
        }
    }

    while queue.pop_front().is_some() {
        for table in tables {
            let name = table.name.as_str();
            if processed.contains(name) {
                continue;
            }
            let dep_set = &deps[name];
            if dep_set.is_subset(&processed) {
                let max_dep_level = dep_set
                    .iter()
                    .map(|dep| levels.get(dep).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                levels.insert(name, max_dep_level + 1);
                processed.insert(name);
                queue.push_back(name);
            }
        }
    }

    let cyclic: Vec<String> = tables
        .iter()
        .filter(|t| !processed.contains(t.name.as_str()))
        .map(|t| {
            warn!("Circular dependency detected for table: {}", t.name);
            t.name.clone()
        })
        .collect();

    let max_level = levels.values().copied().max().unwrap_or(0);
    let mut waves: Vec<Vec<String>> = Vec::new();
    for level in 0..=max_level {
        let wave: Vec<String> = tables
            .iter()
            .filter(|t| levels.get(t.name.as_str()) == Some(&level))
            .map(|t| t.name.clone())
            .collect();
        if !wave.is_empty() {
            waves.push(wave);
        }
    }
    if !cyclic.is_empty() {
        waves.push(cyclic.clone());
    }

    DependencyWaves { waves, cyclic }
}

/// Drive level-synchronous parallel export over the whole export set.
///
/// Every table in a wave is submitted concurrently; the wave completes
/// only when all of its workers have finished. An error fails the wave
/// (and the run) after in-flight workers are allowed to finish.
pub async fn export_in_waves(
    pool: Arc<SessionPool>,
    sink: Arc<SqlSink>,
    config: Arc<ExportConfig>,
    tables: Vec<TableMetadata>,
) -> Result<Vec<ExportResult>> {
    info!("========================================");
    info!("Starting parallel export with {} workers", pool.size());
    info!("========================================");

    let start = Instant::now();
    let plan = compute_waves(&tables);

    info!("Dependency analysis complete:");
    info!("  - Total tables: {}", plan.table_count());
    info!("  - Dependency levels: {}", plan.waves.len());
    for (level, wave) in plan.waves.iter().enumerate() {
        info!("  - Level {}: {} tables", level, wave.len());
    }

    info!("Export order (maintaining referential integrity):");
    for (i, name) in plan.waves.iter().flatten().take(10).enumerate() {
        info!("  {}. {}", i + 1, name);
    }
    if plan.table_count() > 10 {
        info!("  ... and {} more tables", plan.table_count() - 10);
    }

    let mut by_name: HashMap<String, TableMetadata> =
        tables.into_iter().map(|t| (t.name.clone(), t)).collect();

    let mut results = Vec::new();

    for (level, wave) in plan.waves.iter().enumerate() {
        info!("=== Level {}: exporting {} tables in parallel ===", level, wave.len());
        let level_start = Instant::now();

        let mut handles = Vec::with_capacity(wave.len());
        for name in wave {
            let Some(metadata) = by_name.remove(name) else {
                continue;
            };
            let pool = Arc::clone(&pool);
            let sink = Arc::clone(&sink);
            let config = Arc::clone(&config);

            handles.push(tokio::spawn(async move {
                let mut session = pool.acquire().await?;
                // Session goes back to the pool when the handle drops,
                // error or not.
                export_table(&mut session, &metadata, &sink, &config).await
            }));
        }

        let wave_size = handles.len();
        let mut wave_rows: i64 = 0;
        let mut wave_error: Option<ExportError> = None;

        for (completed, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok(Ok(result)) => {
                    wave_rows += result.row_count;
                    info!(
                        "  [{}/{}] {}: {} rows in {:.2}s",
                        completed + 1,
                        wave_size,
                        result.table_name,
                        result.row_count,
                        result.duration_seconds
                    );
                    results.push(result);
                }
                Ok(Err(e)) => {
                    if wave_error.is_none() {
                        wave_error = Some(e);
                    }
                }
                Err(join_err) => {
                    if wave_error.is_none() {
                        wave_error =
                            Some(ExportError::table("<worker>", format!("worker panicked: {}", join_err)));
                    }
                }
            }
        }

        if let Some(e) = wave_error {
            return Err(e);
        }

        info!(
            "=== Level {} complete: {} rows in {:.2}s ===",
            level,
            wave_rows,
            level_start.elapsed().as_secs_f64()
        );
    }

    let total_rows: i64 = results.iter().map(|r| r.row_count).sum();
    let elapsed = start.elapsed().as_secs_f64();
    info!("========================================");
    info!("Parallel export complete");
    info!("  - Duration: {:.2}s", elapsed);
    info!("  - Total rows: {}", total_rows);
    if elapsed > 0.0 {
        info!("  - Throughput: {:.0} rows/sec", total_rows as f64 / elapsed);
    }
    info!("========================================");

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ForeignKeyInfo, SortStrategy};

    fn fk(to: &str) -> ForeignKeyInfo {
        ForeignKeyInfo {
            constraint_name: format!("FK_{}", to),
            local_column: format!("{}_id", to),
            referenced_schema: "dbo".to_string(),
            referenced_table: to.to_string(),
            referenced_column: "id".to_string(),
            key_sequence: 1,
        }
    }

    fn table(name: &str, fks: Vec<ForeignKeyInfo>) -> TableMetadata {
        TableMetadata {
            name: name.to_string(),
            schema: "dbo".to_string(),
            primary_key: vec!["id".to_string()],
            foreign_keys: fks,
            columns: Vec::new(),
            sort_strategy: SortStrategy::NoSort,
            estimated_row_count: 1,
        }
    }

    #[test]
    fn test_chain_with_independent_table() {
        // A, B(fk->A), C(fk->B), D: waves {A,D} -> {B} -> {C}
        let tables = vec![
            table("A", vec![]),
            table("B", vec![fk("A")]),
            table("C", vec![fk("B")]),
            table("D", vec![]),
        ];
        let plan = compute_waves(&tables);

        assert_eq!(
            plan.waves,
            vec![
                vec!["A".to_string(), "D".to_string()],
                vec!["B".to_string()],
                vec!["C".to_string()],
            ]
        );
        assert!(plan.cyclic.is_empty());
    }

    #[test]
    fn test_levels_respect_deepest_dependency() {
        // E depends on both A (level 0) and C (level 2) -> level 3.
        let tables = vec![
            table("A", vec![]),
            table("B", vec![fk("A")]),
            table("C", vec![fk("B")]),
            table("E", vec![fk("A"), fk("C")]),
        ];
        let plan = compute_waves(&tables);
        assert_eq!(plan.waves.len(), 4);
        assert_eq!(plan.waves[3], vec!["E".to_string()]);
    }

    #[test]
    fn test_cycle_goes_to_final_wave() {
        let tables = vec![
            table("X", vec![fk("Y")]),
            table("Y", vec![fk("X")]),
            table("Z", vec![]),
        ];
        let plan = compute_waves(&tables);

        assert_eq!(plan.cyclic, vec!["X".to_string(), "Y".to_string()]);
        assert_eq!(
            plan.waves,
            vec![
                vec!["Z".to_string()],
                vec!["X".to_string(), "Y".to_string()],
            ]
        );
    }

    #[test]
    fn test_self_reference_is_not_a_cycle() {
        let tables = vec![table("employees", vec![fk("employees")])];
        let plan = compute_waves(&tables);
        assert!(plan.cyclic.is_empty());
        assert_eq!(plan.waves, vec![vec!["employees".to_string()]]);
    }

    #[test]
    fn test_out_of_set_references_are_ignored() {
        let tables = vec![table("orders", vec![fk("customers_not_exported")])];
        let plan = compute_waves(&tables);
        assert_eq!(plan.waves, vec![vec!["orders".to_string()]]);
    }

    #[test]
    fn test_empty_set_yields_no_waves() {
        let plan = compute_waves(&[]);
        assert!(plan.waves.is_empty());
        assert_eq!(plan.table_count(), 0);
    }

    #[test]
    fn test_dependency_ordering_invariant() {
        // For every intra-set edge t -> u, level(t) > level(u).
        let tables = vec![
            table("A", vec![]),
            table("B", vec![fk("A")]),
            table("C", vec![fk("B"), fk("A")]),
            table("D", vec![fk("A")]),
        ];
        let plan = compute_waves(&tables);

        let level_of = |name: &str| {
            plan.waves
                .iter()
                .position(|w| w.iter().any(|t| t == name))
                .unwrap()
        };

        for t in &tables {
            for dep in &t.foreign_keys {
                assert!(level_of(&t.name) > level_of(&dep.referenced_table));
            }
        }
    }
}
