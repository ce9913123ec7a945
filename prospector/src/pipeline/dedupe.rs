//! Cross-run global deduplication.

use super::{IngestOutcome, ProcessingStats, Record};
use std::collections::HashSet;

/// Result of merging several runs' outputs with a global dedupe pass.
#[derive(Debug, Clone)]
pub struct MergedRuns<R> {
    /// Records from all runs, first occurrence of each key kept, in
    /// run order.
    pub records: Vec<R>,
    /// All runs' counters folded together. Per-run `duplicates` counts
    /// are preserved here untouched.
    pub stats: ProcessingStats,
    /// Records dropped by this cross-run pass, counted separately from
    /// any run's own duplicates.
    pub global_duplicates_removed: usize,
}

/// Merges multiple runs' outputs, removing cross-run duplicates by the
/// same dedupe key the runs themselves used.
#[must_use]
pub fn merge_runs<R: Record>(outcomes: Vec<IngestOutcome<R>>) -> MergedRuns<R> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();
    let mut stats = ProcessingStats::new();
    let mut removed = 0usize;

    for outcome in outcomes {
        stats.merge(&outcome.stats);
        for record in outcome.records {
            if seen.insert(record.dedupe_key()) {
                records.push(record);
            } else {
                removed += 1;
            }
        }
    }

    MergedRuns {
        records,
        stats,
        global_duplicates_removed: removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Keyed(String);

    impl Record for Keyed {
        fn dedupe_key(&self) -> String {
            self.0.clone()
        }
    }

    fn outcome(keys: &[&str]) -> IngestOutcome<Keyed> {
        let records: Vec<Keyed> = keys.iter().map(|k| Keyed((*k).to_string())).collect();
        let stats = ProcessingStats {
            total_rows: records.len(),
            succeeded: records.len(),
            ..ProcessingStats::default()
        };
        IngestOutcome {
            records,
            stats,
            cancelled: false,
        }
    }

    #[test]
    fn test_merge_removes_cross_run_duplicates() {
        let merged = merge_runs(vec![
            outcome(&["a.com", "b.com"]),
            outcome(&["b.com", "c.com"]),
        ]);

        let keys: Vec<String> = merged.records.iter().map(Record::dedupe_key).collect();
        assert_eq!(keys, vec!["a.com", "b.com", "c.com"]);
        assert_eq!(merged.global_duplicates_removed, 1);
        // Per-run stats are folded, not rewritten.
        assert_eq!(merged.stats.total_rows, 4);
        assert_eq!(merged.stats.succeeded, 4);
        assert_eq!(merged.stats.duplicates, 0);
    }

    #[test]
    fn test_merge_empty_runs() {
        let merged = merge_runs::<Keyed>(vec![]);
        assert!(merged.records.is_empty());
        assert_eq!(merged.global_duplicates_removed, 0);
    }
}
