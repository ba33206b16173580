//! Partitioning of the stage list into parallel batches.

use crate::stages::StageConfig;

/// Splits stages into contiguous fixed-size batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchPlanner;

impl BatchPlanner {
    /// Plans batches of at most `max_batch_size` stages.
    ///
    /// Order is preserved and only the last batch may be smaller. A size
    /// of 0 is treated as 1.
    #[must_use]
    pub fn plan(stages: &[StageConfig], max_batch_size: usize) -> Vec<Vec<StageConfig>> {
        stages
            .chunks(max_batch_size.max(1))
            .map(<[StageConfig]>::to_vec)
            .collect()
    }

    /// Returns the number of batches [`plan`](Self::plan) would produce.
    #[must_use]
    pub fn batch_count(stage_count: usize, max_batch_size: usize) -> usize {
        stage_count.div_ceil(max_batch_size.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stages(n: usize) -> Vec<StageConfig> {
        (0..n)
            .map(|i| StageConfig::with_defaults(format!("S{i}")).unwrap())
            .collect()
    }

    fn names(batches: &[Vec<StageConfig>]) -> Vec<Vec<String>> {
        batches
            .iter()
            .map(|b| b.iter().map(|s| s.name().to_string()).collect())
            .collect()
    }

    #[test]
    fn test_even_split() {
        let batches = BatchPlanner::plan(&stages(6), 3);
        assert_eq!(
            names(&batches),
            vec![vec!["S0", "S1", "S2"], vec!["S3", "S4", "S5"]]
        );
    }

    #[test]
    fn test_uneven_split_keeps_order() {
        let batches = BatchPlanner::plan(&stages(7), 3);
        assert_eq!(batches.len(), 3);
        assert_eq!(names(&batches)[2], vec!["S6"]);
    }

    #[test]
    fn test_batch_count_law() {
        for n in 0..12 {
            for k in 1..6 {
                let batches = BatchPlanner::plan(&stages(n), k);
                assert_eq!(batches.len(), n.div_ceil(k));
                assert_eq!(batches.len(), BatchPlanner::batch_count(n, k));
                assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), n);

                let (last, full) = match batches.split_last() {
                    Some(split) => split,
                    None => continue,
                };
                assert!(full.iter().all(|b| b.len() == k));
                assert!(!last.is_empty() && last.len() <= k);

                let flat: Vec<String> = batches.concat().iter().map(|s| s.name().to_string()).collect();
                let expected: Vec<String> = (0..n).map(|i| format!("S{i}")).collect();
                assert_eq!(flat, expected);
            }
        }
    }

    #[test]
    fn test_zero_size_treated_as_one() {
        let batches = BatchPlanner::plan(&stages(3), 0);
        assert_eq!(batches.len(), 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(BatchPlanner::plan(&[], 3).is_empty());
    }
}
