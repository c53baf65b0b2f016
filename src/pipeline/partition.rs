use crate::pipeline::ClassificationResult;
use crate::table::Table;
use log::info;
use log::warn;

/// Good-only and wrong-only copies of a classified table.
#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    pub good: Table,
    pub wrong: Table,
}

/// Splits a table into a good copy without the wrong columns and a wrong copy
/// without the good columns.
///
/// Returns `None` when no column is wrong: there is nothing to split and no
/// derived sheet or report is produced.
pub fn partition(table: &Table, classification: &ClassificationResult) -> Option<Partition> {
    if classification.wrong.is_empty() {
        warn!("no column to delete...");
        return None;
    }

    info!("deleting columns...");
    let mut good = table.clone();
    let removed = good.delete_columns(&classification.wrong);
    info!("{} columns removed...", removed);

    let mut wrong = table.clone();
    wrong.delete_columns(&classification.good);
    Some(Partition { good, wrong })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::numeric_table;
    use std::collections::HashSet;

    fn classification(good: &[usize], wrong: &[usize]) -> ClassificationResult {
        ClassificationResult {
            good: good.to_vec(),
            wrong: wrong.to_vec(),
            ..ClassificationResult::default()
        }
    }

    fn names(table: &Table) -> Vec<String> {
        (1..=table.max_column()).map(|column| table.column_name(column)).collect()
    }

    #[test]
    fn partition_renumbers_columns() {
        let table = numeric_table(&["Label", "ROI1", "ROI2", "ROI3"], &[&[1.0], &[2.0], &[3.0]]);
        let partition = partition(&table, &classification(&[2, 4], &[3])).unwrap();

        assert_eq!(names(&partition.good), vec!["Label", "ROI1", "ROI3"]);
        assert_eq!(names(&partition.wrong), vec!["Label", "ROI2"]);
        assert_eq!(partition.good.column_values(3, 2, 2), vec![Some(3.0)]);
    }

    #[test]
    fn partition_of_four_columns() {
        // Wrong {3} and good {4}: columns {1,2,4} and {1,2,3} of the source table
        let table = numeric_table(&["Label", "BG", "ROI1", "ROI2"], &[&[0.5], &[1.0], &[2.0]]);
        let partition = partition(&table, &classification(&[4], &[3])).unwrap();

        assert_eq!(names(&partition.good), vec!["Label", "BG", "ROI2"]);
        assert_eq!(names(&partition.wrong), vec!["Label", "BG", "ROI1"]);
    }

    #[test]
    fn partition_covers_every_column_once() {
        let headers = ["Label", "A", "B", "C", "D", "E", "F"];
        let table = numeric_table(&headers, &[&[1.0], &[2.0], &[3.0], &[4.0], &[5.0], &[6.0]]);
        let partition = partition(&table, &classification(&[3, 6], &[2, 4, 5, 7])).unwrap();

        assert_eq!(
            partition.good.data_column_count() + partition.wrong.data_column_count(),
            table.data_column_count()
        );
        let good: HashSet<String> = names(&partition.good).into_iter().skip(1).collect();
        let wrong: HashSet<String> = names(&partition.wrong).into_iter().skip(1).collect();
        assert!(good.is_disjoint(&wrong));
        let all: HashSet<String> = good.union(&wrong).cloned().collect();
        let expected: HashSet<String> = headers[1..].iter().map(|name| name.to_string()).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn nothing_wrong_means_no_partition() {
        let table = numeric_table(&["Label", "A"], &[&[1.0]]);
        assert!(partition(&table, &classification(&[2], &[])).is_none());
        assert!(partition(&table, &classification(&[], &[])).is_none());
    }

    #[test]
    fn partition_leaves_source_intact() {
        let table = numeric_table(&["Label", "A", "B"], &[&[1.0], &[2.0]]);
        let copy = table.clone();
        partition(&table, &classification(&[2], &[3])).unwrap();
        assert_eq!(table, copy);
    }
}
