//! The assembled question table.

use serde::{Deserialize, Serialize};

use super::record::QuestionRecord;

/// Column headers of the output table, in order.
pub const COLUMNS: [&str; 8] = ["number", "Question", "A", "B", "C", "D", "answer", "Figure"];

/// Final ordered table of question records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionTable {
    /// Rows sorted by question number, numbers unique
    pub records: Vec<QuestionRecord>,

    /// Expected numbers that no row was produced for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<u32>,
}

impl QuestionTable {
    /// Build a table from records, sorting by number and keeping the first row per number.
    pub fn new(mut records: Vec<QuestionRecord>, expected: u32) -> Self {
        records.sort_by_key(|r| r.number);
        records.dedup_by_key(|r| r.number);

        let missing = (1..=expected)
            .filter(|n| records.binary_search_by_key(n, |r| r.number).is_err())
            .collect();

        Self { records, missing }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a row by question number.
    pub fn get(&self, number: u32) -> Option<&QuestionRecord> {
        self.records
            .binary_search_by_key(&number, |r| r.number)
            .ok()
            .map(|i| &self.records[i])
    }

    /// Iterate over rows in number order.
    pub fn iter(&self) -> std::slice::Iter<'_, QuestionRecord> {
        self.records.iter()
    }

    /// Number of rows with a rendered figure.
    pub fn figure_count(&self) -> usize {
        self.records.iter().filter(|r| r.figure.is_some()).count()
    }
}

impl<'a> IntoIterator for &'a QuestionTable {
    type Item = &'a QuestionRecord;
    type IntoIter = std::slice::Iter<'a, QuestionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
