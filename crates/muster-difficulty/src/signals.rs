//! The external extraction-signals contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use muster_types::{Record, SoldierId, SourceId};

/// Extraction rows are joined on the record's (source, soldier) key.
pub type RecordKey = (SourceId, SoldierId);

/// One row of the external extraction table.
///
/// `characterized` maps pattern-family names to `"<level>:<value>"` entries;
/// the computer ignores the family names themselves. `bare_alpha` and
/// `bare_numeric` carry uncharacterized fragments whose level is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRow {
    #[serde(default)]
    pub characterized: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub bare_alpha: Vec<String>,
    #[serde(default)]
    pub bare_numeric: Vec<String>,
}

impl ExtractionRow {
    /// All characterized (level, value) pairs across every pattern family.
    /// Entries without the `level:value` shape are skipped.
    pub fn characterized_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.characterized
            .values()
            .flatten()
            .filter_map(|entry| entry.split_once(':'))
    }

    /// All uncharacterized fragments, alphabetic then numeric.
    pub fn uncharacterized(&self) -> impl Iterator<Item = &str> {
        self.bare_alpha
            .iter()
            .chain(&self.bare_numeric)
            .map(String::as_str)
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.characterized.values().all(Vec::is_empty)
            && self.bare_alpha.is_empty()
            && self.bare_numeric.is_empty()
    }
}

/// The full table, keyed by record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionTable {
    rows: BTreeMap<RecordKey, ExtractionRow>,
}

impl ExtractionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: RecordKey, row: ExtractionRow) {
        self.rows.insert(key, row);
    }

    #[must_use]
    pub fn get(&self, key: &RecordKey) -> Option<&ExtractionRow> {
        self.rows.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows grouped per soldier, in key order.
    #[must_use]
    pub fn by_soldier(&self) -> BTreeMap<SoldierId, Vec<&ExtractionRow>> {
        let mut grouped: BTreeMap<SoldierId, Vec<&ExtractionRow>> = BTreeMap::new();
        for ((_, soldier_id), row) in &self.rows {
            grouped.entry(*soldier_id).or_default().push(row);
        }
        grouped
    }

    pub fn rows_for(&self, soldier_id: SoldierId) -> impl Iterator<Item = &ExtractionRow> {
        self.rows
            .iter()
            .filter(move |((_, sid), _)| *sid == soldier_id)
            .map(|(_, row)| row)
    }
}

/// Seam for the external regex preprocessor. The generator can run without
/// one (it then stops after the generation artifacts); difficulty scoring
/// and rebalancing require an implementation.
pub trait ExtractionProvider {
    fn extract(&self, records: &[Record]) -> ExtractionTable;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_characterized_pairs_skip_malformed_entries() {
        let mut row = ExtractionRow::default();
        row.characterized.insert(
            "labeled-units".to_owned(),
            vec!["division:3".to_owned(), "garbled".to_owned(), "regiment:7".to_owned()],
        );
        let pairs: Vec<(&str, &str)> = row.characterized_pairs().collect();
        assert_eq!(pairs, vec![("division", "3"), ("regiment", "7")]);
    }

    #[test]
    fn test_by_soldier_groups_across_sources() {
        let mut table = ExtractionTable::new();
        let row = ExtractionRow {
            bare_numeric: vec!["7".to_owned()],
            ..ExtractionRow::default()
        };
        table.insert((SourceId(1), SoldierId(5)), row.clone());
        table.insert((SourceId(2), SoldierId(5)), row.clone());
        table.insert((SourceId(1), SoldierId(6)), row);
        let grouped = table.by_soldier();
        assert_eq!(grouped[&SoldierId(5)].len(), 2);
        assert_eq!(grouped[&SoldierId(6)].len(), 1);
    }
}
