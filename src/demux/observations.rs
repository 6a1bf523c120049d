use std::collections::BTreeMap;
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::demux::PRIMER_COLUMN;
use crate::errors::*;
use crate::io::Table;

pub const COUNT_COLUMN: &str = "count";
pub const SEQUENCE_COLUMN: &str = "sequence";

/// A distinct sequence seen under one primer in one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub primer: String,
    pub sequence: Vec<u8>,
    pub count: u64,
}

/// Read support for each distinct insert, per primer, within one sample.
#[derive(Debug, Clone, Default)]
pub struct SampleCounts {
    by_primer: BTreeMap<String, FxHashMap<Vec<u8>, u64>>,
}

impl SampleCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, primer: &str, sequence: &[u8]) {
        self.add_n(primer, sequence, 1);
    }

    pub fn add_n(&mut self, primer: &str, sequence: &[u8], n: u64) {
        if !self.by_primer.contains_key(primer) {
            self.by_primer.insert(primer.to_owned(), FxHashMap::default());
        }
        if let Some(seqs) = self.by_primer.get_mut(primer) {
            *seqs.entry(sequence.to_owned()).or_insert(0) += n;
        }
    }

    pub fn primers(&self) -> impl Iterator<Item = &str> {
        self.by_primer.keys().map(String::as_str)
    }

    pub fn distinct(&self) -> usize {
        self.by_primer.values().map(|s| s.len()).sum()
    }

    /// Observations for one primer, most abundant first, ties by sequence.
    pub fn observations(&self, primer: &str) -> Vec<Observation> {
        let Some(seqs) = self.by_primer.get(primer) else {
            return Vec::new();
        };

        let mut res = seqs
            .iter()
            .map(|(s, &c)| Observation {
                primer: primer.to_owned(),
                sequence: s.clone(),
                count: c,
            })
            .collect::<Vec<_>>();
        res.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.sequence.cmp(&b.sequence)));
        res
    }

    pub fn to_table(&self) -> Result<Table> {
        let mut table = Table::new([PRIMER_COLUMN, COUNT_COLUMN, SEQUENCE_COLUMN]);

        for primer in self.primers() {
            for o in self.observations(primer) {
                table.push_row([o.primer, o.count.to_string(), utf8(&o.sequence)])?;
            }
        }

        Ok(table)
    }

    pub fn from_table(table: &Table) -> Result<Self> {
        let mut counts = Self::new();

        for i in 0..table.len() {
            let count = table.parse::<u64>(i, COUNT_COLUMN)?;
            let sequence = table.get(i, SEQUENCE_COLUMN).trim().to_ascii_uppercase();
            counts.add_n(table.get(i, PRIMER_COLUMN).trim(), sequence.as_bytes(), count);
        }

        Ok(counts)
    }

    pub fn from_path(file: impl AsRef<Path>) -> Result<Self> {
        let table = Table::from_path(file, &[PRIMER_COLUMN, COUNT_COLUMN, SEQUENCE_COLUMN])?;
        Self::from_table(&table)
    }
}
