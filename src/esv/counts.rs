use std::path::Path;

use rustc_hash::FxHashMap;

use crate::demux::{COUNT_COLUMN, PRIMER_COLUMN};
use crate::errors::*;
use crate::esv::EsvOrder;
use crate::io::Table;

pub const SAMPLE_COLUMN: &str = "index";
pub const TOTAL_COLUMN: &str = "total";
pub const DEFAULT_ID_COLUMN: &str = "Zotu";

type Key = (String, usize, String);

/// Read counts per (primer, sample, ESV).
///
/// Each key is written once per run. The same ESV in two samples is two rows.
#[derive(Debug, Clone, Default)]
pub struct CountTable {
    counts: FxHashMap<Key, u64>,
}

impl CountTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn record(&mut self, primer: &str, sample: usize, esv: &str, count: u64) -> Result<()> {
        let key = (primer.to_owned(), sample, esv.to_owned());

        if self.counts.contains_key(&key) {
            return Err(Error::DuplicateCount {
                primer: key.0,
                sample,
                esv: key.2,
            });
        }

        self.counts.insert(key, count);
        Ok(())
    }

    pub fn get(&self, primer: &str, sample: usize, esv: &str) -> Option<u64> {
        self.counts
            .get(&(primer.to_owned(), sample, esv.to_owned()))
            .copied()
    }

    /// Sum of recorded counts for one primer in one sample.
    pub fn total(&self, primer: &str, sample: usize) -> u64 {
        self.counts
            .iter()
            .filter(|((p, s, _), _)| p.as_str() == primer && *s == sample)
            .map(|(_, &c)| c)
            .sum()
    }

    fn totals(&self) -> FxHashMap<(&str, usize), u64> {
        let mut totals = FxHashMap::default();
        for ((p, s, _), &c) in &self.counts {
            *totals.entry((p.as_str(), *s)).or_insert(0) += c;
        }
        totals
    }

    /// Rows sorted by primer, then sample, then ESV name under `order`.
    pub fn sorted(&self, order: &EsvOrder) -> Vec<(&str, usize, &str, u64)> {
        let mut res = self
            .counts
            .iter()
            .map(|((p, s, e), &c)| (p.as_str(), *s, e.as_str(), c))
            .collect::<Vec<_>>();
        res.sort_by(|a, b| {
            a.0.cmp(b.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| order.compare(a.2, b.2))
        });
        res
    }

    pub fn to_table(&self, id_column: &str, order: &EsvOrder) -> Result<Table> {
        let mut table = Table::new([
            PRIMER_COLUMN,
            SAMPLE_COLUMN,
            id_column,
            COUNT_COLUMN,
            TOTAL_COLUMN,
        ]);

        let totals = self.totals();
        for (primer, sample, esv, count) in self.sorted(order) {
            table.push_row([
                primer.to_owned(),
                sample.to_string(),
                esv.to_owned(),
                count.to_string(),
                totals[&(primer, sample)].to_string(),
            ])?;
        }

        Ok(table)
    }

    pub fn write_tsv(&self, file: impl AsRef<Path>, id_column: &str, order: &EsvOrder) -> Result<()> {
        self.to_table(id_column, order)?.write_path(file)
    }
}
