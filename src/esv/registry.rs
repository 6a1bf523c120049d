use std::path::Path;

use log::{info, warn};
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

use crate::errors::*;
use crate::esv::EsvOrder;
use crate::io::{read_fasta_records, FastaWriter};

/// How names are chosen for sequences seen for the first time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Naming {
    /// Hex SHA-256 of the sequence. Identical sequences get identical names in
    /// every run without a seed registry.
    ContentHash,
    /// `prefix` followed by one more than the number of names already bound.
    /// Stable across runs only when seeded with the previous registry.
    Prefix(String),
}

impl Naming {
    /// The comparator matching this naming scheme.
    pub fn order(&self) -> EsvOrder {
        match self {
            Naming::ContentHash => EsvOrder::lexicographic(),
            Naming::Prefix(p) => EsvOrder::new(Some(p.as_str())),
        }
    }
}

pub fn content_hash(seq: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seq);
    hex::encode(hasher.finalize())
}

/// One-to-one mapping between ESV sequences and their names.
pub struct EsvRegistry {
    naming: Naming,
    by_seq: FxHashMap<Vec<u8>, String>,
    by_name: FxHashMap<String, Vec<u8>>,
}

impl EsvRegistry {
    pub fn new(naming: Naming) -> Self {
        Self {
            naming,
            by_seq: FxHashMap::default(),
            by_name: FxHashMap::default(),
        }
    }

    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Bind names from a previous run.
    ///
    /// A sequence that is already bound is skipped with a warning. A name that
    /// is already bound to another sequence is an error. Returns the number of
    /// new bindings.
    pub fn seed(&mut self, records: impl IntoIterator<Item = (String, Vec<u8>)>) -> Result<usize> {
        let mut bound = 0;

        for (name, seq) in records {
            let seq = seq.to_ascii_uppercase();

            if let Some(existing) = self.by_seq.get(&seq) {
                warn!("Seed sequence for \"{name}\" is already named \"{existing}\", skipping");
                continue;
            }
            if self.by_name.contains_key(&name) {
                return Err(Error::DuplicateSeedName { name });
            }

            self.bind(name, seq);
            bound += 1;
        }

        Ok(bound)
    }

    pub fn seed_from_fasta(&mut self, file: impl AsRef<Path>) -> Result<usize> {
        let file = file.as_ref();
        let bound = self.seed(read_fasta_records(file)?)?;
        info!("Seeded {bound} ESV names from \"{}\"", file.display());
        Ok(bound)
    }

    fn bind(&mut self, name: String, seq: Vec<u8>) {
        self.by_name.insert(name.clone(), seq.clone());
        self.by_seq.insert(seq, name);
    }

    /// Name of `seq`, binding a new name if it has not been seen before.
    pub fn assign(&mut self, seq: &[u8]) -> Result<&str> {
        let seq = seq.to_ascii_uppercase();

        if !self.by_seq.contains_key(&seq) {
            let name = match &self.naming {
                Naming::ContentHash => content_hash(&seq),
                Naming::Prefix(p) => format!("{p}{}", self.len() + 1),
            };

            if self.by_name.contains_key(&name) {
                return Err(Error::NameCollision { name });
            }

            self.bind(name, seq.clone());
        }

        Ok(self.by_seq[&seq].as_str())
    }

    pub fn name_of(&self, seq: &[u8]) -> Option<&str> {
        self.by_seq
            .get(&seq.to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn sequence_of(&self, name: &str) -> Option<&[u8]> {
        self.by_name.get(name).map(Vec::as_slice)
    }

    /// All `(name, sequence)` pairs in output order.
    pub fn sorted(&self) -> Vec<(&str, &[u8])> {
        let order = self.naming.order();
        let mut res = self
            .by_name
            .iter()
            .map(|(n, s)| (n.as_str(), s.as_slice()))
            .collect::<Vec<_>>();
        res.sort_by(|a, b| order.compare(a.0, b.0));
        res
    }

    pub fn write_fasta(&self, writer: &mut FastaWriter) -> Result<()> {
        for (name, seq) in self.sorted() {
            writer.write_record(name.as_bytes(), seq)?;
        }
        Ok(())
    }
}
