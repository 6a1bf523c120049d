//! Error-tolerant barcode lookup for long reads.
//!
//! Every canonical barcode and its reverse complement is expanded once into all
//! variants with a single substitution or with two bases truncated from either
//! end, so a query is only a handful of hash lookups.

use rustc_hash::FxHashMap;

use crate::errors::*;
use crate::patterns::revcomp;

const TRUNCATE: usize = 2;
const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

pub struct BarcodeIndex {
    barcode_len: usize,
    names: Vec<String>,
    lookup: FxHashMap<Vec<u8>, usize>,
}

impl BarcodeIndex {
    /// Build the index from `(name, barcode)` pairs.
    ///
    /// Barcodes are registered in the order given. When variants of two
    /// barcodes collide, the barcode registered later owns the variant.
    pub fn new<N, S>(barcodes: impl IntoIterator<Item = (N, S)>) -> Result<Self>
    where
        N: Into<String>,
        S: AsRef<[u8]>,
    {
        let mut index = Self {
            barcode_len: 0,
            names: Vec::new(),
            lookup: FxHashMap::default(),
        };

        for (name, barcode) in barcodes {
            index.insert(name.into(), barcode.as_ref())?;
        }

        Ok(index)
    }

    fn insert(&mut self, name: String, barcode: &[u8]) -> Result<()> {
        let barcode = barcode.to_ascii_uppercase();

        if self.names.is_empty() {
            self.barcode_len = barcode.len();
        } else if barcode.len() != self.barcode_len {
            return Err(Error::BarcodeLength {
                primer: name,
                len: barcode.len(),
                expected: self.barcode_len,
            });
        }
        if barcode.len() <= TRUNCATE {
            return Err(Error::Config(format!(
                "barcode \"{name}\" is too short to index"
            )));
        }

        let id = self.names.len();
        self.names.push(name);

        for strand in [barcode.clone(), revcomp(&barcode)?] {
            self.lookup.insert(strand.clone(), id);
            self.lookup.insert(strand[TRUNCATE..].to_vec(), id);
            self.lookup
                .insert(strand[..strand.len() - TRUNCATE].to_vec(), id);

            for i in 0..strand.len() {
                for &b in BASES.iter().filter(|&&b| b != strand[i]) {
                    let mut variant = strand.clone();
                    variant[i] = b;
                    self.lookup.insert(variant, id);
                }
            }
        }

        Ok(())
    }

    pub fn barcode_len(&self) -> usize {
        self.barcode_len
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Find a barcode in `window`, trying start offsets `0..=slop`.
    ///
    /// At each offset the full-length substring is tried first, then the
    /// substring with its first two bases removed, then with its last two
    /// bases removed. Near the end of `window`, where fewer than the full
    /// length remains, the truncated length alone is tried so barcodes
    /// clipped by the read boundary still resolve. The first hit wins.
    pub fn query(&self, window: &[u8], slop: usize) -> Option<&str> {
        let len = self.barcode_len;
        if len == 0 {
            return None;
        }

        for offset in 0..=slop {
            let hit = if let Some(candidate) = window.get(offset..offset + len) {
                let candidate = candidate.to_ascii_uppercase();
                let found = [
                    &candidate[..],
                    &candidate[TRUNCATE..],
                    &candidate[..len - TRUNCATE],
                ]
                .into_iter()
                .find_map(|v| self.lookup.get(v))
                .copied();
                found
            } else if let Some(clipped) = window.get(offset..offset + len - TRUNCATE) {
                self.lookup.get(&clipped.to_ascii_uppercase()).copied()
            } else {
                break;
            };

            if let Some(id) = hit {
                return Some(&self.names[id]);
            }
        }

        None
    }
}
