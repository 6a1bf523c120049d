use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::Path;

use log::{debug, info};
use rustc_hash::FxHashMap;

use crate::demux::Rejection;
use crate::errors::*;
use crate::io::Table;
use crate::parse_utils::{in_ranges, numeric_suffix};
use crate::patterns::Pattern;

pub const PRIMER_COLUMN: &str = "primer_name";
pub const OFFSET_COLUMN: &str = "Ns";
pub const BARCODE_COLUMN: &str = "inline_index";
pub const BEGIN_COLUMN: &str = "begin";

/// One row of the barcode table.
#[derive(Debug, Clone)]
pub struct PrimerDescriptor {
    pub primer: String,
    /// Number of bases in the read before the barcode starts.
    pub offset: usize,
    pub barcode: Vec<u8>,
    /// Sequence right after the barcode, may contain ambiguity codes.
    pub begin: Pattern,
}

impl PrimerDescriptor {
    pub fn new(
        primer: impl Into<String>,
        offset: usize,
        barcode: impl AsRef<[u8]>,
        begin: impl AsRef<[u8]>,
    ) -> Self {
        Self {
            primer: primer.into(),
            offset,
            barcode: barcode.as_ref().to_ascii_uppercase(),
            begin: Pattern::new(begin),
        }
    }

    /// Position in the read where the payload after the begin pattern starts.
    pub fn payload_start(&self) -> usize {
        self.offset + self.barcode.len() + self.begin.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Index into [`InlineClassifier::descriptors`].
    pub primer: usize,
    pub start: usize,
}

/// Assigns reads to primers by an exact inline barcode at a fixed offset
/// followed by the primer's begin pattern.
pub struct InlineClassifier {
    descriptors: Vec<PrimerDescriptor>,
    barcode_len: usize,
    // ascending offsets give a fixed trial order
    by_offset: BTreeMap<usize, FxHashMap<Vec<u8>, usize>>,
}

impl InlineClassifier {
    pub fn new(descriptors: Vec<PrimerDescriptor>) -> Result<Self> {
        let barcode_len = descriptors.first().map(|d| d.barcode.len()).unwrap_or(0);
        let mut by_offset = BTreeMap::<usize, FxHashMap<Vec<u8>, usize>>::new();
        let mut primers = FxHashMap::default();

        for (i, d) in descriptors.iter().enumerate() {
            numeric_suffix(&d.primer)?;

            if primers.insert(d.primer.as_str(), i).is_some() {
                return Err(Error::DuplicatePrimer(d.primer.clone()));
            }
            if d.barcode.len() != barcode_len {
                return Err(Error::BarcodeLength {
                    primer: d.primer.clone(),
                    len: d.barcode.len(),
                    expected: barcode_len,
                });
            }

            let barcodes = by_offset.entry(d.offset).or_default();
            if let Some(&prev) = barcodes.get(&d.barcode) {
                return Err(Error::DuplicateBarcode {
                    barcode: utf8(&d.barcode),
                    offset: d.offset,
                    first: descriptors[prev].primer.clone(),
                    second: d.primer.clone(),
                });
            }
            barcodes.insert(d.barcode.clone(), i);
        }

        debug!(
            "Barcode table: {} primers at offsets {:?}",
            descriptors.len(),
            by_offset.keys().collect::<Vec<_>>()
        );

        Ok(Self {
            descriptors,
            barcode_len,
            by_offset,
        })
    }

    /// Build from a barcode table, optionally keeping only the primers whose
    /// numeric suffix falls in `selected`.
    pub fn from_table(table: &Table, selected: Option<&[RangeInclusive<usize>]>) -> Result<Self> {
        let mut descriptors = Vec::with_capacity(table.len());

        for i in 0..table.len() {
            let primer = table.get(i, PRIMER_COLUMN).trim();
            let suffix = numeric_suffix(primer)?;

            if let Some(ranges) = selected {
                if !in_ranges(ranges, suffix) {
                    continue;
                }
            }

            descriptors.push(PrimerDescriptor::new(
                primer,
                table.parse(i, OFFSET_COLUMN)?,
                table.get(i, BARCODE_COLUMN).trim(),
                table.get(i, BEGIN_COLUMN).trim(),
            ));
        }

        if descriptors.is_empty() {
            return Err(Error::Config(format!(
                "no primers selected from barcode table \"{}\"",
                table.file().display()
            )));
        }

        Self::new(descriptors)
    }

    pub fn from_path(
        file: impl AsRef<Path>,
        selected: Option<&[RangeInclusive<usize>]>,
    ) -> Result<Self> {
        let table = Table::from_path(
            file,
            &[PRIMER_COLUMN, OFFSET_COLUMN, BARCODE_COLUMN, BEGIN_COLUMN],
        )?;
        let classifier = Self::from_table(&table, selected)?;
        info!(
            "Loaded {} primers from \"{}\"",
            classifier.descriptors.len(),
            table.file().display()
        );
        Ok(classifier)
    }

    pub fn descriptors(&self) -> &[PrimerDescriptor] {
        &self.descriptors
    }

    pub fn barcode_len(&self) -> usize {
        self.barcode_len
    }

    /// Classify a read.
    ///
    /// Offsets are tried in ascending order and the first offset whose barcode
    /// and begin pattern both match wins, even if a later offset would also
    /// match.
    pub fn classify(&self, seq: &[u8]) -> std::result::Result<Classification, Rejection> {
        let mut rejection = Rejection::NoBarcode;

        for (&offset, barcodes) in &self.by_offset {
            let Some(barcode) = seq.get(offset..offset + self.barcode_len) else {
                continue;
            };
            let Some(&i) = barcodes.get(barcode) else {
                continue;
            };

            let d = &self.descriptors[i];
            let begin_start = offset + self.barcode_len;

            match seq.get(begin_start..begin_start + d.begin.len()) {
                Some(begin) if d.begin.matches(begin) => {
                    return Ok(Classification {
                        primer: i,
                        start: d.payload_start(),
                    })
                }
                _ => rejection = Rejection::NoBegin,
            }
        }

        Err(rejection)
    }
}
