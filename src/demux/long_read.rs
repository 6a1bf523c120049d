use std::borrow::Cow;

use crate::barcodes::BarcodeIndex;
use crate::demux::Rejection;
use crate::errors::*;
use crate::patterns::{revcomp, Pattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongReadHit {
    pub orientation: Orientation,
    pub insert: Vec<u8>,
    pub left_barcode: Option<String>,
    pub right_barcode: Option<String>,
}

/// Demultiplexes single long reads (e.g. CCS) carrying a barcode at each end.
///
/// ```text
/// [left barcode] [left anchor] [insert] [right anchor] [right barcode]
/// ```
///
/// The read may be in either orientation.
pub struct LongReadDemultiplexer {
    left: Pattern,
    right: Pattern,
    expected_len: usize,
    len_range: usize,
    barcodes: BarcodeIndex,
    slop: usize,
}

impl LongReadDemultiplexer {
    pub fn new(
        left: impl AsRef<[u8]>,
        right: impl AsRef<[u8]>,
        expected_len: usize,
        len_range: usize,
        barcodes: BarcodeIndex,
        slop: usize,
    ) -> Result<Self> {
        let (left, right) = (Pattern::new(left), Pattern::new(right));

        if left.is_empty() || right.is_empty() {
            return Err(Error::Config("long read anchors must not be empty".to_owned()));
        }

        Ok(Self {
            left,
            right,
            expected_len,
            len_range,
            barcodes,
            slop,
        })
    }

    /// Inclusive bounds on the insert length.
    pub fn insert_bounds(&self) -> (usize, usize) {
        (
            self.expected_len.saturating_sub(self.len_range),
            self.expected_len + self.len_range,
        )
    }

    pub fn barcodes(&self) -> &BarcodeIndex {
        &self.barcodes
    }

    fn anchors(&self, seq: &[u8]) -> Option<(usize, usize)> {
        Some((self.left.find(seq)?, self.right.find(seq)?))
    }

    pub fn demux(&self, seq: &[u8]) -> std::result::Result<LongReadHit, Rejection> {
        // orientation is decided once for the whole read
        let (seq, orientation, (left_start, right_start)) = match self.anchors(seq) {
            Some(a) => (Cow::Borrowed(seq), Orientation::Forward, a),
            None => {
                let rc = revcomp(seq).map_err(|_| Rejection::NoAnchors)?;
                let a = self.anchors(&rc).ok_or(Rejection::NoAnchors)?;
                (Cow::Owned(rc), Orientation::Reverse, a)
            }
        };

        let left_end = left_start + self.left.len();
        if right_start <= left_end {
            return Err(Rejection::AnchorOrder);
        }

        let insert = &seq[left_end..right_start];
        let (min, max) = self.insert_bounds();
        if insert.len() < min || insert.len() > max {
            return Err(Rejection::InsertLength);
        }

        let window = self.barcodes.barcode_len() + self.slop;
        let left_flank = &seq[left_start.saturating_sub(window)..left_start];
        let right_end = right_start + self.right.len();
        let right_flank = &seq[right_end..(right_end + window).min(seq.len())];

        Ok(LongReadHit {
            orientation,
            insert: insert.to_vec(),
            left_barcode: self.barcodes.query(left_flank, self.slop).map(str::to_owned),
            right_barcode: self.barcodes.query(right_flank, self.slop).map(str::to_owned),
        })
    }
}
