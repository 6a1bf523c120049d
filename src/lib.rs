//! Demultiplexing of amplicon reads with inline barcodes, and aggregation of
//! their inserts into named exact sequence variants.
//!
//! # Overview
//! Reads carry a short sample barcode inside the read itself, followed by a
//! primer. ampliplex assigns each read to a primer, cuts out the insert between
//! the primer and an anchor near the end of the read, and counts the distinct
//! inserts. Counts from many samples are then filtered, denoised by an external
//! tool, and given stable names.
//!
//! ## Reads
//! Here's a merged read as it arrives, with its parts marked:
//! ```text
//! NN ACGTACGTACGTACGT ACAT GATTACA GGCC AA
//! |  |                |    |       |    extra bases past the anchor
//! |  |                |    |       end anchor
//! |  |                |    insert
//! |  |                begin pattern, may use IUPAC codes
//! |  inline barcode
//! offset
//! ```
//!
//! The barcode table (`primer_name`, `Ns`, `inline_index`, `begin`) lists every
//! barcode, its offset, and the begin pattern that must follow it. An
//! [`InlineClassifier`](demux::InlineClassifier) matches barcodes exactly and
//! an [`InsertExtractor`](demux::InsertExtractor) finds the end anchor.
//!
//! Long reads carry a barcode at both ends and may come in either orientation.
//! The [`LongReadDemultiplexer`](demux::LongReadDemultiplexer) finds the two
//! flanking anchors and recovers each barcode through a
//! [`BarcodeIndex`](barcodes::BarcodeIndex), which tolerates one substitution
//! or a two-base truncation.
//!
//! ## Aggregation
//! Per-sample observation tables are aggregated in order through an
//! [`AggregationContext`](pipeline::AggregationContext). Each primer of each
//! sample is denoised on its own, and only the kept sequences are named by the
//! [`EsvRegistry`](esv::EsvRegistry) and counted. Names are either a hash of
//! the sequence or a prefix plus a number, continued from a previous run's FASTA
//! when one is given.
//!
//! Records that fail to classify are never errors. They are counted by reason
//! in [`DemuxStats`](demux::DemuxStats) and reported in the run summary.

pub mod barcodes;
pub mod config;
pub mod demux;
pub mod errors;
pub mod esv;
pub mod external;
pub mod io;
pub mod parse_utils;
pub mod patterns;
pub mod pipeline;

// commonly used functions and types

pub use crate::errors::{Error, Result};
pub use crate::patterns::*;
