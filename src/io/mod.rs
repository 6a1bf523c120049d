//! Sequence and table input/output.

mod fastx;
pub use fastx::*;

mod fasta;
pub use fasta::*;

mod table;
pub use table::*;

mod fastq;
pub use fastq::*;
