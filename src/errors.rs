//! Errors raised while demultiplexing and aggregating reads.
//!
//! Records that simply fail to classify are not errors; they are counted as
//! [`Rejection`](crate::demux::Rejection)s. Everything in here aborts the run.

use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    // configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid range specifier \"{string}\": {reason}")]
    Range { string: String, reason: &'static str },
    #[error("Primer name \"{0}\" does not end in a numeric suffix")]
    PrimerSuffix(String),
    #[error("Primer \"{0}\" appears more than once in the barcode table")]
    DuplicatePrimer(String),
    #[error("Barcode {barcode} at offset {offset} is used by both \"{first}\" and \"{second}\"")]
    DuplicateBarcode {
        barcode: String,
        offset: usize,
        first: String,
        second: String,
    },
    #[error("Barcode for \"{primer}\" has length {len}, expected {expected}")]
    BarcodeLength {
        primer: String,
        len: usize,
        expected: usize,
    },

    // input format
    #[error("Error reading or writing file \"{file}\": {source}")]
    FileIo { file: PathBuf, source: BoxError },
    #[error("Error reading or writing bytes: {0}")]
    BytesIo(BoxError),
    #[error("Error parsing record {idx} in {origin}: {source}")]
    ParseRecord {
        origin: String,
        idx: usize,
        source: BoxError,
    },
    #[error("Paired input ended early: no mate for record {idx} in {origin}")]
    UnpairedRead { origin: String, idx: usize },
    #[error("Table \"{file}\" has an empty header")]
    EmptyHeader { file: PathBuf },
    #[error("Table \"{file}\" is missing required column \"{column}\"")]
    MissingColumn { file: PathBuf, column: String },
    #[error("Table \"{file}\" line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        file: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Table \"{file}\" line {line}: could not parse {column} \"{value}\"")]
    ParseField {
        file: PathBuf,
        line: usize,
        column: &'static str,
        value: String,
    },
    #[error("Invalid character '{character}' in sequence \"{string}\"")]
    InvalidSequence { string: String, character: char },

    // internal consistency
    #[error("Name \"{name}\" is already bound to a different sequence")]
    NameCollision { name: String },
    #[error("Seed registry binds \"{name}\" to two different sequences")]
    DuplicateSeedName { name: String },
    #[error("Count for primer \"{primer}\", sample {sample}, ESV \"{esv}\" was written twice")]
    DuplicateCount {
        primer: String,
        sample: usize,
        esv: String,
    },
    #[error("External tool returned unknown sequence identity \"{0}\"")]
    UnknownSyntheticId(String),

    // external tools
    #[error("Could not start \"{program}\": {source}")]
    ToolSpawn {
        program: String,
        source: std::io::Error,
    },
    #[error("\"{program}\" exited with {status}")]
    ToolFailed { program: String, status: String },
}

impl Error {
    pub(crate) fn file_io(file: impl AsRef<Path>, source: impl Into<BoxError>) -> Self {
        Error::FileIo {
            file: file.as_ref().to_owned(),
            source: source.into(),
        }
    }
}

pub fn utf8(b: &[u8]) -> String {
    std::str::from_utf8(b).unwrap_or("[non-UTF8 bytes]").to_owned()
}
