use std::fmt;
use std::path::Path;

use needletail::{parse_fastx_file, parse_fastx_reader, FastxReader};

use crate::errors::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    File(String),
    Bytes,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::File(file) => write!(f, "file \"{file}\""),
            Origin::Bytes => write!(f, "bytes"),
        }
    }
}

/// One owned FASTA or FASTQ record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqRecord {
    pub id: Vec<u8>,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

/// Streaming FASTA/FASTQ input, gzip detected automatically.
pub struct FastxInput<'reader> {
    reader: Box<dyn FastxReader + 'reader>,
    origin: Origin,
    idx: usize,
}

impl<'reader> FastxInput<'reader> {
    /// Stream records from an input file.
    pub fn from_file(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        let reader = parse_fastx_file(file).map_err(|e| Error::file_io(file, e))?;

        Ok(Self {
            reader,
            origin: Origin::File(file.display().to_string()),
            idx: 0,
        })
    }

    /// Stream records from an arbitrary `Read`er.
    pub fn from_reader(reader: impl std::io::Read + Send + 'reader) -> Result<Self> {
        let reader = parse_fastx_reader(reader).map_err(|e| Error::BytesIo(Box::new(e)))?;

        Ok(Self {
            reader,
            origin: Origin::Bytes,
            idx: 0,
        })
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Index of the next record to be read.
    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn next_record(&mut self) -> Result<Option<SeqRecord>> {
        let Some(record) = self.reader.next() else {
            return Ok(None);
        };
        let record = record.map_err(|e| Error::ParseRecord {
            origin: self.origin.to_string(),
            idx: self.idx,
            source: Box::new(e),
        })?;
        self.idx += 1;

        Ok(Some(SeqRecord {
            id: record.id().to_owned(),
            seq: record.seq().into_owned(),
            qual: record.qual().map(|q| q.to_owned()),
        }))
    }
}

impl<'reader> Iterator for FastxInput<'reader> {
    type Item = Result<SeqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Two inputs read in lock-step, e.g. R1 and R2 of a paired-end run.
pub struct PairedInput<'reader> {
    r1: FastxInput<'reader>,
    r2: FastxInput<'reader>,
}

impl<'reader> PairedInput<'reader> {
    pub fn new(r1: FastxInput<'reader>, r2: FastxInput<'reader>) -> Self {
        Self { r1, r2 }
    }

    pub fn from_files(file1: impl AsRef<Path>, file2: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(
            FastxInput::from_file(file1)?,
            FastxInput::from_file(file2)?,
        ))
    }

    pub fn next_pair(&mut self) -> Result<Option<(SeqRecord, SeqRecord)>> {
        match (self.r1.next_record()?, self.r2.next_record()?) {
            (Some(a), Some(b)) => Ok(Some((a, b))),
            (None, None) => Ok(None),
            // the input that still has records is the one missing a mate
            (Some(_), None) => Err(Error::UnpairedRead {
                origin: self.r1.origin().to_string(),
                idx: self.r1.idx() - 1,
            }),
            (None, Some(_)) => Err(Error::UnpairedRead {
                origin: self.r2.origin().to_string(),
                idx: self.r2.idx() - 1,
            }),
        }
    }
}

impl<'reader> Iterator for PairedInput<'reader> {
    type Item = Result<(SeqRecord, SeqRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_pair().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R1: &[u8] = b"@r1\nACGT\n+\nIIII\n@r2\nGGCC\n+\nIIII\n";
    const R2: &[u8] = b"@r1\nTTTT\n+\nIIII\n";

    #[test]
    fn reads_fastq_records() {
        let records = FastxInput::from_reader(R1)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, b"r2");
        assert_eq!(records[1].seq, b"GGCC");
        assert_eq!(records[1].qual.as_deref(), Some(&b"IIII"[..]));
    }

    #[test]
    fn reads_multiline_fasta() {
        let records = FastxInput::from_reader(&b">a x\nAC\nGT\n>b\nTT\n"[..])
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(records[0].seq, b"ACGT");
        assert_eq!(records[0].qual, None);
        assert_eq!(records[1].seq, b"TT");
    }

    #[test]
    fn paired_inputs_must_have_equal_length() {
        let mut paired = PairedInput::new(
            FastxInput::from_reader(R1).unwrap(),
            FastxInput::from_reader(R2).unwrap(),
        );
        assert!(paired.next().unwrap().is_ok());
        assert!(matches!(
            paired.next().unwrap(),
            Err(Error::UnpairedRead { idx: 1, .. })
        ));
    }
}
