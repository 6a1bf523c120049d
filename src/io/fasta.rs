use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::{write::GzEncoder, Compression};

use crate::errors::*;
use crate::io::FastxInput;
use crate::parse_utils::fasta_name;

/// A buffered output file, gzip-compressed if its path ends in `.gz`.
pub enum OutputWriter {
    Plain(BufWriter<File>),
    Gzip(BufWriter<GzEncoder<File>>),
}

impl OutputWriter {
    /// Flush the buffer and, for gzip output, write the stream trailer.
    pub fn finish(self) -> std::io::Result<()> {
        match self {
            OutputWriter::Plain(mut w) => w.flush(),
            OutputWriter::Gzip(w) => {
                let encoder = w.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?.flush()
            }
        }
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            OutputWriter::Plain(w) => w.write(buf),
            OutputWriter::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            OutputWriter::Plain(w) => w.flush(),
            OutputWriter::Gzip(w) => w.flush(),
        }
    }
}

/// Open an [`OutputWriter`], creating missing parent directories.
pub fn create_writer(file: impl AsRef<Path>) -> Result<OutputWriter> {
    let file = file.as_ref();

    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| Error::file_io(file, e))?;
        }
    }

    let f = File::create(file).map_err(|e| Error::file_io(file, e))?;

    if file.extension().is_some_and(|e| e == "gz") {
        Ok(OutputWriter::Gzip(BufWriter::new(GzEncoder::new(
            f,
            Compression::default(),
        ))))
    } else {
        Ok(OutputWriter::Plain(BufWriter::new(f)))
    }
}

/// Hidden sibling of `path` that output is written to before being renamed
/// into place. The extension is kept.
pub fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".partial.{name}"))
}

pub struct FastaWriter {
    file: PathBuf,
    writer: OutputWriter,
}

impl FastaWriter {
    pub fn to_file(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        Ok(Self {
            file: file.to_owned(),
            writer: create_writer(file)?,
        })
    }

    pub fn write_record(&mut self, name: &[u8], seq: &[u8]) -> Result<()> {
        write_fasta_record(&mut self.writer, name, seq).map_err(|e| Error::file_io(&self.file, e))
    }

    pub fn finish(self) -> Result<()> {
        self.writer
            .finish()
            .map_err(|e| Error::file_io(&self.file, e))
    }
}

pub fn write_fasta_record(
    writer: &mut impl Write,
    name: &[u8],
    seq: &[u8],
) -> std::io::Result<()> {
    writer.write_all(b">")?;
    writer.write_all(name)?;
    writer.write_all(b"\n")?;
    writer.write_all(seq)?;
    writer.write_all(b"\n")
}

/// Read `(name, sequence)` pairs from a FASTA file.
///
/// Names stop at the first whitespace; the rest of the header is a comment.
pub fn read_fasta_records(file: impl AsRef<Path>) -> Result<Vec<(String, Vec<u8>)>> {
    FastxInput::from_file(file)?
        .map(|r| r.map(|r| (utf8(fasta_name(&r.id)), r.seq)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn writes_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/esv.fa.gz");

        let mut writer = FastaWriter::to_file(&path).unwrap();
        writer.write_record(b"Zotu1", b"ACGT").unwrap();
        writer.write_record(b"Zotu2", b"GGCC").unwrap();
        writer.finish().unwrap();

        let records = read_fasta_records(&path).unwrap();
        assert_eq!(
            records,
            vec![
                ("Zotu1".to_owned(), b"ACGT".to_vec()),
                ("Zotu2".to_owned(), b"GGCC".to_vec())
            ]
        );
    }

    #[test]
    fn gzip_output_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("esv.fa.gz");

        let mut writer = FastaWriter::to_file(&path).unwrap();
        writer.write_record(b"Zotu1", b"ACGT").unwrap();
        writer.finish().unwrap();

        let mut decoded = String::new();
        flate2::read::GzDecoder::new(std::fs::File::open(&path).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, ">Zotu1\nACGT\n");
    }

    #[test]
    fn partial_outputs_keep_their_extension() {
        let p = partial_path(Path::new("out/esv.fa.gz"));
        assert_eq!(p, Path::new("out/.partial.esv.fa.gz"));
    }

    #[test]
    fn header_comments_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.fa");
        std::fs::write(&path, ">Zotu7 size=3;\nAC\nGT\n").unwrap();

        let records = read_fasta_records(&path).unwrap();
        assert_eq!(records, vec![("Zotu7".to_owned(), b"ACGT".to_vec())]);
    }
}
