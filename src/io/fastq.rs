use std::collections::hash_map::Entry::*;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::warn;
use rustc_hash::FxHashMap;

use crate::errors::*;
use crate::io::{create_writer, partial_path, OutputWriter};

pub fn write_fastq_record(
    writer: &mut impl Write,
    record: (&[u8], &[u8], &[u8]),
) -> std::io::Result<()> {
    writer.write_all(b"@")?;
    writer.write_all(record.0)?;
    writer.write_all(b"\n")?;
    writer.write_all(record.1)?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(record.2)?;
    writer.write_all(b"\n")
}

/// Paired FASTQ output split into one `<key>_R1`/`<key>_R2` file pair per key.
///
/// Files are created under a hidden partial name the first time a key is
/// written, and only moved to their final names by [`finish`](Self::finish).
/// Dropping the writer without finishing removes everything it created.
pub struct SplitFastqWriter {
    dir: PathBuf,
    extension: &'static str,
    writers: FxHashMap<String, [OutputWriter; 2]>,
    // (partial, final), in creation order
    paths: Vec<(PathBuf, PathBuf)>,
}

impl SplitFastqWriter {
    pub fn new(dir: impl AsRef<Path>, gzip: bool) -> Self {
        Self {
            dir: dir.as_ref().to_owned(),
            extension: if gzip { "fastq.gz" } else { "fastq" },
            writers: FxHashMap::default(),
            paths: Vec::new(),
        }
    }

    fn get_writers(&mut self, key: &str) -> Result<&mut [OutputWriter; 2]> {
        match self.writers.entry(key.to_owned()) {
            Occupied(e) => Ok(e.into_mut()),
            Vacant(e) => {
                let r1 = self.dir.join(format!("{key}_R1.{}", self.extension));
                let r2 = self.dir.join(format!("{key}_R2.{}", self.extension));
                let (tmp1, tmp2) = (partial_path(&r1), partial_path(&r2));

                let w1 = create_writer(&tmp1)?;
                self.paths.push((tmp1, r1));
                let w2 = create_writer(&tmp2)?;
                self.paths.push((tmp2, r2));
                Ok(e.insert([w1, w2]))
            }
        }
    }

    /// Write one `(id, seq, qual)` record to each mate file of `key`.
    pub fn write_pair(
        &mut self,
        key: &str,
        r1: (&[u8], &[u8], &[u8]),
        r2: (&[u8], &[u8], &[u8]),
    ) -> Result<()> {
        let [w1, w2] = self.get_writers(key)?;
        write_fastq_record(w1, r1).map_err(|e| Error::BytesIo(Box::new(e)))?;
        write_fastq_record(w2, r2).map_err(|e| Error::BytesIo(Box::new(e)))
    }

    /// Finish every file, move it to its final name and return the final
    /// paths in creation order.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        for (_, writers) in std::mem::take(&mut self.writers) {
            for w in writers {
                w.finish().map_err(|e| Error::BytesIo(Box::new(e)))?;
            }
        }

        let mut done = Vec::with_capacity(self.paths.len());
        while let Some((tmp, path)) = self.paths.first().cloned() {
            std::fs::rename(&tmp, &path).map_err(|e| Error::file_io(&path, e))?;
            self.paths.remove(0);
            done.push(path);
        }
        Ok(done)
    }
}

impl Drop for SplitFastqWriter {
    fn drop(&mut self) {
        self.writers.clear();
        for (tmp, _) in &self.paths {
            if tmp.exists() {
                if let Err(e) = std::fs::remove_file(tmp) {
                    warn!("Could not remove \"{}\": {e}", tmp.display());
                }
            }
        }
    }
}
