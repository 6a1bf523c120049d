use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::errors::*;
use crate::io::create_writer;

/// A tab-delimited table with a header row.
///
/// Columns beyond the ones a caller requires are kept, so a table can be read,
/// extended and written back without losing anything.
#[derive(Debug, Clone)]
pub struct Table {
    file: PathBuf,
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl Table {
    pub fn new(headers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            file: PathBuf::new(),
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Read a table and check that every `required` column is present.
    pub fn from_path(file: impl AsRef<Path>, required: &[&str]) -> Result<Self> {
        let file = file.as_ref();
        let reader = std::fs::File::open(file).map_err(|e| Error::file_io(file, e))?;
        Self::from_reader(reader, file, required)
    }

    pub fn from_reader(
        reader: impl std::io::Read,
        file: impl AsRef<Path>,
        required: &[&str],
    ) -> Result<Self> {
        let file = file.as_ref().to_owned();
        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| Error::file_io(&file, e))?
            .iter()
            .map(|h| h.trim().to_owned())
            .collect::<Vec<_>>();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(Error::EmptyHeader { file });
        }

        for &column in required {
            if !headers.iter().any(|h| h == column) {
                return Err(Error::MissingColumn {
                    file,
                    column: column.to_owned(),
                });
            }
        }

        let mut rows = Vec::new();

        for (i, row) in rdr.records().enumerate() {
            let row = row.map_err(|e| Error::file_io(&file, e))?;

            if row.len() != headers.len() {
                return Err(Error::ColumnCount {
                    file,
                    // header is line 1
                    line: i + 2,
                    expected: headers.len(),
                    found: row.len(),
                });
            }

            rows.push(row);
        }

        Ok(Self {
            file,
            headers,
            rows,
        })
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Value of `column` in `row`, or an empty string if the column does not exist.
    pub fn get(&self, row: usize, column: &str) -> &str {
        self.column(column)
            .and_then(|c| self.rows.get(row)?.get(c))
            .unwrap_or("")
    }

    /// Parse a field, reporting the table line on failure.
    pub fn parse<T: std::str::FromStr>(&self, row: usize, column: &'static str) -> Result<T> {
        let value = self.get(row, column);
        value.trim().parse().map_err(|_| Error::ParseField {
            file: self.file.clone(),
            line: row + 2,
            column,
            value: value.to_owned(),
        })
    }

    pub fn push_row(&mut self, row: impl IntoIterator<Item = impl AsRef<str>>) -> Result<()> {
        let row = row.into_iter().collect::<StringRecord>();

        if row.len() != self.headers.len() {
            return Err(Error::ColumnCount {
                file: self.file.clone(),
                line: self.rows.len() + 2,
                expected: self.headers.len(),
                found: row.len(),
            });
        }

        self.rows.push(row);
        Ok(())
    }

    /// Append a column, computing each row's value from the existing row.
    pub fn push_column(&mut self, name: impl Into<String>, mut f: impl FnMut(&StringRecord) -> String) {
        self.headers.push(name.into());
        for row in self.rows.iter_mut() {
            let value = f(row);
            row.push_field(&value);
        }
    }

    pub fn write_path(&self, file: impl AsRef<Path>) -> Result<()> {
        let file = file.as_ref();
        let mut writer = create_writer(file)?;
        self.write(&mut writer)
            .map_err(|e| Error::file_io(file, e))?;
        writer.finish().map_err(|e| Error::file_io(file, e))
    }

    pub fn write(&self, writer: impl std::io::Write) -> std::result::Result<(), csv::Error> {
        let mut wtr = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(writer);

        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
