//! Run configuration, read from YAML.
//!
//! ```yaml
//! mode: paired
//! barcodes: barcodes.tsv
//! primers: 1-3,7
//! end_anchor: TCCACTAATCAYAARGATATTGG
//! end_min_extra: 1
//! end_max_extra: 4
//! min_count: 8
//! esv_prefix: Zotu
//! seed_fasta: previous_run/esv.fa
//! denoiser:
//!   program: usearch
//!   min_size: 8
//! taxonomy:
//!   program: usearch
//!   database: rdp_16s.fa
//! ```
//!
//! Every field is optional; missing fields take the defaults of [`RunConfig::default`].

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::barcodes::BarcodeIndex;
use crate::demux::{InlineClassifier, InsertExtractor, LongReadDemultiplexer};
use crate::errors::*;
use crate::esv::{EsvRegistry, Naming, DEFAULT_ID_COLUMN};
use crate::external::{Denoiser, KeepAll, SintaxCommand, UnoiseCommand};
use crate::io::read_fasta_records;
use crate::parse_utils::parse_ranges;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Paired-end short reads with an inline barcode at the start of R1.
    #[default]
    Paired,
    /// Single reads, e.g. mates already merged by an external assembler.
    Merged,
    /// Long single reads with a barcode at each end.
    Long,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DenoiserConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_min_size")]
    pub min_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaxonomyConfig {
    pub program: String,
    pub database: PathBuf,
    #[serde(default = "default_strand")]
    pub strand: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_min_size() -> u64 {
    8
}

fn default_strand() -> String {
    "+".to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub mode: Mode,

    // inline barcodes
    pub barcodes: Option<PathBuf>,
    pub primers: Option<String>,
    pub end_anchor: Option<String>,
    pub end_min_extra: usize,
    pub end_max_extra: usize,
    pub require_mate_anchor: bool,
    pub min_insert_len: usize,

    // long reads
    pub left_anchor: Option<String>,
    pub right_anchor: Option<String>,
    pub barcode_fasta: Option<PathBuf>,
    pub expected_len: usize,
    pub len_range: usize,
    pub barcode_slop: usize,

    // aggregation
    pub min_count: u64,
    pub min_len: usize,
    pub esv_prefix: Option<String>,
    pub id_column: String,
    pub seed_fasta: Option<PathBuf>,
    pub denoiser: Option<DenoiserConfig>,
    pub taxonomy: Option<TaxonomyConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Paired,
            barcodes: None,
            primers: None,
            end_anchor: None,
            end_min_extra: 0,
            end_max_extra: 4,
            require_mate_anchor: false,
            min_insert_len: 0,
            left_anchor: None,
            right_anchor: None,
            barcode_fasta: None,
            expected_len: 0,
            len_range: 0,
            barcode_slop: 2,
            min_count: 1,
            min_len: 0,
            esv_prefix: None,
            id_column: DEFAULT_ID_COLUMN.to_owned(),
            seed_fasta: None,
            denoiser: None,
            taxonomy: None,
        }
    }
}

fn required<'a, T: ?Sized>(value: Option<&'a T>, field: &str, mode: Mode) -> Result<&'a T> {
    value.ok_or_else(|| Error::Config(format!("\"{field}\" is required in {mode:?} mode")))
}

impl RunConfig {
    pub fn from_path(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        let reader = std::fs::File::open(file).map_err(|e| Error::file_io(file, e))?;
        let config: Self = serde_yaml::from_reader(reader)
            .map_err(|e| Error::Config(format!("{}: {e}", file.display())))?;
        config.validate()?;
        info!("Loaded run configuration from \"{}\"", file.display());
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.mode {
            Mode::Paired | Mode::Merged => {
                required(self.barcodes.as_deref(), "barcodes", self.mode)?;
                required(self.end_anchor.as_deref(), "end_anchor", self.mode)?;
                if self.end_min_extra > self.end_max_extra {
                    return Err(Error::Config(format!(
                        "end_min_extra ({}) is greater than end_max_extra ({})",
                        self.end_min_extra, self.end_max_extra
                    )));
                }
            }
            Mode::Long => {
                required(self.left_anchor.as_deref(), "left_anchor", self.mode)?;
                required(self.right_anchor.as_deref(), "right_anchor", self.mode)?;
                required(self.barcode_fasta.as_deref(), "barcode_fasta", self.mode)?;
                if self.expected_len == 0 {
                    return Err(Error::Config("expected_len must be positive".to_owned()));
                }
            }
        }

        self.primer_ranges()?;

        if let Some(prefix) = &self.esv_prefix {
            if prefix.is_empty() || prefix.ends_with(|c: char| c.is_ascii_digit()) {
                return Err(Error::Config(format!(
                    "esv_prefix \"{prefix}\" must be non-empty and must not end in a digit"
                )));
            }
        }
        if self.id_column.trim().is_empty() {
            return Err(Error::Config("id_column must not be empty".to_owned()));
        }
        if let Some(t) = &self.taxonomy {
            if t.strand != "+" && t.strand != "-" {
                return Err(Error::Config(format!(
                    "taxonomy strand must be \"+\" or \"-\", not \"{}\"",
                    t.strand
                )));
            }
        }

        Ok(())
    }

    pub fn primer_ranges(&self) -> Result<Option<Vec<RangeInclusive<usize>>>> {
        self.primers.as_deref().map(parse_ranges).transpose()
    }

    pub fn naming(&self) -> Naming {
        match &self.esv_prefix {
            Some(p) => Naming::Prefix(p.clone()),
            None => Naming::ContentHash,
        }
    }

    pub fn inline_classifier(&self) -> Result<InlineClassifier> {
        let barcodes = required(self.barcodes.as_deref(), "barcodes", self.mode)?;
        let ranges = self.primer_ranges()?;
        InlineClassifier::from_path(barcodes, ranges.as_deref())
    }

    pub fn insert_extractor(&self) -> Result<InsertExtractor> {
        let anchor = required(self.end_anchor.as_deref(), "end_anchor", self.mode)?;
        Ok(
            InsertExtractor::new(anchor.as_bytes(), self.end_min_extra, self.end_max_extra)?
                .with_min_len(self.min_insert_len)
                .with_required_mate_anchor(self.require_mate_anchor),
        )
    }

    pub fn long_read_demultiplexer(&self) -> Result<LongReadDemultiplexer> {
        let left = required(self.left_anchor.as_deref(), "left_anchor", self.mode)?;
        let right = required(self.right_anchor.as_deref(), "right_anchor", self.mode)?;
        let fasta = required(self.barcode_fasta.as_deref(), "barcode_fasta", self.mode)?;

        let barcodes = BarcodeIndex::new(read_fasta_records(fasta)?)?;
        info!(
            "Loaded {} long read barcodes from \"{}\"",
            barcodes.names().len(),
            fasta.display()
        );

        LongReadDemultiplexer::new(
            left.as_bytes(),
            right.as_bytes(),
            self.expected_len,
            self.len_range,
            barcodes,
            self.barcode_slop,
        )
    }

    /// Fresh registry, seeded from `seed_fasta` if one is configured.
    pub fn registry(&self) -> Result<EsvRegistry> {
        let mut registry = EsvRegistry::new(self.naming());
        if let Some(seed) = &self.seed_fasta {
            registry.seed_from_fasta(seed)?;
        }
        Ok(registry)
    }

    pub fn denoiser(&self) -> Result<Box<dyn Denoiser>> {
        match &self.denoiser {
            Some(d) => Ok(Box::new(UnoiseCommand::new(
                d.program.clone(),
                d.args.clone(),
                d.min_size,
            )?)),
            None => Ok(Box::new(KeepAll)),
        }
    }

    pub fn taxonomy_classifier(&self) -> Result<Option<SintaxCommand>> {
        self.taxonomy
            .as_ref()
            .map(|t| SintaxCommand::new(t.program.clone(), &t.database, t.args.clone()))
            .transpose()
    }

    pub fn taxonomy_strand(&self) -> &str {
        self.taxonomy.as_ref().map_or("+", |t| t.strand.as_str())
    }
}
