use std::collections::BTreeMap;
use std::fmt;

use colored::Colorize;

/// Why a record was left out. Rejections are counted, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rejection {
    NoBarcode,
    NoBegin,
    NoEndAnchor,
    NoMateAnchor,
    TooShort,
    NoAnchors,
    AnchorOrder,
    InsertLength,
    LowCount,
    Noise,
    NoTaxonomy,
    WrongStrand,
}

impl Rejection {
    pub fn description(&self) -> &'static str {
        use Rejection::*;
        match self {
            NoBarcode => "no inline barcode",
            NoBegin => "barcode without begin pattern",
            NoEndAnchor => "end anchor not found",
            NoMateAnchor => "mate anchor not found",
            TooShort => "insert too short",
            NoAnchors => "flanking anchors not found",
            AnchorOrder => "anchors out of order",
            InsertLength => "insert length out of range",
            LowCount => "below minimum count or length",
            Noise => "removed by denoiser",
            NoTaxonomy => "no taxonomy hit",
            WrongStrand => "taxonomy hit on wrong strand",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Tally of records considered, kept and rejected by one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub stage: &'static str,
    pub considered: usize,
    pub kept: usize,
    pub rejected: BTreeMap<Rejection, usize>,
}

impl DemuxStats {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            ..Default::default()
        }
    }

    pub fn keep(&mut self) {
        self.keep_n(1);
    }

    pub fn keep_n(&mut self, n: usize) {
        self.considered += n;
        self.kept += n;
    }

    pub fn reject(&mut self, rejection: Rejection) {
        self.reject_n(rejection, 1);
    }

    pub fn reject_n(&mut self, rejection: Rejection, n: usize) {
        self.considered += n;
        *self.rejected.entry(rejection).or_insert(0) += n;
    }

    /// Count one record by the outcome of processing it.
    pub fn record<T>(&mut self, outcome: &Result<T, Rejection>) {
        match outcome {
            Ok(_) => self.keep(),
            Err(r) => self.reject(*r),
        }
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn merge(&mut self, other: &DemuxStats) {
        self.considered += other.considered;
        self.kept += other.kept;
        for (&r, &n) in &other.rejected {
            *self.rejected.entry(r).or_insert(0) += n;
        }
    }
}

impl fmt::Display for DemuxStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = |n: usize| {
            if self.considered == 0 {
                0.0
            } else {
                100.0 * (n as f64) / (self.considered as f64)
            }
        };

        writeln!(f, "{}", self.stage.bold())?;
        writeln!(f, "  considered: {}", self.considered)?;
        writeln!(
            f,
            "  {} {} ({:.2}%)",
            "kept:".green(),
            self.kept,
            pct(self.kept)
        )?;

        for (r, &n) in &self.rejected {
            writeln!(f, "  {} {} ({:.2}%)", format!("{r}:").red(), n, pct(n))?;
        }

        Ok(())
    }
}
