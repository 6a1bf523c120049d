use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use tempfile::TempDir;

use crate::demux::{DemuxStats, Rejection};
use crate::errors::*;
use crate::io::{FastaWriter, Table};

/// Taxonomy keys and the rank columns they fill, from the root down.
pub const RANKS: [(&str, &str); 8] = [
    ("d", "domain"),
    ("k", "kingdom"),
    ("p", "phylum"),
    ("c", "class"),
    ("o", "order"),
    ("f", "family"),
    ("g", "genus"),
    ("s", "species"),
];

pub const CONFIDENT_RANK_COLUMN: &str = "confident_rank";

/// Taxon names by rank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineage {
    ranks: [Option<String>; 8],
}

impl Lineage {
    /// Parse comma-separated `key:value` pairs. Values may be quoted and may
    /// carry a trailing `(confidence)`, which is dropped. Unknown keys are
    /// ignored.
    pub fn parse(s: &str) -> Self {
        let mut lineage = Self::default();

        for pair in s.split(',') {
            let Some((key, value)) = pair.trim().split_once(':') else {
                continue;
            };
            let Some(i) = RANKS.iter().position(|&(k, _)| k == key.trim()) else {
                continue;
            };

            let mut value = value.trim();
            if value.ends_with(')') {
                if let Some(open) = value.rfind('(') {
                    value = &value[..open];
                }
            }
            let value = value.trim().trim_matches('"');

            if !value.is_empty() {
                lineage.ranks[i] = Some(value.to_owned());
            }
        }

        lineage
    }

    pub fn get(&self, rank: &str) -> Option<&str> {
        let i = RANKS.iter().position(|&(_, r)| r == rank)?;
        self.ranks[i].as_deref()
    }

    /// Name of the lowest rank that is filled in.
    pub fn deepest(&self) -> Option<&'static str> {
        self.ranks
            .iter()
            .zip(RANKS)
            .filter(|(v, _)| v.is_some())
            .map(|(_, (_, rank))| rank)
            .last()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyHit {
    pub id: String,
    pub lineage: Lineage,
    pub confident: Lineage,
}

/// Parse one `id, taxonomy, strand, confident taxonomy` result line.
pub fn parse_taxonomy_line(
    line: &str,
    strand: &str,
) -> std::result::Result<TaxonomyHit, Rejection> {
    let mut fields = line.trim_end_matches(['\r', '\n']).split('\t');
    let id = fields.next().unwrap_or("").trim();
    let full = fields.next().unwrap_or("").trim();
    let hit_strand = fields.next().unwrap_or("").trim();
    let confident = fields.next().unwrap_or("").trim();

    let lineage = Lineage::parse(full);
    if id.is_empty() || lineage.is_empty() {
        return Err(Rejection::NoTaxonomy);
    }
    if hit_strand != strand {
        return Err(Rejection::WrongStrand);
    }

    Ok(TaxonomyHit {
        id: id.to_owned(),
        lineage,
        confident: Lineage::parse(confident),
    })
}

/// Assigns taxonomy to named sequences.
pub trait Classifier {
    /// Raw tab-delimited result lines, one per classified sequence.
    fn classify(&self, sequences: &[(&str, &[u8])]) -> Result<Vec<String>>;
}

/// Runs a SINTAX-style external classifier against a reference database.
pub struct SintaxCommand {
    program: String,
    database: PathBuf,
    args: Vec<String>,
    workdir: TempDir,
}

impl SintaxCommand {
    pub fn new(
        program: impl Into<String>,
        database: impl AsRef<Path>,
        args: Vec<String>,
    ) -> Result<Self> {
        let workdir = tempfile::Builder::new()
            .prefix("ampliplex-taxonomy")
            .tempdir()
            .map_err(|e| Error::BytesIo(Box::new(e)))?;

        Ok(Self {
            program: program.into(),
            database: database.as_ref().to_owned(),
            args,
            workdir,
        })
    }
}

impl Classifier for SintaxCommand {
    fn classify(&self, sequences: &[(&str, &[u8])]) -> Result<Vec<String>> {
        let input = self.workdir.path().join("esv.fa");
        let output = self.workdir.path().join("sintax.tsv");

        let mut writer = FastaWriter::to_file(&input)?;
        for (name, seq) in sequences {
            writer.write_record(name.as_bytes(), seq)?;
        }
        writer.finish()?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("-sintax")
            .arg(&input)
            .arg("-db")
            .arg(&self.database)
            .arg("-tabbedout")
            .arg(&output)
            .args(&self.args);
        debug!("Running {cmd:?}");

        let status = cmd.status().map_err(|source| Error::ToolSpawn {
            program: self.program.clone(),
            source,
        })?;
        if !status.success() {
            return Err(Error::ToolFailed {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }

        let text = std::fs::read_to_string(&output).map_err(|e| Error::file_io(&output, e))?;
        Ok(text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_owned)
            .collect())
    }
}

/// Classify every sequence, counting the ones that get no usable hit.
pub fn assign_taxonomy(
    classifier: &dyn Classifier,
    sequences: &[(&str, &[u8])],
    strand: &str,
    stats: &mut DemuxStats,
) -> Result<Vec<TaxonomyHit>> {
    let mut outcomes = FxHashMap::default();
    for line in classifier.classify(sequences)? {
        let outcome = parse_taxonomy_line(&line, strand);
        let id = line.split('\t').next().unwrap_or("").trim().to_owned();
        outcomes.insert(id, outcome);
    }

    let mut hits = Vec::new();
    for (name, _) in sequences {
        match outcomes.remove(*name) {
            Some(Ok(hit)) => {
                stats.keep();
                hits.push(hit);
            }
            Some(Err(r)) => stats.reject(r),
            None => stats.reject(Rejection::NoTaxonomy),
        }
    }

    for id in outcomes.keys() {
        warn!("Classifier returned a result for unknown sequence \"{id}\"");
    }
    info!("Assigned taxonomy to {} of {} sequences", hits.len(), sequences.len());

    Ok(hits)
}

/// Append rank columns to `table`, joining hits on `id_column`.
pub fn annotate_table(table: &mut Table, id_column: &str, hits: &[TaxonomyHit]) -> Result<()> {
    let idx = table.column(id_column).ok_or_else(|| Error::MissingColumn {
        file: table.file().to_owned(),
        column: id_column.to_owned(),
    })?;
    let by_id = hits
        .iter()
        .map(|h| (h.id.as_str(), h))
        .collect::<FxHashMap<_, _>>();
    let lookup = |row: &csv::StringRecord| row.get(idx).and_then(|id| by_id.get(id).copied());

    for (_, rank) in RANKS {
        table.push_column(rank, |row| {
            lookup(row)
                .and_then(|h| h.lineage.get(rank))
                .unwrap_or("")
                .to_owned()
        });
    }
    table.push_column(CONFIDENT_RANK_COLUMN, |row| {
        lookup(row)
            .and_then(|h| h.confident.deepest())
            .unwrap_or("")
            .to_owned()
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "Zotu1\td:\"Bacteria\"(1.00),p:Firmicutes(0.97),g:Bacillus(0.41)\t+\td:Bacteria,p:Firmicutes";

    #[test]
    fn parses_lineages() {
        let hit = parse_taxonomy_line(LINE, "+").unwrap();
        assert_eq!(hit.id, "Zotu1");
        assert_eq!(hit.lineage.get("domain"), Some("Bacteria"));
        assert_eq!(hit.lineage.get("phylum"), Some("Firmicutes"));
        assert_eq!(hit.lineage.get("genus"), Some("Bacillus"));
        assert_eq!(hit.lineage.get("class"), None);
        assert_eq!(hit.lineage.deepest(), Some("genus"));
        assert_eq!(hit.confident.deepest(), Some("phylum"));
    }

    #[test]
    fn rejects_other_strand_and_empty_hits() {
        assert_eq!(parse_taxonomy_line(LINE, "-"), Err(Rejection::WrongStrand));
        assert_eq!(
            parse_taxonomy_line("Zotu2\t\t\t", "+"),
            Err(Rejection::NoTaxonomy)
        );
        assert_eq!(parse_taxonomy_line("Zotu3", "+"), Err(Rejection::NoTaxonomy));
    }

    struct Canned(Vec<String>);

    impl Classifier for Canned {
        fn classify(&self, _: &[(&str, &[u8])]) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn joins_hits_onto_table() {
        let classifier = Canned(vec![
            LINE.to_owned(),
            "Zotu2\td:Archaea(0.9)\t-\t".to_owned(),
        ]);
        let seqs: [(&str, &[u8]); 3] = [("Zotu1", b"ACGT"), ("Zotu2", b"GGGG"), ("Zotu3", b"TTTT")];

        let mut stats = DemuxStats::new("taxonomy");
        let hits = assign_taxonomy(&classifier, &seqs, "+", &mut stats).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(stats.kept, 1);
        assert_eq!(stats.rejected[&Rejection::WrongStrand], 1);
        assert_eq!(stats.rejected[&Rejection::NoTaxonomy], 1);

        let mut table = Table::new(["primer_name", "Zotu", "count"]);
        table.push_row(["p1", "Zotu1", "4"]).unwrap();
        table.push_row(["p1", "Zotu3", "2"]).unwrap();
        annotate_table(&mut table, "Zotu", &hits).unwrap();

        assert_eq!(table.headers().len(), 3 + RANKS.len() + 1);
        assert_eq!(table.get(0, "genus"), "Bacillus");
        assert_eq!(table.get(0, CONFIDENT_RANK_COLUMN), "phylum");
        assert_eq!(table.get(1, "domain"), "");

        assert!(matches!(
            annotate_table(&mut table, "ESV", &hits),
            Err(Error::MissingColumn { .. })
        ));
    }
}
