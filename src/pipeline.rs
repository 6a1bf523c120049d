//! Sequential orchestration of demultiplexing and aggregation.
//!
//! Every partition (one primer within one sample) is filtered and sent through
//! the denoiser before any of its sequences reach the registry, so the shared
//! [`AggregationContext`] is only ever updated by one partition at a time.

use std::path::Path;

use log::{debug, info, warn};

use crate::demux::*;
use crate::errors::*;
use crate::esv::{CountTable, EsvRegistry};
use crate::external::{Candidate, Denoiser};
use crate::io::{partial_path, FastaWriter, FastxInput, PairedInput, SplitFastqWriter};

/// Label of a long read barcode pair; unresolved barcodes are left empty.
pub fn barcode_pair_label(left: Option<&str>, right: Option<&str>) -> String {
    format!("{}+{}", left.unwrap_or(""), right.unwrap_or(""))
}

/// Classify read pairs and write each pair's trimmed mates to per-primer files.
pub fn demux_paired(
    input: PairedInput,
    classifier: &InlineClassifier,
    extractor: &InsertExtractor,
    out: &mut SplitFastqWriter,
    stats: &mut DemuxStats,
) -> Result<()> {
    for pair in input {
        let (mut r1, mut r2) = pair?;
        r1.seq.make_ascii_uppercase();
        r2.seq.make_ascii_uppercase();

        let outcome = classifier.classify(&r1.seq).and_then(|c| {
            let insert = extractor.extract(&r1.seq, c.start)?;
            let mate = extractor.trim_mate(&r2.seq)?;
            Ok((c, insert.len(), r2.seq.len() - mate.len()))
        });
        stats.record(&outcome);
        let Ok((c, insert_len, mate_start)) = outcome else {
            continue;
        };

        let q1 = fill_qual(r1.qual.as_deref(), r1.seq.len());
        let q2 = fill_qual(r2.qual.as_deref(), r2.seq.len());
        let r1_range = c.start..c.start + insert_len;

        out.write_pair(
            &classifier.descriptors()[c.primer].primer,
            (&r1.id, &r1.seq[r1_range.clone()], &q1[r1_range]),
            (&r2.id, &r2.seq[mate_start..], &q2[mate_start..]),
        )?;
    }

    Ok(())
}

// FASTA input has no qualities; write the highest common score
fn fill_qual(qual: Option<&[u8]>, len: usize) -> Vec<u8> {
    match qual {
        Some(q) if q.len() == len => q.to_owned(),
        _ => vec![b'I'; len],
    }
}

/// Classify single (or already merged) reads and count their inserts per primer.
pub fn demux_merged(
    input: FastxInput,
    classifier: &InlineClassifier,
    extractor: &InsertExtractor,
    stats: &mut DemuxStats,
) -> Result<SampleCounts> {
    let mut counts = SampleCounts::new();

    for record in input {
        let mut record = record?;
        record.seq.make_ascii_uppercase();

        let outcome = classifier.classify(&record.seq).and_then(|c| {
            extractor
                .extract(&record.seq, c.start)
                .map(|insert| (c.primer, insert))
        });
        stats.record(&outcome);

        if let Ok((primer, insert)) = outcome {
            counts.add(&classifier.descriptors()[primer].primer, insert);
        }
    }

    Ok(counts)
}

/// Demultiplex long reads, counting inserts per barcode pair.
pub fn demux_long(
    input: FastxInput,
    demux: &LongReadDemultiplexer,
    stats: &mut DemuxStats,
) -> Result<SampleCounts> {
    let mut counts = SampleCounts::new();
    let mut reversed = 0usize;

    for record in input {
        let mut record = record?;
        record.seq.make_ascii_uppercase();

        let outcome = demux.demux(&record.seq);
        stats.record(&outcome);

        if let Ok(hit) = outcome {
            if hit.orientation == Orientation::Reverse {
                reversed += 1;
            }
            let label =
                barcode_pair_label(hit.left_barcode.as_deref(), hit.right_barcode.as_deref());
            counts.add(&label, &hit.insert);
        }
    }

    debug!("{reversed} long reads were reverse complemented");
    Ok(counts)
}

/// Thresholds applied to observations before denoising.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservationFilter {
    pub min_count: u64,
    pub min_len: usize,
}

impl ObservationFilter {
    pub fn accepts(&self, o: &Observation) -> bool {
        o.count >= self.min_count && o.sequence.len() >= self.min_len
    }
}

/// State shared by all partitions of a run.
pub struct AggregationContext {
    pub registry: EsvRegistry,
    pub counts: CountTable,
    pub stats: DemuxStats,
}

impl AggregationContext {
    pub fn new(registry: EsvRegistry) -> Self {
        Self {
            registry,
            counts: CountTable::new(),
            stats: DemuxStats::new("aggregation (reads)"),
        }
    }

    /// Add one sample's observations.
    ///
    /// Each primer is filtered and denoised on its own; the registry and the
    /// count table only see the sequences the denoiser kept.
    pub fn aggregate_partition(
        &mut self,
        sample: usize,
        counts: &SampleCounts,
        denoiser: &dyn Denoiser,
        filter: ObservationFilter,
    ) -> Result<()> {
        for primer in counts.primers() {
            let (passed, failed): (Vec<_>, Vec<_>) = counts
                .observations(primer)
                .into_iter()
                .partition(|o| filter.accepts(o));

            let low = failed.iter().map(|o| o.count as usize).sum();
            if low > 0 {
                self.stats.reject_n(Rejection::LowCount, low);
            }

            let candidates = passed
                .into_iter()
                .map(|o| Candidate {
                    sequence: o.sequence,
                    count: o.count,
                })
                .collect::<Vec<_>>();
            let kept = denoiser.denoise(&candidates)?;

            let mut is_kept = vec![false; candidates.len()];
            for &i in &kept {
                let k = is_kept
                    .get_mut(i)
                    .ok_or_else(|| Error::UnknownSyntheticId(format!("candidate {i}")))?;
                *k = true;
            }

            for (c, keep) in candidates.iter().zip(is_kept) {
                if keep {
                    let name = self.registry.assign(&c.sequence)?;
                    self.counts.record(primer, sample, name, c.count)?;
                    self.stats.keep_n(c.count as usize);
                } else {
                    self.stats.reject_n(Rejection::Noise, c.count as usize);
                }
            }

            debug!(
                "Sample {sample}, primer {primer}: {} of {} candidates kept",
                kept.len(),
                candidates.len()
            );
        }

        Ok(())
    }

    /// Read observation tables and aggregate them in order. The table at
    /// position `i` is sample `i + 1`.
    pub fn aggregate_files(
        &mut self,
        files: &[impl AsRef<Path>],
        denoiser: &dyn Denoiser,
        filter: ObservationFilter,
    ) -> Result<()> {
        for (i, file) in files.iter().enumerate() {
            let file = file.as_ref();
            let counts = SampleCounts::from_path(file)?;
            info!(
                "Sample {}: {} distinct sequences from \"{}\"",
                i + 1,
                counts.distinct(),
                file.display()
            );
            self.aggregate_partition(i + 1, &counts, denoiser, filter)?;
        }
        Ok(())
    }

    /// Write the ESV FASTA and the count table.
    ///
    /// Both are written next to their final paths and only renamed into place
    /// once both are complete.
    pub fn write_outputs(
        &self,
        fasta: impl AsRef<Path>,
        table: impl AsRef<Path>,
        id_column: &str,
    ) -> Result<()> {
        let (fasta, table) = (fasta.as_ref(), table.as_ref());
        let (fasta_tmp, table_tmp) = (partial_path(fasta), partial_path(table));

        let written = self.write_to(&fasta_tmp, &table_tmp, id_column);
        if written.is_err() {
            for tmp in [&fasta_tmp, &table_tmp] {
                if tmp.exists() {
                    if let Err(e) = std::fs::remove_file(tmp) {
                        warn!("Could not remove \"{}\": {e}", tmp.display());
                    }
                }
            }
            return written;
        }

        for (tmp, path) in [(&fasta_tmp, fasta), (&table_tmp, table)] {
            std::fs::rename(tmp, path).map_err(|e| Error::file_io(path, e))?;
        }
        info!(
            "Wrote {} ESVs to \"{}\" and {} counts to \"{}\"",
            self.registry.len(),
            fasta.display(),
            self.counts.len(),
            table.display()
        );
        Ok(())
    }

    fn write_to(&self, fasta: &Path, table: &Path, id_column: &str) -> Result<()> {
        let mut writer = FastaWriter::to_file(fasta)?;
        self.registry.write_fasta(&mut writer)?;
        writer.finish()?;

        let order = self.registry.naming().order();
        self.counts.write_tsv(table, id_column, &order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcodes::BarcodeIndex;
    use crate::esv::Naming;

    struct DropSingletons;

    impl Denoiser for DropSingletons {
        fn denoise(&self, candidates: &[Candidate]) -> Result<Vec<usize>> {
            Ok((0..candidates.len())
                .filter(|&i| candidates[i].count > 1)
                .collect())
        }
    }

    fn classifier() -> InlineClassifier {
        InlineClassifier::new(vec![
            PrimerDescriptor::new("p1", 2, "ACGTACGTACGTACGT", "AC.T"),
            PrimerDescriptor::new("p2", 2, "TTTTGGGGCCCCAAAA", "AC.T"),
        ])
        .unwrap()
    }

    #[test]
    fn merged_reads_are_counted_per_primer() {
        // NN + barcode + begin + insert + anchor + 2 extra
        let fastq = "@a\nNNACGTACGTACGTACGTACATgattacaGGCCAA\n+\nIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIII\n\
                     @b\nNNTTTTGGGGCCCCAAAAACGTGATTACAGGCCAA\n+\nIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIII\n\
                     @c\nNNTTTTGGGGCCCCAAAAGGGGGATTACAGGCCAA\n+\nIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIII\n";
        let input = FastxInput::from_reader(fastq.as_bytes()).unwrap();
        let extractor = InsertExtractor::new("GGCC", 1, 4).unwrap();

        let mut stats = DemuxStats::new("merged");
        let counts = demux_merged(input, &classifier(), &extractor, &mut stats).unwrap();

        assert_eq!(stats.kept, 2);
        assert_eq!(stats.rejected[&Rejection::NoBegin], 1);
        assert_eq!(counts.observations("p1")[0].sequence, b"GATTACA");
        assert_eq!(counts.observations("p2")[0].sequence, b"GATTACA");
    }

    #[test]
    fn paired_reads_are_split_and_trimmed() {
        let r1 = "@a\nNNACGTACGTACGTACGTACATGATTACAGGCCAA\n+\nIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIII\n\
                  @b\nNNCCCCCCCCCCCCCCCCACATGATTACAGGCCAA\n+\nIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIII\n";
        let r2 = "@a\nTGGCCTGTAATC\n+\nIIIIIIIIIIII\n@b\nTGGCCTGTAATC\n+\nIIIIIIIIIIII\n";
        let input = PairedInput::new(
            FastxInput::from_reader(r1.as_bytes()).unwrap(),
            FastxInput::from_reader(r2.as_bytes()).unwrap(),
        );
        let extractor = InsertExtractor::new("GGCC", 1, 4).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut out = SplitFastqWriter::new(dir.path(), false);
        let mut stats = DemuxStats::new("paired");
        demux_paired(input, &classifier(), &extractor, &mut out, &mut stats).unwrap();
        out.finish().unwrap();

        assert_eq!(stats.kept, 1);
        assert_eq!(stats.rejected[&Rejection::NoBarcode], 1);

        let r1 = std::fs::read_to_string(dir.path().join("p1_R1.fastq")).unwrap();
        assert_eq!(r1, "@a\nGATTACA\n+\nIIIIIII\n");
        let r2 = std::fs::read_to_string(dir.path().join("p1_R2.fastq")).unwrap();
        assert_eq!(r2, "@a\nTGTAATC\n+\nIIIIIII\n");
    }

    #[test]
    fn unpaired_input_leaves_no_output() {
        let r1 = "@a\nNNACGTACGTACGTACGTACATGATTACAGGCCAA\n+\nIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIII\n\
                  @b\nNNACGTACGTACGTACGTACATGATTACAGGCCAA\n+\nIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIII\n";
        let r2 = "@a\nTGGCCTGTAATC\n+\nIIIIIIIIIIII\n";
        let input = PairedInput::new(
            FastxInput::from_reader(r1.as_bytes()).unwrap(),
            FastxInput::from_reader(r2.as_bytes()).unwrap(),
        );
        let extractor = InsertExtractor::new("GGCC", 1, 4).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut out = SplitFastqWriter::new(dir.path(), false);
        let mut stats = DemuxStats::new("paired");
        let res = demux_paired(input, &classifier(), &extractor, &mut out, &mut stats);

        assert!(matches!(res, Err(Error::UnpairedRead { .. })));
        assert_eq!(stats.kept, 1);
        drop(out);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn long_reads_are_counted_per_barcode_pair() {
        let index = BarcodeIndex::new([("bc1", "CACATATCAGAGTGCG")]).unwrap();
        let demux = LongReadDemultiplexer::new("AAAAC", "GTTTT", 6, 2, index, 2).unwrap();
        let fasta = ">a\nCACATATCAGAGTGCGAAAACGATTACGTTTTGGGG\n>b\nGGGGAAAACGATTACGTTTTGGGG\n";
        let input = FastxInput::from_reader(fasta.as_bytes()).unwrap();

        let mut stats = DemuxStats::new("long");
        let counts = demux_long(input, &demux, &mut stats).unwrap();

        assert_eq!(stats.kept, 2);
        assert_eq!(counts.primers().collect::<Vec<_>>(), ["+", "bc1+"]);
        assert_eq!(counts.observations("bc1+")[0].sequence, b"GATTAC");
    }

    #[test]
    fn unknown_denoiser_index_is_fatal() {
        struct OutOfRange;

        impl Denoiser for OutOfRange {
            fn denoise(&self, candidates: &[Candidate]) -> Result<Vec<usize>> {
                Ok(vec![candidates.len()])
            }
        }

        let mut sample = SampleCounts::new();
        sample.add_n("p1", b"ACGTACGT", 5);

        let mut ctx = AggregationContext::new(EsvRegistry::new(Naming::ContentHash));
        let err = ctx
            .aggregate_partition(1, &sample, &OutOfRange, ObservationFilter::default())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSyntheticId(_)));
        assert!(ctx.registry.is_empty());
        assert!(ctx.counts.is_empty());
    }

    #[test]
    fn partitions_go_through_the_denoiser() {
        let mut sample = SampleCounts::new();
        sample.add_n("p1", b"ACGTACGT", 5);
        sample.add_n("p1", b"TTTTTTTT", 1);
        sample.add_n("p1", b"ACG", 9);

        let mut ctx = AggregationContext::new(EsvRegistry::new(Naming::Prefix("Zotu".into())));
        let filter = ObservationFilter {
            min_count: 1,
            min_len: 4,
        };
        ctx.aggregate_partition(1, &sample, &DropSingletons, filter)
            .unwrap();

        assert_eq!(ctx.counts.get("p1", 1, "Zotu1"), Some(5));
        assert_eq!(ctx.registry.len(), 1);
        assert_eq!(ctx.stats.kept, 5);
        assert_eq!(ctx.stats.rejected[&Rejection::Noise], 1);
        assert_eq!(ctx.stats.rejected[&Rejection::LowCount], 9);
    }
}
