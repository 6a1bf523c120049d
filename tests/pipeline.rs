use ampliplex::demux::{Rejection, SampleCounts};
use ampliplex::esv::{EsvRegistry, Naming, DEFAULT_ID_COLUMN};
use ampliplex::external::{Candidate, Denoiser};
use ampliplex::io::read_fasta_records;
use ampliplex::pipeline::{AggregationContext, ObservationFilter};
use ampliplex::Result;

/// Drops every candidate supported by a single read.
struct DropSingletons;

impl Denoiser for DropSingletons {
    fn denoise(&self, candidates: &[Candidate]) -> Result<Vec<usize>> {
        Ok((0..candidates.len())
            .filter(|&i| candidates[i].count > 1)
            .collect())
    }
}

const FILTER: ObservationFilter = ObservationFilter {
    min_count: 1,
    min_len: 4,
};

fn write_observations(dir: &std::path::Path, name: &str, counts: &SampleCounts) -> std::path::PathBuf {
    let path = dir.join(name);
    counts.to_table().unwrap().write_path(&path).unwrap();
    path
}

#[test]
fn two_samples_share_names_but_not_rows() {
    let dir = tempfile::tempdir().unwrap();

    let mut s1 = SampleCounts::new();
    s1.add_n("mlCOIint1", b"ACGTACGTAA", 5);
    s1.add_n("mlCOIint1", b"GGGGCCCCTT", 1);
    let mut s2 = SampleCounts::new();
    s2.add_n("mlCOIint1", b"ACGTACGTAA", 7);
    s2.add_n("mlCOIint2", b"TTTTAAAACC", 3);

    let files = [
        write_observations(dir.path(), "s1.tsv", &s1),
        write_observations(dir.path(), "s2.tsv", &s2),
    ];

    let mut ctx = AggregationContext::new(EsvRegistry::new(Naming::Prefix("Zotu".to_owned())));
    ctx.aggregate_files(&files, &DropSingletons, FILTER).unwrap();

    assert_eq!(ctx.registry.len(), 2);
    assert_eq!(ctx.counts.len(), 3);
    assert_eq!(ctx.counts.get("mlCOIint1", 1, "Zotu1"), Some(5));
    assert_eq!(ctx.counts.get("mlCOIint1", 2, "Zotu1"), Some(7));
    assert_eq!(ctx.stats.rejected[&Rejection::Noise], 1);

    let fasta = dir.path().join("out/esv.fa");
    let table = dir.path().join("out/counts.tsv");
    ctx.write_outputs(&fasta, &table, DEFAULT_ID_COLUMN).unwrap();

    let records = read_fasta_records(&fasta).unwrap();
    assert_eq!(
        records,
        vec![
            ("Zotu1".to_owned(), b"ACGTACGTAA".to_vec()),
            ("Zotu2".to_owned(), b"TTTTAAAACC".to_vec()),
        ]
    );

    let written = std::fs::read_to_string(&table).unwrap();
    assert_eq!(
        written,
        "primer_name\tindex\tZotu\tcount\ttotal\n\
         mlCOIint1\t1\tZotu1\t5\t5\n\
         mlCOIint1\t2\tZotu1\t7\t7\n\
         mlCOIint2\t2\tZotu2\t3\t3\n"
    );
    assert!(!dir.path().join("out/.partial.esv.fa").exists());
}

#[test]
fn seeded_names_carry_over_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let mut sample = SampleCounts::new();
    sample.add_n("p1", b"ACGTACGTAA", 4);
    let files = [write_observations(dir.path(), "s1.tsv", &sample)];

    let fasta = dir.path().join("run1.fa");
    let table = dir.path().join("run1.tsv");
    let mut first = AggregationContext::new(EsvRegistry::new(Naming::Prefix("Zotu".to_owned())));
    first.aggregate_files(&files, &DropSingletons, FILTER).unwrap();
    first.write_outputs(&fasta, &table, DEFAULT_ID_COLUMN).unwrap();

    let mut sample = SampleCounts::new();
    sample.add_n("p1", b"TTTTTTTTGG", 9);
    sample.add_n("p1", b"ACGTACGTAA", 2);
    let files = [write_observations(dir.path(), "s2.tsv", &sample)];

    let mut registry = EsvRegistry::new(Naming::Prefix("Zotu".to_owned()));
    registry.seed_from_fasta(&fasta).unwrap();
    let mut second = AggregationContext::new(registry);
    second.aggregate_files(&files, &DropSingletons, FILTER).unwrap();

    assert_eq!(second.registry.name_of(b"ACGTACGTAA"), Some("Zotu1"));
    assert_eq!(second.registry.name_of(b"TTTTTTTTGG"), Some("Zotu2"));
}

#[test]
fn content_hash_names_ignore_sample_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut a = SampleCounts::new();
    a.add_n("p1", b"ACGTACGTAA", 3);
    let mut b = SampleCounts::new();
    b.add_n("p1", b"GGGGCCCCTT", 3);
    let fa = write_observations(dir.path(), "a.tsv", &a);
    let fb = write_observations(dir.path(), "b.tsv", &b);

    let run = |files: [&std::path::PathBuf; 2]| {
        let mut ctx = AggregationContext::new(EsvRegistry::new(Naming::ContentHash));
        ctx.aggregate_files(&files, &DropSingletons, FILTER).unwrap();
        let names = ctx
            .registry
            .sorted()
            .into_iter()
            .map(|(n, s)| (n.to_owned(), s.to_vec()))
            .collect::<Vec<_>>();
        names
    };

    assert_eq!(run([&fa, &fb]), run([&fb, &fa]));
}

#[test]
fn failed_write_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut sample = SampleCounts::new();
    sample.add_n("p1", b"ACGTACGTAA", 3);

    let mut ctx = AggregationContext::new(EsvRegistry::new(Naming::ContentHash));
    ctx.aggregate_partition(1, &sample, &DropSingletons, FILTER)
        .unwrap();

    // a directory where the table should go makes the table write fail
    let table = dir.path().join("counts.tsv");
    std::fs::create_dir(dir.path().join(".partial.counts.tsv")).unwrap();
    let fasta = dir.path().join("esv.fa");

    assert!(ctx.write_outputs(&fasta, &table, DEFAULT_ID_COLUMN).is_err());
    assert!(!fasta.exists());
    assert!(!table.exists());
    assert!(!dir.path().join(".partial.esv.fa").exists());
}
