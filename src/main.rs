use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use ampliplex::config::{Mode, RunConfig};
use ampliplex::demux::DemuxStats;
use ampliplex::external::{annotate_table, assign_taxonomy};
use ampliplex::io::{read_fasta_records, FastxInput, PairedInput, SplitFastqWriter, Table};
use ampliplex::pipeline::{self, AggregationContext, ObservationFilter};

#[derive(Parser)]
#[command(name = "ampliplex", version, about = "Demultiplex inline-barcoded amplicons and count exact sequence variants")]
struct Cli {
    /// YAML run configuration
    #[arg(short, long, global = true, default_value = "ampliplex.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split paired reads into trimmed per-primer FASTQ files
    Demux {
        /// Read 1 FASTQ (gzip supported)
        #[arg(long)]
        r1: PathBuf,

        /// Read 2 FASTQ (gzip supported)
        #[arg(long)]
        r2: PathBuf,

        /// Directory for the per-primer files
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Gzip the output files
        #[arg(long)]
        gzip: bool,
    },

    /// Count inserts of merged or long reads into an observation table
    Count {
        /// Input FASTQ/FASTA file (gzip supported)
        #[arg(short, long)]
        input: PathBuf,

        /// Output observation table
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Denoise, name and count observation tables, one per sample in order
    Aggregate {
        /// Observation tables; the first is sample 1
        #[arg(required = true)]
        observations: Vec<PathBuf>,

        /// Output ESV FASTA
        #[arg(long)]
        fasta: PathBuf,

        /// Output count table
        #[arg(long)]
        table: PathBuf,
    },

    /// Assign taxonomy to ESVs and add rank columns to a count table
    Taxonomy {
        /// ESV FASTA written by `aggregate`
        #[arg(long)]
        fasta: PathBuf,

        /// Count table written by `aggregate`
        #[arg(long)]
        table: PathBuf,

        /// Output annotated table
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = RunConfig::from_path(&cli.config)
        .with_context(|| format!("Failed to load \"{}\"", cli.config.display()))?;

    match cli.command {
        Commands::Demux {
            r1,
            r2,
            out_dir,
            gzip,
        } => demux(&config, r1, r2, out_dir, gzip),
        Commands::Count { input, output } => count(&config, input, output),
        Commands::Aggregate {
            observations,
            fasta,
            table,
        } => aggregate(&config, &observations, fasta, table),
        Commands::Taxonomy {
            fasta,
            table,
            output,
        } => taxonomy(&config, fasta, table, output),
    }
}

// the summary is logged whether or not the run finished
fn summarize<T>(stats: &DemuxStats, res: ampliplex::Result<T>) -> Result<T> {
    info!("Summary:\n{stats}");
    Ok(res?)
}

fn demux(config: &RunConfig, r1: PathBuf, r2: PathBuf, out_dir: PathBuf, gzip: bool) -> Result<()> {
    if config.mode != Mode::Paired {
        bail!("demux needs paired mode, the configuration uses {:?}", config.mode);
    }
    let classifier = config.inline_classifier()?;
    let extractor = config.insert_extractor()?;
    let input = PairedInput::from_files(&r1, &r2)?;

    let mut out = SplitFastqWriter::new(&out_dir, gzip);
    let mut stats = DemuxStats::new("paired demux");
    let res = pipeline::demux_paired(input, &classifier, &extractor, &mut out, &mut stats);
    summarize(&stats, res)?;

    let paths = out.finish()?;
    info!("Wrote {} files to \"{}\"", paths.len(), out_dir.display());
    Ok(())
}

fn count(config: &RunConfig, input: PathBuf, output: PathBuf) -> Result<()> {
    let reads = FastxInput::from_file(&input)?;

    let (stats, res) = match config.mode {
        Mode::Paired => bail!("count needs merged or long mode; run demux for paired reads"),
        Mode::Merged => {
            let classifier = config.inline_classifier()?;
            let extractor = config.insert_extractor()?;
            let mut stats = DemuxStats::new("merged reads");
            let res = pipeline::demux_merged(reads, &classifier, &extractor, &mut stats);
            (stats, res)
        }
        Mode::Long => {
            let demux = config.long_read_demultiplexer()?;
            let mut stats = DemuxStats::new("long reads");
            let res = pipeline::demux_long(reads, &demux, &mut stats);
            (stats, res)
        }
    };
    let counts = summarize(&stats, res)?;

    counts.to_table()?.write_path(&output)?;
    info!(
        "Wrote {} distinct sequences to \"{}\"",
        counts.distinct(),
        output.display()
    );
    Ok(())
}

fn aggregate(config: &RunConfig, observations: &[PathBuf], fasta: PathBuf, table: PathBuf) -> Result<()> {
    let denoiser = config.denoiser()?;
    let filter = ObservationFilter {
        min_count: config.min_count,
        min_len: config.min_len,
    };

    let mut ctx = AggregationContext::new(config.registry()?);
    let res = ctx.aggregate_files(observations, denoiser.as_ref(), filter);
    summarize(&ctx.stats, res)?;

    ctx.write_outputs(&fasta, &table, &config.id_column)?;
    Ok(())
}

fn taxonomy(config: &RunConfig, fasta: PathBuf, table: PathBuf, output: PathBuf) -> Result<()> {
    let Some(classifier) = config.taxonomy_classifier()? else {
        bail!("no taxonomy tool is configured");
    };

    let records = read_fasta_records(&fasta)?;
    let sequences = records
        .iter()
        .map(|(n, s)| (n.as_str(), s.as_slice()))
        .collect::<Vec<_>>();

    let mut stats = DemuxStats::new("taxonomy");
    let res = assign_taxonomy(&classifier, &sequences, config.taxonomy_strand(), &mut stats);
    let hits = summarize(&stats, res)?;

    let mut counts = Table::from_path(&table, &[config.id_column.as_str()])?;
    annotate_table(&mut counts, &config.id_column, &hits)?;
    counts.write_path(&output)?;
    info!("Wrote annotated table to \"{}\"", output.display());
    Ok(())
}
