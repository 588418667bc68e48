//! # bam2genotype
//!
//! Extract per-position genotype calls from BAM or SAM alignments.
//!
//! ## Usage
//! ```bash
//! # Compressed genotype stream written to ./sample.bam.gtp
//! bam2genotype genome.fa sample.bam
//!
//! # Lazy per-chromosome reference from a binary cache, restricted to regions
//! bam2genotype genome.bin sample.bam out/ --lazy-reference --regions exome.bed
//!
//! # Build the binary cache once from FASTA
//! bam2genotype genome.fa.gz sample.bam --write-reference-cache genome.bin
//! ```
//!
//! Exit codes: 1 for bad arguments, 2 when the reference or alignment input
//! cannot be opened, 3 for any later failure.

use anyhow::{Context, Result};
use bamgeno::filter::{RegionMap, DEFAULT_MAX_WRONG_POSITION_PROBABILITY};
use bamgeno::genotype::DEFAULT_LOCUS_CAPACITY;
use bamgeno::io::{BamReader, SamReader};
use bamgeno::pipeline::{
    self, AlignmentFormat, MitochondrialPolicy, OutputFormat, PipelineOptions, PipelineSummary,
    DEFAULT_PROGRESS_INTERVAL,
};
use bamgeno::reference::ReferenceStore;
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_USAGE: u8 = 1;
const EXIT_INPUT: u8 = 2;
const EXIT_FAILURE: u8 = 3;

/// Alignment input format flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Sam,
    Bam,
}

impl From<FormatArg> for AlignmentFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Sam => AlignmentFormat::Sam,
            FormatArg::Bam => AlignmentFormat::Bam,
        }
    }
}

/// Extract per-position genotype calls from BAM/SAM alignments
#[derive(Debug, Parser)]
#[command(name = "bam2genotype", version, about)]
struct Cli {
    /// Reference genome: FASTA (plain or gzip) or binary reference cache
    reference: PathBuf,

    /// Alignments: BAM, or SAM (plain or gzip)
    alignments: PathBuf,

    /// Output directory [default: current directory]
    output_dir: Option<PathBuf>,

    /// BED file of regions of interest; alignments outside them are dropped
    #[arg(long, value_name = "BED")]
    regions: Option<PathBuf>,

    /// Load one chromosome at a time from a binary reference cache
    #[arg(long)]
    lazy_reference: bool,

    /// Alignment format [default: from the file extension]
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Skip MT alignments instead of ending the scan at the first one
    #[arg(long)]
    skip_mt_only: bool,

    /// Write text loci instead of the compressed genotype stream
    #[arg(long)]
    text_output: bool,

    /// Save the loaded reference as a binary cache at this path
    #[arg(long, value_name = "PATH")]
    write_reference_cache: Option<PathBuf>,

    /// Aligned loci reserved up front
    #[arg(long, default_value_t = DEFAULT_LOCUS_CAPACITY)]
    locus_capacity: usize,

    /// Highest accepted probability that a read is misplaced
    #[arg(long, default_value_t = DEFAULT_MAX_WRONG_POSITION_PROBABILITY)]
    max_wrong_position_probability: f64,

    /// Records between progress reports (0 disables them)
    #[arg(long, default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    progress_interval: u64,
}

enum Alignments {
    Bam(BamReader<BufReader<File>>),
    Sam(SamReader<Box<dyn BufRead>>),
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_reference(cli: &Cli) -> Result<ReferenceStore> {
    let store = ReferenceStore::open(&cli.reference, cli.lazy_reference)
        .with_context(|| format!("cannot load reference {}", cli.reference.display()))?;
    Ok(store)
}

fn open_alignments(cli: &Cli) -> Result<Alignments> {
    let format = cli
        .format
        .map(AlignmentFormat::from)
        .unwrap_or_else(|| AlignmentFormat::from_path(&cli.alignments));
    info!(path = %cli.alignments.display(), ?format, "opening alignments");

    let context = || format!("cannot open alignments {}", cli.alignments.display());
    Ok(match format {
        AlignmentFormat::Bam => {
            Alignments::Bam(BamReader::from_path(&cli.alignments).with_context(context)?)
        }
        AlignmentFormat::Sam => {
            Alignments::Sam(SamReader::from_path(&cli.alignments).with_context(context)?)
        }
    })
}

/// `<output-dir>/<alignment file name>.gtp`
fn output_path(alignments: &Path, output_dir: Option<&Path>) -> PathBuf {
    let mut name = alignments
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "alignments".into());
    name.push(".gtp");
    output_dir.unwrap_or_else(|| Path::new(".")).join(name)
}

fn pipeline_options(cli: &Cli) -> Result<PipelineOptions> {
    let regions = match &cli.regions {
        Some(path) => {
            let regions = RegionMap::from_bed(path)
                .with_context(|| format!("cannot read regions {}", path.display()))?;
            info!(path = %path.display(), regions = regions.len(), "regions loaded");
            Some(regions)
        }
        None => None,
    };

    Ok(PipelineOptions {
        max_wrong_position_probability: cli.max_wrong_position_probability,
        regions,
        mitochondrial_policy: if cli.skip_mt_only {
            MitochondrialPolicy::Skip
        } else {
            MitochondrialPolicy::Stop
        },
        progress_interval: cli.progress_interval,
        locus_capacity: cli.locus_capacity,
        output_format: if cli.text_output {
            OutputFormat::Text
        } else {
            OutputFormat::Compressed
        },
    })
}

fn extract(
    cli: &Cli,
    reference: &mut ReferenceStore,
    alignments: Alignments,
) -> Result<PipelineSummary> {
    if let Some(cache) = &cli.write_reference_cache {
        match &*reference {
            ReferenceStore::Eager(eager) => eager
                .write_cache(cache)
                .with_context(|| format!("cannot write reference cache {}", cache.display()))?,
            ReferenceStore::Lazy(_) => {
                warn!("reference is already a binary cache, not rewriting it")
            }
        }
    }

    let options = pipeline_options(cli)?;
    let out_path = output_path(&cli.alignments, cli.output_dir.as_deref());
    info!(path = %out_path.display(), format = ?options.output_format, "writing genotypes");
    let file = File::create(&out_path)
        .with_context(|| format!("cannot create output {}", out_path.display()))?;
    let mut writer = BufWriter::new(file);

    let summary = match alignments {
        Alignments::Bam(mut reader) => {
            pipeline::run(reader.records(), reference, &mut writer, &options)?
        }
        Alignments::Sam(reader) => pipeline::run(reader, reference, &mut writer, &options)?,
    };
    Ok(summary)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logging();

    let mut reference = match open_reference(&cli) {
        Ok(reference) => reference,
        Err(err) => {
            error!("{:#}", err);
            return ExitCode::from(EXIT_INPUT);
        }
    };
    let alignments = match open_alignments(&cli) {
        Ok(alignments) => alignments,
        Err(err) => {
            error!("{:#}", err);
            return ExitCode::from(EXIT_INPUT);
        }
    };

    match extract(&cli, &mut reference, alignments) {
        Ok(summary) => {
            info!(
                records = summary.records_read,
                loci = summary.total_loci,
                "finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
