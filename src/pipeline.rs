//! Alignment stream to genotype stream.
//!
//! Records are consumed in container order. The accumulator holds one
//! chromosome at a time: when the chromosome changes, the previous one is
//! written out and the accumulator reset.
//!
//! # Example
//!
//! ```no_run
//! use bamgeno::io::BamReader;
//! use bamgeno::pipeline::{self, PipelineOptions};
//! use bamgeno::reference::ReferenceStore;
//! use std::fs::File;
//! use std::io::BufWriter;
//!
//! # fn main() -> bamgeno::Result<()> {
//! let mut reference = ReferenceStore::open("genome.fa", false)?;
//! let mut reader = BamReader::from_path("sample.bam")?;
//! let mut output = BufWriter::new(File::create("sample.bam.gtp")?);
//!
//! let summary = pipeline::run(
//!     reader.records(),
//!     &mut reference,
//!     &mut output,
//!     &PipelineOptions::default(),
//! )?;
//! println!("{} loci", summary.total_loci);
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::filter::{reject_reason, RegionMap, DEFAULT_MAX_WRONG_POSITION_PROBABILITY};
use crate::genotype::{codec, GenotypeList, DEFAULT_LOCUS_CAPACITY};
use crate::io::bam::{AlignmentRecord, CigarOp};
use crate::reference::{NucleotideLookup, MITOCHONDRIAL};
use crate::types::Nucleotide;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Records between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 500_000;

/// What to do on reaching the mitochondrial chromosome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MitochondrialPolicy {
    /// End the scan; records after the first `MT` record are not read
    #[default]
    Stop,
    /// Ignore `MT` records and keep scanning
    Skip,
}

/// Genotype stream encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Run-length encoded, bit-packed binary
    #[default]
    Compressed,
    /// One text line per locus
    Text,
}

/// Alignment input encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentFormat {
    /// BGZF-compressed binary alignments
    Bam,
    /// Tab-separated text alignments
    Sam,
}

impl AlignmentFormat {
    /// Guess from the file extension; anything but `.sam`/`.sam.gz` is BAM.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let name = path
            .as_ref()
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".sam") || name.ends_with(".sam.gz") {
            AlignmentFormat::Sam
        } else {
            AlignmentFormat::Bam
        }
    }
}

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Highest accepted probability that a read is misplaced
    pub max_wrong_position_probability: f64,
    /// Regions of interest; `None` keeps every position
    pub regions: Option<RegionMap>,
    /// Handling of the mitochondrial chromosome
    pub mitochondrial_policy: MitochondrialPolicy,
    /// Records between progress reports (0 disables them)
    pub progress_interval: u64,
    /// Aligned loci reserved up front
    pub locus_capacity: usize,
    /// Output encoding
    pub output_format: OutputFormat,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_wrong_position_probability: DEFAULT_MAX_WRONG_POSITION_PROBABILITY,
            regions: None,
            mitochondrial_policy: MitochondrialPolicy::Stop,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            locus_capacity: DEFAULT_LOCUS_CAPACITY,
            output_format: OutputFormat::Compressed,
        }
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Records decoded
    pub records_read: u64,
    /// Records walked into the accumulator
    pub records_accepted: u64,
    /// Records dropped by the alignment filter
    pub records_rejected: u64,
    /// Accepted records whose sequence is shorter than their CIGAR requires
    pub records_skipped: u64,
    /// Chromosome blocks written
    pub chromosomes_written: u64,
    /// Loci across all written chromosomes
    pub total_loci: u64,
    /// True when the scan ended at the mitochondrial chromosome
    pub stopped_at_mitochondrial: bool,
}

/// Human-readable byte count: `Bytes`, `KB`, `MB`, `GB` or `TB`.
///
/// The unit steps at powers of 1000 while the value is scaled by 1024, as
/// the progress reports have always shown it.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    let mut unit = 0;
    while unit + 1 < UNITS.len() && bytes / 1000u64.pow(unit as u32 + 1) > 0 {
        unit += 1;
    }
    let scaled = bytes as f64 / 1024f64.powi(unit as i32);
    format!("{:.1} {}", scaled, UNITS[unit])
}

/// Bases of the read the CIGAR walks over.
fn read_length(cigar: &[CigarOp]) -> usize {
    cigar
        .iter()
        .filter(|op| op.consumes_read())
        .map(|op| op.length() as usize)
        .sum()
}

/// Genotype extraction state over one alignment stream.
pub struct GenotypePipeline<'a, L: ?Sized, W> {
    options: &'a PipelineOptions,
    reference: &'a mut L,
    writer: &'a mut W,
    genotypes: GenotypeList,
    active: Option<Arc<str>>,
    summary: PipelineSummary,
}

impl<'a, L: NucleotideLookup + ?Sized, W: Write> GenotypePipeline<'a, L, W> {
    /// New pipeline writing to `writer`.
    pub fn new(options: &'a PipelineOptions, reference: &'a mut L, writer: &'a mut W) -> Self {
        Self {
            options,
            reference,
            writer,
            genotypes: GenotypeList::with_capacity(options.locus_capacity),
            active: None,
            summary: PipelineSummary::default(),
        }
    }

    /// Chromosome currently accumulating.
    pub fn active_chromosome(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Accumulator for the active chromosome.
    pub fn genotypes(&self) -> &GenotypeList {
        &self.genotypes
    }

    fn report_progress(&self) {
        info!(
            records = self.summary.records_read,
            memory = %human_size(self.genotypes.memory_size() as u64),
            loci = self.genotypes.num_loci(),
            "progress"
        );
    }

    /// Feed one record. Returns `false` once the scan should end.
    pub fn process(&mut self, record: &AlignmentRecord) -> Result<bool> {
        self.summary.records_read += 1;
        let interval = self.options.progress_interval;
        if interval > 0 && self.summary.records_read % interval == 0 {
            self.report_progress();
        }

        if let Some(reason) = reject_reason(
            record,
            self.options.regions.as_ref(),
            self.options.max_wrong_position_probability,
        ) {
            debug!(read = %record.name, ?reason, "record rejected");
            self.summary.records_rejected += 1;
            return Ok(true);
        }

        let chromosome = match &record.reference_name {
            Some(name) => name,
            None => {
                debug!(read = %record.name, "record has no reference name");
                self.summary.records_rejected += 1;
                return Ok(true);
            }
        };

        if &**chromosome == MITOCHONDRIAL {
            return Ok(match self.options.mitochondrial_policy {
                MitochondrialPolicy::Stop => {
                    info!("reached MT chromosome, ending scan");
                    self.summary.stopped_at_mitochondrial = true;
                    false
                }
                MitochondrialPolicy::Skip => true,
            });
        }

        if self.active.as_deref() != Some(&**chromosome) {
            if self.active.is_some() {
                info!(chromosome = %chromosome, "new chromosome");
                self.report_progress();
                self.flush_chromosome()?;
            }
            self.active = Some(Arc::clone(chromosome));
        }

        let position = match u32::try_from(record.position) {
            Ok(position) if position > 0 => position,
            _ => {
                debug!(read = %record.name, position = record.position, "position out of range");
                self.summary.records_skipped += 1;
                return Ok(true);
            }
        };

        // Text input may carry `*` for the sequence or CIGAR
        if record.cigar.is_empty() {
            return Ok(true);
        }
        if record.sequence.len() < read_length(&record.cigar) {
            debug!(
                read = %record.name,
                sequence = record.sequence.len(),
                cigar = read_length(&record.cigar),
                "sequence shorter than CIGAR"
            );
            self.summary.records_skipped += 1;
            return Ok(true);
        }

        self.walk(record, chromosome, position);
        self.summary.records_accepted += 1;
        Ok(true)
    }

    /// Walk the CIGAR over reference coordinates starting at `position`.
    fn walk(&mut self, record: &AlignmentRecord, chromosome: &str, mut position: u32) {
        let sequence = &record.sequence;
        let mut read_idx = 0usize;
        let mut previous: Option<CigarOp> = None;

        for &op in &record.cigar {
            let len = op.length();
            match op {
                CigarOp::HardClip(_) | CigarOp::Padding(_) => {}
                CigarOp::SoftClip(_) => read_idx += len as usize,
                CigarOp::Deletion(_) | CigarOp::RefSkip(_) => {
                    position = position.saturating_add(len);
                }
                CigarOp::Insertion(_) => {
                    // Padded bases are already part of the insertion run
                    let first = match previous {
                        Some(CigarOp::Padding(padding)) => padding.min(len),
                        _ => 0,
                    };
                    for offset in first..len {
                        let base = Nucleotide::from_base(sequence[read_idx + offset as usize]);
                        self.genotypes.add_insert(position, offset, base);
                    }
                    read_idx += len as usize;
                }
                CigarOp::Match(_) | CigarOp::SeqMatch(_) | CigarOp::SeqMismatch(_) => {
                    for &base in &sequence[read_idx..read_idx + len as usize] {
                        self.genotypes.add(
                            position,
                            Nucleotide::from_base(base),
                            op,
                            chromosome,
                            &mut *self.reference,
                        );
                        position = position.saturating_add(1);
                    }
                    read_idx += len as usize;
                }
            }
            previous = Some(op);
        }
    }

    /// Write the active chromosome and reset the accumulator.
    fn flush_chromosome(&mut self) -> Result<()> {
        let Some(name) = self.active.take() else {
            return Ok(());
        };

        info!(chromosome = %name, loci = self.genotypes.num_loci(), "writing chromosome");
        match self.options.output_format {
            OutputFormat::Compressed => {
                codec::write_chromosome(&mut *self.writer, &name, &self.genotypes)?
            }
            OutputFormat::Text => {
                codec::write_text_chromosome(&mut *self.writer, &name, &self.genotypes)?
            }
        }
        self.summary.chromosomes_written += 1;
        self.summary.total_loci += self.genotypes.num_loci() as u64;
        self.genotypes.reset();
        Ok(())
    }

    /// Write the last chromosome and return the totals.
    pub fn finish(mut self) -> Result<PipelineSummary> {
        self.flush_chromosome()?;
        self.writer.flush()?;
        info!(
            records = self.summary.records_read,
            accepted = self.summary.records_accepted,
            rejected = self.summary.records_rejected,
            chromosomes = self.summary.chromosomes_written,
            loci = self.summary.total_loci,
            "done"
        );
        Ok(self.summary)
    }
}

/// Run the whole stream through a [`GenotypePipeline`].
///
/// The first decode error aborts the run; chromosomes completed before it
/// have already been written.
pub fn run<I, L, W>(
    records: I,
    reference: &mut L,
    writer: &mut W,
    options: &PipelineOptions,
) -> Result<PipelineSummary>
where
    I: IntoIterator<Item = Result<AlignmentRecord>>,
    L: NucleotideLookup + ?Sized,
    W: Write,
{
    let mut pipeline = GenotypePipeline::new(options, reference, writer);
    for record in records {
        if !pipeline.process(&record?)? {
            break;
        }
    }
    pipeline.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BamgenoError;
    use crate::filter::Region;
    use crate::genotype::{ChromosomeBlock, GenotypeReader};
    use crate::io::bam::parse_cigar_str;
    use crate::reference::EagerReference;
    use std::io::Cursor;

    const SCENARIO: &str = "AGCATGTTAGATAAGATAGCTGTGCTAGTAGGCAGTCAGCGCCAT";

    fn reference() -> EagerReference {
        let mut reference = EagerReference::new();
        reference.insert("1", SCENARIO.as_bytes());
        reference.insert("2", SCENARIO.as_bytes());
        reference
    }

    fn record(chrom: &str, position: i64, cigar: &str, seq: &str) -> AlignmentRecord {
        AlignmentRecord {
            name: format!("{}:{}", chrom, position),
            reference_name: Some(Arc::from(chrom)),
            position,
            mapq: 60,
            cigar: parse_cigar_str(cigar).unwrap(),
            sequence: seq.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            locus_capacity: 64,
            ..Default::default()
        }
    }

    fn run_records(
        records: Vec<AlignmentRecord>,
        options: &PipelineOptions,
    ) -> (PipelineSummary, Vec<u8>) {
        let mut reference = reference();
        let mut out = Vec::new();
        let summary = run(
            records.into_iter().map(Ok),
            &mut reference,
            &mut out,
            options,
        )
        .unwrap();
        (summary, out)
    }

    fn blocks(out: Vec<u8>) -> Vec<ChromosomeBlock> {
        GenotypeReader::new(Cursor::new(out))
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0.0 Bytes");
        assert_eq!(human_size(999), "999.0 Bytes");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(8 * 1024 * 1024), "8.0 MB");
    }

    #[test]
    fn test_alignment_format_detection() {
        assert_eq!(AlignmentFormat::from_path("a/b.sam"), AlignmentFormat::Sam);
        assert_eq!(AlignmentFormat::from_path("b.SAM.gz"), AlignmentFormat::Sam);
        assert_eq!(AlignmentFormat::from_path("b.bam"), AlignmentFormat::Bam);
    }

    #[test]
    fn test_chromosome_switch_writes_blocks() {
        // Reference at 1..=4 is AGCA
        let records = vec![
            record("1", 1, "4M", "AGCA"),
            record("1", 2, "3M", "TCA"),
            record("2", 1, "2M", "AG"),
        ];
        let (summary, out) = run_records(records, &options());
        assert_eq!(summary.records_read, 3);
        assert_eq!(summary.records_accepted, 3);
        assert_eq!(summary.chromosomes_written, 2);
        assert_eq!(summary.total_loci, 6);

        let blocks = blocks(out);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].name, "1");
        assert_eq!(blocks[0].aligned_count, 4);
        assert_eq!(blocks[0].runs.len(), 1);
        // Position 2 saw G and T
        assert_eq!(blocks[0].runs[0].codes, vec![0, 1, 0, 0]);
        assert_eq!(blocks[1].name, "2");
        assert_eq!(blocks[1].runs[0].codes, vec![0, 0]);
    }

    #[test]
    fn test_walk_with_clip_insertion_and_deletion() {
        // 1M2I1M2D1M from 10: aligned 10, 11, 14; inserts keyed at 10
        let records = vec![record("1", 10, "1M2I1M2D1M", "GCCAT")];
        let mut reference = reference();
        let mut out = Vec::new();
        let options = options();
        let mut pipeline = GenotypePipeline::new(&options, &mut reference, &mut out);
        assert!(pipeline.process(&records[0]).unwrap());

        let aligned: Vec<u32> = pipeline
            .genotypes()
            .aligned()
            .iter()
            .map(|l| l.position)
            .collect();
        assert_eq!(aligned, vec![10, 11, 14]);
        let inserted: Vec<(u32, String)> = pipeline
            .genotypes()
            .inserted()
            .iter()
            .map(|l| (l.position, l.letters()))
            .collect();
        assert_eq!(
            inserted,
            vec![(10, "C".to_string()), (10, "C".to_string())]
        );
        // Reference 10 is 'G'
        assert!(pipeline.genotypes().aligned()[0].is_matched());
    }

    #[test]
    fn test_padding_before_insertion_skips_padded_offsets() {
        let records = vec![record("1", 10, "1M1P3I1M", "GACGT")];
        let mut reference = reference();
        let mut out = Vec::new();
        let options = options();
        let mut pipeline = GenotypePipeline::new(&options, &mut reference, &mut out);
        pipeline.process(&records[0]).unwrap();

        let letters: Vec<String> = pipeline
            .genotypes()
            .inserted()
            .iter()
            .map(|l| l.letters())
            .collect();
        // Offset 0 exists but holds nothing
        assert_eq!(letters, vec!["", "C", "G"]);
    }

    #[test]
    fn test_clipped_records_are_filtered() {
        let records = vec![record("1", 10, "3S2M1I2M", "AAACCGTT")];
        let (summary, out) = run_records(records, &options());
        assert_eq!(summary.records_rejected, 1);
        assert_eq!(summary.chromosomes_written, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_mitochondrial_stop_and_skip() {
        let records = vec![
            record("1", 1, "2M", "AG"),
            record("MT", 1, "2M", "AG"),
            record("2", 1, "2M", "AG"),
        ];

        let (summary, out) = run_records(records.clone(), &options());
        assert!(summary.stopped_at_mitochondrial);
        assert_eq!(summary.records_read, 2);
        let names: Vec<String> = blocks(out).into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["1"]);

        let skip = PipelineOptions {
            mitochondrial_policy: MitochondrialPolicy::Skip,
            ..options()
        };
        let (summary, out) = run_records(records, &skip);
        assert!(!summary.stopped_at_mitochondrial);
        assert_eq!(summary.records_read, 3);
        let names: Vec<String> = blocks(out).into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["1", "2"]);
    }

    #[test]
    fn test_region_filter() {
        let mut regions = RegionMap::new();
        regions.add("1", Region::new(20, 30));
        let with_regions = PipelineOptions {
            regions: Some(regions),
            ..options()
        };
        let records = vec![
            record("1", 1, "4M", "AGCA"),
            record("1", 18, "4M", "AGCT"),
            record("2", 20, "4M", "AGCT"),
        ];
        let (summary, out) = run_records(records, &with_regions);
        assert_eq!(summary.records_accepted, 1);
        assert_eq!(summary.records_rejected, 2);
        let blocks = blocks(out);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].aligned_count, 4);
    }

    #[test]
    fn test_short_sequence_is_skipped() {
        let records = vec![record("1", 1, "4M", ""), record("1", 1, "*", "")];
        let (summary, out) = run_records(records, &options());
        assert_eq!(summary.records_skipped, 1);
        assert_eq!(summary.records_accepted, 0);
        // The chromosome was activated, so an empty block is written
        let blocks = blocks(out);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].aligned_count, 0);
    }

    #[test]
    fn test_text_output() {
        let text = PipelineOptions {
            output_format: OutputFormat::Text,
            ..options()
        };
        let records = vec![record("1", 3, "1M1I1M", "CGA")];
        let (_, out) = run_records(records, &text);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            ">>> 1\n 3\tC\n*3\tG\n 4\tA\n"
        );
    }

    #[test]
    fn test_decode_error_aborts() {
        let mut reference = reference();
        let mut out = Vec::new();
        let records = vec![
            Ok(record("1", 1, "2M", "AG")),
            Err(BamgenoError::InvalidGenotypeStream("boom".to_string())),
        ];
        assert!(run(records, &mut reference, &mut out, &options()).is_err());
    }
}
