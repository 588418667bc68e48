//! Genotype stream writer and reader.
//!
//! # Compressed layout
//!
//! Per chromosome, all integers little-endian `u32`:
//!
//! ```text
//! name \0
//! aligned_count inserted_count
//! { run_start run_length word[ceil(run_length / 16)] }*
//! 0 0
//! ```
//!
//! A run is a maximal stretch of consecutive biallelic aligned loci. Its
//! genotype codes are packed two bits each, first code in the lowest bits
//! of the first word.
//!
//! # Text layout
//!
//! A `>>> name` line, then one line per locus of both lists merged by
//! position. Aligned loci are prefixed with a space, inserted loci with `*`.

use super::accumulator::GenotypeList;
use super::locus::GenotypeLocus;
use crate::error::{BamgenoError, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

/// Bits per genotype code.
pub const BITS_PER_GENOTYPE: u32 = 2;
/// Genotype codes per packed word.
pub const CODES_PER_WORD: usize = (u32::BITS / BITS_PER_GENOTYPE) as usize;

const CODE_MASK: u32 = (1 << BITS_PER_GENOTYPE) - 1;

/// Maximal runs of consecutive biallelic loci, as index ranges.
fn biallelic_runs(loci: &[GenotypeLocus]) -> Vec<std::ops::Range<usize>> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < loci.len() {
        if !loci[i].is_biallelic() {
            i += 1;
            continue;
        }
        let start = i;
        i += 1;
        while i < loci.len()
            && loci[i].is_biallelic()
            && loci[i].position == loci[i - 1].position + 1
        {
            i += 1;
        }
        runs.push(start..i);
    }
    runs
}

/// Pack 2-bit codes into words, lowest bits first.
pub fn pack_codes(codes: &[u8]) -> Vec<u32> {
    codes
        .chunks(CODES_PER_WORD)
        .map(|chunk| {
            chunk.iter().enumerate().fold(0u32, |word, (i, &code)| {
                word | ((u32::from(code) & CODE_MASK) << (i as u32 * BITS_PER_GENOTYPE))
            })
        })
        .collect()
}

/// Unpack `len` codes from packed words.
pub fn unpack_codes(words: &[u32], len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| {
            let word = words[i / CODES_PER_WORD];
            let shift = (i % CODES_PER_WORD) as u32 * BITS_PER_GENOTYPE;
            ((word >> shift) & CODE_MASK) as u8
        })
        .collect()
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Write the compressed block for one chromosome, name included.
pub fn write_chromosome<W: Write>(writer: &mut W, name: &str, list: &GenotypeList) -> Result<()> {
    writer.write_all(name.as_bytes())?;
    writer.write_all(&[0])?;
    write_genotypes(writer, list)
}

/// Write loci counts, genotype runs and the terminating sentinel.
pub fn write_genotypes<W: Write>(writer: &mut W, list: &GenotypeList) -> Result<()> {
    write_u32(writer, count(list.aligned().len()))?;
    write_u32(writer, count(list.inserted().len()))?;

    let loci = list.aligned();
    let mut codes = Vec::new();
    for run in biallelic_runs(loci) {
        let run = &loci[run];
        write_u32(writer, run[0].position)?;
        write_u32(writer, count(run.len()))?;

        codes.clear();
        codes.extend(run.iter().map(GenotypeLocus::genotype_code));
        for word in pack_codes(&codes) {
            write_u32(writer, word)?;
        }
    }

    write_u32(writer, 0)?;
    write_u32(writer, 0)?;
    writer.flush()?;
    Ok(())
}

/// Write one chromosome as text, name line included.
pub fn write_text_chromosome<W: Write>(
    writer: &mut W,
    name: &str,
    list: &GenotypeList,
) -> Result<()> {
    writeln!(writer, ">>> {}", name)?;
    write_loci_text(writer, list)
}

/// Write every locus as text; an aligned locus precedes inserts keyed at
/// the same position.
pub fn write_loci_text<W: Write>(writer: &mut W, list: &GenotypeList) -> Result<()> {
    let (aligned, inserted) = (list.aligned(), list.inserted());
    let (mut a, mut i) = (0, 0);
    while a < aligned.len() || i < inserted.len() {
        let take_aligned = match (aligned.get(a), inserted.get(i)) {
            (Some(x), Some(y)) => x.position <= y.position,
            (Some(_), None) => true,
            _ => false,
        };
        if take_aligned {
            writeln!(writer, " {}", aligned[a])?;
            a += 1;
        } else {
            writeln!(writer, "*{}", inserted[i])?;
            i += 1;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Consecutive genotype codes starting at a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenotypeRun {
    /// First position
    pub start: u32,
    /// Codes for `start..start + codes.len()`
    pub codes: Vec<u8>,
}

/// One decoded chromosome block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeBlock {
    /// Chromosome name
    pub name: String,
    /// Aligned loci tracked when the block was written
    pub aligned_count: u32,
    /// Inserted-base loci tracked when the block was written
    pub inserted_count: u32,
    /// Runs in position order
    pub runs: Vec<GenotypeRun>,
}

impl ChromosomeBlock {
    /// Genotype code at a position, if a run covers it.
    pub fn genotype_at(&self, position: u32) -> Option<u8> {
        self.runs.iter().find_map(|run| {
            let offset = position.checked_sub(run.start)? as usize;
            run.codes.get(offset).copied()
        })
    }

    /// Positions with a genotype code.
    pub fn called_loci(&self) -> usize {
        self.runs.iter().map(|run| run.codes.len()).sum()
    }
}

/// Reader for the compressed genotype stream.
///
/// # Example
///
/// ```no_run
/// use bamgeno::genotype::GenotypeReader;
///
/// # fn main() -> bamgeno::Result<()> {
/// for block in GenotypeReader::from_path("sample.bam.gtp")? {
///     let block = block?;
///     println!("{}: {} called", block.name, block.called_loci());
/// }
/// # Ok(())
/// # }
/// ```
pub struct GenotypeReader<R: BufRead> {
    reader: R,
    failed: bool,
}

impl GenotypeReader<BufReader<File>> {
    /// Open a genotype file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> GenotypeReader<R> {
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            failed: false,
        }
    }

    fn read_u32(&mut self, what: &str) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                BamgenoError::InvalidGenotypeStream(format!("truncated while reading {}", what))
            }
            _ => BamgenoError::Io(e),
        })?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Decode the next chromosome block; `None` at a clean end of stream.
    pub fn read_chromosome(&mut self) -> Result<Option<ChromosomeBlock>> {
        let mut name = Vec::new();
        if self.reader.read_until(0, &mut name)? == 0 {
            return Ok(None);
        }
        if name.pop() != Some(0) {
            return Err(BamgenoError::InvalidGenotypeStream(
                "chromosome name is not NUL-terminated".to_string(),
            ));
        }
        let name = String::from_utf8(name).map_err(|_| {
            BamgenoError::InvalidGenotypeStream("chromosome name is not UTF-8".to_string())
        })?;

        let aligned_count = self.read_u32("aligned count")?;
        let inserted_count = self.read_u32("inserted count")?;

        let mut runs = Vec::new();
        loop {
            let start = self.read_u32("run start")?;
            let len = self.read_u32("run length")? as usize;
            if start == 0 && len == 0 {
                break;
            }
            if len == 0 {
                return Err(BamgenoError::InvalidGenotypeStream(format!(
                    "empty run at position {}",
                    start
                )));
            }
            let n_words = len.div_ceil(CODES_PER_WORD);
            let mut words = Vec::with_capacity(n_words.min(1 << 16));
            for _ in 0..n_words {
                words.push(self.read_u32("packed genotypes")?);
            }
            runs.push(GenotypeRun {
                start,
                codes: unpack_codes(&words, len),
            });
        }

        Ok(Some(ChromosomeBlock {
            name,
            aligned_count,
            inserted_count,
            runs,
        }))
    }
}

impl<R: BufRead> Iterator for GenotypeReader<R> {
    type Item = Result<ChromosomeBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = self.read_chromosome().transpose();
        self.failed = matches!(result, Some(Err(_)));
        result
    }
}
