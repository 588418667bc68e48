//! Alignment filter and regions of interest.
//!
//! An alignment is dropped when it is unmapped (or its mate is), secondary
//! or supplementary, clipped, placed with too little confidence, or lies
//! outside every region registered for its chromosome.
//!
//! Regions are 1-based closed intervals. BED files (0-based, half-open) are
//! converted on load.

use crate::error::{BamgenoError, Result};
use crate::io::bam::AlignmentRecord;
use crate::io::fasta::open_maybe_gzip;
use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;
use std::path::Path;

/// Default ceiling on the probability that a read is misplaced.
pub const DEFAULT_MAX_WRONG_POSITION_PROBABILITY: f64 = 0.01;

/// 1-based closed interval on one chromosome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// First position (inclusive)
    pub start: i64,
    /// Last position (inclusive)
    pub end: i64,
}

impl Region {
    /// Create a region.
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Closed intervals intersect iff `a.start <= b.end && b.start <= a.end`.
    pub fn intersects(&self, other: &Region) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Chromosome name to regions of interest.
#[derive(Debug, Clone, Default)]
pub struct RegionMap {
    regions: HashMap<String, Vec<Region>>,
}

impl RegionMap {
    /// Empty map; every alignment falls outside it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a region.
    pub fn add(&mut self, chromosome: impl Into<String>, region: Region) {
        self.regions.entry(chromosome.into()).or_default().push(region);
    }

    /// Regions registered for a chromosome.
    pub fn regions(&self, chromosome: &str) -> &[Region] {
        self.regions
            .get(chromosome)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of regions.
    pub fn len(&self) -> usize {
        self.regions.values().map(Vec::len).sum()
    }

    /// True when no region is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `region` intersects any region registered for `chromosome`.
    pub fn intersects(&self, chromosome: &str, region: &Region) -> bool {
        self.regions(chromosome).iter().any(|r| r.intersects(region))
    }

    /// Load a BED file (optionally gzip-compressed).
    pub fn from_bed<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bed_reader(open_maybe_gzip(path)?)
    }

    /// Parse BED text: `chrom start end [...]`, 0-based half-open.
    ///
    /// Blank lines and `#`, `track` and `browser` lines are skipped.
    ///
    /// # Example
    ///
    /// ```
    /// use bamgeno::filter::{Region, RegionMap};
    /// use std::io::Cursor;
    ///
    /// let map = RegionMap::from_bed_reader(Cursor::new("1\t99\t200\n")).unwrap();
    /// assert_eq!(map.regions("1"), &[Region::new(100, 200)]);
    /// ```
    pub fn from_bed_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut map = Self::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty()
                || trimmed.starts_with('#')
                || trimmed.starts_with("track")
                || trimmed.starts_with("browser")
            {
                continue;
            }

            let invalid = |msg: String| BamgenoError::InvalidRegion {
                line: line_number,
                msg,
            };

            let mut fields = trimmed.split('\t');
            let (chrom, start, end) = match (fields.next(), fields.next(), fields.next()) {
                (Some(c), Some(s), Some(e)) => (c, s, e),
                _ => return Err(invalid("expected chrom, start and end".to_string())),
            };
            let start: i64 = start
                .parse()
                .map_err(|_| invalid(format!("invalid start: {:?}", start)))?;
            let end: i64 = end
                .parse()
                .map_err(|_| invalid(format!("invalid end: {:?}", end)))?;
            if start < 0 || end <= start {
                return Err(invalid(format!("empty or negative interval {}-{}", start, end)));
            }

            map.add(chrom, Region::new(start + 1, end));
        }
        Ok(map)
    }
}

/// Why an alignment was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Unmapped or mate unmapped
    Unmapped,
    /// Secondary or supplementary
    Secondary,
    /// Soft or hard clip present
    Clipped,
    /// Placement error probability above the threshold
    LowMappingQuality,
    /// Outside every region of interest
    OutsideRegions,
}

/// First filter rule the record fails, if any.
///
/// `regions = None` applies no region restriction.
pub fn reject_reason(
    record: &AlignmentRecord,
    regions: Option<&RegionMap>,
    max_wrong_position_probability: f64,
) -> Option<RejectReason> {
    if record.is_unmapped() {
        return Some(RejectReason::Unmapped);
    }
    if record.is_secondary() {
        return Some(RejectReason::Secondary);
    }
    if record.has_clipping() {
        return Some(RejectReason::Clipped);
    }
    if !record.passes_mapping_confidence(max_wrong_position_probability) {
        return Some(RejectReason::LowMappingQuality);
    }

    if let Some(regions) = regions {
        let chromosome = record.reference_name.as_deref().unwrap_or("*");
        let start = record.clipped_start();
        // [start, start + span) as a closed interval
        let span = Region::new(start, start + record.reference_span() - 1);
        if !regions.intersects(chromosome, &span) {
            return Some(RejectReason::OutsideRegions);
        }
    }

    None
}

/// True when the record must not contribute genotype calls.
pub fn should_reject(
    record: &AlignmentRecord,
    regions: Option<&RegionMap>,
    max_wrong_position_probability: f64,
) -> bool {
    reject_reason(record, regions, max_wrong_position_probability).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::bam::{flags, parse_cigar_str};
    use proptest::prelude::*;
    use std::io::Cursor;
    use std::sync::Arc;

    fn record(position: i64, cigar: &str, seq: &str) -> AlignmentRecord {
        AlignmentRecord {
            name: "r".to_string(),
            reference_name: Some(Arc::from("1")),
            position,
            mapq: 60,
            cigar: parse_cigar_str(cigar).unwrap(),
            sequence: seq.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_accepts_clean_record() {
        let r = record(100, "4M", "ACGT");
        assert_eq!(reject_reason(&r, None, 0.01), None);
    }

    #[test]
    fn test_rejection_reasons() {
        let mut r = record(100, "4M", "ACGT");
        r.flags = flags::SECONDARY;
        assert_eq!(reject_reason(&r, None, 0.01), Some(RejectReason::Secondary));

        let r = record(100, "1S3M", "ACGT");
        assert_eq!(reject_reason(&r, None, 0.01), Some(RejectReason::Clipped));

        let r = record(100, "2H4M", "ACGT");
        assert_eq!(reject_reason(&r, None, 0.01), Some(RejectReason::Clipped));

        let mut r = record(100, "4M", "ACGT");
        r.mapq = 5;
        assert_eq!(
            reject_reason(&r, None, 0.01),
            Some(RejectReason::LowMappingQuality)
        );
    }

    #[test]
    fn test_region_restriction() {
        let mut regions = RegionMap::new();
        regions.add("1", Region::new(200, 300));

        // Covers 197..=200
        let touching = record(197, "4M", "ACGT");
        assert!(!should_reject(&touching, Some(&regions), 0.01));

        // Covers 196..=199
        let before = record(196, "4M", "ACGT");
        assert_eq!(
            reject_reason(&before, Some(&regions), 0.01),
            Some(RejectReason::OutsideRegions)
        );

        let mut other_chrom = record(250, "4M", "ACGT");
        other_chrom.reference_name = Some(Arc::from("2"));
        assert!(should_reject(&other_chrom, Some(&regions), 0.01));

        // Empty map excludes everything, no map excludes nothing
        assert!(should_reject(&touching, Some(&RegionMap::new()), 0.01));
        assert!(!should_reject(&before, None, 0.01));
    }

    #[test]
    fn test_deletion_extends_interval() {
        let mut regions = RegionMap::new();
        regions.add("1", Region::new(110, 120));
        // 2M8D2M from 100 covers 100..=111
        let r = record(100, "2M8D2M", "ACGT");
        assert!(!should_reject(&r, Some(&regions), 0.01));
    }

    #[test]
    fn test_bed_loading() {
        let bed = "track name=roi\n# comment\n1\t0\t10\tfirst\n\n2\t99\t100\n1\t20\t30\n";
        let map = RegionMap::from_bed_reader(Cursor::new(bed)).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.regions("1"), &[Region::new(1, 10), Region::new(21, 30)]);
        assert_eq!(map.regions("2"), &[Region::new(100, 100)]);
        assert!(map.regions("3").is_empty());
    }

    #[test]
    fn test_bed_errors_report_line() {
        let err = RegionMap::from_bed_reader(Cursor::new("1\t0\t10\n1\tx\t5\n")).unwrap_err();
        assert!(matches!(err, BamgenoError::InvalidRegion { line: 2, .. }));
        let err = RegionMap::from_bed_reader(Cursor::new("1\t10\t10\n")).unwrap_err();
        assert!(matches!(err, BamgenoError::InvalidRegion { line: 1, .. }));
        let err = RegionMap::from_bed_reader(Cursor::new("1\t10\n")).unwrap_err();
        assert!(matches!(err, BamgenoError::InvalidRegion { line: 1, .. }));
    }

    proptest! {
        #[test]
        fn prop_unmapped_always_rejected(
            extra_flags in any::<u16>(),
            mapq in any::<u8>(),
            position in 1i64..1_000_000,
        ) {
            let mut r = record(position, "4M", "ACGT");
            r.flags = extra_flags | flags::UNMAPPED;
            r.mapq = mapq;
            prop_assert!(should_reject(&r, None, 1.0));
            prop_assert_eq!(reject_reason(&r, None, 1.0), Some(RejectReason::Unmapped));
        }

        #[test]
        fn prop_intersection_is_symmetric(
            a in 0i64..1000, la in 0i64..100,
            b in 0i64..1000, lb in 0i64..100,
        ) {
            let x = Region::new(a, a + la);
            let y = Region::new(b, b + lb);
            prop_assert_eq!(x.intersects(&y), y.intersects(&x));
        }
    }
}
