//! Builders for BGZF/BAM and SAM test inputs.

#![allow(dead_code)]

use bamgeno::io::bam::parse_cigar_str;
use bamgeno::io::compression::EOF_BLOCK;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;

/// Reference used across integration tests (1-based lookups).
pub const SCENARIO: &str = "AGCATGTTAGATAAGATAGCTGTGCTAGTAGGCAGTCAGCGCCAT";

/// One alignment to serialize as BAM and SAM.
#[derive(Debug, Clone)]
pub struct Read {
    pub name: &'static str,
    pub chrom: &'static str,
    /// 1-based
    pub pos: i32,
    pub mapq: u8,
    pub flag: u16,
    pub cigar: &'static str,
    pub seq: &'static str,
}

impl Read {
    pub fn new(chrom: &'static str, pos: i32, cigar: &'static str, seq: &'static str) -> Self {
        Self {
            name: "read",
            chrom,
            pos,
            mapq: 60,
            flag: 0,
            cigar,
            seq,
        }
    }

    pub fn flag(mut self, flag: u16) -> Self {
        self.flag = flag;
        self
    }

    pub fn mapq(mut self, mapq: u8) -> Self {
        self.mapq = mapq;
        self
    }
}

/// Compress `data` into one BGZF block.
pub fn bgzf_block(data: &[u8]) -> Vec<u8> {
    let mut deflate = DeflateEncoder::new(Vec::new(), Compression::default());
    deflate.write_all(data).unwrap();
    let deflated = deflate.finish().unwrap();

    let mut block = vec![31, 139, 8, 4, 0, 0, 0, 0, 0, 255];
    block.extend_from_slice(&6u16.to_le_bytes());
    block.extend_from_slice(b"BC");
    block.extend_from_slice(&2u16.to_le_bytes());
    let bsize = (18 + deflated.len() + 8 - 1) as u16;
    block.extend_from_slice(&bsize.to_le_bytes());
    block.extend_from_slice(&deflated);
    block.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    block.extend_from_slice(&(data.len() as u32).to_le_bytes());
    block
}

/// Split `data` into BGZF blocks of `block_len` bytes plus the EOF block.
pub fn bgzf(data: &[u8], block_len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in data.chunks(block_len) {
        out.extend_from_slice(&bgzf_block(chunk));
    }
    out.extend_from_slice(&EOF_BLOCK);
    out
}

fn base_code(base: u8) -> u8 {
    match base {
        b'A' => 1,
        b'C' => 2,
        b'G' => 4,
        b'T' => 8,
        _ => 15,
    }
}

/// Uncompressed BAM bytes.
pub fn bam_bytes(refs: &[(&str, u32)], reads: &[Read]) -> Vec<u8> {
    let text: String = refs
        .iter()
        .map(|(name, len)| format!("@SQ\tSN:{}\tLN:{}\n", name, len))
        .collect();

    let mut data = b"BAM\x01".to_vec();
    data.extend_from_slice(&(text.len() as i32).to_le_bytes());
    data.extend_from_slice(text.as_bytes());
    data.extend_from_slice(&(refs.len() as i32).to_le_bytes());
    for (name, len) in refs {
        data.extend_from_slice(&(name.len() as i32 + 1).to_le_bytes());
        data.extend_from_slice(name.as_bytes());
        data.push(0);
        data.extend_from_slice(&(*len as i32).to_le_bytes());
    }

    for read in reads {
        let ref_id = refs
            .iter()
            .position(|(name, _)| *name == read.chrom)
            .map(|i| i as i32)
            .unwrap_or(-1);
        let cigar = parse_cigar_str(read.cigar).unwrap();
        let seq = read.seq.as_bytes();

        let mut body = Vec::new();
        body.extend_from_slice(&ref_id.to_le_bytes());
        body.extend_from_slice(&(read.pos - 1).to_le_bytes());
        body.push(read.name.len() as u8 + 1);
        body.push(read.mapq);
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&(cigar.len() as u16).to_le_bytes());
        body.extend_from_slice(&read.flag.to_le_bytes());
        body.extend_from_slice(&(seq.len() as i32).to_le_bytes());
        body.extend_from_slice(&(-1i32).to_le_bytes());
        body.extend_from_slice(&(-1i32).to_le_bytes());
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(read.name.as_bytes());
        body.push(0);
        for op in &cigar {
            body.extend_from_slice(&((op.length() << 4) | op.code()).to_le_bytes());
        }
        for pair in seq.chunks(2) {
            let low = pair.get(1).map(|b| base_code(*b)).unwrap_or(0);
            body.push((base_code(pair[0]) << 4) | low);
        }
        body.extend(std::iter::repeat(30u8).take(seq.len()));

        data.extend_from_slice(&(body.len() as i32).to_le_bytes());
        data.extend_from_slice(&body);
    }
    data
}

/// SAM text for the same alignments.
pub fn sam_text(refs: &[(&str, u32)], reads: &[Read]) -> String {
    let mut text = String::from("@HD\tVN:1.6\tSO:coordinate\n");
    for (name, len) in refs {
        text.push_str(&format!("@SQ\tSN:{}\tLN:{}\n", name, len));
    }
    for read in reads {
        text.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t*\t0\t0\t{}\t{}\n",
            read.name,
            read.flag,
            read.chrom,
            read.pos,
            read.mapq,
            if read.cigar.is_empty() { "*" } else { read.cigar },
            read.seq,
            "?".repeat(read.seq.len()),
        ));
    }
    text
}

pub fn write_bam(path: &Path, refs: &[(&str, u32)], reads: &[Read], block_len: usize) {
    std::fs::write(path, bgzf(&bam_bytes(refs, reads), block_len)).unwrap();
}

pub fn write_sam(path: &Path, refs: &[(&str, u32)], reads: &[Read]) {
    std::fs::write(path, sam_text(refs, reads)).unwrap();
}

pub fn write_fasta(path: &Path, chromosomes: &[(&str, &str)]) {
    let mut text = String::new();
    for (name, seq) in chromosomes {
        text.push_str(&format!(">{} test\n", name));
        for line in seq.as_bytes().chunks(20) {
            text.push_str(std::str::from_utf8(line).unwrap());
            text.push('\n');
        }
    }
    std::fs::write(path, text).unwrap();
}
